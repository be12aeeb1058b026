use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::document::{Document, FieldValue, Fields};
use crate::error::{DecodeError, PactError};

pub const USERS_COLLECTION: &str = "Users";
pub const CONTRACTS_COLLECTION: &str = "Contracts";
pub const FRIENDS_COLLECTION: &str = "Friends";

/// Stored field names, shared by every adapter.
pub mod field {
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const CREATED_AT: &str = "createdAt";
    pub const DESCRIPTION: &str = "description";
    pub const AMOUNT: &str = "amount";
    pub const OWNER_ID: &str = "ownerId";
    pub const PARTNER_ID: &str = "partnerId";
    pub const STATUS: &str = "status";
    pub const DUE_DATE: &str = "dueDate";
    pub const COMPLETED_DATE: &str = "completedDate";
    pub const USER_ID: &str = "userId";
    pub const FRIEND_ID: &str = "friendId";
    pub const DATE_ADDED: &str = "dateAdded";
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Pending,
    Success,
    Failed,
}

impl ContractStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContractStatus::Pending => "pending",
            ContractStatus::Success => "success",
            ContractStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        self != ContractStatus::Pending
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(ContractStatus::Pending),
            "success" => Ok(ContractStatus::Success),
            "failed" => Ok(ContractStatus::Failed),
            other => Err(format!("unknown contract status '{other}'")),
        }
    }
}

/// A promise made by `owner_id` and judged by `partner_id`.
///
/// `completed_date` is present exactly when `status` is terminal; decoding
/// rejects stored records that break this.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contract {
    pub id: String,
    pub name: String,
    pub description: String,
    pub amount: Decimal,
    pub owner_id: String,
    pub partner_id: String,
    pub due_date: DateTime<Utc>,
    pub status: ContractStatus,
    pub completed_date: Option<DateTime<Utc>>,
}

impl Contract {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == ContractStatus::Pending && self.due_date < now
    }

    pub fn can_mark_success(&self) -> bool {
        self.status == ContractStatus::Pending
    }

    pub fn can_mark_failed(&self, now: DateTime<Utc>) -> bool {
        self.is_overdue(now)
    }

    pub fn is_complete(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_partner(&self, actor_id: &str) -> bool {
        self.partner_id == actor_id
    }

    /// `can_mark_success` as seen by `actor_id`: only the partner may act.
    pub fn can_mark_success_as(&self, actor_id: &str) -> bool {
        self.is_partner(actor_id) && self.can_mark_success()
    }

    pub fn can_mark_failed_as(&self, actor_id: &str, now: DateTime<Utc>) -> bool {
        self.is_partner(actor_id) && self.can_mark_failed(now)
    }

    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::NAME.to_string(), self.name.as_str().into());
        fields.insert(field::DESCRIPTION.to_string(), self.description.as_str().into());
        fields.insert(field::AMOUNT.to_string(), self.amount.into());
        fields.insert(field::OWNER_ID.to_string(), self.owner_id.as_str().into());
        fields.insert(field::PARTNER_ID.to_string(), self.partner_id.as_str().into());
        fields.insert(field::STATUS.to_string(), self.status.as_str().into());
        fields.insert(field::DUE_DATE.to_string(), self.due_date.into());
        fields.insert(field::COMPLETED_DATE.to_string(), self.completed_date.into());
        fields
    }

    pub fn from_document(document: &Document) -> Result<Self, DecodeError> {
        let raw_status = document.string(field::STATUS)?;
        let status = raw_status
            .parse::<ContractStatus>()
            .map_err(|_| DecodeError::InvalidValue {
                id: document.id.clone(),
                field: field::STATUS,
                value: raw_status.to_string(),
            })?;
        let completed_date = document.optional_timestamp(field::COMPLETED_DATE)?;

        match (status, completed_date) {
            (ContractStatus::Pending, Some(_)) => {
                return Err(DecodeError::Inconsistent {
                    id: document.id.clone(),
                    reason: "pending contract carries a completion date",
                });
            }
            (ContractStatus::Success | ContractStatus::Failed, None) => {
                return Err(DecodeError::Inconsistent {
                    id: document.id.clone(),
                    reason: "settled contract has no completion date",
                });
            }
            _ => {}
        }

        Ok(Self {
            id: document.id.clone(),
            name: document.string(field::NAME)?.to_string(),
            description: document.string(field::DESCRIPTION)?.to_string(),
            amount: document.decimal(field::AMOUNT)?,
            owner_id: document.string(field::OWNER_ID)?.to_string(),
            partner_id: document.string(field::PARTNER_ID)?.to_string(),
            due_date: document.timestamp(field::DUE_DATE)?,
            status,
            completed_date,
        })
    }
}

/// Input for creating a contract. The owner is always the acting user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContract {
    pub name: String,
    pub description: String,
    pub amount: Decimal,
    pub partner_id: String,
    pub due_date: DateTime<Utc>,
}

impl NewContract {
    pub fn validate(&self, owner_id: &str) -> Result<(), PactError> {
        if self.name.trim().is_empty() {
            return Err(PactError::validation("name", "name is required"));
        }
        if self.description.trim().is_empty() {
            return Err(PactError::validation("description", "description is required"));
        }
        if self.amount < Decimal::ZERO {
            return Err(PactError::validation("amount", "amount must not be negative"));
        }
        if self.partner_id.trim().is_empty() {
            return Err(PactError::validation("partner_id", "partner is required"));
        }
        if self.partner_id == owner_id {
            return Err(PactError::validation(
                "partner_id",
                "a user cannot supervise their own contract",
            ));
        }
        Ok(())
    }

    /// Builds the stored record: status forced to pending, no completion.
    pub fn into_contract(self, id: String, owner_id: String) -> Contract {
        Contract {
            id,
            name: self.name,
            description: self.description,
            amount: self.amount,
            owner_id,
            partner_id: self.partner_id,
            due_date: self.due_date,
            status: ContractStatus::Pending,
            completed_date: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl User {
    pub fn profile_fields(email: &str, name: &str, created_at: DateTime<Utc>) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::EMAIL.to_string(), email.into());
        fields.insert(field::NAME.to_string(), name.into());
        fields.insert(field::CREATED_AT.to_string(), created_at.into());
        fields
    }

    pub fn from_document(document: &Document) -> Result<Self, DecodeError> {
        Ok(Self {
            id: document.id.clone(),
            email: document.string(field::EMAIL)?.to_string(),
            name: document.string(field::NAME)?.to_string(),
        })
    }
}

/// Directed friendship edge: `user_id` lists `friend_id` as a friend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FriendEdge {
    pub id: String,
    pub user_id: String,
    pub friend_id: String,
    pub date_added: DateTime<Utc>,
}

impl FriendEdge {
    pub fn edge_fields(user_id: &str, friend_id: &str, date_added: DateTime<Utc>) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::USER_ID.to_string(), user_id.into());
        fields.insert(field::FRIEND_ID.to_string(), friend_id.into());
        fields.insert(field::DATE_ADDED.to_string(), FieldValue::Timestamp(date_added));
        fields
    }

    pub fn from_document(document: &Document) -> Result<Self, DecodeError> {
        Ok(Self {
            id: document.id.clone(),
            user_id: document.string(field::USER_ID)?.to_string(),
            friend_id: document.string(field::FRIEND_ID)?.to_string(),
            date_added: document.timestamp(field::DATE_ADDED)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 27, 12, 0, 0).unwrap()
    }

    fn contract(status: ContractStatus, due_in: Duration) -> Contract {
        Contract {
            id: "c1".to_string(),
            name: "Run 5k".to_string(),
            description: "before breakfast".to_string(),
            amount: Decimal::new(20, 0),
            owner_id: "alice".to_string(),
            partner_id: "bob".to_string(),
            due_date: now() + due_in,
            status,
            completed_date: status.is_terminal().then(now),
        }
    }

    #[test]
    fn overdue_requires_pending_and_past_due() {
        assert!(contract(ContractStatus::Pending, Duration::days(-1)).is_overdue(now()));
        assert!(!contract(ContractStatus::Pending, Duration::days(1)).is_overdue(now()));
        assert!(!contract(ContractStatus::Success, Duration::days(-1)).is_overdue(now()));
    }

    #[test]
    fn only_the_partner_may_mark_failed_once_overdue() {
        let overdue = contract(ContractStatus::Pending, Duration::days(-1));
        assert!(overdue.can_mark_failed_as("bob", now()));
        assert!(!overdue.can_mark_failed_as("alice", now()));

        let upcoming = contract(ContractStatus::Pending, Duration::days(1));
        assert!(upcoming.can_mark_success_as("bob"));
        assert!(!upcoming.can_mark_failed_as("bob", now()));
    }

    #[test]
    fn settled_contracts_are_complete_and_frozen() {
        let settled = contract(ContractStatus::Failed, Duration::days(-1));
        assert!(settled.is_complete());
        assert!(!settled.can_mark_success());
        assert!(!settled.can_mark_failed(now()));
    }

    #[test]
    fn stored_fields_decode_back() {
        let original = contract(ContractStatus::Success, Duration::days(-2));
        let document = Document::new("c1", original.to_fields());
        assert_eq!(Contract::from_document(&document).unwrap(), original);
    }

    #[test]
    fn pending_with_completion_date_is_rejected() {
        let mut fields = contract(ContractStatus::Pending, Duration::days(1)).to_fields();
        fields.insert(field::COMPLETED_DATE.to_string(), now().into());

        let err = Contract::from_document(&Document::new("c1", fields)).unwrap_err();
        assert!(matches!(err, DecodeError::Inconsistent { .. }));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let mut fields = contract(ContractStatus::Pending, Duration::days(1)).to_fields();
        fields.insert(field::STATUS.to_string(), "abandoned".into());

        let err = Contract::from_document(&Document::new("c1", fields)).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidValue { field: "status", .. }));
    }

    fn draft() -> NewContract {
        NewContract {
            name: "Run 5k".to_string(),
            description: "before breakfast".to_string(),
            amount: Decimal::new(20, 0),
            partner_id: "bob".to_string(),
            due_date: now(),
        }
    }

    #[test]
    fn validation_rejects_bad_input() {
        assert!(draft().validate("alice").is_ok());

        let mut blank = draft();
        blank.name = "  ".to_string();
        assert!(matches!(
            blank.validate("alice"),
            Err(PactError::Validation { field: "name", .. })
        ));

        let mut negative = draft();
        negative.amount = Decimal::new(-1, 0);
        assert!(matches!(
            negative.validate("alice"),
            Err(PactError::Validation { field: "amount", .. })
        ));

        let mut undescribed = draft();
        undescribed.description = String::new();
        assert!(matches!(
            undescribed.validate("alice"),
            Err(PactError::Validation { field: "description", .. })
        ));

        let mut unpartnered = draft();
        unpartnered.partner_id = " ".to_string();
        assert!(matches!(
            unpartnered.validate("alice"),
            Err(PactError::Validation { field: "partner_id", .. })
        ));

        assert!(matches!(
            draft().validate("bob"),
            Err(PactError::Validation { field: "partner_id", .. })
        ));
    }

    #[test]
    fn zero_amount_is_allowed() {
        let mut free = draft();
        free.amount = Decimal::ZERO;
        assert!(free.validate("alice").is_ok());
    }
}
