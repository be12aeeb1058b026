use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Contract;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ContractEventKind {
    Created,
    Succeeded,
    Failed,
    Overdue,
}

impl ContractEventKind {
    /// Pub/sub channel the event is announced on.
    pub fn channel(self) -> &'static str {
        match self {
            ContractEventKind::Created => "contracts.created",
            ContractEventKind::Succeeded | ContractEventKind::Failed => "contracts.settled",
            ContractEventKind::Overdue => "contracts.overdue",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContractEvent {
    pub id: Uuid,
    pub contract_id: String,
    pub owner_id: String,
    pub partner_id: String,
    pub kind: ContractEventKind,
    pub occurred_at: DateTime<Utc>,
}

impl ContractEvent {
    pub fn new(kind: ContractEventKind, contract: &Contract, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            contract_id: contract.id.clone(),
            owner_id: contract.owner_id.clone(),
            partner_id: contract.partner_id.clone(),
            kind,
            occurred_at,
        }
    }
}
