//! Pure derivations over a loaded contract list.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use pact_core::{Contract, ContractStatus};

/// Pending contracts the actor made.
pub fn my_active<'a>(contracts: &'a [Contract], actor_id: &str) -> Vec<&'a Contract> {
    contracts
        .iter()
        .filter(|contract| {
            contract.owner_id == actor_id && contract.status == ContractStatus::Pending
        })
        .collect()
}

/// Pending contracts the actor has to judge.
pub fn partner_active<'a>(contracts: &'a [Contract], actor_id: &str) -> Vec<&'a Contract> {
    contracts
        .iter()
        .filter(|contract| {
            contract.partner_id == actor_id && contract.status == ContractStatus::Pending
        })
        .collect()
}

/// Settled contracts the actor made, most recently completed first.
/// Records without a completion date go last, then ties break by id.
pub fn history<'a>(contracts: &'a [Contract], actor_id: &str) -> Vec<&'a Contract> {
    let mut settled: Vec<&Contract> = contracts
        .iter()
        .filter(|contract| contract.owner_id == actor_id && contract.is_complete())
        .collect();
    settled.sort_by(|a, b| by_completion_desc(a, b));
    settled
}

pub fn overdue(contracts: &[Contract], now: DateTime<Utc>) -> Vec<&Contract> {
    contracts
        .iter()
        .filter(|contract| contract.is_overdue(now))
        .collect()
}

fn by_completion_desc(a: &Contract, b: &Contract) -> Ordering {
    let dates = match (a.completed_date, b.completed_date) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    dates.then_with(|| a.id.cmp(&b.id))
}
