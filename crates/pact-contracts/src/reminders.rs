use std::collections::HashSet;
use std::sync::Arc;

use pact_core::models::field;
use pact_core::{
    CONTRACTS_COLLECTION, Clock, ContractEvent, ContractEventKind, ContractEventSink,
    ContractStatus, Direction, DocumentStore, Filter, Query, Result, SystemClock,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::store::decode_contracts;

/// Announces pending contracts whose due date has passed, so their partners
/// know they may now judge them.
///
/// Each contract is announced once per sweep instance. A failed publish is
/// retried on the next run.
pub struct OverdueSweep {
    documents: Arc<dyn DocumentStore>,
    events: Arc<dyn ContractEventSink>,
    clock: Arc<dyn Clock>,
    announced: Mutex<HashSet<String>>,
}

impl OverdueSweep {
    pub fn new(documents: Arc<dyn DocumentStore>, events: Arc<dyn ContractEventSink>) -> Self {
        Self {
            documents,
            events,
            clock: Arc::new(SystemClock),
            announced: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn run_once(&self) -> Result<Vec<ContractEvent>> {
        let now = self.clock.now();
        let query = Query::collection(CONTRACTS_COLLECTION)
            .filter(Filter::eq(field::STATUS, ContractStatus::Pending.as_str()))
            .filter(Filter::lt(field::DUE_DATE, now))
            .order_by(field::DUE_DATE, Direction::Ascending);
        let overdue = decode_contracts(self.documents.query(&query).await?);

        let mut announced = self.announced.lock().await;
        // settled contracts no longer need remembering
        announced.retain(|id| overdue.iter().any(|contract| &contract.id == id));

        let mut published = Vec::new();
        for contract in &overdue {
            if announced.contains(&contract.id) {
                continue;
            }

            let event = ContractEvent::new(ContractEventKind::Overdue, contract, now);
            if let Err(err) = self.events.publish(&event).await {
                warn!(contract_id = %contract.id, "failed to announce overdue contract: {err:#}");
                continue;
            }
            announced.insert(contract.id.clone());
            published.push(event);
        }

        if !published.is_empty() {
            info!(count = published.len(), "announced overdue contracts");
        }
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pact_core::{FixedClock, Fields, NewContract};
    use pact_store::{InMemoryDocumentStore, InMemoryEventSink};
    use rust_decimal::Decimal;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 27, 12, 0, 0).unwrap()
    }

    fn due(due_date: DateTime<Utc>) -> Fields {
        NewContract {
            name: "Stretch".to_string(),
            description: "ten minutes".to_string(),
            amount: Decimal::new(3, 0),
            partner_id: "bob".to_string(),
            due_date,
        }
        .into_contract(String::new(), "alice".to_string())
        .to_fields()
    }

    #[tokio::test]
    async fn announces_each_overdue_contract_once() {
        let documents = Arc::new(InMemoryDocumentStore::new());
        let sink = Arc::new(InMemoryEventSink::new());
        let clock = Arc::new(FixedClock::new(now()));
        let late = documents
            .add(CONTRACTS_COLLECTION, due(now() - Duration::hours(1)))
            .await
            .unwrap();
        documents
            .add(CONTRACTS_COLLECTION, due(now() + Duration::hours(1)))
            .await
            .unwrap();

        let sweep = OverdueSweep::new(documents.clone(), sink.clone()).with_clock(clock.clone());

        let first = sweep.run_once().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].contract_id, late);
        assert_eq!(first[0].kind, ContractEventKind::Overdue);
        assert_eq!(first[0].partner_id, "bob");

        assert!(sweep.run_once().await.unwrap().is_empty());

        clock.advance(Duration::hours(2));
        assert_eq!(sweep.run_once().await.unwrap().len(), 1);
        assert_eq!(sink.events().await.len(), 2);
    }

    struct FlakySink {
        fail: AtomicBool,
        inner: InMemoryEventSink,
    }

    #[async_trait]
    impl ContractEventSink for FlakySink {
        async fn publish(&self, event: &ContractEvent) -> anyhow::Result<()> {
            if self.fail.swap(false, Ordering::SeqCst) {
                anyhow::bail!("bus unavailable");
            }
            self.inner.publish(event).await
        }
    }

    #[tokio::test]
    async fn failed_announcement_is_retried_next_run() {
        let documents = Arc::new(InMemoryDocumentStore::new());
        let sink = Arc::new(FlakySink {
            fail: AtomicBool::new(true),
            inner: InMemoryEventSink::new(),
        });
        documents
            .add(CONTRACTS_COLLECTION, due(now() - Duration::days(1)))
            .await
            .unwrap();
        let sweep = OverdueSweep::new(documents, sink.clone())
            .with_clock(Arc::new(FixedClock::new(now())));

        assert!(sweep.run_once().await.unwrap().is_empty());
        assert_eq!(sweep.run_once().await.unwrap().len(), 1);
        assert_eq!(sink.inner.events().await.len(), 1);
    }
}
