use std::sync::Arc;

use pact_core::models::field;
use pact_core::{
    CONTRACTS_COLLECTION, Clock, Contract, ContractEvent, ContractEventKind, ContractEventSink,
    ContractStatus, Direction, Document, DocumentStore, Fields, Filter, NewContract, PactError,
    Projection, Query, Result, Snapshot, SystemClock,
};
use pact_identity::IdentityContext;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::views;

/// The actor's contracts, as owner or as partner, and every mutation on
/// them.
///
/// Reads go through a [`Projection`]: each refresh replaces the whole list
/// and overlapping refreshes are fenced. Mutations never touch the
/// projection directly; they write to the document store and then refresh.
pub struct ContractStore {
    identity: Arc<IdentityContext>,
    documents: Arc<dyn DocumentStore>,
    events: Option<Arc<dyn ContractEventSink>>,
    clock: Arc<dyn Clock>,
    projection: Projection<Contract>,
}

impl ContractStore {
    pub fn new(identity: Arc<IdentityContext>, documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            identity,
            documents,
            events: None,
            clock: Arc::new(SystemClock),
            projection: Projection::new("contracts"),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn ContractEventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Re-reads every contract the actor owns or judges and replaces the
    /// projection. On failure the previous snapshot stays in place.
    ///
    /// Returns the list visible once this refresh settles, which is a newer
    /// refresh's result if one overtook this one.
    pub async fn load_contracts(&self) -> Result<Arc<Vec<Contract>>> {
        let actor_id = self.identity.require_actor()?;
        let ticket = self.projection.begin();

        let query = Query::collection(CONTRACTS_COLLECTION)
            .filter(Filter::or([
                Filter::eq(field::OWNER_ID, actor_id.as_str()),
                Filter::eq(field::PARTNER_ID, actor_id.as_str()),
            ]))
            .order_by(field::DUE_DATE, Direction::Ascending);

        let documents = self.documents.query(&query).await.map_err(|err| {
            warn!(actor_id = %actor_id, "failed to load contracts: {err}");
            PactError::from(err)
        })?;
        let contracts = decode_contracts(documents);
        let count = contracts.len();

        if self.projection.commit(ticket, Some(actor_id.clone()), contracts) {
            info!(
                actor_id = %actor_id,
                count,
                version = ticket.sequence(),
                "contracts refreshed"
            );
        }
        Ok(self.projection.current().items)
    }

    /// Persists a new pending contract owned by the actor.
    ///
    /// The projection only shows it after the follow-up refresh completes. A
    /// failed refresh is logged and does not undo the creation.
    pub async fn create_contract(&self, draft: NewContract) -> Result<Contract> {
        let owner_id = self.identity.require_actor()?;
        draft.validate(&owner_id)?;

        let mut contract = draft.into_contract(String::new(), owner_id);
        contract.id = self
            .documents
            .add(CONTRACTS_COLLECTION, contract.to_fields())
            .await?;

        info!(
            contract_id = %contract.id,
            owner_id = %contract.owner_id,
            partner_id = %contract.partner_id,
            "contract created"
        );
        self.announce(ContractEventKind::Created, &contract).await;
        self.refresh_after_write().await;
        Ok(contract)
    }

    /// Settles a pending contract. Only its partner may do this, only once,
    /// and `Failed` only after the due date has passed.
    pub async fn update_status(
        &self,
        contract_id: &str,
        new_status: ContractStatus,
    ) -> Result<Contract> {
        let actor_id = self.identity.require_actor()?;
        if new_status == ContractStatus::Pending {
            return Err(PactError::validation(
                "status",
                "a contract can only be settled as success or failed",
            ));
        }

        let document = self
            .documents
            .get(CONTRACTS_COLLECTION, contract_id)
            .await?
            .ok_or_else(|| PactError::NotFound {
                collection: CONTRACTS_COLLECTION.to_string(),
                id: contract_id.to_string(),
            })?;
        let contract = Contract::from_document(&document)?;

        if !contract.is_partner(&actor_id) {
            return Err(PactError::Unauthorized {
                contract_id: contract.id,
                actor_id,
            });
        }
        if contract.is_complete() {
            return Err(PactError::State {
                contract_id: contract.id,
                reason: format!("already settled as {}", contract.status),
            });
        }

        let now = self.clock.now();
        if new_status == ContractStatus::Failed && !contract.can_mark_failed(now) {
            return Err(PactError::State {
                contract_id: contract.id,
                reason: "cannot be marked failed before its due date".to_string(),
            });
        }

        let mut changes = Fields::new();
        changes.insert(field::STATUS.to_string(), new_status.as_str().into());
        changes.insert(field::COMPLETED_DATE.to_string(), now.into());
        let still_pending = Filter::eq(field::STATUS, ContractStatus::Pending.as_str());
        self.documents
            .update(CONTRACTS_COLLECTION, contract_id, changes, Some(&still_pending))
            .await?;

        let settled = Contract {
            status: new_status,
            completed_date: Some(now),
            ..contract
        };
        info!(
            contract_id = %settled.id,
            status = %settled.status,
            partner_id = %actor_id,
            "contract settled"
        );

        let kind = match new_status {
            ContractStatus::Failed => ContractEventKind::Failed,
            _ => ContractEventKind::Succeeded,
        };
        self.announce(kind, &settled).await;
        self.refresh_after_write().await;
        Ok(settled)
    }

    pub fn snapshot(&self) -> Snapshot<Contract> {
        self.projection.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<Contract>> {
        self.projection.subscribe()
    }

    /// Drops the loaded contracts, e.g. after the actor signs out.
    pub fn reset(&self) {
        self.projection.clear();
    }

    pub fn my_active(&self) -> Vec<Contract> {
        self.derive(views::my_active)
    }

    pub fn partner_active(&self) -> Vec<Contract> {
        self.derive(views::partner_active)
    }

    pub fn history(&self) -> Vec<Contract> {
        self.derive(views::history)
    }

    pub fn overdue(&self) -> Vec<Contract> {
        let snapshot = self.projection.current();
        views::overdue(&snapshot.items, self.clock.now())
            .into_iter()
            .cloned()
            .collect()
    }

    fn derive(
        &self,
        view: for<'a> fn(&'a [Contract], &str) -> Vec<&'a Contract>,
    ) -> Vec<Contract> {
        let Some(actor_id) = self.identity.current_actor_id() else {
            return Vec::new();
        };
        let snapshot = self.projection.current();
        view(&snapshot.items, &actor_id).into_iter().cloned().collect()
    }

    async fn announce(&self, kind: ContractEventKind, contract: &Contract) {
        let Some(events) = &self.events else {
            return;
        };
        let event = ContractEvent::new(kind, contract, self.clock.now());
        if let Err(err) = events.publish(&event).await {
            warn!(contract_id = %contract.id, "failed to publish {kind:?} event: {err:#}");
        }
    }

    async fn refresh_after_write(&self) {
        if let Err(err) = self.load_contracts().await {
            warn!("refresh after write failed: {err}");
        }
    }
}

/// Decodes stored contracts, skipping (and logging) malformed records.
pub(crate) fn decode_contracts(documents: Vec<Document>) -> Vec<Contract> {
    documents
        .iter()
        .filter_map(|document| match Contract::from_document(document) {
            Ok(contract) => Some(contract),
            Err(err) => {
                warn!("skipping malformed contract: {err}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::result::Result as StdResult;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use pact_core::{FixedClock, StoreError};
    use pact_store::{InMemoryDocumentStore, InMemoryEventSink, InMemoryIdentityService};
    use rust_decimal::Decimal;
    use tokio::sync::Notify;

    use super::*;

    /// Holds back the first query's result until released, after it has
    /// already read its data. With `reads_down` set every query fails while
    /// writes still go through.
    struct GatedStore {
        inner: InMemoryDocumentStore,
        armed: AtomicBool,
        reads_down: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl GatedStore {
        fn new(armed: bool) -> Self {
            Self {
                inner: InMemoryDocumentStore::new(),
                armed: AtomicBool::new(armed),
                reads_down: AtomicBool::new(false),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for GatedStore {
        async fn get(&self, collection: &str, id: &str) -> StdResult<Option<Document>, StoreError> {
            self.inner.get(collection, id).await
        }

        async fn query(&self, query: &Query) -> StdResult<Vec<Document>, StoreError> {
            if self.reads_down.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("reads are down".to_string()));
            }
            let result = self.inner.query(query).await;
            if self.armed.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            result
        }

        async fn add(&self, collection: &str, fields: Fields) -> StdResult<String, StoreError> {
            self.inner.add(collection, fields).await
        }

        async fn set(
            &self,
            collection: &str,
            id: &str,
            fields: Fields,
        ) -> StdResult<(), StoreError> {
            self.inner.set(collection, id, fields).await
        }

        async fn update(
            &self,
            collection: &str,
            id: &str,
            fields: Fields,
            precondition: Option<&Filter>,
        ) -> StdResult<(), StoreError> {
            self.inner.update(collection, id, fields, precondition).await
        }

        async fn delete(&self, collection: &str, id: &str) -> StdResult<(), StoreError> {
            self.inner.delete(collection, id).await
        }
    }

    struct DownSink;

    #[async_trait]
    impl ContractEventSink for DownSink {
        async fn publish(&self, _event: &ContractEvent) -> anyhow::Result<()> {
            anyhow::bail!("bus unavailable")
        }
    }

    fn draft_for(partner_id: &str) -> NewContract {
        NewContract {
            name: "Swim 1k".to_string(),
            description: "any pool".to_string(),
            amount: Decimal::new(5, 0),
            partner_id: partner_id.to_string(),
            due_date: Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap(),
        }
    }

    async fn signed_in(documents: Arc<dyn DocumentStore>) -> (Arc<IdentityContext>, String) {
        let identity = Arc::new(IdentityContext::new(
            Arc::new(InMemoryIdentityService::new()),
            documents,
        ));
        let user = identity
            .register("alice@example.com", "hunter22", "Alice")
            .await
            .unwrap();
        (identity, user.id)
    }

    fn pending_for(owner_id: &str, partner_id: &str) -> Fields {
        NewContract {
            name: "Read a book".to_string(),
            description: "one chapter a day".to_string(),
            amount: Decimal::new(10, 0),
            partner_id: partner_id.to_string(),
            due_date: Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap(),
        }
        .into_contract(String::new(), owner_id.to_string())
        .to_fields()
    }

    #[tokio::test]
    async fn stale_refresh_does_not_overwrite_newer_one() {
        let gated = Arc::new(GatedStore::new(true));
        let (identity, alice) = signed_in(gated.clone()).await;
        let store = Arc::new(ContractStore::new(identity, gated.clone()));

        let slow = tokio::spawn({
            let store = store.clone();
            async move { store.load_contracts().await }
        });
        gated.entered.notified().await;

        gated
            .inner
            .add(CONTRACTS_COLLECTION, pending_for(&alice, "bob"))
            .await
            .unwrap();
        let fresh = store.load_contracts().await.unwrap();
        assert_eq!(fresh.len(), 1);

        gated.release.notify_one();
        let visible = slow.await.unwrap().unwrap();

        assert_eq!(visible.len(), 1);
        assert_eq!(store.snapshot().items.len(), 1);
        assert_eq!(store.snapshot().version, 2);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_last_good_snapshot() {
        let documents = Arc::new(InMemoryDocumentStore::new());
        let (identity, alice) = signed_in(documents.clone()).await;
        documents
            .add(CONTRACTS_COLLECTION, pending_for(&alice, "bob"))
            .await
            .unwrap();
        let store = ContractStore::new(identity, documents.clone());
        store.load_contracts().await.unwrap();

        documents.set_offline(true);
        let err = store.load_contracts().await.unwrap_err();
        assert!(matches!(err, PactError::StoreUnavailable(_)));
        assert_eq!(store.snapshot().items.len(), 1);
        assert_eq!(store.my_active().len(), 1);
    }

    #[tokio::test]
    async fn malformed_records_are_skipped() {
        let documents = Arc::new(InMemoryDocumentStore::new());
        let (identity, alice) = signed_in(documents.clone()).await;
        let mut broken = pending_for(&alice, "bob");
        broken.remove(field::AMOUNT);
        documents.add(CONTRACTS_COLLECTION, broken).await.unwrap();
        documents
            .add(CONTRACTS_COLLECTION, pending_for(&alice, "bob"))
            .await
            .unwrap();

        let store = ContractStore::new(identity, documents);
        assert_eq!(store.load_contracts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_to_mark_before_due_date_is_rejected() {
        let documents = Arc::new(InMemoryDocumentStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 10, 27, 12, 0, 0).unwrap(),
        ));
        let (identity, partner) = signed_in(documents.clone()).await;
        let id = documents
            .add(CONTRACTS_COLLECTION, pending_for("owner", &partner))
            .await
            .unwrap();
        let store = ContractStore::new(identity, documents).with_clock(clock.clone());

        let err = store
            .update_status(&id, ContractStatus::Failed)
            .await
            .unwrap_err();
        assert!(matches!(err, PactError::State { .. }));

        clock.advance(Duration::days(10));
        let settled = store.update_status(&id, ContractStatus::Failed).await.unwrap();
        assert_eq!(settled.status, ContractStatus::Failed);
        assert_eq!(settled.completed_date, Some(clock.now()));
    }

    #[tokio::test]
    async fn reset_clears_the_projection() {
        let documents = Arc::new(InMemoryDocumentStore::new());
        let (identity, alice) = signed_in(documents.clone()).await;
        documents
            .add(CONTRACTS_COLLECTION, pending_for(&alice, "bob"))
            .await
            .unwrap();
        let store = ContractStore::new(identity, documents);
        store.load_contracts().await.unwrap();

        store.reset();
        assert!(store.snapshot().items.is_empty());
        assert!(store.my_active().is_empty());
    }

    #[tokio::test]
    async fn publish_failure_does_not_fail_writes() {
        let documents = Arc::new(InMemoryDocumentStore::new());
        let (identity, alice) = signed_in(documents.clone()).await;
        let judged = documents
            .add(CONTRACTS_COLLECTION, pending_for("owner", &alice))
            .await
            .unwrap();
        let store =
            ContractStore::new(identity, documents.clone()).with_events(Arc::new(DownSink));

        let created = store.create_contract(draft_for("bob")).await.unwrap();
        let stored = documents.get(CONTRACTS_COLLECTION, &created.id).await.unwrap();
        assert!(stored.is_some());
        assert_eq!(store.my_active().len(), 1);

        let settled = store
            .update_status(&judged, ContractStatus::Success)
            .await
            .unwrap();
        assert_eq!(settled.status, ContractStatus::Success);
        assert!(store.partner_active().is_empty());
    }

    #[tokio::test]
    async fn refresh_failure_after_write_still_returns_the_write() {
        let gated = Arc::new(GatedStore::new(false));
        let (identity, alice) = signed_in(gated.clone()).await;
        let judged = gated
            .inner
            .add(CONTRACTS_COLLECTION, pending_for("owner", &alice))
            .await
            .unwrap();
        let events = Arc::new(InMemoryEventSink::new());
        let store = ContractStore::new(identity, gated.clone()).with_events(events.clone());
        store.load_contracts().await.unwrap();
        let before = store.snapshot();

        gated.reads_down.store(true, Ordering::SeqCst);
        let created = store.create_contract(draft_for("bob")).await.unwrap();
        let stored = gated.inner.get(CONTRACTS_COLLECTION, &created.id).await.unwrap();
        assert!(stored.is_some());

        let settled = store
            .update_status(&judged, ContractStatus::Success)
            .await
            .unwrap();
        assert!(settled.completed_date.is_some());
        assert_eq!(events.events().await.len(), 2);

        let after = store.snapshot();
        assert_eq!(after.version, before.version);
        assert_eq!(after.items.len(), 1);
    }
}
