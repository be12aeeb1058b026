use async_trait::async_trait;
use pact_core::{ContractEvent, ContractEventSink};
use tokio::sync::RwLock;

/// Keeps every published event in order.
#[derive(Default)]
pub struct InMemoryEventSink {
    events: RwLock<Vec<ContractEvent>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ContractEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl ContractEventSink for InMemoryEventSink {
    async fn publish(&self, event: &ContractEvent) -> anyhow::Result<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }
}
