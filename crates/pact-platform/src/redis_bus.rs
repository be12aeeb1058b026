use anyhow::Result;
use async_trait::async_trait;
use pact_core::{ContractEvent, ContractEventSink};
use redis::{AsyncCommands, Client};
use serde::Serialize;
use tracing::debug;

#[derive(Clone)]
pub struct RedisBus {
    client: Client,
}

impl RedisBus {
    pub fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        Ok(Self { client })
    }

    pub async fn publish_json<T: Serialize>(&self, channel: &str, payload: &T) -> Result<()> {
        let mut connection = self.client.get_multiplexed_async_connection().await?;
        let serialized = serde_json::to_string(payload)?;
        let _: i64 = connection.publish(channel, serialized).await?;
        Ok(())
    }
}

#[async_trait]
impl ContractEventSink for RedisBus {
    async fn publish(&self, event: &ContractEvent) -> Result<()> {
        let channel = event.kind.channel();
        self.publish_json(channel, event).await?;
        debug!(channel, contract_id = %event.contract_id, "published contract event");
        Ok(())
    }
}
