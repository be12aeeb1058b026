use std::sync::Arc;

use anyhow::Result;
use pact_contracts::OverdueSweep;
use pact_platform::{PgDocumentStore, RedisBus, ServiceConfig, connect_database, ensure_schema};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "pact_notifier=info,pact_contracts=info".to_string()
        }))
        .init();

    let config = ServiceConfig::from_env()?;
    let pool = connect_database(&config.database_url).await?;
    ensure_schema(&pool).await?;
    let redis = RedisBus::connect(&config.redis_url)?;

    let sweep = OverdueSweep::new(Arc::new(PgDocumentStore::new(pool)), Arc::new(redis));

    let mut ticker = interval(config.sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(
        "overdue notifier sweeping every {}s",
        config.sweep_interval.as_secs()
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = sweep.run_once().await {
                    error!("overdue sweep failed: {err}");
                }
            }
            _ = &mut shutdown => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}
