use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub database_url: String,
    pub redis_url: String,
    pub sweep_interval: Duration,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL is required")?;
        let redis_url = lookup("REDIS_URL").context("REDIS_URL is required")?;
        let sweep_interval_secs = match lookup("SWEEP_INTERVAL_SECS") {
            Some(raw) => raw.trim().parse::<u64>().with_context(|| {
                format!("SWEEP_INTERVAL_SECS must be a whole number, got '{raw}'")
            })?,
            None => DEFAULT_SWEEP_INTERVAL_SECS,
        };
        if sweep_interval_secs == 0 {
            anyhow::bail!("SWEEP_INTERVAL_SECS must be greater than zero");
        }

        Ok(Self {
            database_url,
            redis_url,
            sweep_interval: Duration::from_secs(sweep_interval_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| values.get(key).cloned()
    }

    #[test]
    fn defaults_sweep_interval() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/pact"),
            ("REDIS_URL", "redis://localhost"),
        ]))
        .unwrap();
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn missing_database_url_is_reported() {
        let err = ServiceConfig::from_lookup(lookup(&[("REDIS_URL", "redis://localhost")]))
            .unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn rejects_bad_sweep_interval() {
        for raw in ["soon", "0"] {
            let result = ServiceConfig::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://localhost/pact"),
                ("REDIS_URL", "redis://localhost"),
                ("SWEEP_INTERVAL_SECS", raw),
            ]));
            assert!(result.is_err(), "accepted {raw}");
        }
    }
}
