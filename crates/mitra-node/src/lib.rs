// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MITRA - NODE
//
// Wires configuration, storage, identity and metrics into the HTTP API.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::sync::Arc;

use anyhow::Context;
use mitra_core::{AccountStore, Clock, MemoryStore, SystemClock, TransactionCoordinator};
use mitra_crypto::{IdentitySecret, IdentityVerifier};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod metrics;
pub mod rate_limiter;

use api::AppState;
use config::{LogFormat, NodeConfig, StoreKind};
use db::SledStore;
use metrics::MitraMetrics;
use rate_limiter::RateLimiter;

/// A configured node, ready to serve.
pub struct Node {
    pub state: AppState,
    /// Present when running on sled, so shutdown can flush it.
    pub sled: Option<Arc<SledStore>>,
}

impl Node {
    pub fn build(config: &NodeConfig) -> anyhow::Result<Self> {
        Self::build_with_clock(config, Arc::new(SystemClock))
    }

    pub fn build_with_clock(config: &NodeConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let mut sled = None;
        let store: Arc<dyn AccountStore> = match config.store {
            StoreKind::Sled => {
                let opened = Arc::new(
                    SledStore::open(&config.data_dir, config.flush_every_commit)
                        .with_context(|| format!("opening {}", config.data_dir.display()))?,
                );
                sled = Some(opened.clone());
                opened
            }
            StoreKind::Memory => Arc::new(MemoryStore::new()),
        };

        let secret = IdentitySecret::new(&config.jwt_secret)
            .map_err(|e| anyhow::anyhow!("jwt_secret: {}", e))?;
        let verifier = IdentityVerifier::new(secret, config.jwt_issuer.clone());

        let state = AppState {
            coordinator: TransactionCoordinator::new(store, clock, config.policy()),
            gate: auth::jwt_gate(verifier),
            metrics: MitraMetrics::new().context("registering metrics")?,
            limiter: RateLimiter::new(config.rate_limit_rps, Some(config.rate_limit_burst)),
            cors_origins: config.cors_origins.clone(),
        };
        Ok(Self { state, sled })
    }

    /// Flush durable storage, if any.
    pub fn flush(&self) {
        if let Some(sled) = &self.sled {
            if let Err(e) = sled.flush() {
                tracing::error!(error = %e, "database flush failed");
            }
        }
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_tracing(config: &NodeConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "mitra_node={level},mitra_core={level},warn",
            level = config.log_level
        ))
    });
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config() -> NodeConfig {
        NodeConfig {
            jwt_secret: "node-test-secret-that-is-long-enough".to_string(),
            store: StoreKind::Memory,
            ..NodeConfig::default()
        }
    }

    #[test]
    fn test_build_memory_node() {
        let node = Node::build(&config()).unwrap();
        assert!(node.sled.is_none());
        assert_eq!(node.state.coordinator.policy().welcome_balance, 50);
    }

    #[test]
    fn test_build_sled_node() {
        let dir = TempDir::new().unwrap();
        let cfg = NodeConfig {
            store: StoreKind::Sled,
            data_dir: dir.path().join("db"),
            ..config()
        };
        let node = Node::build(&cfg).unwrap();
        assert!(node.sled.is_some());
        node.flush();
    }
}
