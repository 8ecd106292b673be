use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{ComposerMode, ServiceConfig};
use crate::error::QueueError;
use crate::llm::{OpenRouterAdapter, OpenRouterConfig, ProviderError};
use crate::prompt::PromptComposer;
use crate::task::{MemoryBroker, RedisBroker, TaskBroker};

/// Installs the global subscriber. `RUST_LOG` wins over the `info` default.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_target(false).with_env_filter(filter).try_init();
}

/// `prefix@hostname`, used as the worker node id in ping replies.
pub fn node_name(prefix: &str) -> String {
    let host = hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string());
    format!("{}@{}", prefix, host)
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown requested");
}

pub fn build_broker(cfg: &ServiceConfig) -> Result<Arc<dyn TaskBroker>, QueueError> {
    if cfg.uses_memory_broker() {
        return Ok(Arc::new(MemoryBroker::new(Duration::from_secs(
            cfg.result_ttl_secs,
        ))));
    }
    Ok(Arc::new(RedisBroker::new(&cfg.redis_url, cfg.result_ttl_secs)?))
}

pub fn build_composer(cfg: &ServiceConfig) -> Result<PromptComposer, ProviderError> {
    match cfg.composer {
        ComposerMode::Template => Ok(PromptComposer::Template),
        ComposerMode::Inference => {
            let adapter = OpenRouterAdapter::new(OpenRouterConfig {
                api_key: cfg.openrouter_api_key.clone(),
                base_url: cfg.openrouter_base_url.clone(),
                model: cfg.openrouter_model.clone(),
                timeout: cfg.inference_timeout,
            })?;
            Ok(PromptComposer::Inference {
                provider: Arc::new(adapter),
                model: Some(cfg.openrouter_model.clone()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_name_has_prefix() {
        assert!(node_name("worker").starts_with("worker@"));
    }

    #[test]
    fn composer_follows_mode() {
        let mut cfg = ServiceConfig::default();
        assert_eq!(build_composer(&cfg).unwrap().name(), "template");
        cfg.composer = ComposerMode::Inference;
        assert_eq!(build_composer(&cfg).unwrap().name(), "inference");
    }

    #[tokio::test]
    async fn memory_url_selects_in_process_broker() {
        let cfg = ServiceConfig {
            redis_url: "memory://".to_string(),
            ..ServiceConfig::default()
        };
        let broker = build_broker(&cfg).unwrap();
        assert!(broker.ping().await.unwrap());
    }
}
