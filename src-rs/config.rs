use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379/0";
pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_OPENROUTER_MODEL: &str = "deepseek/deepseek-r1:free";

/// Which prompt composer the workers run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComposerMode {
    Template,
    Inference,
}

impl FromStr for ComposerMode {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "template" | "local" => Ok(ComposerMode::Template),
            "inference" | "enriched" => Ok(ComposerMode::Inference),
            other => Err(ConfigError::Invalid {
                key: "PROMPT_COMPOSER".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub redis_url: String,
    pub openrouter_api_key: Option<String>,
    pub openrouter_base_url: String,
    pub openrouter_model: String,
    pub composer: ComposerMode,
    pub inference_timeout: Option<Duration>,
    pub worker_ping_timeout: Duration,
    pub result_ttl_secs: u64,
    pub worker_concurrency: usize,
    pub host: String,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            openrouter_api_key: None,
            openrouter_base_url: DEFAULT_OPENROUTER_BASE_URL.to_string(),
            openrouter_model: DEFAULT_OPENROUTER_MODEL.to_string(),
            composer: ComposerMode::Template,
            inference_timeout: None,
            worker_ping_timeout: Duration::from_millis(1000),
            result_ttl_secs: 86_400,
            worker_concurrency: 1,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServiceConfig {
    /// Reads the process environment, loading `.env` first when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let composer = match get("PROMPT_COMPOSER") {
            Some(raw) => raw.parse()?,
            None => defaults.composer,
        };
        let inference_timeout = match get("INFERENCE_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(parse_number("INFERENCE_TIMEOUT_SECS", &raw)?)),
            None => None,
        };
        let worker_ping_timeout = match get("WORKER_PING_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(parse_number("WORKER_PING_TIMEOUT_MS", &raw)?),
            None => defaults.worker_ping_timeout,
        };
        let worker_concurrency: usize = match get("WORKER_CONCURRENCY") {
            Some(raw) => parse_number("WORKER_CONCURRENCY", &raw)?,
            None => defaults.worker_concurrency,
        };

        Ok(Self {
            redis_url: get("REDIS_URL").unwrap_or(defaults.redis_url),
            openrouter_api_key: get("OPEN_ROUTER_API_KEY").map(|key| key.trim().to_string()),
            openrouter_base_url: get("OPENROUTER_BASE_URL").unwrap_or(defaults.openrouter_base_url),
            openrouter_model: get("OPENROUTER_MODEL").unwrap_or(defaults.openrouter_model),
            composer,
            inference_timeout,
            worker_ping_timeout,
            result_ttl_secs: match get("RESULT_TTL_SECS") {
                Some(raw) => parse_number("RESULT_TTL_SECS", &raw)?,
                None => defaults.result_ttl_secs,
            },
            worker_concurrency: worker_concurrency.max(1),
            host: get("HOST").unwrap_or(defaults.host),
            port: match get("PORT") {
                Some(raw) => parse_number("PORT", &raw)?,
                None => defaults.port,
            },
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uses_memory_broker(&self) -> bool {
        self.redis_url.starts_with("memory://")
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        value: raw.to_string(),
    })
}
