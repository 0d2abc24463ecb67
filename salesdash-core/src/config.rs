use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

use crate::error::SalesdashError;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SalesdashConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Query cache settings. Without `stale_after_seconds` a settled entry is
/// served until it is invalidated.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct QueryConfig {
    pub stale_after_seconds: Option<u64>,
}

impl QueryConfig {
    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_seconds.map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl SalesdashConfig {
    /// Load from an optional TOML file, then `SALESDASH__SECTION__KEY`
    /// environment variables on top.
    pub fn load(path: &str) -> Result<Self, SalesdashError> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(path: &str, env: Environment) -> Result<Self, SalesdashError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(env)
            .build()?;
        Ok(s.try_deserialize()?)
    }
}

fn environment() -> Environment {
    Environment::with_prefix("SALESDASH")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
