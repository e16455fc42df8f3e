use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

/// Prefix for process variables exposed to datasource configs as `{{ env.NAME }}`
pub const ENVIRONMENT_VARIABLE_PREFIX: &str = "QUERY_ENV_";

const DEFAULT_QUERY_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_VARIABLE_TTL_SECS: u64 = 3_600;

#[derive(Debug, Clone)]
pub struct Config {
    /// Absent means documents are kept in memory
    pub database_url: Option<String>,
    pub server_address: String,
    pub query_timeout: Duration,
    pub variable_cache_ttl: Duration,
    pub environment_variables: HashMap<String, String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|key| vars.get(key).cloned(), vars.iter())
    }

    pub fn from_lookup<'a, F, I>(lookup: F, all: I) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        // Check if we're in production mode
        let is_production = lookup("RUST_ENV")
            .unwrap_or_else(|| "development".to_string())
            .to_lowercase()
            == "production";

        let query_timeout_ms = match lookup("QUERY_THREAD_TIMEOUT") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("QUERY_THREAD_TIMEOUT must be milliseconds, got {:?}", raw))?,
            None => DEFAULT_QUERY_TIMEOUT_MS,
        };

        let variable_ttl_secs = match lookup("DYNAMIC_VARIABLE_TTL") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("DYNAMIC_VARIABLE_TTL must be seconds, got {:?}", raw))?,
            None => DEFAULT_VARIABLE_TTL_SECS,
        };

        let environment_variables = all
            .into_iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(ENVIRONMENT_VARIABLE_PREFIX)
                    .filter(|name| !name.is_empty())
                    .map(|name| (name.to_string(), value.clone()))
            })
            .collect();

        Ok(Config {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            server_address: lookup("SERVER_ADDRESS").unwrap_or_else(|| {
                if is_production {
                    "0.0.0.0:7680".to_string()
                } else {
                    "127.0.0.1:7680".to_string()
                }
            }),
            query_timeout: Duration::from_millis(query_timeout_ms),
            variable_cache_ttl: Duration::from_secs(variable_ttl_secs),
            environment_variables,
        })
    }
}
