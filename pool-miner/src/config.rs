//! Pool configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Miner-facing listener.
    pub bind: SocketAddr,

    /// Status API listener.
    pub api_bind: SocketAddr,

    /// JSON credential set. The daemon refuses to start without one.
    pub credentials_file: Option<PathBuf>,

    /// Template is re-requested this often even without a tip change, to
    /// rotate the reservation windows handed to sessions.
    pub template_refresh: Duration,

    /// Block difficulty divided by this gives the share difficulty.
    pub share_difficulty_ratio: u64,

    /// Owner fee taken off each block reward (0--100).
    pub owner_fee_percent: u64,

    /// Upper bound on handling a single miner request.
    pub request_timeout: Duration,

    /// Blocking threads available to request handlers.
    pub worker_threads: usize,

    /// How long shutdown waits for in-flight requests.
    pub shutdown_grace: Duration,

    /// Longest gap served as addenda; larger gaps need a full scratchpad.
    pub max_addendum_blocks: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 4455)),
            api_bind: SocketAddr::from(([127, 0, 0, 1], 7786)),
            credentials_file: None,
            template_refresh: Duration::from_secs(20),
            share_difficulty_ratio: 100,
            owner_fee_percent: 3,
            request_timeout: Duration::from_secs(20),
            worker_threads: 15,
            shutdown_grace: Duration::from_secs(5),
            max_addendum_blocks: 10,
        }
    }
}

impl PoolConfig {
    /// Defaults overridden from `POOL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden through `lookup`, which maps a variable name to
    /// its value if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = lookup("POOL_BIND") {
            config.bind = parse("POOL_BIND", &v)?;
        }
        if let Some(v) = lookup("POOL_API_BIND") {
            config.api_bind = parse("POOL_API_BIND", &v)?;
        }
        if let Some(v) = lookup("POOL_CREDENTIALS_FILE") {
            config.credentials_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("POOL_REFRESH_SECS") {
            let secs: u64 = parse("POOL_REFRESH_SECS", &v)?;
            if secs == 0 {
                return Err(invalid("POOL_REFRESH_SECS", &v));
            }
            config.template_refresh = Duration::from_secs(secs);
        }
        if let Some(v) = lookup("POOL_WORKER_THREADS") {
            let threads: usize = parse("POOL_WORKER_THREADS", &v)?;
            if threads == 0 {
                return Err(invalid("POOL_WORKER_THREADS", &v));
            }
            config.worker_threads = threads;
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(name, value))
}

fn invalid(name: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
    }
}
