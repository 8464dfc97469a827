//! Provider configuration
//!
//! Cache timings default to the freshness window shared by the other
//! providers and can be overridden through the environment.

use std::time::Duration;

use crate::cache::DEFAULT_CACHE_TTL;
use crate::error::{Error, Result};

/// Environment variable overriding the cache TTL, in seconds
pub const CACHE_TTL_ENV: &str = "LATTICE_SUBNET_CACHE_TTL_SECS";

/// Environment variable overriding the expired-entry sweep interval, in seconds
pub const CACHE_CLEANUP_ENV: &str = "LATTICE_SUBNET_CACHE_CLEANUP_SECS";

/// Default interval between expired-entry sweeps (10 minutes)
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(600);

/// Trait for reading configuration from the environment
///
/// Abstracts environment access so tests can inject values without
/// touching process-global state.
#[cfg_attr(test, mockall::automock)]
pub trait EnvSource: Send + Sync {
    /// Value of the variable, if set
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment
#[derive(Clone, Copy, Debug, Default)]
pub struct OsEnv;

impl EnvSource for OsEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Subnet provider configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubnetProviderConfig {
    /// How long a fetched term result stays fresh
    pub cache_ttl: Duration,
    /// How often the background sweeper purges expired entries
    pub cleanup_interval: Duration,
}

impl Default for SubnetProviderConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl SubnetProviderConfig {
    /// Load configuration, falling back to defaults for unset variables
    pub fn from_env(env: &dyn EnvSource) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            cache_ttl: read_secs(env, CACHE_TTL_ENV)?.unwrap_or(defaults.cache_ttl),
            cleanup_interval: read_secs(env, CACHE_CLEANUP_ENV)?
                .unwrap_or(defaults.cleanup_interval),
        })
    }
}

fn read_secs(env: &dyn EnvSource, key: &str) -> Result<Option<Duration>> {
    let Some(raw) = env.var(key) else {
        return Ok(None);
    };
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|e| Error::configuration(key, format!("invalid seconds {:?}: {}", raw, e)))?;
    if secs == 0 {
        return Err(Error::configuration(key, "must be greater than zero"));
    }
    Ok(Some(Duration::from_secs(secs)))
}
