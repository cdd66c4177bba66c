//! PostgreSQL connection pool for the stack store.
//!
//! A single search fans out into several concurrent store calls (three per
//! unified-search token, two overlap probes per similarity request, one per
//! filter predicate), so the pool is sized for a few requests' worth of
//! parallel lookups rather than one connection per request.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use mosaic_core::{Error, Result};

/// Default pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 16;

/// Default time to wait for a free connection.
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Default time an unused connection is kept open.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default upper bound on a connection's age.
pub const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800;

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            max_lifetime: Some(Duration::from_secs(DEFAULT_MAX_LIFETIME_SECS)),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `MOSAIC_DB_MAX_CONNECTIONS` and `MOSAIC_DB_ACQUIRE_TIMEOUT_SECS`,
    /// keeping the default for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(n) = parse(&lookup, "MOSAIC_DB_MAX_CONNECTIONS") {
            config.max_connections = n;
        }
        if let Some(secs) = parse(&lookup, "MOSAIC_DB_ACQUIRE_TIMEOUT_SECS") {
            config.acquire_timeout = Duration::from_secs(secs);
        }
        config.min_connections = config.min_connections.min(config.max_connections);
        config
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_lifetime = lifetime;
        self
    }
}

fn parse<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Invalid pool setting, using default");
            None
        }
    }
}

/// Connect with the default settings.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

/// Connect with `config`.
pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let start = Instant::now();
    debug!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        max_connections = config.max_connections,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        "Connecting"
    );

    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout);
    if let Some(max_lifetime) = config.max_lifetime {
        options = options.max_lifetime(max_lifetime);
    }
    let pool = options.connect(database_url).await.map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Connection pool ready"
    );
    Ok(pool)
}

/// Log pool occupancy. Warns when every connection is checked out, which
/// means concurrent store calls are queueing.
pub fn log_pool_metrics(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();
    if idle == 0 && size > 0 {
        warn!(
            subsystem = "db",
            component = "pool",
            pool_size = size,
            "No idle connections"
        );
    } else {
        debug!(
            subsystem = "db",
            component = "pool",
            pool_size = size,
            pool_idle = idle,
            "Pool occupancy"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let config = PoolConfig::from_lookup(lookup(&[
            ("MOSAIC_DB_MAX_CONNECTIONS", "32"),
            ("MOSAIC_DB_ACQUIRE_TIMEOUT_SECS", "3"),
        ]));
        assert_eq!(config.max_connections, 32);
        assert_eq!(config.acquire_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_invalid_env_keeps_defaults() {
        let config = PoolConfig::from_lookup(lookup(&[
            ("MOSAIC_DB_MAX_CONNECTIONS", "many"),
            ("MOSAIC_DB_ACQUIRE_TIMEOUT_SECS", "-1"),
        ]));
        assert_eq!(config, PoolConfig::default());
    }

    #[test]
    fn test_min_never_exceeds_max() {
        let config = PoolConfig::from_lookup(lookup(&[("MOSAIC_DB_MAX_CONNECTIONS", "0")]));
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.min_connections, 0);
    }

    #[test]
    fn test_builder() {
        let config = PoolConfig::new()
            .max_connections(4)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(1))
            .max_lifetime(None);
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.acquire_timeout, Duration::from_secs(1));
        assert!(config.max_lifetime.is_none());
    }
}
