//! Service configuration, loaded from environment variables.
//!
//! Values are wrapped in validated newtypes so an invalid environment
//! fails at startup with a coded error instead of surfacing mid-request.
//!
//! Key variables:
//! - `DATABASE_URL`: Postgres connection string (optional; in-memory
//!   storage is used when absent)
//! - `MODBOT_HTTP_PORT`: HTTP listen port (default 8080)
//! - `MODBOT_CHECK_TIMEOUT_MS`: per-check evaluation cap (default 5000)
//! - `MODBOT_DEDUP_CAPACITY`: dedup cache entries (default 100000)
//! - `MODBOT_DEDUP_TTL_SECONDS`: dedup suppression window (default 3600)
//! - `MODBOT_STATSD_HOST`: statsd `host:port` (optional; metrics are
//!   dropped when absent)

use std::time::Duration;

use crate::errors::ConfigError;

type Result<T> = std::result::Result<T, ConfigError>;

/// HTTP server port.
#[derive(Debug, Clone, Copy)]
pub struct HttpPort(u16);

impl Default for HttpPort {
    fn default() -> Self {
        Self(8080)
    }
}

impl TryFrom<String> for HttpPort {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        value
            .parse::<u16>()
            .map(Self)
            .map_err(|_| ConfigError::InvalidPortNumber { port: value })
    }
}

impl HttpPort {
    pub fn get(&self) -> u16 {
        self.0
    }
}

/// Per-check evaluation timeout.
#[derive(Debug, Clone, Copy)]
pub struct CheckTimeout(Duration);

impl Default for CheckTimeout {
    fn default() -> Self {
        Self(Duration::from_millis(5000))
    }
}

impl TryFrom<String> for CheckTimeout {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        let millis = value
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout {
                value: value.clone(),
            })?;
        if millis == 0 {
            return Err(ConfigError::InvalidTimeout { value });
        }
        Ok(Self(Duration::from_millis(millis)))
    }
}

impl CheckTimeout {
    pub fn get(&self) -> Duration {
        self.0
    }
}

/// Maximum number of dedup keys held in memory.
#[derive(Debug, Clone, Copy)]
pub struct DedupCapacity(u64);

impl Default for DedupCapacity {
    fn default() -> Self {
        Self(crate::intake::DEFAULT_DEDUP_CAPACITY)
    }
}

impl TryFrom<String> for DedupCapacity {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        let capacity = value
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidCacheSize {
                value: value.clone(),
            })?;
        if capacity == 0 {
            return Err(ConfigError::InvalidCacheSize { value });
        }
        Ok(Self(capacity))
    }
}

impl DedupCapacity {
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// How long processed events suppress redeliveries.
#[derive(Debug, Clone, Copy)]
pub struct DedupTtl(Duration);

impl Default for DedupTtl {
    fn default() -> Self {
        Self(crate::intake::DEFAULT_DEDUP_TTL)
    }
}

impl TryFrom<String> for DedupTtl {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        let seconds = value
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout {
                value: value.clone(),
            })?;
        Ok(Self(Duration::from_secs(seconds)))
    }
}

impl DedupTtl {
    pub fn get(&self) -> Duration {
        self.0
    }
}

/// Statsd destination, `host:port`.
#[derive(Debug, Clone)]
pub struct StatsdHost(String);

impl TryFrom<String> for StatsdHost {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self> {
        if !value.contains(':') {
            return Err(ConfigError::InvalidStatsdAddress { value });
        }
        Ok(Self(value))
    }
}

impl AsRef<str> for StatsdHost {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub http_port: HttpPort,
    pub check_timeout: CheckTimeout,
    pub dedup_capacity: DedupCapacity,
    pub dedup_ttl: DedupTtl,
    pub statsd_host: Option<StatsdHost>,
    pub metrics_prefix: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn new() -> Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            http_port: optional("MODBOT_HTTP_PORT")?,
            check_timeout: optional("MODBOT_CHECK_TIMEOUT_MS")?,
            dedup_capacity: optional("MODBOT_DEDUP_CAPACITY")?,
            dedup_ttl: optional("MODBOT_DEDUP_TTL_SECONDS")?,
            statsd_host: match std::env::var("MODBOT_STATSD_HOST") {
                Ok(value) => Some(StatsdHost::try_from(value)?),
                Err(_) => None,
            },
            metrics_prefix: std::env::var("MODBOT_METRICS_PREFIX")
                .unwrap_or_else(|_| "modbot".to_string()),
        })
    }
}

/// Parse an optional environment variable, falling back to the type's
/// default when unset.
fn optional<T>(var_name: &str) -> Result<T>
where
    T: Default + TryFrom<String, Error = ConfigError>,
{
    match std::env::var(var_name) {
        Ok(value) => T::try_from(value),
        Err(_) => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ENV_MUTEX;

    #[test]
    fn defaults_apply_without_environment() {
        let _guard = ENV_MUTEX.lock();
        unsafe {
            std::env::remove_var("MODBOT_HTTP_PORT");
            std::env::remove_var("MODBOT_CHECK_TIMEOUT_MS");
            std::env::remove_var("MODBOT_STATSD_HOST");
        }

        let config = Config::new().unwrap();
        assert_eq!(config.http_port.get(), 8080);
        assert_eq!(config.check_timeout.get(), Duration::from_millis(5000));
        assert!(config.statsd_host.is_none());
        assert_eq!(config.metrics_prefix, "modbot");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let _guard = ENV_MUTEX.lock();
        unsafe {
            std::env::set_var("MODBOT_HTTP_PORT", "seventy");
        }
        let err = Config::new().unwrap_err();
        assert!(err.to_string().contains("Invalid port number"));
        unsafe {
            std::env::remove_var("MODBOT_HTTP_PORT");
        }
    }

    #[test]
    fn zero_check_timeout_is_rejected() {
        let err = CheckTimeout::try_from("0".to_string()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout { .. }));

        let timeout = CheckTimeout::try_from("2500".to_string()).unwrap();
        assert_eq!(timeout.get(), Duration::from_millis(2500));
    }

    #[test]
    fn statsd_host_requires_port() {
        assert!(StatsdHost::try_from("localhost".to_string()).is_err());
        let host = StatsdHost::try_from("localhost:8125".to_string()).unwrap();
        assert_eq!(host.as_ref(), "localhost:8125");
    }
}
