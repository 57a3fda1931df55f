//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::ServiceSettings;

/// Secret used when `JWT_SECRET` is not set. Only suitable for local runs.
pub const DEV_JWT_SECRET: &str = "local-development-secret";

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory store when unset
/// - `JWT_SECRET`: HS256 secret for real-time identity tokens
/// - `STORE_TIMEOUT_MS`: bound on every store call (default: `5000`)
/// - `REALTIME_CHANNEL_CAPACITY`: per-room event buffer (default: `256`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub store_timeout_ms: u64,
    pub realtime_channel_capacity: usize,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT").unwrap_or(defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: non_empty_var("DATABASE_URL"),
            jwt_secret: non_empty_var("JWT_SECRET"),
            store_timeout_ms: parse_var("STORE_TIMEOUT_MS").unwrap_or(defaults.store_timeout_ms),
            realtime_channel_capacity: parse_var("REALTIME_CHANNEL_CAPACITY")
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.realtime_channel_capacity),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn jwt_secret(&self) -> &str {
        self.jwt_secret.as_deref().unwrap_or(DEV_JWT_SECRET)
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings::default().with_store_timeout(self.store_timeout())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            jwt_secret: None,
            store_timeout_ms: 5_000,
            realtime_channel_capacity: realtime::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|value| value.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
        assert_eq!(config.store_timeout(), Duration::from_secs(5));
        assert_eq!(config.realtime_channel_capacity, 256);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_jwt_secret_fallback() {
        let mut config = Config::default();
        assert_eq!(config.jwt_secret(), DEV_JWT_SECRET);

        config.jwt_secret = Some("prod".to_string());
        assert_eq!(config.jwt_secret(), "prod");
    }

    #[test]
    fn test_service_settings_use_store_timeout() {
        let config = Config {
            store_timeout_ms: 250,
            ..Config::default()
        };
        assert_eq!(
            config.service_settings().store_timeout,
            Duration::from_millis(250)
        );
    }
}
