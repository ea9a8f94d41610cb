use crate::domain::value_objects::cartoletas::Cartoletas;
use crate::infrastructure::rest_backend::RestBackendConfig;
use crate::persistence::DatabaseConfig;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Where players, balances, rounds and lineups come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Sqlite,
    Rest,
    Memory,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(BackendKind::Sqlite),
            "rest" => Ok(BackendKind::Rest),
            "memory" => Ok(BackendKind::Memory),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set when MARKET_BACKEND=rest")]
    MissingVariable(&'static str),
}

#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub backend: BackendKind,
    pub database: DatabaseConfig,
    /// Present only for the REST backend
    pub rest: Option<RestBackendConfig>,
    pub bind_addr: SocketAddr,
    /// Balance credited to newly registered users
    pub initial_budget: Cartoletas,
    /// JSON seed for the in-memory backend
    pub fixture_path: Option<String>,
    /// Open sessions untouched this long are dropped
    pub session_idle_timeout: Duration,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            database: DatabaseConfig::default(),
            rest: None,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            initial_budget: Cartoletas::from_cents(10_000),
            fixture_path: None,
            session_idle_timeout: Duration::from_secs(DEFAULT_SESSION_IDLE_TIMEOUT_SECS),
        }
    }
}

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 30 * 60;

/// Parse `raw`, or warn and keep `default`
fn parse_or<T>(key: &str, raw: Option<String>, default: T, valid: impl Fn(&T) -> bool) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        Ok(value) => {
            tracing::warn!(
                "Invalid {} value: {}, using default: {}",
                key,
                value,
                default
            );
            default
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse {} '{}': {}, using default: {}",
                key,
                raw,
                e,
                default
            );
            default
        }
    }
}

impl MarketConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<MarketConfig, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<MarketConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = MarketConfig::default();

        let backend = match lookup("MARKET_BACKEND") {
            Some(raw) => raw.parse::<BackendKind>().unwrap_or_else(|e| {
                tracing::warn!("Invalid MARKET_BACKEND: {}, using default: sqlite", e);
                defaults.backend
            }),
            None => defaults.backend,
        };

        let db_defaults = DatabaseConfig::default();
        let database = DatabaseConfig {
            url: lookup("DATABASE_URL").unwrap_or(db_defaults.url),
            max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                lookup("DATABASE_MAX_CONNECTIONS"),
                db_defaults.max_connections,
                |v| *v > 0,
            ),
            log_queries: parse_or(
                "DATABASE_LOG_QUERIES",
                lookup("DATABASE_LOG_QUERIES"),
                db_defaults.log_queries,
                |_| true,
            ),
        };

        let timeout_ms = parse_or(
            "REQUEST_TIMEOUT_MS",
            lookup("REQUEST_TIMEOUT_MS"),
            DEFAULT_REQUEST_TIMEOUT_MS,
            |v| *v > 0,
        );

        let rest = if backend == BackendKind::Rest {
            let base_url = lookup("BACKEND_URL").ok_or(ConfigError::MissingVariable("BACKEND_URL"))?;
            let anon_key =
                lookup("BACKEND_ANON_KEY").ok_or(ConfigError::MissingVariable("BACKEND_ANON_KEY"))?;
            Some(RestBackendConfig {
                base_url,
                anon_key,
                access_token: lookup("BACKEND_ACCESS_TOKEN").filter(|t| !t.is_empty()),
                timeout: Duration::from_millis(timeout_ms),
            })
        } else {
            None
        };

        let bind_addr = parse_or("BIND_ADDR", lookup("BIND_ADDR"), defaults.bind_addr, |_| true);

        let initial_budget = parse_or(
            "INITIAL_BUDGET",
            lookup("INITIAL_BUDGET"),
            defaults.initial_budget,
            |v: &Cartoletas| !v.is_negative(),
        );

        let idle_secs = parse_or(
            "SESSION_IDLE_TIMEOUT_SECS",
            lookup("SESSION_IDLE_TIMEOUT_SECS"),
            DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
            |v| *v > 0,
        );

        Ok(MarketConfig {
            backend,
            database,
            rest,
            bind_addr,
            initial_budget,
            fixture_path: lookup("MARKET_FIXTURE"),
            session_idle_timeout: Duration::from_secs(idle_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<MarketConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MarketConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.database.url, "sqlite://data/cartola.db");
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.initial_budget, Cartoletas::from_cents(10_000));
        assert!(config.rest.is_none());
        assert_eq!(config.session_idle_timeout, Duration::from_secs(1800));
    }

    #[test]
    fn test_rest_backend_requires_url_and_key() {
        let err = config_from(&[("MARKET_BACKEND", "rest")]).unwrap_err();
        assert_eq!(err, ConfigError::MissingVariable("BACKEND_URL"));

        let config = config_from(&[
            ("MARKET_BACKEND", "REST"),
            ("BACKEND_URL", "https://project.supabase.co"),
            ("BACKEND_ANON_KEY", "anon"),
            ("REQUEST_TIMEOUT_MS", "2500"),
        ])
        .unwrap();
        let rest = config.rest.unwrap();
        assert_eq!(rest.anon_key, "anon");
        assert!(rest.access_token.is_none());
        assert_eq!(rest.timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = config_from(&[
            ("MARKET_BACKEND", "postgres"),
            ("DATABASE_MAX_CONNECTIONS", "0"),
            ("BIND_ADDR", "localhost"),
            ("INITIAL_BUDGET", "-5"),
            ("SESSION_IDLE_TIMEOUT_SECS", "0"),
        ])
        .unwrap();
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.initial_budget, Cartoletas::from_cents(10_000));
        assert_eq!(config.session_idle_timeout, Duration::from_secs(1800));
    }

    #[test]
    fn test_initial_budget_is_parsed_as_decimal() {
        let config = config_from(&[("INITIAL_BUDGET", "150.256"), ("MARKET_BACKEND", "memory")])
            .unwrap();
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.initial_budget, Cartoletas::from_cents(15_026));
    }
}
