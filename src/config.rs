//! Crate config module.
//!
//! A plain, caller-visible `Config` struct (no generalized configuration
//! framework, no file-watching, no remote config service) that reads the
//! enumerated environment variables once at process start.

use std::env;
use std::time::Duration;

/// Deployment environment. Only `Production` disables any "console instead
/// of a real provider" fallback in the (out-of-scope) collaborators this
/// crate talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Local/staging: external collaborators may fall back to stubs.
    Development,
    /// `ENVIRONMENT=production`.
    Production,
}

/// Application config, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind port.
    pub port: u16,
    /// Primary relational connection string.
    pub database_url: String,
    /// Redis address for the session store and forex pub/sub.
    pub redis_addr: String,
    /// Redis password, if the deployment requires one.
    pub redis_password: Option<String>,
    /// Credential signing key; must be at least 32 bytes.
    pub jwt_secret: String,
    /// Credential lifetime; sessions are stored with a matching TTL.
    pub jwt_expiry: Duration,
    /// Margin-level floor, in percent, below which contracts are liquidated.
    pub liquidation_threshold: rust_decimal::Decimal,
    /// How long a `/ws` connection's writer may block on a single send
    /// before the connection is treated as stalled and torn down.
    pub ws_write_deadline: Duration,
    /// `production` / anything else.
    pub environment: Environment,
}

/// Error building a [`Config`] from the environment.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing required environment variable `{0}`")]
    Missing(&'static str),
    /// A variable was set but could not be parsed into its expected type.
    #[error("environment variable `{0}` has an invalid value")]
    Invalid(&'static str),
    /// `JWT_SECRET` is set but shorter than the required 32-byte floor.
    #[error("JWT_SECRET must be at least 32 bytes")]
    WeakSecret,
}

fn var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn var_or(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_owned())
}

impl Config {
    /// Build a [`Config`] from the process environment.
    ///
    /// # Errors
    ///
    /// Will return `Err` if a required variable is missing, or if a present
    /// variable cannot be parsed into its expected type.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = var_or("PORT", "8080")
            .parse()
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let database_url = var("DATABASE_URL")?;
        let redis_addr = var("REDIS_ADDR")?;
        let redis_password = env::var("REDIS_PASSWORD").ok();

        let jwt_secret = var("JWT_SECRET")?;
        if jwt_secret.len() < 32 {
            return Err(ConfigError::WeakSecret);
        }

        let jwt_expiry_hours: u64 = var_or("JWT_EXPIRY_HOURS", "24")
            .parse()
            .map_err(|_| ConfigError::Invalid("JWT_EXPIRY_HOURS"))?;

        let liquidation_threshold = var_or("LIQUIDATION_THRESHOLD", "50")
            .parse()
            .map_err(|_| ConfigError::Invalid("LIQUIDATION_THRESHOLD"))?;

        let ws_write_deadline_ms: u64 = var_or("WS_WRITE_DEADLINE_MS", "5000")
            .parse()
            .map_err(|_| ConfigError::Invalid("WS_WRITE_DEADLINE_MS"))?;

        let environment = match var_or("ENVIRONMENT", "development").as_str() {
            "production" => Environment::Production,
            _ => Environment::Development,
        };

        Ok(Self {
            port,
            database_url,
            redis_addr,
            redis_password,
            jwt_secret,
            jwt_expiry: Duration::from_secs(jwt_expiry_hours * 3600),
            liquidation_threshold,
            ws_write_deadline: Duration::from_millis(ws_write_deadline_ms),
            environment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(vars: &[(&str, &str)]) {
        for (k, v) in vars {
            env::set_var(k, v);
        }
    }

    #[test]
    fn rejects_short_jwt_secret() {
        set(&[
            ("DATABASE_URL", "postgres://localhost/test"),
            ("REDIS_ADDR", "localhost:6379"),
            ("JWT_SECRET", "too-short"),
        ]);

        assert!(matches!(Config::from_env(), Err(ConfigError::WeakSecret)));
    }

    #[test]
    fn defaults_liquidation_threshold_to_fifty() {
        set(&[
            ("DATABASE_URL", "postgres://localhost/test"),
            ("REDIS_ADDR", "localhost:6379"),
            ("JWT_SECRET", "0123456789abcdef0123456789abcdef"),
        ]);
        env::remove_var("LIQUIDATION_THRESHOLD");

        let config = Config::from_env().expect("config should build");
        assert_eq!(config.liquidation_threshold, rust_decimal::Decimal::from(50));
    }
}
