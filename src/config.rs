use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::attendance::MissingStatusPolicy;
use crate::rate_limit::RateLimitConfig;

pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("JWT_SECRET must be at least {MIN_SECRET_LEN} characters long")]
    WeakSecret,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub frontend_url: String,
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub upload_max_bytes: usize,
    pub rate_limit: RateLimitConfig,
    pub missing_status: MissingStatusPolicy,
    pub database_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            port: 8080,
            frontend_url: "http://localhost:5173".into(),
            data_dir: PathBuf::from("data"),
            upload_dir: PathBuf::from("data/uploads"),
            upload_max_bytes: 10 * 1024 * 1024,
            rate_limit: RateLimitConfig::default(),
            missing_status: MissingStatusPolicy::default(),
            database_url: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        validate_secret()?;
        let d = Self::default();
        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or(d.bind_addr),
            port: try_load("PORT", d.port),
            frontend_url: env::var("FRONTEND_URL").unwrap_or(d.frontend_url),
            data_dir: env::var("FORMDESK_DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            upload_dir: env::var("UPLOAD_DIR").map(PathBuf::from).unwrap_or(d.upload_dir),
            upload_max_bytes: try_load("UPLOAD_MAX_BYTES", d.upload_max_bytes),
            rate_limit: RateLimitConfig {
                submit_limit: try_load("RL_SUBMIT_LIMIT", d.rate_limit.submit_limit),
                submit_window: Duration::from_secs(try_load(
                    "RL_SUBMIT_WINDOW",
                    d.rate_limit.submit_window.as_secs(),
                )),
                ..d.rate_limit
            },
            missing_status: match env::var("ATTENDANCE_MISSING_STATUS") {
                Ok(v) => MissingStatusPolicy::parse(&v).unwrap_or_else(|| {
                    warn!("Invalid ATTENDANCE_MISSING_STATUS value {v:?}, using default");
                    d.missing_status
                }),
                Err(_) => d.missing_status,
            },
            database_url: env::var("DATABASE_URL").ok(),
        })
    }
}

fn validate_secret() -> Result<(), ConfigError> {
    let secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
    if secret.len() < MIN_SECRET_LEN {
        return Err(ConfigError::WeakSecret);
    }
    Ok(())
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}; using default {default}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn short_secret_is_rejected() {
        env::set_var("JWT_SECRET", "short");
        assert!(matches!(AppConfig::from_env(), Err(ConfigError::WeakSecret)));
        env::remove_var("JWT_SECRET");
        assert!(matches!(AppConfig::from_env(), Err(ConfigError::Missing("JWT_SECRET"))));
    }

    #[test]
    #[serial_test::serial]
    fn bad_values_fall_back_to_defaults() {
        env::set_var("JWT_SECRET", "0123456789abcdef0123456789abcdef");
        env::set_var("PORT", "not-a-port");
        env::set_var("RL_SUBMIT_LIMIT", "3");
        env::set_var("ATTENDANCE_MISSING_STATUS", "exclude");
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.rate_limit.submit_limit, 3);
        assert_eq!(cfg.missing_status, MissingStatusPolicy::Exclude);
        for k in ["PORT", "RL_SUBMIT_LIMIT", "ATTENDANCE_MISSING_STATUS"] {
            env::remove_var(k);
        }
    }
}
