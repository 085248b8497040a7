use std::env;
use std::path::PathBuf;

use thiserror::Error;

/// Deployment stage. Only production dispatches email on "send".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            _ => Self::Development,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StoreBackend {
    Http,
    Postgres,
}

impl StoreBackend {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "postgres" | "pg" => Ok(Self::Postgres),
            other => Err(ConfigError::InvalidStore(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub store: StoreBackend,
    pub api_url: Option<String>,
    pub database_url: Option<String>,
    pub data_dir: PathBuf,
    pub log_level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("CHECKLIST_ENV").unwrap_or_else(|_| "development".to_string()),
        );
        let store = StoreBackend::from_str(
            &env::var("CHECKLIST_STORE").unwrap_or_else(|_| "http".to_string()),
        )?;

        let api_url = non_empty_var("CHECKLIST_API_URL");
        if let Some(url) = &api_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidApiUrl(url.clone()));
            }
        }

        Ok(Self {
            environment,
            store,
            api_url,
            database_url: non_empty_var("DATABASE_URL"),
            data_dir: PathBuf::from(
                env::var("CHECKLIST_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            ),
            log_level: env::var("CHECKLIST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("CHECKLIST_STORE must be http or postgres, got {0}")]
    InvalidStore(String),
    #[error("CHECKLIST_API_URL must be an http(s) URL, got {0}")]
    InvalidApiUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("CHECKLIST_ENV");
        env::remove_var("CHECKLIST_STORE");
        env::remove_var("CHECKLIST_API_URL");
        env::remove_var("DATABASE_URL");
        env::remove_var("CHECKLIST_DATA_DIR");
        env::remove_var("CHECKLIST_LOG_LEVEL");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.store, StoreBackend::Http);
        assert_eq!(config.api_url, None);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn production_and_postgres_are_recognized() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("CHECKLIST_ENV", "PROD");
        env::set_var("CHECKLIST_STORE", "postgres");
        env::set_var("DATABASE_URL", "postgres://localhost/checklist");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.environment, AppEnvironment::Production);
        assert_eq!(config.store, StoreBackend::Postgres);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/checklist")
        );
        reset_env();
    }

    #[test]
    fn rejects_unknown_store_and_bad_url() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("CHECKLIST_STORE", "sheets");
        assert_eq!(
            AppConfig::load().unwrap_err(),
            ConfigError::InvalidStore("sheets".to_string())
        );
        reset_env();
        env::set_var("CHECKLIST_API_URL", "ftp://example.com");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidApiUrl(_))
        ));
        reset_env();
    }
}
