//! Cart subsystem configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TIDEPOOL_CART_API_URL` - Base URL of the remote cart service
//!
//! ## Optional
//! - `TIDEPOOL_CART_STORAGE_DIR` - Root directory for the durable local
//!   replica (default: ./data)
//! - `TIDEPOOL_CART_DEBOUNCE_MS` - Quiet window for coalescing replica
//!   writes (default: 300)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart subsystem configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Base URL of the remote cart service
    pub api_url: Url,
    /// Root directory for the durable local replica
    pub storage_dir: PathBuf,
    /// Quiet window for coalescing replica writes
    pub debounce: Duration,
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = get_required_env("TIDEPOOL_CART_API_URL")?
            .parse::<Url>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("TIDEPOOL_CART_API_URL".to_string(), e.to_string())
            })?;
        let storage_dir = PathBuf::from(get_env_or_default("TIDEPOOL_CART_STORAGE_DIR", "./data"));
        let debounce_ms = get_env_or_default("TIDEPOOL_CART_DEBOUNCE_MS", "300")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("TIDEPOOL_CART_DEBOUNCE_MS".to_string(), e.to_string())
            })?;

        Ok(Self {
            api_url,
            storage_dir,
            debounce: Duration::from_millis(debounce_ms),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
