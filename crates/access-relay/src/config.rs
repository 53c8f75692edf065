//! Configuration management for the Access Relay
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use zk_gateway_common::SignalSchema;

/// Where the nullifier store and endpoint registry keep their state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// JSON / JSON-lines files under `DATA_DIR`
    File,
    /// Redis at `REDIS_URL`
    Redis,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "redis" => Ok(StorageBackend::Redis),
            other => anyhow::bail!("Unknown STORAGE_BACKEND '{}' (expected file or redis)", other),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Storage backend for nullifiers and endpoint mappings
    pub storage_backend: StorageBackend,

    /// Directory for file-backed state and the audit log
    pub data_dir: PathBuf,

    /// Redis URL, used when `storage_backend` is Redis
    pub redis_url: String,

    /// snarkjs verification key for the access circuit
    pub verification_key_path: PathBuf,

    /// Upstream URLs the relay may forward to
    pub allowed_targets: Vec<String>,

    /// Token guarding the registry admin routes
    pub admin_token: Option<String>,

    /// Timeout for forwarded upstream calls
    pub upstream_timeout: Duration,

    /// Circuit artifacts served under `/circuits`
    pub circuits_dir: Option<PathBuf>,

    /// Layout version of the public signal vector
    pub signal_schema_version: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let config = Config {
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),

            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .context("Invalid API_PORT")?,

            storage_backend: env::var("STORAGE_BACKEND")
                .unwrap_or_else(|_| "file".to_string())
                .parse()?,

            data_dir: env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),

            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),

            verification_key_path: env::var("VERIFICATION_KEY_PATH")
                .unwrap_or_else(|_| "./circuits/verification_key.json".to_string())
                .into(),

            allowed_targets: parse_targets(&env::var("ALLOWED_TARGETS").unwrap_or_default()),

            admin_token: env::var("ADMIN_TOKEN")
                .ok()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),

            upstream_timeout: Duration::from_secs(
                env::var("UPSTREAM_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .context("Invalid UPSTREAM_TIMEOUT_SECS")?,
            ),

            circuits_dir: env::var("CIRCUITS_DIR").ok().map(PathBuf::from),

            signal_schema_version: env::var("SIGNAL_SCHEMA_VERSION")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .context("Invalid SIGNAL_SCHEMA_VERSION")?,
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }

        if self.upstream_timeout.is_zero() {
            anyhow::bail!("UPSTREAM_TIMEOUT_SECS must be greater than 0");
        }

        self.signal_schema()?;

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    /// The configured public-signal layout
    pub fn signal_schema(&self) -> Result<SignalSchema> {
        SignalSchema::for_version(self.signal_schema_version)
            .context("Invalid SIGNAL_SCHEMA_VERSION")
    }

    pub fn nullifier_path(&self) -> PathBuf {
        self.data_dir.join("nullifiers.jsonl")
    }

    pub fn endpoints_path(&self) -> PathBuf {
        self.data_dir.join("endpoints.json")
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.data_dir.join("access-log.jsonl")
    }
}

fn parse_targets(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            api_host: "127.0.0.1".to_string(),
            api_port: 9000,
            storage_backend: StorageBackend::File,
            data_dir: PathBuf::from("./data"),
            redis_url: "redis://localhost:6379".to_string(),
            verification_key_path: PathBuf::from("./vk.json"),
            allowed_targets: vec![],
            admin_token: None,
            upstream_timeout: Duration::from_secs(30),
            circuits_dir: None,
            signal_schema_version: 1,
        }
    }

    #[test]
    fn test_api_address() {
        assert_eq!(test_config().api_address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_validate_invalid_port() {
        let config = Config {
            api_port: 0,
            ..test_config()
        };

        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("API_PORT must be greater than 0"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = Config {
            upstream_timeout: Duration::ZERO,
            ..test_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_unknown_schema() {
        let config = Config {
            signal_schema_version: 9,
            ..test_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_targets() {
        assert_eq!(
            parse_targets(" https://a.test/x, ,http://localhost:3000/echo ,"),
            vec!["https://a.test/x", "http://localhost:3000/echo"]
        );
        assert!(parse_targets("").is_empty());
    }

    #[test]
    fn test_storage_backend_parse() {
        assert_eq!("file".parse::<StorageBackend>().unwrap(), StorageBackend::File);
        assert_eq!("Redis".parse::<StorageBackend>().unwrap(), StorageBackend::Redis);
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_state_paths() {
        let config = test_config();
        assert_eq!(config.nullifier_path(), PathBuf::from("./data/nullifiers.jsonl"));
        assert_eq!(config.endpoints_path(), PathBuf::from("./data/endpoints.json"));
    }
}
