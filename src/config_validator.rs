use thiserror::Error;

use crate::config::{Config, StorageBackend};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Configuration error: {0}")]
pub struct ConfigError(pub String);

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validates configuration objects for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_server(&config.host, config.port)?;
        Self::validate_rate_limit(config.max_requests_per_minute, config.rate_limit_max_clients)?;
        Self::validate_log_level(&config.log_level)?;
        Self::validate_origins(&config.allowed_origins())?;

        if config.video_cache_duration_secs == 0 {
            return Err(ConfigError("VIDEO_CACHE_DURATION must be greater than 0".to_string()));
        }
        if config.cleanup_interval_secs == 0 {
            return Err(ConfigError("CLEANUP_INTERVAL must be greater than 0".to_string()));
        }
        if config.backend_timeout_secs == 0 {
            return Err(ConfigError("BACKEND_TIMEOUT_SECS must be greater than 0".to_string()));
        }

        if config.storage_backend == StorageBackend::Google {
            if config.main_folder_id.trim().is_empty() {
                return Err(ConfigError("MAIN_FOLDER_ID cannot be empty".to_string()));
            }
            if config.google_sheet_id.trim().is_empty() {
                return Err(ConfigError("GOOGLE_SHEET_ID cannot be empty".to_string()));
            }
        }

        Ok(())
    }

    /// Validates server configuration parameters
    pub fn validate_server(host: &str, port: u16) -> Result<(), ConfigError> {
        if host.trim().is_empty() {
            return Err(ConfigError("Server host cannot be empty".to_string()));
        }
        if port == 0 {
            return Err(ConfigError("Server port must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn validate_rate_limit(max_per_minute: u32, max_clients: usize) -> Result<(), ConfigError> {
        if max_per_minute == 0 {
            return Err(ConfigError("MAX_REQUESTS_PER_MINUTE must be greater than 0".to_string()));
        }
        if max_clients == 0 {
            return Err(ConfigError("RATE_LIMIT_MAX_CLIENTS must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn validate_log_level(level: &str) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
            return Err(ConfigError(format!(
                "Invalid log level '{}'. Must be one of: {:?}",
                level, LOG_LEVELS
            )));
        }
        Ok(())
    }

    /// Origins must be `*` or absolute http(s) URLs.
    pub fn validate_origins(origins: &[String]) -> Result<(), ConfigError> {
        if origins.is_empty() {
            return Err(ConfigError("ALLOWED_ORIGINS cannot be empty".to_string()));
        }
        for origin in origins {
            if origin != "*" && !origin.starts_with("http://") && !origin.starts_with("https://") {
                return Err(ConfigError(format!(
                    "Invalid origin '{origin}'. Must be '*' or start with 'http://' or 'https://'"
                )));
            }
        }
        Ok(())
    }
}
