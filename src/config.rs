use clap::Parser;
use envconfig::Envconfig;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Where catalog media and symptom sheets live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Google,
    /// Process-local stores; nothing survives a restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(StorageBackend::Google),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend '{other}', expected 'google' or 'memory'")),
        }
    }
}

#[derive(Envconfig, Clone)]
pub struct Config {
    /// Drive folder holding one sub-folder per disease
    #[envconfig(from = "MAIN_FOLDER_ID", default = "1f3yc3sQpnMVHHxFO8fK5SQlCj1-gN3jF")]
    pub main_folder_id: String,

    /// Spreadsheet holding one sheet per user
    #[envconfig(from = "GOOGLE_SHEET_ID", default = "1UAXXlBbDZwtUuqIkRWv7rNGSmy69vLKFB65w54A1J2c")]
    pub google_sheet_id: String,

    /// Service account key, as JSON
    #[envconfig(from = "GOOGLE_CREDENTIALS_JSON", default = "")]
    pub google_credentials_json: String,

    /// Comma separated CORS origins, `*` for any
    #[envconfig(from = "ALLOWED_ORIGINS", default = "*")]
    pub allowed_origins: String,

    #[envconfig(from = "MAX_REQUESTS_PER_MINUTE", default = "60")]
    pub max_requests_per_minute: u32,

    /// Catalog cache lifetime in seconds
    #[envconfig(from = "VIDEO_CACHE_DURATION", default = "1800")]
    pub video_cache_duration_secs: u64,

    #[envconfig(from = "HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "PORT", default = "8000")]
    pub port: u16,

    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,

    /// Rate limiter and sheet lock sweep interval in seconds
    #[envconfig(from = "CLEANUP_INTERVAL", default = "300")]
    pub cleanup_interval_secs: u64,

    /// Most clients the rate limiter tracks at once
    #[envconfig(from = "RATE_LIMIT_MAX_CLIENTS", default = "10000")]
    pub rate_limit_max_clients: usize,

    /// Timeout for each Google API call in seconds
    #[envconfig(from = "BACKEND_TIMEOUT_SECS", default = "30")]
    pub backend_timeout_secs: u64,

    #[envconfig(from = "STORAGE_BACKEND", default = "google")]
    pub storage_backend: StorageBackend,

    #[envconfig(from = "CONTACT_EITAA", default = "https://eitaa.com/joinchat/6055926614C5ed07fc3f6")]
    pub contact_eitaa: String,

    #[envconfig(from = "CONTACT_PHONE", default = "021-12345678")]
    pub contact_phone: String,

    #[envconfig(from = "CONTACT_EMAIL", default = "info@example.com")]
    pub contact_email: String,

    /// Clinic address, empty when not published
    #[envconfig(from = "CONTACT_ADDRESS", default = "")]
    pub contact_address: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, envconfig::Error> {
        Config::init_from_env()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.video_cache_duration_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn has_credentials(&self) -> bool {
        !self.google_credentials_json.trim().is_empty()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("main_folder_id", &self.main_folder_id)
            .field("google_sheet_id", &self.google_sheet_id)
            .field("google_credentials_json", &if self.has_credentials() { "<redacted>" } else { "<unset>" })
            .field("allowed_origins", &self.allowed_origins)
            .field("max_requests_per_minute", &self.max_requests_per_minute)
            .field("video_cache_duration_secs", &self.video_cache_duration_secs)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("cleanup_interval_secs", &self.cleanup_interval_secs)
            .field("rate_limit_max_clients", &self.rate_limit_max_clients)
            .field("backend_timeout_secs", &self.backend_timeout_secs)
            .field("storage_backend", &self.storage_backend)
            .field("contact_eitaa", &self.contact_eitaa)
            .field("contact_phone", &self.contact_phone)
            .field("contact_email", &self.contact_email)
            .field("contact_address", &self.contact_address)
            .finish()
    }
}

/// Command line overrides for the environment configuration.
#[derive(Debug, Default, Parser)]
#[command(name = "patient-edu", version, about = "Patient education and symptom logging API")]
pub struct CliArgs {
    /// Load variables from this file instead of `.env`
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub log_level: Option<String>,

    /// `google` or `memory`
    #[arg(long)]
    pub storage: Option<StorageBackend>,
}

impl CliArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(storage) = self.storage {
            config.storage_backend = storage;
        }
    }
}
