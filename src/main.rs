use anyhow::{Context, Result};
use clap::Parser;
use patient_edu::config::{CliArgs, Config};
use patient_edu::config_validator::ConfigValidator;
use patient_edu::server::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Load environment variables from the chosen file, `.env` by default
    match &args.env_file {
        Some(path) => {
            dotenv::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => {
            dotenv::dotenv().ok();
        }
    }

    let mut config = Config::from_env().context("Failed to load configuration")?;
    args.apply(&mut config);
    ConfigValidator::validate(&config)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("patient_edu={},tower_http=debug", config.log_level.to_lowercase()).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting patient education service");
    tracing::info!(
        bind_address = %config.bind_address(),
        storage = ?config.storage_backend,
        max_requests_per_minute = config.max_requests_per_minute,
        cache_ttl_secs = config.video_cache_duration_secs,
        "Configuration loaded"
    );
    if !config.has_credentials() {
        tracing::warn!("GOOGLE_CREDENTIALS_JSON is not set, Google backends will report errors");
    }

    Server::new(config).run().await.context("Server error")?;

    Ok(())
}
