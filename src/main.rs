use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use secret_broker::observability::{init_logging, LogFormat, LoggingConfig};
use secret_broker::{Config, Manager, VERSION};

#[derive(Parser)]
#[command(name = "secret-broker")]
#[command(about = "Read secrets from env, Vault, AWS Secrets Manager or Kubernetes")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log output format (text or json); overrides SECRETS_LOG_FORMAT
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the value of a secret
    Get {
        key: String,

        /// Print the full secret envelope as JSON
        #[arg(long)]
        metadata: bool,
    },
    /// List the keys the configured backend exposes
    List,
    /// Probe the configured backend; exits non-zero when unreachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (optional - won't fail if missing)
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env()?;
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    init_logging(&logging)?;

    let config = Config::from_env().context("failed to load secrets configuration")?;
    tracing::info!(version = VERSION, provider = %config.provider, "Starting secret-broker");

    let mut manager = Manager::new(config).await.context("failed to initialize provider")?;
    let outcome = run(&manager, cli.command).await;
    manager.close().await?;

    if !outcome? {
        std::process::exit(1);
    }
    Ok(())
}

/// Runs one command; `Ok(false)` means the backend is unhealthy.
async fn run(manager: &Manager, command: Command) -> Result<bool> {
    match command {
        Command::Get { key, metadata: false } => {
            let value =
                manager.get(&key).await.with_context(|| format!("failed to read '{}'", key))?;
            println!("{}", value);
        }
        Command::Get { key, metadata: true } => {
            let secret = manager
                .get_with_metadata(&key)
                .await
                .with_context(|| format!("failed to read '{}'", key))?;
            let envelope = json!({
                "key": secret.key,
                "value": secret.expose(),
                "version": secret.version,
                "created_at": secret.created_at,
                "metadata": secret.metadata,
            });
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
        Command::List => {
            let mut keys = manager.list().await.context("failed to list secrets")?;
            keys.sort();
            for key in keys {
                println!("{}", key);
            }
        }
        Command::Health => {
            let healthy = manager.healthy().await;
            let status = if healthy { "healthy" } else { "unhealthy" };
            println!("{}: {}", manager.provider_name(), status);
            return Ok(healthy);
        }
    }
    Ok(true)
}
