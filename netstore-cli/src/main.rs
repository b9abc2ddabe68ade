use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use netstore_core::config::Config;
use netstore_core::core_store::payload::PayloadType;
use netstore_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use netstore_core::metrics::init_metrics;
use netstore_core::shutdown::{install_signal_handlers, ShutdownCoordinator};
use netstore_core::StorageService;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "netstore")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (TOML); NETSTORE_* environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Open the network database and keep it maintained until interrupted
    Run,
    /// Print per store statistics as JSON
    Stats,
    /// Remove expired entries from all persisted stores once
    Prune,
    /// Print the data filter this node would send to a peer
    Filter,
    /// Write the default configuration to a file
    InitConfig {
        path: PathBuf,
    },
}

#[derive(Serialize)]
struct StatsReport {
    stores: Vec<netstore_core::core_store::service::StoreStats>,
    network_database_size: u64,
}

#[derive(Serialize)]
struct FilterReport {
    entries: usize,
    known: Vec<String>,
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;

    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = PathBuf::from(shellexpand::tilde(dir).into_owned());
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(config: &Config) -> Result<()> {
    let log_config = match LogConfig::from_config(&config.logging) {
        Ok(log_config) => log_config,
        Err(e) => {
            eprintln!("{}, using 'info'", e);
            LogConfig::new(LogLevel::Info).json_format(config.logging.json_format)
        }
    };
    init_logging_with_config(log_config)?;
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let storage = Arc::new(StorageService::open(&config)?);
    let opened = storage.initialize().await?;
    info!(stores = opened, data_dir = %config.storage.data_dir.display(), "Network database ready");

    let coordinator = Arc::new(ShutdownCoordinator::new(config.shutdown_timeout));
    install_signal_handlers(coordinator.clone());
    storage.start();

    coordinator.wait_for_shutdown().await;

    let drained = coordinator
        .drain(async {
            match storage.shutdown().await {
                Ok(written) => info!(stores = written, "Final flush done"),
                Err(e) => error!(error = %e, "Final flush failed"),
            }
        })
        .await;
    if !drained {
        anyhow::bail!("shutdown did not finish within {:?}", config.shutdown_timeout);
    }
    Ok(())
}

async fn open_persisted(config: &Config) -> Result<StorageService> {
    let storage = StorageService::open(config)?;
    storage.initialize().await?;
    Ok(storage)
}

async fn stats(config: Config) -> Result<()> {
    let storage = open_persisted(&config).await?;
    let report = StatsReport {
        stores: storage.stats()?,
        network_database_size: storage.network_database_size()?,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn prune(config: Config) -> Result<()> {
    let storage = open_persisted(&config).await?;
    let removed = storage.prune_expired_all();
    let written = storage.flush_all()?;
    println!("removed {} expired entries, rewrote {} stores", removed, written);
    Ok(())
}

async fn filter(config: Config) -> Result<()> {
    let storage = open_persisted(&config).await?;
    let filter = storage.data_filter()?;
    let mut known: Vec<String> = filter
        .entries()
        .iter()
        .map(|entry| format!("{}@{}", entry.hash.to_hex(), entry.sequence_number))
        .collect();
    known.sort();
    let report = FilterReport {
        entries: filter.len(),
        known,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Command::InitConfig { path } = &args.command {
        Config::default().save_to_file(path)?;
        println!("wrote default configuration to {}", path.display());
        return Ok(());
    }

    let config = load_config(&args)?;
    init_logging(&config)?;
    if config.metrics.enabled {
        init_metrics();
    }
    info!(
        payload_types = PayloadType::ALL.len(),
        "netstore {} starting",
        env!("CARGO_PKG_VERSION")
    );

    match args.command {
        Command::Run => run(config).await,
        Command::Stats => stats(config).await,
        Command::Prune => prune(config).await,
        Command::Filter => filter(config).await,
        Command::InitConfig { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_global_overrides() {
        let args = Args::parse_from([
            "netstore",
            "stats",
            "--data-dir",
            "/tmp/netstore-test",
            "--log-level",
            "debug",
            "--json-logs",
        ]);
        assert_eq!(args.command, Command::Stats);

        let config = load_config(&args).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/netstore-test"));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_invalid_log_level_is_rejected() {
        let args = Args::parse_from(["netstore", "prune", "--log-level", "loud"]);
        assert!(load_config(&args).is_err());
    }
}
