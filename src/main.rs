use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use std::{fmt::Debug, path::PathBuf};
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
use config::{AppConfig, CliConfig, FileConfig};

mod queue;
use queue::{QueueManager, SqliteJobStore};

mod server;
use server::{run_server, RequestsLoggingLevel};

mod sqlite_persistence;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the SQLite job database.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 3002)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Number of days to retain audit log entries before pruning. Set to 0 to disable pruning.
    #[clap(long, default_value_t = 90)]
    pub audit_retention_days: u64,

    /// Interval in hours between pruning runs. Only used if audit_retention_days > 0.
    #[clap(long, default_value_t = 24)]
    pub prune_interval_hours: u64,

    /// Interval in seconds between queue depth gauge refreshes.
    #[clap(long, default_value_t = 60)]
    pub stats_refresh_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        port: cli_args.port,
        metrics_port: cli_args.metrics_port,
        logging_level: cli_args.logging_level.clone(),
        audit_retention_days: cli_args.audit_retention_days,
        prune_interval_hours: cli_args.prune_interval_hours,
        stats_refresh_secs: cli_args.stats_refresh_secs,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!(
        "Opening SQLite job database at {:?}...",
        config.jobs_db_path()
    );
    let job_store = Arc::new(SqliteJobStore::new(config.jobs_db_path())?);

    // Initialize metrics system
    info!("Initializing metrics...");
    server::metrics::init_metrics();

    let queue_manager = Arc::new(QueueManager::new(job_store));

    // Spawn background task for audit log pruning if enabled
    if config.audit_retention_days > 0 {
        let retention_days = config.audit_retention_days;
        let interval_hours = config.prune_interval_hours;
        let pruning_manager = queue_manager.clone();

        info!(
            "Audit log pruning enabled: retaining {} days, pruning every {} hours",
            retention_days, interval_hours
        );

        tokio::spawn(async move {
            let interval = Duration::from_secs(interval_hours * 60 * 60);
            let mut ticker = tokio::time::interval(interval);

            // Skip the first immediate tick, wait for the first interval
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let cutoff = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap()
                    .as_secs() as i64
                    - (retention_days as i64 * 24 * 60 * 60);

                match pruning_manager.prune_audit_log(cutoff) {
                    Ok(count) => {
                        if count > 0 {
                            info!("Pruned {} old audit log entries", count);
                            server::metrics::record_audit_entries_pruned(count);
                        }
                    }
                    Err(e) => {
                        error!("Failed to prune audit log: {}", e);
                    }
                }
            }
        });
    }

    // Spawn background task that keeps the queue depth gauges current
    {
        let stats_manager = queue_manager.clone();
        let refresh_secs = config.stats_refresh_secs;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(refresh_secs));

            loop {
                ticker.tick().await;

                match stats_manager.queue_stats() {
                    Ok(stats) => server::metrics::set_queue_depth(&stats),
                    Err(e) => error!("Failed to refresh queue stats: {}", e),
                }
            }
        });
    }

    info!("Ready to serve at port {}!", config.port);
    info!("Metrics available at port {}!", config.metrics_port);
    run_server(
        queue_manager,
        config.logging_level,
        config.port,
        config.metrics_port,
    )
    .await
}
