use clap::Parser;
use pkg_constants::controller::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_MAX_SECS, DEFAULT_RECONCILE_TIMEOUT_SECS,
    DEFAULT_RESYNC_INTERVAL_SECS,
};
use pkg_constants::paths::{DEFAULT_CONTROLLER_CONFIG, DEFAULT_DATA_DIR};
use pkg_controllers::queue::Backoff;
use pkg_controllers::{AppServiceController, ControllerConfig};
use pkg_state::Registry;
use pkg_state::client::StateStore;
use pkg_types::config::{ControllerConfigFile, LogFormat, load_config_file};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "appservice-controller",
    about = "Reconciles AppServices into Deployments and Services"
)]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_CONTROLLER_CONFIG)]
    config: String,

    /// Directory for SlateDB state storage
    #[arg(long)]
    data_dir: Option<String>,

    /// Keep all state in memory
    #[arg(long)]
    in_memory: bool,

    /// Seconds between full resyncs
    #[arg(long)]
    resync_interval_secs: Option<u64>,

    /// Upper bound on one reconciliation, in seconds
    #[arg(long)]
    reconcile_timeout_secs: Option<u64>,

    /// Log filter, e.g. `info` or `pkg_controllers=debug`
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config file (returns defaults if file not found)
    let file_cfg: ControllerConfigFile = load_config_file(&cli.config)?;

    // Merge: CLI args > config file > defaults
    let log_level = cli
        .log_level
        .or(file_cfg.log_level)
        .unwrap_or_else(|| "info".to_string());
    let log_format = if cli.json_logs {
        LogFormat::Json
    } else {
        file_cfg.log_format.unwrap_or_default()
    };
    init_logging(&log_level, log_format);
    info!("Config file: {}", cli.config);

    let in_memory = cli.in_memory || file_cfg.in_memory.unwrap_or(false);
    let data_dir = cli
        .data_dir
        .or(file_cfg.data_dir)
        .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
    let config = ControllerConfig {
        resync_interval: Duration::from_secs(
            cli.resync_interval_secs
                .or(file_cfg.resync_interval_secs)
                .unwrap_or(DEFAULT_RESYNC_INTERVAL_SECS),
        ),
        reconcile_timeout: Duration::from_secs(
            cli.reconcile_timeout_secs
                .or(file_cfg.reconcile_timeout_secs)
                .unwrap_or(DEFAULT_RECONCILE_TIMEOUT_SECS),
        ),
        backoff: Backoff {
            base: Duration::from_millis(file_cfg.backoff_base_ms.unwrap_or(DEFAULT_BACKOFF_BASE_MS)),
            max: Duration::from_secs(file_cfg.backoff_max_secs.unwrap_or(DEFAULT_BACKOFF_MAX_SECS)),
        },
    };

    info!("Starting appservice-controller");
    if in_memory {
        info!("  Storage:   in-memory");
    } else {
        info!("  Data dir:  {}", data_dir);
    }
    info!("  Resync:    {:?}", config.resync_interval);
    info!("  Timeout:   {:?}", config.reconcile_timeout);

    let store = if in_memory {
        StateStore::in_memory().await?
    } else {
        StateStore::new(&data_dir).await?
    };
    let registry = Registry::new(store);

    let shutdown = CancellationToken::new();
    let handle = AppServiceController::new(registry.clone(), config, shutdown.clone()).start();

    // Block until Ctrl-C
    info!("Controller is running. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down appservice-controller");
    shutdown.cancel();
    handle.await?;

    registry.into_store().close().await?;
    Ok(())
}
