use anyhow::Result;
use clap::Parser;
use relay_bridge::{config::Config, run_server, util, AppState};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;

/// Background relay between in-page agents and inspector panels.
#[derive(Debug, Parser)]
#[command(name = "relay-bridge", version, about)]
struct Args {
    /// Address to bind (overrides [server] host)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides [server] port)
    #[arg(long)]
    port: Option<u16>,

    /// Data directory for config and logs (default ~/.relay-bridge)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Config file to read instead of <data-dir>/config.toml
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    util::init_data_dir(args.data_dir);

    let mut config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load(),
    };
    if let Some(host) = args.host {
        config = config.with_host(host);
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }

    // Initialize logging to file (~/.relay-bridge/logs/relay-bridge.log)
    fs::create_dir_all(util::logs_dir())?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(log_file)
        .with_ansi(false) // Disable ANSI colors in log file
        .init();

    let state = AppState::from_config(&config);
    run_server(state, &config).await
}
