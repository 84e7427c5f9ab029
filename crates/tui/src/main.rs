mod app;

use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    time::Duration,
};

use anyhow::Result;
use clap::Parser;
use etaboard_core::{
    config::{self, AppConfig, Credentials},
    fetch::Endpoints,
    Board, ChannelSink, HttpTransport, RefreshCycle, Registry, Scheduler,
};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "etaboard")]
#[command(about = "Full-screen transit arrival and bike-share board")]
struct Args {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single refresh, print the board to stdout and exit
    #[arg(long)]
    once: bool,

    /// Close the board after this many seconds
    #[arg(short, long)]
    duration: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;

    let config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => {
            config::ensure_default_config()?;
            AppConfig::load()?
        }
    };
    let credentials = Credentials::from_env()?;

    let registry = Registry::from_entities(config.entities.clone())?;
    let transport = HttpTransport::new(config.request_timeout())?;
    let mut cycle = RefreshCycle::new(
        registry,
        transport,
        credentials,
        Endpoints::from(&config),
        config.zone()?,
    );

    if args.once {
        let mut board = Board::new(cycle.registry());
        cycle.run_once(&mut board).await?;
        for entry in board.entries() {
            println!("{}: {}", entry.entity.label, entry.text);
        }
        return Ok(());
    }

    let board = Board::new(cycle.registry());
    let (sink, update_rx) = ChannelSink::channel();
    let run_for = args
        .duration
        .map(Duration::from_secs)
        .or(config.display_duration());
    let scheduler = Scheduler::new(cycle, sink, config.refresh_interval()).run_for(run_for);

    let mut app = app::EtaBoardApp::new(board, scheduler.handle());
    app.attach_updates(update_rx);

    let refresh_task = tokio::spawn(async move {
        let reason = scheduler.run().await;
        info!(?reason, "Refresh loop stopped");
    });

    let result = app.run().await;
    refresh_task.abort();
    result
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("etaboard.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // The board owns the terminal, so logs only go to the file.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(std::sync::Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
