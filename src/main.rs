use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use dealflow_notify::config;
use dealflow_notify::notifications::NotificationGenerator;
use dealflow_notify::source;

#[derive(Debug, Parser)]
#[command(author, version, about = "Print the notification feed as JSON")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Override `app.timelines`
    #[arg(long)]
    timelines: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let timelines_path = args
        .timelines
        .clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.app.timelines));
    let generator = NotificationGenerator::new(source::open(&cfg).await?, cfg.app.settings());

    if cfg.app.refresh_interval_secs == 0 {
        return run_once(&generator, &timelines_path, args.pretty).await;
    }

    info!(
        every_secs = cfg.app.refresh_interval_secs,
        "starting notification refresh loop"
    );
    let mut ticker = tokio::time::interval(Duration::from_secs(cfg.app.refresh_interval_secs));
    loop {
        ticker.tick().await;
        // Timelines are owned elsewhere and may change between ticks.
        if let Err(err) = run_once(&generator, &timelines_path, args.pretty).await {
            error!(?err, "refresh failed");
        }
    }
}

async fn run_once(generator: &NotificationGenerator, timelines: &Path, pretty: bool) -> Result<()> {
    let timelines = config::load_timelines(timelines)
        .with_context(|| format!("failed to load timelines from {}", timelines.display()))?;
    let notifications = generator.generate(&timelines).await;
    info!(
        companies = timelines.len(),
        notifications = notifications.len(),
        "generated notifications"
    );
    let out = if pretty {
        serde_json::to_string_pretty(&notifications)?
    } else {
        serde_json::to_string(&notifications)?
    };
    println!("{out}");
    Ok(())
}
