use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::{WrapErr, eyre};
use proctally::config::{Config, load_config, load_config_from_path};
use proctally::engine::{Engine, IngestError, Metric, TickReport, unix_millis};
use proctally::event::{Event, EventHandler};
use proctally::logging;
use proctally::report;
use proctally::snapshot::{ProviderError, SnapshotProvider};
use proctally::system::{Collector, Recorder, ReplayProvider};

#[derive(Parser)]
#[command(
    name = "proctally",
    about = "Lifetime per-process resource rollups with top-N reports"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Refresh rate in milliseconds
    #[arg(long)]
    refresh_rate: Option<u64>,

    /// Ranking metric: cpu, memory, disk-read, disk-write, avg-cpu
    #[arg(long)]
    metric: Option<String>,

    /// Number of processes per report
    #[arg(long)]
    top: Option<usize>,

    /// Replay ticks from a JSON-lines capture instead of sampling live.
    #[arg(long, conflicts_with = "record")]
    replay: Option<PathBuf>,

    /// Append every live tick to a JSON-lines capture.
    #[arg(long)]
    record: Option<PathBuf>,

    /// Stop after this many committed ticks.
    #[arg(long)]
    ticks: Option<u64>,

    /// Emit logs as JSON lines.
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

struct Settings {
    metric: Metric,
    top: usize,
    report_every: u64,
    max_ticks: Option<u64>,
    sweep_dead_after_ms: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = load_config_for_cli(&cli);
    logging::init_tracing(&config.logging)?;

    config.validate()?;
    let settings = Settings {
        metric: config
            .general
            .default_metric
            .parse()
            .map_err(|e| eyre!("{e}"))?,
        top: config.general.top_limit,
        report_every: config.general.report_every,
        max_ticks: config.general.max_ticks,
        sweep_dead_after_ms: config.retention.sweep_dead_after_ms,
    };

    let engine = Engine::new(config.retention.engine_config());
    tracing::info!(config = ?engine.config(), "engine ready");

    match &cli.replay {
        Some(path) => {
            let mut provider = ReplayProvider::open(path)
                .wrap_err_with(|| format!("cannot open capture {}", path.display()))?;
            run_replay(&engine, &mut provider, &settings)
        }
        None => {
            let mut provider: Box<dyn SnapshotProvider> = match &cli.record {
                Some(path) => Box::new(
                    Recorder::create(Collector::new(), path)
                        .wrap_err_with(|| format!("cannot create capture {}", path.display()))?,
                ),
                None => Box::new(Collector::new()),
            };
            let tick_rate = Duration::from_millis(config.general.refresh_rate_ms);
            run_live(&engine, provider.as_mut(), tick_rate, &settings).await
        }
    }
}

async fn run_live(
    engine: &Engine,
    provider: &mut dyn SnapshotProvider,
    tick_rate: Duration,
    settings: &Settings,
) -> Result<()> {
    let mut events = EventHandler::new(tick_rate);

    while let Some(event) = events.next().await {
        match event {
            Event::Tick => {
                if step(engine, provider, settings)? == Flow::Stop {
                    break;
                }
            }
            Event::Shutdown => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Replayed ticks carry their own clock, so they are ingested back to back.
fn run_replay(
    engine: &Engine,
    provider: &mut dyn SnapshotProvider,
    settings: &Settings,
) -> Result<()> {
    while step(engine, provider, settings)? == Flow::Continue {}
    Ok(())
}

#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

fn step(
    engine: &Engine,
    provider: &mut dyn SnapshotProvider,
    settings: &Settings,
) -> Result<Flow> {
    match engine.poll(provider) {
        Ok(tick) => {
            if let Some(after) = settings.sweep_dead_after_ms {
                let cutoff = tick.timestamp.saturating_sub(after);
                engine.sweep_dead(cutoff);
            }
            if tick.tick % settings.report_every == 0 {
                print_report(engine, &tick, settings);
            }
            if settings.max_ticks.is_some_and(|max| tick.tick >= max) {
                return Ok(Flow::Stop);
            }
        }
        Err(IngestError::Provider(ProviderError::Exhausted)) => {
            tracing::info!(ticks = engine.summary().ticks, "capture exhausted");
            return Ok(Flow::Stop);
        }
        Err(IngestError::Provider(ProviderError::Io(err))) => {
            return Err(err).wrap_err("snapshot source failed");
        }
        Err(err) => {
            tracing::error!(error = %err, at = unix_millis(), "tick skipped");
        }
    }
    Ok(Flow::Continue)
}

fn print_report(engine: &Engine, tick: &TickReport, settings: &Settings) {
    let summary = engine.summary();
    let latest = engine.latest_system_point();
    let top = engine.top_by_metric(settings.metric, settings.top);
    print!(
        "{}",
        report::render(tick, &summary, latest.as_ref(), settings.metric, &top)
    );
    println!();
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(rate) = cli.refresh_rate {
        config.general.refresh_rate_ms = rate;
    }
    if let Some(ref metric) = cli.metric {
        config.general.default_metric = metric.clone();
    }
    if let Some(top) = cli.top {
        config.general.top_limit = top;
    }
    if let Some(ticks) = cli.ticks {
        config.general.max_ticks = Some(ticks);
    }
    if cli.log_json {
        config.logging.json = true;
    }

    config
}
