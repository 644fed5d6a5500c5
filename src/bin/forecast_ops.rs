use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use price_forecast::feature_store::{EnvSnapshot, Mode, StorageBackend};
use price_forecast::forecast_tracker::PredictionTracker;
use price_forecast::settings::PipelineSettings;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "forecast_ops")]
#[command(about = "Inspect storage and track daily price forecasts", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to a TOML settings file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Storage mode (local or production); detected from the credential when omitted
    #[arg(short, long, global = true)]
    mode: Option<Mode>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the resolved storage mode
    Mode,
    /// Record one forecast in the tracking log
    Record {
        #[arg(long)]
        target_date: NaiveDate,
        #[arg(long)]
        made_on: NaiveDate,
        #[arg(long)]
        value: f64,
    },
    /// Fill in actual values from a feature group
    Reconcile {
        #[arg(long)]
        group: Option<String>,
        #[arg(long)]
        group_version: Option<u32>,
        #[arg(long)]
        column: Option<String>,
    },
    /// Print MAE and RMSE over reconciled forecasts
    Metrics {
        /// Only score the trailing number of days
        #[arg(long)]
        window: Option<u32>,
    },
    /// Print the latest forecast against the actual for each reconciled day
    Compare,
    /// Print metadata of a stored model
    ModelInfo {
        #[arg(long)]
        name: String,
        /// Defaults to the latest version
        #[arg(long)]
        version: Option<u32>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = PipelineSettings::load(args.config.as_deref())
        .context("failed to load settings")?;
    debug!(?settings, "loaded settings");

    let env = EnvSnapshot::capture();
    let mode = settings.resolve_mode(args.mode, &env);
    let tracker = PredictionTracker::new(&settings.tracking.log_path);

    match args.command {
        Command::Mode => println!("{mode}"),
        Command::Record {
            target_date,
            made_on,
            value,
        } => {
            tracker.record_forecast(target_date, made_on, value)?;
            info!(%target_date, %made_on, value, "forecast recorded");
        }
        Command::Reconcile {
            group,
            group_version,
            column,
        } => {
            let name = group.unwrap_or_else(|| settings.tracking.feature_group.clone());
            let version = group_version.unwrap_or(settings.tracking.feature_group_version);
            let column = column.unwrap_or_else(|| settings.tracking.actual_column.clone());

            let backend = StorageBackend::open(mode, &settings.store, &env)?;
            let feature_group = backend
                .get_feature_group(&name, version)
                .with_context(|| format!("cannot open feature group {name} v{version}"))?;
            let summary = tracker.reconcile_from_feature_group(&feature_group, &column)?;
            println!(
                "updated {} forecasts ({} already reconciled, {} conflicting)",
                summary.updated, summary.unchanged, summary.conflicting
            );
        }
        Command::Metrics { window } => {
            print!("{}", tracker.compute_metrics(window)?);
        }
        Command::Compare => {
            println!(
                "{:<12} {:<12} {:>10} {:>10} {:>10}",
                "target", "made_on", "predicted", "actual", "error"
            );
            for point in tracker.comparison()? {
                println!(
                    "{:<12} {:<12} {:>10.4} {:>10.4} {:>10.4}",
                    point.target_date.to_string(),
                    point.forecast_made_on.to_string(),
                    point.predicted,
                    point.actual,
                    point.error
                );
            }
        }
        Command::ModelInfo { name, version } => {
            let backend = StorageBackend::open(mode, &settings.store, &env)?;
            let store = backend.get_model_store();
            let artifact = match version {
                Some(version) => store.get(&name, version)?,
                None => store.latest(&name)?,
            };
            print!("{}", artifact.metadata);
            for file in artifact.files.keys() {
                println!("  file: {file}");
            }
        }
    }

    Ok(())
}
