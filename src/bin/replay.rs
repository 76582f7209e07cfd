use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use ctrv_tracker_rs::data::{load_log, LogRecord};
use ctrv_tracker_rs::evaluation::{cartesian_estimate, NisStats, Rmse};
use ctrv_tracker_rs::types::{YAW, YAW_RATE};
use ctrv_tracker_rs::{CtrvUkf, FilterConfig, SensorType, StepOutcome};
use serde::Serialize;
use serde_json::json;

#[derive(Parser, Debug)]
#[command(about = "Replay a lidar/radar log through the CTRV unscented Kalman filter")]
struct Args {
    /// Path to the sensor log (.txt or .txt.gz)
    #[arg(long)]
    input: PathBuf,

    /// Write per-record estimates to this JSON file
    #[arg(long)]
    output: Option<PathBuf>,

    /// Filter configuration (JSON); missing fields take defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ignore lidar records after initialization
    #[arg(long, default_value_t = false)]
    no_laser: bool,

    /// Ignore radar records after initialization
    #[arg(long, default_value_t = false)]
    no_radar: bool,

    /// Debug logging (RUST_LOG overrides)
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

#[derive(Serialize)]
struct Estimate {
    timestamp: i64,
    sensor: SensorType,
    outcome: &'static str,
    /// px, py, vx, vy
    estimate: [f64; 4],
    yaw: f64,
    yaw_rate: f64,
    nis: Option<f64>,
    ground_truth: Option<[f64; 4]>,
}

fn outcome_label(outcome: StepOutcome) -> &'static str {
    match outcome {
        StepOutcome::Initialized => "initialized",
        StepOutcome::Updated(_) => "updated",
        StepOutcome::Ignored(_) => "ignored",
        StepOutcome::Skipped(_) => "skipped",
    }
}

fn load_config(args: &Args) -> anyhow::Result<FilterConfig> {
    let mut config = match args.config.as_ref() {
        Some(path) => FilterConfig::from_json_file(path)?,
        None => FilterConfig::default(),
    };
    if args.no_laser {
        config.use_laser = false;
    }
    if args.no_radar {
        config.use_radar = false;
    }
    Ok(config)
}

fn run_once(records: &[LogRecord], config: FilterConfig) -> anyhow::Result<(serde_json::Value, Vec<Estimate>)> {
    let mut ukf = CtrvUkf::new(config)?;
    let mut rmse = Rmse::new();
    let mut nis_lidar = NisStats::new(SensorType::Laser);
    let mut nis_radar = NisStats::new(SensorType::Radar);
    let mut estimates = Vec::with_capacity(records.len());

    for record in records {
        let m = &record.measurement;
        let outcome = ukf
            .process_measurement(m)
            .with_context(|| format!("filter fault at t={}", m.timestamp))?;

        let nis = match outcome {
            StepOutcome::Updated(SensorType::Laser) => ukf.nis_lidar(),
            StepOutcome::Updated(SensorType::Radar) => ukf.nis_radar(),
            _ => None,
        };
        if let Some(value) = nis {
            match m.sensor_type() {
                SensorType::Laser => nis_lidar.push(value),
                SensorType::Radar => nis_radar.push(value),
            }
        }
        if let Some(gt) = record.ground_truth.as_ref() {
            rmse.push(ukf.state(), gt);
        }

        let x = ukf.state();
        estimates.push(Estimate {
            timestamp: m.timestamp,
            sensor: m.sensor_type(),
            outcome: outcome_label(outcome),
            estimate: cartesian_estimate(x),
            yaw: x[YAW],
            yaw_rate: x[YAW_RATE],
            nis,
            ground_truth: record.ground_truth.map(|gt| [gt.px, gt.py, gt.vx, gt.vy]),
        });
    }

    let snapshot = ukf.get_state();
    let summary = json!({
        "records": records.len(),
        "lidar_updates": snapshot.lidar_updates,
        "radar_updates": snapshot.radar_updates,
        "skipped_updates": snapshot.skipped_updates,
        "rmse": rmse.report(),
        "nis_lidar_above_95": nis_lidar.fraction_above(),
        "nis_radar_above_95": nis_radar.fraction_above(),
        "nis_lidar_mean": (nis_lidar.samples > 0).then_some(nis_lidar.mean),
        "nis_radar_mean": (nis_radar.samples > 0).then_some(nis_radar.mean),
        "final_state": snapshot,
    });
    Ok((summary, estimates))
}

fn write_estimates(path: &Path, estimates: &[Estimate]) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), estimates)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = load_config(&args)?;
    let records = load_log(&args.input)?;
    log::info!("Loaded {} records from {}", records.len(), args.input.display());

    let (mut summary, estimates) = run_once(&records, config)?;
    summary["log"] = json!(args.input.display().to_string());

    if let Some(path) = args.output.as_ref() {
        write_estimates(path, &estimates)?;
        log::info!("Wrote {} estimates to {}", estimates.len(), path.display());
    }

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
