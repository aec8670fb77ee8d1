use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use antenna_analyzer::calibration::{
    default_dataset_file_name, load_records, AntennaLabel, CalibrationDataset,
};
use antenna_analyzer::config::AppConfig;
use antenna_analyzer::engine::EngineHandle;
use antenna_analyzer::hardware::SimulatedAntenna;
use antenna_analyzer::storage::SweepRecord;
use antenna_analyzer::sweep::{CancelToken, SweepRequest, SweepResult};
use clap::{Args, Parser, Subcommand};
use tokio::sync::broadcast::error::TryRecvError;

const PROGRESS_POLL: Duration = Duration::from_millis(10);

#[derive(Parser, Debug)]
#[command(
    name = "antenna_cli",
    about = "SWR sweeps, match rating and detector calibration"
)]
struct Cli {
    /// Configuration file (defaults to assets/analyzer_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the results directory
    #[arg(long)]
    results_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct RangeArgs {
    /// Start frequency in MHz
    #[arg(long)]
    start: Option<f64>,
    /// Stop frequency in MHz
    #[arg(long)]
    stop: Option<f64>,
    /// Number of points
    #[arg(long)]
    points: Option<usize>,
    /// Seed for the simulated antenna
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sweep the simulated antenna and rate the match
    Sweep {
        #[command(flatten)]
        range: RangeArgs,
        /// Abort the sweep after this many milliseconds
        #[arg(long)]
        deadline_ms: Option<u64>,
        /// Save the rated sweep to the results directory
        #[arg(long)]
        save: bool,
        /// Print the record as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Collect a labeled calibration dataset
    Collect {
        /// with_antenna or without_antenna
        #[arg(long)]
        label: AntennaLabel,
        /// Output file (defaults to antenna_data_<label>_<timestamp>.json)
        #[arg(long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Fit a calibrated SWR model from two datasets
    Calibrate {
        #[arg(long)]
        with_antenna: PathBuf,
        #[arg(long)]
        without_antenna: PathBuf,
        /// Make the fitted model active and persist it
        #[arg(long)]
        apply: bool,
    },
    /// List saved sweeps, newest first
    History,
    /// Print a saved sweep
    Show { file: PathBuf },
}

fn main() -> ExitCode {
    antenna_analyzer::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };
    if let Some(dir) = cli.results_dir {
        config.storage.results_dir = dir;
    }

    match cli.command {
        Commands::Sweep {
            range,
            deadline_ms,
            save,
            json,
        } => run_sweep(config, &range, deadline_ms, save, json),
        Commands::Collect {
            label,
            output,
            range,
        } => run_collect(config, label, output, &range),
        Commands::Calibrate {
            with_antenna,
            without_antenna,
            apply,
        } => run_calibrate(config, &with_antenna, &without_antenna, apply),
        Commands::History => run_history(config),
        Commands::Show { file } => run_show(config, &file),
    }
}

fn request_for(config: &AppConfig, range: &RangeArgs) -> SweepRequest {
    SweepRequest::new(
        range.start.unwrap_or(config.sweep.start_mhz),
        range.stop.unwrap_or(config.sweep.stop_mhz),
        range.points.unwrap_or(config.sweep.points),
    )
}

fn restore_calibration(engine: &EngineHandle) {
    if let Err(err) = engine.restore_calibration() {
        eprintln!("Warning: saved calibration ignored: {err}");
    }
}

fn run_sweep(
    config: AppConfig,
    range: &RangeArgs,
    deadline_ms: Option<u64>,
    save: bool,
    json: bool,
) -> Result<ExitCode> {
    let mut request = request_for(&config, range);
    if let Some(ms) = deadline_ms.or(config.sweep.deadline_ms) {
        request = request.with_deadline(Duration::from_millis(ms));
    }

    let antenna = SimulatedAntenna::random(request.start_mhz, request.stop_mhz, range.seed);
    let engine = EngineHandle::simulated(config, antenna);
    restore_calibration(&engine);

    let mut task = engine
        .start_sweep(request)
        .context("failed to start sweep")?;
    if let Some(mut progress) = task.take_progress() {
        let mut stderr = std::io::stderr();
        loop {
            match progress.try_recv() {
                Ok(update) => {
                    let _ = write!(
                        stderr,
                        "\r[{:5.1}%] {:8.3} MHz  SWR {:6.2}",
                        update.percentage(),
                        update.measurement.frequency_mhz(),
                        update.measurement.swr
                    );
                }
                Err(TryRecvError::Empty) => {
                    if task.is_finished() {
                        break;
                    }
                    std::thread::sleep(PROGRESS_POLL);
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => break,
            }
        }
        let _ = writeln!(stderr);
    }
    let result = engine.finish_sweep(task).context("sweep failed")?;
    let rating = engine.rate(&result);

    if json {
        let record = SweepRecord::from_result(&result, &rating);
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_table(&result);
        println!();
        println!("Score: {}/100  Grade: {}", rating.score, rating.grade);
        print!("{}", rating.analysis);
        for line in &rating.recommendations {
            println!("  - {line}");
        }
    }

    if save {
        match engine.save(&result, &rating) {
            Ok(path) => eprintln!("Saved to {}", path.display()),
            Err(err) => eprintln!("Warning: result not saved: {err}"),
        }
    }

    Ok(if result.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn print_table(result: &SweepResult) {
    println!("{:>10}  {:>9}  {:>9}  {:>7}", "MHz", "mag V", "phase V", "SWR");
    for m in &result.measurements {
        println!(
            "{:>10.3}  {:>9.4}  {:>9.4}  {:>7.2}",
            m.frequency_mhz(),
            m.sample.mag_voltage,
            m.sample.phase_voltage,
            m.swr
        );
    }
}

fn run_collect(
    config: AppConfig,
    label: AntennaLabel,
    output: Option<PathBuf>,
    range: &RangeArgs,
) -> Result<ExitCode> {
    let request = request_for(&config, range);
    let antenna = match label {
        AntennaLabel::WithAntenna => {
            SimulatedAntenna::random(request.start_mhz, request.stop_mhz, range.seed)
        }
        AntennaLabel::WithoutAntenna => SimulatedAntenna::open_circuit(range.seed),
    };
    let engine = EngineHandle::simulated(config, antenna);

    let collection = engine
        .collect(&request, label, &CancelToken::new())
        .context("collection failed")?;
    if let Some(failure) = &collection.failure {
        eprintln!("Warning: collection stopped early: {}", failure.message);
    }

    let path = output.unwrap_or_else(|| {
        PathBuf::from(default_dataset_file_name(label, chrono::Local::now()))
    });
    collection
        .dataset
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;

    if let Some(stats) = collection.dataset.magnitude_stats() {
        println!(
            "{} points ({}): magnitude mean {:.4} V, std {:.4} V",
            stats.count,
            label.as_str(),
            stats.mean,
            stats.std
        );
    }
    println!("Saved to {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn load_class(path: &Path, label: AntennaLabel, config: &AppConfig) -> Result<CalibrationDataset> {
    let records =
        load_records(path).with_context(|| format!("failed to read {}", path.display()))?;
    let dataset =
        CalibrationDataset::from_records(&records, label, config.instrument.reference_clock_hz)?;
    if dataset.is_empty() {
        bail!("{} has no {} records", path.display(), label.as_str());
    }
    Ok(dataset)
}

fn run_calibrate(
    config: AppConfig,
    with_path: &Path,
    without_path: &Path,
    apply: bool,
) -> Result<ExitCode> {
    let with = load_class(with_path, AntennaLabel::WithAntenna, &config)?;
    let without = load_class(without_path, AntennaLabel::WithoutAntenna, &config)?;

    let engine = EngineHandle::simulated(config, SimulatedAntenna::open_circuit(0));
    let fit = if apply {
        let fit = engine.calibrate(&with, &without)?;
        engine
            .save_calibration()
            .context("failed to persist calibration")?;
        fit
    } else {
        engine.calibration().fit(&with, &without)?
    };

    println!("{}", fit.report);
    if apply {
        println!(
            "Calibration applied and saved to {}",
            engine.config().calibration.model_path.display()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn run_history(config: AppConfig) -> Result<ExitCode> {
    let engine = EngineHandle::simulated(config, SimulatedAntenna::open_circuit(0));
    let history = engine.store().history()?;
    if history.is_empty() {
        println!("No saved sweeps in {}", engine.store().dir().display());
        return Ok(ExitCode::SUCCESS);
    }
    println!("{:<20}  {:>6}  {:>5}  {:<5}  file", "timestamp", "points", "score", "grade");
    for entry in history {
        println!(
            "{:<20}  {:>6}  {:>5}  {:<5}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.points,
            entry.score,
            entry.grade.as_str(),
            entry.path.display()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn run_show(config: AppConfig, file: &Path) -> Result<ExitCode> {
    let engine = EngineHandle::simulated(config, SimulatedAntenna::open_circuit(0));
    let record = engine.store().load(file)?;
    println!(
        "{}  {:.3}-{:.3} MHz, {} points",
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.parameters.start_freq,
        record.parameters.stop_freq,
        record.measurements.len()
    );
    if let Some(status) = record.status {
        println!("Status: {}", status.as_str());
    }
    println!(
        "Score: {}/100  Grade: {}",
        record.rating.score, record.rating.rating
    );
    print!("{}", record.rating.analysis);
    Ok(ExitCode::SUCCESS)
}
