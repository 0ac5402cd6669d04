//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` defaults and parses CLI arguments
//! - sets up logging
//! - runs the synth / compress / evaluate / best commands
//! - prints reports and writes optional exports

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{BestArgs, Command, CompressArgs, EvaluateArgs, SynthArgs};
use crate::data::{SynthConfig, generate_sales};
use crate::domain::{InputSource, RunConfig};
use crate::error::AppError;

pub mod pipeline;

/// Environment variable holding the default log filter.
pub const LOG_ENV: &str = "SB_LOG";
/// Environment variable holding the default pool size.
pub const WORKERS_ENV: &str = "SB_WORKERS";

/// Entry point for the `sb` binary.
pub fn run() -> Result<(), AppError> {
    // A missing `.env` is normal.
    dotenvy::dotenv().ok();
    let cli = crate::cli::Cli::parse();
    init_logging(cli.log_level.as_deref());

    match cli.command {
        Command::Synth(args) => handle_synth(args),
        Command::Compress(args) => handle_compress(args),
        Command::Evaluate(args) => handle_evaluate(args),
        Command::Best(args) => handle_best(args),
    }
}

fn init_logging(level: Option<&str>) {
    let filter = level
        .map(str::to_string)
        .or_else(|| std::env::var(LOG_ENV).ok())
        .unwrap_or_else(|| "warn".to_string());
    let filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    // Ignored when a subscriber is already installed (tests).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let config = SynthConfig {
        stores: args.stores,
        items: args.items,
        days: args.days,
        start: args.start,
        seed: args.seed,
        zero_prob: args.zero_prob,
        gap_prob: args.gap_prob,
    };
    let rows = generate_sales(&config)?;
    crate::io::write_observations_csv(&args.out, &rows)?;
    info!(rows = rows.len(), path = %args.out.display(), "wrote synthetic sales");
    println!(
        "Wrote {} rows ({} series) to {}",
        rows.len(),
        config.stores * config.items,
        args.out.display()
    );
    Ok(())
}

fn handle_compress(args: CompressArgs) -> Result<(), AppError> {
    let run = pipeline::run_compress(&args.input, &args.grouping.group_by, args.grouping.gap_policy)?;
    print!("{}", crate::report::format_compress_summary(&run));
    crate::io::write_compact_jsonl(&args.out, &run.batch.records)?;
    println!("Wrote {} compact records to {}", run.batch.records.len(), args.out.display());
    Ok(())
}

fn handle_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let config = run_config_from_args(&args)?;
    let run = pipeline::run_evaluate(&config)?;

    print!("{}", crate::report::format_run_summary(&run, &config));
    println!("{}", crate::report::format_leaderboard(&run.summary, config.metric.name()));
    print!("{}", crate::report::format_best(&run.best, config.top_n));

    // Optional exports.
    if let Some(path) = &config.export_metrics {
        crate::io::write_metrics_csv(path, &run.metrics)?;
    }
    if let Some(path) = &config.export_best {
        crate::io::write_metrics_csv(path, &run.best)?;
    }
    if let Some(path) = &config.export_cv {
        crate::io::write_cv_csv(path, &run.cv_rows, &config.models)?;
    }

    Ok(())
}

fn handle_best(args: BestArgs) -> Result<(), AppError> {
    let metrics = crate::io::read_metrics_csv(&args.metrics)?;
    if metrics.is_empty() {
        return Err(AppError::new(3, "Metrics CSV has no rows."));
    }
    let best = crate::eval::best_models(&metrics);
    print!("{}", crate::report::format_best(&best, args.top));
    if let Some(path) = &args.export {
        crate::io::write_metrics_csv(path, &best)?;
    }
    Ok(())
}

/// Build the pipeline configuration from `sb evaluate` flags.
///
/// `--workers` falls back to `SB_WORKERS`, then to 0 (one worker per core).
pub fn run_config_from_args(args: &EvaluateArgs) -> Result<RunConfig, AppError> {
    let source = match (&args.input, &args.compact) {
        (Some(path), None) => InputSource::Csv(path.clone()),
        (None, Some(path)) => InputSource::Compact(path.clone()),
        _ => return Err(AppError::new(2, "Pass exactly one of --input or --compact.")),
    };

    let workers = match args.workers {
        Some(n) => n,
        None => workers_from_env()?,
    };

    Ok(RunConfig {
        source,
        group_by: args.group_by.clone(),
        gap_policy: args.gap_policy,
        models: args.models.clone(),
        season_length: args.season_length,
        window_size: args.window_size,
        ar_lags: args.ar_lags,
        horizon: args.horizon,
        n_windows: args.n_windows,
        step_size: args.step_size,
        metric: args.metric,
        engine: args.engine,
        workers,
        top_n: args.top,
        export_metrics: args.export.clone(),
        export_best: args.export_best.clone(),
        export_cv: args.export_cv.clone(),
    })
}

fn workers_from_env() -> Result<usize, AppError> {
    match std::env::var(WORKERS_ENV) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<usize>()
            .map_err(|_| AppError::new(2, format!("{WORKERS_ENV} must be a non-negative integer, got '{v}'."))),
        _ => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    fn evaluate_args(argv: &[&str]) -> EvaluateArgs {
        let mut full = vec!["sb", "evaluate"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Command::Evaluate(args) => args,
            _ => panic!("expected evaluate"),
        }
    }

    #[test]
    fn explicit_workers_win() {
        let config = run_config_from_args(&evaluate_args(&["--input", "a.csv", "--workers", "3"])).unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.source, InputSource::Csv("a.csv".into()));
    }

    #[test]
    fn compact_source_and_exports() {
        let config = run_config_from_args(&evaluate_args(&[
            "--compact",
            "r.jsonl",
            "--workers",
            "1",
            "--export-cv",
            "cv.csv",
            "--step-size",
            "7",
        ]))
        .unwrap();
        assert_eq!(config.source, InputSource::Compact("r.jsonl".into()));
        assert_eq!(config.export_cv, Some("cv.csv".into()));
        assert_eq!(config.step_size, Some(7));
        assert_eq!(config.models.len(), 7);
    }
}
