//! Formatted terminal output: run summaries, the model leaderboard and the
//! best-model table.
//!
//! We keep formatting code in one place so:
//! - the pipeline code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::app::pipeline::{CompressOutput, RunOutput, SourceSummary};
use crate::batch::{EngineTarget, PartitionSkew, PayloadStats, RejectedGroup};
use crate::domain::{MetricRecord, RunConfig};
use crate::eval::ModelSummary;

/// Rejected and failed series listed in the run summary before eliding.
const MAX_LISTED: usize = 10;

/// Format the full `sb evaluate` run summary.
pub fn format_run_summary(run: &RunOutput, config: &RunConfig) -> String {
    let mut out = String::new();

    out.push_str("=== sb - per-series back-test ===\n");
    out.push_str(&format_source(&run.source));
    if let Some(payload) = &run.payload {
        out.push_str(&format_payload(payload));
    }
    out.push_str(&format!(
        "Series: {} | evaluated={} | rejected={} | failed={}\n",
        run.series,
        run.series - run.rejected_series() - run.failed.len(),
        run.rejected_series(),
        run.failed.len(),
    ));
    if let Some(skew) = &run.skew {
        out.push_str(&format_skew(skew));
    }

    let engine = match run.engine {
        EngineTarget::Local => "local".to_string(),
        EngineTarget::Pool { .. } => format!("pool ({} workers)", run.workers),
    };
    let step = config.step_size.unwrap_or(config.horizon);
    out.push_str(&format!(
        "Back-test: h={} | windows={} | step={} | metric={} | engine={engine}\n",
        config.horizon,
        config.n_windows,
        step,
        config.metric.name(),
    ));

    out.push_str(&format_rejected(&run.rejected));
    if !run.failed.is_empty() {
        out.push_str("\nFailed series:\n");
        for f in run.failed.iter().take(MAX_LISTED) {
            out.push_str(&format!("  {:<28} {}\n", truncate(&f.unique_id, 28), f.reason));
        }
        if run.failed.len() > MAX_LISTED {
            out.push_str(&format!("  ... and {} more\n", run.failed.len() - MAX_LISTED));
        }
    }
    out.push('\n');

    out
}

/// Format the `sb compress` summary.
pub fn format_compress_summary(run: &CompressOutput) -> String {
    let mut out = String::new();
    out.push_str("=== sb - compress ===\n");
    out.push_str(&format_source(&run.source));
    out.push_str(&format_payload(&run.payload));
    out.push_str(&format!(
        "Groups: {} | records={} | rejected={}\n",
        run.batch.group_count(),
        run.batch.records.len(),
        run.batch.rejected.len(),
    ));
    if let Some(skew) = &run.skew {
        out.push_str(&format_skew(skew));
    }
    out.push_str(&format_rejected(&run.batch.rejected));
    out
}

/// Per-model leaderboard, best mean metric first; models with no score last.
pub fn format_leaderboard(summary: &[ModelSummary], metric_name: &str) -> String {
    let mut rows: Vec<&ModelSummary> = summary.iter().collect();
    rows.sort_by(|a, b| match (a.mean_metric.is_nan(), b.mean_metric.is_nan()) {
        (false, false) => a.mean_metric.total_cmp(&b.mean_metric),
        (a_nan, b_nan) => a_nan.cmp(&b_nan),
    });

    let mut out = String::new();
    out.push_str("Model leaderboard:\n");
    push_line(
        &mut out,
        format!(
            "{:<16} {:>12} {:>8} {:>8} {:>8}",
            "model",
            format!("mean {metric_name}"),
            "scored",
            "failed",
            "wins"
        ),
    );
    push_line(&mut out, format!("{:-<16} {:-<12} {:-<8} {:-<8} {:-<8}", "", "", "", "", ""));
    for s in rows {
        push_line(
            &mut out,
            format!(
                "{:<16} {:>12} {:>8} {:>8} {:>8}",
                truncate(&s.model, 16),
                fmt_metric(s.mean_metric),
                s.scored,
                s.failures,
                s.wins
            ),
        );
    }
    out
}

/// The first `top_n` rows of a best-model table.
pub fn format_best(best: &[MetricRecord], top_n: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("Best model per series (showing {} of {}):\n", top_n.min(best.len()), best.len()));
    push_line(&mut out, format!("{:<28} {:<16} {:>12}", "unique_id", "model", "metric"));
    push_line(&mut out, format!("{:-<28} {:-<16} {:-<12}", "", "", ""));
    for r in best.iter().take(top_n) {
        push_line(
            &mut out,
            format!(
                "{:<28} {:<16} {:>12}",
                truncate(&r.unique_id, 28),
                truncate(&r.models, 16),
                fmt_metric(r.metric)
            ),
        );
    }
    out
}

fn format_source(source: &SourceSummary) -> String {
    match &source.stats {
        Some(stats) => format!(
            "Input: rows={} ({} skipped) | series={} | dates=[{}, {}] | zero share={:.1}%\n",
            stats.n_rows,
            source.row_errors,
            stats.n_series,
            stats.date_min,
            stats.date_max,
            stats.zero_share * 100.0,
        ),
        None => format!("Input: {} compact records\n", source.rows_read),
    }
}

fn format_payload(payload: &PayloadStats) -> String {
    format!(
        "Payload: raw {} rows / {} bytes -> {} records / {} bytes (x{:.1})\n",
        payload.raw_rows,
        payload.raw_bytes,
        payload.records,
        payload.compact_bytes,
        payload.ratio(),
    )
}

fn format_skew(skew: &PartitionSkew) -> String {
    let flag = if skew.is_flagged() { " [skewed]" } else { "" };
    format!(
        "Longest series: {} (n={}, median n={:.1}){flag}\n",
        skew.longest_id, skew.longest_len, skew.median_len
    )
}

fn format_rejected(rejected: &[RejectedGroup]) -> String {
    let mut out = String::new();
    if rejected.is_empty() {
        return out;
    }
    out.push_str("\nRejected groups:\n");
    for r in rejected.iter().take(MAX_LISTED) {
        let label = match r.series.len() {
            0 | 1 => r.unique_id.clone(),
            n => format!("{} (+{} more)", r.unique_id, n - 1),
        };
        out.push_str(&format!("  {:<28} {}\n", truncate(&label, 28), r.reason));
    }
    if rejected.len() > MAX_LISTED {
        out.push_str(&format!("  ... and {} more\n", rejected.len() - MAX_LISTED));
    }
    out
}

fn push_line(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn fmt_metric(v: f64) -> String {
    if v.is_finite() { format!("{v:.4}") } else { "NaN".to_string() }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
