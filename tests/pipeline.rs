use chrono::{Days, NaiveDate};
use series_batch::app::pipeline::{SourceSummary, evaluate_observations, run_compress, run_evaluate};
use series_batch::data::{SynthConfig, generate_sales};
use series_batch::domain::{
    EngineKind, GapPolicy, GroupColumn, InputSource, Metric, MetricRecord, ModelKind, RawObservation, RunConfig,
};
use series_batch::error::SeriesError;
use series_batch::io::{read_metrics_csv, write_compact_jsonl, write_metrics_csv, write_observations_csv};

fn config(source: InputSource, models: Vec<ModelKind>) -> RunConfig {
    RunConfig {
        source,
        group_by: vec![GroupColumn::StoreId, GroupColumn::ItemId],
        gap_policy: GapPolicy::Reject,
        models,
        season_length: 7,
        window_size: 3,
        ar_lags: 2,
        horizon: 2,
        n_windows: 1,
        step_size: None,
        metric: Metric::Mae,
        engine: EngineKind::Local,
        workers: 2,
        top_n: 10,
        export_metrics: None,
        export_best: None,
        export_cv: None,
    }
}

fn series(store: &str, item: &str, values: &[f64]) -> Vec<RawObservation> {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    values
        .iter()
        .enumerate()
        .map(|(i, &y)| RawObservation {
            unique_id: format!("{item}_{store}"),
            item_id: item.to_string(),
            dept_id: "FOODS_1".to_string(),
            cat_id: "FOODS".to_string(),
            store_id: store.to_string(),
            state_id: "CA".to_string(),
            ds: start.checked_add_days(Days::new(i as u64)).unwrap(),
            y,
            wm_yr_wk: None,
            sell_price: 2.5,
        })
        .collect()
}

fn source() -> SourceSummary {
    SourceSummary {
        stats: None,
        rows_read: 0,
        row_errors: 0,
    }
}

fn as_bits(records: &[MetricRecord]) -> Vec<(String, String, u64)> {
    records
        .iter()
        .map(|r| (r.unique_id.clone(), r.models.clone(), r.metric.to_bits()))
        .collect()
}

#[test]
fn two_series_metrics_and_best_models() {
    let mut rows = series("CA_1", "A", &[1.0, 2.0, 3.0, 4.0, 5.0]);
    rows.extend(series("CA_2", "B", &[1.0, 2.0, 3.0]));
    let cfg = config(
        InputSource::Csv("unused.csv".into()),
        vec![ModelKind::Naive, ModelKind::HistoricAverage],
    );

    let run = evaluate_observations(&cfg, &rows, source()).unwrap();
    assert_eq!(run.series, 2);
    assert!(run.rejected.is_empty() && run.failed.is_empty());

    let got: Vec<(&str, &str, f64)> = run
        .metrics
        .iter()
        .map(|r| (r.unique_id.as_str(), r.models.as_str(), r.metric))
        .collect();
    assert_eq!(
        got,
        vec![
            ("A_CA_1", "Naive", 1.5),
            ("A_CA_1", "HistoricAverage", 2.5),
            ("B_CA_2", "Naive", 1.5),
            ("B_CA_2", "HistoricAverage", 1.5),
        ]
    );

    // Tie on B goes to the earlier roster model.
    let best: Vec<(&str, &str)> = run.best.iter().map(|r| (r.unique_id.as_str(), r.models.as_str())).collect();
    assert_eq!(best, vec![("A_CA_1", "Naive"), ("B_CA_2", "Naive")]);
    assert_eq!(run.summary[0].wins, 2);

    let payload = run.payload.unwrap();
    assert_eq!(payload.raw_rows, 8);
    assert_eq!(payload.records, 2);
    assert!(payload.compact_bytes < payload.raw_bytes);
}

#[test]
fn local_and_pool_engines_agree() {
    let rows = generate_sales(&SynthConfig {
        stores: 2,
        items: 6,
        days: 60,
        ..SynthConfig::default()
    })
    .unwrap();
    let mut cfg = config(InputSource::Csv("unused.csv".into()), ModelKind::ALL.to_vec());
    cfg.horizon = 7;
    cfg.n_windows = 2;

    let local = evaluate_observations(&cfg, &rows, source()).unwrap();
    cfg.engine = EngineKind::Pool;
    let pool = evaluate_observations(&cfg, &rows, source()).unwrap();

    assert_eq!(local.metrics.len(), 12 * ModelKind::ALL.len());
    assert_eq!(as_bits(&local.metrics), as_bits(&pool.metrics));
    assert_eq!(as_bits(&local.best), as_bits(&pool.best));
    assert!(local.metrics.iter().all(|r| r.metric.is_nan() || r.metric >= 0.0));
}

#[test]
fn rejected_and_failed_series_get_missing_metrics() {
    let mut rows = series("CA_1", "A", &[1.0, 2.0, 3.0, 4.0, 5.0]);
    // Too short to back-test with h = 2.
    rows.extend(series("CA_1", "C", &[1.0, 2.0]));
    // Duplicate date: rejected at dispatch.
    let mut dup = series("CA_1", "D", &[1.0, 2.0, 3.0, 4.0]);
    dup[1].ds = dup[0].ds;
    rows.extend(dup);

    let cfg = config(
        InputSource::Csv("unused.csv".into()),
        vec![ModelKind::Naive, ModelKind::Ses],
    );
    let run = evaluate_observations(&cfg, &rows, source()).unwrap();

    assert_eq!(run.series, 3);
    assert_eq!(run.metrics.len(), 6);
    assert_eq!(run.rejected.len(), 1);
    assert_eq!(run.rejected[0].unique_id, "D_CA_1");
    assert_eq!(run.failed.len(), 1);
    assert_eq!(run.failed[0].unique_id, "C_CA_1");
    assert_eq!(run.failed[0].reason, SeriesError::InsufficientHistory { required: 3, actual: 2 });

    for r in &run.metrics {
        assert_eq!(r.metric.is_nan(), r.unique_id != "A_CA_1", "{r:?}");
    }
    assert_eq!(run.best.len(), 3);
    assert!(run.best[1].metric.is_nan());
}

#[test]
fn store_level_key_keeps_every_mixed_series() {
    let ten: Vec<f64> = (1..=10).map(f64::from).collect();
    let mut rows = series("CA_1", "A", &ten);
    rows.extend(series("CA_1", "B", &ten));
    rows.extend(series("CA_1", "C", &ten));

    let mut cfg = config(InputSource::Csv("unused.csv".into()), vec![ModelKind::Naive]);
    cfg.group_by = vec![GroupColumn::StoreId];
    let run = evaluate_observations(&cfg, &rows, source()).unwrap();

    assert_eq!(run.series, 3);
    assert_eq!(run.rejected.len(), 1);
    assert_eq!(run.rejected_series(), 3);
    assert!(matches!(run.rejected[0].reason, SeriesError::MixedIdentity { .. }));

    let ids: Vec<&str> = run.metrics.iter().map(|r| r.unique_id.as_str()).collect();
    assert_eq!(ids, vec!["A_CA_1", "B_CA_1", "C_CA_1"]);
    assert!(run.metrics.iter().all(|r| r.metric.is_nan()));
    assert_eq!(run.best.len(), 3);
}

#[test]
fn fill_zero_policy_keeps_gapped_series() {
    let mut rows = series("CA_1", "A", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    rows.remove(2);

    let mut cfg = config(InputSource::Csv("unused.csv".into()), vec![ModelKind::Naive]);
    let rejected = evaluate_observations(&cfg, &rows, source()).unwrap();
    assert_eq!(rejected.rejected.len(), 1);

    cfg.gap_policy = GapPolicy::FillZero;
    let filled = evaluate_observations(&cfg, &rows, source()).unwrap();
    assert!(filled.rejected.is_empty());
    // Last two values 5, 6 against a naive forecast of 4.
    assert_eq!(filled.metrics[0].metric, 1.5);
}

#[test]
fn csv_and_compact_sources_agree_and_exports_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let sales = dir.path().join("sales.csv");
    let compact = dir.path().join("records.jsonl");
    let metrics_csv = dir.path().join("metrics.csv");

    let rows = generate_sales(&SynthConfig {
        stores: 1,
        items: 4,
        days: 40,
        ..SynthConfig::default()
    })
    .unwrap();
    write_observations_csv(&sales, &rows).unwrap();

    let models = vec![ModelKind::Naive, ModelKind::WindowAverage, ModelKind::CrostonClassic];
    let from_csv = run_evaluate(&config(InputSource::Csv(sales.clone()), models.clone())).unwrap();
    assert_eq!(from_csv.source.stats.as_ref().unwrap().n_series, 4);

    let compressed = run_compress(&sales, &[GroupColumn::StoreId, GroupColumn::ItemId], GapPolicy::Reject).unwrap();
    assert_eq!(compressed.batch.records.len(), 4);
    write_compact_jsonl(&compact, &compressed.batch.records).unwrap();
    let from_compact = run_evaluate(&config(InputSource::Compact(compact), models)).unwrap();

    assert_eq!(as_bits(&from_csv.metrics), as_bits(&from_compact.metrics));

    write_metrics_csv(&metrics_csv, &from_csv.metrics).unwrap();
    let back = read_metrics_csv(&metrics_csv).unwrap();
    assert_eq!(back.len(), from_csv.metrics.len());
    for (a, b) in back.iter().zip(&from_csv.metrics) {
        assert_eq!(a.unique_id, b.unique_id);
        assert_eq!(a.models, b.models);
        assert!((a.metric.is_nan() && b.metric.is_nan()) || (a.metric - b.metric).abs() < 1e-9);
    }
}

#[test]
fn backtest_rows_are_collected_for_export() {
    let dir = tempfile::tempdir().unwrap();
    let cv_path = dir.path().join("cv.csv");

    let rows = series("CA_1", "A", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
    let models = vec![ModelKind::Naive, ModelKind::HistoricAverage, ModelKind::WindowAverage];
    let mut cfg = config(InputSource::Csv("unused.csv".into()), models.clone());
    cfg.export_cv = Some(cv_path.clone());

    let run = evaluate_observations(&cfg, &rows, source()).unwrap();
    assert_eq!(run.cv_rows.len(), 2);
    assert_eq!(run.metrics.len(), 3);
    assert_eq!(run.cv_rows[0].predictions, vec![8.0, 4.5, 7.0]);

    series_batch::io::write_cv_csv(&cv_path, &run.cv_rows, &models).unwrap();
    let text = std::fs::read_to_string(&cv_path).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("unique_id,ds,cutoff,y,Naive,HistoricAverage,WindowAverage"));
    assert_eq!(lines.next(), Some("A_CA_1,2020-01-09,2020-01-08,9,8,4.5,7"));
}
