//! CSV exports: metric tables, back-test rows and observation tables.
//!
//! Missing metrics (`NaN`) are written as empty fields so they read back as
//! missing in spreadsheets and dataframe tools.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::batch::schema::{DType, Record};
use crate::domain::{CvRow, MetricRecord, ModelKind, RawObservation};
use crate::error::AppError;

fn csv_err(path: &Path, e: impl std::fmt::Display) -> AppError {
    AppError::new(2, format!("Failed to write CSV '{}': {e}", path.display()))
}

fn create(path: &Path) -> Result<csv::Writer<File>, AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create CSV '{}': {e}", path.display())))?;
    Ok(csv::Writer::from_writer(file))
}

fn fmt_float(v: f64) -> String {
    if v.is_finite() { format!("{v}") } else { String::new() }
}

/// Write `models,metric,unique_id` rows.
pub fn write_metrics_csv(path: &Path, records: &[MetricRecord]) -> Result<(), AppError> {
    let file = create(path)?;
    write_metrics(file, records).map_err(|e| csv_err(path, e))
}

fn write_metrics<W: Write>(mut writer: csv::Writer<W>, records: &[MetricRecord]) -> Result<(), csv::Error> {
    writer.write_record(MetricRecord::schema().column_names())?;
    for r in records {
        let metric = fmt_float(r.metric);
        writer.write_record([r.models.as_str(), metric.as_str(), r.unique_id.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a metrics CSV written by `write_metrics_csv` (empty metric = `NaN`).
pub fn read_metrics_csv(path: &Path) -> Result<Vec<MetricRecord>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open metrics CSV '{}': {e}", path.display())))?;
    read_metrics(file)
}

pub fn read_metrics<R: Read>(reader: R) -> Result<Vec<MetricRecord>, AppError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read metrics CSV headers: {e}")))?
        .clone();
    let col = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| AppError::new(2, format!("Metrics CSV is missing column `{name}`.")))
    };
    let (i_model, i_metric, i_id) = (col("models")?, col("metric")?, col("unique_id")?);

    let mut out = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(2, format!("Metrics CSV line {line}: {e}")))?;
        let field = |i: usize| record.get(i).unwrap_or("");
        let metric = match field(i_metric) {
            "" => f64::NAN,
            s => s
                .parse::<f64>()
                .map_err(|_| AppError::new(2, format!("Metrics CSV line {line}: invalid metric '{s}'.")))?,
        };
        out.push(MetricRecord {
            models: field(i_model).to_string(),
            metric,
            unique_id: field(i_id).to_string(),
        });
    }
    Ok(out)
}

/// Write back-test rows with one prediction column per model.
pub fn write_cv_csv(path: &Path, rows: &[CvRow], models: &[ModelKind]) -> Result<(), AppError> {
    let mut writer = create(path)?;
    let schema = CvRow::schema();
    let mut header: Vec<&str> = Vec::new();
    for field in schema.fields() {
        // The prediction list fans out into one column per model.
        match field.dtype {
            DType::FloatList => header.extend(models.iter().map(|m| m.display_name())),
            _ => header.push(&field.name),
        }
    }
    writer.write_record(&header).map_err(|e| csv_err(path, e))?;

    for r in rows {
        let mut fields = vec![
            r.unique_id.clone(),
            r.ds.to_string(),
            r.cutoff.to_string(),
            fmt_float(r.y),
        ];
        fields.extend(r.predictions.iter().map(|&p| fmt_float(p)));
        writer.write_record(&fields).map_err(|e| csv_err(path, e))?;
    }
    writer.flush().map_err(|e| csv_err(path, e))?;
    Ok(())
}

/// Write observations in the input table layout.
pub fn write_observations_csv(path: &Path, rows: &[RawObservation]) -> Result<(), AppError> {
    let mut writer = create(path)?;
    writer
        .write_record(RawObservation::schema().column_names())
        .map_err(|e| csv_err(path, e))?;

    for r in rows {
        let ds = r.ds.to_string();
        let y = fmt_float(r.y);
        let wm_yr_wk = r.wm_yr_wk.map(|w| w.to_string()).unwrap_or_default();
        let price = fmt_float(r.sell_price);
        writer
            .write_record([
                r.unique_id.as_str(),
                r.item_id.as_str(),
                r.dept_id.as_str(),
                r.cat_id.as_str(),
                r.store_id.as_str(),
                r.state_id.as_str(),
                ds.as_str(),
                y.as_str(),
                wm_yr_wk.as_str(),
                price.as_str(),
            ])
            .map_err(|e| csv_err(path, e))?;
    }
    writer.flush().map_err(|e| csv_err(path, e))?;
    Ok(())
}
