//! CSV ingest and validation of the daily sales table.
//!
//! This module turns a sales CSV into `RawObservation`s that are safe to group
//! and compress.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Separation of concerns**: no grouping or forecasting logic here

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::info;

use crate::domain::RawObservation;
use crate::error::AppError;

const REQUIRED_COLUMNS: [&str; 6] = ["unique_id", "store_id", "item_id", "ds", "y", "sell_price"];

/// Summary stats about the rows that survived validation.
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub n_rows: usize,
    pub n_series: usize,
    pub date_min: NaiveDate,
    pub date_max: NaiveDate,
    pub y_total: f64,
    pub zero_share: f64,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

/// Ingest output: validated rows + stats + row errors.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub rows: Vec<RawObservation>,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load and validate a sales CSV from disk.
pub fn load_observations(path: &Path) -> Result<IngestedData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    let data = read_observations(file)?;
    info!(
        path = %path.display(),
        rows = data.rows.len(),
        series = data.stats.n_series,
        row_errors = data.row_errors.len(),
        "loaded observations"
    );
    Ok(data)
}

/// Validate a sales CSV from any reader.
pub fn read_observations<R: Read>(reader: R) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    for col in REQUIRED_COLUMNS {
        if !header_map.contains_key(col) {
            return Err(AppError::new(2, format!("Missing required column: `{col}`")));
        }
    }

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &header_map) {
            Ok(row) => rows.push(row),
            Err(message) => row_errors.push(RowError {
                line,
                id: get_optional(&record, &header_map, "unique_id").map(str::to_string),
                message,
            }),
        }
    }

    let stats = compute_stats(&rows)
        .ok_or_else(|| AppError::new(3, "No valid rows remain after validation."))?;

    Ok(IngestedData {
        rows,
        stats,
        row_errors,
        rows_read,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<RawObservation, String> {
    let unique_id = get_required(record, header_map, "unique_id")?.to_string();
    let store_id = get_required(record, header_map, "store_id")?.to_string();
    let item_id = get_required(record, header_map, "item_id")?.to_string();
    let ds = parse_date(get_required(record, header_map, "ds")?)?;

    let y = parse_f64(get_required(record, header_map, "y")?, "y")?;
    if y < 0.0 {
        return Err(format!("Negative `y` value {y}."));
    }
    let sell_price = parse_f64(get_required(record, header_map, "sell_price")?, "sell_price")?;

    let wm_yr_wk = match get_optional(record, header_map, "wm_yr_wk") {
        Some(s) => Some(
            s.parse::<i32>()
                .map_err(|_| format!("Invalid `wm_yr_wk` value '{s}'."))?,
        ),
        None => None,
    };

    let optional = |name: &str| get_optional(record, header_map, name).unwrap_or_default().to_string();

    Ok(RawObservation {
        unique_id,
        item_id,
        dept_id: optional("dept_id"),
        cat_id: optional("cat_id"),
        store_id,
        state_id: optional("state_id"),
        ds,
        y,
        wm_yr_wk,
        sell_price,
    })
}

fn compute_stats(rows: &[RawObservation]) -> Option<DatasetStats> {
    let date_min = rows.iter().map(|r| r.ds).min()?;
    let date_max = rows.iter().map(|r| r.ds).max()?;
    let n_series = rows.iter().map(|r| r.unique_id.as_str()).collect::<HashSet<_>>().len();
    let y_total = rows.iter().map(|r| r.y).sum();
    let zeros = rows.iter().filter(|r| r.y == 0.0).count();

    Some(DatasetStats {
        n_rows: rows.len(),
        n_series,
        date_min,
        date_max,
        y_total,
        zero_share: zeros as f64 / rows.len() as f64,
    })
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    // ISO dates are the norm; a trailing midnight timestamp is tolerated.
    const FMTS: [&str; 3] = ["%Y-%m-%d", "%Y-%m-%d 00:00:00", "%Y/%m/%d"];
    for fmt in FMTS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!("Invalid date '{s}'. Expected YYYY-MM-DD."))
}

fn parse_f64(s: &str, name: &str) -> Result<f64, String> {
    let v = s
        .parse::<f64>()
        .map_err(|_| format!("Invalid `{name}` value '{s}'."))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("Non-finite `{name}` value."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "unique_id,item_id,dept_id,cat_id,store_id,state_id,ds,y,wm_yr_wk,sell_price\n";

    #[test]
    fn reads_full_schema() {
        let csv = format!(
            "{HEADER}\
             FOODS_1_001_CA_1,FOODS_1_001,FOODS_1,FOODS,CA_1,CA,2016-01-01,3,11549,2.24\n\
             FOODS_1_001_CA_1,FOODS_1_001,FOODS_1,FOODS,CA_1,CA,2016-01-02,0.5,11549,2.24\n"
        );
        let data = read_observations(csv.as_bytes()).unwrap();
        assert_eq!(data.rows.len(), 2);
        assert!(data.row_errors.is_empty());
        assert_eq!(data.rows[0].wm_yr_wk, Some(11549));
        assert_eq!(data.rows[1].y, 0.5);
        assert_eq!(data.stats.n_series, 1);
        assert_eq!(data.stats.date_max, NaiveDate::from_ymd_opt(2016, 1, 2).unwrap());
    }

    #[test]
    fn bad_rows_are_skipped_and_reported() {
        let csv = format!(
            "{HEADER}\
             a,i,d,c,s,st,2016-01-01,1,,1.0\n\
             b,i,d,c,s,st,not-a-date,1,,1.0\n\
             c,i,d,c,s,st,2016-01-01,-2,,1.0\n\
             d,i,d,c,s,st,2016-01-01,1,,NaN\n"
        );
        let data = read_observations(csv.as_bytes()).unwrap();
        assert_eq!(data.rows_read, 4);
        assert_eq!(data.rows.len(), 1);
        assert_eq!(data.row_errors.len(), 3);
        assert_eq!(data.row_errors[0].line, 3);
        assert_eq!(data.row_errors[1].id.as_deref(), Some("c"));
    }

    #[test]
    fn minimal_columns_and_bom_header() {
        let csv = "\u{feff}unique_id,store_id,item_id,ds,y,sell_price\nx,s,i,2016-01-01,1,1.5\n";
        let data = read_observations(csv.as_bytes()).unwrap();
        assert_eq!(data.rows[0].dept_id, "");
        assert_eq!(data.rows[0].wm_yr_wk, None);
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let err = read_observations("unique_id,store_id,ds,y,sell_price\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn no_valid_rows_is_exit_3() {
        let err = read_observations(format!("{HEADER}a,i,d,c,s,st,bad,1,,1\n").as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
