//! Read/write compact records as JSON Lines.
//!
//! One `CompactRecord` per line, in the same JSON encoding that crosses the
//! worker boundary. A file written by `sb compress` can be evaluated later
//! (or elsewhere) with `sb evaluate --compact`.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::domain::CompactRecord;
use crate::error::AppError;

/// Write records as JSON Lines.
pub fn write_compact_jsonl(path: &Path, records: &[CompactRecord]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create compact file '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut out, record)
            .map_err(|e| AppError::new(2, format!("Failed to write compact record: {e}")))?;
        out.write_all(b"\n")
            .map_err(|e| AppError::new(2, format!("Failed to write compact record: {e}")))?;
    }
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush compact file: {e}")))?;
    Ok(())
}

/// Read a JSON Lines file of records. Blank lines are ignored.
pub fn read_compact_jsonl(path: &Path) -> Result<Vec<CompactRecord>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open compact file '{}': {e}", path.display())))?;
    read_compact(BufReader::new(file))
}

pub fn read_compact<R: BufRead>(reader: R) -> Result<Vec<CompactRecord>, AppError> {
    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| AppError::new(2, format!("Failed to read compact file: {e}")))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: CompactRecord = serde_json::from_str(&line)
            .map_err(|e| AppError::new(2, format!("Invalid compact record on line {}: {e}", idx + 1)))?;
        out.push(record);
    }
    if out.is_empty() {
        return Err(AppError::new(3, "Compact file contains no records."));
    }
    Ok(out)
}
