//! Wire encoding of compact records and payload accounting.
//!
//! A record crosses the worker boundary as its JSON encoding; the receiving
//! task decodes its own copy. `PayloadStats` compares that volume with what
//! shipping the raw long-format rows would have cost.

use crate::domain::{CompactRecord, RawObservation};
use crate::error::{AppError, SeriesError};

pub fn to_wire(record: &CompactRecord) -> Result<Vec<u8>, SeriesError> {
    serde_json::to_vec(record).map_err(|e| SeriesError::Wire(e.to_string()))
}

pub fn from_wire(bytes: &[u8]) -> Result<CompactRecord, SeriesError> {
    serde_json::from_slice(bytes).map_err(|e| SeriesError::Wire(e.to_string()))
}

/// Bytes that would cross the boundary with and without compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PayloadStats {
    pub raw_rows: usize,
    pub raw_bytes: usize,
    pub records: usize,
    pub compact_bytes: usize,
}

impl PayloadStats {
    pub fn measure(rows: &[RawObservation], records: &[CompactRecord]) -> Result<Self, AppError> {
        let mut raw_bytes = 0usize;
        for row in rows {
            raw_bytes += serde_json::to_vec(row)
                .map_err(|e| AppError::new(4, format!("Failed to encode raw row: {e}")))?
                .len();
        }
        let mut compact_bytes = 0usize;
        for record in records {
            compact_bytes += to_wire(record).map_err(AppError::from)?.len();
        }
        Ok(Self {
            raw_rows: rows.len(),
            raw_bytes,
            records: records.len(),
            compact_bytes,
        })
    }

    /// `raw_bytes / compact_bytes`; `NaN` when nothing was compressed.
    pub fn ratio(&self) -> f64 {
        if self.compact_bytes == 0 {
            f64::NAN
        } else {
            self.raw_bytes as f64 / self.compact_bytes as f64
        }
    }
}
