//! Compressor: one series' long-format rows -> one `CompactRecord`.
//!
//! Dates are encoded positionally, so the rows must form a strictly ascending,
//! one-day-per-row sequence. That precondition is checked here rather than
//! trusted: a violation is reported as a `SeriesError` instead of silently
//! shifting every later value onto the wrong day.

use crate::domain::{CompactRecord, GapPolicy, RawObservation};
use crate::error::SeriesError;

/// Compress the rows of exactly one series.
///
/// The record's identity and `start_date` come from the first row; values and
/// prices keep input order. With `GapPolicy::FillZero`, each missing day is
/// inserted with `y = 0` and the last seen price.
pub fn compress(rows: &[RawObservation], policy: GapPolicy) -> Result<CompactRecord, SeriesError> {
    let first = rows.first().ok_or(SeriesError::EmptyGroup)?;

    let mut y = Vec::with_capacity(rows.len());
    let mut prices = Vec::with_capacity(rows.len());
    y.push(first.y);
    prices.push(first.sell_price);

    for pair in rows.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.unique_id != first.unique_id {
            return Err(SeriesError::MixedIdentity {
                first: first.unique_id.clone(),
                other: next.unique_id.clone(),
            });
        }

        let step = (next.ds - prev.ds).num_days();
        match step {
            1 => {}
            0 => return Err(SeriesError::DuplicateDate(next.ds)),
            s if s < 0 => {
                return Err(SeriesError::Unsorted {
                    prev: prev.ds,
                    next: next.ds,
                });
            }
            s => match policy {
                GapPolicy::Reject => {
                    return Err(SeriesError::Gap {
                        after: prev.ds,
                        before: next.ds,
                    });
                }
                GapPolicy::FillZero => {
                    for _ in 1..s {
                        y.push(0.0);
                        prices.push(prev.sell_price);
                    }
                }
            },
        }

        y.push(next.y);
        prices.push(next.sell_price);
    }

    Ok(CompactRecord {
        unique_id: first.unique_id.clone(),
        store_id: first.store_id.clone(),
        item_id: first.item_id.clone(),
        start_date: first.ds,
        y,
        prices,
    })
}
