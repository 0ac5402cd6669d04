//! Expander: `CompactRecord` -> long-format `ExpandedSeries`.

use chrono::Days;

use crate::domain::{CompactRecord, ExpandedRow, ExpandedSeries};
use crate::error::SeriesError;

/// Rebuild the daily rows of one series.
///
/// Row `i` is dated `start_date + i days`. Mismatched value/price arrays are a
/// structural error; nothing is truncated.
pub fn expand(record: &CompactRecord) -> Result<ExpandedSeries, SeriesError> {
    if record.y.len() != record.prices.len() {
        return Err(SeriesError::LengthMismatch {
            values: record.y.len(),
            prices: record.prices.len(),
        });
    }

    let rows = record
        .y
        .iter()
        .zip(&record.prices)
        .enumerate()
        .map(|(i, (&y, &price))| {
            let ds = record
                .start_date
                .checked_add_days(Days::new(i as u64))
                .ok_or(SeriesError::DateOverflow(i))?;
            Ok(ExpandedRow { ds, y, price })
        })
        .collect::<Result<Vec<_>, SeriesError>>()?;

    Ok(ExpandedSeries {
        unique_id: record.unique_id.clone(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::compress::compress;
    use crate::batch::compress::tests::{day, obs};
    use crate::domain::GapPolicy;

    #[test]
    fn round_trips_the_three_day_scenario() {
        let rows = vec![
            obs("id1", day(1, 2), 1.0, 2.2),
            obs("id1", day(1, 3), 2.0, 3.3),
            obs("id1", day(1, 4), 3.0, 4.4),
        ];
        let series = expand(&compress(&rows, GapPolicy::Reject).unwrap()).unwrap();

        assert_eq!(series.unique_id, "id1");
        assert_eq!(series.rows.len(), 3);
        for (orig, back) in rows.iter().zip(&series.rows) {
            assert_eq!(orig.ds, back.ds);
            assert_eq!(orig.y, back.y);
            assert_eq!(orig.sell_price, back.price);
        }
    }

    #[test]
    fn dates_step_by_exactly_one_day_across_month_end() {
        let record = CompactRecord {
            unique_id: "x".to_string(),
            store_id: "S".to_string(),
            item_id: "I".to_string(),
            start_date: day(2, 27),
            y: vec![0.0; 5],
            prices: vec![1.0; 5],
        };
        let series = expand(&record).unwrap();
        assert_eq!(series.rows[0].ds, day(2, 27));
        // 2020 is a leap year.
        assert_eq!(series.rows[2].ds, day(2, 29));
        for pair in series.rows.windows(2) {
            assert_eq!((pair[1].ds - pair[0].ds).num_days(), 1);
        }
    }

    #[test]
    fn length_mismatch_fails_fast() {
        let record = CompactRecord {
            unique_id: "x".to_string(),
            store_id: "S".to_string(),
            item_id: "I".to_string(),
            start_date: day(1, 1),
            y: vec![1.0, 2.0, 3.0],
            prices: vec![1.0, 2.0],
        };
        assert_eq!(
            expand(&record),
            Err(SeriesError::LengthMismatch { values: 3, prices: 2 })
        );
    }
}
