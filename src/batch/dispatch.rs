//! Batch dispatcher: split the raw table into per-series groups and compress them.
//!
//! The partitioning contract:
//! - `PartitionSpec::keys` is the column combination that identifies a series
//! - every group is sorted by date before it reaches the compressor
//! - a group is never split: every row lands in exactly one group
//!
//! Groups that fail validation are returned as `RejectedGroup`s next to the
//! records that compressed cleanly, so one bad series never sinks the batch.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::batch::compress::compress;
use crate::domain::{CompactRecord, GapPolicy, GroupColumn, RawObservation};
use crate::error::{AppError, SeriesError};

/// Intra-group ordering applied before compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    DateAscending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSpec {
    keys: Vec<GroupColumn>,
    presort: SortKey,
}

impl PartitionSpec {
    pub fn new(keys: Vec<GroupColumn>) -> Result<Self, AppError> {
        if keys.is_empty() {
            return Err(AppError::new(2, "Partition key must name at least one column."));
        }
        for (i, key) in keys.iter().enumerate() {
            if keys[..i].contains(key) {
                return Err(AppError::new(
                    2,
                    format!("Partition key lists `{}` twice.", key.column_name()),
                ));
            }
        }
        Ok(Self {
            keys,
            presort: SortKey::DateAscending,
        })
    }

    pub fn keys(&self) -> &[GroupColumn] {
        &self.keys
    }

    pub fn presort(&self) -> SortKey {
        self.presort
    }

    fn key_of(&self, row: &RawObservation) -> Vec<String> {
        self.keys.iter().map(|k| k.value(row).to_string()).collect()
    }
}

impl Default for PartitionSpec {
    fn default() -> Self {
        Self {
            keys: vec![GroupColumn::StoreId, GroupColumn::ItemId],
            presort: SortKey::DateAscending,
        }
    }
}

/// Rows of one series, sorted per the partition spec.
#[derive(Debug, Clone)]
pub struct Group {
    pub key: Vec<String>,
    pub rows: Vec<RawObservation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedGroup {
    /// Id of the group's first row.
    pub unique_id: String,
    /// Every distinct series id in the group, sorted. More than one when the
    /// partition key is coarser than a series.
    pub series: Vec<String>,
    pub key: Vec<String>,
    pub reason: SeriesError,
}

/// Dispatcher output: compressed records plus the groups that failed validation.
#[derive(Debug, Clone)]
pub struct Batch {
    pub records: Vec<CompactRecord>,
    pub rejected: Vec<RejectedGroup>,
}

impl Batch {
    pub fn group_count(&self) -> usize {
        self.records.len() + self.rejected.len()
    }

    /// Distinct series behind the batch, rejected ones included.
    pub fn series_count(&self) -> usize {
        self.records.len() + self.rejected.iter().map(|r| r.series.len()).sum::<usize>()
    }
}

/// Split rows into disjoint groups, ordered by key, each sorted by date.
pub fn partition(rows: &[RawObservation], spec: &PartitionSpec) -> Vec<Group> {
    let mut groups: BTreeMap<Vec<String>, Vec<RawObservation>> = BTreeMap::new();
    for row in rows {
        groups.entry(spec.key_of(row)).or_default().push(row.clone());
    }

    groups
        .into_iter()
        .map(|(key, mut rows)| {
            match spec.presort {
                // Stable, so duplicate dates stay adjacent and in input order.
                SortKey::DateAscending => rows.sort_by_key(|r| r.ds),
            }
            Group { key, rows }
        })
        .collect()
}

/// Partition, then compress each group into one `CompactRecord`.
pub fn dispatch(rows: &[RawObservation], spec: &PartitionSpec, policy: GapPolicy) -> Batch {
    let mut records = Vec::new();
    let mut rejected = Vec::new();

    for group in partition(rows, spec) {
        match compress(&group.rows, policy) {
            Ok(record) => {
                debug!(unique_id = %record.unique_id, len = record.len(), "compressed series");
                records.push(record);
            }
            Err(reason) => {
                let unique_id = group
                    .rows
                    .first()
                    .map(|r| r.unique_id.clone())
                    .unwrap_or_else(|| group.key.join("/"));
                let series: Vec<String> = group
                    .rows
                    .iter()
                    .map(|r| r.unique_id.as_str())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                warn!(%unique_id, series = series.len(), %reason, "rejected series");
                rejected.push(RejectedGroup {
                    unique_id,
                    series,
                    key: group.key,
                    reason,
                });
            }
        }
    }

    Batch { records, rejected }
}

/// A series longer than this multiple of the median length is flagged.
pub const SKEW_FACTOR: f64 = 4.0;

/// Longest series versus the median length. Monitoring only; nothing is rebalanced.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionSkew {
    pub longest_id: String,
    pub longest_len: usize,
    pub median_len: f64,
}

impl PartitionSkew {
    pub fn measure(records: &[CompactRecord]) -> Option<Self> {
        let longest = records.iter().max_by(|a, b| a.len().cmp(&b.len()).then(b.unique_id.cmp(&a.unique_id)))?;
        let mut lens: Vec<usize> = records.iter().map(CompactRecord::len).collect();
        lens.sort_unstable();
        let mid = lens.len() / 2;
        let median_len = if lens.len() % 2 == 0 {
            (lens[mid - 1] + lens[mid]) as f64 / 2.0
        } else {
            lens[mid] as f64
        };

        let skew = Self {
            longest_id: longest.unique_id.clone(),
            longest_len: longest.len(),
            median_len,
        };
        if skew.is_flagged() {
            warn!(
                unique_id = %skew.longest_id,
                len = skew.longest_len,
                median = skew.median_len,
                "partition skew: longest series far exceeds the median"
            );
        }
        Some(skew)
    }

    pub fn is_flagged(&self) -> bool {
        self.longest_len as f64 > SKEW_FACTOR * self.median_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::compress::tests::day;

    fn row(store: &str, item: &str, ds: chrono::NaiveDate, y: f64) -> RawObservation {
        RawObservation {
            unique_id: format!("{item}_{store}"),
            item_id: item.to_string(),
            dept_id: "FOODS_1".to_string(),
            cat_id: "FOODS".to_string(),
            store_id: store.to_string(),
            state_id: "CA".to_string(),
            ds,
            y,
            wm_yr_wk: None,
            sell_price: 1.0,
        }
    }

    #[test]
    fn two_series_yield_two_records_of_the_right_length() {
        let mut rows = Vec::new();
        for d in 1..=5 {
            rows.push(row("CA_1", "A", day(1, d), d as f64));
        }
        for d in 1..=3 {
            rows.push(row("CA_2", "B", day(1, d), d as f64));
        }
        // Shuffle-ish: reverse so the sort is exercised.
        rows.reverse();

        let batch = dispatch(&rows, &PartitionSpec::default(), GapPolicy::Reject);
        assert!(batch.rejected.is_empty());
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].unique_id, "A_CA_1");
        assert_eq!(batch.records[0].y, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(batch.records[1].len(), 3);
    }

    #[test]
    fn group_count_matches_distinct_keys() {
        let rows = vec![
            row("CA_1", "A", day(1, 1), 1.0),
            row("CA_1", "A", day(1, 2), 1.0),
            row("CA_1", "B", day(1, 1), 1.0),
            row("TX_1", "A", day(1, 1), 1.0),
            // Duplicate date: this group is rejected but still counted.
            row("TX_1", "B", day(1, 1), 1.0),
            row("TX_1", "B", day(1, 1), 2.0),
        ];
        let spec = PartitionSpec::default();
        let groups = partition(&rows, &spec);
        assert_eq!(groups.len(), 4);
        assert_eq!(groups.iter().map(|g| g.rows.len()).sum::<usize>(), rows.len());

        let batch = dispatch(&rows, &spec, GapPolicy::Reject);
        assert_eq!(batch.group_count(), 4);
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].unique_id, "B_TX_1");
        assert_eq!(batch.rejected[0].reason, SeriesError::DuplicateDate(day(1, 1)));
    }

    #[test]
    fn coarser_key_mixes_series_and_is_rejected() {
        let rows = vec![row("CA_1", "A", day(1, 1), 1.0), row("CA_1", "B", day(1, 2), 1.0)];
        let spec = PartitionSpec::new(vec![GroupColumn::StoreId]).unwrap();
        let batch = dispatch(&rows, &spec, GapPolicy::Reject);
        assert!(batch.records.is_empty());
        assert!(matches!(batch.rejected[0].reason, SeriesError::MixedIdentity { .. }));
        assert_eq!(batch.rejected[0].series, vec!["A_CA_1".to_string(), "B_CA_1".to_string()]);
        assert_eq!(batch.group_count(), 1);
        assert_eq!(batch.series_count(), 2);
    }

    #[test]
    fn skew_reports_longest_series() {
        let record = |id: &str, n: usize| CompactRecord {
            unique_id: id.to_string(),
            store_id: "CA_1".to_string(),
            item_id: id.to_string(),
            start_date: day(1, 1),
            y: vec![0.0; n],
            prices: vec![1.0; n],
        };
        assert_eq!(PartitionSkew::measure(&[]), None);

        let even = PartitionSkew::measure(&[record("a", 4), record("b", 10), record("c", 10), record("d", 2)]).unwrap();
        // Ties go to the smaller id.
        assert_eq!(even.longest_id, "b");
        assert_eq!(even.median_len, 7.0);
        assert!(!even.is_flagged());

        let skewed = PartitionSkew::measure(&[record("a", 2), record("b", 2), record("c", 30)]).unwrap();
        assert_eq!(skewed.longest_id, "c");
        assert!(skewed.is_flagged());
    }

    #[test]
    fn partition_spec_validates_keys() {
        assert!(PartitionSpec::new(vec![]).is_err());
        assert!(PartitionSpec::new(vec![GroupColumn::ItemId, GroupColumn::ItemId]).is_err());
        let spec = PartitionSpec::new(vec![GroupColumn::UniqueId]).unwrap();
        assert_eq!(spec.presort(), SortKey::DateAscending);
    }
}
