//! Row and check counts accumulated over a run.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::classify::Classification;
use crate::normalize::CorrectionCounts;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub batches: usize,
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_excluded: usize,
    /// Check name -> records failing it. A record can fail several checks.
    pub check_failures: BTreeMap<String, usize>,
    pub corrections: CorrectionCounts,
    pub unknown_typologies: BTreeSet<String>,
}

impl RunSummary {
    /// Account for one processed batch.
    ///
    /// `classification` is `None` when filtering is disabled, in which case
    /// every row counts as kept.
    pub fn record_batch(
        &mut self,
        rows: usize,
        corrections: &CorrectionCounts,
        classification: Option<&Classification>,
    ) {
        self.batches += 1;
        self.rows_read += rows;
        self.corrections.add(corrections);
        match classification {
            Some(c) => {
                self.rows_kept += c.kept.len();
                self.rows_excluded += c.excluded.len();
                for (name, count) in &c.check_failures {
                    *self.check_failures.entry(name.clone()).or_default() += count;
                }
                self.unknown_typologies
                    .extend(c.unknown_typologies.iter().cloned());
            }
            None => self.rows_kept += rows,
        }
    }

    /// Fold another summary (e.g. from a separately processed batch) into this one.
    pub fn merge(&mut self, other: &RunSummary) {
        self.batches += other.batches;
        self.rows_read += other.rows_read;
        self.rows_kept += other.rows_kept;
        self.rows_excluded += other.rows_excluded;
        for (name, count) in &other.check_failures {
            *self.check_failures.entry(name.clone()).or_default() += count;
        }
        self.corrections.add(&other.corrections);
        self.unknown_typologies
            .extend(other.unknown_typologies.iter().cloned());
    }

    /// Unknown typologies in `other` that this summary has not seen yet.
    pub fn new_unknown_typologies<'a>(&'a self, other: &'a RunSummary) -> Vec<&'a str> {
        other
            .unknown_typologies
            .difference(&self.unknown_typologies)
            .map(String::as_str)
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_batches_count_all_rows_as_kept() {
        let mut summary = RunSummary::default();
        let corrections = CorrectionCounts {
            county: 2,
            ..CorrectionCounts::default()
        };
        summary.record_batch(5, &corrections, None);
        summary.record_batch(3, &corrections, None);
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.rows_read, 8);
        assert_eq!(summary.rows_kept, 8);
        assert_eq!(summary.rows_excluded, 0);
        assert_eq!(summary.corrections.county, 4);
    }

    #[test]
    fn merge_adds_counts() {
        let mut a = RunSummary {
            batches: 1,
            rows_read: 10,
            rows_kept: 7,
            rows_excluded: 3,
            ..RunSummary::default()
        };
        a.check_failures.insert("thermal.wall".into(), 3);
        let mut b = a.clone();
        b.unknown_typologies.insert("Houseboat".into());

        a.merge(&b);
        assert_eq!(a.rows_read, 20);
        assert_eq!(a.rows_excluded, 6);
        assert_eq!(a.check_failures["thermal.wall"], 6);
        assert_eq!(a.unknown_typologies.len(), 1);
    }

    #[test]
    fn new_unknown_typologies_skips_seen_ones() {
        let mut run = RunSummary::default();
        run.unknown_typologies.insert("Houseboat".into());
        let mut batch = RunSummary::default();
        batch.unknown_typologies.insert("Houseboat".into());
        batch.unknown_typologies.insert("Yurt".into());

        assert_eq!(run.new_unknown_typologies(&batch), vec!["Yurt"]);
        run.merge(&batch);
        assert!(run.new_unknown_typologies(&batch).is_empty());
    }

    #[test]
    fn serializes_to_json_object() {
        let json = RunSummary::default().to_json();
        assert_eq!(json["rows_read"], 0);
        assert!(json["corrections"].is_object());
    }
}
