//! Frequency table of contiguous action subsequences.
//!
//! The [`ActionFrequencyTable`] is the skill library of the trainer. Every
//! converged episode's primitive trace is scanned and each contiguous slice of
//! length two or more has its occurrence count bumped. At the start of a round
//! the slices that would have saved the most primitive decisions become the
//! round's macro-actions.
//!
//! Counts are never decremented. The table keeps insertion order so that
//! ranking ties are broken the same way on every run.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::types::MIN_GROUP_LEN;

/// A record of one trace fed into the table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountHistoryEntry {
    /// Training round that produced the trace.
    pub round: usize,
    /// Number of primitive actions in the trace.
    pub trace_len: usize,
    /// Number of slice occurrences counted from it.
    pub slices_counted: usize,
    /// UTC timestamp of the update.
    pub recorded_at: DateTime<Utc>,
}

/// One row of the table as persisted on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyEntry {
    pub actions: Vec<usize>,
    pub count: u64,
}

#[derive(Serialize, Deserialize)]
struct StoredTable {
    entries: Vec<FrequencyEntry>,
    #[serde(default)]
    history: Vec<CountHistoryEntry>,
}

/// Occurrence counts of action subsequences across recorded episodes.
#[derive(Debug, Clone, Default)]
pub struct ActionFrequencyTable {
    counts: IndexMap<Vec<usize>, u64>,
    history: Vec<CountHistoryEntry>,
}

impl ActionFrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Count every contiguous slice of `trace` with length at least two.
    ///
    /// A slice occurring `n` times in the trace gains `n`. The full trace is
    /// itself a slice. Returns the number of slice occurrences counted.
    pub fn count_substrs(&mut self, trace: &[usize]) -> usize {
        let mut counted = 0;
        for start in 0..trace.len() {
            for end in (start + MIN_GROUP_LEN)..=trace.len() {
                *self.counts.entry(trace[start..end].to_vec()).or_insert(0) += 1;
                counted += 1;
            }
        }
        counted
    }

    /// [`count_substrs`](Self::count_substrs) plus a history entry.
    pub fn record_trace(&mut self, round: usize, trace: &[usize]) {
        let slices_counted = self.count_substrs(trace);
        self.history.push(CountHistoryEntry {
            round,
            trace_len: trace.len(),
            slices_counted,
            recorded_at: Utc::now(),
        });
        tracing::debug!(
            round,
            trace_len = trace.len(),
            slices_counted,
            distinct = self.counts.len(),
            "Recorded action trace"
        );
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Occurrences of `seq` so far (0 when never seen).
    pub fn count(&self, seq: &[usize]) -> u64 {
        self.counts.get(seq).copied().unwrap_or(0)
    }

    /// Primitive decisions saved had `seq` been one action at each occurrence.
    pub fn time_saved(&self, seq: &[usize]) -> u64 {
        self.count(seq) * (seq.len().saturating_sub(1)) as u64
    }

    /// All subsequences ordered by ascending time saved.
    ///
    /// The sort is stable, so equal scores keep insertion order.
    pub fn ranked(&self) -> Vec<(&[usize], u64)> {
        let mut ranked: Vec<(&[usize], u64)> = self
            .counts
            .keys()
            .map(|seq| (seq.as_slice(), self.time_saved(seq)))
            .collect();
        ranked.sort_by_key(|(_, saved)| *saved);
        ranked
    }

    /// The `k` subsequences saving the most time, as the round's macro-actions.
    ///
    /// Taken from the tail of [`ranked`](Self::ranked): among equal scores the
    /// later-inserted subsequences win. Returned in ascending order of time
    /// saved.
    pub fn top_k(&self, k: usize) -> Vec<Vec<usize>> {
        let ranked = self.ranked();
        let skip = ranked.len().saturating_sub(k);
        ranked
            .into_iter()
            .skip(skip)
            .map(|(seq, _)| seq.to_vec())
            .collect()
    }

    /// Number of distinct subsequences seen.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total_count(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[usize], u64)> {
        self.counts.iter().map(|(seq, count)| (seq.as_slice(), *count))
    }

    pub fn history(&self) -> &[CountHistoryEntry] {
        &self.history
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Serialize the table to a JSON file at the given path.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let stored = StoredTable {
            entries: self
                .counts
                .iter()
                .map(|(actions, count)| FrequencyEntry {
                    actions: actions.clone(),
                    count: *count,
                })
                .collect(),
            history: self.history.clone(),
        };
        let json = serde_json::to_string_pretty(&stored)
            .context("Failed to serialize frequency table to JSON")?;
        std::fs::write(path.as_ref(), json).with_context(|| {
            format!(
                "Failed to write frequency table to {}",
                path.as_ref().display()
            )
        })?;
        tracing::info!(
            path = %path.as_ref().display(),
            entries = self.len(),
            "Saved frequency table"
        );
        Ok(())
    }

    /// Deserialize a table from a JSON file written by [`save_to_file`](Self::save_to_file).
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!(
                "Failed to read frequency table from {}",
                path.as_ref().display()
            )
        })?;
        let stored: StoredTable =
            serde_json::from_str(&data).context("Failed to deserialize frequency table JSON")?;
        let mut counts = IndexMap::with_capacity(stored.entries.len());
        for entry in stored.entries {
            *counts.entry(entry.actions).or_insert(0) += entry.count;
        }
        let table = Self {
            counts,
            history: stored.history,
        };
        tracing::info!(
            path = %path.as_ref().display(),
            entries = table.len(),
            "Loaded frequency table"
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occurrences(trace: &[usize], seq: &[usize]) -> u64 {
        trace.windows(seq.len()).filter(|w| *w == seq).count() as u64
    }

    #[test]
    fn test_counts_every_slice_by_occurrence() {
        let trace = [0, 1, 0, 1, 2];
        let mut table = ActionFrequencyTable::new();
        table.count_substrs(&trace);

        for len in 2..=trace.len() {
            for window in trace.windows(len) {
                assert_eq!(table.count(window), occurrences(&trace, window), "{window:?}");
            }
        }
        assert_eq!(table.count(&[0, 1]), 2);
        assert_eq!(table.count(&[0, 1, 0, 1, 2]), 1);
        assert_eq!(table.count(&[0]), 0);
        assert_eq!(table.count(&[2, 0]), 0);
    }

    #[test]
    fn test_short_traces_count_nothing() {
        let mut table = ActionFrequencyTable::new();
        assert_eq!(table.count_substrs(&[]), 0);
        assert_eq!(table.count_substrs(&[3]), 0);
        assert!(table.is_empty());
        assert_eq!(table.count_substrs(&[3, 3]), 1);
        assert_eq!(table.count(&[3, 3]), 1);
    }

    #[test]
    fn test_counts_only_increase() {
        let mut table = ActionFrequencyTable::new();
        table.count_substrs(&[1, 1, 1]);
        let before: Vec<(Vec<usize>, u64)> =
            table.iter().map(|(s, c)| (s.to_vec(), c)).collect();
        table.count_substrs(&[0, 2]);
        table.count_substrs(&[1, 1]);
        for (seq, count) in before {
            assert!(table.count(&seq) >= count);
        }
        assert_eq!(table.count(&[1, 1]), 3);
        assert_eq!(table.count(&[1, 1, 1]), 1);
    }

    #[test]
    fn test_time_saved() {
        let mut table = ActionFrequencyTable::new();
        table.count_substrs(&[0, 0, 0, 0]);
        assert_eq!(table.count(&[0, 0]), 3);
        assert_eq!(table.time_saved(&[0, 0]), 3);
        assert_eq!(table.count(&[0, 0, 0]), 2);
        assert_eq!(table.time_saved(&[0, 0, 0]), 4);
        assert_eq!(table.time_saved(&[0, 0, 0, 0]), 3);
        assert_eq!(table.time_saved(&[1, 1]), 0);
    }

    #[test]
    fn test_top_k_prefers_time_saved_then_later_insertion() {
        let mut table = ActionFrequencyTable::new();
        table.count_substrs(&[0, 0, 0, 0]);
        // [0,0]: 3, [0,0,0]: 4, [0,0,0,0]: 3
        assert_eq!(table.top_k(1), vec![vec![0, 0, 0]]);
        // Tie at 3 goes to the later-inserted [0,0,0,0].
        assert_eq!(table.top_k(2), vec![vec![0, 0, 0, 0], vec![0, 0, 0]]);
        assert_eq!(table.top_k(10).len(), 3);
        assert!(table.top_k(0).is_empty());
        assert!(ActionFrequencyTable::new().top_k(5).is_empty());
    }

    #[test]
    fn test_record_trace_history() {
        let mut table = ActionFrequencyTable::new();
        table.record_trace(0, &[0, 1, 2]);
        table.record_trace(1, &[1]);
        assert_eq!(table.history().len(), 2);
        assert_eq!(table.history()[0].slices_counted, 3);
        assert_eq!(table.history()[1].round, 1);
        assert_eq!(table.history()[1].slices_counted, 0);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let mut table = ActionFrequencyTable::new();
        table.record_trace(0, &[0, 1, 0, 1]);

        let tmp = std::env::temp_dir().join("gridskills_test_frequencies.json");
        table.save_to_file(&tmp).unwrap();
        let loaded = ActionFrequencyTable::load_from_file(&tmp).unwrap();
        assert_eq!(loaded.len(), table.len());
        assert_eq!(loaded.count(&[0, 1]), 2);
        assert_eq!(loaded.top_k(3), table.top_k(3));
        assert_eq!(loaded.history().len(), 1);
        std::fs::remove_file(tmp).ok();
    }
}
