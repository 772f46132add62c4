//! Partition classification and lifecycle

use std::collections::BTreeMap;
use std::fmt;

use ahash::AHashMap;

use lp_core::{CellValue, ChartError, DeltaBatch, Row, RowKey, RowModification};

/// Values of the partitioning-role columns identifying one partition.
///
/// Equality defines partition membership; the derived ordering
/// (lexicographic over components) is the deterministic trace order.
/// Null components collapse to a single designated null value, so
/// all-null rows share one partition instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey(Vec<CellValue>);

impl PartitionKey {
    pub fn components(&self) -> &[CellValue] {
        &self.0
    }

    /// Human-readable label used as the trace name; `None` for the
    /// empty (unpartitioned) key.
    pub fn label(&self) -> Option<String> {
        if self.0.is_empty() {
            return None;
        }
        let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        Some(parts.join(", "))
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label() {
            Some(label) => write!(f, "{label}"),
            None => write!(f, "<all>"),
        }
    }
}

/// The subset of a delta batch that lands in one partition.
#[derive(Debug, Clone, Default)]
pub struct PartitionDelta {
    pub added: Vec<(RowKey, Row)>,
    pub removed: Vec<RowKey>,
    pub modified: Vec<RowModification>,
}

/// A delta batch routed by partition, plus the partitions the batch
/// brought into or out of existence.
#[derive(Debug, Clone, Default)]
pub struct RoutedBatch {
    /// Per-partition deltas in deterministic key order.
    pub deltas: BTreeMap<PartitionKey, PartitionDelta>,
    pub created: Vec<PartitionKey>,
    pub retired: Vec<PartitionKey>,
}

/// Owns the set of known partitions and the row-to-partition
/// assignment.
///
/// Creation and retirement are detected by diffing member counts
/// before and after a batch, never inferred lazily. A key that passes
/// through zero membership and back within one batch is neither
/// created nor retired.
pub struct PartitionIndex {
    /// Schema indices of the partitioning columns, in role order.
    columns: Vec<usize>,
    /// Live member counts, in deterministic key order.
    counts: BTreeMap<PartitionKey, usize>,
    assignments: AHashMap<RowKey, PartitionKey>,
}

impl PartitionIndex {
    pub fn new(columns: Vec<usize>) -> Self {
        Self {
            columns,
            counts: BTreeMap::new(),
            assignments: AHashMap::new(),
        }
    }

    /// Pure function from a row's partitioning-column values to its
    /// partition key.
    pub fn classify(&self, row: &Row) -> PartitionKey {
        PartitionKey(
            self.columns
                .iter()
                .map(|&index| row.get(index).cloned().unwrap_or(CellValue::Null))
                .collect(),
        )
    }

    /// Route a batch to per-partition deltas, updating membership and
    /// reporting created/retired partitions.
    ///
    /// A modify whose new values move the row to another partition
    /// becomes a remove in the old partition and an add in the new
    /// one.
    pub fn observe(&mut self, batch: &DeltaBatch) -> Result<RoutedBatch, ChartError> {
        let mut routed = RoutedBatch::default();
        // member counts at batch start, for keys the batch touches
        let mut before: BTreeMap<PartitionKey, usize> = BTreeMap::new();

        for (row_key, row) in &batch.added {
            if self.assignments.contains_key(row_key) {
                return Err(ChartError::InconsistentDelta(format!(
                    "added row {row_key} is already tracked"
                )));
            }
            let key = self.classify(row);
            self.note_before(&mut before, &key);
            *self.counts.entry(key.clone()).or_insert(0) += 1;
            self.assignments.insert(*row_key, key.clone());
            routed
                .deltas
                .entry(key)
                .or_default()
                .added
                .push((*row_key, row.clone()));
        }

        for row_key in &batch.removed {
            let key = self.assignments.remove(row_key).ok_or_else(|| {
                ChartError::InconsistentDelta(format!("remove of untracked row {row_key}"))
            })?;
            self.note_before(&mut before, &key);
            self.decrement(&key)?;
            routed.deltas.entry(key).or_default().removed.push(*row_key);
        }

        for modification in &batch.modified {
            let row_key = modification.key;
            let old_key = self
                .assignments
                .get(&row_key)
                .cloned()
                .ok_or_else(|| {
                    ChartError::InconsistentDelta(format!("modify of untracked row {row_key}"))
                })?;
            let new_key = self.classify(&modification.new);

            if new_key == old_key {
                routed
                    .deltas
                    .entry(old_key)
                    .or_default()
                    .modified
                    .push(modification.clone());
                continue;
            }

            // the row crossed partitions
            self.note_before(&mut before, &old_key);
            self.note_before(&mut before, &new_key);
            self.decrement(&old_key)?;
            *self.counts.entry(new_key.clone()).or_insert(0) += 1;
            self.assignments.insert(row_key, new_key.clone());
            routed
                .deltas
                .entry(old_key)
                .or_default()
                .removed
                .push(row_key);
            routed
                .deltas
                .entry(new_key)
                .or_default()
                .added
                .push((row_key, modification.new.clone()));
        }

        for (key, count_before) in before {
            let count_after = self.counts.get(&key).copied().unwrap_or(0);
            if count_before == 0 && count_after > 0 {
                routed.created.push(key);
            } else if count_before > 0 && count_after == 0 {
                routed.retired.push(key);
            }
        }
        self.counts.retain(|_, count| *count > 0);

        Ok(routed)
    }

    /// Live partition keys in trace order.
    pub fn live_keys(&self) -> impl Iterator<Item = &PartitionKey> {
        self.counts.keys()
    }

    /// Trace position of a live key.
    pub fn position(&self, key: &PartitionKey) -> Option<usize> {
        self.counts.keys().position(|k| k == key)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    fn note_before(&self, before: &mut BTreeMap<PartitionKey, usize>, key: &PartitionKey) {
        if !before.contains_key(key) {
            before.insert(key.clone(), self.counts.get(key).copied().unwrap_or(0));
        }
    }

    fn decrement(&mut self, key: &PartitionKey) -> Result<(), ChartError> {
        match self.counts.get_mut(key) {
            Some(count) if *count > 0 => {
                *count -= 1;
                Ok(())
            }
            _ => Err(ChartError::InconsistentDelta(format!(
                "membership underflow for partition {key}"
            ))),
        }
    }
}
