//! Per-partition trace buffers

use ahash::AHashMap;

use lp_core::{CellValue, ChartError, Row, RowKey};

use crate::partition::PartitionDelta;

// Compaction threshold: rebuild once tombstones outnumber live rows.
const MIN_TOMBSTONES_FOR_COMPACTION: usize = 16;

/// A partition delta after projection through the buffer, with old
/// values resolved for removed and modified rows so aggregates can
/// subtract them.
#[derive(Debug, Clone, Default)]
pub struct AppliedDelta {
    pub added: Vec<(RowKey, Vec<CellValue>)>,
    pub removed: Vec<(RowKey, Vec<CellValue>)>,
    /// (key, old values, new values)
    pub modified: Vec<(RowKey, Vec<CellValue>, Vec<CellValue>)>,
}

/// Ordered container of the role-column values needed to render one
/// trace.
///
/// Rows keep their first-observation order across modifies; removes
/// leave tombstones that are compacted away once they dominate, so
/// `apply` stays O(|delta|) amortized regardless of how many rows the
/// buffer tracks.
pub struct TraceBuffer {
    /// Schema indices of the projected role columns.
    projection: Vec<usize>,
    slots: Vec<Option<(RowKey, Vec<CellValue>)>>,
    index: AHashMap<RowKey, usize>,
    tombstones: usize,
}

impl TraceBuffer {
    pub fn new(projection: Vec<usize>) -> Self {
        Self {
            projection,
            slots: Vec::new(),
            index: AHashMap::new(),
            tombstones: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Apply one partition's share of a delta batch. Atomic from the
    /// caller's perspective: an error leaves no partial state visible
    /// because every error here is terminal for the chart instance.
    pub fn apply(&mut self, delta: &PartitionDelta) -> Result<AppliedDelta, ChartError> {
        let mut applied = AppliedDelta::default();

        for row_key in &delta.removed {
            let slot = self.index.remove(row_key).ok_or_else(|| {
                ChartError::InconsistentDelta(format!("buffer does not track row {row_key}"))
            })?;
            if let Some((_, values)) = self.slots[slot].take() {
                applied.removed.push((*row_key, values));
            }
            self.tombstones += 1;
        }

        for modification in &delta.modified {
            let row_key = modification.key;
            let slot = self.index.get(&row_key).copied().ok_or_else(|| {
                ChartError::InconsistentDelta(format!("buffer does not track row {row_key}"))
            })?;
            let new_values = self.project(&modification.new);
            if let Some((_, values)) = self.slots[slot].as_mut() {
                let old_values = std::mem::replace(values, new_values.clone());
                applied.modified.push((row_key, old_values, new_values));
            }
        }

        for (row_key, row) in &delta.added {
            if self.index.contains_key(row_key) {
                return Err(ChartError::InconsistentDelta(format!(
                    "buffer already tracks added row {row_key}"
                )));
            }
            let values = self.project(row);
            self.index.insert(*row_key, self.slots.len());
            self.slots.push(Some((*row_key, values.clone())));
            applied.added.push((*row_key, values));
        }

        self.maybe_compact();
        Ok(applied)
    }

    /// Materialize one projected role column, in row order.
    pub fn column(&self, position: usize) -> Vec<CellValue> {
        self.slots
            .iter()
            .flatten()
            .map(|(_, values)| values.get(position).cloned().unwrap_or(CellValue::Null))
            .collect()
    }

    /// Tracked row keys in row order.
    pub fn keys(&self) -> Vec<RowKey> {
        self.slots.iter().flatten().map(|(key, _)| *key).collect()
    }

    fn project(&self, row: &Row) -> Vec<CellValue> {
        self.projection
            .iter()
            .map(|&index| row.get(index).cloned().unwrap_or(CellValue::Null))
            .collect()
    }

    fn maybe_compact(&mut self) {
        if self.tombstones >= MIN_TOMBSTONES_FOR_COMPACTION && self.tombstones > self.index.len() {
            self.slots.retain(Option::is_some);
            for (slot, entry) in self.slots.iter().enumerate() {
                if let Some((key, _)) = entry {
                    self.index.insert(*key, slot);
                }
            }
            self.tombstones = 0;
        }
    }
}
