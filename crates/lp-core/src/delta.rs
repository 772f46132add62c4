//! Row-set deltas delivered by a ticking table

use crate::value::{Row, RowKey};

/// One atomic unit of change from a source table.
///
/// A row key appears in at most one of the three sets per batch.
/// Downstream consumers see a batch applied fully or not at all.
#[derive(Debug, Clone, Default)]
pub struct DeltaBatch {
    /// Newly present rows, with their values.
    pub added: Vec<(RowKey, Row)>,
    /// Keys of rows no longer present.
    pub removed: Vec<RowKey>,
    /// Rows whose values changed in place.
    pub modified: Vec<RowModification>,
}

/// An in-place change to a tracked row.
///
/// Both old and new values are carried so running aggregates can
/// subtract the old contribution before adding the new one.
#[derive(Debug, Clone)]
pub struct RowModification {
    pub key: RowKey,
    pub old: Row,
    pub new: Row,
}

impl DeltaBatch {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Total number of row changes in the batch.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// A batch that adds the given rows; used to seed a binding from a
    /// table snapshot.
    pub fn from_snapshot(rows: Vec<(RowKey, Row)>) -> Self {
        Self {
            added: rows,
            ..Self::default()
        }
    }
}
