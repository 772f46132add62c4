//! Source table collaborator traits

use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use thiserror::Error;

use crate::delta::DeltaBatch;
use crate::value::{Row, RowKey};

/// Identifies one registered subscription on a source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

/// Unrecoverable conditions a source table reports to its subscribers.
///
/// These are terminal for any binding whose resolved columns are
/// affected; the binding moves to `Failed` and stops processing.
#[derive(Debug, Clone, Error)]
pub enum TableError {
    #[error("column '{0}' was removed from the schema")]
    ColumnRemoved(String),

    #[error("column '{column}' changed type to {new_type}")]
    ColumnRetyped { column: String, new_type: String },
}

/// Callback interface a source table invokes as it ticks.
///
/// One batch is delivered at a time; a subscriber sees its predecessor
/// fully applied before the next delivery begins.
pub trait TableSubscriber: Send + Sync {
    /// One logical change to the row set.
    fn on_delta(&self, batch: &DeltaBatch);

    /// The table can no longer honor its schema contract.
    fn on_table_error(&self, error: &TableError);
}

/// A ticking tabular data source.
///
/// Owned by the caller; the binding engine only holds a subscription
/// handle and never mutates the table.
pub trait SourceTable: Send + Sync {
    /// Current column schema.
    fn schema(&self) -> SchemaRef;

    /// All current rows with their stable keys.
    fn snapshot(&self) -> Vec<(RowKey, Row)>;

    /// Register a subscriber for future delta batches.
    fn subscribe(&self, subscriber: Arc<dyn TableSubscriber>) -> SubscriptionHandle;

    /// Remove a previously registered subscriber.
    fn unsubscribe(&self, handle: SubscriptionHandle);

    /// Snapshot and subscribe as one step, so no batch can fall
    /// between the two. Implementations that can hold their write lock
    /// across both should override this.
    fn connect(
        &self,
        subscriber: Arc<dyn TableSubscriber>,
    ) -> (Vec<(RowKey, Row)>, SubscriptionHandle) {
        let snapshot = self.snapshot();
        let handle = self.subscribe(subscriber);
        (snapshot, handle)
    }
}
