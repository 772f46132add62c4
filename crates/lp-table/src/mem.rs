//! In-memory `SourceTable` implementation

use std::sync::{Arc, Weak};

use arrow::datatypes::{DataType, Schema, SchemaRef};
use indexmap::IndexMap;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

use lp_core::{
    CellValue, DeltaBatch, Row, RowKey, RowModification, SourceTable, SubscriptionHandle,
    TableError, TableSubscriber,
};

/// Errors from mutating a `MemTable`.
#[derive(Error, Debug)]
pub enum TableOpError {
    #[error("row has {actual} values but the schema has {expected} columns")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("value of type {actual} does not match column '{column}' ({expected})")]
    ValueType {
        column: String,
        expected: String,
        actual: &'static str,
    },

    #[error("column '{0}' is not nullable")]
    NullNotAllowed(String),

    #[error("unknown row {0}")]
    UnknownRow(RowKey),

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("invalid update: {0}")]
    InvalidUpdate(String),
}

/// A batched mutation applied to the table atomically: subscribers see
/// it as exactly one delta.
#[derive(Debug, Clone, Default)]
pub struct TableUpdate {
    added: Vec<Row>,
    removed: Vec<RowKey>,
    modified: Vec<(RowKey, Row)>,
}

impl TableUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, row: Row) -> Self {
        self.added.push(row);
        self
    }

    pub fn remove(mut self, key: RowKey) -> Self {
        self.removed.push(key);
        self
    }

    pub fn modify(mut self, key: RowKey, row: Row) -> Self {
        self.modified.push((key, row));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

struct TableState {
    schema: SchemaRef,
    rows: IndexMap<RowKey, Row>,
    next_key: u64,
    subscribers: Vec<(u64, Weak<dyn TableSubscriber>)>,
    next_subscription: u64,
}

/// An in-memory ticking table.
///
/// Every mutation broadcasts one `DeltaBatch` to all live subscribers
/// while the table's write lock is held, so batches are delivered
/// strictly one at a time and never interleave.
pub struct MemTable {
    inner: RwLock<TableState>,
}

impl MemTable {
    pub fn new(schema: SchemaRef) -> Self {
        Self {
            inner: RwLock::new(TableState {
                schema,
                rows: IndexMap::new(),
                next_key: 0,
                subscribers: Vec::new(),
                next_subscription: 0,
            }),
        }
    }

    pub fn row_count(&self) -> usize {
        self.inner.read().rows.len()
    }

    /// Add a single row, broadcasting one batch.
    pub fn add_row(&self, row: Row) -> Result<RowKey, TableOpError> {
        let keys = self.apply(TableUpdate::new().add(row))?;
        Ok(keys[0])
    }

    /// Add several rows as one batch.
    pub fn add_rows(&self, rows: Vec<Row>) -> Result<Vec<RowKey>, TableOpError> {
        let mut update = TableUpdate::new();
        for row in rows {
            update = update.add(row);
        }
        self.apply(update)
    }

    /// Remove a row, broadcasting one batch.
    pub fn remove_row(&self, key: RowKey) -> Result<(), TableOpError> {
        self.apply(TableUpdate::new().remove(key)).map(|_| ())
    }

    /// Replace a row's values in place, broadcasting one batch.
    pub fn update_row(&self, key: RowKey, row: Row) -> Result<(), TableOpError> {
        self.apply(TableUpdate::new().modify(key, row)).map(|_| ())
    }

    /// Apply a batched update atomically. Returns the keys assigned to
    /// added rows, in insertion order.
    pub fn apply(&self, update: TableUpdate) -> Result<Vec<RowKey>, TableOpError> {
        if update.is_empty() {
            return Ok(Vec::new());
        }

        let mut state = self.inner.write();
        validate_update(&state, &update)?;

        let mut batch = DeltaBatch::default();
        let mut new_keys = Vec::with_capacity(update.added.len());

        for key in update.removed {
            state.rows.shift_remove(&key);
            batch.removed.push(key);
        }
        for (key, new) in update.modified {
            // presence checked during validation
            if let Some(slot) = state.rows.get_mut(&key) {
                let old = std::mem::replace(slot, new.clone());
                batch.modified.push(RowModification { key, old, new });
            }
        }
        for row in update.added {
            let key = RowKey(state.next_key);
            state.next_key += 1;
            state.rows.insert(key, row.clone());
            batch.added.push((key, row));
            new_keys.push(key);
        }

        debug!(
            added = batch.added.len(),
            removed = batch.removed.len(),
            modified = batch.modified.len(),
            "broadcasting delta batch"
        );
        notify_delta(&mut state, &batch);
        Ok(new_keys)
    }

    /// Drop a column from the schema.
    ///
    /// Existing subscribers are told the schema changed; bindings that
    /// resolved the column will fail. New subscribers see the narrowed
    /// schema.
    pub fn drop_column(&self, name: &str) -> Result<(), TableOpError> {
        let mut state = self.inner.write();
        let position = state
            .schema
            .fields()
            .iter()
            .position(|f| f.name() == name)
            .ok_or_else(|| TableOpError::UnknownColumn(name.to_owned()))?;

        let fields: Vec<_> = state
            .schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != position)
            .map(|(_, f)| f.clone())
            .collect();
        state.schema = Arc::new(Schema::new(fields));
        for row in state.rows.values_mut() {
            row.remove(position);
        }

        warn!(column = name, "dropping column; notifying subscribers");
        let error = TableError::ColumnRemoved(name.to_owned());
        let mut pruned = false;
        for (_, subscriber) in &state.subscribers {
            match subscriber.upgrade() {
                Some(subscriber) => subscriber.on_table_error(&error),
                None => pruned = true,
            }
        }
        if pruned {
            state.subscribers.retain(|(_, s)| s.strong_count() > 0);
        }
        Ok(())
    }
}

impl SourceTable for MemTable {
    fn schema(&self) -> SchemaRef {
        self.inner.read().schema.clone()
    }

    fn snapshot(&self) -> Vec<(RowKey, Row)> {
        self.inner
            .read()
            .rows
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }

    fn subscribe(&self, subscriber: Arc<dyn TableSubscriber>) -> SubscriptionHandle {
        let mut state = self.inner.write();
        register(&mut state, subscriber)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut state = self.inner.write();
        state.subscribers.retain(|(id, _)| *id != handle.0);
    }

    // Snapshot and registration under one write lock: no batch can
    // land between the two.
    fn connect(
        &self,
        subscriber: Arc<dyn TableSubscriber>,
    ) -> (Vec<(RowKey, Row)>, SubscriptionHandle) {
        let mut state = self.inner.write();
        let snapshot = state.rows.iter().map(|(k, v)| (*k, v.clone())).collect();
        let handle = register(&mut state, subscriber);
        (snapshot, handle)
    }
}

fn register(state: &mut TableState, subscriber: Arc<dyn TableSubscriber>) -> SubscriptionHandle {
    let id = state.next_subscription;
    state.next_subscription += 1;
    state.subscribers.push((id, Arc::downgrade(&subscriber)));
    SubscriptionHandle(id)
}

fn notify_delta(state: &mut TableState, batch: &DeltaBatch) {
    let mut pruned = false;
    for (_, subscriber) in &state.subscribers {
        match subscriber.upgrade() {
            Some(subscriber) => subscriber.on_delta(batch),
            None => pruned = true,
        }
    }
    if pruned {
        state.subscribers.retain(|(_, s)| s.strong_count() > 0);
    }
}

fn validate_update(state: &TableState, update: &TableUpdate) -> Result<(), TableOpError> {
    for row in &update.added {
        validate_row(&state.schema, row)?;
    }
    for (key, row) in &update.modified {
        if !state.rows.contains_key(key) {
            return Err(TableOpError::UnknownRow(*key));
        }
        validate_row(&state.schema, row)?;
    }
    for key in &update.removed {
        if !state.rows.contains_key(key) {
            return Err(TableOpError::UnknownRow(*key));
        }
        if update.modified.iter().any(|(k, _)| k == key) {
            return Err(TableOpError::InvalidUpdate(format!(
                "row {key} appears in both the removed and modified sets"
            )));
        }
    }
    Ok(())
}

fn validate_row(schema: &Schema, row: &Row) -> Result<(), TableOpError> {
    let fields = schema.fields();
    if row.len() != fields.len() {
        return Err(TableOpError::ArityMismatch {
            expected: fields.len(),
            actual: row.len(),
        });
    }
    for (field, value) in fields.iter().zip(row) {
        if value.is_null() {
            if !field.is_nullable() {
                return Err(TableOpError::NullNotAllowed(field.name().clone()));
            }
            continue;
        }
        if !value_matches(field.data_type(), value) {
            return Err(TableOpError::ValueType {
                column: field.name().clone(),
                expected: field.data_type().to_string(),
                actual: value.type_name(),
            });
        }
    }
    Ok(())
}

fn value_matches(data_type: &DataType, value: &CellValue) -> bool {
    matches!(
        (data_type, value),
        (DataType::Boolean, CellValue::Bool(_))
            | (
                DataType::Int8
                    | DataType::Int16
                    | DataType::Int32
                    | DataType::Int64
                    | DataType::UInt8
                    | DataType::UInt16
                    | DataType::UInt32
                    | DataType::UInt64,
                CellValue::Int(_)
            )
            | (DataType::Float32 | DataType::Float64, CellValue::Float(_))
            | (DataType::Utf8 | DataType::LargeUtf8, CellValue::Str(_))
            | (DataType::Timestamp(_, _), CellValue::Time(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::Field;
    use parking_lot::Mutex;

    fn test_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("Category", DataType::Utf8, true),
            Field::new("Value", DataType::Int64, false),
        ]))
    }

    #[derive(Default)]
    struct Recorder {
        batches: Mutex<Vec<DeltaBatch>>,
        errors: Mutex<Vec<TableError>>,
    }

    impl TableSubscriber for Recorder {
        fn on_delta(&self, batch: &DeltaBatch) {
            self.batches.lock().push(batch.clone());
        }

        fn on_table_error(&self, error: &TableError) {
            self.errors.lock().push(error.clone());
        }
    }

    fn row(category: &str, value: i64) -> Row {
        vec![CellValue::from(category), CellValue::Int(value)]
    }

    #[test]
    fn add_remove_update_broadcast_one_batch_each() {
        let table = MemTable::new(test_schema());
        let recorder = Arc::new(Recorder::default());
        table.subscribe(recorder.clone());

        let key = table.add_row(row("A", 1)).unwrap();
        table.update_row(key, row("A", 2)).unwrap();
        table.remove_row(key).unwrap();

        let batches = recorder.batches.lock();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].added.len(), 1);
        assert_eq!(batches[1].modified.len(), 1);
        assert_eq!(batches[1].modified[0].old, row("A", 1));
        assert_eq!(batches[1].modified[0].new, row("A", 2));
        assert_eq!(batches[2].removed, vec![key]);
    }

    #[test]
    fn batched_update_is_one_delta() {
        let table = MemTable::new(test_schema());
        let keys = table.add_rows(vec![row("A", 1), row("B", 3)]).unwrap();

        let recorder = Arc::new(Recorder::default());
        table.subscribe(recorder.clone());

        table
            .apply(
                TableUpdate::new()
                    .add(row("C", 5))
                    .remove(keys[1])
                    .modify(keys[0], row("A", 10)),
            )
            .unwrap();

        let batches = recorder.batches.lock();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].added.len(), 1);
        assert_eq!(batches[0].removed, vec![keys[1]]);
        assert_eq!(batches[0].modified.len(), 1);
    }

    #[test]
    fn rejects_wrong_value_types() {
        let table = MemTable::new(test_schema());
        let err = table
            .add_row(vec![CellValue::Int(1), CellValue::Int(1)])
            .unwrap_err();
        assert!(matches!(err, TableOpError::ValueType { .. }));

        let err = table
            .add_row(vec![CellValue::from("A"), CellValue::Null])
            .unwrap_err();
        assert!(matches!(err, TableOpError::NullNotAllowed(_)));

        let err = table.add_row(vec![CellValue::from("A")]).unwrap_err();
        assert!(matches!(err, TableOpError::ArityMismatch { .. }));
    }

    #[test]
    fn rejects_unknown_rows_and_overlapping_sets() {
        let table = MemTable::new(test_schema());
        let key = table.add_row(row("A", 1)).unwrap();

        let err = table.remove_row(RowKey(999)).unwrap_err();
        assert!(matches!(err, TableOpError::UnknownRow(_)));

        let err = table
            .apply(TableUpdate::new().remove(key).modify(key, row("A", 2)))
            .unwrap_err();
        assert!(matches!(err, TableOpError::InvalidUpdate(_)));
    }

    #[test]
    fn connect_returns_snapshot_then_only_new_deltas() {
        let table = MemTable::new(test_schema());
        table.add_rows(vec![row("A", 1), row("B", 3)]).unwrap();

        let recorder = Arc::new(Recorder::default());
        let (snapshot, _handle) = table.connect(recorder.clone());
        assert_eq!(snapshot.len(), 2);
        assert!(recorder.batches.lock().is_empty());

        table.add_row(row("C", 5)).unwrap();
        assert_eq!(recorder.batches.lock().len(), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let table = MemTable::new(test_schema());
        let recorder = Arc::new(Recorder::default());
        let handle = table.subscribe(recorder.clone());

        table.add_row(row("A", 1)).unwrap();
        table.unsubscribe(handle);
        table.add_row(row("B", 2)).unwrap();

        assert_eq!(recorder.batches.lock().len(), 1);
    }

    #[test]
    fn drop_column_signals_schema_change_and_narrows_rows() {
        let table = MemTable::new(test_schema());
        table.add_row(row("A", 1)).unwrap();

        let recorder = Arc::new(Recorder::default());
        table.subscribe(recorder.clone());

        table.drop_column("Value").unwrap();
        let errors = recorder.errors.lock();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], TableError::ColumnRemoved(_)));

        assert_eq!(table.schema().fields().len(), 1);
        assert_eq!(table.snapshot()[0].1, vec![CellValue::from("A")]);
    }
}
