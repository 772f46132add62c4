//! Chart binding lifecycle and delta routing

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use lp_core::{
    ChartError, ChartRequest, DeltaBatch, SourceTable, SubscriptionHandle, TableError,
    TableSubscriber,
};
use lp_figure::{FigureSink, FigureSpec, FigureSynthesizer, TraceInput};

use crate::aggregate::AggregateState;
use crate::partition::{PartitionIndex, PartitionKey};
use crate::resolve::{resolve, ResolvedRoles};
use crate::trace::TraceBuffer;

/// Identifies one chart instance across its lifetime.
pub type ChartId = Uuid;

/// Lifecycle of a chart binding.
///
/// `Failed` and `Closed` are terminal; once entered, further deltas
/// are dropped and nothing more is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Uninitialized,
    Subscribing,
    Live,
    Failed,
    Closed,
}

/// Everything mutated when a delta arrives, behind one lock so a batch
/// is processed fully or not at all.
struct ControllerInner {
    state: BindingState,
    roles: ResolvedRoles,
    index: PartitionIndex,
    buffers: AHashMap<PartitionKey, TraceBuffer>,
    aggregates: AHashMap<PartitionKey, AggregateState>,
    synth: FigureSynthesizer,
    sink: Arc<dyn FigureSink>,
    /// The last published figure, kept current through patches so
    /// `ChartHandle::figure` is always authoritative.
    last_figure: Option<FigureSpec>,
}

struct IngestOutcome {
    /// Partitions were created or retired, so trace count or layout
    /// may differ and a full rebuild is required.
    shape_changed: bool,
    /// Surviving partitions whose data changed, in trace order.
    changed: Vec<PartitionKey>,
}

impl ControllerInner {
    fn ingest(&mut self, batch: &DeltaBatch) -> Result<IngestOutcome, ChartError> {
        let routed = self.index.observe(batch)?;
        let projection = self.roles.projection();
        let aggregation = self.roles.aggregate.clone();
        let x_pos = self.roles.x_pos();
        let y_pos = self.roles.y_pos();

        let mut changed = Vec::new();
        for (key, delta) in &routed.deltas {
            let buffer = self
                .buffers
                .entry(key.clone())
                .or_insert_with(|| TraceBuffer::new(projection.clone()));
            let applied = buffer.apply(delta)?;
            if let Some(aggregation) = &aggregation {
                let state = self
                    .aggregates
                    .entry(key.clone())
                    .or_insert_with(|| AggregateState::new(aggregation, x_pos, y_pos));
                state.apply(&applied)?;
            }
            changed.push(key.clone());
        }

        for key in &routed.retired {
            self.buffers.remove(key);
            self.aggregates.remove(key);
        }
        // a partition created and emptied within one batch leaves no
        // trace and no state behind
        let index = &self.index;
        changed.retain(|key| index.position(key).is_some());
        self.buffers.retain(|key, _| index.position(key).is_some());
        self.aggregates.retain(|key, _| index.position(key).is_some());

        tracing::debug!(
            changes = batch.len(),
            created = routed.created.len(),
            retired = routed.retired.len(),
            partitions = self.index.len(),
            "ingested delta batch"
        );

        Ok(IngestOutcome {
            shape_changed: !routed.created.is_empty() || !routed.retired.is_empty(),
            changed,
        })
    }

    fn publish(&mut self, outcome: &IngestOutcome) {
        if outcome.shape_changed || self.last_figure.is_none() {
            let figure = self.rebuild();
            self.sink.on_figure(&figure);
            self.last_figure = Some(figure);
        } else if !outcome.changed.is_empty() {
            let inputs: Vec<(usize, TraceInput)> = outcome
                .changed
                .iter()
                .filter_map(|key| Some((self.index.position(key)?, self.trace_input(key))))
                .collect();
            let changed: Vec<(usize, &TraceInput)> =
                inputs.iter().map(|(position, input)| (*position, input)).collect();
            let patch = self.synth.patch(&changed);
            if let Some(figure) = &mut self.last_figure {
                patch.apply_to(figure);
            }
            self.sink.on_patch(&patch);
        }
    }

    fn rebuild(&mut self) -> FigureSpec {
        let inputs: Vec<TraceInput> = self
            .index
            .live_keys()
            .map(|key| self.trace_input(key))
            .collect();
        self.synth.build(&inputs)
    }

    fn trace_input(&self, key: &PartitionKey) -> TraceInput {
        let name = key.label();
        let facet = self
            .roles
            .facet_position
            .and_then(|position| key.components().get(position).cloned());

        if let Some(state) = self.aggregates.get(key) {
            let (x, y) = state.series();
            return TraceInput {
                name,
                x,
                y,
                size: None,
                facet,
            };
        }

        match self.buffers.get(key) {
            Some(buffer) => TraceInput {
                name,
                x: self.roles.x_pos().map(|p| buffer.column(p)).unwrap_or_default(),
                y: self.roles.y_pos().map(|p| buffer.column(p)).unwrap_or_default(),
                size: self.roles.size_pos().map(|p| buffer.column(p)),
                facet,
            },
            None => TraceInput {
                name,
                x: Vec::new(),
                y: Vec::new(),
                size: None,
                facet,
            },
        }
    }
}

/// The table subscriber half of a chart binding.
///
/// Shared between the source table (which delivers deltas) and the
/// [`ChartHandle`] returned to the caller.
pub struct ChartBinding {
    id: ChartId,
    /// Set by `close` outside the state lock so a batch already being
    /// processed suppresses its publication.
    close_requested: AtomicBool,
    inner: Mutex<ControllerInner>,
}

impl ChartBinding {
    fn fail(&self, inner: &mut ControllerInner, error: &ChartError) {
        inner.state = BindingState::Failed;
        tracing::error!(chart = %self.id, %error, "chart binding failed");
        inner.sink.on_error(error.kind(), &error.to_string());
    }
}

impl TableSubscriber for ChartBinding {
    fn on_delta(&self, batch: &DeltaBatch) {
        if self.close_requested.load(Ordering::SeqCst) {
            return;
        }
        let mut inner = self.inner.lock();
        match inner.state {
            BindingState::Live => {}
            BindingState::Uninitialized | BindingState::Subscribing => return,
            BindingState::Failed | BindingState::Closed => {
                tracing::warn!(chart = %self.id, "dropping delta in terminal state");
                return;
            }
        }
        let outcome = match inner.ingest(batch) {
            Ok(outcome) => outcome,
            Err(error) => {
                self.fail(&mut inner, &error);
                return;
            }
        };
        // a close that raced this batch wins: state is updated, but
        // nothing is published
        if self.close_requested.load(Ordering::SeqCst) {
            return;
        }
        inner.publish(&outcome);
    }

    fn on_table_error(&self, error: &TableError) {
        let mut inner = self.inner.lock();
        if matches!(inner.state, BindingState::Failed | BindingState::Closed) {
            return;
        }
        let column = match error {
            TableError::ColumnRemoved(name) => name,
            TableError::ColumnRetyped { column, .. } => column,
        };
        if !inner.roles.uses_column(column) {
            tracing::debug!(chart = %self.id, column, "schema change does not affect bound roles");
            return;
        }
        self.fail(&mut inner, &ChartError::SchemaIncompatible(error.to_string()));
    }
}

/// Caller-facing handle for one live chart.
///
/// Dropping the handle closes the chart.
pub struct ChartHandle {
    table: Arc<dyn SourceTable>,
    binding: Arc<ChartBinding>,
    subscription: SubscriptionHandle,
}

impl std::fmt::Debug for ChartHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartHandle")
            .field("id", &self.binding.id)
            .field("subscription", &self.subscription)
            .finish_non_exhaustive()
    }
}

impl ChartHandle {
    pub fn id(&self) -> ChartId {
        self.binding.id
    }

    pub fn state(&self) -> BindingState {
        self.binding.inner.lock().state
    }

    /// The figure as of the last published batch.
    pub fn figure(&self) -> Option<FigureSpec> {
        self.binding.inner.lock().last_figure.clone()
    }

    /// Stop processing and detach from the table. Idempotent; a batch
    /// already in flight is dropped without publication.
    pub fn close(&self) {
        if self.binding.close_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        self.table.unsubscribe(self.subscription);
        let mut inner = self.binding.inner.lock();
        inner.state = BindingState::Closed;
        tracing::info!(chart = %self.binding.id, "chart closed");
    }
}

impl Drop for ChartHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Bind a chart request to a ticking table.
///
/// Resolution and validation happen before any subscription is taken,
/// so an invalid request fails fast with no side effects. On success
/// the initial figure has already been delivered to the sink.
pub fn bind(
    table: Arc<dyn SourceTable>,
    request: ChartRequest,
    sink: Arc<dyn FigureSink>,
) -> Result<ChartHandle, ChartError> {
    let schema = table.schema();
    let roles = resolve(&request, &schema)?;
    let synth = FigureSynthesizer::new(
        &request,
        roles.x_title(&request.style),
        roles.y_title(&request.style),
    );
    let columns = roles.partition_by.iter().map(|c| c.index).collect();

    let binding = Arc::new(ChartBinding {
        id: Uuid::new_v4(),
        close_requested: AtomicBool::new(false),
        inner: Mutex::new(ControllerInner {
            state: BindingState::Uninitialized,
            roles,
            index: PartitionIndex::new(columns),
            buffers: AHashMap::new(),
            aggregates: AHashMap::new(),
            synth,
            sink,
            last_figure: None,
        }),
    });

    // hold the state lock across connect and seeding: a delta racing
    // the snapshot blocks on it and is applied strictly after the
    // snapshot rows
    let mut inner = binding.inner.lock();
    inner.state = BindingState::Subscribing;
    let subscriber: Arc<dyn TableSubscriber> = binding.clone();
    let (snapshot, subscription) = table.connect(subscriber);

    let seed = DeltaBatch::from_snapshot(snapshot);
    if let Err(error) = inner.ingest(&seed) {
        inner.state = BindingState::Failed;
        // release the lock before touching the table again, a blocked
        // delivery may hold the table's lock while waiting on ours
        drop(inner);
        table.unsubscribe(subscription);
        return Err(error);
    }

    let figure = inner.rebuild();
    inner.sink.on_figure(&figure);
    inner.last_figure = Some(figure);
    inner.state = BindingState::Live;
    tracing::info!(
        chart = %binding.id,
        kind = request.kind.as_str(),
        "chart bound and live"
    );
    drop(inner);

    Ok(ChartHandle {
        table,
        binding,
        subscription,
    })
}
