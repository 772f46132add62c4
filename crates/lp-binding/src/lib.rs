//! Incremental table-to-figure binding engine
//!
//! Routes each delta batch from a ticking table through partition
//! classification, per-partition trace buffers, optional running
//! aggregates, and figure synthesis, publishing full figures or
//! incremental patches to the renderer collaborator.

pub mod aggregate;
pub mod controller;
pub mod partition;
pub mod resolve;
pub mod trace;

pub use aggregate::AggregateState;
pub use controller::{bind, BindingState, ChartHandle, ChartId};
pub use partition::{PartitionDelta, PartitionIndex, PartitionKey, RoutedBatch};
pub use resolve::{resolve, ResolvedColumn, ResolvedRoles};
pub use trace::{AppliedDelta, TraceBuffer};
