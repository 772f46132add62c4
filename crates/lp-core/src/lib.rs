//! Core data model and collaborator traits for the live plotting engine
//!
//! This crate defines the shared vocabulary between the ticking table
//! collaborator, the binding engine, and the renderer collaborator:
//! cell values, delta batches, chart requests, and the error taxonomy.

pub mod delta;
pub mod error;
pub mod request;
pub mod table;
pub mod value;

// Re-export commonly used types
pub use delta::{DeltaBatch, RowModification};
pub use error::{ChartError, ErrorKind};
pub use request::{Aggregation, ChartKind, ChartRequest, OutOfRange, StyleOptions};
pub use table::{SourceTable, SubscriptionHandle, TableError, TableSubscriber};
pub use value::{CellValue, Row, RowKey};
