//! In-memory ticking table
//!
//! A concrete `SourceTable` for callers and tests: rows are held in
//! memory, every mutation is broadcast to subscribers as one atomic
//! delta batch.

mod mem;

pub use mem::{MemTable, TableOpError, TableUpdate};
