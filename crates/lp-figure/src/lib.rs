//! Declarative figure specifications and synthesis
//!
//! `FigureSpec` is the published output of a chart binding: an ordered
//! trace list plus layout, structurally compatible with the JSON
//! trace-array + layout-object format renderers consume. The
//! synthesizer turns per-partition trace data into full figures and,
//! when only row data moved, into minimal patches.

mod sink;
mod spec;
mod style;
mod synth;

pub use sink::{FigureSink, NullSink};
pub use spec::{Axis, FigurePatch, FigureSpec, Grid, Layout, Marker, PatchOp, Trace};
pub use style::{StyleCycler, DEFAULT_COLORWAY};
pub use synth::{FigureSynthesizer, TraceInput};
