//! Chart builders over live tables
//!
//! One function per chart kind, each taking a source table, an
//! argument struct, and a figure sink. Builders fill in a chart
//! request and hand it to the binding engine; everything after that is
//! driven by the table's deltas.

pub mod area;
pub mod bar;
pub mod box_plot;
pub mod histogram;
pub mod line;
pub mod scatter;

pub use area::{area, AreaArgs};
pub use bar::{bar, BarArgs};
pub use box_plot::{box_plot, BoxArgs};
pub use histogram::{histogram, HistogramArgs};
pub use line::{line, LineArgs};
pub use scatter::{scatter, ScatterArgs};

pub use lp_binding::{BindingState, ChartHandle, ChartId};
pub use lp_core::{Aggregation, ChartError, OutOfRange, SourceTable, StyleOptions};
pub use lp_figure::{FigureSink, FigureSpec, NullSink};
