//! Bar charts

use std::sync::Arc;

use lp_binding::{bind, ChartHandle};
use lp_core::{Aggregation, ChartError, ChartKind, ChartRequest, SourceTable, StyleOptions};
use lp_figure::FigureSink;

/// Arguments for [`bar`].
#[derive(Debug, Clone)]
pub struct BarArgs {
    /// Category column.
    pub x: String,
    /// Numeric value column; omitted, the chart counts rows per x
    /// value.
    pub y: Option<String>,
    pub color: Option<String>,
    pub facet: Option<String>,
    pub aggregate: Option<Aggregation>,
    pub style: StyleOptions,
}

impl BarArgs {
    pub fn new(x: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: None,
            color: None,
            facet: None,
            aggregate: None,
            style: StyleOptions::default(),
        }
    }

    pub fn y(mut self, column: impl Into<String>) -> Self {
        self.y = Some(column.into());
        self
    }

    pub fn color(mut self, column: impl Into<String>) -> Self {
        self.color = Some(column.into());
        self
    }

    pub fn facet(mut self, column: impl Into<String>) -> Self {
        self.facet = Some(column.into());
        self
    }

    pub fn aggregate(mut self, aggregate: Aggregation) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    pub fn style(mut self, style: StyleOptions) -> Self {
        self.style = style;
        self
    }
}

/// Bind a live bar chart to a table.
pub fn bar(
    table: Arc<dyn SourceTable>,
    args: BarArgs,
    sink: Arc<dyn FigureSink>,
) -> Result<ChartHandle, ChartError> {
    let mut request = ChartRequest::new(ChartKind::Bar);
    request.x = Some(args.x);
    request.y = args.y;
    request.color = args.color;
    request.facet = args.facet;
    request.aggregate = args.aggregate;
    request.style = args.style;
    bind(table, request, sink)
}
