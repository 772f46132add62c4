//! Scatter charts

use std::sync::Arc;

use lp_binding::{bind, ChartHandle};
use lp_core::{ChartError, ChartKind, ChartRequest, SourceTable, StyleOptions};
use lp_figure::FigureSink;

/// Arguments for [`scatter`].
#[derive(Debug, Clone)]
pub struct ScatterArgs {
    pub x: String,
    pub y: String,
    /// Numeric column driving per-point marker size.
    pub size: Option<String>,
    pub color: Option<String>,
    pub symbol: Option<String>,
    pub facet: Option<String>,
    pub style: StyleOptions,
}

impl ScatterArgs {
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            size: None,
            color: None,
            symbol: None,
            facet: None,
            style: StyleOptions::default(),
        }
    }

    pub fn size(mut self, column: impl Into<String>) -> Self {
        self.size = Some(column.into());
        self
    }

    pub fn color(mut self, column: impl Into<String>) -> Self {
        self.color = Some(column.into());
        self
    }

    pub fn symbol(mut self, column: impl Into<String>) -> Self {
        self.symbol = Some(column.into());
        self
    }

    pub fn facet(mut self, column: impl Into<String>) -> Self {
        self.facet = Some(column.into());
        self
    }

    pub fn style(mut self, style: StyleOptions) -> Self {
        self.style = style;
        self
    }
}

/// Bind a live scatter chart to a table.
pub fn scatter(
    table: Arc<dyn SourceTable>,
    args: ScatterArgs,
    sink: Arc<dyn FigureSink>,
) -> Result<ChartHandle, ChartError> {
    let mut request = ChartRequest::new(ChartKind::Scatter);
    request.x = Some(args.x);
    request.y = Some(args.y);
    request.size = args.size;
    request.color = args.color;
    request.symbol = args.symbol;
    request.facet = args.facet;
    request.style = args.style;
    bind(table, request, sink)
}
