//! Line charts

use std::sync::Arc;

use lp_binding::{bind, ChartHandle};
use lp_core::{ChartError, ChartKind, ChartRequest, SourceTable, StyleOptions};
use lp_figure::FigureSink;

/// Arguments for [`line`].
#[derive(Debug, Clone)]
pub struct LineArgs {
    pub x: String,
    pub y: String,
    pub color: Option<String>,
    pub facet: Option<String>,
    pub style: StyleOptions,
}

impl LineArgs {
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            color: None,
            facet: None,
            style: StyleOptions::default(),
        }
    }

    pub fn color(mut self, column: impl Into<String>) -> Self {
        self.color = Some(column.into());
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

/// Bind a live line chart to a table.
pub fn line(
    table: Arc<dyn SourceTable>,
    args: LineArgs,
    sink: Arc<dyn FigureSink>,
) -> Result<ChartHandle, ChartError> {
    let mut request = ChartRequest::new(ChartKind::Line);
    request.x = Some(args.x);
    request.y = Some(args.y);
    request.color = args.color;
    request.facet = args.facet;
    request.style = args.style;
    bind(table, request, sink)
}
