//! Box plots

use std::sync::Arc;

use lp_binding::{bind, ChartHandle};
use lp_core::{ChartError, ChartKind, ChartRequest, SourceTable, StyleOptions};
use lp_figure::FigureSink;

/// Arguments for [`box_plot`].
#[derive(Debug, Clone)]
pub struct BoxArgs {
    /// Numeric distribution column.
    pub y: String,
    /// Optional category column spreading boxes along the x axis.
    pub x: Option<String>,
    pub color: Option<String>,
    pub style: StyleOptions,
}

impl BoxArgs {
    pub fn new(y: impl Into<String>) -> Self {
        Self {
            y: y.into(),
            x: None,
            color: None,
            style: StyleOptions::default(),
        }
    }

    pub fn x(mut self, column: impl Into<String>) -> Self {
        self.x = Some(column.into());
        self
    }

    pub fn color(mut self, column: impl Into<String>) -> Self {
        self.color = Some(column.into());
        self
    }

    pub fn style(mut self, style: StyleOptions) -> Self {
        self.style = style;
        self
    }
}

/// Bind a live box plot to a table.
pub fn box_plot(
    table: Arc<dyn SourceTable>,
    args: BoxArgs,
    sink: Arc<dyn FigureSink>,
) -> Result<ChartHandle, ChartError> {
    let mut request = ChartRequest::new(ChartKind::Box);
    request.y = Some(args.y);
    request.x = args.x;
    request.color = args.color;
    request.style = args.style;
    bind(table, request, sink)
}
