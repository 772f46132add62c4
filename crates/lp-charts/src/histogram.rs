//! Histograms

use std::sync::Arc;

use tracing::debug;

use lp_binding::{bind, ChartHandle};
use lp_core::{
    Aggregation, CellValue, ChartError, ChartKind, ChartRequest, OutOfRange, SourceTable,
    StyleOptions,
};
use lp_figure::FigureSink;

const DEFAULT_NBINS: usize = 10;

/// Arguments for [`histogram`].
#[derive(Debug, Clone)]
pub struct HistogramArgs {
    /// Numeric column to bin.
    pub values: String,
    pub nbins: usize,
    /// Half-open bin range. Inferred from the current rows when
    /// omitted; the edges never move once the chart is live either
    /// way.
    pub range: Option<(f64, f64)>,
    /// What to do with values outside the range.
    pub out_of_range: OutOfRange,
    pub color: Option<String>,
    pub style: StyleOptions,
}

impl HistogramArgs {
    pub fn new(values: impl Into<String>) -> Self {
        Self {
            values: values.into(),
            nbins: DEFAULT_NBINS,
            range: None,
            out_of_range: OutOfRange::Overflow,
            color: None,
            style: StyleOptions::default(),
        }
    }

    pub fn nbins(mut self, nbins: usize) -> Self {
        self.nbins = nbins;
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn out_of_range(mut self, policy: OutOfRange) -> Self {
        self.out_of_range = policy;
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

/// Bind a live histogram to a table.
///
/// Without an explicit range the current rows set the edges; values
/// arriving later fall under the chart's out-of-range policy.
pub fn histogram(
    table: Arc<dyn SourceTable>,
    args: HistogramArgs,
    sink: Arc<dyn FigureSink>,
) -> Result<ChartHandle, ChartError> {
    let (min, max) = match args.range {
        Some(range) => range,
        None => infer_range(table.as_ref(), &args.values)?,
    };

    let mut request = ChartRequest::new(ChartKind::Histogram);
    request.x = Some(args.values);
    request.color = args.color;
    request.aggregate = Some(Aggregation::Histogram {
        nbins: args.nbins,
        min,
        max,
        out_of_range: args.out_of_range,
    });
    request.style = args.style;
    bind(table, request, sink)
}

/// Scan the current rows for the value span. The top edge is nudged so
/// the observed maximum lands in the last bin rather than overflowing.
fn infer_range(table: &dyn SourceTable, column: &str) -> Result<(f64, f64), ChartError> {
    let schema = table.schema();
    let index = schema
        .fields()
        .iter()
        .position(|f| f.name() == column)
        .ok_or_else(|| ChartError::UnknownColumn(column.to_owned()))?;

    let mut span: Option<(f64, f64)> = None;
    for (_, row) in table.snapshot() {
        let Some(value) = row.get(index).and_then(CellValue::as_f64) else {
            continue;
        };
        span = Some(match span {
            Some((min, max)) => (min.min(value), max.max(value)),
            None => (value, value),
        });
    }

    let (min, max) = span.ok_or_else(|| {
        ChartError::InvalidRequest(format!(
            "cannot infer a histogram range for '{column}' without rows; pass one explicitly"
        ))
    })?;
    let max = if max > min { max.next_up() } else { min + 1.0 };
    debug!(column, min, max, "inferred histogram range");
    Ok((min, max))
}
