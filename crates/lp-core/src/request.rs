//! Chart request descriptors

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Supported chart kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Line,
    Area,
    Scatter,
    Histogram,
    Box,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Area => "area",
            ChartKind::Scatter => "scatter",
            ChartKind::Histogram => "histogram",
            ChartKind::Box => "box",
        }
    }
}

/// What to do with histogram values outside the fixed bin range.
///
/// Fixed per chart at creation time; the bin edges never move once the
/// chart is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRange {
    /// Route the value into a single shared overflow bin after the
    /// last regular bin.
    Overflow,
    /// Fail the chart instance with `BinRangeExceeded`.
    Error,
}

/// Incremental aggregation over a chart's rows.
///
/// Only aggregations whose running state supports subtraction are
/// offered; anything that would need a re-scan on row removal belongs
/// to the table engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Count rows per distinct x value (frequency).
    CountBy,
    /// Sum of the y column per distinct x value.
    SumBy,
    /// Mean of the y column per distinct x value.
    AvgBy,
    /// Fixed-bin histogram of the value column over `[min, max)`.
    Histogram {
        nbins: usize,
        min: f64,
        max: f64,
        out_of_range: OutOfRange,
    },
}

/// Styling options applied at figure synthesis time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StyleOptions {
    /// Figure title.
    pub title: Option<String>,
    /// Override for the x axis title (defaults to the column name).
    pub x_label: Option<String>,
    /// Override for the y axis title.
    pub y_label: Option<String>,
    /// Discrete colors cycled across traces in trace order.
    pub color_sequence: Option<Vec<String>>,
    /// Fixed colors for specific partition labels; wins over the
    /// sequence.
    pub color_map: HashMap<String, String>,
}

/// Immutable descriptor of one chart instance.
///
/// Created once per chart call and never mutated; it fully determines
/// the behavior of the binding downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartRequest {
    pub kind: ChartKind,
    /// Column for the x role. For histograms this is the value column.
    pub x: Option<String>,
    pub y: Option<String>,
    /// Numeric column for per-point marker size (scatter only).
    pub size: Option<String>,
    /// Partitioning roles: each distinct combination of values becomes
    /// one trace.
    pub color: Option<String>,
    pub symbol: Option<String>,
    pub facet: Option<String>,
    pub aggregate: Option<Aggregation>,
    pub style: StyleOptions,
}

impl ChartRequest {
    pub fn new(kind: ChartKind) -> Self {
        Self {
            kind,
            x: None,
            y: None,
            size: None,
            color: None,
            symbol: None,
            facet: None,
            aggregate: None,
            style: StyleOptions::default(),
        }
    }

    /// Partitioning columns in role order (color, symbol, facet),
    /// deduplicated.
    pub fn partition_columns(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = Vec::new();
        for col in [&self.color, &self.symbol, &self.facet].into_iter().flatten() {
            if !cols.contains(&col.as_str()) {
                cols.push(col);
            }
        }
        cols
    }
}
