//! Figure specification types

use std::collections::BTreeMap;

use serde::Serialize;

use lp_core::CellValue;

/// One independently addressable series in the figure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    /// Renderer trace type ("bar", "scatter", "box").
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub x: Vec<CellValue>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub y: Vec<CellValue>,

    /// "lines" or "markers" for scatter-type traces.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    /// Fill mode ("tozeroy") for area traces.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,

    /// Axis ids for faceted figures ("x", "x2", ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaxis: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaxis: Option<String>,
}

impl Trace {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            x: Vec::new(),
            y: Vec::new(),
            mode: None,
            fill: None,
            marker: None,
            xaxis: None,
            yaxis: None,
        }
    }
}

/// Marker styling for one trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Marker {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Per-point sizes when a size role is bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Vec<CellValue>>,
}

/// Axis metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Axis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Facet grid shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    pub rows: usize,
    pub columns: usize,
}

/// Figure-level layout metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Layout {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaxis: Option<Axis>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaxis: Option<Axis>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<Grid>,

    /// "group" when a partitioned bar chart renders side by side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barmode: Option<String>,

    /// Zero gap for precomputed histogram bars.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bargap: Option<f64>,

    /// Axis entries for facet slots past the first ("xaxis2",
    /// "yaxis2", ...), flattened into the layout object so consumers
    /// see the axes the traces reference.
    #[serde(flatten)]
    pub facet_axes: BTreeMap<String, Axis>,
}

/// The published chart description: ordered traces plus layout.
///
/// The most recent publication is authoritative; earlier ones are
/// stale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FigureSpec {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

/// Incremental change to a previously published `FigureSpec`.
///
/// Valid only while the partition set is unchanged; partition creation
/// or retirement always republishes a full figure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FigurePatch {
    pub ops: Vec<PatchOp>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOp {
    /// Replace the data arrays of one trace.
    Restyle {
        trace: usize,
        x: Vec<CellValue>,
        y: Vec<CellValue>,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<Vec<CellValue>>,
    },
}

impl FigurePatch {
    /// Fold this patch into a figure, producing the state a full
    /// rebuild would have produced.
    pub fn apply_to(&self, figure: &mut FigureSpec) {
        for op in &self.ops {
            match op {
                PatchOp::Restyle { trace, x, y, size } => {
                    let Some(target) = figure.data.get_mut(*trace) else {
                        continue;
                    };
                    target.x = x.clone();
                    target.y = y.clone();
                    if let Some(size) = size {
                        target
                            .marker
                            .get_or_insert_with(Marker::default)
                            .size = Some(size.clone());
                    }
                }
            }
        }
    }
}
