//! Figure synthesis: full builds and incremental patches

use std::collections::BTreeMap;

use lp_core::{CellValue, ChartKind, ChartRequest};

use crate::spec::{Axis, FigurePatch, FigureSpec, Grid, Layout, Marker, PatchOp, Trace};
use crate::style::StyleCycler;

/// Materialized data for one trace, in final trace order.
#[derive(Debug, Clone)]
pub struct TraceInput {
    /// Partition label; `None` for the single unpartitioned trace.
    pub name: Option<String>,
    pub x: Vec<CellValue>,
    pub y: Vec<CellValue>,
    /// Per-point sizes when a size role is bound.
    pub size: Option<Vec<CellValue>>,
    /// The facet component of the partition key, when faceted.
    pub facet: Option<CellValue>,
}

/// Builds figure specifications from trace inputs.
///
/// `build` produces a full figure; `patch` produces the minimal change
/// for batches that only moved row data. Applying `patch` output on
/// top of the previous figure yields exactly what `build` would have
/// produced for the same state.
pub struct FigureSynthesizer {
    kind: ChartKind,
    style: StyleCycler,
    layout: Layout,
    /// Facet values the cached grid was derived from.
    facet_values: Vec<CellValue>,
    built: bool,
}

impl FigureSynthesizer {
    /// Layout titles come from the resolved columns (or their label
    /// overrides), derived once per chart.
    pub fn new(request: &ChartRequest, x_title: Option<String>, y_title: Option<String>) -> Self {
        let layout = Layout {
            title: request.style.title.clone(),
            xaxis: x_title.map(|title| Axis { title: Some(title) }),
            yaxis: y_title.map(|title| Axis { title: Some(title) }),
            grid: None,
            barmode: None,
            bargap: match request.kind {
                ChartKind::Histogram => Some(0.0),
                _ => None,
            },
            facet_axes: BTreeMap::new(),
        };
        Self {
            kind: request.kind,
            style: StyleCycler::new(&request.style),
            layout,
            facet_values: Vec::new(),
            built: false,
        }
    }

    /// Full rebuild; used for the first publication and whenever the
    /// partition set changed.
    pub fn build(&mut self, inputs: &[TraceInput]) -> FigureSpec {
        let facets = distinct_facets(inputs);
        if !self.built || facets != self.facet_values {
            if facets.is_empty() {
                self.layout.grid = None;
                self.layout.facet_axes = BTreeMap::new();
            } else {
                self.layout.grid = Some(Grid {
                    rows: 1,
                    columns: facets.len(),
                });
                // every axis id a trace references gets a layout entry
                let x_title = self.layout.xaxis.as_ref().and_then(|a| a.title.clone());
                let y_title = self.layout.yaxis.as_ref().and_then(|a| a.title.clone());
                let mut axes = BTreeMap::new();
                for slot in 1..facets.len() {
                    axes.insert(
                        format!("xaxis{}", slot + 1),
                        Axis {
                            title: x_title.clone(),
                        },
                    );
                    axes.insert(
                        format!("yaxis{}", slot + 1),
                        Axis {
                            title: y_title.clone(),
                        },
                    );
                }
                self.layout.facet_axes = axes;
            }
            self.facet_values = facets;
        }
        self.built = true;

        let partitioned = inputs.iter().any(|input| input.name.is_some());
        self.layout.barmode = match self.kind {
            ChartKind::Bar if partitioned => Some("group".to_owned()),
            _ => None,
        };

        let data = inputs
            .iter()
            .enumerate()
            .map(|(position, input)| self.trace(position, input))
            .collect();

        FigureSpec {
            data,
            layout: self.layout.clone(),
        }
    }

    /// Incremental publication for data-only changes. `changed` pairs
    /// each trace position with its current input.
    pub fn patch(&self, changed: &[(usize, &TraceInput)]) -> FigurePatch {
        let ops = changed
            .iter()
            .map(|(position, input)| PatchOp::Restyle {
                trace: *position,
                x: input.x.clone(),
                y: input.y.clone(),
                size: input.size.clone(),
            })
            .collect();
        FigurePatch { ops }
    }

    fn trace(&self, position: usize, input: &TraceInput) -> Trace {
        let mut trace = match self.kind {
            ChartKind::Bar | ChartKind::Histogram => Trace::new("bar"),
            ChartKind::Line => {
                let mut t = Trace::new("scatter");
                t.mode = Some("lines".to_owned());
                t
            }
            ChartKind::Area => {
                let mut t = Trace::new("scatter");
                t.mode = Some("lines".to_owned());
                t.fill = Some("tozeroy".to_owned());
                t
            }
            ChartKind::Scatter => {
                let mut t = Trace::new("scatter");
                t.mode = Some("markers".to_owned());
                t
            }
            ChartKind::Box => Trace::new("box"),
        };

        trace.name = input.name.clone();
        trace.x = input.x.clone();
        trace.y = input.y.clone();

        let color = self.style.color_for(position, input.name.as_deref());
        trace.marker = Some(Marker {
            color: Some(color),
            size: input.size.clone(),
        });

        if let Some(facet) = &input.facet {
            if let Some(slot) = self.facet_values.iter().position(|v| v == facet) {
                let (xaxis, yaxis) = axis_ids(slot);
                trace.xaxis = Some(xaxis);
                trace.yaxis = Some(yaxis);
            }
        }
        trace
    }
}

fn distinct_facets(inputs: &[TraceInput]) -> Vec<CellValue> {
    let mut facets: Vec<CellValue> = Vec::new();
    for input in inputs {
        if let Some(facet) = &input.facet {
            if !facets.contains(facet) {
                facets.push(facet.clone());
            }
        }
    }
    facets.sort();
    facets
}

fn axis_ids(slot: usize) -> (String, String) {
    if slot == 0 {
        ("x".to_owned(), "y".to_owned())
    } else {
        (format!("x{}", slot + 1), format!("y{}", slot + 1))
    }
}
