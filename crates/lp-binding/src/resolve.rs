//! Column resolution and per-kind validation
//!
//! Resolution is pure and happens once at chart creation; it never
//! re-validates on deltas.

use arrow::datatypes::{DataType, SchemaRef};

use lp_core::{Aggregation, ChartError, ChartKind, ChartRequest, StyleOptions};

/// A role bound to a concrete schema column.
#[derive(Debug, Clone)]
pub struct ResolvedColumn {
    pub name: String,
    pub index: usize,
    pub data_type: DataType,
}

/// The resolved role set for one chart instance.
///
/// Role columns are projected into trace buffers in x, y, size order;
/// the `*_pos` accessors give each role's position within that
/// projection.
#[derive(Debug, Clone)]
pub struct ResolvedRoles {
    pub kind: ChartKind,
    pub x: Option<ResolvedColumn>,
    pub y: Option<ResolvedColumn>,
    pub size: Option<ResolvedColumn>,
    /// Partitioning columns in role order (color, symbol, facet),
    /// deduplicated. Partition key components align with this order.
    pub partition_by: Vec<ResolvedColumn>,
    /// Index of the facet column within `partition_by`, if faceted.
    pub facet_position: Option<usize>,
    /// Aggregation, after defaulting (a bar with no y column counts).
    pub aggregate: Option<Aggregation>,
}

impl ResolvedRoles {
    /// Schema column indices projected into each trace buffer.
    pub fn projection(&self) -> Vec<usize> {
        [&self.x, &self.y, &self.size]
            .into_iter()
            .flatten()
            .map(|c| c.index)
            .collect()
    }

    pub fn x_pos(&self) -> Option<usize> {
        self.x.as_ref().map(|_| 0)
    }

    pub fn y_pos(&self) -> Option<usize> {
        self.y.as_ref().map(|_| usize::from(self.x.is_some()))
    }

    pub fn size_pos(&self) -> Option<usize> {
        self.size
            .as_ref()
            .map(|_| usize::from(self.x.is_some()) + usize::from(self.y.is_some()))
    }

    /// Whether any role is bound to the named schema column.
    pub fn uses_column(&self, name: &str) -> bool {
        [&self.x, &self.y, &self.size]
            .into_iter()
            .flatten()
            .chain(&self.partition_by)
            .any(|c| c.name == name)
    }

    /// X axis title: explicit label, else the bound column name.
    pub fn x_title(&self, style: &StyleOptions) -> Option<String> {
        style
            .x_label
            .clone()
            .or_else(|| self.x.as_ref().map(|c| c.name.clone()))
    }

    /// Y axis title: explicit label, else derived from the aggregation
    /// or the bound column name.
    pub fn y_title(&self, style: &StyleOptions) -> Option<String> {
        if let Some(label) = &style.y_label {
            return Some(label.clone());
        }
        match &self.aggregate {
            Some(Aggregation::CountBy) | Some(Aggregation::Histogram { .. }) => {
                Some("count".to_owned())
            }
            Some(Aggregation::SumBy) => self.y.as_ref().map(|c| format!("sum of {}", c.name)),
            Some(Aggregation::AvgBy) => self.y.as_ref().map(|c| format!("avg of {}", c.name)),
            None => self.y.as_ref().map(|c| c.name.clone()),
        }
    }
}

/// Resolve a chart request against a table schema.
pub fn resolve(request: &ChartRequest, schema: &SchemaRef) -> Result<ResolvedRoles, ChartError> {
    let x = request.x.as_deref().map(|n| column(schema, n)).transpose()?;
    let y = request.y.as_deref().map(|n| column(schema, n)).transpose()?;
    let size = request
        .size
        .as_deref()
        .map(|n| column(schema, n))
        .transpose()?;

    let mut partition_by = Vec::new();
    for name in request.partition_columns() {
        partition_by.push(column(schema, name)?);
    }
    let facet_position = request
        .facet
        .as_deref()
        .and_then(|facet| partition_by.iter().position(|c| c.name == facet));

    if let Some(size) = &size {
        if request.kind != ChartKind::Scatter {
            return Err(ChartError::InvalidRequest(
                "the size role is only supported for scatter charts".to_owned(),
            ));
        }
        require_numeric(size, "size")?;
    }

    let aggregate = validate_kind(request, &x, &y)?;

    Ok(ResolvedRoles {
        kind: request.kind,
        x,
        y,
        size,
        partition_by,
        facet_position,
        aggregate,
    })
}

fn validate_kind(
    request: &ChartRequest,
    x: &Option<ResolvedColumn>,
    y: &Option<ResolvedColumn>,
) -> Result<Option<Aggregation>, ChartError> {
    match request.kind {
        ChartKind::Bar => {
            require_role(x, "bar charts need an x column")?;
            let aggregate = match (&request.aggregate, y) {
                // a bar with no value column counts rows per x value
                (None, None) => Some(Aggregation::CountBy),
                (None, Some(y)) => {
                    require_numeric(y, "y")?;
                    None
                }
                (Some(Aggregation::CountBy), None) => Some(Aggregation::CountBy),
                (Some(Aggregation::CountBy), Some(_)) => {
                    return Err(ChartError::InvalidRequest(
                        "a count aggregation takes no y column".to_owned(),
                    ));
                }
                (Some(agg @ (Aggregation::SumBy | Aggregation::AvgBy)), Some(y)) => {
                    require_numeric(y, "y")?;
                    Some(agg.clone())
                }
                (Some(Aggregation::SumBy | Aggregation::AvgBy), None) => {
                    return Err(ChartError::InvalidRequest(
                        "sum/avg aggregations need a y column".to_owned(),
                    ));
                }
                (Some(Aggregation::Histogram { .. }), _) => {
                    return Err(ChartError::InvalidRequest(
                        "histogram bins only apply to histogram charts".to_owned(),
                    ));
                }
            };
            Ok(aggregate)
        }
        ChartKind::Line | ChartKind::Area | ChartKind::Scatter => {
            require_role(x, "line/area/scatter charts need an x column")?;
            let y = require_role(y, "line/area/scatter charts need a y column")?;
            require_numeric(y, "y")?;
            if request.aggregate.is_some() {
                return Err(ChartError::InvalidRequest(
                    "line/area/scatter charts plot raw rows, not aggregates".to_owned(),
                ));
            }
            Ok(None)
        }
        ChartKind::Histogram => {
            let value = require_role(x, "histograms need a value column")?;
            require_numeric(value, "x")?;
            if y.is_some() {
                return Err(ChartError::InvalidRequest(
                    "histograms take no y column".to_owned(),
                ));
            }
            match &request.aggregate {
                Some(agg @ Aggregation::Histogram { nbins, min, max, .. }) => {
                    if *nbins == 0 {
                        return Err(ChartError::InvalidRequest(
                            "histograms need at least one bin".to_owned(),
                        ));
                    }
                    if !(max > min) {
                        return Err(ChartError::InvalidRequest(format!(
                            "histogram range [{min}, {max}) is empty"
                        )));
                    }
                    Ok(Some(agg.clone()))
                }
                Some(_) => Err(ChartError::InvalidRequest(
                    "histogram charts need a histogram bin specification".to_owned(),
                )),
                None => Err(ChartError::InvalidRequest(
                    "histogram charts need a bin specification fixed at creation".to_owned(),
                )),
            }
        }
        ChartKind::Box => {
            let y = require_role(y, "box plots need a y column")?;
            require_numeric(y, "y")?;
            if request.aggregate.is_some() {
                return Err(ChartError::InvalidRequest(
                    "box plots take raw rows, not aggregates".to_owned(),
                ));
            }
            Ok(None)
        }
    }
}

fn column(schema: &SchemaRef, name: &str) -> Result<ResolvedColumn, ChartError> {
    let index = schema
        .fields()
        .iter()
        .position(|f| f.name() == name)
        .ok_or_else(|| ChartError::UnknownColumn(name.to_owned()))?;
    let field = schema.field(index);
    Ok(ResolvedColumn {
        name: name.to_owned(),
        index,
        data_type: field.data_type().clone(),
    })
}

fn require_role<'a>(
    column: &'a Option<ResolvedColumn>,
    message: &str,
) -> Result<&'a ResolvedColumn, ChartError> {
    column
        .as_ref()
        .ok_or_else(|| ChartError::InvalidRequest(message.to_owned()))
}

fn require_numeric(column: &ResolvedColumn, role: &'static str) -> Result<(), ChartError> {
    if is_numeric(&column.data_type) {
        Ok(())
    } else {
        Err(ChartError::TypeMismatch {
            column: column.name.clone(),
            role,
            actual: column.data_type.to_string(),
        })
    }
}

fn is_numeric(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}
