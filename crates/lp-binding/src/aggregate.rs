//! Incremental per-partition aggregation

use indexmap::IndexMap;

use lp_core::{Aggregation, CellValue, ChartError, OutOfRange};

use crate::trace::AppliedDelta;

/// Running aggregate state for one partition.
///
/// Contributions of added rows are added, of removed rows subtracted,
/// and of modified rows replaced (old out, new in); the running value
/// always equals a from-scratch recomputation over the tracked rows.
pub enum AggregateState {
    Grouped(GroupedAggregate),
    Histogram(HistogramAggregate),
}

impl AggregateState {
    /// Build the state matching an aggregation spec. `x_pos`/`y_pos`
    /// locate the group and value columns within the trace buffer's
    /// projection.
    pub fn new(aggregation: &Aggregation, x_pos: Option<usize>, y_pos: Option<usize>) -> Self {
        match aggregation {
            Aggregation::CountBy => AggregateState::Grouped(GroupedAggregate {
                kind: GroupedKind::Count,
                x_pos: x_pos.unwrap_or(0),
                y_pos,
                groups: IndexMap::new(),
            }),
            Aggregation::SumBy => AggregateState::Grouped(GroupedAggregate {
                kind: GroupedKind::Sum,
                x_pos: x_pos.unwrap_or(0),
                y_pos,
                groups: IndexMap::new(),
            }),
            Aggregation::AvgBy => AggregateState::Grouped(GroupedAggregate {
                kind: GroupedKind::Avg,
                x_pos: x_pos.unwrap_or(0),
                y_pos,
                groups: IndexMap::new(),
            }),
            Aggregation::Histogram {
                nbins,
                min,
                max,
                out_of_range,
            } => AggregateState::Histogram(HistogramAggregate {
                nbins: *nbins,
                min: *min,
                max: *max,
                width: (*max - *min) / *nbins as f64,
                out_of_range: *out_of_range,
                value_pos: x_pos.unwrap_or(0),
                counts: vec![0; *nbins + 1],
            }),
        }
    }

    pub fn apply(&mut self, delta: &AppliedDelta) -> Result<(), ChartError> {
        match self {
            AggregateState::Grouped(state) => state.apply(delta),
            AggregateState::Histogram(state) => state.apply(delta),
        }
    }

    /// Materialize the aggregated (x, y) series for this partition.
    pub fn series(&self) -> (Vec<CellValue>, Vec<CellValue>) {
        match self {
            AggregateState::Grouped(state) => state.series(),
            AggregateState::Histogram(state) => state.series(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupedKind {
    Count,
    Sum,
    Avg,
}

#[derive(Debug, Clone, Copy, Default)]
struct GroupEntry {
    count: i64,
    sum: f64,
}

/// Count/sum/avg keyed by the group column's value, in
/// first-observation order.
///
/// A group keeps its slot for the whole batch, even through zero
/// membership; emptied groups are dropped only once the batch is fully
/// applied, so the series order matches what a rebuild over the same
/// rows would produce.
pub struct GroupedAggregate {
    kind: GroupedKind,
    x_pos: usize,
    y_pos: Option<usize>,
    groups: IndexMap<CellValue, GroupEntry>,
}

impl GroupedAggregate {
    fn apply(&mut self, delta: &AppliedDelta) -> Result<(), ChartError> {
        for (_, values) in &delta.removed {
            self.remove(values)?;
        }
        for (_, old, new) in &delta.modified {
            // a modify within one group adjusts the entry in place so
            // the group does not lose its slot
            let group = self.group_of(old);
            if group == self.group_of(new) {
                let adjustment = self.contribution(new) - self.contribution(old);
                let Some(entry) = self.groups.get_mut(&group) else {
                    return Err(ChartError::InconsistentDelta(format!(
                        "modify of unseen group {group}"
                    )));
                };
                entry.sum += adjustment;
            } else {
                self.remove(old)?;
                self.add(new);
            }
        }
        for (_, values) in &delta.added {
            self.add(values);
        }
        self.groups.retain(|_, entry| entry.count > 0);
        Ok(())
    }

    fn add(&mut self, values: &[CellValue]) {
        let group = self.group_of(values);
        let contribution = self.contribution(values);
        let entry = self.groups.entry(group).or_default();
        entry.count += 1;
        entry.sum += contribution;
    }

    fn remove(&mut self, values: &[CellValue]) -> Result<(), ChartError> {
        let group = self.group_of(values);
        let contribution = self.contribution(values);
        let Some(entry) = self.groups.get_mut(&group) else {
            return Err(ChartError::InconsistentDelta(format!(
                "removal from unseen group {group}"
            )));
        };
        if entry.count == 0 {
            return Err(ChartError::InconsistentDelta(format!(
                "membership underflow for group {group}"
            )));
        }
        entry.count -= 1;
        entry.sum -= contribution;
        Ok(())
    }

    fn series(&self) -> (Vec<CellValue>, Vec<CellValue>) {
        let xs = self.groups.keys().cloned().collect();
        let ys = self
            .groups
            .values()
            .map(|entry| match self.kind {
                GroupedKind::Count => CellValue::Int(entry.count),
                GroupedKind::Sum => CellValue::Float(entry.sum),
                GroupedKind::Avg => CellValue::Float(entry.sum / entry.count as f64),
            })
            .collect();
        (xs, ys)
    }

    fn group_of(&self, values: &[CellValue]) -> CellValue {
        values.get(self.x_pos).cloned().unwrap_or(CellValue::Null)
    }

    // null values contribute zero to sums, symmetrically on add and
    // remove
    fn contribution(&self, values: &[CellValue]) -> f64 {
        self.y_pos
            .and_then(|pos| values.get(pos))
            .and_then(CellValue::as_f64)
            .unwrap_or(0.0)
    }
}

/// Fixed-bin histogram counts.
///
/// Bin edges are fixed at chart creation and never move; the
/// out-of-range policy decides whether late values outside `[min,
/// max)` land in one shared overflow bin or fail the chart.
pub struct HistogramAggregate {
    nbins: usize,
    min: f64,
    max: f64,
    width: f64,
    out_of_range: OutOfRange,
    value_pos: usize,
    /// One count per bin, plus the overflow bin at the end.
    counts: Vec<i64>,
}

impl HistogramAggregate {
    fn apply(&mut self, delta: &AppliedDelta) -> Result<(), ChartError> {
        for (_, values) in &delta.removed {
            self.update(values, -1)?;
        }
        for (_, old, new) in &delta.modified {
            self.update(old, -1)?;
            self.update(new, 1)?;
        }
        for (_, values) in &delta.added {
            self.update(values, 1)?;
        }
        Ok(())
    }

    fn update(&mut self, values: &[CellValue], step: i64) -> Result<(), ChartError> {
        // null values carry no contribution
        let Some(value) = values.get(self.value_pos).and_then(CellValue::as_f64) else {
            return Ok(());
        };
        let bin = self.bin_of(value)?;
        let count = &mut self.counts[bin];
        *count += step;
        if *count < 0 {
            return Err(ChartError::InconsistentDelta(format!(
                "histogram bin {bin} count went negative"
            )));
        }
        Ok(())
    }

    fn bin_of(&self, value: f64) -> Result<usize, ChartError> {
        if value >= self.min && value < self.max {
            let bin = ((value - self.min) / self.width) as usize;
            // guard against float rounding at the upper edge
            return Ok(bin.min(self.nbins - 1));
        }
        match self.out_of_range {
            OutOfRange::Overflow => Ok(self.nbins),
            OutOfRange::Error => Err(ChartError::BinRangeExceeded {
                value,
                min: self.min,
                max: self.max,
            }),
        }
    }

    fn series(&self) -> (Vec<CellValue>, Vec<CellValue>) {
        let mut xs: Vec<CellValue> = (0..self.nbins)
            .map(|bin| CellValue::Float(self.min + (bin as f64 + 0.5) * self.width))
            .collect();
        let mut ys: Vec<CellValue> = self.counts[..self.nbins]
            .iter()
            .map(|count| CellValue::Int(*count))
            .collect();
        // the overflow bin only appears once something landed in it
        if self.counts[self.nbins] > 0 {
            xs.push(CellValue::Float(self.max + 0.5 * self.width));
            ys.push(CellValue::Int(self.counts[self.nbins]));
        }
        (xs, ys)
    }
}
