//! End-to-end binding tests over an in-memory ticking table.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use parking_lot::Mutex;

use lp_binding::{bind, BindingState};
use lp_core::{
    Aggregation, CellValue, ChartKind, ChartRequest, ErrorKind, OutOfRange, Row, StyleOptions,
};
use lp_figure::{FigurePatch, FigureSink, FigureSpec};
use lp_table::{MemTable, TableUpdate};

#[derive(Default)]
struct CollectingSink {
    figures: Mutex<Vec<FigureSpec>>,
    patches: Mutex<Vec<FigurePatch>>,
    errors: Mutex<Vec<(ErrorKind, String)>>,
}

impl CollectingSink {
    fn figure_count(&self) -> usize {
        self.figures.lock().len()
    }

    fn patch_count(&self) -> usize {
        self.patches.lock().len()
    }

    fn last_figure(&self) -> FigureSpec {
        self.figures.lock().last().cloned().unwrap()
    }
}

impl FigureSink for CollectingSink {
    fn on_figure(&self, figure: &FigureSpec) {
        self.figures.lock().push(figure.clone());
    }

    fn on_patch(&self, patch: &FigurePatch) {
        self.patches.lock().push(patch.clone());
    }

    fn on_error(&self, kind: ErrorKind, message: &str) {
        self.errors.lock().push((kind, message.to_owned()));
    }
}

fn schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("Category", DataType::Utf8, true),
        Field::new("Value", DataType::Int64, false),
        Field::new("Weight", DataType::Float64, true),
    ]))
}

fn row(category: &str, value: i64, weight: f64) -> Row {
    vec![
        CellValue::from(category),
        CellValue::Int(value),
        CellValue::Float(weight),
    ]
}

fn bar_request(x: &str, y: Option<&str>) -> ChartRequest {
    let mut request = ChartRequest::new(ChartKind::Bar);
    request.x = Some(x.to_owned());
    request.y = y.map(|y| y.to_owned());
    request
}

fn xs(figure: &FigureSpec, trace: usize) -> Vec<CellValue> {
    figure.data[trace].x.clone()
}

fn ys(figure: &FigureSpec, trace: usize) -> Vec<CellValue> {
    figure.data[trace].y.clone()
}

#[test]
fn bar_seeds_from_snapshot_then_patches_row_changes() {
    let table = Arc::new(MemTable::new(schema()));
    let keys = table
        .add_rows(vec![row("A", 1, 0.5), row("B", 3, 0.5), row("C", 5, 0.5)])
        .unwrap();

    let sink = Arc::new(CollectingSink::default());
    let handle = bind(table.clone(), bar_request("Category", Some("Value")), sink.clone()).unwrap();

    assert_eq!(handle.state(), BindingState::Live);
    assert_eq!(sink.figure_count(), 1);
    let figure = sink.last_figure();
    assert_eq!(
        xs(&figure, 0),
        vec![
            CellValue::from("A"),
            CellValue::from("B"),
            CellValue::from("C")
        ]
    );
    assert_eq!(
        ys(&figure, 0),
        vec![CellValue::Int(1), CellValue::Int(3), CellValue::Int(5)]
    );

    // one batch: add another A row and remove B; rows keep their
    // first-observation order with new rows at the end
    table
        .apply(TableUpdate::new().add(row("A", 10, 0.5)).remove(keys[1]))
        .unwrap();

    assert_eq!(sink.figure_count(), 1, "data-only change must not republish");
    assert_eq!(sink.patch_count(), 1);
    let figure = handle.figure().unwrap();
    assert_eq!(
        xs(&figure, 0),
        vec![
            CellValue::from("A"),
            CellValue::from("C"),
            CellValue::from("A")
        ]
    );
    assert_eq!(
        ys(&figure, 0),
        vec![CellValue::Int(1), CellValue::Int(5), CellValue::Int(10)]
    );
}

#[test]
fn patched_figure_matches_a_fresh_rebuild() {
    let table = Arc::new(MemTable::new(schema()));
    let keys = table
        .add_rows(vec![row("A", 1, 0.5), row("B", 3, 0.5)])
        .unwrap();

    let mut request = ChartRequest::new(ChartKind::Scatter);
    request.x = Some("Value".to_owned());
    request.y = Some("Weight".to_owned());
    request.color = Some("Category".to_owned());

    let sink = Arc::new(CollectingSink::default());
    let live = bind(table.clone(), request.clone(), sink.clone()).unwrap();

    table.update_row(keys[0], row("A", 7, 0.9)).unwrap();
    table.add_row(row("B", 4, 0.1)).unwrap();
    assert_eq!(sink.patch_count(), 2);

    // a chart bound now sees only the final state; its initial figure
    // must equal the incrementally patched one
    let fresh_sink = Arc::new(CollectingSink::default());
    let fresh = bind(table.clone(), request, fresh_sink.clone()).unwrap();
    assert_eq!(live.figure(), fresh.figure());
}

#[test]
fn color_partitions_become_ordered_traces() {
    let table = Arc::new(MemTable::new(schema()));
    let keys = table
        .add_rows(vec![row("C", 5, 0.5), row("A", 1, 0.5), row("B", 3, 0.5)])
        .unwrap();

    let mut request = bar_request("Category", Some("Value"));
    request.color = Some("Category".to_owned());

    let sink = Arc::new(CollectingSink::default());
    let handle = bind(table.clone(), request, sink.clone()).unwrap();

    let figure = sink.last_figure();
    let names: Vec<_> = figure.data.iter().map(|t| t.name.clone().unwrap()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);
    assert_eq!(figure.layout.barmode.as_deref(), Some("group"));

    // removing the only C row retires its partition: full republication
    table.remove_row(keys[0]).unwrap();
    assert_eq!(sink.figure_count(), 2);
    let figure = handle.figure().unwrap();
    assert_eq!(figure.data.len(), 2);
    assert_eq!(figure.data[1].name.as_deref(), Some("B"));
}

#[test]
fn partition_through_zero_in_one_batch_stays_incremental() {
    let table = Arc::new(MemTable::new(schema()));
    let keys = table.add_rows(vec![row("A", 1, 0.5)]).unwrap();

    let mut request = bar_request("Category", Some("Value"));
    request.color = Some("Category".to_owned());

    let sink = Arc::new(CollectingSink::default());
    let handle = bind(table.clone(), request, sink.clone()).unwrap();

    // the A partition empties and refills within one batch
    table
        .apply(TableUpdate::new().remove(keys[0]).add(row("A", 9, 0.5)))
        .unwrap();

    assert_eq!(sink.figure_count(), 1);
    assert_eq!(sink.patch_count(), 1);
    assert_eq!(ys(&handle.figure().unwrap(), 0), vec![CellValue::Int(9)]);
}

#[test]
fn modify_crossing_partitions_moves_the_row() {
    let table = Arc::new(MemTable::new(schema()));
    let keys = table
        .add_rows(vec![row("A", 1, 0.5), row("B", 3, 0.5)])
        .unwrap();

    let mut request = ChartRequest::new(ChartKind::Scatter);
    request.x = Some("Value".to_owned());
    request.y = Some("Weight".to_owned());
    request.color = Some("Category".to_owned());

    let sink = Arc::new(CollectingSink::default());
    let handle = bind(table.clone(), request, sink.clone()).unwrap();

    // the A partition loses its only row, so this is a shape change
    table.update_row(keys[0], row("B", 1, 0.5)).unwrap();

    assert_eq!(sink.figure_count(), 2);
    let figure = handle.figure().unwrap();
    assert_eq!(figure.data.len(), 1);
    assert_eq!(figure.data[0].name.as_deref(), Some("B"));
    assert_eq!(
        xs(&figure, 0),
        vec![CellValue::Int(3), CellValue::Int(1)]
    );
}

#[test]
fn bar_without_y_counts_rows_per_category() {
    let table = Arc::new(MemTable::new(schema()));
    let keys = table
        .add_rows(vec![row("A", 1, 0.5), row("B", 3, 0.5), row("A", 5, 0.5)])
        .unwrap();

    let sink = Arc::new(CollectingSink::default());
    let handle = bind(table.clone(), bar_request("Category", None), sink.clone()).unwrap();

    let figure = sink.last_figure();
    assert_eq!(xs(&figure, 0), vec![CellValue::from("A"), CellValue::from("B")]);
    assert_eq!(ys(&figure, 0), vec![CellValue::Int(2), CellValue::Int(1)]);
    assert_eq!(
        figure.layout.yaxis.as_ref().unwrap().title.as_deref(),
        Some("count")
    );

    table.remove_row(keys[2]).unwrap();
    assert_eq!(
        ys(&handle.figure().unwrap(), 0),
        vec![CellValue::Int(1), CellValue::Int(1)]
    );
}

#[test]
fn sum_aggregation_tracks_modifies_like_a_recompute() {
    let table = Arc::new(MemTable::new(schema()));
    let keys = table
        .add_rows(vec![row("A", 2, 0.5), row("A", 3, 0.5), row("B", 4, 0.5)])
        .unwrap();

    let mut request = bar_request("Category", Some("Value"));
    request.aggregate = Some(Aggregation::SumBy);

    let sink = Arc::new(CollectingSink::default());
    let live = bind(table.clone(), request.clone(), sink.clone()).unwrap();
    assert_eq!(
        ys(&sink.last_figure(), 0),
        vec![CellValue::Float(5.0), CellValue::Float(4.0)]
    );

    table.update_row(keys[0], row("A", 10, 0.5)).unwrap();
    table.remove_row(keys[2]).unwrap();

    let fresh = bind(table.clone(), request, Arc::new(CollectingSink::default())).unwrap();
    assert_eq!(live.figure(), fresh.figure());
    assert_eq!(
        ys(&live.figure().unwrap(), 0),
        vec![CellValue::Float(13.0)]
    );
}

#[test]
fn modifying_a_groups_only_row_keeps_trace_order() {
    let table = Arc::new(MemTable::new(schema()));
    let keys = table
        .add_rows(vec![row("A", 2, 0.5), row("B", 4, 0.5)])
        .unwrap();

    let mut request = bar_request("Category", Some("Value"));
    request.aggregate = Some(Aggregation::SumBy);

    let sink = Arc::new(CollectingSink::default());
    let live = bind(table.clone(), request.clone(), sink.clone()).unwrap();

    // the A group has exactly one row; updating it must not move the
    // group to the end of the series
    table.update_row(keys[0], row("A", 7, 0.5)).unwrap();

    let figure = live.figure().unwrap();
    assert_eq!(xs(&figure, 0), vec![CellValue::from("A"), CellValue::from("B")]);
    assert_eq!(
        ys(&figure, 0),
        vec![CellValue::Float(7.0), CellValue::Float(4.0)]
    );

    let fresh = bind(table, request, Arc::new(CollectingSink::default())).unwrap();
    assert_eq!(live.figure(), fresh.figure());
}

#[test]
fn histogram_counts_into_fixed_bins() {
    let table = Arc::new(MemTable::new(schema()));
    table
        .add_rows(vec![row("A", 1, 0.1), row("A", 2, 0.45), row("A", 3, 0.55)])
        .unwrap();

    let mut request = ChartRequest::new(ChartKind::Histogram);
    request.x = Some("Weight".to_owned());
    request.aggregate = Some(Aggregation::Histogram {
        nbins: 2,
        min: 0.0,
        max: 1.0,
        out_of_range: OutOfRange::Overflow,
    });

    let sink = Arc::new(CollectingSink::default());
    let handle = bind(table.clone(), request, sink.clone()).unwrap();

    let figure = sink.last_figure();
    assert_eq!(figure.layout.bargap, Some(0.0));
    // bin centers at 0.25 and 0.75
    assert_eq!(
        xs(&figure, 0),
        vec![CellValue::Float(0.25), CellValue::Float(0.75)]
    );
    assert_eq!(ys(&figure, 0), vec![CellValue::Int(2), CellValue::Int(1)]);

    // a value past the range lands in the overflow bin, bins never move
    table.add_row(row("A", 4, 7.0)).unwrap();
    let figure = handle.figure().unwrap();
    assert_eq!(xs(&figure, 0).len(), 3);
    assert_eq!(ys(&figure, 0)[2], CellValue::Int(1));
}

#[test]
fn histogram_error_policy_fails_the_chart() {
    let table = Arc::new(MemTable::new(schema()));
    table.add_row(row("A", 1, 0.5)).unwrap();

    let mut request = ChartRequest::new(ChartKind::Histogram);
    request.x = Some("Weight".to_owned());
    request.aggregate = Some(Aggregation::Histogram {
        nbins: 2,
        min: 0.0,
        max: 1.0,
        out_of_range: OutOfRange::Error,
    });

    let sink = Arc::new(CollectingSink::default());
    let handle = bind(table.clone(), request, sink.clone()).unwrap();

    table.add_row(row("A", 2, 5.0)).unwrap();

    assert_eq!(handle.state(), BindingState::Failed);
    let errors = sink.errors.lock();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, ErrorKind::BinRangeExceeded);
    drop(errors);

    // the last good figure stays available; further ticks are ignored
    assert!(handle.figure().is_some());
    table.add_row(row("A", 3, 0.5)).unwrap();
    assert_eq!(sink.figure_count(), 1);
    assert_eq!(sink.patch_count(), 0);
}

#[test]
fn invalid_request_fails_before_subscribing() {
    let table = Arc::new(MemTable::new(schema()));
    table.add_row(row("A", 1, 0.5)).unwrap();

    let sink = Arc::new(CollectingSink::default());
    // bar y must be numeric
    let err = bind(table.clone(), bar_request("Value", Some("Category")), sink.clone());
    assert!(err.is_err());
    assert_eq!(sink.figure_count(), 0);

    // no subscriber was left behind
    table.add_row(row("B", 2, 0.5)).unwrap();
    assert_eq!(sink.figure_count(), 0);
    assert_eq!(sink.patch_count(), 0);
}

#[test]
fn close_stops_publication_and_detaches() {
    let table = Arc::new(MemTable::new(schema()));
    table.add_row(row("A", 1, 0.5)).unwrap();

    let sink = Arc::new(CollectingSink::default());
    let handle = bind(table.clone(), bar_request("Category", Some("Value")), sink.clone()).unwrap();

    handle.close();
    assert_eq!(handle.state(), BindingState::Closed);
    handle.close(); // idempotent

    table.add_row(row("B", 2, 0.5)).unwrap();
    assert_eq!(sink.figure_count(), 1);
    assert_eq!(sink.patch_count(), 0);
}

#[test]
fn dropping_the_handle_closes_the_chart() {
    let table = Arc::new(MemTable::new(schema()));
    table.add_row(row("A", 1, 0.5)).unwrap();

    let sink = Arc::new(CollectingSink::default());
    let handle = bind(table.clone(), bar_request("Category", Some("Value")), sink.clone()).unwrap();
    drop(handle);

    table.add_row(row("B", 2, 0.5)).unwrap();
    assert_eq!(sink.figure_count(), 1);
    assert_eq!(sink.patch_count(), 0);
}

#[test]
fn dropping_a_bound_column_fails_the_chart() {
    let table = Arc::new(MemTable::new(schema()));
    table.add_row(row("A", 1, 0.5)).unwrap();

    let sink = Arc::new(CollectingSink::default());
    let handle = bind(table.clone(), bar_request("Category", Some("Value")), sink.clone()).unwrap();

    table.drop_column("Value").unwrap();

    assert_eq!(handle.state(), BindingState::Failed);
    let errors = sink.errors.lock();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, ErrorKind::SchemaIncompatible);
}

#[test]
fn dropping_an_unbound_column_is_ignored() {
    let table = Arc::new(MemTable::new(schema()));
    table.add_row(row("A", 1, 0.5)).unwrap();

    let sink = Arc::new(CollectingSink::default());
    let handle = bind(table.clone(), bar_request("Category", Some("Value")), sink.clone()).unwrap();

    table.drop_column("Weight").unwrap();
    assert_eq!(handle.state(), BindingState::Live);
    assert!(sink.errors.lock().is_empty());
}

#[test]
fn buffers_track_exactly_the_live_rows() {
    use lp_binding::{PartitionIndex, TraceBuffer};
    use lp_core::{DeltaBatch, RowKey, RowModification};
    use std::collections::{BTreeSet, HashMap};

    let mut index = PartitionIndex::new(vec![0]);
    let mut buffers: HashMap<lp_binding::PartitionKey, TraceBuffer> = HashMap::new();
    let mut expected: BTreeSet<RowKey> = BTreeSet::new();

    let categories = ["A", "B", "C"];
    let mut batches = Vec::new();
    for i in 0..30u64 {
        let mut batch = DeltaBatch::default();
        batch
            .added
            .push((RowKey(i), row(categories[(i % 3) as usize], i as i64, 0.5)));
        if i >= 10 && i % 2 == 0 {
            batch.removed.push(RowKey(i - 10));
        }
        if i >= 5 && i % 5 == 0 {
            // move a row into another partition mid-sequence
            batch.modified.push(RowModification {
                key: RowKey(i - 5),
                old: row(categories[((i - 5) % 3) as usize], (i - 5) as i64, 0.5),
                new: row(categories[(i % 3) as usize], (i - 5) as i64, 0.5),
            });
        }
        batches.push(batch);
    }

    for batch in &batches {
        for (key, _) in &batch.added {
            expected.insert(*key);
        }
        for key in &batch.removed {
            expected.remove(key);
        }
        let routed = index.observe(batch).unwrap();
        for (partition, delta) in &routed.deltas {
            buffers
                .entry(partition.clone())
                .or_insert_with(|| TraceBuffer::new(vec![0, 1]))
                .apply(delta)
                .unwrap();
        }
        for partition in &routed.retired {
            buffers.remove(partition);
        }

        let tracked: BTreeSet<RowKey> = buffers
            .values()
            .flat_map(|buffer| buffer.keys())
            .collect();
        assert_eq!(tracked, expected, "buffers diverged from the row set");
    }
}

#[test]
fn axis_labels_prefer_style_overrides() {
    let table = Arc::new(MemTable::new(schema()));
    table.add_row(row("A", 1, 0.5)).unwrap();

    let mut request = bar_request("Category", Some("Value"));
    request.style = StyleOptions {
        title: Some("Totals".to_owned()),
        x_label: Some("Group".to_owned()),
        ..StyleOptions::default()
    };

    let sink = Arc::new(CollectingSink::default());
    bind(table, request, sink.clone()).unwrap();

    let layout = &sink.last_figure().layout;
    assert_eq!(layout.title.as_deref(), Some("Totals"));
    assert_eq!(layout.xaxis.as_ref().unwrap().title.as_deref(), Some("Group"));
    assert_eq!(layout.yaxis.as_ref().unwrap().title.as_deref(), Some("Value"));
}

#[test]
fn faceted_scatter_lays_traces_on_a_grid() {
    let table = Arc::new(MemTable::new(schema()));
    table
        .add_rows(vec![row("A", 1, 0.1), row("B", 2, 0.2)])
        .unwrap();

    let mut request = ChartRequest::new(ChartKind::Scatter);
    request.x = Some("Value".to_owned());
    request.y = Some("Weight".to_owned());
    request.facet = Some("Category".to_owned());

    let sink = Arc::new(CollectingSink::default());
    let handle = bind(table.clone(), request, sink.clone()).unwrap();

    let figure = handle.figure().unwrap();
    let grid = figure.layout.grid.as_ref().unwrap();
    assert_eq!((grid.rows, grid.columns), (1, 2));
    assert_eq!(figure.data[0].xaxis.as_deref(), Some("x"));
    assert_eq!(figure.data[1].xaxis.as_deref(), Some("x2"));
    // the referenced axes exist in the layout, with the shared titles
    let xaxis2 = figure.layout.facet_axes.get("xaxis2").unwrap();
    assert_eq!(xaxis2.title.as_deref(), Some("Value"));
    assert!(figure.layout.facet_axes.contains_key("yaxis2"));
}

#[test]
fn area_chart_plots_filled_lines() {
    let table = Arc::new(MemTable::new(schema()));
    table
        .add_rows(vec![row("A", 1, 0.1), row("A", 2, 0.3)])
        .unwrap();

    let mut request = ChartRequest::new(ChartKind::Area);
    request.x = Some("Value".to_owned());
    request.y = Some("Weight".to_owned());

    let sink = Arc::new(CollectingSink::default());
    let handle = bind(table.clone(), request, sink.clone()).unwrap();

    let figure = handle.figure().unwrap();
    assert_eq!(figure.data[0].kind, "scatter");
    assert_eq!(figure.data[0].mode.as_deref(), Some("lines"));
    assert_eq!(figure.data[0].fill.as_deref(), Some("tozeroy"));

    table.add_row(row("A", 3, 0.6)).unwrap();
    assert_eq!(sink.patch_count(), 1);
    assert_eq!(
        ys(&handle.figure().unwrap(), 0),
        vec![
            CellValue::Float(0.1),
            CellValue::Float(0.3),
            CellValue::Float(0.6)
        ]
    );
}
