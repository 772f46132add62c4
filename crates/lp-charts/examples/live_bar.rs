//! Bind a bar chart to an in-memory table and print every publication.

use std::sync::Arc;

use anyhow::Result;
use arrow::datatypes::{DataType, Field, Schema};
use lp_charts::{bar, BarArgs};
use lp_core::{CellValue, ErrorKind};
use lp_figure::{FigurePatch, FigureSink, FigureSpec};
use lp_table::MemTable;

struct PrintSink;

impl FigureSink for PrintSink {
    fn on_figure(&self, figure: &FigureSpec) {
        let json = serde_json::to_string_pretty(figure).unwrap_or_default();
        println!("figure:\n{json}");
    }

    fn on_patch(&self, patch: &FigurePatch) {
        let json = serde_json::to_string(patch).unwrap_or_default();
        println!("patch: {json}");
    }

    fn on_error(&self, kind: ErrorKind, message: &str) {
        eprintln!("chart failed ({kind:?}): {message}");
    }
}

fn row(category: &str, value: i64) -> Vec<CellValue> {
    vec![CellValue::from(category), CellValue::Int(value)]
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let schema = Arc::new(Schema::new(vec![
        Field::new("Category", DataType::Utf8, false),
        Field::new("Value", DataType::Int64, false),
    ]));
    let table = Arc::new(MemTable::new(schema));
    let keys = table.add_rows(vec![row("A", 1), row("B", 3), row("C", 5)])?;

    // initial figure arrives synchronously
    let chart = bar(
        table.clone(),
        BarArgs::new("Category").y("Value"),
        Arc::new(PrintSink),
    )?;

    // every tick publishes a patch (or a full figure on shape changes)
    table.add_row(row("A", 10))?;
    table.update_row(keys[2], row("C", 6))?;
    table.remove_row(keys[1])?;

    chart.close();
    Ok(())
}
