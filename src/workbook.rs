//! Excel workbook input.
//!
//! Workbooks are opened with calamine (xlsx, xls, xlsb and ods are detected
//! from the file). One sheet is read into a typed [`Table`]: its first row
//! holds the headers and every later row is data. Cells keep the kind the
//! workbook stored, with integral numbers read as integers so that a workbook
//! and a CSV export of it combine into the same values.

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use calamine::{Data, Reader, Sheets, open_workbook_auto};
use log::{debug, warn};

use crate::{
    data::Value,
    frame::{Row, Table},
};

/// A sheet read from a workbook. `selected` is false when the workbook has
/// several sheets and none was requested, in which case the first one is read.
#[derive(Debug, Clone)]
pub struct SheetTable {
    pub sheet: String,
    pub selected: bool,
    pub table: Table,
}

/// Reads `requested`, or the only sheet of a single-sheet workbook.
pub fn read_sheet(path: &Path, requested: Option<&str>) -> Result<SheetTable> {
    let mut workbook = open(path)?;
    let names = workbook.sheet_names().to_vec();
    let Some(first) = names.first() else {
        bail!("Workbook contains no sheets");
    };

    let (sheet, selected) = match requested {
        Some(name) if names.iter().any(|n| n == name) => (name.to_string(), true),
        Some(name) => bail!(
            "Sheet '{name}' not found; available sheets: {}",
            names.join(", ")
        ),
        None if names.len() == 1 => (first.clone(), true),
        None => {
            warn!(
                "{path:?} has {} sheets; reading '{first}' until one is chosen with --sheet",
                names.len()
            );
            (first.clone(), false)
        }
    };

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| anyhow!("Failed to read sheet '{sheet}': {e}"))?;
    let (height, width) = range.get_size();
    debug!("Sheet '{sheet}' spans {height} row(s) x {width} column(s)");

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .enumerate()
            .map(|(idx, cell)| header_text(idx, cell))
            .collect(),
        None => Vec::new(),
    };
    let mut table = Table::with_headers(headers)
        .with_context(|| format!("Reading headers of sheet '{sheet}'"))?;
    for data_row in rows {
        let row: Row = data_row.iter().map(cell_value).collect();
        if row.iter().all(Option::is_none) {
            continue;
        }
        table.push_row(row)?;
    }
    Ok(SheetTable {
        sheet,
        selected,
        table,
    })
}

fn open(path: &Path) -> Result<Sheets<std::io::BufReader<std::fs::File>>> {
    open_workbook_auto(path).map_err(|e| anyhow!("Failed to open workbook {path:?}: {e}"))
}

fn header_text(idx: usize, cell: &Data) -> String {
    match cell_value(cell) {
        Some(value) => value.as_display(),
        None => format!("column_{}", idx + 1),
    }
}

fn cell_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(Value::String(s.clone())),
        Data::Int(n) => Some(Value::Integer(*n)),
        Data::Float(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
            Some(Value::Integer(*n as i64))
        }
        Data::Float(n) => Some(Value::Float(*n)),
        Data::Bool(b) => Some(Value::Boolean(*b)),
        // date serials, as the workbook stores them
        Data::DateTime(dt) => Some(Value::Float(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::String(s.clone())),
    }
}
