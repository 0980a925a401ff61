use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use log::info;
use rust_xlsxwriter::{Format, Workbook};
use serde_json::{Map, Value as JsonValue};

use crate::{
    data::{Value, display_cell},
    frame::Table,
    io_utils,
};

/// Writes the table as delimited text; missing cells are written empty.
/// `None` or `-` writes to stdout.
pub fn write_csv(table: &Table, path: Option<&Path>) -> Result<()> {
    let delimiter = io_utils::resolve_output_delimiter(path);
    let mut writer = io_utils::open_csv_writer(path, delimiter)?;
    writer
        .write_record(table.headers())
        .context("Writing output headers")?;
    for (row_idx, row) in table.rows().iter().enumerate() {
        writer
            .write_record(row.iter().map(|cell| display_cell(cell.as_ref())))
            .with_context(|| format!("Writing row {}", row_idx + 1))?;
    }
    writer.flush().context("Flushing CSV output")?;
    info!("Wrote {} row(s) as CSV", table.row_count());
    Ok(())
}

/// One JSON object per row keyed by column name; missing cells are `null`.
pub fn to_json_records(table: &Table) -> JsonValue {
    let records = table
        .rows()
        .iter()
        .map(|row| {
            let object: Map<String, JsonValue> = table
                .headers()
                .iter()
                .zip(row)
                .map(|(header, cell)| (header.clone(), cell_to_json(cell.as_ref())))
                .collect();
            JsonValue::Object(object)
        })
        .collect();
    JsonValue::Array(records)
}

pub fn write_json_records(table: &Table, path: Option<&Path>) -> Result<()> {
    let records = to_json_records(table);
    let mut writer: Box<dyn Write> = match path {
        Some(p) if !io_utils::is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };
    serde_json::to_writer_pretty(&mut writer, &records).context("Writing JSON records")?;
    writeln!(writer)?;
    writer.flush()?;
    info!("Wrote {} row(s) as JSON", table.row_count());
    Ok(())
}

/// Writes the table to the first worksheet of a new workbook with a bold
/// header row. Missing cells are left blank.
pub fn write_xlsx(table: &Table, path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    for (col, header) in table.headers().iter().enumerate() {
        worksheet
            .write_string_with_format(0, sheet_column(col)?, header, &header_format)
            .with_context(|| format!("Writing header '{header}'"))?;
    }
    for (row_idx, row) in table.rows().iter().enumerate() {
        let sheet_row = u32::try_from(row_idx + 1).context("Too many rows for a worksheet")?;
        for (col, cell) in row.iter().enumerate() {
            let col = sheet_column(col)?;
            let written = match cell {
                None => continue,
                Some(Value::String(s)) => worksheet.write_string(sheet_row, col, s),
                Some(Value::Integer(i)) => worksheet.write_number(sheet_row, col, *i as f64),
                Some(Value::Float(f)) => worksheet.write_number(sheet_row, col, *f),
                Some(Value::Boolean(b)) => worksheet.write_boolean(sheet_row, col, *b),
            };
            written.with_context(|| format!("Writing row {}", row_idx + 1))?;
        }
    }
    workbook
        .save(path)
        .with_context(|| format!("Saving workbook {path:?}"))?;
    info!("Wrote {} row(s) as XLSX", table.row_count());
    Ok(())
}

fn sheet_column(col: usize) -> Result<u16> {
    u16::try_from(col).context("Too many columns for a worksheet")
}

fn cell_to_json(cell: Option<&Value>) -> JsonValue {
    match cell {
        None => JsonValue::Null,
        Some(Value::String(s)) => JsonValue::String(s.clone()),
        Some(Value::Integer(i)) => JsonValue::from(*i),
        Some(Value::Float(f)) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Some(Value::Boolean(b)) => JsonValue::Bool(*b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_records_keep_numbers_and_nulls() {
        let table = Table::from_rows(
            vec!["region".into(), "amount".into(), "ratio".into()],
            vec![vec![Some("east".into()), Some(Value::Integer(15)), None]],
        )
        .unwrap();
        assert_eq!(
            to_json_records(&table),
            json!([{ "region": "east", "amount": 15, "ratio": null }])
        );
    }

    #[test]
    fn write_csv_leaves_missing_cells_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let table = Table::from_rows(
            vec!["a".into(), "b".into()],
            vec![vec![Some(Value::Float(1.5)), None]],
        )
        .unwrap();
        write_csv(&table, Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n1.5,\n");
    }

    #[test]
    fn write_xlsx_keeps_cell_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let table = Table::from_rows(
            vec!["region".into(), "amount".into(), "rush".into()],
            vec![
                vec![Some("east".into()), Some(Value::Integer(15)), Some(Value::Boolean(true))],
                vec![Some("west".into()), Some(Value::Float(7.5)), None],
            ],
        )
        .unwrap();
        write_xlsx(&table, &path).unwrap();

        let read = crate::workbook::read_sheet(&path, None).unwrap();
        assert!(read.selected);
        assert_eq!(read.table, table);
    }
}
