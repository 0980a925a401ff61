mod common;

use std::path::{Path, PathBuf};

use common::TestWorkspace;
use pivot_builder::{
    combine::build_combined_dataset,
    data::Value,
    files::{self, FileStatus, LoadOptions, LoadedFile},
    matching::build_initial_mapping,
    normalize::NormalizationRule,
    validation::{ValidationInput, validate_all},
};
use rust_xlsxwriter::Workbook;

/// Writes a workbook with one sheet per `(name, rows)` pair; the first row of
/// each sheet is its header.
fn write_workbook(workspace: &TestWorkspace, file: &str, sheets: &[(&str, &[&[&str]])]) -> PathBuf {
    let path = workspace.path().join(file);
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name).expect("sheet name");
        for (row_idx, row) in rows.iter().enumerate() {
            for (col, cell) in row.iter().enumerate() {
                let (row_idx, col) = (row_idx as u32, col as u16);
                let written = match cell.parse::<f64>() {
                    Ok(number) => worksheet.write_number(row_idx, col, number),
                    Err(_) => worksheet.write_string(row_idx, col, *cell),
                };
                written.expect("write cell");
            }
        }
    }
    workbook.save(&path).expect("save workbook");
    path
}

fn load_with_sheet(path: &Path, sheet: Option<&str>) -> LoadedFile {
    let options = LoadOptions {
        sheet: sheet.map(str::to_string),
        ..LoadOptions::default()
    };
    LoadedFile::load(path, &options)
}

fn quarterly_book(workspace: &TestWorkspace) -> PathBuf {
    write_workbook(
        workspace,
        "sales.xlsx",
        &[
            ("Q1", &[&["Region", "Amount"], &["east", "10"], &["west", "7"]]),
            ("Q2", &[&["region", "amount"], &["east", "3"]]),
        ],
    )
}

#[test]
fn single_sheet_workbook_selects_its_sheet() {
    let workspace = TestWorkspace::new();
    let path = write_workbook(
        &workspace,
        "north.xlsx",
        &[("North", &[&["Region", "Amount"], &["north", "2.5"]])],
    );
    let file = load_with_sheet(&path, None);
    assert!(file.is_loaded());
    assert_eq!(file.selected_sheet.as_deref(), Some("North"));
    assert_eq!(file.display_name(), "north.xlsx [North]");
    let table = file.table.as_ref().unwrap();
    assert_eq!(table.headers(), ["Region", "Amount"]);
    assert_eq!(table.cell(0, 1), Some(&Value::Float(2.5)));
}

#[test]
fn requested_sheet_is_read_and_named_in_provenance() {
    let workspace = TestWorkspace::new();
    let path = quarterly_book(&workspace);
    let files = vec![load_with_sheet(&path, Some("Q2"))];
    assert_eq!(files[0].selected_sheet.as_deref(), Some("Q2"));

    let mapping =
        build_initial_mapping(&files::files_columns(&files), &NormalizationRule::default());
    let combined = build_combined_dataset(&files, &mapping).expect("combine");
    assert_eq!(combined.row_count(), 1);
    assert_eq!(combined.cell(0, 0), Some(&Value::Integer(3)));
    assert_eq!(combined.cell(0, 2), Some(&Value::from("sales.xlsx [Q2]")));
}

#[test]
fn multi_sheet_workbook_without_selection_reads_first_sheet_and_warns() {
    let workspace = TestWorkspace::new();
    let path = quarterly_book(&workspace);
    let files = vec![load_with_sheet(&path, None)];
    assert!(files[0].is_loaded());
    assert_eq!(files[0].selected_sheet, None);
    assert_eq!(files[0].table.as_ref().unwrap().row_count(), 2);

    let report = validate_all(&ValidationInput {
        files: &files,
        ..Default::default()
    });
    assert!(report.has_code("MISSING_SHEET_SELECTION"));
}

#[test]
fn unknown_sheet_is_a_load_error() {
    let workspace = TestWorkspace::new();
    let path = quarterly_book(&workspace);
    let file = load_with_sheet(&path, Some("Q9"));
    assert!(!file.is_loaded());
    let FileStatus::Error(message) = &file.status else {
        panic!("expected load error, got {}", file.status);
    };
    assert!(message.contains("Q9"));
    assert!(message.contains("Q1, Q2"));
}
