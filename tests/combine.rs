mod common;

use std::collections::BTreeSet;

use common::{TestWorkspace, fixture_path, loaded, table};
use pivot_builder::{
    combine::{PROVENANCE_FIELD, build_combined_dataset, build_combined_dataset_or_empty},
    data::{Value, display_cell},
    error::BuildError,
    files::{self, LoadOptions, LoadedFile},
    io_utils,
    matching::build_initial_mapping,
    normalize::NormalizationRule,
    pivot::{apply_filters, build_pivot},
    pivot_config::{Aggregation, PivotSpec},
};
use proptest::prelude::*;

fn combine_default(files: &[LoadedFile]) -> pivot_builder::frame::Table {
    let mapping =
        build_initial_mapping(&files::files_columns(files), &NormalizationRule::default());
    build_combined_dataset(files, &mapping).expect("combine")
}

#[test]
fn reformatted_headers_combine_into_one_schema() {
    let files = vec![
        loaded("file1.csv", &["Name", "Sales"], &[&["ann", "3"], &["bob", "4"]]),
        loaded("file2.csv", &[" name ", " sales "], &[&["cy", "5"]]),
    ];
    let combined = combine_default(&files);
    assert_eq!(combined.headers(), ["name", "sales", PROVENANCE_FIELD]);
    assert_eq!(combined.row_count(), 3);
    assert_eq!(
        combined.rows()[2],
        vec![
            Some(Value::from("cy")),
            Some(Value::Integer(5)),
            Some(Value::from("file2.csv"))
        ]
    );
}

#[test]
fn fields_absent_from_a_file_are_missing_not_zero() {
    let files = vec![
        loaded("a.csv", &["region", "amount"], &[&["east", "1"]]),
        loaded("b.csv", &["region", "notes"], &[&["west", "late"]]),
    ];
    let combined = combine_default(&files);
    assert_eq!(combined.headers(), ["amount", "notes", "region", PROVENANCE_FIELD]);
    assert_eq!(combined.cell(0, 1), None);
    assert_eq!(combined.cell(1, 0), None);
    assert_eq!(combined.cell(1, 1), Some(&Value::from("late")));
}

#[test]
fn unloaded_and_unmapped_files_contribute_no_rows() {
    let mut files = vec![
        loaded("a.csv", &["region"], &[&["east"]]),
        loaded("b.csv", &["Notes"], &[&["x"], &["y"]]),
        LoadedFile::new(std::path::Path::new("broken.csv")),
    ];
    files[2].status = pivot_builder::files::FileStatus::Error("unreadable".into());
    let mut mapping =
        build_initial_mapping(&files::files_columns(&files), &NormalizationRule::default());
    mapping.set_canonical_for("b.csv", "Notes", None);

    let combined = build_combined_dataset(&files, &mapping).expect("combine");
    assert_eq!(combined.row_count(), 1);
    assert_eq!(combined.headers(), ["region", PROVENANCE_FIELD]);
}

#[test]
fn no_loaded_files_or_fields_yield_empty_table() {
    let mapping = build_initial_mapping(&Default::default(), &NormalizationRule::default());
    let combined = build_combined_dataset(&[], &mapping).expect("combine");
    assert_eq!(combined.column_count(), 0);
    assert_eq!(combined.row_count(), 0);
}

#[test]
fn provenance_name_collision_is_reported() {
    let files = vec![loaded("a.csv", &["__source_file"], &[&["x"]])];
    let mapping =
        build_initial_mapping(&files::files_columns(&files), &NormalizationRule::default());
    let err = build_combined_dataset(&files, &mapping).expect_err("collision");
    assert_eq!(err, BuildError::DuplicateColumn(PROVENANCE_FIELD.to_string()));
    assert_eq!(build_combined_dataset_or_empty(&files, &mapping).column_count(), 0);
}

#[test]
fn fixture_files_load_and_combine() {
    let options = LoadOptions {
        encoding: io_utils::resolve_encoding(None).expect("utf-8"),
        ..LoadOptions::default()
    };
    let files: Vec<LoadedFile> = ["sales_q1.csv", "sales_q2.csv"]
        .iter()
        .map(|name| LoadedFile::load(&fixture_path(name), &options))
        .collect();
    assert!(files.iter().all(LoadedFile::is_loaded));

    let combined = combine_default(&files);
    assert_eq!(
        combined.headers(),
        ["amount", "notes", "product", "region", PROVENANCE_FIELD]
    );
    assert_eq!(combined.row_count(), 5);
    assert_eq!(combined.cell(3, 0), Some(&Value::Integer(3)));
    assert_eq!(combined.cell(4, 1), None);
    assert_eq!(combined.cell(4, 4), Some(&Value::from("sales_q2.csv")));
}

fn load_written(workspace: &TestWorkspace, inputs: &[(&str, &str)]) -> Vec<LoadedFile> {
    inputs
        .iter()
        .map(|(name, contents)| {
            LoadedFile::load(&workspace.write(name, contents), &LoadOptions::default())
        })
        .collect()
}

#[test]
fn year_read_as_number_in_one_file_and_text_in_another_groups_once() {
    let workspace = TestWorkspace::new();
    let files = load_written(
        &workspace,
        &[
            ("a.csv", "year,amount\n2023,10\n2024,5\n"),
            ("b.csv", "Year,Amount\n2023,7\nFY25,1\n"),
        ],
    );
    assert_eq!(files[0].table.as_ref().unwrap().cell(0, 0), Some(&Value::Integer(2023)));
    let combined = combine_default(&files);
    assert_eq!(combined.cell(0, 1), Some(&Value::from("2023")));
    assert_eq!(combined.cell(0, 0), Some(&Value::Integer(10)));

    let mut by_row = PivotSpec::default();
    by_row.add_row("year");
    by_row.add_value("amount", Aggregation::Sum);
    let pivot = build_pivot(&combined, &by_row).expect("rows pivot");
    assert_eq!(pivot.headers(), ["year", "amount"]);
    assert_eq!(pivot.cell(0, 0), Some(&Value::from("2023")));
    let groups: Vec<(String, Option<&Value>)> = (0..pivot.row_count())
        .map(|row| (display_cell(pivot.cell(row, 0)), pivot.cell(row, 1)))
        .collect();
    assert_eq!(
        groups,
        vec![
            ("2023".to_string(), Some(&Value::Integer(17))),
            ("2024".to_string(), Some(&Value::Integer(5))),
            ("FY25".to_string(), Some(&Value::Integer(1))),
        ]
    );

    let mut by_column = PivotSpec::default();
    by_column.add_column("year");
    by_column.add_value("amount", Aggregation::Sum);
    let pivot = build_pivot(&combined, &by_column).expect("columns pivot");
    assert_eq!(pivot.headers(), ["amount_2023", "amount_2024", "amount_FY25"]);
    assert_eq!(
        pivot.rows()[0],
        vec![
            Some(Value::Integer(17)),
            Some(Value::Integer(5)),
            Some(Value::Integer(1))
        ]
    );
}

#[test]
fn yes_no_values_are_kept_as_written_and_filterable() {
    let workspace = TestWorkspace::new();
    let files = load_written(
        &workspace,
        &[("members.csv", "region,member,amount\neast,Yes,10\nwest,No,7\n")],
    );
    let combined = combine_default(&files);
    assert_eq!(combined.headers()[1], "member");
    assert_eq!(combined.cell(0, 1), Some(&Value::from("Yes")));

    let mut spec = PivotSpec::default();
    spec.add_row("region");
    spec.add_value("amount", Aggregation::Sum);
    spec.add_filter("member=Yes").expect("filter");
    assert_eq!(apply_filters(&combined, &spec.filters).len(), 1);
    let pivot = build_pivot(&combined, &spec).expect("pivot");
    assert_eq!(pivot, table(&["region", "amount"], &[&["east", "10"]]));
}

fn file_strategy() -> impl Strategy<Value = (Vec<String>, usize)> {
    (
        proptest::collection::btree_set("[a-e]{1,3}", 1..4),
        0usize..5,
    )
        .prop_map(|(columns, rows)| (columns.into_iter().collect(), rows))
}

proptest! {
    #[test]
    fn combined_shape_follows_inputs(inputs in proptest::collection::vec(file_strategy(), 1..4)) {
        let files: Vec<LoadedFile> = inputs
            .iter()
            .enumerate()
            .map(|(idx, (columns, rows))| {
                let headers: Vec<&str> = columns.iter().map(String::as_str).collect();
                let cells: Vec<Vec<&str>> = (0..*rows).map(|_| vec!["1"; headers.len()]).collect();
                let cell_refs: Vec<&[&str]> = cells.iter().map(Vec::as_slice).collect();
                LoadedFile::from_table(&format!("f{idx}.csv"), table(&headers, &cell_refs))
            })
            .collect();
        let mapping =
            build_initial_mapping(&files::files_columns(&files), &NormalizationRule::default());
        let combined = build_combined_dataset(&files, &mapping).expect("combine");

        let expected_rows: usize = inputs.iter().map(|(_, rows)| rows).sum();
        prop_assert_eq!(combined.row_count(), expected_rows);

        let mut expected_columns: BTreeSet<String> =
            mapping.canonical_names().into_iter().collect();
        expected_columns.insert(PROVENANCE_FIELD.to_string());
        let actual: BTreeSet<String> = combined.headers().iter().cloned().collect();
        prop_assert_eq!(actual, expected_columns);
    }
}
