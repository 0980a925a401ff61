//! Combined dataset construction.
//!
//! Each loaded file is projected onto the canonical schema: mapped columns are
//! copied under their canonical names, canonical fields the file does not
//! provide are filled with the missing-value marker, and a provenance column
//! records the file's display name. The projections are then concatenated by
//! column name into one table. A canonical field whose files disagree on the
//! cell kind is rendered as text throughout, so `2023` read as a number in
//! one file and as text in another still lands in a single group.

use std::collections::HashMap;

use log::{debug, error, info, warn};

use crate::{
    data::Value,
    dtype::{self, ColumnKind},
    error::BuildError,
    files::LoadedFile,
    frame::{Row, Table},
    matching::ColumnMapping,
};

pub const PROVENANCE_FIELD: &str = "__source_file";

/// Builds the combined table over the union of canonical fields.
///
/// No loaded files or no canonical fields yields an empty table. Files
/// without any assigned column are skipped entirely.
pub fn build_combined_dataset(
    files: &[LoadedFile],
    mapping: &ColumnMapping,
) -> Result<Table, BuildError> {
    if !files.iter().any(LoadedFile::is_loaded) {
        warn!("No loaded files to combine");
        return Ok(Table::empty());
    }
    if mapping.is_empty() {
        warn!("No canonical fields defined; nothing to combine");
        return Ok(Table::empty());
    }

    let canonical = mapping.canonical_names();
    let mut projections = Vec::with_capacity(files.len());
    for file in files.iter().filter(|f| f.is_loaded()) {
        match project_file(file, mapping, &canonical)? {
            Some(projection) => projections.push(projection),
            None => info!(
                "Skipping '{}': no columns mapped to canonical fields",
                file.display_name()
            ),
        }
    }

    let mut combined = concatenate(&projections)?;
    harmonize_kinds(&mut combined);
    info!(
        "Combined {} file(s) into {} row(s) x {} column(s)",
        projections.len(),
        combined.row_count(),
        combined.column_count()
    );
    Ok(combined)
}

/// Same as [`build_combined_dataset`], but structural failures are logged
/// and reported as an empty table.
pub fn build_combined_dataset_or_empty(files: &[LoadedFile], mapping: &ColumnMapping) -> Table {
    build_combined_dataset(files, mapping).unwrap_or_else(|err| {
        error!("Failed to build combined dataset: {err}");
        Table::empty()
    })
}

/// Re-expresses one file's table in canonical column names.
///
/// Returns `Ok(None)` when the file is not loaded or has no assigned columns.
pub fn project_file(
    file: &LoadedFile,
    mapping: &ColumnMapping,
    canonical: &[String],
) -> Result<Option<Table>, BuildError> {
    let Some(table) = file.table.as_ref() else {
        return Ok(None);
    };
    let pairs = mapping.assigned_pairs(&file.id);
    if pairs.is_empty() {
        return Ok(None);
    }
    let display_name = file.display_name();

    let positions: HashMap<&str, usize> = canonical
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();
    let mut sources: Vec<Option<usize>> = vec![None; canonical.len()];
    for (original, canonical_name) in pairs {
        let Some(&target) = positions.get(canonical_name) else {
            continue;
        };
        match table.column_index(original) {
            // later columns win when several collapse onto one field
            Some(source) => sources[target] = Some(source),
            None => warn!(
                "'{display_name}' has no column '{original}' for canonical field \
                 '{canonical_name}'; filling with missing values"
            ),
        }
    }
    for (name, source) in canonical.iter().zip(&sources) {
        if source.is_none() {
            debug!("'{display_name}' does not provide '{name}'; filling with missing values");
        }
    }

    let mut headers = canonical.to_vec();
    headers.push(PROVENANCE_FIELD.to_string());
    let mut projection = Table::with_headers(headers)?;
    let provenance = Value::String(display_name.clone());
    for (row_idx, row) in table.rows().iter().enumerate() {
        if row.len() != table.column_count() {
            return Err(BuildError::RaggedRow {
                source_name: display_name,
                row: row_idx + 1,
                expected: table.column_count(),
                found: row.len(),
            });
        }
        let mut projected: Row = sources
            .iter()
            .map(|source| source.and_then(|idx| row[idx].clone()))
            .collect();
        projected.push(Some(provenance.clone()));
        projection.push_row(projected)?;
    }
    Ok(Some(projection))
}

/// Converts every non-text cell of a mixed-kind column to its display text.
/// Columns mixing only integers and floats are left numeric.
pub fn harmonize_kinds(table: &mut Table) {
    for column in 0..table.column_count() {
        if dtype::column_kind(table, column) != Some(ColumnKind::String) {
            continue;
        }
        let mut converted = 0usize;
        table.map_column(column, |value| match value {
            Value::String(_) => value,
            other => {
                converted += 1;
                Value::String(other.as_display())
            }
        });
        if converted > 0 {
            debug!(
                "Rendered {converted} non-text cell(s) of '{}' as text",
                table.headers()[column]
            );
        }
    }
}

/// Row-wise concatenation aligned by column name. Columns are the union of
/// all inputs in first-seen order; absent cells become missing values.
pub fn concatenate(tables: &[Table]) -> Result<Table, BuildError> {
    let mut headers: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for table in tables {
        for header in table.headers() {
            if !positions.contains_key(header) {
                positions.insert(header.clone(), headers.len());
                headers.push(header.clone());
            }
        }
    }

    let mut combined = Table::with_headers(headers)?;
    for table in tables {
        let targets: Vec<usize> = table.headers().iter().map(|h| positions[h]).collect();
        for row in table.rows() {
            let mut aligned: Row = vec![None; combined.column_count()];
            for (cell, &target) in row.iter().zip(&targets) {
                aligned[target] = cell.clone();
            }
            combined.push_row(aligned)?;
        }
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{matching::build_initial_mapping, normalize::NormalizationRule};

    fn file(id: &str, headers: &[&str], rows: Vec<Row>) -> LoadedFile {
        let table = Table::from_rows(headers.iter().map(|h| h.to_string()).collect(), rows)
            .expect("table");
        LoadedFile::from_table(id, table)
    }

    fn mapping_for(files: &[LoadedFile]) -> ColumnMapping {
        build_initial_mapping(&crate::files::files_columns(files), &NormalizationRule::STRICT)
    }

    #[test]
    fn projection_fills_absent_fields_and_tags_provenance() {
        let files = vec![
            file("a.csv", &["Name"], vec![vec![Some("x".into())]]),
            file(
                "b.csv",
                &["name", "Sales"],
                vec![vec![Some("y".into()), Some(Value::Integer(3))]],
            ),
        ];
        let mapping = mapping_for(&files);
        let projection = project_file(&files[0], &mapping, &mapping.canonical_names())
            .unwrap()
            .unwrap();
        assert_eq!(projection.headers(), ["name", "sales", PROVENANCE_FIELD]);
        assert_eq!(
            projection.rows()[0],
            vec![Some("x".into()), None, Some("a.csv".into())]
        );
    }

    #[test]
    fn files_without_assignments_are_skipped() {
        let files = vec![
            file("a.csv", &["Id"], vec![vec![Some(Value::Integer(1))]]),
            file("b.csv", &["Other"], vec![vec![Some(Value::Integer(2))]]),
        ];
        let mut mapping = mapping_for(&files);
        mapping.set_canonical_for("b.csv", "Other", None);

        let combined = build_combined_dataset(&files, &mapping).unwrap();
        assert_eq!(combined.row_count(), 1);
        assert_eq!(combined.headers(), ["id", PROVENANCE_FIELD]);
    }

    #[test]
    fn empty_inputs_yield_empty_table() {
        let mapping = build_initial_mapping(&BTreeMap::new(), &NormalizationRule::STRICT);
        assert_eq!(build_combined_dataset(&[], &mapping).unwrap(), Table::empty());

        let files = vec![file("a.csv", &["Id"], vec![])];
        assert_eq!(build_combined_dataset(&files, &mapping).unwrap(), Table::empty());
    }

    #[test]
    fn canonical_field_named_like_provenance_is_a_structural_failure() {
        let files = vec![file("a.csv", &["__source_file"], vec![vec![Some("x".into())]])];
        let mapping = mapping_for(&files);
        let err = build_combined_dataset(&files, &mapping).unwrap_err();
        assert_eq!(err, BuildError::DuplicateColumn(PROVENANCE_FIELD.into()));
        assert_eq!(build_combined_dataset_or_empty(&files, &mapping), Table::empty());
    }

    #[test]
    fn mixed_kind_fields_become_text() {
        let files = vec![
            file("a.csv", &["year"], vec![vec![Some(Value::Integer(2023))]]),
            file(
                "b.csv",
                &["Year"],
                vec![vec![Some("2023".into())], vec![Some("FY25".into())]],
            ),
        ];
        let combined = build_combined_dataset(&files, &mapping_for(&files)).unwrap();
        let years: Vec<_> = combined.column_values(0).collect();
        assert_eq!(
            years,
            vec![
                Some(&Value::from("2023")),
                Some(&Value::from("2023")),
                Some(&Value::from("FY25"))
            ]
        );
    }

    #[test]
    fn harmonize_keeps_mixed_numbers_numeric() {
        let mut table = Table::from_rows(
            vec!["amount".into()],
            vec![vec![Some(Value::Integer(1))], vec![Some(Value::Float(2.5))]],
        )
        .unwrap();
        let before = table.clone();
        harmonize_kinds(&mut table);
        assert_eq!(table, before);
    }

    #[test]
    fn concatenate_aligns_by_name() {
        let left = Table::from_rows(
            vec!["a".into(), "b".into()],
            vec![vec![Some(Value::Integer(1)), Some(Value::Integer(2))]],
        )
        .unwrap();
        let right = Table::from_rows(
            vec!["c".into(), "a".into()],
            vec![vec![Some(Value::Integer(3)), Some(Value::Integer(4))]],
        )
        .unwrap();
        let combined = concatenate(&[left, right]).unwrap();
        assert_eq!(combined.headers(), ["a", "b", "c"]);
        assert_eq!(
            combined.rows()[1],
            vec![Some(Value::Integer(4)), None, Some(Value::Integer(3))]
        );
    }
}
