//! Validation report over files, mapping, combined dataset, and pivot.
//!
//! The engine never raises for configuration problems; this module is where
//! they surface, as issues with a severity and a stable code. Export paths
//! consult [`ValidationReport::has_blocking_errors_for_export`] before
//! writing anything.

use std::{collections::HashSet, fmt};

use itertools::Itertools;
use log::info;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue, json};

use crate::{
    dtype::column_kind,
    files::{FileStatus, FileType, LoadedFile},
    frame::Table,
    matching::ColumnMapping,
    pivot_config::PivotSpec,
};

const UNMAPPED_WARNING_RATIO: f64 = 0.5;
const SPARSE_WARNING_RATIO: f64 = 0.3;
const LISTED_NAMES: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, JsonValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Pivot,
    Combined,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

/// Everything the validator inspects. Absent stages are `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationInput<'a> {
    pub files: &'a [LoadedFile],
    pub mapping: Option<&'a ColumnMapping>,
    pub combined: Option<&'a Table>,
    pub pivot_spec: Option<&'a PivotSpec>,
    pub pivot: Option<&'a Table>,
}

impl ValidationReport {
    pub fn add(&mut self, severity: Severity, code: &'static str, message: impl Into<String>) {
        self.add_with(severity, code, message, JsonValue::Null);
    }

    pub fn add_with(
        &mut self,
        severity: Severity,
        code: &'static str,
        message: impl Into<String>,
        details: JsonValue,
    ) {
        let details = match details {
            JsonValue::Object(map) => map,
            _ => Map::new(),
        };
        self.issues.push(ValidationIssue {
            severity,
            code,
            message: message.into(),
            details,
        });
    }

    pub fn by_severity(&self, severity: Severity) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    pub fn errors(&self) -> Vec<&ValidationIssue> {
        self.by_severity(Severity::Error).collect()
    }

    pub fn warnings(&self) -> Vec<&ValidationIssue> {
        self.by_severity(Severity::Warning).collect()
    }

    pub fn infos(&self) -> Vec<&ValidationIssue> {
        self.by_severity(Severity::Info).collect()
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }

    pub fn has_blocking_errors_for_export(&self, kind: ExportKind) -> bool {
        let stage_codes: &[&str] = match kind {
            ExportKind::Pivot => &["NO_PIVOT_VALUES", "PIVOT_NOT_BUILT"],
            ExportKind::Combined => &["COMBINED_DATASET_EMPTY", "COMBINED_DATASET_NO_ROWS"],
        };
        self.has_code("NO_FILES_LOADED") || stage_codes.iter().any(|code| self.has_code(code))
    }
}

pub fn validate_all(input: &ValidationInput<'_>) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_files(input, &mut report);
    validate_mapping(input, &mut report);
    validate_combined(input, &mut report);
    validate_pivot(input, &mut report);
    info!(
        "Validation complete: {} error(s), {} warning(s), {} info(s)",
        report.errors().len(),
        report.warnings().len(),
        report.infos().len()
    );
    report
}

fn summarize_names(names: &[String]) -> String {
    let listed = names.iter().take(LISTED_NAMES).join(", ");
    if names.len() > LISTED_NAMES {
        format!("{listed} and {} more", names.len() - LISTED_NAMES)
    } else {
        listed
    }
}

fn validate_files(input: &ValidationInput<'_>, report: &mut ValidationReport) {
    if input.files.is_empty() {
        report.add(Severity::Error, "NO_FILES_LOADED", "No files have been loaded");
        return;
    }

    let error_files: Vec<String> = input
        .files
        .iter()
        .filter(|f| matches!(f.status, FileStatus::Error(_)))
        .map(LoadedFile::file_name)
        .collect();
    let missing_sheet: Vec<String> = input
        .files
        .iter()
        .filter(|f| f.file_type == FileType::Xlsx && f.selected_sheet.is_none())
        .map(LoadedFile::file_name)
        .collect();

    if !error_files.is_empty() {
        report.add_with(
            Severity::Warning,
            "FILES_WITH_ERRORS",
            format!("Files with errors: {}", summarize_names(&error_files)),
            json!({ "count": error_files.len() }),
        );
    }
    if !missing_sheet.is_empty() {
        report.add_with(
            Severity::Warning,
            "MISSING_SHEET_SELECTION",
            format!(
                "XLSX files missing sheet selection: {}",
                summarize_names(&missing_sheet)
            ),
            json!({ "count": missing_sheet.len() }),
        );
    }
    report.add_with(
        Severity::Info,
        "FILES_LOADED",
        format!("Loaded {} file(s)", input.files.len()),
        json!({ "count": input.files.len() }),
    );
}

fn validate_mapping(input: &ValidationInput<'_>, report: &mut ValidationReport) {
    let Some(mapping) = input.mapping else {
        return;
    };
    if mapping.is_empty() {
        report.add(
            Severity::Warning,
            "EMPTY_MAPPING",
            "No canonical fields defined in mapping",
        );
        return;
    }

    let total = mapping.total_columns();
    let unmapped = mapping.unmapped_count();
    if total > 0 && unmapped as f64 > total as f64 * UNMAPPED_WARNING_RATIO {
        report.add_with(
            Severity::Warning,
            "HIGH_UNMAPPED_COLUMNS",
            format!("High number of unmapped columns: {unmapped}/{total}"),
            json!({ "unmapped": unmapped, "total": total }),
        );
    }

    let file_count = mapping.file_ids().count();
    let field_count = mapping.canonical_fields().count();
    let possible = field_count * file_count;
    let filled: usize = mapping.canonical_fields().map(|f| f.origins.len()).sum();
    if possible > 0 && (filled as f64) < possible as f64 * SPARSE_WARNING_RATIO {
        report.add_with(
            Severity::Warning,
            "SPARSE_CANONICAL_FIELDS",
            format!("Canonical fields are very sparse ({filled}/{possible} filled)"),
            json!({ "filled": filled, "total": possible }),
        );
    }
}

fn validate_combined(input: &ValidationInput<'_>, report: &mut ValidationReport) {
    let Some(combined) = input.combined else {
        return;
    };
    if combined.column_count() == 0 {
        report.add(
            Severity::Warning,
            "COMBINED_DATASET_EMPTY",
            "Combined dataset is empty",
        );
        return;
    }

    let (rows, columns) = (combined.row_count(), combined.column_count());
    report.add_with(
        Severity::Info,
        "COMBINED_DATASET_INFO",
        format!("Combined dataset: {rows} rows x {columns} columns"),
        json!({ "rows": rows, "columns": columns }),
    );
    if rows == 0 {
        report.add(
            Severity::Warning,
            "COMBINED_DATASET_NO_ROWS",
            "Combined dataset has 0 rows",
        );
    }

    let mut seen = HashSet::new();
    let duplicates: Vec<String> = combined
        .headers()
        .iter()
        .filter(|h| !seen.insert(h.as_str()))
        .cloned()
        .unique()
        .collect();
    if !duplicates.is_empty() {
        report.add_with(
            Severity::Warning,
            "DUPLICATE_CANONICAL_COLUMNS",
            format!(
                "Duplicate canonical columns detected: {}",
                duplicates.iter().take(5).join(", ")
            ),
            json!({ "duplicates": duplicates }),
        );
    }
}

fn validate_pivot(input: &ValidationInput<'_>, report: &mut ValidationReport) {
    let Some(spec) = input.pivot_spec else {
        return;
    };

    if !spec.is_valid() {
        report.add(
            Severity::Warning,
            "NO_PIVOT_VALUES",
            "Pivot configuration has no value fields defined",
        );
    } else {
        if let Some(combined) = input.combined {
            for value in &spec.values {
                let Some(idx) = combined.column_index(&value.column) else {
                    continue;
                };
                let numeric = column_kind(combined, idx).is_none_or(|kind| kind.is_numeric());
                if value.aggregation.requires_numeric() && !numeric {
                    report.add_with(
                        Severity::Warning,
                        "NON_NUMERIC_AGGREGATION",
                        format!(
                            "Aggregation '{}' on non-numeric column '{}'",
                            value.aggregation, value.column
                        ),
                        json!({ "column": value.column, "aggregation": value.aggregation }),
                    );
                }
            }
        }
        if spec.rows.is_empty() {
            report.add(
                Severity::Info,
                "NO_PIVOT_ROWS",
                "Pivot has no row fields (will create single-row summary)",
            );
        }
        if spec.columns.is_empty() {
            report.add(
                Severity::Info,
                "NO_PIVOT_COLUMNS",
                "Pivot has no column fields (simple aggregation)",
            );
        }
    }

    match input.pivot {
        Some(pivot) if !pivot.is_empty() => {
            let (rows, columns) = (pivot.row_count(), pivot.column_count());
            report.add_with(
                Severity::Info,
                "PIVOT_OUTPUT_INFO",
                format!("Pivot output: {rows} rows x {columns} columns"),
                json!({ "rows": rows, "columns": columns }),
            );
        }
        _ if spec.is_valid() => report.add(
            Severity::Warning,
            "PIVOT_NOT_BUILT",
            "Pivot configuration exists but no output generated",
        ),
        _ => {}
    }
}
