use thiserror::Error;

/// Structural failures raised while building a combined table or a pivot.
///
/// "Nothing to show" outcomes (no files, no canonical fields, no value
/// fields, filters removing every row) are not errors; builders return an
/// empty table for those.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error(
        "Row {row} in '{source_name}' has {found} cell(s) but {expected} column(s) are defined"
    )]
    RaggedRow {
        source_name: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Column '{0}' appears more than once")]
    DuplicateColumn(String),

    #[error("Field '{0}' not found in table")]
    UnknownField(String),
}
