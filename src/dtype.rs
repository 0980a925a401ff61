//! Column kind detection.
//!
//! Raw CSV cells are sampled to pick the narrowest kind every non-empty value
//! parses as. Already-typed tables can be inspected with [`column_kind`],
//! which validation uses to flag numeric aggregations over text columns.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    data::{Value, parse_boolean},
    frame::Table,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    String,
    Integer,
    Float,
    Boolean,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::String => "string",
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Boolean => "boolean",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
struct TypeCandidate {
    possible_integer: bool,
    possible_float: bool,
    possible_boolean: bool,
    seen_value: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            possible_integer: true,
            possible_float: true,
            possible_boolean: true,
            seen_value: false,
        }
    }

    fn observe(&mut self, raw: &str) {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return;
        }
        self.seen_value = true;
        if self.possible_boolean && parse_boolean(trimmed).is_none() {
            self.possible_boolean = false;
        }
        if self.possible_integer && trimmed.parse::<i64>().is_err() {
            self.possible_integer = false;
        }
        if self.possible_float && trimmed.parse::<f64>().is_err() {
            self.possible_float = false;
        }
    }

    fn decide(&self) -> ColumnKind {
        if !self.seen_value {
            ColumnKind::String
        } else if self.possible_boolean {
            ColumnKind::Boolean
        } else if self.possible_integer {
            ColumnKind::Integer
        } else if self.possible_float {
            ColumnKind::Float
        } else {
            ColumnKind::String
        }
    }
}

/// Infers one kind per column from raw string rows. `sample_rows == 0` scans
/// every row.
pub fn infer_kinds(
    column_count: usize,
    rows: &[Vec<String>],
    sample_rows: usize,
) -> Vec<ColumnKind> {
    let mut candidates = vec![TypeCandidate::new(); column_count];
    for (processed, row) in rows.iter().enumerate() {
        if sample_rows > 0 && processed >= sample_rows {
            break;
        }
        for (idx, field) in row.iter().enumerate().take(column_count) {
            candidates[idx].observe(field);
        }
    }
    candidates.iter().map(TypeCandidate::decide).collect()
}

/// Reports the kind shared by every non-missing cell of a typed column.
/// All-missing columns report `None`.
pub fn column_kind(table: &Table, column: usize) -> Option<ColumnKind> {
    let mut kind: Option<ColumnKind> = None;
    for value in table.column_values(column).flatten() {
        let observed = match value {
            Value::String(_) => ColumnKind::String,
            Value::Integer(_) => ColumnKind::Integer,
            Value::Float(_) => ColumnKind::Float,
            Value::Boolean(_) => ColumnKind::Boolean,
        };
        kind = Some(match (kind, observed) {
            (None, observed) => observed,
            (Some(current), observed) if current == observed => current,
            (Some(ColumnKind::Integer), ColumnKind::Float)
            | (Some(ColumnKind::Float), ColumnKind::Integer) => ColumnKind::Float,
            _ => return Some(ColumnKind::String),
        });
    }
    kind
}
