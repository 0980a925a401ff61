//! In-memory tables shared by the combiner and the pivot engine.
//!
//! A [`Table`] is a list of column names plus rows of optional cells. `None`
//! is the missing-value marker: it fills canonical fields absent from a file
//! and is never used as a pivot group key.

use std::collections::HashSet;

use crate::{data::Value, error::BuildError};

pub type Row = Vec<Option<Value>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_headers(headers: Vec<String>) -> Result<Self, BuildError> {
        Self::from_rows(headers, Vec::new())
    }

    /// Builds a table after checking header uniqueness and row widths.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Row>) -> Result<Self, BuildError> {
        let mut seen = HashSet::with_capacity(headers.len());
        for header in &headers {
            if !seen.insert(header.as_str()) {
                return Err(BuildError::DuplicateColumn(header.clone()));
            }
        }
        let mut table = Self {
            headers,
            rows: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Row) -> Result<(), BuildError> {
        if row.len() != self.headers.len() {
            return Err(BuildError::RaggedRow {
                source_name: String::from("table"),
                row: self.rows.len() + 1,
                expected: self.headers.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// True when the table has no rows, whatever its headers.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column)).and_then(|c| c.as_ref())
    }

    pub fn column_values(&self, column: usize) -> impl Iterator<Item = Option<&Value>> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(column).and_then(|c| c.as_ref()))
    }

    /// Rewrites every present cell of `column`; missing cells stay missing.
    pub fn map_column(&mut self, column: usize, mut f: impl FnMut(Value) -> Value) {
        for row in &mut self.rows {
            if let Some(cell) = row.get_mut(column) {
                *cell = cell.take().map(&mut f);
            }
        }
    }
}
