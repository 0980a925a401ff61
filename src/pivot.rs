//! Pivot engine.
//!
//! Steps, in order:
//! 1. Filter rows by the configured allowed-value sets.
//! 2. Group by (row dimensions, column dimensions) and aggregate each value
//!    field per group.
//! 3. Flatten (value field, column combination) pairs into column names
//!    joined with `_`, skipping empty parts.
//! 4. Materialize row-dimension values as leading columns.
//!
//! Groups are emitted in ascending key order. Cells with no contributing rows
//! are filled with `0`.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use itertools::Itertools;
use log::{debug, error, info, warn};

use crate::{
    data::{Value, display_cell},
    error::BuildError,
    frame::{Row, Table},
    pivot_config::{Aggregation, PivotSpec, ValueField},
};

const NAME_SEPARATOR: &str = "_";

type GroupKey = Vec<Value>;

pub fn build_pivot(table: &Table, spec: &PivotSpec) -> Result<Table, BuildError> {
    if table.is_empty() {
        warn!("Cannot build pivot from an empty table");
        return Ok(Table::empty());
    }
    if !spec.is_valid() {
        warn!("Pivot configuration is not valid (no values defined)");
        return Ok(Table::empty());
    }

    let row_dims = resolve_fields(table, &spec.rows)?;
    let column_dims = resolve_fields(table, &spec.columns)?;
    let value_columns = spec
        .values
        .iter()
        .map(|v| resolve_field(table, &v.column))
        .collect::<Result<Vec<_>, _>>()?;

    let filtered = apply_filters(table, &spec.filters);
    if filtered.is_empty() {
        warn!("No data left after applying filters");
        return Ok(Table::empty());
    }
    debug!(
        "Building pivot: rows={:?}, columns={:?}, values={:?}",
        spec.rows, spec.columns, spec.values
    );

    let mut groups: BTreeMap<GroupKey, BTreeMap<GroupKey, Vec<Accumulator>>> = BTreeMap::new();
    let mut column_keys: BTreeSet<GroupKey> = BTreeSet::new();
    let mut skipped = 0usize;
    for row in filtered {
        let (Some(row_key), Some(column_key)) =
            (group_key(row, &row_dims), group_key(row, &column_dims))
        else {
            skipped += 1;
            continue;
        };
        column_keys.insert(column_key.clone());
        let accumulators = groups
            .entry(row_key)
            .or_default()
            .entry(column_key)
            .or_insert_with(|| {
                spec.values
                    .iter()
                    .map(|v| Accumulator::new(v.aggregation))
                    .collect()
            });
        for (accumulator, &column) in accumulators.iter_mut().zip(&value_columns) {
            accumulator.push(row[column].as_ref());
        }
    }
    if skipped > 0 {
        debug!("Dropped {skipped} row(s) with missing dimension values");
    }
    if groups.is_empty() {
        warn!("Every row has a missing dimension value; nothing to aggregate");
        return Ok(Table::empty());
    }

    let mut headers = spec.rows.clone();
    headers.extend(value_column_names(&spec.values, &column_keys));
    let mut rows = Vec::with_capacity(groups.len());
    for (row_key, cells) in groups {
        let mut out: Row = row_key.into_iter().map(Some).collect();
        for value_idx in 0..spec.values.len() {
            for column_key in &column_keys {
                let value = cells
                    .get(column_key)
                    .and_then(|accumulators| accumulators[value_idx].finish())
                    .unwrap_or(Value::Integer(0));
                out.push(Some(value));
            }
        }
        rows.push(out);
    }

    let pivot = Table::from_rows(headers, rows)?;
    info!(
        "Pivot built: {} row(s) x {} column(s)",
        pivot.row_count(),
        pivot.column_count()
    );
    Ok(pivot)
}

/// Same as [`build_pivot`], but structural failures are logged and reported
/// as an empty table.
pub fn build_pivot_or_empty(table: &Table, spec: &PivotSpec) -> Table {
    build_pivot(table, spec).unwrap_or_else(|err| {
        error!("Error building pivot: {err}");
        Table::empty()
    })
}

/// Keeps rows whose value in each filtered field is one of the allowed
/// values. Empty allowed sets and fields absent from the table are ignored.
pub fn apply_filters<'a>(
    table: &'a Table,
    filters: &BTreeMap<String, Vec<String>>,
) -> Vec<&'a Row> {
    let active: Vec<(usize, HashSet<&str>)> = filters
        .iter()
        .filter(|(_, allowed)| !allowed.is_empty())
        .filter_map(|(field, allowed)| {
            let idx = table.column_index(field);
            if idx.is_none() {
                debug!("Ignoring filter on unknown field '{field}'");
            }
            idx.map(|idx| (idx, allowed.iter().map(String::as_str).collect()))
        })
        .collect();

    let kept: Vec<&Row> = table
        .rows()
        .iter()
        .filter(|row| {
            active.iter().all(|(idx, allowed)| match row[*idx].as_ref() {
                Some(value) => allowed.contains(value.as_display().as_str()),
                None => false,
            })
        })
        .collect();
    if !active.is_empty() {
        debug!("Filters kept {} of {} row(s)", kept.len(), table.row_count());
    }
    kept
}

/// Output names for every (value field, column combination) pair, in value
/// field order then column combination order.
pub fn value_column_names(values: &[ValueField], column_keys: &BTreeSet<GroupKey>) -> Vec<String> {
    let labels = value_labels(values);
    let mut names = Vec::with_capacity(labels.len() * column_keys.len());
    for label in &labels {
        for key in column_keys {
            names.push(flatten_name(label, key));
        }
    }
    names
}

fn flatten_name(label: &str, key: &[Value]) -> String {
    std::iter::once(label.to_string())
        .chain(key.iter().map(Value::as_display))
        .filter(|part| !part.is_empty())
        .join(NAME_SEPARATOR)
}

// A value field is labelled by its column, unless that column is aggregated
// more than once; then the aggregation is appended.
fn value_labels(values: &[ValueField]) -> Vec<String> {
    let repeated: HashSet<&str> = values
        .iter()
        .map(|v| v.column.as_str())
        .duplicates()
        .collect();
    values
        .iter()
        .map(|v| {
            if repeated.contains(v.column.as_str()) {
                format!("{}{NAME_SEPARATOR}{}", v.column, v.aggregation)
            } else {
                v.column.clone()
            }
        })
        .collect()
}

fn resolve_field(table: &Table, field: &str) -> Result<usize, BuildError> {
    table
        .column_index(field)
        .ok_or_else(|| BuildError::UnknownField(field.to_string()))
}

fn resolve_fields(table: &Table, fields: &[String]) -> Result<Vec<usize>, BuildError> {
    fields.iter().map(|f| resolve_field(table, f)).collect()
}

fn group_key(row: &Row, dims: &[usize]) -> Option<GroupKey> {
    dims.iter().map(|&idx| row[idx].clone()).collect()
}

#[derive(Debug, Clone)]
struct Accumulator {
    aggregation: Aggregation,
    count: usize,
    numeric_count: usize,
    float_sum: f64,
    int_sum: Option<i64>,
    min: Option<Value>,
    max: Option<Value>,
}

impl Accumulator {
    fn new(aggregation: Aggregation) -> Self {
        Self {
            aggregation,
            count: 0,
            numeric_count: 0,
            float_sum: 0.0,
            int_sum: Some(0),
            min: None,
            max: None,
        }
    }

    fn push(&mut self, value: Option<&Value>) {
        let Some(value) = value else {
            return;
        };
        self.count += 1;
        match value {
            Value::Integer(i) => {
                self.numeric_count += 1;
                self.float_sum += *i as f64;
                self.int_sum = self.int_sum.and_then(|sum| sum.checked_add(*i));
            }
            Value::Float(f) => {
                self.numeric_count += 1;
                self.float_sum += f;
                self.int_sum = None;
            }
            _ => {}
        }
        if matches!(self.aggregation, Aggregation::Min | Aggregation::Max) {
            if self.min.as_ref().is_none_or(|current| value < current) {
                self.min = Some(value.clone());
            }
            if self.max.as_ref().is_none_or(|current| value > current) {
                self.max = Some(value.clone());
            }
        }
    }

    fn finish(&self) -> Option<Value> {
        match self.aggregation {
            Aggregation::Sum => Some(match self.int_sum {
                Some(sum) => Value::Integer(sum),
                None => Value::Float(self.float_sum),
            }),
            Aggregation::Count => Some(Value::Integer(self.count as i64)),
            Aggregation::Mean => {
                (self.numeric_count > 0)
                    .then(|| Value::Float(self.float_sum / self.numeric_count as f64))
            }
            Aggregation::Min => self.min.clone(),
            Aggregation::Max => self.max.clone(),
        }
    }
}

/// Distinct display values of a field, sorted. Useful for building filters.
pub fn distinct_values(table: &Table, field: &str) -> Vec<String> {
    let Some(idx) = table.column_index(field) else {
        return Vec::new();
    };
    table
        .column_values(idx)
        .flatten()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(|v| display_cell(Some(v)))
        .collect()
}
