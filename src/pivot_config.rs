//! Pivot configuration and its JSON document form.
//!
//! ```json
//! {
//!   "rows": ["region"],
//!   "columns": ["year"],
//!   "values": [{"column": "amount", "aggregation": "sum"}],
//!   "filters": {"region": ["east", "west"]}
//! }
//! ```
//!
//! Missing top-level keys default to empty collections. Aggregation names are
//! a closed set; anything else fails at parse time.

use std::{
    collections::BTreeMap,
    fmt,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
    str::FromStr,
};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Count,
    Mean,
    Min,
    Max,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Count => "count",
            Aggregation::Mean => "mean",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &["sum", "count", "mean", "min", "max"]
    }

    /// Aggregations that only make sense over numeric input.
    pub fn requires_numeric(&self) -> bool {
        !matches!(self, Aggregation::Count)
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Aggregation::Sum),
            "count" => Ok(Aggregation::Count),
            "mean" | "avg" | "average" => Ok(Aggregation::Mean),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            other => Err(anyhow!(
                "Unknown aggregation '{other}'. Supported: {}",
                Aggregation::variants().join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValueField {
    pub column: String,
    pub aggregation: Aggregation,
}

impl ValueField {
    pub fn new(column: &str, aggregation: Aggregation) -> Self {
        Self {
            column: column.to_string(),
            aggregation,
        }
    }

    /// Parses `column:aggregation`; the aggregation defaults to `sum`.
    pub fn parse(spec: &str) -> Result<Self> {
        let (column, aggregation) = match spec.rsplit_once(':') {
            Some((column, agg)) => (column.trim(), agg.parse()?),
            None => (spec.trim(), Aggregation::Sum),
        };
        if column.is_empty() {
            return Err(anyhow!("Value field '{spec}' is missing a column name"));
        }
        Ok(Self::new(column, aggregation))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PivotSpec {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<ValueField>,
    pub filters: BTreeMap<String, Vec<String>>,
}

impl PivotSpec {
    /// A configuration can be built once it has at least one value field.
    pub fn is_valid(&self) -> bool {
        !self.values.is_empty()
    }

    pub fn add_row(&mut self, field: &str) {
        push_unique(&mut self.rows, field);
    }

    pub fn add_column(&mut self, field: &str) {
        push_unique(&mut self.columns, field);
    }

    pub fn add_value(&mut self, field: &str, aggregation: Aggregation) {
        self.values.push(ValueField::new(field, aggregation));
    }

    /// Removes a field from rows, columns, values, and filters.
    pub fn remove_field(&mut self, field: &str) {
        self.rows.retain(|f| f != field);
        self.columns.retain(|f| f != field);
        self.values.retain(|v| v.column != field);
        self.filters.remove(field);
    }

    /// Parses `column=v1,v2`. Repeated columns extend the allowed set.
    pub fn add_filter(&mut self, spec: &str) -> Result<()> {
        let (column, values) = spec
            .split_once('=')
            .ok_or_else(|| anyhow!("Filter '{spec}' must look like column=value[,value]"))?;
        let column = column.trim();
        if column.is_empty() {
            return Err(anyhow!("Filter '{spec}' is missing a column name"));
        }
        let allowed = self.filters.entry(column.to_string()).or_default();
        allowed.extend(
            values
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        );
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Serializing pivot configuration")
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Parsing pivot configuration JSON")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating pivot config {path:?}"))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).context("Writing pivot configuration")?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening pivot config {path:?}"))?;
        let spec = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing pivot configuration {path:?}"))?;
        Ok(spec)
    }
}

fn push_unique(list: &mut Vec<String>, field: &str) {
    if !list.iter().any(|f| f == field) {
        list.push(field.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_default_to_empty() {
        let spec = PivotSpec::from_json(r#"{"rows": ["region"], "extra": 1}"#).unwrap();
        assert_eq!(spec.rows, vec!["region"]);
        assert!(spec.columns.is_empty());
        assert!(spec.values.is_empty());
        assert!(spec.filters.is_empty());
        assert!(!spec.is_valid());
    }

    #[test]
    fn unknown_aggregation_is_rejected_at_parse_time() {
        let err = PivotSpec::from_json(
            r#"{"values": [{"column": "amount", "aggregation": "median"}]}"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("median"));
        assert!("median".parse::<Aggregation>().is_err());
        assert_eq!("AVG".parse::<Aggregation>().unwrap(), Aggregation::Mean);
    }

    #[test]
    fn value_field_parse_defaults_to_sum() {
        assert_eq!(
            ValueField::parse("amount").unwrap(),
            ValueField::new("amount", Aggregation::Sum)
        );
        assert_eq!(
            ValueField::parse("order id:count").unwrap(),
            ValueField::new("order id", Aggregation::Count)
        );
        assert!(ValueField::parse(":max").is_err());
    }

    #[test]
    fn add_filter_accumulates_values() {
        let mut spec = PivotSpec::default();
        spec.add_filter("region=east, west").unwrap();
        spec.add_filter("region=north").unwrap();
        assert_eq!(spec.filters["region"], vec!["east", "west", "north"]);
        assert!(spec.add_filter("region").is_err());
    }

    #[test]
    fn remove_field_clears_every_role() {
        let mut spec = PivotSpec::default();
        spec.add_row("region");
        spec.add_row("region");
        spec.add_column("region");
        spec.add_value("region", Aggregation::Count);
        spec.add_filter("region=east").unwrap();
        assert_eq!(spec.rows.len(), 1);
        spec.remove_field("region");
        assert_eq!(spec, PivotSpec::default());
    }
}
