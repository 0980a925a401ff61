//! Manual canonical assignments kept outside the rebuilt mapping.
//!
//! Rebuilding a mapping discards per-column edits, so callers keep them in a
//! YAML document and re-apply them after every rebuild:
//!
//! ```yaml
//! overrides:
//!   - file: sales_2023.csv
//!     column: Cust Name
//!     canonical: customer
//!   - file: sales_2024.csv
//!     column: Notes
//!     canonical: null
//! ```

use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{files::LoadedFile, matching::ColumnMapping};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappingOverride {
    /// File id or display name.
    pub file: String,
    pub column: String,
    #[serde(default)]
    pub canonical: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverrideSet {
    #[serde(default)]
    pub overrides: Vec<MappingOverride>,
}

impl OverrideSet {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening overrides file {path:?}"))?;
        let set: OverrideSet = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing overrides YAML {path:?}"))?;
        Ok(set)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_yaml::to_string(self).context("Serializing overrides")?;
        let mut file =
            File::create(path).with_context(|| format!("Creating overrides file {path:?}"))?;
        file.write_all(serialized.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn push(&mut self, file: &str, column: &str, canonical: Option<&str>) {
        self.overrides.push(MappingOverride {
            file: file.to_string(),
            column: column.to_string(),
            canonical: canonical.map(str::to_string),
        });
    }

    /// Applies every override in order and returns how many took effect.
    /// Entries naming files or columns absent from the mapping are skipped.
    pub fn apply(&self, mapping: &mut ColumnMapping, files: &[LoadedFile]) -> usize {
        let mut applied = 0usize;
        for entry in &self.overrides {
            let file_id = resolve_file_id(&entry.file, files).unwrap_or(entry.file.as_str());
            if mapping.set_canonical_for(file_id, &entry.column, entry.canonical.as_deref()) {
                applied += 1;
            } else {
                warn!(
                    "Skipping override for '{}' in '{}': no such mapped column",
                    entry.column, entry.file
                );
            }
        }
        if applied > 0 {
            info!("Applied {applied} manual mapping override(s)");
        }
        applied
    }
}

fn resolve_file_id<'a>(reference: &str, files: &'a [LoadedFile]) -> Option<&'a str> {
    files
        .iter()
        .find(|f| f.id == reference || f.file_name() == reference)
        .map(|f| f.id.as_str())
}
