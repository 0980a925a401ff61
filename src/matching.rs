//! Canonical field resolution across loaded files.
//!
//! Every column of every file is normalized; columns sharing a normalized key
//! are grouped under one [`CanonicalField`]. The resulting [`ColumnMapping`]
//! owns both directions of the relationship:
//!
//! - canonical name → contributing files (the field's origins)
//! - file → original column → normalized key and current canonical assignment
//!
//! Manual overrides rewrite a single (file, column) assignment. Canonical
//! fields whose origin set becomes empty are pruned immediately, so every
//! field in a mapping has at least one origin.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{dtype::ColumnKind, normalize::NormalizationRule};

pub type FileId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalField {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declared_type: Option<ColumnKind>,
    pub origins: BTreeSet<FileId>,
}

impl CanonicalField {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            declared_type: None,
            origins: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnAssignment {
    pub original: String,
    pub normalized: String,
    pub canonical: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    rule: NormalizationRule,
    canonical_fields: BTreeMap<String, CanonicalField>,
    file_columns: BTreeMap<FileId, Vec<ColumnAssignment>>,
}

/// Groups every (file, column) pair by its normalized key.
///
/// Two columns of the same file that normalize to the same key both land on
/// that one canonical field.
pub fn build_initial_mapping(
    files_columns: &BTreeMap<FileId, Vec<String>>,
    rule: &NormalizationRule,
) -> ColumnMapping {
    let mut mapping = ColumnMapping {
        rule: *rule,
        ..ColumnMapping::default()
    };
    if files_columns.is_empty() {
        debug!("No files supplied; mapping has no canonical fields");
        return mapping;
    }

    for (file_id, columns) in files_columns {
        let mut assignments = Vec::with_capacity(columns.len());
        for original in columns {
            let normalized = rule.normalize(original);
            mapping
                .canonical_fields
                .entry(normalized.clone())
                .or_insert_with(|| CanonicalField::new(&normalized))
                .origins
                .insert(file_id.clone());
            assignments.push(ColumnAssignment {
                original: original.clone(),
                canonical: Some(normalized.clone()),
                normalized,
            });
        }
        mapping.file_columns.insert(file_id.clone(), assignments);
    }

    info!(
        "Mapped {} file(s) onto {} canonical field(s)",
        mapping.file_columns.len(),
        mapping.canonical_fields.len()
    );
    mapping
}

/// Pairs each source column with the first target column sharing its
/// normalized key.
pub fn find_matches(
    source_columns: &[String],
    target_columns: &[String],
    rule: &NormalizationRule,
) -> Vec<(String, String)> {
    let mut targets: BTreeMap<String, &String> = BTreeMap::new();
    for target in target_columns {
        targets.entry(rule.normalize(target)).or_insert(target);
    }
    source_columns
        .iter()
        .filter_map(|source| {
            targets
                .get(&rule.normalize(source))
                .map(|target| (source.clone(), (*target).clone()))
        })
        .collect()
}

/// 1.0 when both names normalize to the same key, 0.0 otherwise.
pub fn calculate_similarity(a: &str, b: &str, rule: &NormalizationRule) -> f64 {
    if rule.normalize(a) == rule.normalize(b) {
        1.0
    } else {
        0.0
    }
}

impl ColumnMapping {
    pub fn rule(&self) -> &NormalizationRule {
        &self.rule
    }

    pub fn is_empty(&self) -> bool {
        self.canonical_fields.is_empty()
    }

    pub fn canonical_fields(&self) -> impl Iterator<Item = &CanonicalField> {
        self.canonical_fields.values()
    }

    pub fn canonical_field(&self, name: &str) -> Option<&CanonicalField> {
        self.canonical_fields.get(name)
    }

    pub fn canonical_names(&self) -> Vec<String> {
        self.canonical_fields.keys().cloned().collect()
    }

    pub fn file_ids(&self) -> impl Iterator<Item = &FileId> {
        self.file_columns.keys()
    }

    pub fn columns_for(&self, file_id: &str) -> &[ColumnAssignment] {
        self.file_columns
            .get(file_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn canonical_for(&self, file_id: &str, original_column: &str) -> Option<&str> {
        self.columns_for(file_id)
            .iter()
            .find(|a| a.original == original_column)
            .and_then(|a| a.canonical.as_deref())
    }

    /// The original column feeding `canonical` in this file. When several
    /// columns collapse onto one field, the last one in file order wins.
    pub fn original_for(&self, file_id: &str, canonical: &str) -> Option<&str> {
        self.columns_for(file_id)
            .iter()
            .rev()
            .find(|a| a.canonical.as_deref() == Some(canonical))
            .map(|a| a.original.as_str())
    }

    /// (original column, canonical name) pairs currently assigned for a file,
    /// in original column order.
    pub fn assigned_pairs(&self, file_id: &str) -> Vec<(&str, &str)> {
        self.columns_for(file_id)
            .iter()
            .filter_map(|a| a.canonical.as_deref().map(|c| (a.original.as_str(), c)))
            .collect()
    }

    pub fn declare_type(&mut self, canonical: &str, kind: Option<ColumnKind>) {
        if let Some(field) = self.canonical_fields.get_mut(canonical) {
            field.declared_type = kind;
        }
    }

    /// Reassigns one (file, column) pair. `None` unmaps the column.
    ///
    /// Returns `false` (and changes nothing) when the file or column is not
    /// part of the mapping. Other files' assignments are never touched.
    pub fn set_canonical_for(
        &mut self,
        file_id: &str,
        original_column: &str,
        new_canonical: Option<&str>,
    ) -> bool {
        let Some(assignments) = self.file_columns.get_mut(file_id) else {
            warn!("Cannot remap column '{original_column}': file '{file_id}' is not mapped");
            return false;
        };
        let Some(assignment) = assignments
            .iter_mut()
            .find(|a| a.original == original_column)
        else {
            warn!("Cannot remap column '{original_column}': not present in file '{file_id}'");
            return false;
        };

        if assignment.canonical.as_deref() == new_canonical {
            return true;
        }
        let previous = std::mem::replace(
            &mut assignment.canonical,
            new_canonical.map(str::to_string),
        );

        if let Some(previous) = previous {
            self.release_origin(file_id, &previous);
        }
        if let Some(target) = new_canonical {
            self.canonical_fields
                .entry(target.to_string())
                .or_insert_with(|| CanonicalField::new(target))
                .origins
                .insert(file_id.to_string());
        }
        debug!(
            "Remapped '{original_column}' in '{file_id}' to {}",
            new_canonical.unwrap_or("<unmapped>")
        );
        true
    }

    // Drops `file_id` from the field's origins once none of its columns feed
    // it, and prunes the field when no origins remain.
    fn release_origin(&mut self, file_id: &str, canonical: &str) {
        let still_contributes = self
            .columns_for(file_id)
            .iter()
            .any(|a| a.canonical.as_deref() == Some(canonical));
        if still_contributes {
            return;
        }
        let Some(field) = self.canonical_fields.get_mut(canonical) else {
            return;
        };
        field.origins.remove(file_id);
        if field.origins.is_empty() {
            self.canonical_fields.remove(canonical);
            debug!("Pruned canonical field '{canonical}' with no remaining origins");
        }
    }

    pub fn unmapped_count(&self) -> usize {
        self.file_columns
            .values()
            .flatten()
            .filter(|a| a.canonical.is_none())
            .count()
    }

    pub fn total_columns(&self) -> usize {
        self.file_columns.values().map(Vec::len).sum()
    }

    pub fn export(&self) -> MappingExport {
        MappingExport {
            rule: self.rule,
            canonical_fields: self.canonical_fields.values().cloned().collect(),
            file_columns: self
                .file_columns
                .iter()
                .map(|(file_id, assignments)| {
                    let columns = assignments
                        .iter()
                        .map(|a| (a.original.clone(), a.canonical.clone()))
                        .collect();
                    (file_id.clone(), columns)
                })
                .collect(),
        }
    }
}

/// Serializable snapshot of a mapping for diagnostics and export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingExport {
    pub rule: NormalizationRule,
    pub canonical_fields: Vec<CanonicalField>,
    pub file_columns: BTreeMap<FileId, BTreeMap<String, Option<String>>>,
}
