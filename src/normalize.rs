//! Column-name normalization.
//!
//! A [`NormalizationRule`] holds four independent switches applied in a fixed
//! order: trim, lowercase, spaces to underscores, strip special characters.
//! The result is the comparison key used to group columns across files.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(default)]
pub struct NormalizationRule {
    pub trim: bool,
    pub lowercase: bool,
    pub replace_spaces: bool,
    pub strip_special: bool,
}

impl NormalizationRule {
    /// Every switch on. Used when a baseline canonical name is needed
    /// regardless of the configured rule.
    pub const STRICT: NormalizationRule = NormalizationRule {
        trim: true,
        lowercase: true,
        replace_spaces: true,
        strip_special: true,
    };

    pub const NONE: NormalizationRule = NormalizationRule {
        trim: false,
        lowercase: false,
        replace_spaces: false,
        strip_special: false,
    };

    pub fn normalize(&self, name: &str) -> String {
        normalize(name, self)
    }
}

impl Default for NormalizationRule {
    fn default() -> Self {
        Self::STRICT
    }
}

fn special_characters() -> &'static Regex {
    static SPECIAL: OnceLock<Regex> = OnceLock::new();
    SPECIAL.get_or_init(|| Regex::new(r"[^0-9A-Za-z_]").expect("valid special-character pattern"))
}

pub fn normalize(name: &str, rule: &NormalizationRule) -> String {
    let mut key = if rule.trim {
        name.trim().to_string()
    } else {
        name.to_string()
    };
    if rule.lowercase {
        key = key.to_lowercase();
    }
    if rule.replace_spaces {
        key = key.replace(' ', "_");
    }
    if rule.strip_special {
        key = special_characters().replace_all(&key, "").into_owned();
    }
    key
}

/// Normalizes with [`NormalizationRule::STRICT`].
pub fn strict_name(name: &str) -> String {
    normalize(name, &NormalizationRule::STRICT)
}
