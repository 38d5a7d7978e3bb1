//! Narrow keys: single characters that group candidates by keyword.

use crate::config::NarrowConfig;
use crate::error::{Result, TodoscopeError};

/// The narrow mapping extended with the optional OTHER bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrowGroups {
    pairs: Vec<(char, String)>,
    other: Option<(char, String)>,
    warnings: Vec<String>,
}

fn single_char(key: &str) -> Option<char> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

impl NarrowGroups {
    /// Build the groups from configuration.
    ///
    /// A malformed pair is skipped and reported through [`warnings`]; a
    /// malformed OTHER pair disables the OTHER bucket. A key or keyword that
    /// appears twice is a conflict.
    ///
    /// [`warnings`]: NarrowGroups::warnings
    pub fn build(config: &NarrowConfig) -> Result<Self> {
        Self::try_build(config).map_err(TodoscopeError::NarrowConflict)
    }

    pub(crate) fn try_build(config: &NarrowConfig) -> std::result::Result<Self, String> {
        let mut warnings = Vec::new();
        let mut pairs: Vec<(char, String)> = Vec::with_capacity(config.keys.len());

        for (key, keyword) in &config.keys {
            let Some(c) = single_char(key) else {
                warnings.push(format!(
                    "narrow key {key:?} for {keyword} must be a single character; ignored"
                ));
                continue;
            };
            if keyword.is_empty() {
                warnings.push(format!("narrow key '{c}' has no keyword; ignored"));
                continue;
            }
            if pairs.iter().any(|(k, _)| *k == c) {
                return Err(format!("key '{c}' is bound more than once"));
            }
            if pairs.iter().any(|(_, kw)| kw == keyword) {
                return Err(format!("keyword {keyword} is bound more than once"));
            }
            pairs.push((c, keyword.clone()));
        }

        let other = if config.group_other {
            let (key, label) = &config.other;
            match single_char(key) {
                Some(c) if !label.is_empty() => {
                    if pairs.iter().any(|(k, _)| *k == c) {
                        return Err(format!("OTHER key '{c}' is already bound"));
                    }
                    if pairs.iter().any(|(_, kw)| kw == label) {
                        return Err(format!("OTHER label {label} is already a keyword"));
                    }
                    Some((c, label.clone()))
                }
                _ => {
                    warnings.push(format!(
                        "malformed OTHER pair ({key:?}, {label:?}); uncatalogued keywords are not grouped"
                    ));
                    None
                }
            }
        } else {
            None
        };

        for warning in &warnings {
            tracing::warn!("{warning}");
        }

        Ok(Self {
            pairs,
            other,
            warnings,
        })
    }

    /// Narrow key for a keyword: its own key, else the OTHER key, else
    /// `None` (grouped by keyword text but not narrowable).
    pub fn key_for(&self, keyword: &str) -> Option<char> {
        self.pairs
            .iter()
            .find(|(_, kw)| kw == keyword)
            .map(|(c, _)| *c)
            .or_else(|| self.other.as_ref().map(|(c, _)| *c))
    }

    /// All groups in display order, OTHER last.
    pub fn groups(&self) -> impl Iterator<Item = (char, &str)> {
        self.pairs
            .iter()
            .chain(self.other.iter())
            .map(|(c, label)| (*c, label.as_str()))
    }

    /// Problems found while building, for display to the user
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}
