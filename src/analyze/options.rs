//! Per-field option overrides
//!
//! Generator options normally live as JSON inside column comments. An
//! override store supplies extra options keyed by class name and field
//! name without touching the database; its values win over the comment.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::prelude::OrmliftError;
use crate::schema::ExternalOptions;

/// Read-only lookup of external field options
pub trait OptionStore {
    /// Options for `field_name` of `class_name`; empty when none are set
    fn options(&self, class_name: &str, field_name: &str) -> ExternalOptions;
}

/// JSON-backed store shaped `{"Class": {"Field": {"Option": value}}}`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct OptionOverrides(BTreeMap<String, BTreeMap<String, BTreeMap<String, serde_json::Value>>>);

impl OptionOverrides {
    pub fn from_json(json: &str) -> Result<Self, OrmliftError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, OrmliftError> {
        debug!(path = ?path, "Loading option overrides");
        let json = fs::read_to_string(path).map_err(|e| {
            OrmliftError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl OptionStore for OptionOverrides {
    fn options(&self, class_name: &str, field_name: &str) -> ExternalOptions {
        ExternalOptions(
            self.0
                .get(class_name)
                .and_then(|fields| fields.get(field_name))
                .cloned()
                .unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_class_and_field() {
        let store = OptionOverrides::from_json(
            r#"{"Person": {"Name": {"MaxLength": 40}, "Address": {"Sort": "Street"}}}"#,
        )
        .unwrap();

        let options = store.options("Person", "Name");
        assert_eq!(options.0.get("MaxLength"), Some(&serde_json::json!(40)));
        assert!(store.options("Person", "Email").0.is_empty());
        assert!(store.options("Project", "Name").0.is_empty());
    }

    #[test]
    fn test_rejects_malformed_store() {
        assert!(OptionOverrides::from_json(r#"{"Person": 3}"#).is_err());
        assert!(OptionOverrides::default().is_empty());
    }
}
