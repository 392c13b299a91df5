//! Table classification
//!
//! Sorts the provider's table names into regular, type and association
//! tables, after applying the configured exclude/include rules.

use std::collections::{BTreeMap, BTreeSet};

use regex::{Regex, RegexBuilder};
use tracing::{debug, trace};

use crate::config::AnalysisConfig;
use crate::prelude::OrmliftError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Regular,
    Type,
    Association,
}

/// Classified table names, each map keyed by lowercased name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub regular: BTreeMap<String, String>,
    pub type_tables: BTreeMap<String, String>,
    pub associations: BTreeMap<String, String>,
    /// Lowercased names of excluded tables
    pub excluded: BTreeSet<String>,
    /// Names that repeat an earlier table name up to case; left out
    pub duplicates: Vec<String>,
}

impl Classification {
    /// Kind and canonical name of a table, case-insensitive
    pub fn resolve(&self, name: &str) -> Option<(TableKind, &str)> {
        let key = name.to_lowercase();
        if let Some(name) = self.regular.get(&key) {
            return Some((TableKind::Regular, name.as_str()));
        }
        if let Some(name) = self.type_tables.get(&key) {
            return Some((TableKind::Type, name.as_str()));
        }
        self.associations
            .get(&key)
            .map(|name| (TableKind::Association, name.as_str()))
    }

    pub fn kind_of(&self, name: &str) -> Option<TableKind> {
        self.resolve(name).map(|(kind, _)| kind)
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.contains(&name.to_lowercase())
    }

    /// Every included table name, in a stable order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.type_tables
            .values()
            .chain(self.regular.values())
            .chain(self.associations.values())
            .map(String::as_str)
    }
}

/// Compiled classification rules
#[derive(Debug, Clone)]
pub struct TableClassifier {
    exclude_pattern: Option<Regex>,
    exclude_tables: Vec<String>,
    include_pattern: Option<Regex>,
    include_tables: Vec<String>,
    type_table_suffixes: Vec<String>,
    association_table_suffix: String,
}

fn compile(pattern: &Option<String>, what: &str) -> Result<Option<Regex>, OrmliftError> {
    pattern
        .as_deref()
        .filter(|p| !p.is_empty())
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map_err(|e| OrmliftError::Config(format!("Invalid {} pattern '{}': {}", what, p, e)))
        })
        .transpose()
}

impl TableClassifier {
    pub fn new(config: &AnalysisConfig) -> Result<Self, OrmliftError> {
        Ok(Self {
            exclude_pattern: compile(&config.exclude_pattern, "exclude")?,
            exclude_tables: config.exclude_tables.clone(),
            include_pattern: compile(&config.include_pattern, "include")?,
            include_tables: config.include_tables.clone(),
            type_table_suffixes: config
                .type_table_suffixes
                .iter()
                .filter(|s| !s.is_empty())
                .map(|s| s.to_lowercase())
                .collect(),
            association_table_suffix: config.association_table_suffix.to_lowercase(),
        })
    }

    /// Excluded unless an include rule names the table again
    pub fn is_excluded(&self, name: &str) -> bool {
        let listed = |list: &[String]| list.iter().any(|t| t.eq_ignore_ascii_case(name));
        let matched = |pattern: &Option<Regex>| pattern.as_ref().is_some_and(|p| p.is_match(name));

        let excluded = listed(&self.exclude_tables) || matched(&self.exclude_pattern);
        excluded && !(listed(&self.include_tables) || matched(&self.include_pattern))
    }

    pub fn kind_of(&self, name: &str) -> TableKind {
        let lower = name.to_lowercase();
        if self.type_table_suffixes.iter().any(|s| lower.ends_with(s.as_str())) {
            TableKind::Type
        } else if !self.association_table_suffix.is_empty()
            && lower.ends_with(&self.association_table_suffix)
        {
            TableKind::Association
        } else {
            TableKind::Regular
        }
    }

    pub fn classify(&self, names: &[String]) -> Classification {
        let mut classification = Classification::default();

        for name in names {
            let key = name.to_lowercase();
            if classification.resolve(name).is_some() || classification.excluded.contains(&key) {
                debug!(table = ?name, "Table name differs from another only in case");
                classification.duplicates.push(name.clone());
                continue;
            }
            if self.is_excluded(name) {
                debug!(table = ?name, "Excluding table");
                classification.excluded.insert(key);
                continue;
            }

            let kind = self.kind_of(name);
            trace!(table = ?name, kind = ?kind, "Classified table");
            let target = match kind {
                TableKind::Regular => &mut classification.regular,
                TableKind::Type => &mut classification.type_tables,
                TableKind::Association => &mut classification.associations,
            };
            target.insert(key, name.clone());
        }

        classification
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_classify_by_suffix() {
        let classifier = TableClassifier::new(&AnalysisConfig::default()).unwrap();

        let classification =
            classifier.classify(&names(&["person", "Project_Status_Type", "team_member_assn"]));

        assert_eq!(classification.kind_of("PERSON"), Some(TableKind::Regular));
        assert_eq!(
            classification.resolve("project_status_type"),
            Some((TableKind::Type, "Project_Status_Type"))
        );
        assert_eq!(
            classification.kind_of("team_member_assn"),
            Some(TableKind::Association)
        );
        assert_eq!(classification.kind_of("missing"), None);
    }

    #[test]
    fn test_exclude_and_include_rules() {
        let classifier = TableClassifier::new(&AnalysisConfig {
            exclude_pattern: Some("^tmp_".to_string()),
            exclude_tables: names(&["Audit"]),
            include_tables: names(&["tmp_keep"]),
            ..AnalysisConfig::default()
        })
        .unwrap();

        let classification =
            classifier.classify(&names(&["TMP_scratch", "tmp_keep", "audit", "person"]));

        assert!(classification.is_excluded("tmp_scratch"));
        assert!(classification.is_excluded("AUDIT"));
        assert_eq!(classification.kind_of("tmp_keep"), Some(TableKind::Regular));
        assert_eq!(classification.names().count(), 2);
    }

    #[test]
    fn test_include_pattern_overrides_exclusion() {
        let classifier = TableClassifier::new(&AnalysisConfig {
            exclude_pattern: Some(".*".to_string()),
            include_pattern: Some("^person".to_string()),
            ..AnalysisConfig::default()
        })
        .unwrap();

        assert!(classifier.is_excluded("project"));
        assert!(!classifier.is_excluded("Person_Login"));
    }

    #[test]
    fn test_multiple_type_suffixes() {
        let classifier = TableClassifier::new(&AnalysisConfig {
            type_table_suffixes: names(&["_type", "_enum"]),
            ..AnalysisConfig::default()
        })
        .unwrap();

        assert_eq!(classifier.kind_of("color_enum"), TableKind::Type);
        assert_eq!(classifier.kind_of("color_type"), TableKind::Type);
        assert_eq!(classifier.kind_of("color"), TableKind::Regular);
    }

    #[test]
    fn test_names_differing_only_in_case() {
        let classifier = TableClassifier::new(&AnalysisConfig::default()).unwrap();

        let classification = classifier.classify(&names(&["person", "Person", "PERSON_TYPE"]));

        assert_eq!(classification.resolve("PERSON"), Some((TableKind::Regular, "person")));
        assert_eq!(classification.duplicates, vec!["Person".to_string()]);
        assert_eq!(classification.names().count(), 2);
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = TableClassifier::new(&AnalysisConfig {
            exclude_pattern: Some("(".to_string()),
            ..AnalysisConfig::default()
        })
        .unwrap_err();

        assert!(matches!(err, OrmliftError::Config(_)));
    }
}
