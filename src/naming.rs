//! Naming engine
//!
//! Pure string transforms that turn raw table and column identifiers into
//! the class, property and variable names consumed by code templates.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::AnalysisConfig;
use crate::schema::VariableType;

/// Variable prefix for object-typed members
pub const OBJECT_PREFIX: &str = "obj";

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u'];

/// Convert snake_case to PascalCase
///
/// Names written entirely in upper case are lowered first, so `USER_ID`
/// becomes `UserId` rather than `USERID`.
pub fn to_pascal_case(s: &str) -> String {
    let lowered;
    let source = if s.chars().any(|c| c.is_lowercase()) {
        s
    } else {
        lowered = s.to_lowercase();
        &lowered
    };

    source
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => {
                    let first_upper = first.to_uppercase().to_string();
                    first_upper + chars.as_str()
                }
            }
        })
        .collect()
}

/// Rule-based English pluralization
///
/// The suffix follows the case of the word, so `DAY` becomes `DAYS`.
pub fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    let shouting =
        word.chars().any(char::is_uppercase) && !word.chars().any(char::is_lowercase);
    let suffix = |s: &str| {
        if shouting {
            s.to_uppercase()
        } else {
            s.to_string()
        }
    };

    if let Some(stem) = lower.strip_suffix('y') {
        // vowel + y: day, key, journey
        if stem.ends_with(VOWELS) {
            return format!("{}{}", word, suffix("s"));
        }
        return format!("{}{}", &word[..word.len() - 1], suffix("ies"));
    }
    if lower.ends_with('s') || lower.ends_with('x') || lower.ends_with("sh") || lower.ends_with("ch")
    {
        return format!("{}{}", word, suffix("es"));
    }
    if lower.ends_with('z') {
        return format!("{}{}", word, suffix("zes"));
    }
    format!("{}{}", word, suffix("s"))
}

/// `true` for `[A-Za-z_][A-Za-z0-9_]*`, excluding a lone underscore
pub fn is_valid_identifier(name: &str) -> bool {
    name != "_" && IDENTIFIER_RE.is_match(name)
}

/// Derive an identifier-safe token from a type table display name
///
/// Keeps ASCII alphanumerics and underscores; a leading digit gets an
/// underscore prefix.
pub fn type_token(name: &str) -> String {
    let token: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    match token.chars().next() {
        Some(first) if first.is_ascii_digit() => format!("_{}", token),
        _ => token,
    }
}

/// Strip a trailing `_id`, drop every occurrence of the referenced table
/// name, and CamelCase what is left.
fn description_remainder(column: &str, referenced_table: &str) -> String {
    let column = column.to_lowercase();
    let referenced_table = referenced_table.to_lowercase();

    let stem = match column.strip_suffix("_id") {
        Some(stem) if !stem.is_empty() => stem,
        _ => column.as_str(),
    };

    let mut remainder = if referenced_table.is_empty() {
        stem.to_string()
    } else {
        stem.replace(&referenced_table, "")
    };
    while remainder.contains("__") {
        remainder = remainder.replace("__", "_");
    }

    to_pascal_case(&remainder)
}

/// Configured naming rules for one analysis run
#[derive(Debug, Clone)]
pub struct Naming {
    class_prefix: String,
    class_suffix: String,
    associated_object_prefix: String,
    associated_object_suffix: String,
    association_table_suffix: String,
    strip_table_prefix: String,
    reserved_words: HashSet<String>,
}

impl Default for Naming {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl Naming {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            class_prefix: config.class_prefix.clone(),
            class_suffix: config.class_suffix.clone(),
            associated_object_prefix: config.associated_object_prefix.clone(),
            associated_object_suffix: config.associated_object_suffix.clone(),
            association_table_suffix: config.association_table_suffix.clone(),
            strip_table_prefix: config.strip_table_prefix.clone(),
            reserved_words: config
                .reserved_words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .collect(),
        }
    }

    /// Case-insensitive reserved word check
    pub fn is_reserved(&self, word: &str) -> bool {
        self.reserved_words.contains(&word.trim().to_lowercase())
    }

    pub fn strip_table_prefix<'a>(&self, table: &'a str) -> &'a str {
        if self.strip_table_prefix.is_empty() {
            return table;
        }
        table.strip_prefix(self.strip_table_prefix.as_str()).unwrap_or(table)
    }

    /// `ClassPrefix + CamelCase(table without strip prefix) + ClassSuffix`
    pub fn class_name(&self, table: &str) -> String {
        format!(
            "{}{}{}",
            self.class_prefix,
            to_pascal_case(self.strip_table_prefix(table)),
            self.class_suffix
        )
    }

    pub fn class_name_plural(&self, table: &str) -> String {
        pluralize(&self.class_name(table))
    }

    pub fn column_variable_name(&self, column: &str, variable_type: VariableType) -> String {
        format!("{}{}", variable_type.prefix(), to_pascal_case(column))
    }

    pub fn column_property_name(&self, column: &str) -> String {
        to_pascal_case(column)
    }

    /// Logical name of the object a foreign key column points at
    ///
    /// `person_id` becomes `person`; a column without the `_id` suffix gets
    /// `_object` appended so the id field and object field stay distinct.
    pub fn reference_column_name(&self, column: &str) -> String {
        let lower = column.to_lowercase();
        if lower.len() > 3 && lower.ends_with("_id") {
            column[..column.len() - 3].to_string()
        } else {
            format!("{}_object", column)
        }
    }

    pub fn reference_property_name(&self, column: &str) -> String {
        to_pascal_case(&self.reference_column_name(column))
    }

    pub fn reference_variable_name(&self, column: &str) -> String {
        format!("{}{}", OBJECT_PREFIX, self.reference_property_name(column))
    }

    pub fn reverse_reference_variable_name(&self, table: &str) -> String {
        format!("{}{}", OBJECT_PREFIX, self.class_name(table))
    }

    fn subject(&self, table: &str, plural: bool) -> String {
        let subject = to_pascal_case(self.strip_table_prefix(table));
        if plural {
            pluralize(&subject)
        } else {
            subject
        }
    }

    /// Name of the accessor that navigates a foreign key backwards
    ///
    /// `table.column` references `referenced_table`. When the column is just
    /// the referenced table name (optionally with `_id`) the description is
    /// the referencing table's name. Otherwise the remainder of the column
    /// name qualifies the referenced table: `report.owner_person_id ->
    /// person` gives `PersonAsOwner`. Self references produce
    /// `Child{Table}` for `{table}_id`/`parent_id` columns and
    /// `{Table}As{Remainder}` for anything else.
    pub fn object_description(
        &self,
        table: &str,
        column: &str,
        referenced_table: &str,
        plural: bool,
    ) -> String {
        let stripped_table = self.strip_table_prefix(table);
        let stripped_referenced = self.strip_table_prefix(referenced_table);
        let column_lower = column.to_lowercase();
        let referenced_lower = stripped_referenced.to_lowercase();
        let names_referenced_table = column_lower == referenced_lower
            || column_lower == format!("{}_id", referenced_lower);

        if stripped_table.eq_ignore_ascii_case(stripped_referenced) {
            let subject = self.subject(stripped_table, plural);
            if names_referenced_table {
                return format!("Child{}", subject);
            }
            let remainder = description_remainder(column, stripped_referenced);
            if remainder.is_empty() || remainder == "Parent" {
                return format!("Child{}", subject);
            }
            return format!("{}As{}", subject, remainder);
        }

        if names_referenced_table {
            return self.subject(stripped_table, plural);
        }
        let remainder = description_remainder(column, stripped_referenced);
        if remainder.is_empty() {
            return self.subject(stripped_table, plural);
        }
        format!("{}As{}", self.subject(stripped_referenced, plural), remainder)
    }

    /// `{ReferencingTable}As{Remainder}`, used when [`Self::object_description`]
    /// collides with another description on the same referenced table
    pub fn qualified_object_description(
        &self,
        table: &str,
        column: &str,
        referenced_table: &str,
        plural: bool,
    ) -> String {
        let stripped_table = self.strip_table_prefix(table);
        let remainder = description_remainder(column, self.strip_table_prefix(referenced_table));
        let subject = self.subject(stripped_table, plural);
        if remainder.is_empty() {
            subject
        } else {
            format!("{}As{}", subject, remainder)
        }
    }

    /// Description of the associated side of a many-to-many relationship
    ///
    /// The association table name minus its suffix and both participating
    /// table names (with and without underscores) becomes the qualifier.
    pub fn association_object_description(
        &self,
        association_table: &str,
        table: &str,
        referenced_table: &str,
        plural: bool,
    ) -> String {
        let table = self.strip_table_prefix(table).to_lowercase();
        let referenced = self.strip_table_prefix(referenced_table).to_lowercase();
        let mut rest = self.strip_table_prefix(association_table).to_lowercase();

        let suffix = self.association_table_suffix.to_lowercase();
        if !suffix.is_empty() {
            rest = rest.replace(&suffix, "");
        }
        for name in [&table, &referenced] {
            if name.is_empty() {
                continue;
            }
            rest = rest.replace(name.as_str(), "");
            let squashed = name.replace('_', "");
            if !squashed.is_empty() {
                rest = rest.replace(&squashed, "");
            }
        }
        while rest.contains("__") {
            rest = rest.replace("__", "_");
        }

        let subject = self.subject(&referenced, plural);
        let qualifier = to_pascal_case(&rest);
        if qualifier.is_empty() {
            format!(
                "{}{}{}",
                self.associated_object_prefix, subject, self.associated_object_suffix
            )
        } else {
            format!(
                "{}{}As{}{}",
                self.associated_object_prefix, subject, qualifier, self.associated_object_suffix
            )
        }
    }

    /// Member variable for a one-to-one reverse navigation
    pub fn object_member_variable(&self, description: &str) -> String {
        format!("{}{}", OBJECT_PREFIX, self.object_property_name(description))
    }

    /// Property for a one-to-one reverse navigation
    pub fn object_property_name(&self, description: &str) -> String {
        format!(
            "{}{}{}",
            self.associated_object_prefix, description, self.associated_object_suffix
        )
    }
}
