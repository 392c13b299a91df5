//! Association table analysis
//!
//! An association table holds exactly two NOT NULL foreign key columns and
//! is turned into a pair of mirrored many-to-many references, one on each
//! participating table.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use super::{metadata_error, AnalysisPass, Diagnostics, TableKind};
use crate::error::TableError;
use crate::introspect::ForeignKeyDescriptor;
use crate::schema::{Column, ManyToManyReference, Table, TypeTable};

/// One participating side of an association
struct Side {
    kind: TableKind,
    table: String,
    column: String,
    key_name: String,
    primary_key: Column,
}

/// Prefixes telling the two halves of a self-association apart
///
/// Column names mentioning `parent`/`child` decide which side is which;
/// without them the second key is assumed to point at the parent.
fn graph_prefixes(
    association: &str,
    first: &str,
    second: &str,
    diagnostics: &mut Diagnostics,
) -> [&'static str; 2] {
    let (first, second) = (first.to_lowercase(), second.to_lowercase());
    if first.contains("parent") || second.contains("child") {
        ["", "Parent"]
    } else if first.contains("child") || second.contains("parent") {
        ["Parent", ""]
    } else {
        diagnostics.warning(format!(
            "Association table '{}' links a table to itself but neither column mentions 'parent' or 'child'; assuming '{}' refers to the parent",
            association, second
        ));
        ["", "Parent"]
    }
}

impl AnalysisPass<'_> {
    pub(super) fn analyze_association_table(
        &mut self,
        name: &str,
        tables: &mut BTreeMap<String, Table>,
        type_tables: &BTreeMap<String, TypeTable>,
    ) {
        if let Err(e) = self.try_association_table(name, tables, type_tables) {
            self.ctx.diagnostics.table_error(e);
        }
    }

    fn try_association_table(
        &mut self,
        name: &str,
        tables: &mut BTreeMap<String, Table>,
        type_tables: &BTreeMap<String, TypeTable>,
    ) -> Result<(), TableError> {
        let invalid = |reason: String| TableError::Association {
            table: name.to_string(),
            reason,
        };

        let fields = self
            .provider
            .fields_for_table(name)
            .map_err(|e| metadata_error(name, e))?;
        if fields.len() != 2 {
            return Err(invalid("does not have exactly 2 columns".to_string()));
        }
        if !fields.iter().all(|f| f.not_null) {
            return Err(invalid("must have both columns set to NOT NULL".to_string()));
        }
        if fields[0].primary_key != fields[1].primary_key {
            return Err(invalid(
                "must have either both or neither of its columns as primary keys".to_string(),
            ));
        }

        let foreign_keys = self.foreign_keys_for(name)?;
        if foreign_keys.len() != 2 {
            return Err(invalid(format!(
                "must have exactly 2 foreign keys, but has {}",
                foreign_keys.len()
            )));
        }
        if foreign_keys.iter().any(|fk| fk.column_names.len() != 1) {
            return Err(invalid(
                "has a foreign key on multiple columns, which is not supported".to_string(),
            ));
        }
        let one_key_each = fields.iter().all(|field| {
            foreign_keys
                .iter()
                .filter(|fk| fk.column_names[0].eq_ignore_ascii_case(&field.name))
                .count()
                == 1
        });
        if !one_key_each {
            return Err(invalid(
                "must have exactly one foreign key on each of its two columns".to_string(),
            ));
        }
        if foreign_keys
            .iter()
            .any(|fk| self.classification.is_excluded(&fk.reference_table))
        {
            debug!(table = ?name, "Skipping association with an excluded table");
            return Ok(());
        }

        let sides = [
            self.side(&foreign_keys[0], tables, type_tables).map_err(invalid)?,
            self.side(&foreign_keys[1], tables, type_tables).map_err(invalid)?,
        ];
        if sides.iter().all(|s| s.kind == TableKind::Type) {
            return Err(invalid("cannot associate two type tables".to_string()));
        }

        let prefixes = if sides[0].table.eq_ignore_ascii_case(&sides[1].table) {
            graph_prefixes(
                name,
                &sides[0].column,
                &sides[1].column,
                &mut self.ctx.diagnostics,
            )
        } else {
            ["", ""]
        };

        let association_class = self.naming.class_name(name);
        for i in 0..2 {
            let (own, opposite) = (&sides[i], &sides[1 - i]);
            if own.kind == TableKind::Type {
                trace!(table = ?name, side = ?own.table, "No many-to-many reference on type table");
                continue;
            }

            let describe = |prefix: &str, table: &str, referenced: &str, plural: bool| {
                format!(
                    "{}{}",
                    prefix,
                    self.naming
                        .association_object_description(name, table, referenced, plural)
                )
            };
            let object_description = describe(prefixes[i], &own.table, &opposite.table, false);

            let reference = ManyToManyReference {
                key_name: own.key_name.clone(),
                table: name.to_string(),
                column: own.column.clone(),
                property_name: self.naming.column_property_name(&own.column),
                opposite_column: opposite.column.clone(),
                opposite_variable_name: self
                    .naming
                    .column_variable_name(&opposite.column, opposite.primary_key.variable_type),
                opposite_property_name: self.naming.column_property_name(&opposite.column),
                opposite_variable_type: opposite.primary_key.variable_type,
                opposite_db_type: opposite.primary_key.db_type.clone(),
                opposite_object_description: describe(
                    prefixes[1 - i],
                    &opposite.table,
                    &own.table,
                    false,
                ),
                associated_table: opposite.table.clone(),
                variable_name: self.naming.reverse_reference_variable_name(&opposite.table),
                variable_type: self.naming.class_name(&opposite.table),
                object_description_plural: describe(prefixes[i], &own.table, &opposite.table, true),
                is_type_association: opposite.kind == TableKind::Type,
                options: self
                    .ctx
                    .options
                    .options(&association_class, &object_description)
                    .into(),
                object_description,
            };

            if let Some(table) = tables.get_mut(&own.table.to_lowercase()) {
                debug!(
                    table = ?table.name,
                    association = ?name,
                    description = ?reference.object_description,
                    "Installed many-to-many reference"
                );
                table.many_to_many_references.push(reference);
            }
        }

        Ok(())
    }

    /// Resolve one foreign key of an association to its table and key column
    fn side(
        &self,
        foreign_key: &ForeignKeyDescriptor,
        tables: &BTreeMap<String, Table>,
        type_tables: &BTreeMap<String, TypeTable>,
    ) -> Result<Side, String> {
        let target = &foreign_key.reference_table;
        let (kind, canonical) = self
            .classification
            .resolve(target)
            .ok_or_else(|| format!("references a table '{}' that does not appear to exist", target))?;

        let key = canonical.to_lowercase();
        let primary_key = match kind {
            TableKind::Regular => {
                let table = tables.get(&key).ok_or_else(|| {
                    format!("references table '{}' which could not be analyzed", canonical)
                })?;
                match table.primary_key_columns().as_slice() {
                    [column] => (*column).clone(),
                    _ => {
                        return Err(format!(
                            "references table '{}' which does not have a single-column primary key",
                            canonical
                        ))
                    }
                }
            }
            TableKind::Type => type_tables
                .get(&key)
                .map(|t| t.key_column.clone())
                .ok_or_else(|| {
                    format!("references type table '{}' which could not be analyzed", canonical)
                })?,
            TableKind::Association => {
                return Err(format!(
                    "references another association table '{}'",
                    canonical
                ))
            }
        };

        Ok(Side {
            kind,
            table: canonical.to_string(),
            column: foreign_key.column_names[0].clone(),
            key_name: foreign_key.key_name.clone(),
            primary_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{SchemaAnalysisContext, SchemaAnalyzer};
    use crate::config::AnalysisConfig;
    use crate::introspect::{FieldDescriptor, SnapshotProvider, SnapshotTable};
    use crate::schema::{DbType, Schema, VariableType};

    fn id() -> FieldDescriptor {
        FieldDescriptor::new("id", DbType::Integer).primary_key().identity()
    }

    fn key(name: &str) -> FieldDescriptor {
        FieldDescriptor::new(name, DbType::Integer).primary_key()
    }

    fn association(name: &str, links: [(&str, &str); 2]) -> SnapshotTable {
        links.iter().fold(SnapshotTable::new(name), |table, (column, target)| {
            table
                .field(key(column))
                .foreign_key(ForeignKeyDescriptor::single(
                    format!("fk_{}_{}", name, column),
                    *column,
                    *target,
                    "id",
                ))
        })
    }

    fn analyze(tables: Vec<SnapshotTable>) -> (Schema, Diagnostics) {
        let mut provider = SnapshotProvider {
            tables,
            profiling: false,
        };
        let mut ctx = SchemaAnalysisContext::default();
        let schema = SchemaAnalyzer::new(AnalysisConfig::default())
            .unwrap()
            .analyze(&mut ctx, Some(&mut provider))
            .unwrap();
        (schema, ctx.diagnostics)
    }

    #[test]
    fn test_many_to_many_mirror() {
        let (schema, diagnostics) = analyze(vec![
            SnapshotTable::new("person").field(id()),
            SnapshotTable::new("project").field(id()),
            association(
                "team_member_project_assn",
                [("project_id", "project"), ("person_id", "person")],
            ),
        ]);

        assert!(diagnostics.is_clean(), "{:?}", diagnostics);
        let person = &schema.table("person").unwrap().many_to_many_references[0];
        let project = &schema.table("project").unwrap().many_to_many_references[0];

        assert_eq!(project.object_description, "PersonAsTeamMember");
        assert_eq!(project.object_description_plural, "PersonsAsTeamMember");
        assert_eq!(person.object_description, "ProjectAsTeamMember");
        assert_eq!(project.opposite_object_description, person.object_description);
        assert_eq!(person.opposite_object_description, project.object_description);
        assert_eq!(project.column, person.opposite_column);
        assert_eq!(project.associated_table, "person");
        assert_eq!(person.associated_table, "project");
        assert_eq!(project.table, "team_member_project_assn");
        assert_eq!(project.opposite_column, "person_id");
        assert_eq!(project.opposite_variable_name, "intPersonId");
        assert_eq!(project.opposite_variable_type, VariableType::Integer);
        assert_eq!(project.variable_type, "Person");
        assert_eq!(project.variable_name, "objPerson");
        assert!(!project.is_type_association);
    }

    #[test]
    fn test_self_association_prefixes() {
        let (schema, diagnostics) = analyze(vec![
            SnapshotTable::new("person").field(id()),
            association(
                "person_mentor_assn",
                [("parent_person_id", "person"), ("child_person_id", "person")],
            ),
        ]);

        assert!(diagnostics.is_clean(), "{:?}", diagnostics);
        let references = &schema.table("person").unwrap().many_to_many_references;
        assert_eq!(references.len(), 2);
        assert_eq!(references[0].object_description, "PersonAsMentor");
        assert_eq!(references[1].object_description, "ParentPersonAsMentor");
        assert_eq!(references[0].opposite_object_description, "ParentPersonAsMentor");
    }

    #[test]
    fn test_self_association_fallback_warns() {
        let (schema, diagnostics) = analyze(vec![
            SnapshotTable::new("person").field(id()),
            association("person_friend_assn", [("person_id", "person"), ("friend_id", "person")]),
        ]);

        assert_eq!(diagnostics.warnings.len(), 1);
        let references = &schema.table("person").unwrap().many_to_many_references;
        assert_eq!(references[1].object_description, "ParentPersonAsFriend");
    }

    #[test]
    fn test_type_association() {
        let (schema, diagnostics) = analyze(vec![
            SnapshotTable::new("person").field(id()),
            SnapshotTable::new("role_type")
                .field(key("id"))
                .field(FieldDescriptor::new("name", DbType::VarChar).unique()),
            association("person_role_assn", [("person_id", "person"), ("role_type_id", "role_type")]),
        ]);

        assert!(diagnostics.is_clean(), "{:?}", diagnostics);
        let references = &schema.table("person").unwrap().many_to_many_references;
        assert_eq!(references.len(), 1);
        assert!(references[0].is_type_association);
        assert_eq!(references[0].variable_type, "RoleType");
    }

    #[test]
    fn test_association_rejections() {
        let nullable = SnapshotTable::new("person_project_assn")
            .field(FieldDescriptor::new("person_id", DbType::Integer))
            .field(FieldDescriptor::new("project_id", DbType::Integer));
        let single_key = SnapshotTable::new("person_team_assn")
            .field(key("person_id"))
            .foreign_key(ForeignKeyDescriptor::single("fk_p", "person_id", "person", "id"))
            .field(FieldDescriptor::new("team_id", DbType::Integer).not_null());

        let (schema, diagnostics) = analyze(vec![
            SnapshotTable::new("person").field(id()),
            SnapshotTable::new("project").field(id()),
            nullable,
            single_key,
        ]);

        assert!(schema.tables.values().all(|t| t.many_to_many_references.is_empty()));
        assert_eq!(diagnostics.errors.len(), 2);
        assert!(diagnostics.errors[0].contains("NOT NULL"));
        assert!(diagnostics.errors[1].contains("primary keys"));
    }

    #[test]
    fn test_association_keys_must_cover_both_columns() {
        let stray = SnapshotTable::new("person_project_assn")
            .field(key("person_id"))
            .field(key("project_id"))
            .foreign_key(ForeignKeyDescriptor::single("fk_a", "person_id", "person", "id"))
            .foreign_key(ForeignKeyDescriptor::single("fk_b", "owner_id", "project", "id"));
        let doubled = SnapshotTable::new("person_team_assn")
            .field(key("person_id"))
            .field(key("team_id"))
            .foreign_key(ForeignKeyDescriptor::single("fk_c", "person_id", "person", "id"))
            .foreign_key(ForeignKeyDescriptor::single("fk_d", "PERSON_ID", "project", "id"));

        let (schema, diagnostics) = analyze(vec![
            SnapshotTable::new("person").field(id()),
            SnapshotTable::new("project").field(id()),
            stray,
            doubled,
        ]);

        assert!(schema.tables.values().all(|t| t.many_to_many_references.is_empty()));
        assert_eq!(diagnostics.errors.len(), 2);
        assert!(diagnostics
            .errors
            .iter()
            .all(|e| e.contains("exactly one foreign key on each of its two columns")));
    }

    #[test]
    fn test_association_with_missing_foreign_key() {
        let (_, diagnostics) = analyze(vec![
            SnapshotTable::new("person").field(id()),
            SnapshotTable::new("person_tag_assn")
                .field(key("person_id"))
                .field(key("tag_id"))
                .foreign_key(ForeignKeyDescriptor::single("fk_p", "person_id", "person", "id")),
        ]);

        assert_eq!(diagnostics.errors.len(), 1);
        assert!(diagnostics.errors[0].contains("exactly 2 foreign keys"));
    }
}
