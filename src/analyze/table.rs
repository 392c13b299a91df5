//! Regular table analysis
//!
//! Columns, indexes and foreign keys of an ordinary table. Reverse
//! references are collected here but only installed on the referenced
//! tables once every regular table is known.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use super::{
    analyze_field, metadata_error, AnalysisPass, ColumnContext, Diagnostics, TableKind,
};
use crate::error::TableError;
use crate::introspect::ForeignKeyDescriptor;
use crate::naming::{is_valid_identifier, pluralize, Naming, OBJECT_PREFIX};
use crate::schema::{Column, Index, Reference, ReverseReference, Table, TypeTable};

/// How the referencing row relates to the referenced one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ReverseKind {
    /// The foreign key is the referencing table's sole primary key
    Inheritance,
    OneToOne,
    OneToMany,
}

/// A reverse reference waiting for its referenced table to be analyzed
#[derive(Debug, Clone)]
pub(super) struct PendingReverse {
    /// Lowercased referenced table
    target: String,
    /// Lowercased referencing table
    source: String,
    /// Lowercased referencing column
    column: String,
    kind: ReverseKind,
    reverse: ReverseReference,
}

pub(super) struct TableAnalysis {
    pub table: Table,
    pub reverse_references: Vec<PendingReverse>,
}

/// Case-insensitive, order-insensitive column list comparison
fn same_column_set(a: &[String], b: &[String]) -> bool {
    let set = |names: &[String]| {
        names
            .iter()
            .map(|name| name.to_lowercase())
            .collect::<BTreeSet<_>>()
    };
    set(a) == set(b)
}

impl AnalysisPass<'_> {
    fn reject(&mut self, err: TableError) -> Option<TableAnalysis> {
        self.ctx.diagnostics.table_error(err);
        None
    }

    /// Analyze a regular table; `None` when it has to be left out
    pub(super) fn analyze_table(&mut self, name: &str) -> Option<TableAnalysis> {
        let fields = match self.provider.fields_for_table(name) {
            Ok(fields) => fields,
            Err(e) => return self.reject(metadata_error(name, e)),
        };

        let class_name = self.naming.class_name(name);
        let context = ColumnContext {
            table_name: name,
            class_name: &class_name,
            primary_key_count: fields.iter().filter(|f| f.primary_key).count(),
        };

        let mut columns = BTreeMap::new();
        let mut column_order = Vec::new();
        let mut primary_key = Vec::new();
        let mut column_failed = false;
        for field in &fields {
            match analyze_field(
                field,
                context,
                self.naming,
                self.ctx.options.as_ref(),
                &mut self.ctx.diagnostics,
            ) {
                Ok(column) => {
                    if column.primary_key {
                        primary_key.push(column.name.clone());
                    }
                    let key = column.name.to_lowercase();
                    column_order.push(key.clone());
                    columns.insert(key, column);
                }
                Err(e) => {
                    self.ctx.diagnostics.table_error(e);
                    column_failed = true;
                }
            }
        }
        if column_failed {
            debug!(table = ?name, "Dropping table with unusable columns");
            return None;
        }

        let mut indexes = match self.analyze_indexes(name, &mut columns, &primary_key) {
            Ok(indexes) => indexes,
            Err(e) => return self.reject(e),
        };

        let foreign_keys = match self.foreign_keys_for(name) {
            Ok(keys) => keys,
            Err(e) => return self.reject(e),
        };

        let mut reverse_references = Vec::new();
        for foreign_key in &foreign_keys {
            match self.analyze_foreign_key(
                name,
                &class_name,
                &primary_key,
                foreign_key,
                &mut columns,
                &mut indexes,
            ) {
                Ok(Some(pending)) => reverse_references.push(pending),
                Ok(None) => {}
                Err(e) => return self.reject(e),
            }
        }

        if !is_valid_identifier(name) {
            return self.reject(TableError::InvalidTableName(name.to_string()));
        }
        if self.naming.is_reserved(name) {
            return self.reject(TableError::ReservedTableName(name.to_string()));
        }
        for key in &column_order {
            let column = &columns[key];
            if !is_valid_identifier(&column.name) {
                let err = TableError::InvalidColumnName {
                    table: name.to_string(),
                    column: column.name.clone(),
                };
                return self.reject(err);
            }
        }
        if primary_key.is_empty() {
            return self.reject(TableError::NoPrimaryKey(name.to_string()));
        }

        debug!(
            table = ?name,
            columns = ?columns.len(),
            indexes = ?indexes.len(),
            foreign_keys = ?foreign_keys.len(),
            "Analyzed table"
        );

        Some(TableAnalysis {
            table: Table {
                database_index: self.database_index,
                name: name.to_string(),
                class_name_plural: pluralize(&class_name),
                class_name,
                columns,
                primary_key,
                reverse_references: Vec::new(),
                many_to_many_references: Vec::new(),
                indexes,
            },
            reverse_references,
        })
    }

    /// Primary key index plus the database's own indexes
    ///
    /// Broken indexes are recorded and skipped.
    fn analyze_indexes(
        &mut self,
        name: &str,
        columns: &mut BTreeMap<String, Column>,
        primary_key: &[String],
    ) -> Result<Vec<Index>, TableError> {
        let mut indexes = Vec::new();
        if !primary_key.is_empty() {
            indexes.push(Index {
                key_name: format!("pk_{}", name),
                unique: true,
                primary_key: true,
                synthesized: false,
                column_names: primary_key.to_vec(),
            });
        }

        let descriptors = self
            .provider
            .indexes_for_table(name)
            .map_err(|e| metadata_error(name, e))?;

        'indexes: for descriptor in descriptors {
            if descriptor.column_names.is_empty() {
                self.ctx.diagnostics.table_error(TableError::EmptyIndex {
                    table: name.to_string(),
                    index: descriptor.key_name,
                });
                continue;
            }

            let mut column_names = Vec::new();
            for column_name in &descriptor.column_names {
                match columns.get(&column_name.to_lowercase()) {
                    Some(column) => column_names.push(column.name.clone()),
                    None => {
                        self.ctx.diagnostics.table_error(TableError::IndexColumnMissing {
                            table: name.to_string(),
                            index: descriptor.key_name.clone(),
                            column: column_name.clone(),
                        });
                        continue 'indexes;
                    }
                }
            }

            if descriptor.primary_key {
                trace!(table = ?name, index = ?descriptor.key_name, "Skipping primary key index");
                continue;
            }
            if indexes
                .iter()
                .any(|index| same_column_set(&index.column_names, &column_names))
            {
                trace!(table = ?name, index = ?descriptor.key_name, "Skipping duplicate index");
                continue;
            }

            if let [single] = column_names.as_slice() {
                if let Some(column) = columns.get_mut(&single.to_lowercase()) {
                    column.indexed = true;
                    column.unique |= descriptor.unique;
                }
            }

            indexes.push(Index {
                key_name: descriptor.key_name,
                unique: descriptor.unique,
                primary_key: false,
                synthesized: false,
                column_names,
            });
        }

        Ok(indexes)
    }

    /// Attach one foreign key to its column
    ///
    /// Returns the reverse reference to install on the referenced table, if
    /// any. Unsupported keys are recorded and skipped; an `Err` drops the
    /// table.
    fn analyze_foreign_key(
        &mut self,
        name: &str,
        class_name: &str,
        primary_key: &[String],
        foreign_key: &ForeignKeyDescriptor,
        columns: &mut BTreeMap<String, Column>,
        indexes: &mut Vec<Index>,
    ) -> Result<Option<PendingReverse>, TableError> {
        let [column_name] = foreign_key.column_names.as_slice() else {
            self.ctx
                .diagnostics
                .table_error(TableError::MultiColumnForeignKey {
                    table: name.to_string(),
                    key: foreign_key.key_name.clone(),
                });
            return Ok(None);
        };

        let column_key = column_name.to_lowercase();
        let Some(column) = columns.get_mut(&column_key) else {
            self.ctx
                .diagnostics
                .table_error(TableError::ForeignKeyColumnMissing {
                    table: name.to_string(),
                    key: foreign_key.key_name.clone(),
                    column: column_name.clone(),
                });
            return Ok(None);
        };

        if self.classification.is_excluded(&foreign_key.reference_table) {
            debug!(
                table = ?name,
                key = ?foreign_key.key_name,
                target = ?foreign_key.reference_table,
                "Skipping foreign key to excluded table"
            );
            return Ok(None);
        }

        let Some((kind, target)) = self.classification.resolve(&foreign_key.reference_table)
        else {
            return Err(TableError::UnknownReferencedTable {
                table: name.to_string(),
                key: foreign_key.key_name.clone(),
                target: foreign_key.reference_table.clone(),
            });
        };
        let target = target.to_string();

        let has_index = indexes.iter().any(|index| {
            matches!(index.column_names.as_slice(), [only] if only.eq_ignore_ascii_case(&column.name))
        });
        if !has_index {
            indexes.push(Index {
                key_name: format!("virtualix_{}_{}", name, column.name).to_lowercase(),
                unique: column.unique,
                primary_key: false,
                synthesized: true,
                column_names: vec![column.name.clone()],
            });
            column.indexed = true;
            self.ctx.diagnostics.warning(format!(
                "It is recommended that you add a single-column index for the foreign key {}.{}",
                name, column.name
            ));
        }

        let is_type = kind == TableKind::Type;
        let target_class = self.naming.class_name(&target);
        let reference = Reference {
            key_name: foreign_key.key_name.clone(),
            table: target.clone(),
            column: foreign_key
                .reference_columns
                .first()
                .cloned()
                .unwrap_or_default(),
            variable_type: target_class.clone(),
            name: self.naming.reference_column_name(&column.name),
            property_name: self.naming.reference_property_name(&column.name),
            variable_name: self.naming.reference_variable_name(&column.name),
            is_type,
            reverse_reference: None,
        };

        let store = self.ctx.options.as_ref();
        column.options = std::mem::take(&mut column.options)
            .overlay(store.options(class_name, &reference.property_name));

        let pending = if is_type || kind == TableKind::Association {
            None
        } else {
            let kind = if primary_key.len() == 1 && column.primary_key {
                ReverseKind::Inheritance
            } else if column.unique {
                ReverseKind::OneToOne
            } else {
                ReverseKind::OneToMany
            };

            let (object_description, object_description_plural) = match kind {
                ReverseKind::Inheritance => (class_name.to_string(), pluralize(class_name)),
                _ => (
                    self.naming.object_description(name, &column.name, &target, false),
                    self.naming.object_description(name, &column.name, &target, true),
                ),
            };
            let (object_member_variable, object_property_name) = match kind {
                ReverseKind::Inheritance => (
                    Some(format!("{}{}", OBJECT_PREFIX, class_name)),
                    Some(class_name.to_string()),
                ),
                ReverseKind::OneToOne => (
                    Some(self.naming.object_member_variable(&object_description)),
                    Some(self.naming.object_property_name(&object_description)),
                ),
                ReverseKind::OneToMany => (None, None),
            };

            Some(PendingReverse {
                target: target.to_lowercase(),
                source: name.to_lowercase(),
                column: column_key,
                kind,
                reverse: ReverseReference {
                    key_name: foreign_key.key_name.clone(),
                    table: name.to_string(),
                    column: column.name.clone(),
                    not_null: column.not_null,
                    unique: column.unique,
                    property_name: column.property_name.clone(),
                    variable_name: self.naming.reverse_reference_variable_name(name),
                    variable_type: class_name.to_string(),
                    options: store.options(&target_class, &object_description).into(),
                    object_description,
                    object_description_plural,
                    object_member_variable,
                    object_property_name,
                },
            })
        };

        trace!(table = ?name, column = ?column.name, target = ?target, "Attached foreign key");
        column.reference = Some(reference);
        Ok(pending)
    }
}

/// Install collected reverse references on their referenced tables
///
/// A description that clashes with one already on the table is qualified
/// with the referencing table's name instead.
pub(super) fn install_reverse_references(
    tables: &mut BTreeMap<String, Table>,
    pending: Vec<PendingReverse>,
    naming: &Naming,
    diagnostics: &mut Diagnostics,
) {
    for PendingReverse {
        target,
        source,
        column,
        kind,
        mut reverse,
    } in pending
    {
        if !tables.contains_key(&target) {
            if let Some(reference) = tables
                .get_mut(&source)
                .and_then(|t| t.columns.get_mut(&column))
                .and_then(|c| c.reference.as_mut())
            {
                reference.reverse_reference = None;
            }
            continue;
        }
        let Some(target_table) = tables.get_mut(&target) else {
            continue;
        };

        let taken = |description: &str, table: &Table| {
            table
                .reverse_references
                .iter()
                .any(|r| r.object_description == description)
        };

        if kind != ReverseKind::Inheritance && taken(&reverse.object_description, target_table) {
            let original = reverse.object_description.clone();
            reverse.object_description =
                naming.qualified_object_description(&reverse.table, &reverse.column, &target_table.name, false);
            reverse.object_description_plural =
                naming.qualified_object_description(&reverse.table, &reverse.column, &target_table.name, true);
            if kind == ReverseKind::OneToOne {
                reverse.object_member_variable =
                    Some(naming.object_member_variable(&reverse.object_description));
                reverse.object_property_name =
                    Some(naming.object_property_name(&reverse.object_description));
            }
            debug!(
                table = ?target_table.name,
                from = ?original,
                to = ?reverse.object_description,
                "Qualified clashing reverse reference"
            );
        }

        if taken(&reverse.object_description, target_table) {
            diagnostics.warning(format!(
                "Reverse reference '{}' on table '{}' (from {}.{}) clashes with an existing reverse reference",
                reverse.object_description, target_table.name, reverse.table, reverse.column
            ));
        }

        target_table.reverse_references.push(reverse);
        let index = target_table.reverse_references.len() - 1;

        if let Some(reference) = tables
            .get_mut(&source)
            .and_then(|t| t.columns.get_mut(&column))
            .and_then(|c| c.reference.as_mut())
        {
            reference.reverse_reference = Some(index);
        }
    }
}

/// Cross-table checks once every table is known
///
/// Only warnings: the model is still usable, but the generated accessors
/// for these references will not line up with a primary key.
pub(super) fn verify_references(
    tables: &BTreeMap<String, Table>,
    type_tables: &BTreeMap<String, TypeTable>,
    diagnostics: &mut Diagnostics,
) {
    for table in tables.values() {
        for column in table.columns.values() {
            let Some(reference) = &column.reference else {
                continue;
            };
            let target_key = reference.table.to_lowercase();

            if reference.is_type {
                if !type_tables.contains_key(&target_key) {
                    diagnostics.warning(format!(
                        "Foreign key '{}' in table '{}' references type table '{}' which was not analyzed",
                        reference.key_name, table.name, reference.table
                    ));
                }
                continue;
            }

            let Some(target) = tables.get(&target_key) else {
                diagnostics.warning(format!(
                    "Foreign key '{}' in table '{}' references table '{}' which was not analyzed",
                    reference.key_name, table.name, reference.table
                ));
                continue;
            };

            let keyed = target
                .column(&reference.column)
                .is_some_and(|c| c.primary_key)
                && target.primary_key.len() == 1;
            if !keyed {
                diagnostics.warning(format!(
                    "Invalid relationship created in {} class (for foreign key '{}'): column '{}' is not the single-column primary key of table '{}'",
                    table.class_name, reference.key_name, reference.column, target.name
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::analyze::{Diagnostics, OptionOverrides, SchemaAnalysisContext, SchemaAnalyzer};
    use crate::config::AnalysisConfig;
    use crate::introspect::{
        FieldDescriptor, ForeignKeyDescriptor, IndexDescriptor, SnapshotProvider, SnapshotTable,
    };
    use crate::schema::{DbType, Schema};

    fn id() -> FieldDescriptor {
        FieldDescriptor::new("id", DbType::Integer).primary_key().identity()
    }

    fn fk_int(name: &str) -> FieldDescriptor {
        FieldDescriptor::new(name, DbType::Integer)
    }

    fn indexed(table: SnapshotTable, column: &str, unique: bool) -> SnapshotTable {
        table.index(IndexDescriptor::new(format!("ix_{}", column), unique, vec![column.to_string()]))
    }

    fn person() -> SnapshotTable {
        SnapshotTable::new("person")
            .field(id())
            .field(FieldDescriptor::new("email", DbType::VarChar))
    }

    fn analyze_with(provider: &mut SnapshotProvider, ctx: &mut SchemaAnalysisContext) -> Schema {
        SchemaAnalyzer::new(AnalysisConfig::default())
            .unwrap()
            .analyze(ctx, Some(provider))
            .unwrap()
    }

    fn analyze(tables: Vec<SnapshotTable>) -> (Schema, Diagnostics) {
        let mut provider = SnapshotProvider {
            tables,
            profiling: false,
        };
        let mut ctx = SchemaAnalysisContext::default();
        let schema = analyze_with(&mut provider, &mut ctx);
        (schema, ctx.diagnostics)
    }

    #[test]
    fn test_indexes() {
        let person = indexed(person(), "email", true)
            .index(IndexDescriptor::new("ix_dup_pk", true, vec!["id".to_string()]))
            .index(IndexDescriptor::new("ix_empty", false, vec![]))
            .index(IndexDescriptor::new("ix_ghost", false, vec!["ghost".to_string()]));

        let (schema, diagnostics) = analyze(vec![person]);

        let person = schema.table("person").unwrap();
        let names: Vec<_> = person.indexes.iter().map(|i| i.key_name.as_str()).collect();
        assert_eq!(names, vec!["pk_person", "ix_email"]);
        assert!(person.indexes[0].primary_key);
        let email = person.column("email").unwrap();
        assert!(email.unique && email.indexed);
        assert_eq!(diagnostics.errors.len(), 2);
        assert!(diagnostics.errors[0].contains("ix_empty"));
        assert!(diagnostics.errors[1].contains("ghost"));
    }

    #[test]
    fn test_duplicate_column_sets_are_skipped() {
        let ix = |key: &str, columns: &[&str], unique: bool| {
            IndexDescriptor::new(key, unique, columns.iter().map(|c| c.to_string()).collect())
        };
        let person = SnapshotTable::new("person")
            .field(id())
            .field(FieldDescriptor::new("a", DbType::Integer))
            .field(FieldDescriptor::new("b", DbType::Integer))
            .index(ix("ix_a1", &["a"], false))
            .index(ix("ix_a2", &["A"], true))
            .index(ix("ix_ab", &["a", "b"], false))
            .index(ix("ix_ba", &["b", "a"], false));

        let (schema, diagnostics) = analyze(vec![person]);

        assert!(diagnostics.is_clean(), "{:?}", diagnostics);
        let person = schema.table("person").unwrap();
        let names: Vec<_> = person.indexes.iter().map(|i| i.key_name.as_str()).collect();
        assert_eq!(names, vec!["pk_person", "ix_a1", "ix_ab"]);
        let a = person.column("a").unwrap();
        assert!(a.indexed);
        assert!(!a.unique);
    }

    #[test]
    fn test_virtual_index_on_unique_foreign_key() {
        let login = SnapshotTable::new("login")
            .field(id())
            .field(fk_int("person_id").unique())
            .field(fk_int("referrer_id"))
            .foreign_key(ForeignKeyDescriptor::single("fk_login", "person_id", "person", "id"))
            .foreign_key(ForeignKeyDescriptor::single("fk_referrer", "referrer_id", "person", "id"));

        let (schema, diagnostics) = analyze(vec![person(), login]);

        let login = schema.table("login").unwrap();
        let virtual_index = |column: &str| {
            login
                .indexes
                .iter()
                .find(|i| i.synthesized && i.column_names == vec![column.to_string()])
                .unwrap()
        };
        assert!(virtual_index("person_id").unique);
        assert!(!virtual_index("referrer_id").unique);
        assert_eq!(diagnostics.warnings.len(), 2);
    }

    #[test]
    fn test_self_reference() {
        let employee = indexed(
            SnapshotTable::new("employee")
                .field(id())
                .field(fk_int("manager_id"))
                .foreign_key(ForeignKeyDescriptor::single("fk_manager", "manager_id", "employee", "id")),
            "manager_id",
            false,
        );

        let (schema, diagnostics) = analyze(vec![employee]);

        assert!(diagnostics.is_clean(), "{:?}", diagnostics);
        let employee = schema.table("employee").unwrap();
        let reverse = &employee.reverse_references[0];
        assert_eq!(reverse.object_description, "EmployeeAsManager");
        assert_eq!(reverse.object_description_plural, "EmployeesAsManager");
        assert_eq!(reverse.variable_name, "objEmployee");
        let reference = employee.column("manager_id").unwrap().reference.as_ref().unwrap();
        assert_eq!(reference.property_name, "Manager");
        assert_eq!(reference.variable_name, "objManager");
    }

    #[test]
    fn test_one_to_one_and_inheritance() {
        let login = indexed(
            SnapshotTable::new("login")
                .field(id())
                .field(fk_int("person_id").unique())
                .foreign_key(ForeignKeyDescriptor::single("fk_login", "person_id", "person", "id")),
            "person_id",
            true,
        );
        let employee = SnapshotTable::new("employee")
            .field(FieldDescriptor::new("person_id", DbType::Integer).primary_key())
            .foreign_key(ForeignKeyDescriptor::single("fk_emp", "person_id", "person", "id"));

        let (schema, diagnostics) = analyze(vec![person(), login, employee]);

        assert!(diagnostics.is_clean(), "{:?}", diagnostics);
        let person = schema.table("person").unwrap();
        let (employee, login): (Vec<_>, Vec<_>) =
            person.reverse_references.iter().partition(|r| r.table == "employee");
        assert_eq!(employee[0].object_member_variable.as_deref(), Some("objEmployee"));
        assert_eq!(employee[0].object_description_plural, "Employees");
        assert_eq!(login[0].object_description, "Login");
        assert_eq!(login[0].object_property_name.as_deref(), Some("Login"));
        assert_eq!(login[0].object_member_variable.as_deref(), Some("objLogin"));
    }

    #[test]
    fn test_clashing_descriptions_are_qualified() {
        let owned = |name: &str| {
            indexed(
                SnapshotTable::new(name)
                    .field(id())
                    .field(fk_int("owner_person_id"))
                    .foreign_key(ForeignKeyDescriptor::single(
                        format!("fk_{}_owner", name),
                        "owner_person_id",
                        "person",
                        "id",
                    )),
                "owner_person_id",
                false,
            )
        };

        let (schema, diagnostics) = analyze(vec![person(), owned("report"), owned("project")]);

        assert!(diagnostics.is_clean(), "{:?}", diagnostics);
        let person = schema.table("person").unwrap();
        let descriptions: Vec<_> = person
            .reverse_references
            .iter()
            .map(|r| r.object_description.as_str())
            .collect();
        assert_eq!(descriptions, vec!["PersonAsOwner", "ReportAsOwner"]);

        let report = schema.table("report").unwrap();
        let reference = report.column("owner_person_id").unwrap().reference.as_ref().unwrap();
        assert_eq!(
            schema.reverse_reference_of(reference).unwrap().object_description_plural,
            "ReportsAsOwner"
        );
    }

    #[test]
    fn test_multi_column_foreign_key() {
        let line = SnapshotTable::new("order_line")
            .field(id())
            .field(fk_int("order_id"))
            .field(fk_int("order_rev"))
            .foreign_key(ForeignKeyDescriptor::new(
                "fk_order",
                vec!["order_id".to_string(), "order_rev".to_string()],
                "orders",
                vec!["id".to_string(), "rev".to_string()],
            ));
        let orders = SnapshotTable::new("orders").field(id());

        let (schema, diagnostics) = analyze(vec![line, orders]);

        let line = schema.table("order_line").unwrap();
        assert_eq!(line.reference_count(), 0);
        assert_eq!(diagnostics.errors.len(), 1);
        assert!(diagnostics.errors[0].contains("multiple columns"));
    }

    #[test]
    fn test_unknown_reference_target_drops_table() {
        let address = SnapshotTable::new("address")
            .field(id())
            .field(fk_int("country_id"))
            .foreign_key(ForeignKeyDescriptor::single("fk_country", "country_id", "country", "id"));

        let (schema, diagnostics) = analyze(vec![address]);

        assert!(schema.tables.is_empty());
        assert_eq!(diagnostics.errors.len(), 1);
        assert!(diagnostics.errors[0].contains("country"));
    }

    #[test]
    fn test_rejected_table_names() {
        let (schema, diagnostics) = analyze(vec![
            SnapshotTable::new("class").field(id()),
            SnapshotTable::new("2fa_code").field(id()),
            SnapshotTable::new("widget")
                .field(id())
                .field(FieldDescriptor::new("part-no", DbType::VarChar)),
        ]);

        assert!(schema.tables.is_empty());
        assert_eq!(diagnostics.errors.len(), 3);
        assert!(diagnostics.errors.iter().any(|e| e.contains("reserved word")));
        assert!(diagnostics.errors.iter().any(|e| e.contains("dashes")));
    }

    #[test]
    fn test_type_reference_has_no_reverse() {
        let status = SnapshotTable::new("status_type")
            .field(FieldDescriptor::new("id", DbType::Integer).primary_key())
            .field(FieldDescriptor::new("name", DbType::VarChar).unique());
        let project = indexed(
            SnapshotTable::new("project")
                .field(id())
                .field(fk_int("status_type_id").not_null())
                .foreign_key(ForeignKeyDescriptor::single(
                    "fk_status",
                    "status_type_id",
                    "status_type",
                    "id",
                )),
            "status_type_id",
            false,
        );

        let (schema, diagnostics) = analyze(vec![status, project]);

        assert!(diagnostics.is_clean(), "{:?}", diagnostics);
        let reference = schema
            .table("project")
            .unwrap()
            .column("status_type_id")
            .unwrap()
            .reference
            .clone()
            .unwrap();
        assert!(reference.is_type);
        assert_eq!(reference.variable_type, "StatusType");
        assert_eq!(reference.reverse_reference, None);
    }

    #[test]
    fn test_reference_to_non_key_column_warns() {
        let person = indexed(person(), "email", true);
        let invite = indexed(
            SnapshotTable::new("invite")
                .field(id())
                .field(FieldDescriptor::new("email", DbType::VarChar))
                .foreign_key(ForeignKeyDescriptor::single("fk_invite", "email", "person", "email")),
            "email",
            false,
        );

        let (_, diagnostics) = analyze(vec![person, invite]);

        assert!(diagnostics.errors.is_empty());
        assert_eq!(diagnostics.warnings.len(), 1);
        assert!(diagnostics.warnings[0].starts_with("Invalid relationship created in Invite class"));
    }

    #[test]
    fn test_reference_options_from_store() {
        let mut provider = SnapshotProvider::new().with_table(person()).with_table(indexed(
            SnapshotTable::new("address")
                .field(id())
                .field(fk_int("person_id"))
                .foreign_key(ForeignKeyDescriptor::single("fk_person", "person_id", "person", "id")),
            "person_id",
            false,
        ));
        let store = OptionOverrides::from_json(
            r#"{"Address": {"Person": {"Label": "Resident"}}, "Person": {"Address": {"Sort": "Street"}}}"#,
        )
        .unwrap();
        let mut ctx = SchemaAnalysisContext::new(store);

        let schema = analyze_with(&mut provider, &mut ctx);

        let column = schema.table("address").unwrap().column("person_id").unwrap().clone();
        assert_eq!(column.options.get("Label"), Some(&serde_json::json!("Resident")));
        let reverse = &schema.table("person").unwrap().reverse_references[0];
        assert_eq!(reverse.options.get("Sort"), Some(&serde_json::json!("Street")));
    }
}
