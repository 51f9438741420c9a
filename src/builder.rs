//! Schema Model Builder
//!
//! Turns a [`RawCatalog`] into a [`SchemaModel`]: names are normalized once
//! per table and column, types are resolved through the [`TypeMap`], and
//! declared references are resolved against the other tables of the same
//! catalog. Table and column order are carried over unchanged so that an
//! unchanged database always yields the same model.

use std::collections::HashMap;

use tracing::{debug, info, trace, warn};

use crate::dialect::Dialect;
use crate::error::InspectError;
use crate::introspect::{RawCatalog, RawForeignKey, RawTable};
use crate::naming::{column_name_to_field_name, table_name_to_type_name};
use crate::schema::{ColumnDescriptor, ForeignKeyTarget, Resolution, SchemaModel, TableDescriptor};
use crate::typemap::{CanonicalType, TypeMap};

/// Reference waiting for every table to be built: (table index, column index, target)
type PendingReference = (usize, usize, RawForeignKey);

pub struct SchemaBuilder<'a> {
    types: &'a TypeMap,
}

impl<'a> SchemaBuilder<'a> {
    pub fn new(types: &'a TypeMap) -> Self {
        Self { types }
    }

    pub fn build(&self, catalog: &RawCatalog) -> Result<SchemaModel, InspectError> {
        info!(
            dialect = %catalog.dialect,
            schema = ?catalog.schema,
            tables = catalog.tables.len(),
            "Building schema model"
        );

        let mut tables: Vec<TableDescriptor> = Vec::with_capacity(catalog.tables.len());
        let mut type_names: HashMap<String, &str> = HashMap::new();
        let mut pending: Vec<PendingReference> = Vec::new();

        for (table_index, raw_table) in catalog.tables.iter().enumerate() {
            let table = self.build_table(catalog.dialect, raw_table)?;

            // Two tables with one class name would overwrite each other's output
            if let Some(first) = type_names.insert(table.type_name.clone(), &raw_table.name) {
                return Err(InspectError::NameCollision {
                    table: catalog.schema.clone(),
                    first: first.to_string(),
                    second: raw_table.name.clone(),
                    identifier: table.type_name,
                });
            }

            for (column_index, raw_column) in raw_table.columns.iter().enumerate() {
                if let Some(target) = &raw_column.foreign_key {
                    pending.push((table_index, column_index, target.clone()));
                }
            }

            tables.push(table);
        }

        for (table_index, column_index, target) in pending {
            let resolved = resolve_reference(&tables, &target);
            if resolved.is_dangling() {
                warn!(
                    table = ?tables[table_index].raw_name,
                    column = ?tables[table_index].columns[column_index].raw_name,
                    references = ?resolved.qualified_name(),
                    "Reference target is outside the inspected catalog"
                );
            }
            tables[table_index].columns[column_index].foreign_key = Some(resolved);
        }

        info!(tables = tables.len(), "Schema model complete");

        Ok(SchemaModel {
            dialect: catalog.dialect,
            name: catalog.schema.clone(),
            tables,
        })
    }

    fn build_table(
        &self,
        dialect: Dialect,
        raw_table: &RawTable,
    ) -> Result<TableDescriptor, InspectError> {
        let type_name = table_name_to_type_name(&raw_table.name);
        debug!(table = ?raw_table.name, type_name = ?type_name, "Normalizing table");

        let mut field_names: HashMap<String, &str> = HashMap::new();
        let mut columns = Vec::with_capacity(raw_table.columns.len());

        for raw_column in &raw_table.columns {
            let field_name = column_name_to_field_name(&raw_column.name);
            if let Some(first) = field_names.insert(field_name.clone(), &raw_column.name) {
                return Err(InspectError::NameCollision {
                    table: raw_table.name.clone(),
                    first: first.to_string(),
                    second: raw_column.name.clone(),
                    identifier: field_name,
                });
            }

            let resolved = self.types.resolve(dialect, raw_column);
            if resolved.canonical == CanonicalType::Unknown {
                warn!(
                    table = ?raw_table.name,
                    column = ?raw_column.name,
                    data_type = ?raw_column.data_type,
                    "Unrecognized column type, emitting as unknown"
                );
            }

            trace!(
                column = ?raw_column.name,
                field = ?field_name,
                data_type = ?raw_column.data_type,
                canonical = %resolved.canonical,
                is_nullable = resolved.nullable,
                is_primary_key = raw_column.is_primary_key,
                "Normalized column"
            );

            columns.push(ColumnDescriptor {
                raw_name: raw_column.name.clone(),
                field_name,
                raw_type: raw_column.data_type.clone(),
                canonical_type: resolved.canonical,
                is_nullable: resolved.nullable,
                size: resolved.size,
                is_primary_key: raw_column.is_primary_key,
                is_unique: raw_column.is_unique,
                foreign_key: None,
            });
        }

        Ok(TableDescriptor {
            raw_name: raw_table.name.clone(),
            type_name,
            columns,
        })
    }
}

/// Look the target up among the built tables.
///
/// A reference without an explicit column targets the table's primary key,
/// which only resolves when that key is a single column.
fn resolve_reference(tables: &[TableDescriptor], target: &RawForeignKey) -> ForeignKeyTarget {
    let dangling = || ForeignKeyTarget {
        table: target.table.clone(),
        column: target.column.clone(),
        resolution: Resolution::Dangling,
    };

    let Some(table) = tables.iter().find(|t| t.raw_name == target.table) else {
        return dangling();
    };

    let column = match &target.column {
        Some(name) => table.column(name),
        None => match table.primary_key_columns().as_slice() {
            [only] => Some(*only),
            _ => None,
        },
    };

    match column {
        Some(column) => ForeignKeyTarget {
            table: table.raw_name.clone(),
            column: Some(column.raw_name.clone()),
            resolution: Resolution::Resolved {
                type_name: table.type_name.clone(),
                field_name: column.field_name.clone(),
            },
        },
        None => dangling(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::RawColumn;

    fn pk(name: &str, data_type: &str) -> RawColumn {
        let mut column = RawColumn::new(name, data_type);
        column.is_primary_key = true;
        column
    }

    fn nullable(name: &str, data_type: &str) -> RawColumn {
        let mut column = RawColumn::new(name, data_type);
        column.is_nullable = true;
        column
    }

    fn references(name: &str, table: &str, column: Option<&str>) -> RawColumn {
        let mut raw = RawColumn::new(name, "integer");
        raw.foreign_key = Some(RawForeignKey {
            table: table.to_string(),
            column: column.map(str::to_string),
        });
        raw
    }

    fn catalog(tables: Vec<RawTable>) -> RawCatalog {
        RawCatalog {
            dialect: Dialect::Postgres,
            schema: "public".to_string(),
            tables,
        }
    }

    fn table(name: &str, columns: Vec<RawColumn>) -> RawTable {
        RawTable {
            name: name.to_string(),
            columns,
        }
    }

    fn build(catalog: &RawCatalog) -> Result<SchemaModel, InspectError> {
        let types = TypeMap::default();
        SchemaBuilder::new(&types).build(catalog)
    }

    #[test]
    fn test_builds_tables_in_catalog_order() {
        let model = build(&catalog(vec![
            table("users", vec![pk("id", "integer")]),
            table("accounts", vec![pk("id", "integer")]),
        ]))
        .unwrap();

        let names: Vec<_> = model.tables.iter().map(|t| t.type_name.as_str()).collect();
        assert_eq!(names, ["User", "Account"]);
        assert_eq!(model.dialect, Dialect::Postgres);
        assert_eq!(model.name, "public");
    }

    #[test]
    fn test_column_order_and_flags_carry_over() {
        let mut email = RawColumn::new("Email", "varchar(255)");
        email.is_unique = true;

        let model = build(&catalog(vec![table(
            "users",
            vec![pk("id", "serial"), email, nullable("born_on", "date")],
        )]))
        .unwrap();

        let columns = &model.tables[0].columns;
        let fields: Vec<_> = columns.iter().map(|c| c.field_name.as_str()).collect();
        assert_eq!(fields, ["id", "email", "born_on"]);

        assert!(columns[0].is_primary_key);
        assert_eq!(columns[0].canonical_type, CanonicalType::Integer);
        assert!(columns[1].is_unique);
        assert_eq!(columns[1].raw_name, "Email");
        assert_eq!(columns[1].size.length, Some(255));
        assert!(columns[2].is_nullable);
        assert_eq!(columns[2].canonical_type, CanonicalType::Date);
    }

    #[test]
    fn test_unknown_type_does_not_abort() {
        let model = build(&catalog(vec![
            table("docs", vec![pk("id", "integer"), RawColumn::new("body", "tsvector")]),
            table("tags", vec![pk("id", "integer")]),
        ]))
        .unwrap();

        assert_eq!(model.tables.len(), 2);
        assert_eq!(model.tables[0].columns[1].canonical_type, CanonicalType::Unknown);
    }

    #[test]
    fn test_field_collision_is_an_error() {
        let err = build(&catalog(vec![table(
            "people",
            vec![RawColumn::new("Name", "text"), RawColumn::new("name", "text")],
        )]))
        .unwrap_err();

        match err {
            InspectError::NameCollision {
                table,
                first,
                second,
                identifier,
            } => {
                assert_eq!(table, "people");
                assert_eq!(first, "Name");
                assert_eq!(second, "name");
                assert_eq!(identifier, "name");
            }
            other => panic!("expected NameCollision, got {other:?}"),
        }
    }

    #[test]
    fn test_type_name_collision_is_an_error() {
        let err = build(&catalog(vec![
            table("user", vec![pk("id", "integer")]),
            table("users", vec![pk("id", "integer")]),
        ]))
        .unwrap_err();

        assert!(matches!(
            err,
            InspectError::NameCollision { ref identifier, .. } if identifier == "User"
        ));
    }

    #[test]
    fn test_composite_primary_key_keeps_every_column() {
        let model = build(&catalog(vec![table(
            "order_items",
            vec![pk("order_id", "integer"), pk("product_id", "integer")],
        )]))
        .unwrap();

        assert_eq!(model.tables[0].primary_key_columns().len(), 2);
    }

    #[test]
    fn test_resolves_forward_reference() {
        let model = build(&catalog(vec![
            table("orders", vec![pk("id", "integer"), references("customer_id", "customers", Some("id"))]),
            table("customers", vec![pk("id", "integer")]),
        ]))
        .unwrap();

        let target = model.tables[0].columns[1].foreign_key.as_ref().unwrap();
        assert_eq!(
            target.resolution,
            Resolution::Resolved {
                type_name: "Customer".to_string(),
                field_name: "id".to_string(),
            }
        );
    }

    #[test]
    fn test_implicit_reference_targets_primary_key() {
        let model = build(&catalog(vec![
            table("teams", vec![pk("TeamID", "integer")]),
            table("players", vec![pk("id", "integer"), references("team", "teams", None)]),
        ]))
        .unwrap();

        let target = model.tables[1].columns[1].foreign_key.as_ref().unwrap();
        assert_eq!(target.column.as_deref(), Some("TeamID"));
        assert!(!target.is_dangling());
    }

    #[test]
    fn test_reference_outside_catalog_is_dangling() {
        let model = build(&catalog(vec![table(
            "orders",
            vec![pk("id", "integer"), references("account_id", "accounts", Some("id"))],
        )]))
        .unwrap();

        let target = model.tables[0].columns[1].foreign_key.as_ref().unwrap();
        assert!(target.is_dangling());
        assert_eq!(target.qualified_name(), "accounts.id");
    }

    #[test]
    fn test_reference_to_missing_column_is_dangling() {
        let model = build(&catalog(vec![table(
            "nodes",
            vec![pk("id", "integer"), references("parent", "nodes", Some("uuid"))],
        )]))
        .unwrap();

        assert!(model.tables[0].columns[1].foreign_key.as_ref().unwrap().is_dangling());
    }

    #[test]
    fn test_empty_table_builds() {
        let model = build(&catalog(vec![table("placeholders", vec![])])).unwrap();
        assert!(model.tables[0].columns.is_empty());
        assert_eq!(model.tables[0].type_name, "Placeholder");
    }
}
