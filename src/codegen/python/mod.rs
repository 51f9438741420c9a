//! Python code generator
//!
//! Generates one `@dataclass` per table. Declarations are built as a
//! [`ast::Module`] and serialized by [`printer`], never assembled from
//! string fragments.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::codegen::{CodeGenerator, EmittedUnit};
use crate::schema::{ColumnDescriptor, Resolution, TableDescriptor};
use crate::typemap::CanonicalType;

pub mod ast;
pub mod printer;

use ast::{Alias, ClassDef, Expr, ImportSet, Module, Stmt};

/// Name `dataclasses.field` is bound to when a column is itself called `field`
const FIELD_ALIAS: &str = "dataclass_field";

/// A Python type annotation and where it is imported from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonType {
    pub name: String,
    /// `None` for builtins
    pub module: Option<String>,
}

impl PythonType {
    pub fn builtin(name: &str) -> Self {
        Self {
            name: name.to_string(),
            module: None,
        }
    }

    pub fn imported(module: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            module: Some(module.to_string()),
        }
    }
}

/// Canonical tag to Python type translation
#[derive(Debug, Clone)]
pub struct PythonTypeMap {
    types: BTreeMap<CanonicalType, PythonType>,
}

impl Default for PythonTypeMap {
    fn default() -> Self {
        let types = [
            (CanonicalType::Integer, PythonType::builtin("int")),
            (CanonicalType::Decimal, PythonType::builtin("float")),
            (CanonicalType::Boolean, PythonType::builtin("bool")),
            (CanonicalType::Text, PythonType::builtin("str")),
            (CanonicalType::Date, PythonType::imported("datetime", "date")),
            (CanonicalType::DateTime, PythonType::imported("datetime", "datetime")),
            (CanonicalType::Binary, PythonType::builtin("bytes")),
            (CanonicalType::Unknown, PythonType::imported("typing", "Any")),
        ]
        .into_iter()
        .collect();

        Self { types }
    }
}

impl PythonTypeMap {
    pub fn with_type(mut self, tag: CanonicalType, python_type: PythonType) -> Self {
        self.types.insert(tag, python_type);
        self
    }

    pub fn get(&self, tag: CanonicalType) -> PythonType {
        self.types
            .get(&tag)
            .or_else(|| self.types.get(&CanonicalType::Unknown))
            .cloned()
            .unwrap_or_else(|| PythonType::imported("typing", "Any"))
    }
}

/// Python code generator
#[derive(Debug, Clone, Default)]
pub struct PythonGenerator {
    types: PythonTypeMap,
}

impl PythonGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type_map(types: PythonTypeMap) -> Self {
        Self { types }
    }

    /// Build the syntax tree of one table's module
    pub fn table_module(&self, table: &TableDescriptor) -> Module {
        let mut imports = ImportSet::default();
        imports.add("__future__", Alias::new("annotations"));
        imports.add("dataclasses", Alias::new("dataclass"));

        let field_func = if table.columns.iter().any(|c| c.field_name == "field") {
            FIELD_ALIAS
        } else {
            "field"
        };

        let mut body = vec![Stmt::Docstring(class_docstring(table))];

        for column in &table.columns {
            let python_type = self.types.get(column.canonical_type);
            if let Some(module) = &python_type.module {
                imports.add(module, Alias::new(python_type.name.as_str()));
            }

            let annotation = if column.is_nullable {
                Expr::optional(Expr::name(python_type.name.as_str()))
            } else {
                Expr::name(python_type.name.as_str())
            };

            let metadata = field_metadata(column);
            let value = if metadata.is_empty() {
                None
            } else {
                let alias = if field_func == "field" {
                    Alias::new("field")
                } else {
                    Alias::with_asname("field", FIELD_ALIAS)
                };
                imports.add("dataclasses", alias);
                Some(Expr::call(
                    field_func,
                    vec![("metadata".to_string(), Expr::Dict(metadata))],
                ))
            };

            trace!(
                field = ?column.field_name,
                annotation = ?python_type.name,
                "Emitting field"
            );

            body.push(Stmt::AnnAssign {
                target: column.field_name.clone(),
                annotation,
                value,
            });
        }

        let class = ClassDef {
            name: table.type_name.clone(),
            decorators: vec![Expr::name("dataclass")],
            body,
        };

        let mut stmts = imports.into_stmts();
        stmts.push(Stmt::ClassDef(class));

        Module {
            docstring: Some(format!(
                "Data model for the `{}` table.\n\nGenerated by dbinspect, do not edit.",
                table.raw_name
            )),
            body: stmts,
        }
    }
}

impl CodeGenerator for PythonGenerator {
    fn emit_table(&self, table: &TableDescriptor) -> EmittedUnit {
        debug!(table = ?table.raw_name, type_name = ?table.type_name, "Generating dataclass");

        let source = printer::print_module(&self.table_module(table));

        EmittedUnit {
            type_name: table.type_name.clone(),
            table_name: table.raw_name.clone(),
            file_name: format!("{}.py", table.type_name),
            source,
        }
    }

    /// `__init__.py` importing every generated class
    fn package_index(&self, units: &[EmittedUnit]) -> Option<EmittedUnit> {
        let mut imports = ImportSet::default();
        for unit in units {
            imports.add(&format!(".{}", unit.type_name), Alias::new(unit.type_name.as_str()));
        }

        let mut body = imports.into_stmts();
        body.push(Stmt::Assign {
            target: "__all__".to_string(),
            value: Expr::List(units.iter().map(|u| Expr::str(u.type_name.as_str())).collect()),
        });

        let module = Module {
            docstring: Some("Generated data models.".to_string()),
            body,
        };

        Some(EmittedUnit {
            type_name: "__init__".to_string(),
            table_name: String::new(),
            file_name: "__init__.py".to_string(),
            source: printer::print_module(&module),
        })
    }
}

fn class_docstring(table: &TableDescriptor) -> String {
    let primary_key: Vec<&str> = table
        .primary_key_columns()
        .into_iter()
        .map(|c| c.raw_name.as_str())
        .collect();

    let key_line = match primary_key.as_slice() {
        [] => "No primary key.".to_string(),
        [single] => format!("Primary key: {}.", single),
        composite => format!("Composite primary key: {}.", composite.join(", ")),
    };

    format!("Row of the `{}` table.\n\n{}", table.raw_name, key_line)
}

/// Structural facts about a column, in a fixed key order
fn field_metadata(column: &ColumnDescriptor) -> Vec<(Expr, Expr)> {
    let mut entries = Vec::new();
    let mut push = |key: &str, value: Expr| entries.push((Expr::str(key), value));

    if column.field_name != column.raw_name {
        push("column", Expr::str(column.raw_name.as_str()));
    }
    if column.is_primary_key {
        push("primary_key", Expr::Bool(true));
    }
    if column.is_unique {
        push("unique", Expr::Bool(true));
    }
    if let Some(length) = column.size.length {
        push("max_length", Expr::Int(i64::from(length)));
    }
    if let Some(precision) = column.size.precision {
        push("precision", Expr::Int(i64::from(precision)));
    }
    if let Some(scale) = column.size.scale {
        push("scale", Expr::Int(i64::from(scale)));
    }
    if column.canonical_type == CanonicalType::Unknown {
        push("db_type", Expr::str(column.raw_type.as_str()));
    }
    if let Some(target) = &column.foreign_key {
        push("foreign_key", Expr::str(target.qualified_name()));
        match &target.resolution {
            Resolution::Resolved { type_name, .. } => {
                push("references", Expr::str(type_name.as_str()));
            }
            Resolution::Dangling => push("dangling", Expr::Bool(true)),
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ForeignKeyTarget;
    use crate::typemap::SizeHint;

    fn column(raw_name: &str, field_name: &str, canonical_type: CanonicalType) -> ColumnDescriptor {
        ColumnDescriptor {
            raw_name: raw_name.to_string(),
            field_name: field_name.to_string(),
            raw_type: canonical_type.as_str().to_string(),
            canonical_type,
            is_nullable: false,
            size: SizeHint::default(),
            is_primary_key: false,
            is_unique: false,
            foreign_key: None,
        }
    }

    fn table(raw_name: &str, type_name: &str, columns: Vec<ColumnDescriptor>) -> TableDescriptor {
        TableDescriptor {
            raw_name: raw_name.to_string(),
            type_name: type_name.to_string(),
            columns,
        }
    }

    #[test]
    fn test_emit_simple_table() {
        let mut id = column("id", "id", CanonicalType::Integer);
        id.is_primary_key = true;
        let mut born = column("date_of_birth", "date_of_birth", CanonicalType::Date);
        born.is_nullable = true;

        let unit = PythonGenerator::new().emit_table(&table(
            "users",
            "User",
            vec![id, column("name", "name", CanonicalType::Text), born],
        ));

        let expected = r#""""Data model for the `users` table.

Generated by dbinspect, do not edit.
"""

from __future__ import annotations

from dataclasses import dataclass, field
from datetime import date


@dataclass
class User:
    """Row of the `users` table.

    Primary key: id.
    """

    id: int = field(metadata={"primary_key": True})
    name: str
    date_of_birth: date | None
"#;
        assert_eq!(unit.source, expected);
        assert_eq!(unit.type_name, "User");
        assert_eq!(unit.table_name, "users");
        assert_eq!(unit.file_name, "User.py");
    }

    #[test]
    fn test_empty_table_is_valid() {
        let unit = PythonGenerator::new().emit_table(&table("placeholders", "Placeholder", vec![]));

        assert!(unit.source.contains("class Placeholder:\n    \"\"\"Row of the `placeholders` table.\n\n    No primary key.\n    \"\"\"\n"));
        assert!(!unit.source.contains("import dataclass, field"));
    }

    #[test]
    fn test_metadata_facts() {
        let mut email = column("Email", "email", CanonicalType::Text);
        email.is_unique = true;
        email.size.length = Some(255);

        let mut price = column("price", "price", CanonicalType::Decimal);
        price.size.precision = Some(10);
        price.size.scale = Some(2);

        let mut shape = column("shape", "shape", CanonicalType::Unknown);
        shape.raw_type = "geometry".to_string();
        shape.is_nullable = true;

        let source = PythonGenerator::new()
            .emit_table(&table("items", "Item", vec![email, price, shape]))
            .source;

        assert!(source.contains(
            r#"    email: str = field(metadata={"column": "Email", "unique": True, "max_length": 255})"#
        ));
        assert!(source.contains(r#"    price: float = field(metadata={"precision": 10, "scale": 2})"#));
        assert!(source.contains(r#"    shape: Any | None = field(metadata={"db_type": "geometry"})"#));
        assert!(source.contains("from typing import Any\n"));
    }

    #[test]
    fn test_foreign_keys() {
        let mut customer = column("customer_id", "customer_id", CanonicalType::Integer);
        customer.foreign_key = Some(ForeignKeyTarget {
            table: "customers".to_string(),
            column: Some("id".to_string()),
            resolution: Resolution::Resolved {
                type_name: "Customer".to_string(),
                field_name: "id".to_string(),
            },
        });
        let mut account = column("account_id", "account_id", CanonicalType::Integer);
        account.foreign_key = Some(ForeignKeyTarget {
            table: "accounts".to_string(),
            column: Some("id".to_string()),
            resolution: Resolution::Dangling,
        });

        let source = PythonGenerator::new()
            .emit_table(&table("orders", "Order", vec![customer, account]))
            .source;

        assert!(source.contains(
            r#"metadata={"foreign_key": "customers.id", "references": "Customer"}"#
        ));
        assert!(source.contains(r#"metadata={"foreign_key": "accounts.id", "dangling": True}"#));
        assert!(source.lines().all(|line| line.len() <= printer::MAX_WIDTH));
    }

    #[test]
    fn test_composite_primary_key_docstring() {
        let mut order = column("order_id", "order_id", CanonicalType::Integer);
        order.is_primary_key = true;
        let mut product = column("product_id", "product_id", CanonicalType::Integer);
        product.is_primary_key = true;

        let source = PythonGenerator::new()
            .emit_table(&table("order_items", "OrderItem", vec![order, product]))
            .source;

        assert!(source.contains("    Composite primary key: order_id, product_id.\n"));
        assert_eq!(source.matches("\"primary_key\": True").count(), 2);
    }

    #[test]
    fn test_column_named_field_gets_aliased_import() {
        let mut field_column = column("field", "field", CanonicalType::Text);
        field_column.is_unique = true;

        let source = PythonGenerator::new()
            .emit_table(&table("forms", "Form", vec![field_column]))
            .source;

        assert!(source.contains("from dataclasses import dataclass, field as dataclass_field\n"));
        assert!(source.contains(r#"    field: str = dataclass_field(metadata={"unique": True})"#));
    }

    #[test]
    fn test_injected_type_map() {
        let types = PythonTypeMap::default()
            .with_type(CanonicalType::Decimal, PythonType::imported("decimal", "Decimal"));
        let source = PythonGenerator::with_type_map(types)
            .emit_table(&table("prices", "Price", vec![column("amount", "amount", CanonicalType::Decimal)]))
            .source;

        assert!(source.contains("from decimal import Decimal\n"));
        assert!(source.contains("    amount: Decimal\n"));
    }

    #[test]
    fn test_package_index() {
        let generator = PythonGenerator::new();
        let units = vec![
            generator.emit_table(&table("test_table", "TestTable", vec![])),
            generator.emit_table(&table("test_table_2", "TestTable2", vec![])),
        ];

        let index = generator.package_index(&units).unwrap();

        assert_eq!(index.file_name, "__init__.py");
        assert_eq!(
            index.source,
            "\"\"\"Generated data models.\"\"\"\n\
             \n\
             from .TestTable import TestTable\n\
             from .TestTable2 import TestTable2\n\
             \n\
             __all__ = [\"TestTable\", \"TestTable2\"]\n"
        );
    }

    #[test]
    fn test_emission_is_deterministic() {
        let generator = PythonGenerator::new();
        let users = table(
            "users",
            "User",
            vec![
                column("id", "id", CanonicalType::Integer),
                column("created", "created", CanonicalType::DateTime),
                column("born", "born", CanonicalType::Date),
            ],
        );

        assert_eq!(generator.emit_table(&users), generator.emit_table(&users));
    }
}
