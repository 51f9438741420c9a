//! Schema data structures
//!
//! These types represent the normalized schema and form the contract
//! between introspection (produces) and code generation (consumes). Code
//! generation never sees raw catalog rows.

use crate::dialect::Dialect;
use crate::typemap::{CanonicalType, SizeHint};

/// A complete normalized schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaModel {
    pub dialect: Dialect,
    /// Name of the inspected schema or catalog
    pub name: String,
    /// Tables in the order the adapter returned them
    pub tables: Vec<TableDescriptor>,
}

impl SchemaModel {
    pub fn table(&self, raw_name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| t.raw_name == raw_name)
    }
}

/// One normalized relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub raw_name: String,
    /// Singular, identifier-safe class name
    pub type_name: String,
    /// Catalog declaration order
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    /// Get primary key columns in declaration order
    pub fn primary_key_columns(&self) -> Vec<&ColumnDescriptor> {
        self.columns.iter().filter(|c| c.is_primary_key).collect()
    }

    pub fn has_composite_primary_key(&self) -> bool {
        self.primary_key_columns().len() > 1
    }

    pub fn column(&self, raw_name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.raw_name == raw_name)
    }
}

/// One normalized column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub raw_name: String,
    pub field_name: String,
    /// The dialect type string this column was resolved from
    pub raw_type: String,
    pub canonical_type: CanonicalType,
    pub is_nullable: bool,
    pub size: SizeHint,
    pub is_primary_key: bool,
    pub is_unique: bool,
    pub foreign_key: Option<ForeignKeyTarget>,
}

/// A declared reference to another table's column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyTarget {
    pub table: String,
    /// `None` only for a dangling reference whose target column was implicit
    pub column: Option<String>,
    pub resolution: Resolution,
}

impl ForeignKeyTarget {
    pub fn is_dangling(&self) -> bool {
        matches!(self.resolution, Resolution::Dangling)
    }

    /// `table.column` as declared in the catalog
    pub fn qualified_name(&self) -> String {
        match &self.column {
            Some(column) => format!("{}.{}", self.table, column),
            None => self.table.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Target table and column are part of the same model
    Resolved { type_name: String, field_name: String },
    /// Target lies outside the inspected catalog
    Dangling,
}
