//! Database introspection
//!
//! This module provides functionality for extracting raw catalog rows from
//! databases. Each supported dialect has its own feature-gated adapter; the
//! adapters only fetch and shape rows, normalization happens in
//! [`crate::builder`].

use tracing::{debug, info};

use crate::builder::SchemaBuilder;
use crate::config::ConnectionDescriptor;
use crate::dialect::Dialect;
use crate::error::InspectError;
use crate::schema::SchemaModel;
use crate::typemap::TypeMap;

/// Filters to apply during introspection
#[derive(Debug, Default, Clone)]
pub struct TableFilter {
    /// Only include these tables (if Some)
    pub include: Option<Vec<String>>,
    /// Exclude these tables
    pub exclude: Option<Vec<String>>,
}

impl TableFilter {
    /// Check if a table should be included
    pub fn should_include(&self, table_name: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.iter().any(|t| t == table_name) {
                return false;
            }
        }

        if let Some(exclude) = &self.exclude {
            if exclude.iter().any(|t| t == table_name) {
                return false;
            }
        }

        true
    }
}

/// Target of a declared foreign key, exactly as the catalog reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawForeignKey {
    pub table: String,
    /// `None` when the constraint implicitly targets the primary key
    pub column: Option<String>,
}

/// One column row as read from a dialect's catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawColumn {
    pub name: String,
    /// Dialect type string, untouched
    pub data_type: String,
    pub is_nullable: bool,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub is_primary_key: bool,
    pub is_unique: bool,
    pub foreign_key: Option<RawForeignKey>,
}

impl RawColumn {
    /// A non-null column with no constraints or size information
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: false,
            length: None,
            precision: None,
            scale: None,
            is_primary_key: false,
            is_unique: false,
            foreign_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub name: String,
    /// Declaration order
    pub columns: Vec<RawColumn>,
}

/// Everything one adapter returned for one schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCatalog {
    pub dialect: Dialect,
    pub schema: String,
    pub tables: Vec<RawTable>,
}

/// Trait for dialect-specific catalog adapters
pub trait Introspector {
    fn dialect(&self) -> Dialect;

    /// Names of the base tables in `schema_name`, in a stable order
    fn fetch_tables(&mut self, schema_name: &str) -> Result<Vec<String>, InspectError>;

    /// Column rows of one table in declaration order
    fn fetch_columns(
        &mut self,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Vec<RawColumn>, InspectError>;
}

/// Attach foreign-key targets to their source columns.
///
/// A column that takes part in several constraints keeps the first one.
pub(crate) fn attach_foreign_keys(
    columns: &mut [RawColumn],
    foreign_keys: impl IntoIterator<Item = (String, RawForeignKey)>,
) {
    for (column_name, target) in foreign_keys {
        if let Some(column) = columns.iter_mut().find(|c| c.name == column_name) {
            if column.foreign_key.is_none() {
                column.foreign_key = Some(target);
            }
        }
    }
}

/// Non-positive catalog sizes mean "not applicable" or "unbounded"
#[cfg_attr(not(any(feature = "mysql", feature = "mssql")), allow(dead_code))]
pub(crate) fn positive(value: i64) -> Option<u32> {
    u32::try_from(value).ok().filter(|v| *v > 0)
}

/// Open the adapter for the descriptor's dialect
pub fn connect(descriptor: &ConnectionDescriptor) -> Result<Box<dyn Introspector>, InspectError> {
    info!(
        connection = ?descriptor.redacted_connection_string(),
        "Connecting to database"
    );

    match descriptor.dialect {
        Dialect::Sqlite => connect_sqlite(descriptor),
        Dialect::Postgres => connect_postgres(descriptor),
        Dialect::MySql => connect_mysql(descriptor),
        Dialect::MsSql => connect_mssql(descriptor),
    }
}

/// Read the raw catalog of one schema.
///
/// Tables keep the adapter's order. Any failure aborts the whole read; a
/// catalog with a table silently missing is never returned.
pub fn fetch_catalog(
    introspector: &mut dyn Introspector,
    schema_name: &str,
    filter: &TableFilter,
) -> Result<RawCatalog, InspectError> {
    let dialect = introspector.dialect();
    info!(dialect = %dialect, schema = ?schema_name, "Fetching catalog");

    let all_table_names = introspector.fetch_tables(schema_name)?;
    debug!(count = ?all_table_names.len(), "Found all tables");

    let table_names: Vec<String> = all_table_names
        .into_iter()
        .filter(|name| filter.should_include(name))
        .collect();
    debug!(count = ?table_names.len(), "Tables after filtering");

    let mut tables = Vec::with_capacity(table_names.len());
    for table_name in table_names {
        let columns = introspector.fetch_columns(schema_name, &table_name)?;
        debug!(table = ?table_name, columns = ?columns.len(), "Fetched columns");
        tables.push(RawTable {
            name: table_name,
            columns,
        });
    }

    Ok(RawCatalog {
        dialect,
        schema: schema_name.to_string(),
        tables,
    })
}

/// Inspect every table of the descriptor's schema
pub fn inspect(descriptor: &ConnectionDescriptor) -> Result<SchemaModel, InspectError> {
    inspect_filtered(descriptor, &TableFilter::default())
}

/// Inspect the tables of the descriptor's schema that pass `filter`
pub fn inspect_filtered(
    descriptor: &ConnectionDescriptor,
    filter: &TableFilter,
) -> Result<SchemaModel, InspectError> {
    let mut introspector = connect(descriptor)?;
    let catalog = fetch_catalog(introspector.as_mut(), &descriptor.schema_name(), filter)?;

    let types = TypeMap::default();
    SchemaBuilder::new(&types).build(&catalog)
}

// Feature-gated database implementations
#[cfg(feature = "mssql")]
mod mssql;
#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "mssql")]
pub use mssql::MsSqlIntrospector;
#[cfg(feature = "mysql")]
pub use mysql::MySqlIntrospector;
#[cfg(feature = "postgres")]
pub use postgres::PostgresIntrospector;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteIntrospector;

#[cfg(feature = "sqlite")]
fn connect_sqlite(descriptor: &ConnectionDescriptor) -> Result<Box<dyn Introspector>, InspectError> {
    Ok(Box::new(SqliteIntrospector::connect(descriptor)?))
}

#[cfg(not(feature = "sqlite"))]
fn connect_sqlite(_descriptor: &ConnectionDescriptor) -> Result<Box<dyn Introspector>, InspectError> {
    Err(InspectError::UnsupportedDialect(
        "sqlite (rebuild with --features sqlite)".to_string(),
    ))
}

#[cfg(feature = "postgres")]
fn connect_postgres(descriptor: &ConnectionDescriptor) -> Result<Box<dyn Introspector>, InspectError> {
    Ok(Box::new(PostgresIntrospector::connect(descriptor)?))
}

#[cfg(not(feature = "postgres"))]
fn connect_postgres(_descriptor: &ConnectionDescriptor) -> Result<Box<dyn Introspector>, InspectError> {
    Err(InspectError::UnsupportedDialect(
        "postgres (rebuild with --features postgres)".to_string(),
    ))
}

#[cfg(feature = "mysql")]
fn connect_mysql(descriptor: &ConnectionDescriptor) -> Result<Box<dyn Introspector>, InspectError> {
    Ok(Box::new(MySqlIntrospector::connect(descriptor)?))
}

#[cfg(not(feature = "mysql"))]
fn connect_mysql(_descriptor: &ConnectionDescriptor) -> Result<Box<dyn Introspector>, InspectError> {
    Err(InspectError::UnsupportedDialect(
        "mysql (rebuild with --features mysql)".to_string(),
    ))
}

#[cfg(feature = "mssql")]
fn connect_mssql(descriptor: &ConnectionDescriptor) -> Result<Box<dyn Introspector>, InspectError> {
    Ok(Box::new(MsSqlIntrospector::connect(descriptor)?))
}

#[cfg(not(feature = "mssql"))]
fn connect_mssql(_descriptor: &ConnectionDescriptor) -> Result<Box<dyn Introspector>, InspectError> {
    Err(InspectError::UnsupportedDialect(
        "mssql (rebuild with --features mssql)".to_string(),
    ))
}
