//! # dbinspect
//!
//! Inspect database catalogs and generate typed data models
//!
//! This crate provides a CLI tool and library for reading the schema of a
//! SQLite, PostgreSQL, MySQL or SQL Server database, normalizing it into a
//! dialect-independent model, and emitting Python dataclasses from it.

pub mod builder;
pub mod codegen;
pub mod config;
pub mod dialect;
pub mod error;
pub mod introspect;
pub mod naming;
pub mod schema;
pub mod typemap;

pub mod prelude {
    pub use crate::builder::SchemaBuilder;
    pub use crate::codegen::{CodeGenerator, EmittedUnit, PythonGenerator};
    pub use crate::config::ConnectionDescriptor;
    pub use crate::dialect::Dialect;
    pub use crate::error::InspectError;
    pub use crate::introspect::{Introspector, TableFilter};
    pub use crate::schema::{
        ColumnDescriptor, ForeignKeyTarget, Resolution, SchemaModel, TableDescriptor,
    };
    pub use crate::typemap::{CanonicalType, TypeMap};
}

pub use codegen::emit;
pub use introspect::{inspect, inspect_filtered};

#[cfg(feature = "mssql")]
pub use introspect::MsSqlIntrospector;
#[cfg(feature = "mysql")]
pub use introspect::MySqlIntrospector;
#[cfg(feature = "postgres")]
pub use introspect::PostgresIntrospector;
#[cfg(feature = "sqlite")]
pub use introspect::SqliteIntrospector;
