use thiserror::Error;

use crate::dialect::Dialect;

/// dbinspect errors
///
/// Every variant is fatal to the current run. The only locally recovered
/// condition, an unrecognised column type, never becomes an error.
#[derive(Error, Debug)]
pub enum InspectError {
    #[error("Failed to connect to {dialect} database: {message}")]
    Connection { dialect: Dialect, message: String },

    #[error("Schema '{schema}' does not exist in the {dialect} catalog")]
    SchemaNotFound { dialect: Dialect, schema: String },

    #[error("Failed to read columns of {dialect} table '{table}': {message}")]
    PartialCatalog {
        dialect: Dialect,
        table: String,
        message: String,
    },

    #[error("Names '{first}' and '{second}' in '{table}' both normalize to '{identifier}'")]
    NameCollision {
        table: String,
        first: String,
        second: String,
        identifier: String,
    },

    #[error("Unsupported database dialect: {0}")]
    UnsupportedDialect(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

impl InspectError {
    pub fn connection(dialect: Dialect, message: impl Into<String>) -> Self {
        InspectError::Connection {
            dialect,
            message: message.into(),
        }
    }

    pub fn partial_catalog(
        dialect: Dialect,
        table: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        InspectError::PartialCatalog {
            dialect,
            table: table.into(),
            message: message.into(),
        }
    }
}
