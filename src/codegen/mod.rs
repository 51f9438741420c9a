//! Code generation
//!
//! This module turns a normalized [`SchemaModel`] into source files. The
//! generators only read the model; they never see raw catalog rows and
//! never touch the filesystem.

use tracing::{debug, info};

use crate::schema::{SchemaModel, TableDescriptor};

pub mod python;

pub use python::PythonGenerator;

/// One generated source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedUnit {
    /// Name of the type the unit defines
    pub type_name: String,
    /// Raw name of the table it was generated from, empty for package files
    pub table_name: String,
    /// File name relative to the output directory
    pub file_name: String,
    pub source: String,
}

/// Trait for language-specific code generators
pub trait CodeGenerator {
    /// Generate the unit for one table
    fn emit_table(&self, table: &TableDescriptor) -> EmittedUnit;

    /// Generate one unit per table, in model order
    fn emit(&self, model: &SchemaModel) -> Vec<EmittedUnit> {
        info!(
            dialect = %model.dialect,
            schema = ?model.name,
            tables = ?model.tables.len(),
            "Generating code"
        );

        let units: Vec<EmittedUnit> = model
            .tables
            .iter()
            .map(|table| self.emit_table(table))
            .collect();

        debug!(units = ?units.len(), "Code generation finished");
        units
    }

    /// Extra file tying the units together, if the target language has one
    fn package_index(&self, _units: &[EmittedUnit]) -> Option<EmittedUnit> {
        None
    }
}

/// Emit Python dataclasses for every table of the model
pub fn emit(model: &SchemaModel) -> Vec<EmittedUnit> {
    PythonGenerator::default().emit(model)
}
