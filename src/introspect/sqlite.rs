use std::path::Path;

use rusqlite::{params, Connection, OpenFlags};
use tracing::{debug, error, trace};

use super::{attach_foreign_keys, Introspector, RawColumn, RawForeignKey};
use crate::config::ConnectionDescriptor;
use crate::dialect::Dialect;
use crate::error::InspectError;

/// SQLite introspector
///
/// Reads `sqlite_master` and the `pragma_*` table-valued functions. The
/// database file is opened read-only and never created.
pub struct SqliteIntrospector {
    conn: Connection,
}

impl SqliteIntrospector {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connect(descriptor: &ConnectionDescriptor) -> Result<Self, InspectError> {
        let path = Path::new(&descriptor.database);
        debug!(path = ?path, "Opening SQLite database");

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(path, flags).map_err(|e| {
            error!(path = ?path, error = ?e, "Failed to open SQLite database");
            InspectError::connection(
                Dialect::Sqlite,
                format!("cannot open '{}': {}", path.display(), e),
            )
        })?;

        conn.busy_timeout(descriptor.connect_timeout)
            .map_err(|e| InspectError::connection(Dialect::Sqlite, e.to_string()))?;

        Ok(Self::new(conn))
    }

    fn ensure_schema(&self, schema_name: &str) -> Result<(), InspectError> {
        let exists: bool = self
            .conn
            .query_row(
                "SELECT EXISTS (SELECT 1 FROM pragma_database_list WHERE name = ?1)",
                params![schema_name],
                |row| row.get(0),
            )
            .map_err(|e| InspectError::connection(Dialect::Sqlite, e.to_string()))?;

        if exists {
            Ok(())
        } else {
            Err(InspectError::SchemaNotFound {
                dialect: Dialect::Sqlite,
                schema: schema_name.to_string(),
            })
        }
    }

    fn table_exists(&self, schema_name: &str, table_name: &str) -> Result<bool, rusqlite::Error> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}.sqlite_master WHERE type = 'table' AND name = ?1",
            quote_identifier(schema_name)
        );
        let count: i64 = self.conn.query_row(&sql, params![table_name], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// Columns covered on their own by a UNIQUE constraint or a full unique index
    fn unique_columns(
        &self,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Vec<String>, rusqlite::Error> {
        let mut index_stmt = self.conn.prepare(
            r#"SELECT name FROM pragma_index_list(?1, ?2)
               WHERE "unique" = 1 AND origin != 'pk' AND partial = 0"#,
        )?;
        let indexes = index_stmt
            .query_map(params![table_name, schema_name], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut info_stmt = self.conn.prepare("SELECT name FROM pragma_index_info(?1, ?2)")?;
        let mut unique = Vec::new();
        for index in indexes {
            let columns = info_stmt
                .query_map(params![index, schema_name], |row| row.get::<_, Option<String>>(0))?
                .collect::<Result<Vec<_>, _>>()?;

            // Expression indexes report a NULL column name
            if let [Some(column)] = columns.as_slice() {
                trace!(index = ?index, column = ?column, "Single-column unique index");
                unique.push(column.clone());
            }
        }

        Ok(unique)
    }

    fn foreign_keys(
        &self,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Vec<(String, RawForeignKey)>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            r#"SELECT "from", "table", "to" FROM pragma_foreign_key_list(?1, ?2) ORDER BY id, seq"#,
        )?;

        let rows = stmt.query_map(params![table_name, schema_name], |row| {
            Ok((
                row.get::<_, String>(0)?,
                RawForeignKey {
                    table: row.get(1)?,
                    column: row.get(2)?,
                },
            ))
        })?;

        rows.collect()
    }
}

impl Introspector for SqliteIntrospector {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn fetch_tables(&mut self, schema_name: &str) -> Result<Vec<String>, InspectError> {
        trace!(schema = ?schema_name, "Querying tables");
        self.ensure_schema(schema_name)?;

        let sql = format!(
            "SELECT name FROM {}.sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
             ORDER BY name",
            quote_identifier(schema_name)
        );

        let query = || -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect()
        };

        let tables = query().map_err(|e| {
            error!(schema = ?schema_name, error = ?e, "Failed to query tables");
            InspectError::connection(Dialect::Sqlite, format!("failed to list tables: {}", e))
        })?;

        trace!(tables = ?tables, "Tables found");
        Ok(tables)
    }

    fn fetch_columns(
        &mut self,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Vec<RawColumn>, InspectError> {
        trace!(schema = ?schema_name, table = ?table_name, "Querying columns");

        let partial = |e: rusqlite::Error| {
            error!(table = ?table_name, error = ?e, "Failed to read table metadata");
            InspectError::partial_catalog(Dialect::Sqlite, table_name, e.to_string())
        };

        if !self.table_exists(schema_name, table_name).map_err(partial)? {
            return Err(InspectError::partial_catalog(
                Dialect::Sqlite,
                table_name,
                "table no longer exists",
            ));
        }

        let mut columns = {
            let mut stmt = self
                .conn
                .prepare(r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?1, ?2) ORDER BY cid"#)
                .map_err(partial)?;

            let rows = stmt
                .query_map(params![table_name, schema_name], |row| {
                    let name: String = row.get(0)?;
                    let data_type: String = row.get(1)?;
                    let not_null: i64 = row.get(2)?;
                    let pk_position: i64 = row.get(3)?;

                    let mut column = RawColumn::new(name, data_type);
                    column.is_primary_key = pk_position > 0;
                    // An INTEGER PRIMARY KEY reports notnull = 0 but is never NULL
                    column.is_nullable = not_null == 0 && pk_position == 0;
                    Ok(column)
                })
                .map_err(partial)?;

            rows.collect::<Result<Vec<_>, _>>().map_err(partial)?
        };

        for column_name in self.unique_columns(schema_name, table_name).map_err(partial)? {
            if let Some(column) = columns.iter_mut().find(|c| c.name == column_name) {
                column.is_unique = true;
            }
        }

        attach_foreign_keys(
            &mut columns,
            self.foreign_keys(schema_name, table_name).map_err(partial)?,
        );

        for column in &columns {
            trace!(
                column = ?column.name,
                data_type = ?column.data_type,
                is_nullable = ?column.is_nullable,
                is_primary_key = ?column.is_primary_key,
                is_unique = ?column.is_unique,
                foreign_key = ?column.foreign_key,
                "Parsed column"
            );
        }

        Ok(columns)
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
