use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder};
use tokio::runtime::Runtime;
use tracing::{debug, error, trace, warn};

use super::{attach_foreign_keys, positive, Introspector, RawColumn, RawForeignKey};
use crate::config::ConnectionDescriptor;
use crate::dialect::Dialect;
use crate::error::InspectError;

/// One row of `information_schema.COLUMNS`
type ColumnRow = (
    String,
    String,
    String,
    Option<u64>,
    Option<u64>,
    Option<u64>,
    String,
);

/// MySQL / MariaDB introspector
///
/// In MySQL a schema is a database, so the inspected schema is the
/// database name unless one is given explicitly.
pub struct MySqlIntrospector {
    // Closed in Drop, before the runtime it was opened on
    conn: Option<Conn>,
    runtime: Runtime,
}

impl MySqlIntrospector {
    pub fn connect(descriptor: &ConnectionDescriptor) -> Result<Self, InspectError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| InspectError::connection(Dialect::MySql, e.to_string()))?;

        let opts = OptsBuilder::default()
            .ip_or_hostname(descriptor.host.clone())
            .tcp_port(descriptor.port)
            .user(Some(descriptor.user.clone()))
            .pass(Some(descriptor.password.clone()));

        let conn = runtime
            .block_on(async {
                tokio::time::timeout(descriptor.connect_timeout, Conn::new(opts)).await
            })
            .map_err(|_| {
                error!(timeout = ?descriptor.connect_timeout, "Timed out connecting to MySQL");
                InspectError::connection(Dialect::MySql, "connection timed out")
            })?
            .map_err(|e| {
                error!(error = ?e, "Failed to connect to database");
                InspectError::connection(Dialect::MySql, e.to_string())
            })?;

        debug!("Connected to MySQL");
        Ok(Self {
            conn: Some(conn),
            runtime,
        })
    }

    fn exec<T, P>(&mut self, sql: &str, params: P) -> Result<Vec<T>, mysql_async::Error>
    where
        T: FromRow + Send + 'static,
        P: Into<mysql_async::Params> + Send,
    {
        let Some(conn) = self.conn.as_mut() else {
            return Err(mysql_async::Error::Driver(
                mysql_async::DriverError::ConnectionClosed,
            ));
        };
        self.runtime.block_on(conn.exec(sql, params))
    }
}

impl Drop for MySqlIntrospector {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = self.runtime.block_on(conn.disconnect()) {
                warn!(error = ?e, "Failed to close MySQL connection cleanly");
            }
        }
    }
}

impl Introspector for MySqlIntrospector {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn fetch_tables(&mut self, schema_name: &str) -> Result<Vec<String>, InspectError> {
        trace!(schema = ?schema_name, "Querying tables");

        let found: Vec<String> = self
            .exec(
                "SELECT CAST(SCHEMA_NAME AS CHAR) FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = ?",
                (schema_name.to_string(),),
            )
            .map_err(|e| InspectError::connection(Dialect::MySql, e.to_string()))?;

        if found.is_empty() {
            return Err(InspectError::SchemaNotFound {
                dialect: Dialect::MySql,
                schema: schema_name.to_string(),
            });
        }

        let sql = r#"
            SELECT CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let tables: Vec<String> = self.exec(sql, (schema_name.to_string(),)).map_err(|e| {
            error!(schema = ?schema_name, error = ?e, "Failed to query tables");
            InspectError::connection(Dialect::MySql, format!("Failed to query tables: {}", e))
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

        let partial = |e: mysql_async::Error| {
            error!(
                schema = ?schema_name,
                table = ?table_name,
                error = ?e,
                "Failed to query columns"
            );
            InspectError::partial_catalog(Dialect::MySql, table_name, e.to_string())
        };

        let sql = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR),
                CAST(COLUMN_TYPE AS CHAR),
                CAST(IS_NULLABLE AS CHAR),
                CHARACTER_MAXIMUM_LENGTH,
                NUMERIC_PRECISION,
                NUMERIC_SCALE,
                CAST(COLUMN_KEY AS CHAR)
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let params = (schema_name.to_string(), table_name.to_string());
        let rows: Vec<ColumnRow> = self.exec(sql, params.clone()).map_err(partial)?;

        // Every MySQL table has at least one column
        if rows.is_empty() {
            return Err(InspectError::partial_catalog(
                Dialect::MySql,
                table_name,
                "table no longer exists",
            ));
        }

        let mut columns: Vec<RawColumn> = rows.into_iter().map(column_from_row).collect();

        let sql = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR),
                CAST(REFERENCED_TABLE_NAME AS CHAR),
                CAST(REFERENCED_COLUMN_NAME AS CHAR),
                CAST(REFERENCED_TABLE_SCHEMA AS CHAR)
            FROM information_schema.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
                AND REFERENCED_TABLE_NAME IS NOT NULL
            ORDER BY CONSTRAINT_NAME, ORDINAL_POSITION
        "#;

        let references: Vec<(String, String, String, String)> =
            self.exec(sql, params).map_err(partial)?;
        trace!(table = ?table_name, count = ?references.len(), "Found foreign keys");

        attach_foreign_keys(
            &mut columns,
            references
                .into_iter()
                .map(|(column, table, target_column, target_schema)| {
                    let table = if target_schema == schema_name {
                        table
                    } else {
                        format!("{}.{}", target_schema, table)
                    };
                    (
                        column,
                        RawForeignKey {
                            table,
                            column: Some(target_column),
                        },
                    )
                }),
        );

        Ok(columns)
    }
}

fn column_from_row(row: ColumnRow) -> RawColumn {
    let (name, column_type, is_nullable, length, precision, scale, key) = row;

    let mut column = RawColumn::new(name, column_type);
    column.is_nullable = is_nullable.eq_ignore_ascii_case("YES");
    column.length = length.and_then(clamp);
    column.precision = precision.and_then(clamp);
    column.scale = scale.and_then(|s| u32::try_from(s).ok());
    column.is_primary_key = key == "PRI";
    column.is_unique = key == "UNI";

    trace!(
        column = ?column.name,
        data_type = ?column.data_type,
        is_nullable = ?column.is_nullable,
        column_key = ?key,
        "Parsed column"
    );
    column
}

/// Catalog sizes are BIGINT UNSIGNED; zero means no size
fn clamp(value: u64) -> Option<u32> {
    i64::try_from(value).ok().and_then(positive)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, column_type: &str, nullable: &str, key: &str) -> ColumnRow {
        (
            name.to_string(),
            column_type.to_string(),
            nullable.to_string(),
            None,
            None,
            None,
            key.to_string(),
        )
    }

    #[test]
    fn test_column_from_row_keys() {
        let id = column_from_row(row("id", "int(11) unsigned", "NO", "PRI"));
        assert!(id.is_primary_key);
        assert!(!id.is_unique);
        assert!(!id.is_nullable);
        assert_eq!(id.data_type, "int(11) unsigned");

        let email = column_from_row(row("email", "varchar(255)", "NO", "UNI"));
        assert!(email.is_unique);

        let note = column_from_row(row("note", "text", "YES", "MUL"));
        assert!(note.is_nullable);
        assert!(!note.is_unique);
        assert!(!note.is_primary_key);
    }

    #[test]
    fn test_column_from_row_sizes() {
        let mut price = row("price", "decimal(10,2)", "YES", "");
        price.4 = Some(10);
        price.5 = Some(2);
        let price = column_from_row(price);
        assert_eq!(price.precision, Some(10));
        assert_eq!(price.scale, Some(2));

        let mut body = row("body", "longtext", "YES", "");
        body.3 = Some(4_294_967_295);
        assert_eq!(column_from_row(body).length, Some(u32::MAX));

        let mut flag = row("flag", "tinyint(1)", "NO", "");
        flag.5 = Some(0);
        assert_eq!(column_from_row(flag).scale, Some(0));
    }
}
