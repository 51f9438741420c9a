use tiberius::{AuthMethod, Client, Config, Query, Row};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, error, trace};

use super::{attach_foreign_keys, positive, Introspector, RawColumn, RawForeignKey};
use crate::config::ConnectionDescriptor;
use crate::dialect::Dialect;
use crate::error::InspectError;

type MsSqlClient = Client<Compat<TcpStream>>;

/// Column listing for one table. A column is unique when a non-primary,
/// unfiltered unique index has it as its only key column; UNIQUE
/// constraints are backed by such an index.
const COLUMNS_SQL: &str = r#"
    SELECT
        c.COLUMN_NAME,
        c.DATA_TYPE,
        CAST(ISNULL(c.CHARACTER_MAXIMUM_LENGTH, 0) AS INT),
        CAST(ISNULL(c.NUMERIC_PRECISION, 0) AS INT),
        CAST(ISNULL(c.NUMERIC_SCALE, 0) AS INT),
        CASE WHEN c.IS_NULLABLE = 'YES' THEN 1 ELSE 0 END,
        CASE WHEN EXISTS (
            SELECT 1
            FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
            JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE k
                ON k.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
                AND k.TABLE_SCHEMA = tc.TABLE_SCHEMA
                AND k.TABLE_NAME = tc.TABLE_NAME
            WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
                AND tc.TABLE_SCHEMA = c.TABLE_SCHEMA
                AND tc.TABLE_NAME = c.TABLE_NAME
                AND k.COLUMN_NAME = c.COLUMN_NAME
        ) THEN 1 ELSE 0 END,
        CASE WHEN EXISTS (
            SELECT 1
            FROM sys.indexes i
            JOIN sys.index_columns ic
                ON ic.object_id = i.object_id
                AND ic.index_id = i.index_id
            JOIN sys.columns sc
                ON sc.object_id = ic.object_id
                AND sc.column_id = ic.column_id
            WHERE i.object_id = OBJECT_ID(QUOTENAME(c.TABLE_SCHEMA) + '.' + QUOTENAME(c.TABLE_NAME))
                AND i.is_unique = 1
                AND i.is_primary_key = 0
                AND i.has_filter = 0
                AND ic.is_included_column = 0
                AND sc.name = c.COLUMN_NAME
                AND (
                    SELECT COUNT(*)
                    FROM sys.index_columns ic2
                    WHERE ic2.object_id = i.object_id
                        AND ic2.index_id = i.index_id
                        AND ic2.is_included_column = 0
                ) = 1
        ) THEN 1 ELSE 0 END
    FROM INFORMATION_SCHEMA.COLUMNS c
    WHERE c.TABLE_SCHEMA = @P1 AND c.TABLE_NAME = @P2
    ORDER BY c.ORDINAL_POSITION
"#;

/// SQL Server introspector
pub struct MsSqlIntrospector {
    // Dropped before the runtime that drives it
    client: MsSqlClient,
    runtime: Runtime,
}

/// One row of the column query, sizes still in catalog form
#[derive(Debug, Clone, Default)]
struct ColumnRow {
    name: String,
    data_type: String,
    max_length: i32,
    precision: i32,
    scale: i32,
    is_nullable: bool,
    is_primary_key: bool,
    is_unique: bool,
}

impl From<ColumnRow> for RawColumn {
    fn from(row: ColumnRow) -> Self {
        let mut column = RawColumn::new(row.name, row.data_type);
        column.is_nullable = row.is_nullable;
        // -1 marks (max) types, 0 marks types without a length
        column.length = positive(row.max_length.into());
        column.precision = positive(row.precision.into());
        column.scale = u32::try_from(row.scale).ok();
        column.is_primary_key = row.is_primary_key;
        column.is_unique = row.is_unique;
        column
    }
}

impl MsSqlIntrospector {
    pub fn connect(descriptor: &ConnectionDescriptor) -> Result<Self, InspectError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| InspectError::connection(Dialect::MsSql, e.to_string()))?;

        let mut config = Config::new();
        config.host(&descriptor.host);
        config.port(descriptor.port);
        config.database(&descriptor.database);
        config.authentication(AuthMethod::sql_server(&descriptor.user, &descriptor.password));
        // Development servers ship self-signed certificates
        config.trust_cert();

        let connecting = async {
            let tcp = TcpStream::connect(config.get_addr()).await?;
            tcp.set_nodelay(true)?;
            Client::connect(config, tcp.compat_write()).await
        };

        let client = runtime
            .block_on(async { tokio::time::timeout(descriptor.connect_timeout, connecting).await })
            .map_err(|_| {
                error!(timeout = ?descriptor.connect_timeout, "Timed out connecting to SQL Server");
                InspectError::connection(Dialect::MsSql, "connection timed out")
            })?
            .map_err(|e: tiberius::error::Error| {
                error!(error = ?e, "Failed to connect to database");
                InspectError::connection(Dialect::MsSql, e.to_string())
            })?;

        debug!("Connected to SQL Server");
        Ok(Self { client, runtime })
    }

    fn query(&mut self, sql: &str, params: &[&str]) -> Result<Vec<Row>, tiberius::error::Error> {
        let mut query = Query::new(sql);
        for param in params {
            query.bind(param.to_string());
        }

        let client = &mut self.client;
        self.runtime
            .block_on(async move { query.query(client).await?.into_first_result().await })
    }

    fn foreign_keys(
        &mut self,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Vec<(String, RawForeignKey)>, tiberius::error::Error> {
        let sql = r#"
            SELECT
                pc.name,
                CASE WHEN rs.name = @P1 THEN rt.name ELSE rs.name + '.' + rt.name END,
                rc.name
            FROM sys.foreign_key_columns fkc
            JOIN sys.foreign_keys fk ON fk.object_id = fkc.constraint_object_id
            JOIN sys.tables pt ON pt.object_id = fkc.parent_object_id
            JOIN sys.schemas ps ON ps.schema_id = pt.schema_id
            JOIN sys.columns pc
                ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id
            JOIN sys.tables rt ON rt.object_id = fkc.referenced_object_id
            JOIN sys.schemas rs ON rs.schema_id = rt.schema_id
            JOIN sys.columns rc
                ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id
            WHERE ps.name = @P1 AND pt.name = @P2
            ORDER BY fk.name, fkc.constraint_column_id
        "#;

        let rows = self.query(sql, &[schema_name, table_name])?;

        rows.iter()
            .map(|row| -> Result<_, tiberius::error::Error> {
                Ok((
                    text(row, 0)?,
                    RawForeignKey {
                        table: text(row, 1)?,
                        column: Some(text(row, 2)?),
                    },
                ))
            })
            .collect()
    }
}

impl Introspector for MsSqlIntrospector {
    fn dialect(&self) -> Dialect {
        Dialect::MsSql
    }

    fn fetch_tables(&mut self, schema_name: &str) -> Result<Vec<String>, InspectError> {
        trace!(schema = ?schema_name, "Querying tables");

        let lookup_failed = |e: tiberius::error::Error| InspectError::connection(Dialect::MsSql, e.to_string());
        let rows = self
            .query("SELECT COUNT(*) FROM sys.schemas WHERE name = @P1", &[schema_name])
            .map_err(lookup_failed)?;
        let found = match rows.first() {
            Some(row) => int(row, 0).map_err(lookup_failed)?,
            None => 0,
        };

        if found == 0 {
            return Err(InspectError::SchemaNotFound {
                dialect: Dialect::MsSql,
                schema: schema_name.to_string(),
            });
        }

        let sql = r#"
            SELECT TABLE_NAME
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = @P1 AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;

        let failed = |e: tiberius::error::Error| {
            error!(schema = ?schema_name, error = ?e, "Failed to query tables");
            InspectError::connection(Dialect::MsSql, format!("Failed to query tables: {}", e))
        };

        let rows = self.query(sql, &[schema_name]).map_err(failed)?;
        let tables = rows
            .iter()
            .map(|row| text(row, 0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(failed)?;

        trace!(tables = ?tables, "Tables found");
        Ok(tables)
    }

    fn fetch_columns(
        &mut self,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Vec<RawColumn>, InspectError> {
        trace!(schema = ?schema_name, table = ?table_name, "Querying columns");

        let partial = |e: tiberius::error::Error| {
            error!(
                schema = ?schema_name,
                table = ?table_name,
                error = ?e,
                "Failed to query columns"
            );
            InspectError::partial_catalog(Dialect::MsSql, table_name, e.to_string())
        };


        let rows = self.query(COLUMNS_SQL, &[schema_name, table_name]).map_err(partial)?;

        // SQL Server tables always have at least one column
        if rows.is_empty() {
            return Err(InspectError::partial_catalog(
                Dialect::MsSql,
                table_name,
                "table no longer exists",
            ));
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let parsed = ColumnRow {
                name: text(row, 0).map_err(partial)?,
                data_type: text(row, 1).map_err(partial)?,
                max_length: int(row, 2).map_err(partial)?,
                precision: int(row, 3).map_err(partial)?,
                scale: int(row, 4).map_err(partial)?,
                is_nullable: int(row, 5).map_err(partial)? == 1,
                is_primary_key: int(row, 6).map_err(partial)? == 1,
                is_unique: int(row, 7).map_err(partial)? == 1,
            };
            trace!(row = ?parsed, "Parsed column");
            columns.push(RawColumn::from(parsed));
        }

        let foreign_keys = self.foreign_keys(schema_name, table_name).map_err(partial)?;
        trace!(table = ?table_name, count = ?foreign_keys.len(), "Found foreign keys");
        attach_foreign_keys(&mut columns, foreign_keys);

        Ok(columns)
    }
}

fn text(row: &Row, index: usize) -> Result<String, tiberius::error::Error> {
    Ok(row
        .try_get::<&str, _>(index)?
        .unwrap_or_default()
        .to_string())
}

fn int(row: &Row, index: usize) -> Result<i32, tiberius::error::Error> {
    Ok(row.try_get::<i32, _>(index)?.unwrap_or(0))
}
