use postgres::{Client, NoTls};
use tracing::{debug, error, trace};

use super::{attach_foreign_keys, Introspector, RawColumn, RawForeignKey};
use crate::config::ConnectionDescriptor;
use crate::dialect::Dialect;
use crate::error::InspectError;

/// Column listing for one table. A column is unique when a non-primary,
/// non-partial unique index covers it alone; UNIQUE constraints are backed
/// by such an index, so `pg_index` sees both.
const COLUMNS_SQL: &str = r#"
    SELECT
        a.attname AS column_name,
        format_type(a.atttypid, a.atttypmod) AS data_type,
        NOT a.attnotnull AS is_nullable,
        EXISTS (
            SELECT 1 FROM pg_constraint con
            WHERE con.conrelid = c.oid
                AND con.contype = 'p'
                AND a.attnum = ANY(con.conkey)
        ) AS is_primary_key,
        EXISTS (
            SELECT 1 FROM pg_index i
            WHERE i.indrelid = c.oid
                AND i.indisunique
                AND NOT i.indisprimary
                AND i.indpred IS NULL
                AND i.indnkeyatts = 1
                AND i.indkey[0] = a.attnum
        ) AS is_unique
    FROM pg_attribute a
    JOIN pg_class c ON c.oid = a.attrelid
    JOIN pg_namespace n ON n.oid = c.relnamespace
    WHERE c.relname = $1
        AND n.nspname = $2
        AND a.attnum > 0
        AND NOT a.attisdropped
    ORDER BY a.attnum
"#;

/// PostgreSQL introspector
pub struct PostgresIntrospector {
    client: Client,
}

impl PostgresIntrospector {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn connect(descriptor: &ConnectionDescriptor) -> Result<Self, InspectError> {
        let mut config = postgres::Config::new();
        config
            .host(&descriptor.host)
            .port(descriptor.port)
            .dbname(&descriptor.database)
            .user(&descriptor.user)
            .password(&descriptor.password)
            .connect_timeout(descriptor.connect_timeout);

        let client = config.connect(NoTls).map_err(|e| {
            error!(error = ?e, "Failed to connect to database");
            InspectError::connection(Dialect::Postgres, e.to_string())
        })?;

        debug!("Connected to PostgreSQL");
        Ok(Self::new(client))
    }

    fn ensure_schema(&mut self, schema_name: &str) -> Result<(), InspectError> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM pg_namespace WHERE nspname = $1) AS found",
                &[&schema_name],
            )
            .map_err(|e| InspectError::connection(Dialect::Postgres, e.to_string()))?;

        if row.get::<_, bool>("found") {
            Ok(())
        } else {
            Err(InspectError::SchemaNotFound {
                dialect: Dialect::Postgres,
                schema: schema_name.to_string(),
            })
        }
    }

    fn table_exists(&mut self, schema_name: &str, table_name: &str) -> Result<bool, postgres::Error> {
        let sql = r#"
            SELECT EXISTS (
                SELECT 1
                FROM pg_class c
                JOIN pg_namespace n ON n.oid = c.relnamespace
                WHERE c.relkind IN ('r', 'p')
                    AND c.relname = $1
                    AND n.nspname = $2
            ) AS found
        "#;

        let row = self.client.query_one(sql, &[&table_name, &schema_name])?;
        Ok(row.get("found"))
    }

    /// (source column, target) pairs for every foreign key of one table.
    ///
    /// Targets in another schema are reported as `schema.table` so they never
    /// match a same-named table of the inspected schema.
    fn foreign_keys(
        &mut self,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Vec<(String, RawForeignKey)>, postgres::Error> {
        let sql = r#"
            SELECT
                src.attname AS column_name,
                CASE WHEN rn.nspname = n.nspname
                    THEN rc.relname::text
                    ELSE rn.nspname || '.' || rc.relname
                END AS foreign_table,
                dst.attname AS foreign_column
            FROM pg_constraint con
            JOIN pg_class c ON c.oid = con.conrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            JOIN pg_class rc ON rc.oid = con.confrelid
            JOIN pg_namespace rn ON rn.oid = rc.relnamespace
            CROSS JOIN LATERAL unnest(con.conkey, con.confkey) AS k(src_num, dst_num)
            JOIN pg_attribute src ON src.attrelid = con.conrelid AND src.attnum = k.src_num
            JOIN pg_attribute dst ON dst.attrelid = con.confrelid AND dst.attnum = k.dst_num
            WHERE con.contype = 'f'
                AND c.relname = $1
                AND n.nspname = $2
            ORDER BY con.conname, k.src_num
        "#;

        let rows = self.client.query(COLUMNS_SQL, &[&table_name, &schema_name])?;

        Ok(rows
            .iter()
            .map(|row| {
                (
                    row.get("column_name"),
                    RawForeignKey {
                        table: row.get("foreign_table"),
                        column: Some(row.get("foreign_column")),
                    },
                )
            })
            .collect())
    }
}

impl Introspector for PostgresIntrospector {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn fetch_tables(&mut self, schema_name: &str) -> Result<Vec<String>, InspectError> {
        trace!(schema = ?schema_name, "Querying tables");
        self.ensure_schema(schema_name)?;

        let sql = r#"
            SELECT c.relname AS table_name
            FROM pg_class c
            JOIN pg_namespace n ON n.oid = c.relnamespace
            WHERE c.relkind IN ('r', 'p')
                AND NOT c.relispartition
                AND n.nspname = $1
            ORDER BY c.relname
        "#;

        let rows = self.client.query(sql, &[&schema_name]).map_err(|e| {
            error!(schema = ?schema_name, error = ?e, "Failed to query tables");
            InspectError::connection(Dialect::Postgres, format!("Failed to query tables: {}", e))
        })?;

        let tables: Vec<String> = rows.iter().map(|row| row.get("table_name")).collect();
        trace!(tables = ?tables, "Tables found");
        Ok(tables)
    }

    fn fetch_columns(
        &mut self,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Vec<RawColumn>, InspectError> {
        trace!(schema = ?schema_name, table = ?table_name, "Querying columns");

        let partial = |e: postgres::Error| {
            error!(
                schema = ?schema_name,
                table = ?table_name,
                error = ?e,
                "Failed to query columns"
            );
            InspectError::partial_catalog(Dialect::Postgres, table_name, e.to_string())
        };


        let rows = self
            .client
            .query(COLUMNS_SQL, &[&table_name, &schema_name])
            .map_err(partial)?;

        // A table with zero columns is legal, a table that vanished is not
        if rows.is_empty() && !self.table_exists(schema_name, table_name).map_err(partial)? {
            return Err(InspectError::partial_catalog(
                Dialect::Postgres,
                table_name,
                "table no longer exists",
            ));
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let mut column = RawColumn::new(
                row.get::<_, String>("column_name"),
                row.get::<_, String>("data_type"),
            );
            column.is_nullable = row.get("is_nullable");
            column.is_primary_key = row.get("is_primary_key");
            column.is_unique = row.get("is_unique");

            trace!(
                column = ?column.name,
                data_type = ?column.data_type,
                is_nullable = ?column.is_nullable,
                is_primary_key = ?column.is_primary_key,
                is_unique = ?column.is_unique,
                "Parsed column"
            );
            columns.push(column);
        }

        let foreign_keys = self.foreign_keys(schema_name, table_name).map_err(partial)?;
        trace!(table = ?table_name, count = ?foreign_keys.len(), "Found foreign keys");
        attach_foreign_keys(&mut columns, foreign_keys);

        Ok(columns)
    }
}
