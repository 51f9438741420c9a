//! Configuration loading
//!
//! Loads database connection configuration from environment variables,
//! optionally reading from a .env file first.

use std::{env, path::Path, time::Duration};

use tracing::{debug, error, trace, warn};

use crate::dialect::Dialect;
use crate::error::InspectError;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Everything an adapter needs to reach one catalog
#[derive(Debug, Clone)]
pub struct ConnectionDescriptor {
    pub dialect: Dialect,
    pub host: String,
    pub port: u16,
    /// Database name, or the database file path for SQLite
    pub database: String,
    pub user: String,
    pub password: String,
    /// Schema to inspect; the dialect default when `None`
    pub schema: Option<String>,
    pub connect_timeout: Duration,
}

impl ConnectionDescriptor {
    /// Descriptor for a SQLite database file
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            dialect: Dialect::Sqlite,
            host: String::new(),
            port: 0,
            database: path.into(),
            user: String::new(),
            password: String::new(),
            schema: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Schema that will actually be inspected
    pub fn schema_name(&self) -> String {
        match &self.schema {
            Some(schema) => schema.clone(),
            None => self.dialect.default_schema(&self.database),
        }
    }

    /// Load configuration from environment variables
    ///
    /// Expected variables:
    /// - DB_HOST (default: localhost)
    /// - DB_PORT (default: the dialect's standard port)
    /// - DB_NAME (required; the database file for SQLite)
    /// - DB_USER (required except for SQLite)
    /// - DB_PASSWORD (required except for SQLite)
    /// - DB_SCHEMA (optional)
    /// - DB_CONNECT_TIMEOUT (seconds, default: 30)
    pub fn from_env(dialect: Dialect) -> Result<Self, InspectError> {
        Self::from_lookup(dialect, |key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(dialect: Dialect, lookup: F) -> Result<Self, InspectError>
    where
        F: Fn(&str) -> Option<String>,
    {
        debug!(dialect = ?dialect, "Loading database configuration");

        let required = |key: &str| {
            lookup(key).ok_or_else(|| {
                error!(variable = key, "Required environment variable is not set");
                InspectError::Config(format!("{key} environment variable is required"))
            })
        };

        let host = lookup("DB_HOST").unwrap_or_else(|| {
            trace!("DB_HOST not set, using default");
            "localhost".to_string()
        });

        let port = match lookup("DB_PORT") {
            Some(port_str) => port_str.parse::<u16>().map_err(|e| {
                error!(port = ?port_str, error = ?e, "Invalid DB_PORT value");
                InspectError::Config("DB_PORT must be a valid port number".to_string())
            })?,
            None => {
                trace!("DB_PORT not set, using dialect default");
                dialect.default_port().unwrap_or(0)
            }
        };

        let database = required("DB_NAME")?;

        let (user, password) = if dialect.requires_credentials() {
            (required("DB_USER")?, required("DB_PASSWORD")?)
        } else {
            (
                lookup("DB_USER").unwrap_or_default(),
                lookup("DB_PASSWORD").unwrap_or_default(),
            )
        };

        let schema = lookup("DB_SCHEMA").filter(|s| !s.is_empty());

        let connect_timeout = match lookup("DB_CONNECT_TIMEOUT") {
            Some(secs) => secs.parse::<u64>().map(Duration::from_secs).map_err(|e| {
                error!(timeout = ?secs, error = ?e, "Invalid DB_CONNECT_TIMEOUT value");
                InspectError::Config(
                    "DB_CONNECT_TIMEOUT must be a whole number of seconds".to_string(),
                )
            })?,
            None => Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        debug!(host = ?host, port = ?port, database = ?database, user = ?user, "Configuration loaded");

        Ok(Self {
            dialect,
            host,
            port,
            database,
            user,
            password,
            schema,
            connect_timeout,
        })
    }

    /// Load a .env file and then read configuration from environment
    pub fn load(dialect: Dialect, env_file: &Path) -> Result<Self, InspectError> {
        if env_file.exists() {
            debug!(path = ?env_file, "Loading environment file");
            dotenvy::from_path(env_file).map_err(|e| {
                error!(path = ?env_file, error = ?e, "Failed to load environment file");
                InspectError::Config(format!("Failed to load {}: {}", env_file.display(), e))
            })?;
        } else {
            warn!(path = ?env_file, "Environment file not found, using existing environment");
        }

        Self::from_env(dialect)
    }

    /// Describe the target with the password redacted (for logs and errors)
    pub fn redacted_connection_string(&self) -> String {
        match self.dialect {
            Dialect::Sqlite => format!("sqlite file={}", self.database),
            dialect => format!(
                "{} host={} port={} dbname={} user={} password=***",
                dialect, self.host, self.port, self.database, self.user
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn required_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DB_NAME", "testdb"),
            ("DB_USER", "testuser"),
            ("DB_PASSWORD", "testpass"),
        ]
    }

    #[test]
    fn test_from_lookup_with_defaults() {
        let config =
            ConnectionDescriptor::from_lookup(Dialect::Postgres, lookup_from(&required_vars()))
                .unwrap();

        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.database, "testdb");
        assert_eq!(config.user, "testuser");
        assert_eq!(config.password, "testpass");
        assert_eq!(config.schema, None);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.schema_name(), "public");
    }

    #[test]
    fn test_default_port_follows_dialect() {
        let vars = required_vars();
        let mysql = ConnectionDescriptor::from_lookup(Dialect::MySql, lookup_from(&vars)).unwrap();
        let mssql = ConnectionDescriptor::from_lookup(Dialect::MsSql, lookup_from(&vars)).unwrap();

        assert_eq!(mysql.port, 3306);
        assert_eq!(mysql.schema_name(), "testdb");
        assert_eq!(mssql.port, 1433);
        assert_eq!(mssql.schema_name(), "dbo");
    }

    #[test]
    fn test_from_lookup_with_custom_values() {
        let mut vars = required_vars();
        vars.push(("DB_HOST", "db.example.com"));
        vars.push(("DB_PORT", "5433"));
        vars.push(("DB_SCHEMA", "inventory"));
        vars.push(("DB_CONNECT_TIMEOUT", "5"));

        let config =
            ConnectionDescriptor::from_lookup(Dialect::Postgres, lookup_from(&vars)).unwrap();

        assert_eq!(config.host, "db.example.com");
        assert_eq!(config.port, 5433);
        assert_eq!(config.schema_name(), "inventory");
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_from_lookup_missing_db_name() {
        let vars = [("DB_USER", "testuser"), ("DB_PASSWORD", "testpass")];

        let result = ConnectionDescriptor::from_lookup(Dialect::Postgres, lookup_from(&vars));

        let err = result.unwrap_err();
        assert!(err.to_string().contains("DB_NAME"));
    }

    #[test]
    fn test_sqlite_does_not_need_credentials() {
        let vars = [("DB_NAME", "/tmp/app.db")];

        let config =
            ConnectionDescriptor::from_lookup(Dialect::Sqlite, lookup_from(&vars)).unwrap();

        assert_eq!(config.database, "/tmp/app.db");
        assert_eq!(config.user, "");
        assert_eq!(config.schema_name(), "main");
    }

    #[test]
    fn test_from_lookup_invalid_port() {
        let mut vars = required_vars();
        vars.push(("DB_PORT", "not_a_number"));

        let err =
            ConnectionDescriptor::from_lookup(Dialect::Postgres, lookup_from(&vars)).unwrap_err();

        assert!(err.to_string().contains("DB_PORT"));
    }

    #[test]
    fn test_from_lookup_invalid_timeout() {
        let mut vars = required_vars();
        vars.push(("DB_CONNECT_TIMEOUT", "soon"));

        let err =
            ConnectionDescriptor::from_lookup(Dialect::MsSql, lookup_from(&vars)).unwrap_err();

        assert!(err.to_string().contains("DB_CONNECT_TIMEOUT"));
    }

    #[test]
    fn test_redacted_connection_string() {
        let config =
            ConnectionDescriptor::from_lookup(Dialect::MySql, lookup_from(&required_vars()))
                .unwrap();

        let conn_str = config.redacted_connection_string();

        assert!(!conn_str.contains("testpass"));
        assert!(conn_str.contains("***"));
        assert!(conn_str.starts_with("mysql "));
    }
}
