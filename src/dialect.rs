//! Supported database dialects
//!
//! The dialect is always chosen explicitly by the caller. Catalog layouts are
//! not self-describing enough to guess the engine from a connection.

use std::fmt;
use std::str::FromStr;

use crate::error::InspectError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dialect {
    Sqlite,
    Postgres,
    MySql,
    MsSql,
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [
        Dialect::Sqlite,
        Dialect::Postgres,
        Dialect::MySql,
        Dialect::MsSql,
    ];

    /// Default TCP port of the server, `None` for file-based engines
    pub fn default_port(self) -> Option<u16> {
        match self {
            Dialect::Sqlite => None,
            Dialect::Postgres => Some(5432),
            Dialect::MySql => Some(3306),
            Dialect::MsSql => Some(1433),
        }
    }

    /// Schema inspected when the caller does not name one.
    ///
    /// MySQL has no schemas below the database, so the database name is the
    /// schema there.
    pub fn default_schema(self, database: &str) -> String {
        match self {
            Dialect::Sqlite => "main".to_string(),
            Dialect::Postgres => "public".to_string(),
            Dialect::MySql => database.to_string(),
            Dialect::MsSql => "dbo".to_string(),
        }
    }

    /// Whether connecting requires a user name and password
    pub fn requires_credentials(self) -> bool {
        !matches!(self, Dialect::Sqlite)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::MsSql => "mssql",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = InspectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "mssql" | "sqlserver" => Ok(Dialect::MsSql),
            _ => Err(InspectError::UnsupportedDialect(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("SQLite".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert_eq!("postgresql".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("mariadb".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!(" sqlserver ".parse::<Dialect>().unwrap(), Dialect::MsSql);
    }

    #[test]
    fn test_parse_unknown_dialect() {
        let err = "oracle".parse::<Dialect>().unwrap_err();
        assert!(matches!(err, InspectError::UnsupportedDialect(ref name) if name == "oracle"));
    }

    #[test]
    fn test_display_round_trips() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.to_string().parse::<Dialect>().unwrap(), dialect);
        }
    }

    #[test]
    fn test_default_schema() {
        assert_eq!(Dialect::Postgres.default_schema("shop"), "public");
        assert_eq!(Dialect::MySql.default_schema("shop"), "shop");
        assert_eq!(Dialect::MsSql.default_schema("shop"), "dbo");
        assert_eq!(Dialect::Sqlite.default_schema("shop.db"), "main");
    }
}
