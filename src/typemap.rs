//! Type Mapper
//!
//! Resolves a dialect's raw column type string into a canonical,
//! dialect-independent tag. Resolution is pure and never fails: anything the
//! table does not recognise becomes [`CanonicalType::Unknown`] so that one
//! exotic column cannot block generation of the rest of the schema.

use std::collections::HashMap;
use std::fmt;

use crate::dialect::Dialect;
use crate::introspect::RawColumn;

/// Dialect-independent scalar type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalType {
    Integer,
    Decimal,
    Boolean,
    Text,
    Date,
    DateTime,
    Binary,
    Unknown,
}

impl CanonicalType {
    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalType::Integer => "integer",
            CanonicalType::Decimal => "decimal",
            CanonicalType::Boolean => "boolean",
            CanonicalType::Text => "text",
            CanonicalType::Date => "date",
            CanonicalType::DateTime => "datetime",
            CanonicalType::Binary => "binary",
            CanonicalType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size information carried alongside the canonical tag.
///
/// Hints never change the tag; a `VARCHAR(10)` and a `TEXT` are both text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeHint {
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
}

/// Output of the mapper for one column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedType {
    pub canonical: CanonicalType,
    pub nullable: bool,
    pub size: SizeHint,
}

const BUILTIN: &[(&str, CanonicalType)] = &[
    // integers
    ("INT", CanonicalType::Integer),
    ("INTEGER", CanonicalType::Integer),
    ("TINYINT", CanonicalType::Integer),
    ("SMALLINT", CanonicalType::Integer),
    ("MEDIUMINT", CanonicalType::Integer),
    ("BIGINT", CanonicalType::Integer),
    ("INT2", CanonicalType::Integer),
    ("INT4", CanonicalType::Integer),
    ("INT8", CanonicalType::Integer),
    ("SERIAL", CanonicalType::Integer),
    ("SMALLSERIAL", CanonicalType::Integer),
    ("BIGSERIAL", CanonicalType::Integer),
    ("SERIAL4", CanonicalType::Integer),
    ("SERIAL8", CanonicalType::Integer),
    // decimals and floats
    ("DECIMAL", CanonicalType::Decimal),
    ("NUMERIC", CanonicalType::Decimal),
    ("DEC", CanonicalType::Decimal),
    ("REAL", CanonicalType::Decimal),
    ("FLOAT", CanonicalType::Decimal),
    ("FLOAT4", CanonicalType::Decimal),
    ("FLOAT8", CanonicalType::Decimal),
    ("DOUBLE", CanonicalType::Decimal),
    ("DOUBLE PRECISION", CanonicalType::Decimal),
    ("MONEY", CanonicalType::Decimal),
    ("SMALLMONEY", CanonicalType::Decimal),
    // strings
    ("TEXT", CanonicalType::Text),
    ("CHAR", CanonicalType::Text),
    ("CHARACTER", CanonicalType::Text),
    ("VARCHAR", CanonicalType::Text),
    ("CHARACTER VARYING", CanonicalType::Text),
    ("NCHAR", CanonicalType::Text),
    ("NVARCHAR", CanonicalType::Text),
    ("NATIONAL CHARACTER", CanonicalType::Text),
    ("NATIONAL CHARACTER VARYING", CanonicalType::Text),
    ("NTEXT", CanonicalType::Text),
    ("CLOB", CanonicalType::Text),
    ("TINYTEXT", CanonicalType::Text),
    ("MEDIUMTEXT", CanonicalType::Text),
    ("LONGTEXT", CanonicalType::Text),
    ("CITEXT", CanonicalType::Text),
    ("BPCHAR", CanonicalType::Text),
    ("UUID", CanonicalType::Text),
    ("UNIQUEIDENTIFIER", CanonicalType::Text),
    ("ENUM", CanonicalType::Text),
    ("SET", CanonicalType::Text),
    // booleans
    ("BOOLEAN", CanonicalType::Boolean),
    ("BOOL", CanonicalType::Boolean),
    ("BIT", CanonicalType::Boolean),
    // temporal
    ("DATE", CanonicalType::Date),
    ("DATETIME", CanonicalType::DateTime),
    ("DATETIME2", CanonicalType::DateTime),
    ("SMALLDATETIME", CanonicalType::DateTime),
    ("DATETIMEOFFSET", CanonicalType::DateTime),
    ("TIMESTAMP", CanonicalType::DateTime),
    ("TIMESTAMPTZ", CanonicalType::DateTime),
    ("TIMESTAMP WITHOUT TIME ZONE", CanonicalType::DateTime),
    ("TIMESTAMP WITH TIME ZONE", CanonicalType::DateTime),
    // binary
    ("BLOB", CanonicalType::Binary),
    ("TINYBLOB", CanonicalType::Binary),
    ("MEDIUMBLOB", CanonicalType::Binary),
    ("LONGBLOB", CanonicalType::Binary),
    ("BYTEA", CanonicalType::Binary),
    ("BINARY", CanonicalType::Binary),
    ("VARBINARY", CanonicalType::Binary),
    ("IMAGE", CanonicalType::Binary),
];

/// Immutable lookup table from normalized type names to canonical tags.
///
/// The built-in table is available through [`Default`]; callers that need to
/// teach the mapper about an engine extension build on top of it with
/// [`TypeMap::with_type`] or [`TypeMap::with_override`].
#[derive(Debug, Clone)]
pub struct TypeMap {
    common: HashMap<String, CanonicalType>,
    overrides: HashMap<(Dialect, String), CanonicalType>,
}

impl Default for TypeMap {
    fn default() -> Self {
        let common = BUILTIN
            .iter()
            .map(|(name, tag)| (name.to_string(), *tag))
            .collect();

        Self {
            common,
            overrides: HashMap::new(),
        }
    }
}

impl TypeMap {
    /// Map an additional type name for every dialect
    pub fn with_type(mut self, name: &str, tag: CanonicalType) -> Self {
        self.common.insert(normalize_type_name(name), tag);
        self
    }

    /// Map a type name for one dialect only, taking precedence over the common table
    pub fn with_override(mut self, dialect: Dialect, name: &str, tag: CanonicalType) -> Self {
        self.overrides.insert((dialect, normalize_type_name(name)), tag);
        self
    }

    /// Resolve a raw column to its canonical type and size hints
    pub fn resolve(&self, dialect: Dialect, column: &RawColumn) -> ResolvedType {
        let canonical = self.canonical_type(dialect, &column.data_type);
        let size = size_hint(canonical, column);

        ResolvedType {
            canonical,
            nullable: column.is_nullable,
            size,
        }
    }

    /// Resolve a raw type string to a canonical tag
    pub fn canonical_type(&self, dialect: Dialect, raw_type: &str) -> CanonicalType {
        let base = normalize_type_name(raw_type);
        let (first_param, _) = parse_type_params(raw_type);

        if let Some(tag) = self.overrides.get(&(dialect, base.clone())) {
            return *tag;
        }

        if dialect == Dialect::MySql {
            // MySQL has no boolean storage; BOOLEAN is an alias of TINYINT(1)
            if base == "TINYINT" && first_param == Some(1) {
                return CanonicalType::Boolean;
            }
            if base == "BIT" && first_param.is_some_and(|bits| bits > 1) {
                return CanonicalType::Binary;
            }
        }

        if let Some(tag) = self.common.get(&base) {
            return *tag;
        }

        if dialect == Dialect::Sqlite {
            if let Some(tag) = sqlite_affinity(&base) {
                return tag;
            }
        }

        CanonicalType::Unknown
    }
}

/// Canonical spelling of a raw type: parameters and modifiers removed,
/// whitespace collapsed, upper case.
///
/// `"timestamp(3) without time zone"` becomes `"TIMESTAMP WITHOUT TIME ZONE"`,
/// `"int(10) unsigned zerofill"` becomes `"INT"`.
pub fn normalize_type_name(raw_type: &str) -> String {
    let mut stripped = String::with_capacity(raw_type.len());
    let mut depth = 0usize;
    for ch in raw_type.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => stripped.push(ch),
            _ => {}
        }
    }

    stripped
        .split_whitespace()
        .map(|word| word.to_ascii_uppercase())
        .filter(|word| !matches!(word.as_str(), "UNSIGNED" | "ZEROFILL" | "IDENTITY"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract numeric parameters from a type like `"varchar(255)"` or `"numeric(10,2)"`
pub fn parse_type_params(raw_type: &str) -> (Option<u32>, Option<u32>) {
    let Some(start) = raw_type.find('(') else {
        return (None, None);
    };
    let Some(end) = raw_type[start..].find(')') else {
        return (None, None);
    };

    let mut params = raw_type[start + 1..start + end]
        .split(',')
        .map(|p| p.trim().parse::<u32>().ok());

    let first = params.next().flatten();
    let second = params.next().flatten();
    (first, second)
}

/// Catalog hints win; missing ones are read from the raw type string
fn size_hint(canonical: CanonicalType, column: &RawColumn) -> SizeHint {
    let (first, second) = parse_type_params(&column.data_type);

    match canonical {
        CanonicalType::Text | CanonicalType::Binary => SizeHint {
            length: column.length.or(first),
            precision: None,
            scale: None,
        },
        CanonicalType::Decimal => SizeHint {
            length: None,
            precision: column.precision.or(first),
            scale: column.scale.or(second),
        },
        _ => SizeHint::default(),
    }
}

/// SQLite accepts any declared type and classifies it by substring
fn sqlite_affinity(base: &str) -> Option<CanonicalType> {
    if base.is_empty() {
        None
    } else if base.contains("INT") {
        Some(CanonicalType::Integer)
    } else if base.contains("CHAR") || base.contains("CLOB") || base.contains("TEXT") {
        Some(CanonicalType::Text)
    } else if base.contains("BLOB") {
        Some(CanonicalType::Binary)
    } else if base.contains("REAL") || base.contains("FLOA") || base.contains("DOUB") {
        Some(CanonicalType::Decimal)
    } else {
        None
    }
}
