//! A small Python syntax tree
//!
//! Covers exactly the constructs the generator emits. Node names follow
//! Python's own `ast` module so the printed form is easy to predict.

use std::collections::{BTreeMap, BTreeSet};

/// A Python source file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Module {
    pub docstring: Option<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `from module import a, b as c`
    ImportFrom { module: String, names: Vec<Alias> },
    ClassDef(ClassDef),
    /// `target: annotation` or `target: annotation = value`
    AnnAssign {
        target: String,
        annotation: Expr,
        value: Option<Expr>,
    },
    /// `target = value`
    Assign { target: String, value: Expr },
    /// A string expression statement in docstring position
    Docstring(String),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

impl Alias {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            asname: None,
        }
    }

    pub fn with_asname(name: impl Into<String>, asname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            asname: Some(asname.into()),
        }
    }

    /// Name the import binds in the importing module
    pub fn bound_name(&self) -> &str {
        self.asname.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    pub name: String,
    pub decorators: Vec<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Name(String),
    /// `left | right`
    BitOr(Box<Expr>, Box<Expr>),
    /// `func(key=value, ...)`
    Call {
        func: Box<Expr>,
        keywords: Vec<(String, Expr)>,
    },
    Dict(Vec<(Expr, Expr)>),
    List(Vec<Expr>),
    Str(String),
    Int(i64),
    Bool(bool),
    NoneLit,
}

impl Expr {
    pub fn name(name: impl Into<String>) -> Self {
        Expr::Name(name.into())
    }

    pub fn str(value: impl Into<String>) -> Self {
        Expr::Str(value.into())
    }

    /// `inner | None`
    pub fn optional(inner: Expr) -> Self {
        Expr::BitOr(Box::new(inner), Box::new(Expr::NoneLit))
    }

    pub fn call(func: impl Into<String>, keywords: Vec<(String, Expr)>) -> Self {
        Expr::Call {
            func: Box::new(Expr::name(func)),
            keywords,
        }
    }
}

/// Imports collected while building a module.
///
/// Yields one merged `from` statement per module: `__future__` first,
/// absolute modules next, relative modules last, names sorted within each.
#[derive(Debug, Clone, Default)]
pub struct ImportSet {
    modules: BTreeMap<String, BTreeSet<Alias>>,
}

impl ImportSet {
    pub fn add(&mut self, module: &str, alias: Alias) {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(alias);
    }

    pub fn into_stmts(self) -> Vec<Stmt> {
        let mut modules: Vec<_> = self.modules.into_iter().collect();
        modules.sort_by_key(|(module, _)| (import_group(module), module.clone()));

        modules
            .into_iter()
            .map(|(module, names)| Stmt::ImportFrom {
                module,
                names: names.into_iter().collect(),
            })
            .collect()
    }
}

/// isort section of an imported module: future, absolute, relative
pub(crate) fn import_group(module: &str) -> u8 {
    if module == "__future__" {
        0
    } else if module.starts_with('.') {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_set_merges_and_orders() {
        let mut imports = ImportSet::default();
        imports.add(".user", Alias::new("User"));
        imports.add("datetime", Alias::new("datetime"));
        imports.add("dataclasses", Alias::new("field"));
        imports.add("datetime", Alias::new("date"));
        imports.add("dataclasses", Alias::new("dataclass"));
        imports.add("__future__", Alias::new("annotations"));
        imports.add("datetime", Alias::new("date"));

        let modules: Vec<_> = imports
            .into_stmts()
            .into_iter()
            .map(|stmt| match stmt {
                Stmt::ImportFrom { module, names } => (
                    module,
                    names.iter().map(|a| a.name.clone()).collect::<Vec<_>>(),
                ),
                other => panic!("unexpected {other:?}"),
            })
            .collect();

        assert_eq!(
            modules,
            [
                ("__future__".to_string(), vec!["annotations".to_string()]),
                (
                    "dataclasses".to_string(),
                    vec!["dataclass".to_string(), "field".to_string()]
                ),
                (
                    "datetime".to_string(),
                    vec!["date".to_string(), "datetime".to_string()]
                ),
                (".user".to_string(), vec!["User".to_string()]),
            ]
        );
    }

    #[test]
    fn test_alias_bound_name() {
        assert_eq!(Alias::new("field").bound_name(), "field");
        assert_eq!(
            Alias::with_asname("field", "dataclass_field").bound_name(),
            "dataclass_field"
        );
    }
}
