//! Python source printer
//!
//! Serializes a [`Module`] to PEP 8 formatted text: four-space indents, two
//! blank lines around top-level classes, one after a class docstring, and
//! brackets broken one item per line once a line would pass
//! [`MAX_WIDTH`]. Output depends only on the tree, never on iteration order
//! of anything else, so printing the same tree twice gives identical bytes.

use super::ast::{import_group, Alias, ClassDef, Expr, Module, Stmt};

/// Line width before bracketed expressions are broken up (black's default)
pub const MAX_WIDTH: usize = 88;

const INDENT: &str = "    ";

pub fn print_module(module: &Module) -> String {
    let mut printer = Printer::default();
    if let Some(docstring) = &module.docstring {
        printer.docstring(docstring, 0);
        if !module.body.is_empty() {
            printer.out.push('\n');
        }
    }
    if !module.body.is_empty() {
        printer.block(&module.body, 0);
    }
    printer.out
}

#[derive(Default)]
struct Printer {
    out: String,
}

impl Printer {
    fn block(&mut self, body: &[Stmt], level: usize) {
        if body.is_empty() {
            self.line(level, "pass");
            return;
        }

        for (i, stmt) in body.iter().enumerate() {
            if i > 0 {
                for _ in 0..blank_lines_between(&body[i - 1], stmt, level) {
                    self.out.push('\n');
                }
            }
            self.stmt(stmt, level);
        }
    }

    fn stmt(&mut self, stmt: &Stmt, level: usize) {
        match stmt {
            Stmt::ImportFrom { module, names } => self.import_from(module, names, level),
            Stmt::ClassDef(class) => self.class_def(class, level),
            Stmt::AnnAssign {
                target,
                annotation,
                value,
            } => {
                let mut text = format!("{}: {}", target, flat(annotation));
                if let Some(value) = value {
                    text.push_str(" = ");
                    let used = indent_width(level) + width(&text);
                    text.push_str(&wrapped(value, level, used));
                }
                self.line(level, &text);
            }
            Stmt::Assign { target, value } => {
                let prefix = format!("{} = ", target);
                let used = indent_width(level) + width(&prefix);
                self.line(level, &format!("{}{}", prefix, wrapped(value, level, used)));
            }
            Stmt::Docstring(text) => self.docstring(text, level),
        }
    }

    fn import_from(&mut self, module: &str, names: &[Alias], level: usize) {
        let rendered: Vec<String> = names.iter().map(alias).collect();
        let single = format!("from {} import {}", module, rendered.join(", "));

        if indent_width(level) + width(&single) <= MAX_WIDTH {
            self.line(level, &single);
            return;
        }

        self.line(level, &format!("from {} import (", module));
        for name in &rendered {
            self.line(level + 1, &format!("{},", name));
        }
        self.line(level, ")");
    }

    fn class_def(&mut self, class: &ClassDef, level: usize) {
        for decorator in &class.decorators {
            self.line(level, &format!("@{}", flat(decorator)));
        }
        self.line(level, &format!("class {}:", class.name));
        self.block(&class.body, level + 1);
    }

    fn docstring(&mut self, text: &str, level: usize) {
        let escaped = escape_docstring(text);
        let lines: Vec<&str> = escaped.lines().collect();

        match lines.as_slice() {
            [] => self.line(level, "\"\"\"\"\"\""),
            [only] => self.line(level, &format!("\"\"\"{}\"\"\"", only)),
            [first, rest @ ..] => {
                self.line(level, &format!("\"\"\"{}", first));
                for line in rest {
                    if line.is_empty() {
                        self.out.push('\n');
                    } else {
                        self.line(level, line);
                    }
                }
                self.line(level, "\"\"\"");
            }
        }
    }

    fn line(&mut self, level: usize, text: &str) {
        for _ in 0..level {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }
}

fn blank_lines_between(prev: &Stmt, next: &Stmt, level: usize) -> usize {
    let top_level = level == 0;
    match (prev, next) {
        (Stmt::ClassDef(_), _) | (_, Stmt::ClassDef(_)) => {
            if top_level {
                2
            } else {
                1
            }
        }
        (Stmt::Docstring(_), _) => 1,
        (Stmt::ImportFrom { module: a, .. }, Stmt::ImportFrom { module: b, .. }) => {
            usize::from(import_group(a) != import_group(b))
        }
        (Stmt::ImportFrom { .. }, _) => 1,
        _ => 0,
    }
}

fn alias(alias: &Alias) -> String {
    match &alias.asname {
        Some(asname) => format!("{} as {}", alias.name, asname),
        None => alias.name.clone(),
    }
}

/// Render an expression on one line
fn flat(expr: &Expr) -> String {
    match expr {
        Expr::Name(name) => name.clone(),
        Expr::BitOr(left, right) => format!("{} | {}", flat(left), flat(right)),
        Expr::Call { func, keywords } => {
            let items: Vec<String> = keywords
                .iter()
                .map(|(key, value)| format!("{}={}", key, flat(value)))
                .collect();
            format!("{}({})", flat(func), items.join(", "))
        }
        Expr::Dict(entries) => {
            let items: Vec<String> = entries
                .iter()
                .map(|(key, value)| format!("{}: {}", flat(key), flat(value)))
                .collect();
            format!("{{{}}}", items.join(", "))
        }
        Expr::List(items) => {
            let items: Vec<String> = items.iter().map(flat).collect();
            format!("[{}]", items.join(", "))
        }
        Expr::Str(value) => quote(value),
        Expr::Int(value) => value.to_string(),
        Expr::Bool(true) => "True".to_string(),
        Expr::Bool(false) => "False".to_string(),
        Expr::NoneLit => "None".to_string(),
    }
}

/// Render an expression that starts `used` columns into a line at `level`,
/// breaking brackets when the flat form does not fit
fn wrapped(expr: &Expr, level: usize, used: usize) -> String {
    let single = flat(expr);
    if used + width(&single) <= MAX_WIDTH {
        return single;
    }

    let inner = level + 1;
    let inner_used = indent_width(inner);
    let (open, items, close) = match expr {
        Expr::Call { func, keywords } if !keywords.is_empty() => {
            let items = keywords
                .iter()
                .map(|(key, value)| {
                    let prefix = format!("{}=", key);
                    let rest = wrapped(value, inner, inner_used + width(&prefix));
                    format!("{}{}", prefix, rest)
                })
                .collect::<Vec<_>>();
            (format!("{}(", flat(func)), items, ")")
        }
        Expr::Dict(entries) if !entries.is_empty() => {
            let items = entries
                .iter()
                .map(|(key, value)| {
                    let prefix = format!("{}: ", flat(key));
                    let rest = wrapped(value, inner, inner_used + width(&prefix));
                    format!("{}{}", prefix, rest)
                })
                .collect::<Vec<_>>();
            ("{".to_string(), items, "}")
        }
        Expr::List(entries) if !entries.is_empty() => {
            let items = entries
                .iter()
                .map(|item| wrapped(item, inner, inner_used))
                .collect::<Vec<_>>();
            ("[".to_string(), items, "]")
        }
        _ => return single,
    };

    let mut text = open;
    text.push('\n');
    for item in items {
        text.push_str(&INDENT.repeat(inner));
        text.push_str(&item);
        text.push_str(",\n");
    }
    text.push_str(&INDENT.repeat(level));
    text.push_str(close);
    text
}

/// Double-quoted Python string literal
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32 & 0xff)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn escape_docstring(text: &str) -> String {
    text.chars()
        .filter(|c| *c == '\n' || !c.is_control())
        .collect::<String>()
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
}

fn indent_width(level: usize) -> usize {
    level * INDENT.len()
}

fn width(text: &str) -> usize {
    text.chars().count()
}
