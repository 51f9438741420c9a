//! Identifier Normalizer
//!
//! Turns raw SQL identifiers into Python identifiers. Table names become
//! singular PascalCase class names; column names become snake_case field
//! names and are never singularised.
//!
//! Singularisation is a small rule set, not a dictionary. Known limitation:
//! applying [`singularize`] to its own output is a no-op for ordinary nouns
//! but is not guaranteed to be for every irregular plural.
//!
//! Identifier characters follow Python's rules (Unicode `XID_Start` /
//! `XID_Continue`), so `"名字"` and `"prénom"` survive as written.

use unicode_ident::{is_xid_continue, is_xid_start};

/// Python keywords; an identifier equal to one of these gets a `_` suffix
pub const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Plurals that no suffix rule gets right
const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("people", "person"),
    ("men", "man"),
    ("women", "woman"),
    ("children", "child"),
    ("mice", "mouse"),
    ("geese", "goose"),
    ("teeth", "tooth"),
    ("feet", "foot"),
    ("oxen", "ox"),
    ("indices", "index"),
    ("matrices", "matrix"),
    ("vertices", "vertex"),
    ("criteria", "criterion"),
    ("phenomena", "phenomenon"),
    ("analyses", "analysis"),
    ("theses", "thesis"),
    ("crises", "crisis"),
    ("diagnoses", "diagnosis"),
    ("statuses", "status"),
    ("buses", "bus"),
    ("aliases", "alias"),
    ("leaves", "leaf"),
    ("lives", "life"),
    ("knives", "knife"),
    ("wives", "wife"),
    ("halves", "half"),
    ("shelves", "shelf"),
    ("wolves", "wolf"),
    ("heroes", "hero"),
    ("potatoes", "potato"),
    ("tomatoes", "tomato"),
    ("echoes", "echo"),
    ("movies", "movie"),
    ("cookies", "cookie"),
    ("zombies", "zombie"),
];

/// Plurals that only drop the final `s` although a suffix rule would cut more
const DROP_S_PLURALS: &[&str] = &[
    "caches", "niches", "avalanches", "headaches", "moustaches", "mustaches", "cliches",
    "quiches", "creches", "uses", "fuses", "muses", "excuses", "abuses", "refuses", "misuses",
    "menus", "emus", "gurus", "haikus", "skus", "tutus", "bayous",
];

/// Singular nouns ending in `is` that are not `-sis` words
const SINGULAR_IS: &[&str] = &[
    "axis", "iris", "tennis", "penis", "pelvis", "trellis", "metropolis", "cannabis",
    "epidermis", "this", "his", "is",
];

/// Words whose singular and plural are the same
const UNCOUNTABLE: &[&str] = &[
    "data", "metadata", "info", "information", "news", "series", "species", "equipment",
    "staff", "sheep", "fish", "deer", "media", "feedback", "software",
];

/// Singular form of one lower-case English noun
pub fn singularize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    let len = lower.len();

    if UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }

    if let Some((_, singular)) = IRREGULAR_PLURALS.iter().find(|(plural, _)| *plural == lower) {
        return match_case(word, singular);
    }

    if DROP_S_PLURALS.contains(&lower.as_str()) {
        return word[..len - 1].to_string();
    }

    if lower.ends_with("ies") && len > 4 {
        return format!("{}{}", &word[..len - 3], match_case(&word[len - 3..], "y"));
    }

    // ASCII lowercasing keeps byte offsets, so suffix cuts land on char boundaries
    let stem_len = if lower.ends_with("sses")
        || lower.ends_with("shes")
        || lower.ends_with("ches")
        || lower.ends_with("xes")
        || lower.ends_with("zzes")
    {
        Some(len - 2)
    } else if lower.ends_with("uses") {
        // houses, causes keep their `e`; campuses, viruses do not
        let before = len.checked_sub(5).map(|i| lower.as_bytes()[i]);
        match before {
            Some(b'a' | b'e' | b'o') | None => Some(len - 1),
            Some(_) => Some(len - 2),
        }
    } else if lower.ends_with("ss") || lower.ends_with("us") || lower.ends_with("sis") {
        None
    } else if lower.ends_with("is") {
        if SINGULAR_IS.contains(&lower.as_str()) {
            None
        } else {
            Some(len - 1)
        }
    } else if lower.ends_with('s') && len > 1 {
        Some(len - 1)
    } else {
        None
    };

    match stem_len {
        Some(stem) => word[..stem].to_string(),
        None => word.to_string(),
    }
}

/// Convert snake_case to PascalCase
pub fn to_pascal_case(s: &str) -> String {
    s.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => {
                    let first_upper = first.to_uppercase().to_string();
                    first_upper + chars.as_str()
                }
            }
        })
        .collect()
}

/// Convert an arbitrary identifier to lower snake_case.
///
/// Camel humps and acronym boundaries become underscores
/// (`"CustomerID"` → `"customer_id"`, `"HTTPStatus"` → `"http_status"`).
/// Letters from any script are kept and lowercased where they have case.
/// Characters that cannot appear in a Python identifier become underscores.
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);

    for (i, &ch) in chars.iter().enumerate() {
        if ch != '_' && is_xid_continue(ch) {
            if ch.is_uppercase() && i > 0 {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
                let boundary = prev.is_lowercase()
                    || prev.is_numeric()
                    || (prev.is_uppercase() && next_is_lower);
                if boundary && !out.ends_with('_') {
                    out.push('_');
                }
            }
            out.extend(ch.to_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }

    out
}

/// Raw table name to a Python class name.
///
/// The last word is singularised, the whole name is PascalCased:
/// `"order_line_items"` → `"OrderLineItem"`, `"test_table_2"` → `"TestTable2"`.
pub fn table_name_to_type_name(raw: &str) -> String {
    let snake = to_snake_case(raw);
    let trimmed = snake.trim_matches('_');

    let singular = match trimmed.rsplit_once('_') {
        Some((head, last)) => format!("{}_{}", head, singularize(last)),
        None => singularize(trimmed),
    };

    let mut name = to_pascal_case(&singular);
    if name.is_empty() {
        name.push('_');
    }
    finish_identifier(name)
}

/// Raw column name to a Python field name. Sanitisation only, no singularisation.
pub fn column_name_to_field_name(raw: &str) -> String {
    let snake = to_snake_case(raw);
    let trimmed = snake.trim_end_matches('_');

    let name = if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    };
    finish_identifier(name)
}

/// Whether `name` is a usable Python identifier as emitted by this crate
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c == '_' || is_xid_start(c));
    valid_start && chars.all(is_xid_continue) && !PYTHON_KEYWORDS.contains(&name)
}

fn finish_identifier(mut name: String) -> String {
    if name.starts_with(|c: char| c != '_' && !is_xid_start(c)) {
        name.insert(0, '_');
    }
    if PYTHON_KEYWORDS.contains(&name.as_str()) {
        name.push('_');
    }
    name
}

/// Give `target` the capitalisation of `original`'s first letter
fn match_case(original: &str, target: &str) -> String {
    if original.starts_with(char::is_uppercase) {
        to_pascal_case(target)
    } else {
        target.to_string()
    }
}
