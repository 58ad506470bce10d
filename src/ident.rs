//! Identifier conversion
//!
//! Turns catalog names into Rust identifiers for the generated code.

use convert_case::{Case, Casing};

/// Keywords that can be written as raw identifiers (`r#type`)
const RAW_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized",
    "use", "virtual", "where", "while", "yield",
];

/// Keywords that cannot be raw identifiers
const RESERVED: &[&str] = &["crate", "self", "Self", "super", "_"];

/// Exported type name: `user_accounts` -> `UserAccounts`
pub fn type_name(name: &str) -> String {
    let converted = sanitize(&name.to_case(Case::Pascal));
    if converted.is_empty() {
        return "Empty".to_string();
    }
    escape(converted)
}

/// Struct field name: `userId` -> `user_id`, `type` -> `r#type`
pub fn field_name(name: &str) -> String {
    let converted = if is_snake_case(name) {
        sanitize(name)
    } else {
        sanitize(&name.to_case(Case::Snake))
    };
    if converted.is_empty() {
        return "field_".to_string();
    }
    escape(converted)
}

fn is_snake_case(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn sanitize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

fn escape(ident: String) -> String {
    if RESERVED.contains(&ident.as_str()) {
        format!("{ident}_")
    } else if RAW_KEYWORDS.contains(&ident.as_str()) {
        format!("r#{ident}")
    } else {
        ident
    }
}
