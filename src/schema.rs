//! Catalog data structures
//!
//! These types represent catalog metadata and form the contract between
//! introspection (produces) and the model builder (consumes). Ordering is
//! significant everywhere: columns and enum labels keep catalog order.

use serde::Serialize;

/// A complete database schema
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub name: String,
    pub tables: Vec<Table>,
    pub enums: Vec<PgEnum>,
}

/// Database table
#[derive(Debug, Clone, Serialize)]
pub struct Table {
    pub schema: String,
    pub name: String,
    /// Catalog relation kind (`r` for ordinary tables)
    pub kind: String,
    /// Columns in catalog ordinal order
    pub columns: Vec<Column>,
}

impl Table {
    /// Schema-qualified table name
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// Identity generation mode of a column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    #[default]
    None,
    /// `GENERATED ALWAYS AS IDENTITY`
    Always,
    /// `GENERATED BY DEFAULT AS IDENTITY`
    ByDefault,
}

impl IdentityKind {
    /// Parse the catalog's `attidentity` code
    pub fn from_catalog(code: &str) -> Self {
        match code {
            "a" => Self::Always,
            "d" => Self::ByDefault,
            _ => Self::None,
        }
    }

    pub fn is_identity(self) -> bool {
        self != Self::None
    }
}

/// A table column
#[derive(Debug, Clone, Serialize)]
pub struct Column {
    /// 1-based position within the table
    pub ordinal: i16,
    pub name: String,
    /// Native type with precision/scale stripped, e.g. `character varying`
    pub data_type: String,
    /// Declaration type used for key classification, e.g. `serial`
    pub ddl_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub is_primary_key: bool,
    pub identity: IdentityKind,
}

/// A custom enum type defined in the database
#[derive(Debug, Clone, Serialize)]
pub struct PgEnum {
    pub schema: String,
    pub name: String,
    /// Type name as the catalog formats it for columns, e.g. `app.mood` or `"Mood"`
    pub db_type: String,
    /// Labels in catalog sort order
    pub values: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_catalog() {
        assert_eq!(IdentityKind::from_catalog("a"), IdentityKind::Always);
        assert_eq!(IdentityKind::from_catalog("d"), IdentityKind::ByDefault);
        assert_eq!(IdentityKind::from_catalog(""), IdentityKind::None);
        assert!(!IdentityKind::None.is_identity());
        assert!(IdentityKind::ByDefault.is_identity());
    }

    #[test]
    fn test_qualified_name() {
        let table = Table {
            schema: "public".to_string(),
            name: "user_accounts".to_string(),
            kind: "r".to_string(),
            columns: vec![],
        };
        assert_eq!(table.qualified_name(), "public.user_accounts");
    }
}
