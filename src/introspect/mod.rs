//! Catalog introspection
//!
//! Extracts tables, columns and enum types from the database catalog. The
//! PostgreSQL loader is feature-gated; anything else implementing
//! [`Introspector`] can feed the generator.

use crate::prelude::{PgdaoError, Schema};

/// Table selection applied by the generator
#[derive(Debug, Default, Clone)]
pub struct TableFilter {
    /// Only include these tables (if Some)
    pub include: Option<Vec<String>>,
    /// Exclude these tables
    pub exclude: Option<Vec<String>>,
}

impl TableFilter {
    pub fn with_include(mut self, include: Vec<String>) -> Self {
        self.include = Some(include);
        self
    }

    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = Some(exclude);
        self
    }

    /// Check if a table should be included
    pub fn should_include(&self, table_name: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.iter().any(|t| t == table_name) {
                return false;
            }
        }

        if let Some(exclude) = &self.exclude {
            if exclude.iter().any(|t| t == table_name) {
                return false;
            }
        }

        true
    }
}

/// Source of catalog metadata
pub trait Introspector {
    /// Load every ordinary table and enum type of a schema, in catalog order
    fn introspect(&mut self, schema_name: &str) -> Result<Schema, PgdaoError>;
}

/// Remove parenthesized type modifiers, wherever they appear
///
/// `character varying(255)[]` becomes `character varying[]` and
/// `timestamp(3) with time zone` becomes `timestamp with time zone`.
pub fn strip_type_modifiers(formatted: &str) -> String {
    let mut out = String::with_capacity(formatted.len());
    let mut depth = 0usize;

    for ch in formatted.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }

    // Collapse whitespace left around removed modifiers
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PostgresIntrospector;
