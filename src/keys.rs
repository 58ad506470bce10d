//! Primary key classification
//!
//! Decides which primary key columns are generated by the database and which
//! must be supplied by the caller on insert.

use serde::Serialize;
use tracing::trace;

use crate::schema::Column;

/// DDL types the database fills in on insert
pub const DEFAULT_AUTOGEN_TYPES: &[&str] = &["smallserial", "serial", "bigserial", "autogenuuid"];

/// Auto-generated key policy
#[derive(Debug, Clone)]
pub struct AutoKeyConfig {
    /// DDL type tokens considered self-generating
    pub types: Vec<String>,
    /// Treat identity columns as auto-generated
    pub identity_as_primary_key: bool,
}

impl Default for AutoKeyConfig {
    fn default() -> Self {
        Self {
            types: DEFAULT_AUTOGEN_TYPES.iter().map(|t| t.to_string()).collect(),
            identity_as_primary_key: false,
        }
    }
}

impl AutoKeyConfig {
    pub fn with_types(mut self, types: Vec<String>) -> Self {
        self.types = types;
        self
    }

    pub fn with_identity_as_primary_key(mut self, enabled: bool) -> Self {
        self.identity_as_primary_key = enabled;
        self
    }

    /// Check if the database generates this column's value
    pub fn is_auto_generated(&self, column: &Column) -> bool {
        self.types.iter().any(|t| t == &column.ddl_type)
            || (self.identity_as_primary_key && column.identity.is_identity())
    }
}

/// Primary key of a table, derived once from its columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrimaryKey {
    /// Indices into the table's columns, in catalog order
    pub columns: Vec<usize>,
    /// Every key column is generated by the database
    pub auto_generated: bool,
}

impl PrimaryKey {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.columns.contains(&index)
    }
}

/// Classify the primary key of a table
pub fn classify(columns: &[Column], config: &AutoKeyConfig) -> PrimaryKey {
    let key_columns: Vec<usize> = columns
        .iter()
        .enumerate()
        .filter(|(_, col)| col.is_primary_key)
        .map(|(i, _)| i)
        .collect();

    let auto_generated = !key_columns.is_empty()
        && key_columns
            .iter()
            .all(|&i| config.is_auto_generated(&columns[i]));

    trace!(columns = ?key_columns, auto_generated = ?auto_generated, "Classified primary key");

    PrimaryKey {
        columns: key_columns,
        auto_generated,
    }
}
