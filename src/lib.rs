//! # pgdao
//!
//! Generate typed data access code from PostgreSQL schemas
//!
//! This crate provides a CLI tool and library that read a schema's tables and
//! enum types from the catalog and render a Rust record struct plus insert,
//! conflict-skipping insert and select-by-primary-key functions for each
//! table.

pub mod codegen;
pub mod config;
pub mod error;
pub mod ident;
pub mod introspect;
pub mod keys;
pub mod model;
pub mod schema;
pub mod typemap;

pub mod prelude {
    pub use crate::codegen::{
        CodeGenConfig, Generator, PassthroughFormatter, Renderer, RustFormatter,
        SourceFormatter, TemplateHelpers,
    };
    pub use crate::config::ConnectionConfig;
    pub use crate::error::PgdaoError;
    pub use crate::introspect::{Introspector, TableFilter};
    pub use crate::keys::{AutoKeyConfig, PrimaryKey};
    pub use crate::model::{EnumType, Field, ModelBuilder, Struct};
    pub use crate::schema::{Column, IdentityKind, PgEnum, Schema, Table};
    pub use crate::typemap::{TypeRule, TypeRuleSet};
}

#[cfg(feature = "postgres")]
pub use introspect::PostgresIntrospector;
