//! Code generation
//!
//! Drives the pipeline from catalog to source text: enums are modeled and
//! rendered first, then every selected table, and the fragments are joined
//! under a single header.

use tracing::{debug, info};

use crate::introspect::{Introspector, TableFilter};
use crate::keys::AutoKeyConfig;
use crate::model::{build_enums, ModelBuilder};
use crate::prelude::{PgdaoError, Schema};
use crate::schema::PgEnum;
use crate::typemap::TypeRuleSet;

pub mod render;
pub mod sql;

pub use render::{
    PassthroughFormatter, Renderer, RustFormatter, SourceFormatter, TemplateHelpers,
    CUSTOM_ENUM_TEMPLATE, CUSTOM_TEMPLATE, ENUM_TEMPLATE, METHOD_TEMPLATE, STRUCT_TEMPLATE,
};

/// First line of every generated file
pub const GENERATED_MARKER: &str = "// Code generated by pgdao. DO NOT EDIT.";

/// Configuration for code generation
#[derive(Debug, Clone)]
pub struct CodeGenConfig {
    /// Database schema to load
    pub schema: String,
    /// Package name written into the header
    pub package: String,
    pub type_rules: TypeRuleSet,
    pub auto_key: AutoKeyConfig,
    pub filter: TableFilter,
    /// Tables and enums whose declarations are marked `#[deprecated]`
    pub deprecated: Vec<String>,
    /// Template source replacing the struct and method templates
    pub custom_template: Option<String>,
    /// Template source replacing the enum template
    pub custom_enum_template: Option<String>,
    pub include_enums: bool,
    /// Pretty-print every fragment as Rust
    pub format: bool,
}

impl Default for CodeGenConfig {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            package: "dao".to_string(),
            type_rules: TypeRuleSet::builtin(),
            auto_key: AutoKeyConfig::default(),
            filter: TableFilter::default(),
            deprecated: Vec::new(),
            custom_template: None,
            custom_enum_template: None,
            include_enums: true,
            format: true,
        }
    }
}

impl CodeGenConfig {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            ..Self::default()
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_type_rules(mut self, type_rules: TypeRuleSet) -> Self {
        self.type_rules = type_rules;
        self
    }

    pub fn with_auto_key(mut self, auto_key: AutoKeyConfig) -> Self {
        self.auto_key = auto_key;
        self
    }

    pub fn with_filter(mut self, filter: TableFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_deprecated(mut self, deprecated: Vec<String>) -> Self {
        self.deprecated = deprecated;
        self
    }

    pub fn with_custom_template(mut self, source: impl Into<String>) -> Self {
        self.custom_template = Some(source.into());
        self
    }

    pub fn with_custom_enum_template(mut self, source: impl Into<String>) -> Self {
        self.custom_enum_template = Some(source.into());
        self
    }

    pub fn with_include_enums(mut self, include_enums: bool) -> Self {
        self.include_enums = include_enums;
        self
    }

    pub fn with_format(mut self, format: bool) -> Self {
        self.format = format;
        self
    }

    fn is_deprecated(&self, name: &str) -> bool {
        self.deprecated.iter().any(|d| d == name)
    }
}

/// Generates data access code for a whole schema
pub struct Generator {
    config: CodeGenConfig,
    helpers: TemplateHelpers,
}

impl Generator {
    pub fn new(config: CodeGenConfig) -> Self {
        Self {
            config,
            helpers: TemplateHelpers::default(),
        }
    }

    /// Replace the SQL helpers exposed to templates
    pub fn with_helpers(mut self, helpers: TemplateHelpers) -> Self {
        self.helpers = helpers;
        self
    }

    pub fn config(&self) -> &CodeGenConfig {
        &self.config
    }

    /// Load the configured schema and generate its code
    pub fn generate(&self, introspector: &mut dyn Introspector) -> Result<Vec<u8>, PgdaoError> {
        let schema = introspector.introspect(&self.config.schema)?;
        self.generate_schema(&schema)
    }

    /// Generate code for an already loaded schema
    pub fn generate_schema(&self, schema: &Schema) -> Result<Vec<u8>, PgdaoError> {
        let config = &self.config;
        info!(
            schema = ?schema.name,
            tables = ?schema.tables.len(),
            enums = ?schema.enums.len(),
            "Generating code"
        );

        let mut renderer = Renderer::new(self.helpers);
        if let Some(source) = &config.custom_template {
            renderer = renderer.with_custom_template(source)?;
        }
        if let Some(source) = &config.custom_enum_template {
            renderer = renderer.with_custom_enum_template(source)?;
        }
        if !config.format {
            renderer = renderer.with_formatter(Box::new(PassthroughFormatter));
        }

        let enums: &[PgEnum] = if config.include_enums {
            schema.enums.as_slice()
        } else {
            &[]
        };
        let (enum_models, type_rules) = build_enums(enums, config.type_rules.clone());

        let mut fragments = Vec::with_capacity(enum_models.len() + schema.tables.len());
        for model in &enum_models {
            let deprecated = config.is_deprecated(&model.pg_enum.name);
            debug!(enum_name = ?model.pg_enum.name, deprecated = ?deprecated, "Rendering enum");
            fragments.push(renderer.render_enum(model, deprecated)?);
        }

        let builder = ModelBuilder::new(&type_rules, &config.auto_key);
        let mut rendered_tables = 0usize;
        for table in &schema.tables {
            if !config.filter.should_include(&table.name) {
                debug!(table = ?table.qualified_name(), "Skipping filtered table");
                continue;
            }

            let st = builder.build_struct(table);
            let deprecated = config.is_deprecated(&table.name);
            debug!(
                table = ?table.name,
                struct_name = ?st.name,
                deprecated = ?deprecated,
                "Rendering table"
            );
            if !st.has_primary_key() {
                debug!(table = ?table.name, "No primary key, select by primary key omitted");
            }

            if renderer.has_custom_template() {
                fragments.push(renderer.render_struct(CUSTOM_TEMPLATE, &st, deprecated)?);
            } else {
                let mut code = renderer.render_struct(STRUCT_TEMPLATE, &st, deprecated)?;
                code.push('\n');
                code.push_str(&renderer.render_struct(METHOD_TEMPLATE, &st, deprecated)?);
                fragments.push(code);
            }
            rendered_tables += 1;
        }

        let mut out = self.header(
            &schema.name,
            !enum_models.is_empty() && !renderer.has_custom_enum_template(),
            renderer.has_custom_template(),
        );
        out.push_str(&fragments.join("\n"));

        info!(
            tables = ?rendered_tables,
            enums = ?enum_models.len(),
            bytes = ?out.len(),
            "Code generation complete"
        );

        Ok(out.into_bytes())
    }

    fn header(&self, schema_name: &str, enum_imports: bool, custom: bool) -> String {
        let mut header = format!(
            "{GENERATED_MARKER}\n\n//! Package `{}`: data access for the `{}` schema.\n\n",
            self.config.package, schema_name
        );

        let mut imports = Vec::new();
        if !custom {
            imports.push("use postgres::GenericClient;");
        }
        if enum_imports {
            imports.push("use postgres_types::{FromSql, ToSql};");
        }
        if !imports.is_empty() {
            header.push_str(&imports.join("\n"));
            header.push_str("\n\n");
        }

        header
    }
}
