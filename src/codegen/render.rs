//! Template rendering
//!
//! Binds the code model and the SQL helpers into a minijinja environment,
//! renders a template and passes the result through a source formatter.

use std::sync::Arc;

use minijinja::value::{Enumerator, Object};
use minijinja::{AutoEscape, Environment, Error, ErrorKind, UndefinedBehavior, Value};
use tracing::trace;

use crate::codegen::sql::{self, PkParam};
use crate::error::PgdaoError;
use crate::ident;
use crate::model::{EnumType, Field, Struct};

pub const STRUCT_TEMPLATE: &str = "struct";
pub const METHOD_TEMPLATE: &str = "method";
pub const ENUM_TEMPLATE: &str = "enum";
pub const CUSTOM_TEMPLATE: &str = "custom";
pub const CUSTOM_ENUM_TEMPLATE: &str = "custom_enum";

/// SQL helpers exposed to templates under their field names
#[derive(Clone, Copy)]
pub struct TemplateHelpers {
    pub create_insert_sql: fn(&Struct) -> String,
    pub create_insert_on_conflict_do_nothing_sql: fn(&Struct) -> String,
    pub create_insert_params: fn(&Struct) -> Vec<&Field>,
    pub create_insert_scan: fn(&Struct) -> Vec<&Field>,
    pub create_select_by_pk_sql: fn(&Struct) -> Option<String>,
    pub create_select_by_pk_func_params: fn(&Struct) -> Vec<PkParam<'_>>,
    pub create_select_by_pk_sql_params: fn(&Struct) -> Vec<String>,
    pub create_select_by_pk_scan: fn(&Struct) -> Vec<&Field>,
}

impl Default for TemplateHelpers {
    fn default() -> Self {
        Self {
            create_insert_sql: sql::create_insert_sql,
            create_insert_on_conflict_do_nothing_sql: sql::create_insert_on_conflict_do_nothing_sql,
            create_insert_params: sql::create_insert_params,
            create_insert_scan: sql::create_insert_scan,
            create_select_by_pk_sql: sql::create_select_by_pk_sql,
            create_select_by_pk_func_params: sql::create_select_by_pk_func_params,
            create_select_by_pk_sql_params: sql::create_select_by_pk_sql_params,
            create_select_by_pk_scan: sql::create_select_by_pk_scan,
        }
    }
}

/// Post-processing applied to every rendered fragment
pub trait SourceFormatter {
    fn format(&self, source: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

/// Parses the fragment as a Rust file and pretty-prints it
#[derive(Debug, Default, Clone, Copy)]
pub struct RustFormatter;

impl SourceFormatter for RustFormatter {
    fn format(&self, source: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let file = syn::parse_file(source)?;
        Ok(prettyplease::unparse(&file))
    }
}

/// Leaves the fragment untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughFormatter;

impl SourceFormatter for PassthroughFormatter {
    fn format(&self, source: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        Ok(source.to_string())
    }
}

/// Struct model as seen by templates
#[derive(Debug)]
struct StructObject(Struct);

impl Object for StructObject {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let st = &self.0;
        let value = match key.as_str()? {
            "name" => Value::from(st.name.as_str()),
            "table" => Value::from_serialize(&st.table),
            "fields" => Value::from_serialize(&st.fields),
            "primary_keys" => Value::from_serialize(st.primary_key_fields()),
            "auto_gen_pk" => Value::from(st.primary_key.auto_generated),
            "has_primary_key" => Value::from(st.has_primary_key()),
            _ => return None,
        };
        Some(value)
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Str(&[
            "name",
            "table",
            "fields",
            "primary_keys",
            "auto_gen_pk",
            "has_primary_key",
        ])
    }
}

fn struct_arg(value: &Value) -> Result<&Struct, Error> {
    value
        .downcast_object_ref::<StructObject>()
        .map(|obj| &obj.0)
        .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, "expected a struct model"))
}

fn field_names(fields: Vec<&Field>) -> Vec<String> {
    fields.into_iter().map(|f| f.name.clone()).collect()
}

fn register_helpers(env: &mut Environment<'_>, helpers: TemplateHelpers) {
    env.add_function("create_insert_sql", move |st: Value| -> Result<String, Error> {
        Ok((helpers.create_insert_sql)(struct_arg(&st)?))
    });
    env.add_function(
        "create_insert_on_conflict_do_nothing_sql",
        move |st: Value| -> Result<String, Error> {
            Ok((helpers.create_insert_on_conflict_do_nothing_sql)(struct_arg(&st)?))
        },
    );
    env.add_function("create_insert_params", move |st: Value| -> Result<Vec<String>, Error> {
        Ok(field_names((helpers.create_insert_params)(struct_arg(&st)?)))
    });
    env.add_function("create_insert_scan", move |st: Value| -> Result<Vec<String>, Error> {
        Ok(field_names((helpers.create_insert_scan)(struct_arg(&st)?)))
    });
    env.add_function("create_select_by_pk_sql", move |st: Value| -> Result<String, Error> {
        let st = struct_arg(&st)?;
        (helpers.create_select_by_pk_sql)(st).ok_or_else(|| {
            Error::new(
                ErrorKind::InvalidOperation,
                format!("table '{}' has no primary key", st.table.name),
            )
        })
    });
    env.add_function(
        "create_select_by_pk_func_params",
        move |st: Value| -> Result<String, Error> {
            let params: Vec<String> = (helpers.create_select_by_pk_func_params)(struct_arg(&st)?)
                .into_iter()
                .map(|p| format!("{}: {}", p.name, p.ty))
                .collect();
            Ok(params.join(", "))
        },
    );
    env.add_function(
        "create_select_by_pk_sql_params",
        move |st: Value| -> Result<Vec<String>, Error> {
            Ok((helpers.create_select_by_pk_sql_params)(struct_arg(&st)?))
        },
    );
    env.add_function(
        "create_select_by_pk_scan",
        move |st: Value| -> Result<Vec<String>, Error> {
            Ok(field_names((helpers.create_select_by_pk_scan)(struct_arg(&st)?)))
        },
    );

    env.add_filter("rust_str", |s: String| format!("{s:?}"));
    env.add_filter("type_name", |s: String| ident::type_name(&s));
    env.add_filter("field_name", |s: String| ident::field_name(&s));
}

/// Renders structs and enums into formatted source fragments
pub struct Renderer<'source> {
    env: Environment<'source>,
    custom: bool,
    custom_enum: bool,
    formatter: Box<dyn SourceFormatter>,
}

impl<'source> Renderer<'source> {
    pub fn new(helpers: TemplateHelpers) -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);

        env.add_template(STRUCT_TEMPLATE, include_str!("templates/struct.rs.jinja"))
            .expect("Failed to load struct template");
        env.add_template(METHOD_TEMPLATE, include_str!("templates/method.rs.jinja"))
            .expect("Failed to load method template");
        env.add_template(ENUM_TEMPLATE, include_str!("templates/enum.rs.jinja"))
            .expect("Failed to load enum template");

        register_helpers(&mut env, helpers);

        Self {
            env,
            custom: false,
            custom_enum: false,
            formatter: Box::new(RustFormatter),
        }
    }

    /// Use a caller supplied template for tables
    pub fn with_custom_template(mut self, source: &'source str) -> Result<Self, PgdaoError> {
        self.env
            .add_template(CUSTOM_TEMPLATE, source)
            .map_err(|e| render_error(CUSTOM_TEMPLATE, "Template error", &e))?;
        self.custom = true;
        Ok(self)
    }

    /// Use a caller supplied template for enums
    pub fn with_custom_enum_template(mut self, source: &'source str) -> Result<Self, PgdaoError> {
        self.env
            .add_template(CUSTOM_ENUM_TEMPLATE, source)
            .map_err(|e| render_error(CUSTOM_ENUM_TEMPLATE, "Template error", &e))?;
        self.custom_enum = true;
        Ok(self)
    }

    pub fn with_formatter(mut self, formatter: Box<dyn SourceFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn has_custom_template(&self) -> bool {
        self.custom
    }

    pub fn has_custom_enum_template(&self) -> bool {
        self.custom_enum
    }

    /// Render one template for a table struct
    pub fn render_struct(
        &self,
        template: &str,
        st: &Struct,
        deprecated: bool,
    ) -> Result<String, PgdaoError> {
        let ctx = Value::from_iter([
            ("struct", Value::from_object(StructObject(st.clone()))),
            ("deprecated", Value::from(deprecated)),
        ]);
        self.render(template, &st.table.name, ctx)
    }

    /// Render the enum template, the custom one when set
    pub fn render_enum(&self, model: &EnumType, deprecated: bool) -> Result<String, PgdaoError> {
        let ctx = Value::from_iter([
            ("enum", Value::from_serialize(model)),
            ("deprecated", Value::from(deprecated)),
        ]);
        let template = if self.custom_enum {
            CUSTOM_ENUM_TEMPLATE
        } else {
            ENUM_TEMPLATE
        };
        self.render(template, &model.pg_enum.name, ctx)
    }

    fn render(&self, template: &str, item: &str, ctx: Value) -> Result<String, PgdaoError> {
        let tmpl = self
            .env
            .get_template(template)
            .map_err(|e| render_error(item, "Template error", &e))?;

        let source = tmpl
            .render(ctx)
            .map_err(|e| render_error(item, "Render error", &e))?;
        trace!(item = ?item, template = ?template, bytes = ?source.len(), "Rendered template");

        self.formatter
            .format(&source)
            .map_err(|e| PgdaoError::Format {
                item: item.to_string(),
                message: e.to_string(),
                fragment: source,
            })
    }
}

fn render_error(item: &str, stage: &str, e: &Error) -> PgdaoError {
    PgdaoError::Render {
        item: item.to_string(),
        message: format!("{stage}: {e}"),
    }
}
