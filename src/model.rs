//! Code model
//!
//! Normalized structs and enums handed to the templates. Models are built in
//! two phases: enums first, which may extend the type rules, then tables
//! against the finished rule set.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::ident;
use crate::keys::{classify, AutoKeyConfig, PrimaryKey};
use crate::schema::{Column, PgEnum, Table};
use crate::typemap::{TypeRule, TypeRuleSet};

/// Struct field, one per column
#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub column: Column,
}

/// Record struct, one per table
#[derive(Debug, Clone)]
pub struct Struct {
    pub name: String,
    pub table: Table,
    pub primary_key: PrimaryKey,
    /// Same order as `table.columns`
    pub fields: Vec<Field>,
}

impl Struct {
    pub fn has_primary_key(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Primary key fields in catalog order
    pub fn primary_key_fields(&self) -> Vec<&Field> {
        self.primary_key
            .columns
            .iter()
            .map(|&i| &self.fields[i])
            .collect()
    }
}

/// Generated enum, one per database enum type
#[derive(Debug, Clone, Serialize)]
pub struct EnumType {
    pub name: String,
    /// Alias used for nullable columns of this enum
    pub nullable_name: String,
    pub pg_enum: PgEnum,
    pub values: Vec<EnumValue>,
}

/// One enum label
#[derive(Debug, Clone, Serialize)]
pub struct EnumValue {
    /// Name of the owning enum type
    pub type_name: String,
    /// Constant name, `<EnumTypeName>_<Label>`
    pub name: String,
    /// Variant name, `<Label>`
    pub variant: String,
    /// Label as stored in the database
    pub value: String,
}

/// Nullable type name registered for an enum
pub fn nullable_enum_type(type_name: &str) -> String {
    format!("Null{type_name}")
}

/// Build the model for one enum
///
/// Labels converting to an already used variant get a numeric suffix,
/// `in_progress` and `in-progress` become `InProgress` and `InProgress2`.
pub fn build_enum(pg_enum: &PgEnum) -> EnumType {
    let name = ident::type_name(&pg_enum.name);
    let mut used = HashSet::with_capacity(pg_enum.values.len());
    let values = pg_enum
        .values
        .iter()
        .map(|label| {
            let base = ident::type_name(label);
            let mut variant = base.clone();
            let mut suffix = 2;
            while !used.insert(variant.clone()) {
                variant = format!("{base}{suffix}");
                suffix += 1;
            }
            if variant != base {
                warn!(enum_name = ?pg_enum.name, label = ?label, variant = ?variant, "Renamed colliding enum variant");
            }

            EnumValue {
                type_name: name.clone(),
                name: format!("{name}_{variant}"),
                variant,
                value: label.clone(),
            }
        })
        .collect();

    EnumType {
        nullable_name: nullable_enum_type(&name),
        name,
        pg_enum: pg_enum.clone(),
        values,
    }
}

/// Build all enum models and register their types
///
/// Enums whose name is not yet a rule get one mapping the enum type to the
/// generated type, so table columns of that type resolve to it.
pub fn build_enums(enums: &[PgEnum], mut type_rules: TypeRuleSet) -> (Vec<EnumType>, TypeRuleSet) {
    let mut models = Vec::with_capacity(enums.len());

    for pg_enum in enums {
        let model = build_enum(pg_enum);
        debug!(enum_name = ?pg_enum.name, values = ?model.values.len(), "Built enum model");

        if !type_rules.contains(&pg_enum.name) {
            trace!(enum_name = ?pg_enum.name, type_name = ?model.name, "Registering enum type rule");
            type_rules.push(TypeRule::new(
                pg_enum.name.clone(),
                vec![pg_enum.db_type.clone()],
                model.name.clone(),
                model.nullable_name.clone(),
            ));
        }

        models.push(model);
    }

    (models, type_rules)
}

/// Builds table structs against a finished rule set
pub struct ModelBuilder<'a> {
    type_rules: &'a TypeRuleSet,
    auto_key: &'a AutoKeyConfig,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(type_rules: &'a TypeRuleSet, auto_key: &'a AutoKeyConfig) -> Self {
        Self {
            type_rules,
            auto_key,
        }
    }

    /// Build the struct for one table
    pub fn build_struct(&self, table: &Table) -> Struct {
        let primary_key = classify(&table.columns, self.auto_key);

        let fields = table
            .columns
            .iter()
            .map(|col| self.build_field(col))
            .collect();

        debug!(
            table = ?table.name,
            columns = ?table.columns.len(),
            primary_key = ?primary_key.columns,
            auto_generated = ?primary_key.auto_generated,
            "Built struct model"
        );

        Struct {
            name: ident::type_name(&table.name),
            table: table.clone(),
            primary_key,
            fields,
        }
    }

    fn build_field(&self, col: &Column) -> Field {
        Field {
            name: ident::field_name(&col.name),
            ty: self
                .type_rules
                .resolve(&col.data_type, col.not_null)
                .to_string(),
            column: col.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::IdentityKind;

    fn column(ordinal: i16, name: &str, data_type: &str, not_null: bool) -> Column {
        Column {
            ordinal,
            name: name.to_string(),
            data_type: data_type.to_string(),
            ddl_type: data_type.to_string(),
            not_null,
            default_value: None,
            is_primary_key: false,
            identity: IdentityKind::None,
        }
    }

    fn mood() -> PgEnum {
        PgEnum {
            schema: "public".to_string(),
            name: "mood".to_string(),
            db_type: "mood".to_string(),
            values: vec!["sad".to_string(), "very-happy".to_string()],
        }
    }

    #[test]
    fn test_build_struct() {
        let mut id = column(1, "id", "bigint", true);
        id.ddl_type = "bigserial".to_string();
        id.is_primary_key = true;
        let table = Table {
            schema: "public".to_string(),
            name: "user_accounts".to_string(),
            kind: "r".to_string(),
            columns: vec![
                id,
                column(2, "email", "text", true),
                column(3, "nickname", "character varying", false),
            ],
        };

        let rules = TypeRuleSet::builtin();
        let keys = AutoKeyConfig::default();
        let st = ModelBuilder::new(&rules, &keys).build_struct(&table);

        assert_eq!(st.name, "UserAccounts");
        let fields: Vec<_> = st.fields.iter().map(|f| (f.name.as_str(), f.ty.as_str())).collect();
        assert_eq!(
            fields,
            vec![("id", "i64"), ("email", "String"), ("nickname", "Option<String>")]
        );
        assert!(st.primary_key.auto_generated);
        assert_eq!(st.primary_key_fields()[0].name, "id");
    }

    #[test]
    fn test_build_enum() {
        let model = build_enum(&mood());
        assert_eq!(model.name, "Mood");
        assert_eq!(model.nullable_name, "NullMood");
        assert_eq!(model.values[0].name, "Mood_Sad");
        assert_eq!(model.values[1].name, "Mood_VeryHappy");
        assert_eq!(model.values[1].variant, "VeryHappy");
        assert_eq!(model.values[1].value, "very-happy");
        assert_eq!(model.values[1].type_name, "Mood");
    }

    #[test]
    fn test_build_enums_registers_type() {
        let (models, rules) = build_enums(&[mood()], TypeRuleSet::builtin());
        assert_eq!(models.len(), 1);
        assert_eq!(rules.resolve("mood", true), "Mood");
        assert_eq!(rules.resolve("mood", false), "NullMood");
    }

    #[test]
    fn test_build_enum_colliding_labels() {
        let mut status = mood();
        status.name = "status".to_string();
        status.values = vec![
            "in_progress".to_string(),
            "in-progress".to_string(),
            "InProgress2".to_string(),
            "done".to_string(),
        ];
        let model = build_enum(&status);
        let variants: Vec<_> = model.values.iter().map(|v| v.variant.as_str()).collect();
        assert_eq!(variants, vec!["InProgress", "InProgress2", "InProgress22", "Done"]);
        assert_eq!(model.values[1].name, "Status_InProgress2");
        assert_eq!(model.values[1].value, "in-progress");
    }

    #[test]
    fn test_build_enums_matches_formatted_type() {
        let qualified = PgEnum {
            schema: "app".to_string(),
            name: "mood".to_string(),
            db_type: "app.mood".to_string(),
            values: vec!["sad".to_string()],
        };
        let quoted = PgEnum {
            schema: "public".to_string(),
            name: "Weather".to_string(),
            db_type: "\"Weather\"".to_string(),
            values: vec!["sunny".to_string()],
        };
        let (_, rules) = build_enums(&[qualified, quoted], TypeRuleSet::builtin());

        let table = Table {
            schema: "app".to_string(),
            name: "diary".to_string(),
            kind: "r".to_string(),
            columns: vec![
                column(1, "m", "app.mood", true),
                column(2, "w", "\"Weather\"", false),
            ],
        };
        let keys = AutoKeyConfig::default();
        let st = ModelBuilder::new(&rules, &keys).build_struct(&table);
        let types: Vec<_> = st.fields.iter().map(|f| f.ty.as_str()).collect();
        assert_eq!(types, vec!["Mood", "NullWeather"]);
    }

    #[test]
    fn test_build_enums_keeps_existing_rule() {
        let base = TypeRuleSet::from_toml(
            r#"
            [[rule]]
            name = "mood"
            db_types = ["mood"]
            not_null_type = "String"
            nullable_type = "Option<String>"

            [[rule]]
            name = "default"
            db_types = ["*"]
            not_null_type = "String"
            nullable_type = "Option<String>"
            "#,
        )
        .unwrap();
        let (_, rules) = build_enums(&[mood()], base);
        assert_eq!(rules.resolve("mood", false), "Option<String>");
    }
}
