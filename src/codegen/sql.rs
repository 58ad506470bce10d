//! SQL synthesis
//!
//! Builds the statement text for the generated CRUD functions, together with
//! the fields bound to each placeholder and the fields receiving returned
//! values. Placeholders are numbered from `$1` in column order; the binding
//! lists always follow the same order. Table and column names are quoted
//! unless they are plain lower case and not reserved.

use crate::model::{Field, Struct};

/// A parameter of the generated select-by-primary-key function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkParam<'a> {
    pub name: String,
    pub ty: &'a str,
}

/// Reserved key words of PostgreSQL, these need quotes as column names
const RESERVED_WORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric",
    "authorization", "binary", "both", "case", "cast", "check", "collate", "collation",
    "column", "concurrently", "constraint", "create", "cross", "current_catalog",
    "current_date", "current_role", "current_schema", "current_time", "current_timestamp",
    "current_user", "default", "deferrable", "desc", "distinct", "do", "else", "end",
    "except", "false", "fetch", "for", "foreign", "freeze", "from", "full", "grant", "group",
    "having", "ilike", "in", "initially", "inner", "intersect", "into", "is", "isnull", "join",
    "lateral", "leading", "left", "like", "limit", "localtime", "localtimestamp", "natural",
    "not", "notnull", "null", "offset", "on", "only", "or", "order", "outer", "overlaps",
    "placing", "primary", "references", "returning", "right", "select", "session_user",
    "similar", "some", "symmetric", "system_user", "table", "tablesample", "then", "to",
    "trailing", "true", "union", "unique", "user", "using", "variadic", "verbose", "when",
    "where", "window", "with",
];

/// Identifier as it must appear in SQL text: `userId` -> `"userId"`
fn quote_ident(name: &str) -> String {
    let plain = name.starts_with(|c: char| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !RESERVED_WORDS.contains(&name);

    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

fn column_names(fields: &[&Field]) -> Vec<String> {
    fields.iter().map(|f| quote_ident(&f.column.name)).collect()
}

struct InsertStatement {
    table: String,
    columns: Vec<String>,
    values: Vec<String>,
    returning: Vec<String>,
}

impl InsertStatement {
    fn new(st: &Struct) -> Self {
        let params = create_insert_params(st);
        let returning = column_names(&create_insert_scan(st));

        // Only the generated key remains, let the database fill it in
        let (columns, values) = if params.is_empty() && st.primary_key.auto_generated {
            let columns = column_names(&st.primary_key_fields());
            let values = vec!["DEFAULT".to_string(); columns.len()];
            (columns, values)
        } else {
            (column_names(&params), placeholders(params.len()))
        };

        Self {
            table: quote_ident(&st.table.name),
            columns,
            values,
            returning,
        }
    }

    fn render(&self, on_conflict_do_nothing: bool) -> String {
        let mut sql = format!("INSERT INTO {}", self.table);

        if self.columns.is_empty() {
            sql.push_str(" DEFAULT VALUES");
        } else {
            sql.push_str(&format!(
                " ({}) VALUES ({})",
                self.columns.join(", "),
                self.values.join(", ")
            ));
        }

        if on_conflict_do_nothing {
            sql.push_str(" ON CONFLICT DO NOTHING");
        }

        if !self.returning.is_empty() {
            sql.push_str(&format!(" RETURNING {}", self.returning.join(", ")));
        }

        sql
    }
}

fn placeholders(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("${i}")).collect()
}

/// `INSERT` statement for the struct's table
pub fn create_insert_sql(st: &Struct) -> String {
    InsertStatement::new(st).render(false)
}

/// `INSERT ... ON CONFLICT DO NOTHING` statement for the struct's table
pub fn create_insert_on_conflict_do_nothing_sql(st: &Struct) -> String {
    InsertStatement::new(st).render(true)
}

/// Fields bound to the insert placeholders, in placeholder order
///
/// Generated primary key columns are left to the database.
pub fn create_insert_params(st: &Struct) -> Vec<&Field> {
    st.fields
        .iter()
        .enumerate()
        .filter(|(i, _)| !(st.primary_key.auto_generated && st.primary_key.contains(*i)))
        .map(|(_, f)| f)
        .collect()
}

/// Fields receiving the insert's `RETURNING` values
pub fn create_insert_scan(st: &Struct) -> Vec<&Field> {
    if st.primary_key.auto_generated {
        st.primary_key_fields()
    } else {
        Vec::new()
    }
}

/// `SELECT` by primary key, `None` when the table has no primary key
pub fn create_select_by_pk_sql(st: &Struct) -> Option<String> {
    if !st.has_primary_key() {
        return None;
    }

    let columns = column_names(&create_select_by_pk_scan(st));
    let conditions: Vec<String> = st
        .primary_key_fields()
        .iter()
        .zip(placeholders(st.primary_key.columns.len()))
        .map(|(f, placeholder)| format!("{} = {}", quote_ident(&f.column.name), placeholder))
        .collect();

    Some(format!(
        "SELECT {} FROM {} WHERE {}",
        columns.join(", "),
        quote_ident(&st.table.name),
        conditions.join(" AND ")
    ))
}

/// Parameters of the select-by-primary-key function, `pk0`, `pk1`, ...
pub fn create_select_by_pk_func_params(st: &Struct) -> Vec<PkParam<'_>> {
    st.primary_key_fields()
        .into_iter()
        .enumerate()
        .map(|(i, f)| PkParam {
            name: format!("pk{i}"),
            ty: &f.ty,
        })
        .collect()
}

/// Arguments bound to the select placeholders, in placeholder order
pub fn create_select_by_pk_sql_params(st: &Struct) -> Vec<String> {
    create_select_by_pk_func_params(st)
        .into_iter()
        .map(|p| p.name)
        .collect()
}

/// Fields filled from a selected row, in column order
pub fn create_select_by_pk_scan(st: &Struct) -> Vec<&Field> {
    st.fields.iter().collect()
}
