use postgres::Client;
use tracing::{debug, error, info, trace};

use super::{strip_type_modifiers, Introspector};
use crate::prelude::PgdaoError;
use crate::schema::{Column, IdentityKind, PgEnum, Schema, Table};

/// PostgreSQL catalog loader
pub struct PostgresIntrospector<'a> {
    client: &'a mut Client,
}

impl<'a> PostgresIntrospector<'a> {
    pub fn new(client: &'a mut Client) -> Self {
        Self { client }
    }
}

impl Introspector for PostgresIntrospector<'_> {
    fn introspect(&mut self, schema_name: &str) -> Result<Schema, PgdaoError> {
        info!(schema = ?schema_name, "Starting schema introspection");

        let enums = query_enums(self.client, schema_name)?;
        debug!(count = ?enums.len(), "Found enum types");

        let table_defs = query_tables(self.client, schema_name)?;
        debug!(count = ?table_defs.len(), "Found tables");

        let mut tables = Vec::with_capacity(table_defs.len());
        for (table_name, kind) in table_defs {
            debug!(table = ?table_name, "Introspecting table");

            let columns = query_columns(self.client, schema_name, &table_name)?;
            trace!(table = ?table_name, columns = ?columns.len(), "Found columns");

            tables.push(Table {
                schema: schema_name.to_string(),
                name: table_name,
                kind,
                columns,
            });
        }

        info!(
            schema = ?schema_name,
            tables = ?tables.len(),
            enums = ?enums.len(),
            "Schema introspection complete"
        );

        Ok(Schema {
            name: schema_name.to_string(),
            tables,
            enums,
        })
    }
}

fn catalog_error(schema_name: &str, message: String) -> PgdaoError {
    PgdaoError::Introspection {
        schema: schema_name.to_string(),
        message,
    }
}

/// Ordinary tables of a schema, by name
fn query_tables(client: &mut Client, schema_name: &str) -> Result<Vec<(String, String)>, PgdaoError> {
    trace!(schema = ?schema_name, "Querying tables");

    let sql = r#"
        SELECT
            c.relname AS table_name,
            c.relkind::text AS kind
        FROM pg_class c
        JOIN ONLY pg_namespace n ON n.oid = c.relnamespace
        WHERE n.nspname = $1
            AND c.relkind = 'r'
        ORDER BY c.relname
    "#;

    let rows = client.query(sql, &[&schema_name]).map_err(|e| {
        error!(schema = ?schema_name, error = ?e, "Failed to query tables");
        catalog_error(schema_name, format!("Failed to query tables: {}", e))
    })?;

    let tables: Vec<(String, String)> = rows
        .iter()
        .map(|row| (row.get("table_name"), row.get("kind")))
        .collect();
    trace!(tables = ?tables, "Tables found");
    Ok(tables)
}

/// Columns of a table in ordinal order
///
/// `ddl_type` reports serial columns under their declaration names and
/// uuid columns with a default as `autogenuuid`.
fn query_columns(
    client: &mut Client,
    schema_name: &str,
    table_name: &str,
) -> Result<Vec<Column>, PgdaoError> {
    trace!(schema = ?schema_name, table = ?table_name, "Querying columns");

    let sql = r#"
        SELECT
            a.attnum AS ordinal,
            a.attname AS column_name,
            format_type(a.atttypid, a.atttypmod) AS data_type,
            a.attnotnull AS not_null,
            pg_get_expr(ad.adbin, ad.adrelid) AS default_value,
            COALESCE(ct.contype = 'p', false) AS is_primary_key,
            a.attidentity::text AS identity,
            CASE
                WHEN a.atttypid = ANY ('{int,int8,int2}'::regtype[])
                    AND EXISTS (
                        SELECT 1 FROM pg_attrdef sd
                        WHERE sd.adrelid = a.attrelid
                            AND sd.adnum = a.attnum
                            AND pg_get_expr(sd.adbin, sd.adrelid) = 'nextval('''
                                || (pg_get_serial_sequence(a.attrelid::regclass::text, a.attname))::regclass
                                || '''::regclass)'
                    )
                    THEN CASE a.atttypid
                        WHEN 'int'::regtype THEN 'serial'
                        WHEN 'int8'::regtype THEN 'bigserial'
                        WHEN 'int2'::regtype THEN 'smallserial'
                    END
                WHEN a.atttypid = 'uuid'::regtype
                    AND COALESCE(pg_get_expr(ad.adbin, ad.adrelid), '') != ''
                    THEN 'autogenuuid'
                ELSE format_type(a.atttypid, a.atttypmod)
            END AS ddl_type
        FROM pg_attribute a
        JOIN ONLY pg_class c ON c.oid = a.attrelid
        JOIN ONLY pg_namespace n ON n.oid = c.relnamespace
        LEFT JOIN pg_constraint ct ON ct.conrelid = c.oid
            AND a.attnum = ANY(ct.conkey)
            AND ct.contype = 'p'
        LEFT JOIN pg_attrdef ad ON ad.adrelid = c.oid AND ad.adnum = a.attnum
        WHERE NOT a.attisdropped
            AND n.nspname = $1
            AND c.relname = $2
            AND a.attnum > 0
        ORDER BY a.attnum
    "#;

    let rows = client
        .query(sql, &[&schema_name, &table_name])
        .map_err(|e| {
            error!(
                schema = ?schema_name,
                table = ?table_name,
                error = ?e,
                "Failed to query columns"
            );
            catalog_error(
                schema_name,
                format!("Failed to query columns for table '{}': {}", table_name, e),
            )
        })?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let formatted: String = row.get("data_type");
        let ddl_type: String = row.get("ddl_type");
        let identity: String = row.get("identity");

        let column = Column {
            ordinal: row.get("ordinal"),
            name: row.get("column_name"),
            data_type: strip_type_modifiers(&formatted),
            ddl_type: strip_type_modifiers(&ddl_type),
            not_null: row.get("not_null"),
            default_value: row.get("default_value"),
            is_primary_key: row.get("is_primary_key"),
            identity: IdentityKind::from_catalog(&identity),
        };

        trace!(
            column = ?column.name,
            data_type = ?formatted,
            native_type = ?column.data_type,
            ddl_type = ?column.ddl_type,
            not_null = ?column.not_null,
            is_primary_key = ?column.is_primary_key,
            "Parsed column"
        );

        columns.push(column);
    }

    Ok(columns)
}

/// Enum types of a schema, labels in sort order
fn query_enums(client: &mut Client, schema_name: &str) -> Result<Vec<PgEnum>, PgdaoError> {
    trace!(schema = ?schema_name, "Querying enum types");

    let sql = r#"
        SELECT
            n.nspname AS schema,
            t.typname AS enum_name,
            format_type(t.oid, NULL) AS db_type,
            ARRAY(
                SELECT e.enumlabel::text
                FROM pg_enum e
                WHERE e.enumtypid = t.oid
                ORDER BY e.enumsortorder
            ) AS enum_values
        FROM pg_type t
        JOIN pg_namespace n ON n.oid = t.typnamespace
        WHERE t.typtype = 'e'
            AND n.nspname = $1
        ORDER BY t.typname
    "#;

    let rows = client.query(sql, &[&schema_name]).map_err(|e| {
        error!(schema = ?schema_name, error = ?e, "Failed to query enum types");
        catalog_error(schema_name, format!("Failed to query enums: {}", e))
    })?;

    let enums: Vec<PgEnum> = rows
        .iter()
        .map(|row| PgEnum {
            schema: row.get("schema"),
            name: row.get("enum_name"),
            db_type: row.get("db_type"),
            values: row.get("enum_values"),
        })
        .collect();

    for e in &enums {
        trace!(name = ?e.name, values = ?e.values, "Enum type");
    }

    Ok(enums)
}
