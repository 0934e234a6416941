//! Porting MySQL `CREATE VIEW` text to the PostgreSQL dialect.
//!
//! MySQL's `SHOW CREATE VIEW` output carries an `ALGORITHM`/`DEFINER`/`SQL
//! SECURITY` prefix, backtick identifier quoting and unqualified table
//! references. The rewriter strips the prefix, re-quotes identifiers and
//! qualifies every known relation with the target schema. Views using
//! MySQL-only syntax (`GROUP_CONCAT`, `IF()`, ...) are expected to fail at
//! issue time; the caller logs the DDL and moves on.

use crate::core::quote_ident;

/// Rewrite a MySQL `CREATE VIEW` statement for the destination.
///
/// `table_names` are all relations discovered on the source (tables and
/// views), used to schema-qualify references in the body.
pub fn rewrite_view(
    create_view_sql: &str,
    target_schema: &str,
    view_name: &str,
    source_db: &str,
    table_names: &[String],
) -> String {
    let body = match body_start(create_view_sql) {
        Some(at) => &create_view_sql[at..],
        None => create_view_sql,
    };

    // Drop source-database qualification before re-quoting.
    let mut body = body.replace(&format!("`{}`.", source_db), "");

    for name in table_names {
        body = body.replace(
            &format!("`{}`", name),
            &format!("{}.{}", quote_ident(target_schema), quote_ident(name)),
        );
    }

    let body = body.replace('`', "\"");

    format!(
        "CREATE VIEW {}.{} AS {}",
        quote_ident(target_schema),
        quote_ident(view_name),
        body
    )
}

/// Byte offset of the view body: just past the first ` AS ` following the
/// `VIEW` keyword.
fn body_start(sql: &str) -> Option<usize> {
    let upper = sql.to_uppercase();
    let view_at = upper.find("VIEW ")?;
    let as_at = upper[view_at..].find(" AS ")? + view_at;
    Some(as_at + 4)
}
