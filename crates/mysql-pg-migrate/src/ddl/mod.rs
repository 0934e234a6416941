//! DDL emission for the destination schema.
//!
//! `CREATE TABLE` and the table comment run before data load; everything
//! else (NOT NULL, defaults, enum checks, column comments, sequences,
//! indexes) is deferred until after the table is populated. Only the
//! `CREATE TABLE` failure is fatal; deferred statements log and continue.
//!
//! Statement text is produced by pure builders so the exact SQL is
//! unit-testable without a server.

use crate::core::schema::{Column, ForeignKey, SourceTable};
use crate::core::{qualify, quote_ident, quote_literal};
use crate::error::{MigrateError, Result};
use crate::logging::Logger;
use crate::target::PgTarget;
use crate::typemap;

/// MySQL spatial bases the engine migrates as WKB payloads.
fn is_spatial(base: &str) -> bool {
    matches!(base, "geometry" | "point" | "linestring" | "polygon")
}

/// The destination type for one column.
///
/// Spatial columns are declared BYTEA: the pipeline ships them as hex WKB,
/// which COPY only accepts into bytea.
pub fn column_type(column: &Column) -> Result<String> {
    if is_spatial(&column.base_type()) {
        return Ok("BYTEA".to_string());
    }
    typemap::map(&column.raw_type).map(|m| m.pg_type.trim().to_string())
}

/// Build the `CREATE TABLE` statement, columns in source order.
pub fn build_create_table(schema: &str, table: &SourceTable) -> Result<String> {
    let mut defs = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        defs.push(format!(
            "{} {}",
            quote_ident(&column.field),
            column_type(column)?
        ));
    }
    Ok(format!(
        "CREATE TABLE {} ({})",
        qualify(schema, &table.name),
        defs.join(", ")
    ))
}

/// Map a MySQL column default onto a PostgreSQL default expression.
pub fn map_default(column: &Column, default: &str) -> String {
    let trimmed = default.trim();
    let upper = trimmed.to_uppercase();
    let canonical = match upper.find('(') {
        Some(i) => upper[..i].trim_end().to_string(),
        None => upper.clone(),
    };

    if canonical == "NULL" {
        return "NULL".to_string();
    }
    if matches!(
        canonical.as_str(),
        "CURRENT_TIMESTAMP" | "CURRENT_DATE" | "CURRENT_TIME" | "LOCALTIME" | "LOCALTIMESTAMP"
    ) {
        return canonical;
    }
    if matches!(canonical.as_str(), "UTC_DATE" | "UTC_TIME" | "UTC_TIMESTAMP") {
        return format!("({} AT TIME ZONE 'UTC')", canonical);
    }

    let unquoted = trimmed
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(trimmed);

    if unquoted == "0000-00-00" || unquoted == "0000-00-00 00:00:00" {
        return "'-INFINITY'".to_string();
    }

    if column.base_type() == "bit" && trimmed.starts_with("b'") && trimmed.ends_with('\'') {
        return format!("{}::bit", &trimmed[1..]);
    }

    if trimmed.parse::<f64>().is_ok() {
        return trimmed.to_string();
    }

    quote_literal(unquoted)
}

/// The verbatim value list of an `enum(...)` declaration.
pub fn enum_values(raw_type: &str) -> Option<&str> {
    let t = raw_type.trim();
    if t.len() > 6 && t[..5].eq_ignore_ascii_case("enum(") && t.ends_with(')') {
        Some(&t[5..t.len() - 1])
    } else {
        None
    }
}

/// Build the enum membership check for a column, if it is an enum.
pub fn build_enum_check(schema: &str, table_name: &str, column: &Column) -> Option<String> {
    enum_values(&column.raw_type).map(|values| {
        format!(
            "ALTER TABLE {} ADD CHECK ({} IN ({}))",
            qualify(schema, table_name),
            quote_ident(&column.field),
            values
        )
    })
}

/// The four statements wiring a sequence to an auto-increment column.
///
/// SETVAL is strict: an empty table yields NULL and leaves the fresh
/// sequence at 1, otherwise NEXTVAL continues at MAX+1.
pub fn build_sequence_statements(schema: &str, table_name: &str, col_name: &str) -> [String; 4] {
    let seq = qualify(schema, &format!("{}_{}_seq", table_name, col_name));
    let table = qualify(schema, table_name);
    let col = quote_ident(col_name);
    [
        format!("CREATE SEQUENCE {}", seq),
        format!(
            "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT NEXTVAL('{}')",
            table, col, seq
        ),
        format!("ALTER SEQUENCE {} OWNED BY {}.{}", seq, table, col),
        format!(
            "SELECT SETVAL('{}', (SELECT MAX({}) FROM {}))",
            seq, col, table
        ),
    ]
}

/// Index statements: primary key first-class, unique as constraints, the
/// rest as `CREATE INDEX ... USING <method>`. A per-table counter keeps
/// generated names unique.
pub fn build_index_statements(schema: &str, table: &SourceTable) -> Vec<String> {
    let qualified = qualify(schema, &table.name);
    let mut statements = Vec::new();
    let mut counter = 0usize;

    for index in &table.indexes {
        let cols = index
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        if index.is_primary() {
            statements.push(format!("ALTER TABLE {} ADD PRIMARY KEY ({})", qualified, cols));
            continue;
        }

        let name = format!(
            "{}_{}_{}{}_idx",
            schema, table.name, index.columns[0], counter
        );
        counter += 1;

        if index.is_unique {
            statements.push(format!(
                "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
                qualified,
                quote_ident(&name),
                cols
            ));
        } else {
            statements.push(format!(
                "CREATE INDEX {} ON {} USING {} ({})",
                quote_ident(&name),
                qualified,
                index.method.pg_using(),
                cols
            ));
        }
    }

    statements
}

fn referential_rule(rule: &str) -> &str {
    if rule.is_empty() {
        "NO ACTION"
    } else {
        rule
    }
}

/// Build one `ADD FOREIGN KEY` statement.
pub fn build_foreign_key_statement(schema: &str, table_name: &str, fk: &ForeignKey) -> String {
    let cols = fk
        .columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let ref_cols = fk
        .ref_columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "ALTER TABLE {} ADD FOREIGN KEY ({}) REFERENCES {} ({}) ON UPDATE {} ON DELETE {}",
        qualify(schema, table_name),
        cols,
        qualify(schema, &fk.ref_table),
        ref_cols,
        referential_rule(&fk.on_update),
        referential_rule(&fk.on_delete)
    )
}

/// Emits DDL against the destination for one schema.
pub struct DdlEmitter<'a> {
    pub target: &'a PgTarget,
    pub schema: &'a str,
    pub logger: &'a Logger,
}

impl DdlEmitter<'_> {
    /// Create the table. Failure is fatal for the run.
    pub async fn create_table(&self, table: &SourceTable) -> Result<()> {
        let sql = build_create_table(self.schema, table)?;
        self.target
            .execute(&sql)
            .await
            .map_err(|e| MigrateError::TableCreate {
                table: table.name.clone(),
                sql: sql.clone(),
                message: e.to_string(),
            })?;
        self.logger
            .info(&format!("created table {}.{}", self.schema, table.name));
        Ok(())
    }

    /// Install the table comment, if any. Non-fatal.
    pub async fn table_comment(&self, table: &SourceTable) {
        let Some(comment) = &table.comment else {
            return;
        };
        let sql = format!(
            "COMMENT ON TABLE {} IS {}",
            qualify(self.schema, &table.name),
            quote_literal(comment)
        );
        self.run_deferred(&table.name, &sql).await;
    }

    /// Apply all deferred statements for a populated table. Returns the
    /// number of failed statements.
    pub async fn deferred_ddl(&self, table: &SourceTable) -> usize {
        let mut failures = 0usize;
        let qualified = qualify(self.schema, &table.name);

        for column in &table.columns {
            if !column.nullable {
                let sql = format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET NOT NULL",
                    qualified,
                    quote_ident(&column.field)
                );
                if !self.run_deferred(&table.name, &sql).await {
                    failures += 1;
                }
            }
            if let Some(default) = &column.default {
                let sql = format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {}",
                    qualified,
                    quote_ident(&column.field),
                    map_default(column, default)
                );
                if !self.run_deferred(&table.name, &sql).await {
                    failures += 1;
                }
            }
            if let Some(sql) = build_enum_check(self.schema, &table.name, column) {
                if !self.run_deferred(&table.name, &sql).await {
                    failures += 1;
                }
            }
            if let Some(comment) = &column.comment {
                let sql = format!(
                    "COMMENT ON COLUMN {}.{} IS {}",
                    qualified,
                    quote_ident(&column.field),
                    quote_literal(comment)
                );
                if !self.run_deferred(&table.name, &sql).await {
                    failures += 1;
                }
            }
        }

        if let Some(column) = table.auto_increment_column() {
            for sql in build_sequence_statements(self.schema, &table.name, &column.field) {
                if !self.run_deferred(&table.name, &sql).await {
                    // The remaining sequence steps depend on this one.
                    failures += 1;
                    break;
                }
            }
        }

        for sql in build_index_statements(self.schema, table) {
            if !self.run_deferred(&table.name, &sql).await {
                failures += 1;
            }
        }

        failures
    }

    /// Install all foreign keys for a table. Non-fatal; returns failures.
    pub async fn foreign_keys(&self, table: &SourceTable) -> usize {
        let mut failures = 0usize;
        for fk in &table.foreign_keys {
            let sql = build_foreign_key_statement(self.schema, &table.name, fk);
            if let Err(e) = self.target.execute(&sql).await {
                self.logger.error(
                    &MigrateError::foreign_key(&table.name, &sql, e.to_string()).to_string(),
                );
                failures += 1;
            }
        }
        failures
    }

    async fn run_deferred(&self, table_name: &str, sql: &str) -> bool {
        match self.target.execute(sql).await {
            Ok(_) => true,
            Err(e) => {
                self.logger.error(
                    &MigrateError::deferred_ddl(table_name, sql, e.to_string()).to_string(),
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{Index, IndexMethod, TableKind};

    fn column(field: &str, raw_type: &str) -> Column {
        Column {
            field: field.to_string(),
            raw_type: raw_type.to_string(),
            nullable: true,
            default: None,
            extra: String::new(),
            comment: None,
        }
    }

    fn table(name: &str, columns: Vec<Column>) -> SourceTable {
        SourceTable {
            name: name.to_string(),
            kind: TableKind::BaseTable,
            columns,
            indexes: vec![],
            foreign_keys: vec![],
            comment: None,
            row_count: 0,
            size_mb: 1.0,
            create_view: None,
        }
    }

    #[test]
    fn test_create_table_statement() {
        let t = table(
            "t",
            vec![
                column("a", "tinyint(3) unsigned"),
                column("b", "varchar(10)"),
            ],
        );
        let sql = build_create_table("db", &t).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE \"db\".\"t\" (\"a\" INT, \"b\" CHARACTER VARYING(10))"
        );
    }

    #[test]
    fn test_create_table_spatial_lands_as_bytea() {
        let t = table("geo", vec![column("shape", "geometry")]);
        let sql = build_create_table("db", &t).unwrap();
        assert_eq!(sql, "CREATE TABLE \"db\".\"geo\" (\"shape\" BYTEA)");
    }

    #[test]
    fn test_create_table_unknown_type_fails() {
        let t = table("t", vec![column("a", "frobnicator")]);
        assert!(matches!(
            build_create_table("db", &t),
            Err(MigrateError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_map_default_temporal_functions() {
        let c = column("d", "timestamp");
        assert_eq!(map_default(&c, "CURRENT_TIMESTAMP"), "CURRENT_TIMESTAMP");
        assert_eq!(map_default(&c, "CURRENT_TIMESTAMP(6)"), "CURRENT_TIMESTAMP");
        assert_eq!(map_default(&c, "current_date"), "CURRENT_DATE");
        assert_eq!(map_default(&c, "LOCALTIME"), "LOCALTIME");
        assert_eq!(
            map_default(&c, "UTC_TIMESTAMP"),
            "(UTC_TIMESTAMP AT TIME ZONE 'UTC')"
        );
    }

    #[test]
    fn test_map_default_zero_dates_become_infinity() {
        let c = column("d", "datetime");
        assert_eq!(map_default(&c, "0000-00-00 00:00:00"), "'-INFINITY'");
        assert_eq!(map_default(&c, "'0000-00-00'"), "'-INFINITY'");
    }

    #[test]
    fn test_map_default_literals() {
        let c = column("n", "int(11)");
        assert_eq!(map_default(&c, "0"), "0");
        assert_eq!(map_default(&c, "-12.5"), "-12.5");
        assert_eq!(map_default(&c, "NULL"), "NULL");

        let s = column("s", "varchar(20)");
        assert_eq!(map_default(&s, "pending"), "'pending'");
        assert_eq!(map_default(&s, "it's"), "'it''s'");
    }

    #[test]
    fn test_map_default_bit() {
        let c = column("flags", "bit(3)");
        assert_eq!(map_default(&c, "b'101'"), "'101'::bit");
    }

    #[test]
    fn test_enum_check() {
        let c = column("c", "enum('a','b','c')");
        let sql = build_enum_check("db", "t", &c).unwrap();
        assert_eq!(
            sql,
            "ALTER TABLE \"db\".\"t\" ADD CHECK (\"c\" IN ('a','b','c'))"
        );
        assert!(build_enum_check("db", "t", &column("c", "varchar(3)")).is_none());
    }

    #[test]
    fn test_sequence_statements() {
        let [create, default, owned, setval] = build_sequence_statements("db", "t", "id");
        assert_eq!(create, "CREATE SEQUENCE \"db\".\"t_id_seq\"");
        assert_eq!(
            default,
            "ALTER TABLE \"db\".\"t\" ALTER COLUMN \"id\" SET DEFAULT NEXTVAL('\"db\".\"t_id_seq\"')"
        );
        assert_eq!(
            owned,
            "ALTER SEQUENCE \"db\".\"t_id_seq\" OWNED BY \"db\".\"t\".\"id\""
        );
        assert_eq!(
            setval,
            "SELECT SETVAL('\"db\".\"t_id_seq\"', (SELECT MAX(\"id\") FROM \"db\".\"t\"))"
        );
    }

    #[test]
    fn test_index_statements() {
        let mut t = table("t", vec![]);
        t.indexes = vec![
            Index {
                key_name: "PRIMARY".into(),
                is_unique: true,
                method: IndexMethod::BTree,
                columns: vec!["id".into()],
            },
            Index {
                key_name: "uniq_email".into(),
                is_unique: true,
                method: IndexMethod::BTree,
                columns: vec!["email".into()],
            },
            Index {
                key_name: "geo".into(),
                is_unique: false,
                method: IndexMethod::Spatial,
                columns: vec!["loc".into()],
            },
            Index {
                key_name: "search".into(),
                is_unique: false,
                method: IndexMethod::FullText,
                columns: vec!["body".into()],
            },
        ];
        let stmts = build_index_statements("db", &t);
        assert_eq!(stmts[0], "ALTER TABLE \"db\".\"t\" ADD PRIMARY KEY (\"id\")");
        assert_eq!(
            stmts[1],
            "ALTER TABLE \"db\".\"t\" ADD CONSTRAINT \"db_t_email0_idx\" UNIQUE (\"email\")"
        );
        assert_eq!(
            stmts[2],
            "CREATE INDEX \"db_t_loc1_idx\" ON \"db\".\"t\" USING gist (\"loc\")"
        );
        assert_eq!(
            stmts[3],
            "CREATE INDEX \"db_t_body2_idx\" ON \"db\".\"t\" USING gin (\"body\")"
        );
    }

    #[test]
    fn test_index_names_unique_even_for_same_first_column() {
        let mut t = table("t", vec![]);
        t.indexes = vec![
            Index {
                key_name: "i1".into(),
                is_unique: false,
                method: IndexMethod::BTree,
                columns: vec!["a".into(), "b".into()],
            },
            Index {
                key_name: "i2".into(),
                is_unique: false,
                method: IndexMethod::BTree,
                columns: vec!["a".into(), "c".into()],
            },
        ];
        let stmts = build_index_statements("db", &t);
        assert!(stmts[0].contains("\"db_t_a0_idx\""));
        assert!(stmts[1].contains("\"db_t_a1_idx\""));
    }

    #[test]
    fn test_foreign_key_statement() {
        let fk = ForeignKey {
            constraint_name: "fk_child_parent".into(),
            columns: vec!["pid".into()],
            ref_table: "parent".into(),
            ref_columns: vec!["id".into()],
            on_update: "RESTRICT".into(),
            on_delete: "CASCADE".into(),
        };
        let sql = build_foreign_key_statement("db", "child", &fk);
        assert_eq!(
            sql,
            "ALTER TABLE \"db\".\"child\" ADD FOREIGN KEY (\"pid\") REFERENCES \"db\".\"parent\" (\"id\") \
             ON UPDATE RESTRICT ON DELETE CASCADE"
        );
    }

    #[test]
    fn test_foreign_key_empty_rules_default_to_no_action() {
        let fk = ForeignKey {
            constraint_name: "fk".into(),
            columns: vec!["a".into()],
            ref_table: "p".into(),
            ref_columns: vec!["id".into()],
            on_update: String::new(),
            on_delete: String::new(),
        };
        let sql = build_foreign_key_statement("db", "c", &fk);
        assert!(sql.ends_with("ON UPDATE NO ACTION ON DELETE NO ACTION"));
    }
}
