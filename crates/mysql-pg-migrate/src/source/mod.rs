//! MySQL source: connection pool, structure discovery and metadata loads.
//!
//! Uses SQLx for pooling and async queries. Metadata comes from
//! `information_schema` with explicit CASTs to CHAR, since some collations
//! make those views return VARBINARY and break string decoding.

use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlSslMode};
use sqlx::Row;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::core::quote_mysql_ident;
use crate::core::schema::{Column, ForeignKey, Index, IndexMethod, SourceTable, TableKind};
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// MySQL source connection pool.
#[derive(Clone)]
pub struct MysqlSource {
    pool: MySqlPool,
    database: String,
}

impl MysqlSource {
    /// Connect to the source database.
    pub async fn connect(config: &SourceConfig, max_conns: usize) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(MySqlSslMode::Preferred);

        let pool = MySqlPoolOptions::new()
            .max_connections(max_conns as u32)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::connect(e.to_string(), "creating MySQL source pool"))?;

        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| MigrateError::connect(e.to_string(), "testing MySQL source connection"))?;

        info!(
            "Connected to MySQL source: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            pool,
            database: config.database.clone(),
        })
    }

    /// Source database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// The underlying pool, for streaming reads in the data pipeline.
    pub(crate) fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Discover all tables and views with their full metadata.
    pub async fn discover(&self) -> Result<Vec<SourceTable>> {
        let sql = format!("SHOW FULL TABLES IN {}", quote_mysql_ident(&self.database));
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::Discovery(format!("{} ({})", e, sql)))?;

        let mut tables = Vec::new();
        for row in rows {
            let name: String = row
                .try_get(0)
                .map_err(|e| MigrateError::Discovery(e.to_string()))?;
            let table_type: String = row
                .try_get(1)
                .map_err(|e| MigrateError::Discovery(e.to_string()))?;
            let kind = if table_type.eq_ignore_ascii_case("VIEW") {
                TableKind::View
            } else {
                TableKind::BaseTable
            };

            let mut table = SourceTable {
                name,
                kind,
                columns: Vec::new(),
                indexes: Vec::new(),
                foreign_keys: Vec::new(),
                comment: None,
                row_count: 0,
                size_mb: 1.0,
                create_view: None,
            };

            self.load_columns(&mut table).await?;
            match kind {
                TableKind::BaseTable => {
                    self.load_stats(&mut table).await?;
                    self.load_indexes(&mut table).await?;
                    self.load_foreign_keys(&mut table).await?;
                }
                TableKind::View => {
                    self.load_view_definition(&mut table).await?;
                }
            }

            tables.push(table);
        }

        info!(
            "Discovered {} relations in MySQL database '{}'",
            tables.len(),
            self.database
        );
        Ok(tables)
    }

    /// Load columns in ordinal order, with the full type declaration.
    async fn load_columns(&self, table: &mut SourceTable) -> Result<()> {
        let query = r#"
            SELECT
                CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
                CAST(COLUMN_TYPE AS CHAR(1024)) AS COLUMN_TYPE,
                IF(IS_NULLABLE = 'YES', 1, 0) AS is_nullable,
                CAST(COLUMN_DEFAULT AS CHAR(2048)) AS COLUMN_DEFAULT,
                CAST(EXTRA AS CHAR(255)) AS EXTRA,
                CAST(COLUMN_COMMENT AS CHAR(2048)) AS COLUMN_COMMENT
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;

        let rows = sqlx::query(query)
            .bind(&self.database)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::Discovery(format!("loading columns: {}", e)))?;

        for row in rows {
            let comment: String = row
                .try_get("COLUMN_COMMENT")
                .map_err(|e| MigrateError::Discovery(e.to_string()))?;
            let col = Column {
                field: row
                    .try_get("COLUMN_NAME")
                    .map_err(|e| MigrateError::Discovery(e.to_string()))?,
                raw_type: row
                    .try_get("COLUMN_TYPE")
                    .map_err(|e| MigrateError::Discovery(e.to_string()))?,
                nullable: row.try_get::<i32, _>("is_nullable").unwrap_or(1) == 1,
                default: row
                    .try_get::<Option<String>, _>("COLUMN_DEFAULT")
                    .unwrap_or(None),
                extra: row.try_get("EXTRA").unwrap_or_default(),
                comment: if comment.is_empty() {
                    None
                } else {
                    Some(comment)
                },
            };
            table.columns.push(col);
        }

        debug!("Loaded {} columns for {}", table.columns.len(), table.name);
        Ok(())
    }

    /// Load size, row count and table comment.
    async fn load_stats(&self, table: &mut SourceTable) -> Result<()> {
        let query = r#"
            SELECT
                CAST(COALESCE(DATA_LENGTH, 0) + COALESCE(INDEX_LENGTH, 0) AS SIGNED) AS total_bytes,
                CAST(COALESCE(TABLE_COMMENT, '') AS CHAR(2048)) AS TABLE_COMMENT
            FROM INFORMATION_SCHEMA.TABLES
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
        "#;

        let row = sqlx::query(query)
            .bind(&self.database)
            .bind(&table.name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::Discovery(format!("loading table status: {}", e)))?;

        let total_bytes: i64 = row.try_get("total_bytes").unwrap_or(0);
        table.size_mb = (total_bytes as f64 / 1024.0 / 1024.0).max(1.0);

        let comment: String = row.try_get("TABLE_COMMENT").unwrap_or_default();
        table.comment = if comment.is_empty() {
            None
        } else {
            Some(comment)
        };

        let count_sql = format!(
            "SELECT COUNT(*) AS cnt FROM {}.{}",
            quote_mysql_ident(&self.database),
            quote_mysql_ident(&table.name)
        );
        let row = sqlx::query(&count_sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::Discovery(format!("counting rows: {}", e)))?;
        table.row_count = row.try_get::<i64, _>("cnt").unwrap_or(0);

        Ok(())
    }

    /// Load indexes, collapsing multi-column indexes by key name in
    /// `SEQ_IN_INDEX` order.
    async fn load_indexes(&self, table: &mut SourceTable) -> Result<()> {
        let query = r#"
            SELECT
                CAST(INDEX_NAME AS CHAR(255)) AS INDEX_NAME,
                CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
                IF(NON_UNIQUE = 0, 1, 0) AS is_unique,
                CAST(INDEX_TYPE AS CHAR(32)) AS INDEX_TYPE
            FROM INFORMATION_SCHEMA.STATISTICS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
            ORDER BY INDEX_NAME, SEQ_IN_INDEX
        "#;

        let rows = sqlx::query(query)
            .bind(&self.database)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::Discovery(format!("loading indexes: {}", e)))?;

        let mut parts = Vec::new();
        for row in rows {
            let key_name: String = row
                .try_get("INDEX_NAME")
                .map_err(|e| MigrateError::Discovery(e.to_string()))?;
            let column: String = row
                .try_get("COLUMN_NAME")
                .map_err(|e| MigrateError::Discovery(e.to_string()))?;
            let is_unique = row.try_get::<i32, _>("is_unique").unwrap_or(0) == 1;
            let index_type: String = row.try_get("INDEX_TYPE").unwrap_or_default();
            parts.push((key_name, column, is_unique, index_type));
        }

        table.indexes = fold_indexes(parts);

        debug!("Loaded {} indexes for {}", table.indexes.len(), table.name);
        Ok(())
    }

    /// Load foreign keys with their referential rules, grouped by
    /// constraint name in ordinal order.
    async fn load_foreign_keys(&self, table: &mut SourceTable) -> Result<()> {
        let query = r#"
            SELECT
                CAST(rc.CONSTRAINT_NAME AS CHAR(255)) AS CONSTRAINT_NAME,
                CAST(kcu.COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
                CAST(kcu.REFERENCED_TABLE_NAME AS CHAR(255)) AS REFERENCED_TABLE_NAME,
                CAST(kcu.REFERENCED_COLUMN_NAME AS CHAR(255)) AS REFERENCED_COLUMN_NAME,
                CAST(rc.UPDATE_RULE AS CHAR(32)) AS UPDATE_RULE,
                CAST(rc.DELETE_RULE AS CHAR(32)) AS DELETE_RULE
            FROM INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS rc
            JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu
                ON rc.CONSTRAINT_SCHEMA = kcu.CONSTRAINT_SCHEMA
                AND rc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME
                AND rc.TABLE_NAME = kcu.TABLE_NAME
            WHERE rc.CONSTRAINT_SCHEMA = ? AND rc.TABLE_NAME = ?
            ORDER BY rc.CONSTRAINT_NAME, kcu.ORDINAL_POSITION
        "#;

        let rows = sqlx::query(query)
            .bind(&self.database)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::Discovery(format!("loading foreign keys: {}", e)))?;

        let mut parts = Vec::new();
        for row in rows {
            parts.push(ForeignKeyPart {
                constraint_name: row
                    .try_get("CONSTRAINT_NAME")
                    .map_err(|e| MigrateError::Discovery(e.to_string()))?,
                column: row
                    .try_get("COLUMN_NAME")
                    .map_err(|e| MigrateError::Discovery(e.to_string()))?,
                ref_table: row.try_get("REFERENCED_TABLE_NAME").unwrap_or_default(),
                ref_column: row.try_get("REFERENCED_COLUMN_NAME").unwrap_or_default(),
                on_update: row.try_get("UPDATE_RULE").unwrap_or_default(),
                on_delete: row.try_get("DELETE_RULE").unwrap_or_default(),
            });
        }

        table.foreign_keys = fold_foreign_keys(parts);

        debug!(
            "Loaded {} foreign keys for {}",
            table.foreign_keys.len(),
            table.name
        );
        Ok(())
    }

    /// Fetch the raw `CREATE VIEW` text.
    async fn load_view_definition(&self, table: &mut SourceTable) -> Result<()> {
        let sql = format!(
            "SHOW CREATE VIEW {}.{}",
            quote_mysql_ident(&self.database),
            quote_mysql_ident(&table.name)
        );
        let row = sqlx::query(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::Discovery(format!("SHOW CREATE VIEW: {}", e)))?;
        table.create_view = row.try_get::<String, _>(1).ok();
        Ok(())
    }
}

/// One `SHOW INDEX`-shaped row before grouping.
type IndexPart = (String, String, bool, String);

/// Collapse per-column index rows into one `Index` per key name.
fn fold_indexes(parts: Vec<IndexPart>) -> Vec<Index> {
    let mut indexes: Vec<Index> = Vec::new();
    for (key_name, column, is_unique, index_type) in parts {
        match indexes.iter_mut().find(|i| i.key_name == key_name) {
            Some(index) => index.columns.push(column),
            None => indexes.push(Index {
                key_name,
                is_unique,
                method: IndexMethod::from_mysql(&index_type),
                columns: vec![column],
            }),
        }
    }
    indexes
}

/// One KEY_COLUMN_USAGE-shaped row before grouping.
struct ForeignKeyPart {
    constraint_name: String,
    column: String,
    ref_table: String,
    ref_column: String,
    on_update: String,
    on_delete: String,
}

/// Collapse per-column FK rows into one `ForeignKey` per constraint.
fn fold_foreign_keys(parts: Vec<ForeignKeyPart>) -> Vec<ForeignKey> {
    let mut fks: Vec<ForeignKey> = Vec::new();
    for part in parts {
        match fks
            .iter_mut()
            .find(|f| f.constraint_name == part.constraint_name)
        {
            Some(fk) => {
                fk.columns.push(part.column);
                fk.ref_columns.push(part.ref_column);
            }
            None => fks.push(ForeignKey {
                constraint_name: part.constraint_name,
                columns: vec![part.column],
                ref_table: part.ref_table,
                ref_columns: vec![part.ref_column],
                on_update: part.on_update,
                on_delete: part.on_delete,
            }),
        }
    }
    fks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_indexes_groups_by_key_name_preserving_order() {
        let parts = vec![
            ("PRIMARY".to_string(), "id".to_string(), true, "BTREE".to_string()),
            ("by_name".to_string(), "last".to_string(), false, "BTREE".to_string()),
            ("by_name".to_string(), "first".to_string(), false, "BTREE".to_string()),
        ];
        let indexes = fold_indexes(parts);
        assert_eq!(indexes.len(), 2);
        assert!(indexes[0].is_primary());
        assert_eq!(indexes[1].columns, vec!["last", "first"]);
        assert!(!indexes[1].is_unique);
    }

    #[test]
    fn test_fold_indexes_methods() {
        let parts = vec![
            ("geo".to_string(), "loc".to_string(), false, "SPATIAL".to_string()),
            ("ft".to_string(), "body".to_string(), false, "FULLTEXT".to_string()),
        ];
        let indexes = fold_indexes(parts);
        assert_eq!(indexes[0].method, IndexMethod::Spatial);
        assert_eq!(indexes[1].method, IndexMethod::FullText);
    }

    #[test]
    fn test_fold_foreign_keys_groups_composite() {
        let parts = vec![
            ForeignKeyPart {
                constraint_name: "fk_child".into(),
                column: "pa".into(),
                ref_table: "parent".into(),
                ref_column: "a".into(),
                on_update: "RESTRICT".into(),
                on_delete: "CASCADE".into(),
            },
            ForeignKeyPart {
                constraint_name: "fk_child".into(),
                column: "pb".into(),
                ref_table: "parent".into(),
                ref_column: "b".into(),
                on_update: "RESTRICT".into(),
                on_delete: "CASCADE".into(),
            },
        ];
        let fks = fold_foreign_keys(parts);
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].columns, vec!["pa", "pb"]);
        assert_eq!(fks[0].ref_columns, vec!["a", "b"]);
        assert_eq!(fks[0].on_delete, "CASCADE");
    }
}
