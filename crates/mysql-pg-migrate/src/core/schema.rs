//! Schema and metadata types for source tables, columns, indexes and
//! constraints.
//!
//! These types are populated once during discovery and treated as immutable
//! for the rest of the run.

use serde::{Deserialize, Serialize};

/// Whether a discovered relation is a base table or a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableKind {
    BaseTable,
    View,
}

/// A table or view discovered on the MySQL source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceTable {
    /// Relation name.
    pub name: String,

    /// Base table or view.
    pub kind: TableKind,

    /// Columns in `SHOW FULL COLUMNS` order.
    pub columns: Vec<Column>,

    /// Indexes collapsed from `SHOW INDEX` (one entry per key name,
    /// columns in `Seq_in_index` order). `PRIMARY` is the primary key.
    pub indexes: Vec<Index>,

    /// Foreign keys grouped by constraint name.
    pub foreign_keys: Vec<ForeignKey>,

    /// Table comment, when non-empty.
    pub comment: Option<String>,

    /// Row count at discovery time.
    pub row_count: i64,

    /// `(data_length + index_length) / 1024 / 1024`, floored at 1.
    pub size_mb: f64,

    /// Raw `SHOW CREATE VIEW` text for views.
    pub create_view: Option<String>,
}

impl SourceTable {
    /// The at-most-one auto-increment column.
    pub fn auto_increment_column(&self) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.extra.to_lowercase().contains("auto_increment"))
    }

    /// The primary key index, if the table has one.
    pub fn primary_key(&self) -> Option<&Index> {
        self.indexes.iter().find(|i| i.is_primary())
    }
}

/// Column metadata as reported by MySQL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub field: String,

    /// Full MySQL type declaration including parentheses and modifiers,
    /// e.g. `int(10) unsigned` or `enum('a','b')`.
    pub raw_type: String,

    /// Whether the column allows NULL (`Null = YES`).
    pub nullable: bool,

    /// Column default as reported by MySQL, when present.
    pub default: Option<String>,

    /// The `Extra` column (e.g. `auto_increment`).
    pub extra: String,

    /// Column comment, when non-empty.
    pub comment: Option<String>,
}

impl Column {
    /// The lowercase base type: the declaration with modifiers and any
    /// `(...)` suffix stripped, e.g. `int` for `int(10) unsigned`.
    pub fn base_type(&self) -> String {
        let decl = self
            .raw_type
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_lowercase();
        match decl.find('(') {
            Some(i) => decl[..i].to_string(),
            None => decl,
        }
    }

    /// Whether the MySQL declaration is an enum.
    pub fn is_enum(&self) -> bool {
        self.base_type() == "enum"
    }
}

/// Index access method as reported by `SHOW INDEX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexMethod {
    BTree,
    Hash,
    Spatial,
    FullText,
}

impl IndexMethod {
    /// Parse the MySQL `Index_type` value.
    pub fn from_mysql(index_type: &str) -> Self {
        match index_type.to_uppercase().as_str() {
            "HASH" => IndexMethod::Hash,
            "SPATIAL" => IndexMethod::Spatial,
            "FULLTEXT" => IndexMethod::FullText,
            _ => IndexMethod::BTree,
        }
    }

    /// The PostgreSQL `USING` clause for this method. SPATIAL maps to GIST
    /// and FULLTEXT to GIN, best effort.
    pub fn pg_using(&self) -> &'static str {
        match self {
            IndexMethod::BTree => "btree",
            IndexMethod::Hash => "hash",
            IndexMethod::Spatial => "gist",
            IndexMethod::FullText => "gin",
        }
    }
}

/// Index metadata. Multi-column indexes keep their column order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    /// MySQL key name; `PRIMARY` for the primary key.
    pub key_name: String,

    /// Whether the index is unique.
    pub is_unique: bool,

    /// Access method.
    pub method: IndexMethod,

    /// Indexed column names in `Seq_in_index` order.
    pub columns: Vec<String>,
}

impl Index {
    /// Whether this is the primary key.
    pub fn is_primary(&self) -> bool {
        self.key_name == "PRIMARY"
    }
}

/// Foreign key metadata, columns in ordinal order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub constraint_name: String,

    /// Referencing column names.
    pub columns: Vec<String>,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced column names.
    pub ref_columns: Vec<String>,

    /// ON UPDATE rule (CASCADE, SET NULL, RESTRICT, NO ACTION).
    pub on_update: String,

    /// ON DELETE rule.
    pub on_delete: String,
}

/// The migration plan assembled after discovery.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    /// Destination schema name (unique or operator-chosen).
    pub target_schema: String,

    /// Base tables to migrate.
    pub tables: Vec<SourceTable>,

    /// Views to port after data load.
    pub views: Vec<SourceTable>,

    /// Target chunk size in MB.
    pub chunk_target_mb: f64,
}

/// One line of the final summary report, appended once per table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRow {
    /// `schema.table` on the destination.
    pub qualified_name: String,

    /// Source row count at discovery time.
    pub rows_attempted: i64,

    /// `rows_attempted - rows actually copied`.
    pub rows_failed: i64,

    /// Wall-clock data load time in seconds.
    pub elapsed_seconds: f64,
}
