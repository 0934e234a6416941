//! # mysql-pg-migrate
//!
//! MySQL to PostgreSQL structure-and-data migration library.
//!
//! The engine reproduces the source schema (tables, columns, comments,
//! defaults, nullability, enum checks, indexes, auto-increment sequences,
//! foreign keys, views) and bulk-copies table contents through the
//! PostgreSQL COPY text protocol:
//!
//! - **Type mapping** with unsigned promotion and length-carry rules
//! - **Chunked COPY transfers** with row-level fallback on failed chunks
//! - **Deferred constraints** installed only after a table's data is loaded
//! - **Foreign keys as a global barrier** behind every table
//! - **View porting** with failures preserved as `.sql` dumps
//!
//! ## Example
//!
//! ```rust,no_run
//! use mysql_pg_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mysql_pg_migrate::MigrateError> {
//!     let config = Config::load("config.json")?;
//!     let orchestrator = Orchestrator::new(config)?;
//!     let result = orchestrator.run(None).await?;
//!     println!("Migrated {} rows", result.rows_transferred);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod copy;
pub mod core;
pub mod ddl;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod target;
pub mod typemap;
pub mod views;

// Re-exports for convenient access
pub use crate::config::{Config, SourceConfig, TargetConfig};
pub use crate::core::schema::{
    Column, ForeignKey, Index, IndexMethod, MigrationPlan, SourceTable, SummaryRow, TableKind,
};
pub use crate::error::{MigrateError, Result};
pub use crate::logging::Logger;
pub use crate::orchestrator::{derive_schema_name, MigrationResult, Orchestrator};
pub use crate::pipeline::{rows_per_chunk, ColumnShape, TableLoadStats};
pub use crate::source::MysqlSource;
pub use crate::target::{BulkSession, PgTarget};
pub use crate::typemap::MappedType;
pub use crate::views::rewrite_view;
