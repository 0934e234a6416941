//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
///
/// Fatality is decided by the orchestrator, not here: schema creation,
/// discovery and `CREATE TABLE` failures abort the run, everything else is
/// logged and the migration continues.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid JSON/XML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cannot reach the source or destination database.
    #[error("Connection error: {message}\n  Context: {context}")]
    Connect { message: String, context: String },

    /// Destination schema could not be created.
    #[error("Schema creation failed: {message}\n  SQL: {sql}")]
    Schema { sql: String, message: String },

    /// Source structure discovery failed.
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// CREATE TABLE failed on the destination. Fatal for the run.
    #[error("CREATE TABLE failed for {table}: {message}\n  SQL: {sql}")]
    TableCreate {
        table: String,
        sql: String,
        message: String,
    },

    /// A deferred DDL statement (NOT NULL, DEFAULT, CHECK, COMMENT,
    /// sequence, index) failed. Logged, never fatal.
    #[error("Deferred DDL failed for {table}: {message}\n  SQL: {sql}")]
    DeferredDdl {
        table: String,
        sql: String,
        message: String,
    },

    /// Foreign key installation failed. Logged, never fatal.
    #[error("Foreign key failed for {table}: {message}\n  SQL: {sql}")]
    ForeignKey {
        table: String,
        sql: String,
        message: String,
    },

    /// View rewrite or installation failed. The raw MySQL DDL is preserved
    /// under not_created_views/.
    #[error("View '{view}' not created: {message}")]
    View { view: String, message: String },

    /// The type mapper hit a MySQL base type it has no dictionary entry
    /// for. Fatal for the containing CREATE TABLE.
    #[error("Unsupported MySQL type '{raw_type}'")]
    UnsupportedType { raw_type: String },

    /// A single row failed to COPY. Counted against the table, never fatal.
    #[error("Row rejected for {table}: {message}")]
    DataRow { table: String, message: String },

    /// Source database driver error.
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Destination database driver error.
    #[error("Destination database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context.
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// IO error (config file, logs, temp directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT/SIGTERM).
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Connect error with context about where it occurred.
    pub fn connect(message: impl Into<String>, context: impl Into<String>) -> Self {
        MigrateError::Connect {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create a Pool error with context about where it occurred.
    pub fn pool(message: impl Into<String>, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create a DeferredDdl error carrying the offending SQL.
    pub fn deferred_ddl(
        table: impl Into<String>,
        sql: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        MigrateError::DeferredDdl {
            table: table.into(),
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// Create a ForeignKey error carrying the offending SQL.
    pub fn foreign_key(
        table: impl Into<String>,
        sql: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        MigrateError::ForeignKey {
            table: table.into(),
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// Exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Json(_) => 1,
            MigrateError::Connect { .. } | MigrateError::Pool { .. } => 2,
            MigrateError::Schema { .. } => 3,
            MigrateError::Discovery(_) => 4,
            MigrateError::TableCreate { .. } | MigrateError::UnsupportedType { .. } => 5,
            MigrateError::Io(_) => 7,
            MigrateError::Source(_) | MigrateError::Target(_) => 8,
            MigrateError::Cancelled => 130,
            _ => 9,
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("bad".into()).exit_code(), 1);
        assert_eq!(MigrateError::connect("down", "source").exit_code(), 2);
        assert_eq!(
            MigrateError::UnsupportedType {
                raw_type: "wat(3)".into()
            }
            .exit_code(),
            5
        );
        assert_eq!(MigrateError::Cancelled.exit_code(), 130);
    }

    #[test]
    fn test_ddl_errors_carry_sql() {
        let err = MigrateError::deferred_ddl("public.t", "ALTER TABLE x", "boom");
        let msg = err.to_string();
        assert!(msg.contains("ALTER TABLE x"));
        assert!(msg.contains("public.t"));
    }

    #[test]
    fn test_format_detailed() {
        let err = MigrateError::Config("missing target".into());
        assert!(err.format_detailed().starts_with("Error: Configuration"));
    }
}
