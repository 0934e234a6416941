//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.host.is_empty() {
        return Err(MigrateError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(MigrateError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(MigrateError::Config("source.user is required".into()));
    }

    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }

    // Only a single target encoding is supported.
    let normalized = config.encoding.to_uppercase().replace('-', "");
    if normalized != "UTF8" {
        return Err(MigrateError::Config(format!(
            "encoding '{}' is not supported; only UTF-8",
            config.encoding
        )));
    }

    if let Some(0) = config.workers {
        return Err(MigrateError::Config("workers must be at least 1".into()));
    }
    if let Some(mb) = config.data_chunk_size {
        if !mb.is_finite() || mb <= 0.0 {
            return Err(MigrateError::Config(
                "data_chunk_size must be a positive number of MB".into(),
            ));
        }
    }
    if let Some(name) = &config.schema {
        if name.is_empty() {
            return Err(MigrateError::Config("schema must not be empty".into()));
        }
    }

    Ok(())
}
