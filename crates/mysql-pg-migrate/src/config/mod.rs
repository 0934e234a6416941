//! Configuration loading and validation.

mod types;
mod validation;
mod xml;

pub use types::*;

use crate::error::{MigrateError, Result};
use std::path::Path;

impl Config {
    /// Load configuration from a file.
    ///
    /// The format is chosen by extension: `.json` files are parsed as JSON
    /// and `.xml` files as XML. Anything else is rejected.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("json") => Self::from_json(&content),
            Some("xml") => Self::from_xml(&content),
            other => Err(MigrateError::Config(format!(
                "unsupported config extension {:?}; expected .json or .xml",
                other.unwrap_or("")
            ))),
        }
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)
            .map_err(|e| MigrateError::Config(format!("failed to parse JSON config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from an XML string.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let config = xml::from_str(xml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}
