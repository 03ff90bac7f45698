// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Environment settings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, TableError};

/// How submissions are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Incremental execution; aggregations emit a changelog and `execute`
    /// returns as soon as the job is submitted
    #[default]
    Streaming,
    /// Bounded execution; aggregations emit final results and `execute`
    /// blocks until the job finishes
    Batch,
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeMode::Streaming => f.write_str("streaming"),
            RuntimeMode::Batch => f.write_str("batch"),
        }
    }
}

impl FromStr for RuntimeMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "streaming" => Ok(RuntimeMode::Streaming),
            "batch" => Ok(RuntimeMode::Batch),
            _ => Err(format!("Unknown runtime mode: {}", s)),
        }
    }
}

/// Settings a table environment is created with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSettings {
    pub runtime_mode: RuntimeMode,
    pub default_catalog: String,
    pub default_database: String,
    /// Rows buffered between a running job and its result iterator
    pub result_buffer_capacity: usize,
    /// Job name used when a statement is executed without one
    pub default_job_name: String,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            runtime_mode: RuntimeMode::Streaming,
            default_catalog: "default_catalog".to_string(),
            default_database: "default_database".to_string(),
            result_buffer_capacity: 1024,
            default_job_name: "insert-into".to_string(),
        }
    }
}

impl EnvironmentSettings {
    pub fn streaming() -> Self {
        Self::default()
    }

    pub fn batch() -> Self {
        Self::default().with_runtime_mode(RuntimeMode::Batch)
    }

    pub fn with_runtime_mode(mut self, mode: RuntimeMode) -> Self {
        self.runtime_mode = mode;
        self
    }

    pub fn with_default_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.default_catalog = catalog.into();
        self
    }

    pub fn with_default_database(mut self, database: impl Into<String>) -> Self {
        self.default_database = database.into();
        self
    }

    pub fn with_result_buffer_capacity(mut self, capacity: usize) -> Self {
        self.result_buffer_capacity = capacity;
        self
    }

    pub fn with_default_job_name(mut self, name: impl Into<String>) -> Self {
        self.default_job_name = name.into();
        self
    }

    /// Parse settings from JSON; missing keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: EnvironmentSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| TableError::Config(format!("cannot read {:?}: {}", path, e)))?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_catalog.trim().is_empty() {
            return Err(TableError::Config("default_catalog must not be empty".to_string()));
        }
        if self.default_database.trim().is_empty() {
            return Err(TableError::Config("default_database must not be empty".to_string()));
        }
        if self.result_buffer_capacity == 0 {
            return Err(TableError::Config(
                "result_buffer_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = EnvironmentSettings::default();
        assert_eq!(settings.runtime_mode, RuntimeMode::Streaming);
        assert_eq!(settings.default_catalog, "default_catalog");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let settings = EnvironmentSettings::from_json_str(
            r#"{"runtime_mode": "batch", "default_database": "sales"}"#,
        )
        .unwrap();
        assert_eq!(settings.runtime_mode, RuntimeMode::Batch);
        assert_eq!(settings.default_database, "sales");
        assert_eq!(settings.result_buffer_capacity, 1024);
    }

    #[test]
    fn test_invalid_json_settings() {
        assert!(matches!(
            EnvironmentSettings::from_json_str(r#"{"result_buffer_capacity": 0}"#),
            Err(TableError::Config(_))
        ));
        assert!(matches!(
            EnvironmentSettings::from_json_str(r#"{"runtime_mode": "micro"}"#),
            Err(TableError::Config(_))
        ));
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("BATCH".parse::<RuntimeMode>().unwrap(), RuntimeMode::Batch);
        assert!("x".parse::<RuntimeMode>().is_err());
    }
}
