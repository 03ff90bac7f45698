// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Connector factory for descriptor-registered tables
//!
//! Supported `connector` options:
//! - `filesystem`: requires `path`, `format` must be `csv` if given,
//!   optional `csv.field-delimiter` (single character)
//! - `blackhole`: sink only

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{BlackholeSink, ConnectorError, CsvTableSink, CsvTableSource, TableSink, TableSource};
use crate::types::ResolvedSchema;

/// Schema plus connector options describing a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub schema: ResolvedSchema,
    pub options: BTreeMap<String, String>,
}

impl TableDescriptor {
    /// Start a descriptor for the given connector identifier
    pub fn for_connector(connector: &str) -> TableDescriptorBuilder {
        let mut options = BTreeMap::new();
        options.insert("connector".to_string(), connector.to_string());
        TableDescriptorBuilder {
            schema: ResolvedSchema::default(),
            options,
        }
    }

    pub fn connector(&self) -> Option<&str> {
        self.options.get("connector").map(String::as_str)
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

/// Builder for [`TableDescriptor`]
#[derive(Debug, Clone)]
pub struct TableDescriptorBuilder {
    schema: ResolvedSchema,
    options: BTreeMap<String, String>,
}

impl TableDescriptorBuilder {
    pub fn schema(mut self, schema: ResolvedSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> TableDescriptor {
        TableDescriptor {
            schema: self.schema,
            options: self.options,
        }
    }
}

/// Source and/or sink created from a descriptor
#[derive(Debug, Clone)]
pub struct ConnectorInstance {
    pub source: Option<Arc<dyn TableSource>>,
    pub sink: Option<Arc<dyn TableSink>>,
}

/// Creates connector instances from descriptors
pub struct ConnectorFactory;

impl ConnectorFactory {
    pub fn create(descriptor: &TableDescriptor) -> Result<ConnectorInstance, ConnectorError> {
        match descriptor.connector() {
            Some("filesystem") => Self::create_filesystem(descriptor),
            Some("blackhole") => Ok(ConnectorInstance {
                source: None,
                sink: Some(Arc::new(BlackholeSink)),
            }),
            Some(other) => Err(ConnectorError::InvalidOptions(format!(
                "unknown connector '{}'",
                other
            ))),
            None => Err(ConnectorError::InvalidOptions(
                "missing 'connector' option".to_string(),
            )),
        }
    }

    fn create_filesystem(descriptor: &TableDescriptor) -> Result<ConnectorInstance, ConnectorError> {
        let path = descriptor.option("path").ok_or_else(|| {
            ConnectorError::InvalidOptions("filesystem connector requires 'path'".to_string())
        })?;

        if let Some(format) = descriptor.option("format") {
            if !format.eq_ignore_ascii_case("csv") {
                return Err(ConnectorError::InvalidOptions(format!(
                    "unsupported format '{}'",
                    format
                )));
            }
        }

        let delimiter = match descriptor.option("csv.field-delimiter") {
            None => super::filesystem::DEFAULT_DELIMITER,
            Some(d) => {
                let mut chars = d.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => c,
                    _ => {
                        return Err(ConnectorError::InvalidOptions(format!(
                            "field delimiter must be a single character, got '{}'",
                            d
                        )))
                    }
                }
            }
        };

        let source = CsvTableSource::new(path, descriptor.schema.clone()).with_delimiter(delimiter);
        let sink = CsvTableSink::new(path).with_delimiter(delimiter);
        Ok(ConnectorInstance {
            source: Some(Arc::new(source)),
            sink: Some(Arc::new(sink)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    #[test]
    fn test_filesystem_descriptor() {
        let descriptor = TableDescriptor::for_connector("filesystem")
            .schema(ResolvedSchema::of(&[("a", DataType::String)]))
            .option("path", "/tmp/a.csv")
            .option("format", "csv")
            .option("csv.field-delimiter", ";")
            .build();
        let instance = ConnectorFactory::create(&descriptor).unwrap();
        assert!(instance.source.is_some());
        assert!(instance.sink.unwrap().supports_overwrite());
    }

    #[test]
    fn test_invalid_descriptors() {
        let missing_path = TableDescriptor::for_connector("filesystem").build();
        assert!(ConnectorFactory::create(&missing_path).is_err());

        let unknown = TableDescriptor::for_connector("kafka").build();
        assert!(ConnectorFactory::create(&unknown).is_err());

        let bad_delim = TableDescriptor::for_connector("filesystem")
            .option("path", "x")
            .option("csv.field-delimiter", ";;")
            .build();
        assert!(ConnectorFactory::create(&bad_delim).is_err());
    }

    #[test]
    fn test_blackhole_is_sink_only() {
        let instance =
            ConnectorFactory::create(&TableDescriptor::for_connector("blackhole").build()).unwrap();
        assert!(instance.source.is_none());
        assert!(instance.sink.is_some());
    }
}
