// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Fully-qualified object identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, TableError};
use crate::sql::parser::table_name_parts;

/// `catalog.database.object`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectIdentifier {
    catalog: String,
    database: String,
    object: String,
}

impl ObjectIdentifier {
    pub fn new(
        catalog: impl Into<String>,
        database: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            database: database.into(),
            object: object.into(),
        }
    }

    /// Parse a 1-, 2- or 3-part name, filling missing parts from the defaults.
    ///
    /// Parts may be quoted with backticks, in which case they can contain dots.
    pub fn parse(name: &str, default_catalog: &str, default_database: &str) -> Result<Self> {
        let parts = table_name_parts(name)?;
        match parts.as_slice() {
            [object] => Ok(Self::new(default_catalog, default_database, object.as_str())),
            [database, object] => Ok(Self::new(default_catalog, database.as_str(), object.as_str())),
            [catalog, database, object] => Ok(Self::new(
                catalog.as_str(),
                database.as_str(),
                object.as_str(),
            )),
            _ => Err(TableError::Parse(format!(
                "invalid table name '{}': expected at most 3 parts",
                name
            ))),
        }
    }

    pub fn catalog(&self) -> &str {
        &self.catalog
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    /// `catalog.database.object`
    pub fn as_summary_string(&self) -> String {
        format!("{}.{}.{}", self.catalog, self.database, self.object)
    }

    /// `[catalog, database, object]`
    pub fn as_path_string(&self) -> String {
        format!("[{}, {}, {}]", self.catalog, self.database, self.object)
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_summary_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_names() {
        let id = ObjectIdentifier::parse("Sink", "cat", "db").unwrap();
        assert_eq!(id.as_summary_string(), "cat.db.Sink");

        let id = ObjectIdentifier::parse("other.Sink", "cat", "db").unwrap();
        assert_eq!(id.as_summary_string(), "cat.other.Sink");

        let id = ObjectIdentifier::parse("a.b.c", "cat", "db").unwrap();
        assert_eq!(id.as_path_string(), "[a, b, c]");
    }

    #[test]
    fn test_parse_quoted_names() {
        let id = ObjectIdentifier::parse("`my.table`", "cat", "db").unwrap();
        assert_eq!(id.object(), "my.table");

        let id = ObjectIdentifier::parse(" `my db`.`t` ", "cat", "db").unwrap();
        assert_eq!(id.as_summary_string(), "cat.my db.t");
    }

    #[test]
    fn test_parse_invalid_names() {
        assert!(ObjectIdentifier::parse("", "c", "d").is_err());
        assert!(ObjectIdentifier::parse("a..b", "c", "d").is_err());
        assert!(ObjectIdentifier::parse("a.b.c.d", "c", "d").is_err());
        assert!(ObjectIdentifier::parse("`open", "c", "d").is_err());
        assert!(ObjectIdentifier::parse("a b", "c", "d").is_err());
        assert!(ObjectIdentifier::parse("a.", "c", "d").is_err());
    }
}
