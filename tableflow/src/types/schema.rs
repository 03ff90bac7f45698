// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Resolved table schemas

use serde::{Deserialize, Serialize};
use std::fmt;

use super::value::{DataType, Value};

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Column {
    /// Create a nullable column
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    /// Create a NOT NULL column
    pub fn not_null(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
        }
    }

    /// Whether a value can be stored in this column
    pub fn accepts(&self, value: &Value) -> bool {
        match value.data_type() {
            None => self.nullable,
            Some(t) => t == self.data_type,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` {}", self.name, self.data_type)?;
        if !self.nullable {
            f.write_str(" NOT NULL")?;
        }
        Ok(())
    }
}

/// Ordered list of columns, fixed once a table is registered
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResolvedSchema {
    columns: Vec<Column>,
}

impl ResolvedSchema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Shorthand for a schema of nullable columns
    pub fn of(fields: &[(&str, DataType)]) -> Self {
        Self::new(
            fields
                .iter()
                .map(|(name, data_type)| Column::new(*name, *data_type))
                .collect(),
        )
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_types(&self) -> Vec<DataType> {
        self.columns.iter().map(|c| c.data_type).collect()
    }

    /// Position of a column by exact name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Schema with only the given positions, in the given order
    pub fn project(&self, indices: &[usize]) -> Self {
        Self::new(
            indices
                .iter()
                .filter_map(|&i| self.columns.get(i).cloned())
                .collect(),
        )
    }
}

impl fmt::Display for ResolvedSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "(")?;
        for (i, column) in self.columns.iter().enumerate() {
            let sep = if i + 1 < self.columns.len() { "," } else { "" };
            writeln!(f, "  {}{}", column, sep)?;
        }
        f.write_str(")")
    }
}
