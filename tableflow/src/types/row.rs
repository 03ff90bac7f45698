// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Changelog rows
//!
//! Operators in this crate emit the retract encoding: a value update is a
//! `Delete` of the superseded row followed by an `Insert` of the new one.
//! Rows arriving from external sources may use `UpdateBefore`/`UpdateAfter`
//! instead; [`Row::into_retract_encoding`] maps them onto the canonical form.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::value::Value;

/// Change kind carried by every row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowKind {
    Insert,
    UpdateBefore,
    UpdateAfter,
    Delete,
}

impl RowKind {
    /// Short notation used in explain output and printed results
    pub fn short_string(&self) -> &'static str {
        match self {
            RowKind::Insert => "+I",
            RowKind::UpdateBefore => "-U",
            RowKind::UpdateAfter => "+U",
            RowKind::Delete => "-D",
        }
    }

    /// Adds a value to the logical result
    pub fn is_accumulate(&self) -> bool {
        matches!(self, RowKind::Insert | RowKind::UpdateAfter)
    }

    /// Removes a value from the logical result
    pub fn is_retraction(&self) -> bool {
        matches!(self, RowKind::UpdateBefore | RowKind::Delete)
    }
}

impl fmt::Display for RowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_string())
    }
}

/// Ordered field values plus a change kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Row {
    kind: RowKind,
    values: Vec<Value>,
}

impl Row {
    pub fn new(kind: RowKind, values: Vec<Value>) -> Self {
        Self { kind, values }
    }

    /// Create an insert row
    pub fn insert(values: Vec<Value>) -> Self {
        Self::new(RowKind::Insert, values)
    }

    /// Create a delete row
    pub fn delete(values: Vec<Value>) -> Self {
        Self::new(RowKind::Delete, values)
    }

    pub fn kind(&self) -> RowKind {
        self.kind
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn arity(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Same values, different kind
    pub fn with_kind(mut self, kind: RowKind) -> Self {
        self.kind = kind;
        self
    }

    /// Map update-before/after onto delete/insert
    pub fn into_retract_encoding(self) -> Self {
        let kind = match self.kind {
            RowKind::UpdateBefore => RowKind::Delete,
            RowKind::UpdateAfter => RowKind::Insert,
            other => other,
        };
        self.with_kind(kind)
    }

    /// Keep only the fields at the given positions
    pub fn project(&self, indices: &[usize]) -> Self {
        let values = indices
            .iter()
            .map(|&i| self.values.get(i).cloned().unwrap_or(Value::Null))
            .collect();
        Self::new(self.kind, values)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "{}[{}]", self.kind, fields.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retract_encoding() {
        let before = Row::new(RowKind::UpdateBefore, vec![Value::BigInt(1)]);
        let after = Row::new(RowKind::UpdateAfter, vec![Value::BigInt(2)]);
        assert_eq!(before.into_retract_encoding().kind(), RowKind::Delete);
        assert_eq!(after.into_retract_encoding().kind(), RowKind::Insert);
        assert_eq!(
            Row::delete(vec![]).into_retract_encoding().kind(),
            RowKind::Delete
        );
    }

    #[test]
    fn test_display() {
        let row = Row::insert(vec![Value::from("Bob"), Value::BigInt(3)]);
        assert_eq!(row.to_string(), "+I[Bob, 3]");
        assert!(RowKind::UpdateBefore.is_retraction());
        assert!(RowKind::UpdateAfter.is_accumulate());
    }
}
