// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Logical query plans
//!
//! Logical nodes are built by the environment after name resolution, so
//! every scan already carries its source binding and every node knows its
//! output schema.

use std::fmt;
use std::sync::Arc;

use crate::catalog::ObjectIdentifier;
use crate::connectors::TableSource;
use crate::error::{Result, TableError};
use crate::types::{Column, DataType, ResolvedSchema, Value};

/// Supported aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunction {
    Count,
    Sum,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunction::Count => f.write_str("COUNT"),
            AggregateFunction::Sum => f.write_str("SUM"),
        }
    }
}

/// One aggregate in an Aggregate node
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCall {
    pub function: AggregateFunction,
    /// Input column; `None` means `COUNT(*)`
    pub argument: Option<usize>,
    /// Output column name
    pub name: String,
}

impl AggregateCall {
    pub fn count_star(name: impl Into<String>) -> Self {
        Self {
            function: AggregateFunction::Count,
            argument: None,
            name: name.into(),
        }
    }

    pub fn new(function: AggregateFunction, argument: usize, name: impl Into<String>) -> Self {
        Self {
            function,
            argument: Some(argument),
            name: name.into(),
        }
    }

    fn describe(&self) -> String {
        match self.argument {
            Some(arg) => format!("{}=[{}(${})]", self.name, self.function, arg),
            None => format!("{}=[{}()]", self.name, self.function),
        }
    }
}

/// Logical plan node
#[derive(Debug, Clone)]
pub enum LogicalNode {
    TableScan {
        table: ObjectIdentifier,
        schema: ResolvedSchema,
        source: Arc<dyn TableSource>,
    },
    Project {
        input: Box<LogicalNode>,
        columns: Vec<usize>,
        schema: ResolvedSchema,
    },
    /// Keeps rows whose column equals a literal
    Filter {
        input: Box<LogicalNode>,
        column: usize,
        value: Value,
    },
    Aggregate {
        input: Box<LogicalNode>,
        group_keys: Vec<usize>,
        aggregates: Vec<AggregateCall>,
        schema: ResolvedSchema,
    },
}

impl LogicalNode {
    pub fn scan(table: ObjectIdentifier, schema: ResolvedSchema, source: Arc<dyn TableSource>) -> Self {
        LogicalNode::TableScan {
            table,
            schema,
            source,
        }
    }

    /// Project input columns by position, renaming them
    pub fn project(input: LogicalNode, columns: Vec<(usize, String)>) -> Result<Self> {
        let input_schema = input.schema();
        let mut out = Vec::with_capacity(columns.len());
        let mut indices = Vec::with_capacity(columns.len());
        for (index, name) in columns {
            let column = input_schema.column(index).ok_or_else(|| {
                TableError::Compile(format!("projection index {} out of range", index))
            })?;
            out.push(Column {
                name,
                data_type: column.data_type,
                nullable: column.nullable,
            });
            indices.push(index);
        }
        Ok(LogicalNode::Project {
            input: Box::new(input),
            columns: indices,
            schema: ResolvedSchema::new(out),
        })
    }

    pub fn filter(input: LogicalNode, column: usize, value: Value) -> Result<Self> {
        let schema = input.schema();
        let target = schema.column(column).ok_or_else(|| {
            TableError::Compile(format!("filter column index {} out of range", column))
        })?;
        if let Some(value_type) = value.data_type() {
            if value_type != target.data_type {
                return Err(TableError::Compile(format!(
                    "cannot compare column `{}` of type {} with {} literal",
                    target.name, target.data_type, value_type
                )));
            }
        }
        Ok(LogicalNode::Filter {
            input: Box::new(input),
            column,
            value,
        })
    }

    /// Group by key columns; output is keys followed by aggregates
    pub fn aggregate(
        input: LogicalNode,
        group_keys: Vec<usize>,
        aggregates: Vec<AggregateCall>,
    ) -> Result<Self> {
        let input_schema = input.schema();
        let mut columns = Vec::new();
        for &key in &group_keys {
            let column = input_schema.column(key).ok_or_else(|| {
                TableError::Compile(format!("group key index {} out of range", key))
            })?;
            columns.push(column.clone());
        }
        for call in &aggregates {
            let column = match (call.function, call.argument) {
                (AggregateFunction::Count, _) => Column::not_null(&call.name, DataType::BigInt),
                (AggregateFunction::Sum, Some(arg)) => {
                    let arg_column = input_schema.column(arg).ok_or_else(|| {
                        TableError::Compile(format!("aggregate argument {} out of range", arg))
                    })?;
                    match arg_column.data_type {
                        DataType::BigInt | DataType::Double => {
                            Column::new(&call.name, arg_column.data_type)
                        }
                        other => {
                            return Err(TableError::Compile(format!(
                                "SUM is not defined for {} column `{}`",
                                other, arg_column.name
                            )))
                        }
                    }
                }
                (AggregateFunction::Sum, None) => {
                    return Err(TableError::Compile("SUM requires an argument".to_string()))
                }
            };
            columns.push(column);
        }
        Ok(LogicalNode::Aggregate {
            input: Box::new(input),
            group_keys,
            aggregates,
            schema: ResolvedSchema::new(columns),
        })
    }

    /// Output schema of this node
    pub fn schema(&self) -> ResolvedSchema {
        match self {
            LogicalNode::TableScan { schema, .. }
            | LogicalNode::Project { schema, .. }
            | LogicalNode::Aggregate { schema, .. } => schema.clone(),
            LogicalNode::Filter { input, .. } => input.schema(),
        }
    }

    pub fn input(&self) -> Option<&LogicalNode> {
        match self {
            LogicalNode::TableScan { .. } => None,
            LogicalNode::Project { input, .. }
            | LogicalNode::Filter { input, .. }
            | LogicalNode::Aggregate { input, .. } => Some(input),
        }
    }

    /// Whether the query produces updates when run incrementally
    pub fn is_updating(&self) -> bool {
        match self {
            LogicalNode::Aggregate { .. } => true,
            other => other.input().map(LogicalNode::is_updating).unwrap_or(false),
        }
    }

    /// The scan at the leaf of this (single-input) plan
    pub fn leaf_scan(&self) -> (&ObjectIdentifier, &ResolvedSchema, &Arc<dyn TableSource>) {
        match self {
            LogicalNode::TableScan {
                table,
                schema,
                source,
            } => (table, schema, source),
            LogicalNode::Project { input, .. }
            | LogicalNode::Filter { input, .. }
            | LogicalNode::Aggregate { input, .. } => input.leaf_scan(),
        }
    }

    /// One-line description used in the abstract syntax tree section
    pub fn explain_label(&self) -> String {
        match self {
            LogicalNode::TableScan { table, .. } => {
                format!("LogicalTableScan(table=[{}])", table.as_path_string())
            }
            LogicalNode::Project {
                columns, schema, ..
            } => {
                let items: Vec<String> = columns
                    .iter()
                    .zip(schema.columns())
                    .map(|(index, column)| format!("{}=[${}]", column.name, index))
                    .collect();
                format!("LogicalProject({})", items.join(", "))
            }
            LogicalNode::Filter { column, value, .. } => {
                format!("LogicalFilter(condition=[=(${}, {})])", column, literal_string(value))
            }
            LogicalNode::Aggregate {
                group_keys,
                aggregates,
                ..
            } => {
                let keys: Vec<String> = group_keys.iter().map(|k| k.to_string()).collect();
                let mut items = vec![format!("group=[{{{}}}]", keys.join(", "))];
                items.extend(aggregates.iter().map(AggregateCall::describe));
                format!("LogicalAggregate({})", items.join(", "))
            }
        }
    }
}

/// SQL-style literal rendering
pub(crate) fn literal_string(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::MemorySource;

    fn scan() -> LogicalNode {
        LogicalNode::scan(
            ObjectIdentifier::new("c", "d", "people"),
            ResolvedSchema::of(&[
                ("name", DataType::String),
                ("city", DataType::String),
                ("age", DataType::BigInt),
            ]),
            Arc::new(MemorySource::new(vec![])),
        )
    }

    #[test]
    fn test_project_schema_uses_new_names() {
        let node = LogicalNode::project(scan(), vec![(2, "years".to_string())]).unwrap();
        assert_eq!(node.schema().column_names(), vec!["years"]);
        assert_eq!(node.schema().column_types(), vec![DataType::BigInt]);
        assert_eq!(node.explain_label(), "LogicalProject(years=[$2])");
        assert!(LogicalNode::project(scan(), vec![(9, "x".to_string())]).is_err());
    }

    #[test]
    fn test_aggregate_schema_and_updating_flag() {
        let node = LogicalNode::aggregate(
            scan(),
            vec![1],
            vec![AggregateCall::count_star("cnt"), AggregateCall::new(AggregateFunction::Sum, 2, "total")],
        )
        .unwrap();
        let schema = node.schema();
        assert_eq!(schema.column_names(), vec!["city", "cnt", "total"]);
        assert!(!schema.column(1).unwrap().nullable);
        assert!(node.is_updating());
        assert!(!scan().is_updating());
        assert_eq!(
            node.explain_label(),
            "LogicalAggregate(group=[{1}], cnt=[COUNT()], total=[SUM($2)])"
        );
    }

    #[test]
    fn test_sum_over_string_rejected() {
        let err = LogicalNode::aggregate(
            scan(),
            vec![],
            vec![AggregateCall::new(AggregateFunction::Sum, 0, "s")],
        )
        .unwrap_err();
        assert!(matches!(err, TableError::Compile(_)));
    }

    #[test]
    fn test_filter_type_check() {
        assert!(LogicalNode::filter(scan(), 2, Value::BigInt(3)).is_ok());
        assert!(LogicalNode::filter(scan(), 2, Value::from("x")).is_err());
        let node = LogicalNode::filter(scan(), 1, Value::from("O'Neil")).unwrap();
        assert_eq!(node.explain_label(), "LogicalFilter(condition=[=($1, 'O''Neil')])");
    }
}
