// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Shared state behind a table environment and the handles it hands out
//!
//! Name resolution and SQL-to-plan translation live here so that tables,
//! statement sets and streams created from one environment all resolve
//! names the same way.

use log::debug;
use parking_lot::RwLock;
use std::fmt;

use crate::catalog::{BindingKind, ObjectIdentifier, TableBinding, TableRegistry};
use crate::config::EnvironmentSettings;
use crate::error::{Result, TableError};
use crate::exec::ExecutionServices;
use crate::plan::{AggregateCall, AggregateFunction, LogicalNode, SinkTarget};
use crate::sql::{SelectItem, SelectStatement, SqlParser, SqlStatement};
use crate::types::ResolvedSchema;

pub struct EnvContext {
    pub(crate) settings: EnvironmentSettings,
    pub(crate) services: ExecutionServices,
    registry: RwLock<TableRegistry>,
    parser: Box<dyn SqlParser>,
}

impl fmt::Debug for EnvContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvContext")
            .field("settings", &self.settings)
            .field("parser", &self.parser)
            .finish()
    }
}

impl EnvContext {
    pub(crate) fn new(
        settings: EnvironmentSettings,
        services: ExecutionServices,
        parser: Box<dyn SqlParser>,
    ) -> Self {
        Self {
            settings,
            services,
            registry: RwLock::new(TableRegistry::new()),
            parser,
        }
    }

    pub(crate) fn identifier(&self, name: &str) -> Result<ObjectIdentifier> {
        ObjectIdentifier::parse(
            name,
            &self.settings.default_catalog,
            &self.settings.default_database,
        )
    }

    pub(crate) fn register(&self, name: &str, binding: TableBinding) -> Result<ObjectIdentifier> {
        let identifier = self.identifier(name)?;
        self.registry.write().register(identifier.clone(), binding)?;
        Ok(identifier)
    }

    pub(crate) fn contains(&self, name: &str) -> Result<bool> {
        let identifier = self.identifier(name)?;
        Ok(self.registry.read().contains(&identifier))
    }

    pub(crate) fn list_tables(&self) -> Vec<String> {
        self.registry
            .read()
            .list_tables(&self.settings.default_catalog, &self.settings.default_database)
    }

    pub(crate) fn parse(&self, sql: &str) -> Result<SqlStatement> {
        self.parser.parse(sql)
    }

    /// Logical plan reading a registered source or view
    pub(crate) fn scan(&self, name: &str) -> Result<LogicalNode> {
        let identifier = self.identifier(name)?;
        let registry = self.registry.read();
        let binding = registry.resolve_readable(&identifier)?;
        match binding.kind() {
            BindingKind::Connector {
                source: Some(source),
                ..
            } => Ok(LogicalNode::scan(
                identifier.clone(),
                binding.schema().clone(),
                source.clone(),
            )),
            BindingKind::View(query) => Ok(query.clone()),
            BindingKind::Connector { source: None, .. } => Err(TableError::unknown_table(
                identifier.as_summary_string(),
                "source table",
            )),
        }
    }

    /// Resolve a registered sink as an insert target
    pub(crate) fn sink_target(&self, name: &str, overwrite: bool) -> Result<SinkTarget> {
        let identifier = self.identifier(name)?;
        let registry = self.registry.read();
        let binding = registry.resolve_writable(&identifier)?;
        let sink = binding.sink_handle().ok_or_else(|| {
            TableError::unknown_table(identifier.as_summary_string(), "sink table")
        })?;
        Ok(SinkTarget {
            table: Some(identifier.clone()),
            sink,
            schema: binding.schema().clone(),
            overwrite,
        })
    }

    /// Translate a parsed SELECT into a logical plan
    pub(crate) fn plan_select(&self, select: &SelectStatement) -> Result<LogicalNode> {
        let mut node = self.scan(&select.from)?;
        let input_schema = node.schema();
        let column_index = |name: &str| {
            input_schema.index_of(name).ok_or_else(|| {
                TableError::Compile(format!("column `{}` not found in table {}", name, select.from))
            })
        };

        if let Some((column, value)) = &select.filter {
            node = LogicalNode::filter(node, column_index(column.as_str())?, value.clone())?;
        }

        if select.has_aggregates() {
            return self.plan_aggregate(node, &input_schema, select);
        }

        if select.items == [SelectItem::Wildcard] {
            return Ok(node);
        }
        let mut columns = Vec::new();
        for item in &select.items {
            match item {
                SelectItem::Wildcard => columns.extend(
                    input_schema
                        .column_names()
                        .into_iter()
                        .enumerate(),
                ),
                SelectItem::Column { name, alias } => {
                    columns.push((column_index(name.as_str())?, alias.clone().unwrap_or_else(|| name.clone())))
                }
                SelectItem::Aggregate { .. } => {
                    return Err(TableError::Compile(
                        "aggregate outside of an aggregating query".to_string(),
                    ))
                }
            }
        }
        debug!("Planned projection of {} column(s) from {}", columns.len(), select.from);
        LogicalNode::project(node, columns)
    }

    fn plan_aggregate(
        &self,
        input: LogicalNode,
        input_schema: &ResolvedSchema,
        select: &SelectStatement,
    ) -> Result<LogicalNode> {
        let column_index = |name: &str| {
            input_schema.index_of(name).ok_or_else(|| {
                TableError::Compile(format!("column `{}` not found in table {}", name, select.from))
            })
        };

        let group_keys = select
            .group_by
            .iter()
            .map(|name| column_index(name.as_str()))
            .collect::<Result<Vec<usize>>>()?;

        let mut calls = Vec::new();
        // (position in aggregate output, output name), in select-list order
        let mut outputs = Vec::new();
        for (position, item) in select.items.iter().enumerate() {
            match item {
                SelectItem::Wildcard => {
                    return Err(TableError::Compile(
                        "`*` cannot be combined with aggregation".to_string(),
                    ))
                }
                SelectItem::Column { name, alias } => {
                    let index = column_index(name.as_str())?;
                    let key = group_keys.iter().position(|&k| k == index).ok_or_else(|| {
                        TableError::Compile(format!("expression `{}` is not being grouped", name))
                    })?;
                    outputs.push((key, alias.clone().unwrap_or_else(|| name.clone())));
                }
                SelectItem::Aggregate {
                    function,
                    argument,
                    alias,
                } => {
                    let name = alias.clone().unwrap_or_else(|| format!("EXPR${}", position));
                    let call = match (function, argument) {
                        (AggregateFunction::Count, None) => AggregateCall::count_star(name.clone()),
                        (function, Some(column)) => {
                            AggregateCall::new(*function, column_index(column.as_str())?, name.clone())
                        }
                        (AggregateFunction::Sum, None) => {
                            return Err(TableError::Compile("SUM(*) is not supported".to_string()))
                        }
                    };
                    outputs.push((group_keys.len() + calls.len(), name));
                    calls.push(call);
                }
            }
        }

        let aggregate = LogicalNode::aggregate(input, group_keys, calls)?;
        let aggregate_names = aggregate.schema().column_names();
        let identity = outputs.len() == aggregate_names.len()
            && outputs
                .iter()
                .enumerate()
                .all(|(i, (index, name))| *index == i && &aggregate_names[i] == name);
        if identity {
            Ok(aggregate)
        } else {
            LogicalNode::project(aggregate, outputs)
        }
    }
}
