// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Parsed SQL statements

use crate::plan::AggregateFunction;
use crate::types::{DataType, Value};

/// One parsed statement
#[derive(Debug, Clone, PartialEq)]
pub enum SqlStatement {
    CreateTable(CreateTableStatement),
    Insert(InsertStatement),
    Select(SelectStatement),
    ShowTables,
}

impl SqlStatement {
    /// Statement kind for log and error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            SqlStatement::CreateTable(_) => "CREATE TABLE",
            SqlStatement::Insert(_) => "INSERT",
            SqlStatement::Select(_) => "SELECT",
            SqlStatement::ShowTables => "SHOW TABLES",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

/// `CREATE [TEMPORARY] TABLE name (...) WITH (...)`
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    /// Possibly qualified, possibly backtick-quoted
    pub name: String,
    pub temporary: bool,
    pub columns: Vec<ColumnDefinition>,
    pub options: Vec<(String, String)>,
}

/// `INSERT INTO|OVERWRITE [TABLE] name <select>`
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub target: String,
    pub overwrite: bool,
    pub query: SelectStatement,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Wildcard,
    Column {
        name: String,
        alias: Option<String>,
    },
    Aggregate {
        function: AggregateFunction,
        /// `None` for `COUNT(*)`
        argument: Option<String>,
        alias: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub items: Vec<SelectItem>,
    pub from: String,
    /// `WHERE column = literal`
    pub filter: Option<(String, Value)>,
    pub group_by: Vec<String>,
}

impl SelectStatement {
    pub fn has_aggregates(&self) -> bool {
        !self.group_by.is_empty()
            || self
                .items
                .iter()
                .any(|item| matches!(item, SelectItem::Aggregate { .. }))
    }
}
