// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! SQL front-end
//!
//! Parsing only: the statements produced here still carry unresolved names.
//! The environment resolves them against the table registry.

pub mod ast;
pub mod parser;

pub use ast::{ColumnDefinition, CreateTableStatement, InsertStatement, SelectItem, SelectStatement, SqlStatement};
pub use parser::{split_statements, SimpleSqlParser, SqlParser};
