// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Core data model shared by every layer
//!
//! This module provides:
//! - Scalar values and their logical data types
//! - Changelog rows tagged with a row kind
//! - Resolved (ordered, immutable) table schemas

pub mod value;
pub mod row;
pub mod schema;

pub use value::{DataType, Value};
pub use row::{Row, RowKind};
pub use schema::{Column, ResolvedSchema};
