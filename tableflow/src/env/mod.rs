// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Table environments and table handles

mod context;
pub mod environment;
pub mod table;

pub(crate) use context::EnvContext;
pub use environment::{EnvironmentMode, Internal, Public, TableEnvironment};
pub use table::Table;
