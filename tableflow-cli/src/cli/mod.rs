// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI module for TableFlow
//!
//! Provides script execution, plan explanation and version information.

pub mod commands;
pub mod runner;

pub use commands::{Cli, Commands};
pub use runner::{handle_explain, handle_run, handle_version};
