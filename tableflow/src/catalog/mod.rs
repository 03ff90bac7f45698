// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Table registry
//!
//! Maps fully-qualified names to source, sink and view bindings. Bindings
//! are immutable once registered and a name can never be re-bound.

pub mod identifier;
pub mod registry;

pub use identifier::ObjectIdentifier;
pub use registry::{BindingKind, TableBinding, TableRegistry};
