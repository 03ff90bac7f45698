// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query planning for table statements
//!
//! This module converts resolved logical queries into a single physical plan
//! per submission. It includes logical plan nodes, physical operators, the
//! plan compiler and the explain renderer.

pub mod logical;
pub mod physical;
pub mod compiler;
pub mod explain;

pub use logical::{AggregateCall, AggregateFunction, LogicalNode};
pub use physical::{CompiledPlan, PhysicalOperator, Pipeline, PipelineOutput, ScanNode, StreamTransform};
pub use compiler::{PlanCompiler, PlanOutput, PlanRequest, SinkTarget};
pub use explain::normalize_stage_ids;
