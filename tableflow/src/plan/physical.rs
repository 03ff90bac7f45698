// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Physical plans
//!
//! A compiled plan is a set of source scans, each read exactly once, and a
//! list of linear pipelines hanging off those scans. Every pipeline ends in
//! a sink or in the result collector.

use std::fmt;
use std::sync::Arc;

use super::logical::{literal_string, AggregateCall, AggregateFunction};
use crate::catalog::ObjectIdentifier;
use crate::config::RuntimeMode;
use crate::connectors::{TableSink, TableSource};
use crate::types::{ResolvedSchema, Row, Value};

/// User function applied to a converted stream
#[derive(Clone)]
pub enum StreamTransform {
    Map(Arc<dyn Fn(Row) -> Row + Send + Sync>),
    Filter(Arc<dyn Fn(&Row) -> bool + Send + Sync>),
}

impl fmt::Debug for StreamTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamTransform::Map(_) => f.write_str("StreamTransform::Map"),
            StreamTransform::Filter(_) => f.write_str("StreamTransform::Filter"),
        }
    }
}

/// A source read once per submission
#[derive(Debug, Clone)]
pub struct ScanNode {
    pub table: ObjectIdentifier,
    pub schema: ResolvedSchema,
    pub source: Arc<dyn TableSource>,
    pub stage_id: usize,
}

impl ScanNode {
    pub fn explain_label(&self) -> String {
        format!(
            "TableSourceScan(table=[{}], fields=[{}])",
            self.table.as_path_string(),
            self.schema.column_names().join(", ")
        )
    }
}

/// Physical operator within a pipeline
#[derive(Debug, Clone)]
pub enum PhysicalOperator {
    /// Fused filter + projection
    Calc {
        projection: Option<Vec<usize>>,
        condition: Option<(usize, Value)>,
        input_schema: ResolvedSchema,
        schema: ResolvedSchema,
    },
    GroupAggregate {
        group_keys: Vec<usize>,
        aggregates: Vec<AggregateCall>,
        /// Emit a retract changelog per input row instead of final results
        emit_changelog: bool,
        input_schema: ResolvedSchema,
        schema: ResolvedSchema,
    },
    Transform(StreamTransform),
}

impl PhysicalOperator {
    pub fn explain_label(&self) -> String {
        match self {
            PhysicalOperator::Calc {
                projection,
                condition,
                input_schema,
                schema,
            } => {
                let mut items = Vec::new();
                if projection.is_some() {
                    items.push(format!("select=[{}]", schema.column_names().join(", ")));
                }
                if let Some((column, value)) = condition {
                    let name = input_schema
                        .column(*column)
                        .map(|c| c.name.clone())
                        .unwrap_or_else(|| format!("${}", column));
                    items.push(format!("where=[=({}, {})]", name, literal_string(value)));
                }
                format!("Calc({})", items.join(", "))
            }
            PhysicalOperator::GroupAggregate {
                group_keys,
                aggregates,
                input_schema,
                ..
            } => {
                let name_of = |i: usize| {
                    input_schema
                        .column(i)
                        .map(|c| c.name.clone())
                        .unwrap_or_else(|| format!("${}", i))
                };
                let keys: Vec<String> = group_keys.iter().map(|&k| name_of(k)).collect();
                let mut select = keys.clone();
                for call in aggregates {
                    let arg = match (call.function, call.argument) {
                        (AggregateFunction::Count, None) => "*".to_string(),
                        (_, Some(a)) => name_of(a),
                        (_, None) => String::new(),
                    };
                    select.push(format!("{}({}) AS {}", call.function, arg, call.name));
                }
                if keys.is_empty() {
                    format!("GroupAggregate(select=[{}])", select.join(", "))
                } else {
                    format!(
                        "GroupAggregate(groupBy=[{}], select=[{}])",
                        keys.join(", "),
                        select.join(", ")
                    )
                }
            }
            PhysicalOperator::Transform(StreamTransform::Map(_)) => "StreamMap".to_string(),
            PhysicalOperator::Transform(StreamTransform::Filter(_)) => "StreamFilter".to_string(),
        }
    }

    /// Shipping strategy from the previous stage
    pub fn ship_strategy(&self) -> String {
        match self {
            PhysicalOperator::GroupAggregate {
                group_keys,
                input_schema,
                ..
            } if !group_keys.is_empty() => {
                let keys: Vec<String> = group_keys
                    .iter()
                    .filter_map(|&k| input_schema.column(k).map(|c| c.name.clone()))
                    .collect();
                format!("HASH[{}]", keys.join(", "))
            }
            PhysicalOperator::GroupAggregate { .. } => "GLOBAL".to_string(),
            _ => "FORWARD".to_string(),
        }
    }

    /// Whether this operator can emit retractions
    pub fn emits_changelog(&self) -> bool {
        matches!(
            self,
            PhysicalOperator::GroupAggregate {
                emit_changelog: true,
                ..
            }
        )
    }
}

/// Where a pipeline's rows go
#[derive(Debug, Clone)]
pub enum PipelineOutput {
    Sink {
        /// Registered name; `None` for sinks attached to converted streams
        table: Option<ObjectIdentifier>,
        sink: Arc<dyn TableSink>,
        overwrite: bool,
    },
    Collect,
}

impl PipelineOutput {
    /// Name used in results and error messages
    pub fn display_name(&self) -> String {
        match self {
            PipelineOutput::Sink {
                table: Some(table), ..
            } => table.as_summary_string(),
            PipelineOutput::Sink { sink, .. } => sink.describe(),
            PipelineOutput::Collect => "collect".to_string(),
        }
    }
}

/// Linear chain from one scan to one output
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub scan: usize,
    pub operators: Vec<PhysicalOperator>,
    pub output: PipelineOutput,
    /// Output schema
    pub schema: ResolvedSchema,
    /// One stage id per operator, then one for the output
    pub stage_ids: Vec<usize>,
}

impl Pipeline {
    pub fn emits_changelog(&self) -> bool {
        self.operators.iter().any(PhysicalOperator::emits_changelog)
    }

    pub fn output_label(&self) -> String {
        let fields = self.schema.column_names().join(", ");
        match &self.output {
            PipelineOutput::Sink {
                table: Some(table),
                overwrite,
                ..
            } => {
                let mut label = format!("Sink(table=[{}], fields=[{}]", table.as_summary_string(), fields);
                if *overwrite {
                    label.push_str(", overwrite=[true]");
                }
                label.push(')');
                label
            }
            PipelineOutput::Sink { sink, .. } => {
                format!("StreamSink(sink=[{}], fields=[{}])", sink.describe(), fields)
            }
            PipelineOutput::Collect => format!("Collect(fields=[{}])", fields),
        }
    }
}

/// Backend-ready plan for one submission
#[derive(Debug, Clone)]
pub struct CompiledPlan {
    pub scans: Vec<ScanNode>,
    pub pipelines: Vec<Pipeline>,
    pub runtime_mode: RuntimeMode,
    /// Rendered abstract syntax tree of the submitted statements
    pub ast: String,
}

impl CompiledPlan {
    /// Names of all sink outputs, in statement order
    pub fn sink_names(&self) -> Vec<String> {
        self.pipelines
            .iter()
            .filter(|p| matches!(p.output, PipelineOutput::Sink { .. }))
            .map(|p| p.output.display_name())
            .collect()
    }

    /// Index of the pipeline feeding the result collector, if any
    pub fn collect_pipeline(&self) -> Option<usize> {
        self.pipelines
            .iter()
            .position(|p| matches!(p.output, PipelineOutput::Collect))
    }

    /// Distinct sinks written by this plan
    pub fn sinks(&self) -> Vec<(String, Arc<dyn TableSink>)> {
        let mut result: Vec<(String, Arc<dyn TableSink>)> = Vec::new();
        for pipeline in &self.pipelines {
            if let PipelineOutput::Sink { sink, .. } = &pipeline.output {
                if !result.iter().any(|(_, s)| same_sink(s, sink)) {
                    result.push((pipeline.output.display_name(), sink.clone()));
                }
            }
        }
        result
    }
}

/// Sink identity is object identity
pub fn same_sink(a: &Arc<dyn TableSink>, b: &Arc<dyn TableSink>) -> bool {
    sink_key(a) == sink_key(b)
}

/// Address of the sink object
pub fn sink_key(sink: &Arc<dyn TableSink>) -> usize {
    Arc::as_ptr(sink) as *const () as usize
}
