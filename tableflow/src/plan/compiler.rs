// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Plan compiler - converts buffered statements into one physical plan
//!
//! All requests of a submission are compiled together: requests reading the
//! same table share one scan, so every target sees the same source rows.

use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::explain::render_chain;
use super::logical::LogicalNode;
use super::physical::{CompiledPlan, PhysicalOperator, Pipeline, PipelineOutput, ScanNode, StreamTransform};
use crate::catalog::ObjectIdentifier;
use crate::config::RuntimeMode;
use crate::connectors::TableSink;
use crate::error::{Result, TableError};
use crate::types::ResolvedSchema;

/// Process-wide stage counter; stage ids differ between compilations
static NEXT_STAGE_ID: AtomicUsize = AtomicUsize::new(1);

fn next_stage_id() -> usize {
    NEXT_STAGE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Resolved sink a request writes to
#[derive(Debug, Clone)]
pub struct SinkTarget {
    /// Registered name; `None` for sinks of converted streams
    pub table: Option<ObjectIdentifier>,
    pub sink: Arc<dyn TableSink>,
    pub schema: ResolvedSchema,
    pub overwrite: bool,
}

impl SinkTarget {
    fn display_name(&self) -> String {
        match &self.table {
            Some(table) => table.as_summary_string(),
            None => self.sink.describe(),
        }
    }
}

/// Destination of one compiled request
#[derive(Debug, Clone)]
pub enum PlanOutput {
    Sink(SinkTarget),
    Collect,
}

/// One query plus where its rows go
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub query: LogicalNode,
    pub transforms: Vec<StreamTransform>,
    pub output: PlanOutput,
}

impl PlanRequest {
    pub fn insert(query: LogicalNode, target: SinkTarget) -> Self {
        Self {
            query,
            transforms: Vec::new(),
            output: PlanOutput::Sink(target),
        }
    }

    pub fn collect(query: LogicalNode) -> Self {
        Self {
            query,
            transforms: Vec::new(),
            output: PlanOutput::Collect,
        }
    }

    fn ast_label(&self) -> String {
        let fields = self.query.schema().column_names().join(", ");
        match &self.output {
            PlanOutput::Sink(SinkTarget {
                table: Some(table),
                overwrite,
                ..
            }) => {
                let mut label = format!(
                    "LogicalSink(table=[{}], fields=[{}]",
                    table.as_summary_string(),
                    fields
                );
                if *overwrite {
                    label.push_str(", overwrite=[true]");
                }
                label.push(')');
                label
            }
            PlanOutput::Sink(target) => format!(
                "LogicalStreamSink(sink=[{}], fields=[{}])",
                target.sink.describe(),
                fields
            ),
            PlanOutput::Collect => format!("LogicalCollect(fields=[{}])", fields),
        }
    }
}

/// Compiles plan requests for one runtime mode
#[derive(Debug, Clone)]
pub struct PlanCompiler {
    mode: RuntimeMode,
}

impl PlanCompiler {
    pub fn new(mode: RuntimeMode) -> Self {
        Self { mode }
    }

    pub fn runtime_mode(&self) -> RuntimeMode {
        self.mode
    }

    /// Build one physical plan covering every request
    pub fn compile(&self, requests: &[PlanRequest]) -> Result<CompiledPlan> {
        if requests.is_empty() {
            return Err(TableError::Compile("no statements to compile".to_string()));
        }
        for request in requests {
            self.validate(request)?;
        }

        let mut scans: Vec<ScanNode> = Vec::new();
        let mut scan_index: HashMap<ObjectIdentifier, usize> = HashMap::new();
        let mut pipelines = Vec::with_capacity(requests.len());
        let mut ast = Vec::with_capacity(requests.len());

        for request in requests {
            ast.push(self.render_ast(request));

            let (table, schema, source) = request.query.leaf_scan();
            let scan = *scan_index.entry(table.clone()).or_insert_with(|| {
                scans.push(ScanNode {
                    table: table.clone(),
                    schema: schema.clone(),
                    source: source.clone(),
                    stage_id: next_stage_id(),
                });
                scans.len() - 1
            });

            let mut operators = fuse_calcs(self.translate(&request.query));
            operators.extend(request.transforms.iter().cloned().map(PhysicalOperator::Transform));
            let stage_ids = (0..=operators.len()).map(|_| next_stage_id()).collect();

            let output = match &request.output {
                PlanOutput::Sink(target) => PipelineOutput::Sink {
                    table: target.table.clone(),
                    sink: target.sink.clone(),
                    overwrite: target.overwrite,
                },
                PlanOutput::Collect => PipelineOutput::Collect,
            };

            pipelines.push(Pipeline {
                scan,
                operators,
                output,
                schema: request.query.schema(),
                stage_ids,
            });
        }

        debug!(
            "Compiled {} statement(s) into {} scan(s) and {} pipeline(s)",
            requests.len(),
            scans.len(),
            pipelines.len()
        );

        Ok(CompiledPlan {
            scans,
            pipelines,
            runtime_mode: self.mode,
            ast: ast.join("\n\n"),
        })
    }

    fn validate(&self, request: &PlanRequest) -> Result<()> {
        let target = match &request.output {
            PlanOutput::Sink(target) => target,
            PlanOutput::Collect => return Ok(()),
        };

        if target.overwrite && !target.sink.supports_overwrite() {
            return Err(TableError::UnsupportedSinkMode(target.display_name()));
        }

        if self.mode == RuntimeMode::Streaming
            && request.query.is_updating()
            && !target.sink.accepts_changelog()
        {
            return Err(TableError::Compile(format!(
                "sink '{}' only accepts inserts but the query produces updates",
                target.display_name()
            )));
        }
        Ok(())
    }

    fn render_ast(&self, request: &PlanRequest) -> String {
        let mut labels = vec![request.ast_label()];
        let mut node = Some(&request.query);
        while let Some(current) = node {
            labels.push(current.explain_label());
            node = current.input();
        }
        render_chain(&labels)
    }

    /// Operators from the scan upwards, excluding the scan itself
    fn translate(&self, node: &LogicalNode) -> Vec<PhysicalOperator> {
        let mut operators = match node.input() {
            Some(input) => self.translate(input),
            None => return Vec::new(),
        };
        let input_schema = node.input().map(LogicalNode::schema).unwrap_or_default();

        let operator = match node {
            LogicalNode::TableScan { .. } => return operators,
            LogicalNode::Filter { column, value, .. } => PhysicalOperator::Calc {
                projection: None,
                condition: Some((*column, value.clone())),
                schema: input_schema.clone(),
                input_schema,
            },
            LogicalNode::Project {
                columns, schema, ..
            } => PhysicalOperator::Calc {
                projection: Some(columns.clone()),
                condition: None,
                input_schema,
                schema: schema.clone(),
            },
            LogicalNode::Aggregate {
                group_keys,
                aggregates,
                schema,
                ..
            } => PhysicalOperator::GroupAggregate {
                group_keys: group_keys.clone(),
                aggregates: aggregates.clone(),
                emit_changelog: self.mode == RuntimeMode::Streaming,
                input_schema,
                schema: schema.clone(),
            },
        };
        operators.push(operator);
        operators
    }
}

/// Merge a pure projection into the preceding Calc
fn fuse_calcs(operators: Vec<PhysicalOperator>) -> Vec<PhysicalOperator> {
    let mut fused: Vec<PhysicalOperator> = Vec::with_capacity(operators.len());
    for op in operators {
        let fusable = matches!(
            (fused.last(), &op),
            (
                Some(PhysicalOperator::Calc { .. }),
                PhysicalOperator::Calc {
                    projection: Some(_),
                    condition: None,
                    ..
                }
            )
        );
        if !fusable {
            fused.push(op);
            continue;
        }
        if let (
            Some(PhysicalOperator::Calc {
                projection: prev_projection,
                schema: prev_schema,
                ..
            }),
            PhysicalOperator::Calc {
                projection: Some(next),
                schema,
                ..
            },
        ) = (fused.last_mut(), op)
        {
            let composed = match prev_projection.as_ref() {
                Some(prev) => next.iter().map(|&i| prev[i]).collect(),
                None => next,
            };
            *prev_projection = Some(composed);
            *prev_schema = schema;
        }
    }
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::{MemorySink, MemorySource};
    use crate::plan::AggregateCall;
    use crate::types::{DataType, Value};

    fn scan(name: &str, source: Arc<MemorySource>) -> LogicalNode {
        LogicalNode::scan(
            ObjectIdentifier::new("c", "d", name),
            ResolvedSchema::of(&[("first", DataType::String), ("last", DataType::String)]),
            source,
        )
    }

    fn target(name: &str, sink: Arc<dyn TableSink>, overwrite: bool) -> SinkTarget {
        SinkTarget {
            table: Some(ObjectIdentifier::new("c", "d", name)),
            sink,
            schema: ResolvedSchema::of(&[("v", DataType::String)]),
            overwrite,
        }
    }

    #[test]
    fn test_shared_scan_for_same_source() {
        let source = Arc::new(MemorySource::new(vec![]));
        let q1 = LogicalNode::project(scan("src", source.clone()), vec![(0, "first".into())]).unwrap();
        let q2 = LogicalNode::project(scan("src", source), vec![(1, "last".into())]).unwrap();
        let plan = PlanCompiler::new(RuntimeMode::Batch)
            .compile(&[
                PlanRequest::insert(q1, target("a", Arc::new(MemorySink::new()), false)),
                PlanRequest::insert(q2, target("b", Arc::new(MemorySink::new()), false)),
            ])
            .unwrap();
        assert_eq!(plan.scans.len(), 1);
        assert_eq!(plan.pipelines.len(), 2);
        assert!(plan.pipelines.iter().all(|p| p.scan == 0));
        assert_eq!(plan.sink_names(), vec!["c.d.a", "c.d.b"]);
    }

    #[test]
    fn test_overwrite_requires_support() {
        let source = Arc::new(MemorySource::new(vec![]));
        let query = LogicalNode::project(scan("src", source), vec![(0, "first".into())]).unwrap();
        let err = PlanCompiler::new(RuntimeMode::Batch)
            .compile(&[PlanRequest::insert(
                query,
                target("a", Arc::new(MemorySink::append_only()), true),
            )])
            .unwrap_err();
        assert!(matches!(err, TableError::UnsupportedSinkMode(name) if name == "c.d.a"));
    }

    #[test]
    fn test_updating_query_into_append_only_sink() {
        let source = Arc::new(MemorySource::new(vec![]));
        let query =
            LogicalNode::aggregate(scan("src", source), vec![], vec![AggregateCall::count_star("cnt")]).unwrap();
        let request = PlanRequest::insert(query, target("a", Arc::new(MemorySink::append_only()), false));

        let streaming = PlanCompiler::new(RuntimeMode::Streaming).compile(&[request.clone()]);
        assert!(matches!(streaming, Err(TableError::Compile(_))));
        // final results only in batch mode
        assert!(PlanCompiler::new(RuntimeMode::Batch).compile(&[request]).is_ok());
    }

    #[test]
    fn test_filter_and_projection_fuse() {
        let source = Arc::new(MemorySource::new(vec![]));
        let filtered = LogicalNode::filter(scan("src", source), 1, Value::from("x")).unwrap();
        let query = LogicalNode::project(filtered, vec![(0, "first".into())]).unwrap();
        let plan = PlanCompiler::new(RuntimeMode::Streaming)
            .compile(&[PlanRequest::collect(query)])
            .unwrap();
        let operators = &plan.pipelines[0].operators;
        assert_eq!(operators.len(), 1);
        assert_eq!(operators[0].explain_label(), "Calc(select=[first], where=[=(last, 'x')])");
    }

    #[test]
    fn test_projections_compose() {
        let source = Arc::new(MemorySource::new(vec![]));
        let inner = LogicalNode::project(scan("src", source), vec![(1, "l".into()), (0, "f".into())]).unwrap();
        let outer = LogicalNode::project(inner, vec![(1, "f2".into())]).unwrap();
        let plan = PlanCompiler::new(RuntimeMode::Streaming)
            .compile(&[PlanRequest::collect(outer)])
            .unwrap();
        match &plan.pipelines[0].operators[0] {
            PhysicalOperator::Calc { projection, .. } => assert_eq!(projection, &Some(vec![0])),
            other => panic!("unexpected operator {:?}", other),
        }
    }

    #[test]
    fn test_empty_request_list() {
        assert!(matches!(
            PlanCompiler::new(RuntimeMode::Batch).compile(&[]),
            Err(TableError::Compile(_))
        ));
    }
}
