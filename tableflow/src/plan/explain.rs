// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Plan explanation rendering
//!
//! The only part of the output that differs between two compilations of the
//! same statements is the `Stage N` numbering of the extended section.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use super::physical::{CompiledPlan, Pipeline};
use crate::config::RuntimeMode;

lazy_static! {
    static ref STAGE_ID: Regex = Regex::new(r"Stage \d+").expect("valid stage id pattern");
}

/// Replace every `Stage N` with `Stage <id>`
pub fn normalize_stage_ids(explain: &str) -> String {
    STAGE_ID.replace_all(explain, "Stage <id>").into_owned()
}

/// Render a top-down chain of node labels as an indented tree
pub(crate) fn render_chain(labels: &[String]) -> String {
    labels
        .iter()
        .enumerate()
        .map(|(depth, label)| {
            if depth == 0 {
                label.clone()
            } else {
                format!("{}+- {}", "   ".repeat(depth - 1), label)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full explanation of a compiled plan
pub fn explain_plan(plan: &CompiledPlan, extended: bool) -> String {
    let mut out = String::new();
    out.push_str("== Abstract Syntax Tree ==\n");
    out.push_str(&plan.ast);
    out.push_str("\n\n== Optimized Physical Plan ==\n");
    out.push_str(&render_physical(plan, extended));
    if extended {
        out.push_str("\n\n== Physical Execution Plan ==\n");
        out.push_str(&render_execution(plan));
    }
    out.push('\n');
    out
}

fn changelog_mode(emits_changelog: bool) -> &'static str {
    if emits_changelog {
        "I,D"
    } else {
        "I"
    }
}

fn with_changelog_mode(label: &str, emits_changelog: bool) -> String {
    match label.strip_suffix(')') {
        Some(head) if head.ends_with('(') => {
            format!("{}changelogMode=[{}])", head, changelog_mode(emits_changelog))
        }
        Some(head) => format!("{}, changelogMode=[{}])", head, changelog_mode(emits_changelog)),
        None => format!("{}(changelogMode=[{}])", label, changelog_mode(emits_changelog)),
    }
}

/// Labels of one pipeline, output first, each with its changelog flag
fn pipeline_labels(pipeline: &Pipeline) -> Vec<(String, bool)> {
    let mut emits = false;
    let mut upward = Vec::with_capacity(pipeline.operators.len() + 1);
    for op in &pipeline.operators {
        emits |= op.emits_changelog();
        upward.push((op.explain_label(), emits));
    }
    upward.push((pipeline.output_label(), emits));
    upward.reverse();
    upward
}

fn render_physical(plan: &CompiledPlan, extended: bool) -> String {
    let mut usage: HashMap<usize, usize> = HashMap::new();
    for pipeline in &plan.pipelines {
        *usage.entry(pipeline.scan).or_insert(0) += 1;
    }

    let mut reuse_ids: HashMap<usize, usize> = HashMap::new();
    let mut trees = Vec::with_capacity(plan.pipelines.len());

    for pipeline in &plan.pipelines {
        let mut labels: Vec<String> = pipeline_labels(pipeline)
            .into_iter()
            .map(|(label, emits)| {
                if extended {
                    with_changelog_mode(&label, emits)
                } else {
                    label
                }
            })
            .collect();

        let scan = &plan.scans[pipeline.scan];
        let mut scan_label = scan.explain_label();
        if extended {
            scan_label = with_changelog_mode(&scan_label, false);
        }
        let shared = usage.get(&pipeline.scan).copied().unwrap_or(0) > 1;
        if shared {
            match reuse_ids.get(&pipeline.scan) {
                Some(id) => scan_label = format!("Reused(reference_id=[{}])", id),
                None => {
                    let id = reuse_ids.len() + 1;
                    reuse_ids.insert(pipeline.scan, id);
                    scan_label = format!("{}(reuse_id=[{}])", scan_label, id);
                }
            }
        }
        labels.push(scan_label);
        trees.push(render_chain(&labels));
    }
    trees.join("\n\n")
}

fn render_execution(plan: &CompiledPlan) -> String {
    let mut blocks = Vec::new();
    for (index, scan) in plan.scans.iter().enumerate() {
        let mut block = format!(
            "Stage {} : Data Source\n\tcontent : {}\n",
            scan.stage_id,
            scan.explain_label()
        );
        for pipeline in plan.pipelines.iter().filter(|p| p.scan == index) {
            for (depth, op) in pipeline.operators.iter().enumerate() {
                let indent = "\t".repeat(depth + 1);
                block.push_str(&format!(
                    "\n{indent}Stage {} : Operator\n{indent}\tcontent : {}\n{indent}\tship_strategy : {}\n",
                    pipeline.stage_ids[depth],
                    op.explain_label(),
                    op.ship_strategy(),
                    indent = indent
                ));
            }
            let depth = pipeline.operators.len();
            let indent = "\t".repeat(depth + 1);
            block.push_str(&format!(
                "\n{indent}Stage {} : Data Sink\n{indent}\tcontent : {}\n{indent}\tship_strategy : FORWARD\n",
                pipeline.stage_ids[depth],
                pipeline.output_label(),
                indent = indent
            ));
        }
        blocks.push(block);
    }
    let mode = match plan.runtime_mode {
        RuntimeMode::Streaming => "STREAMING",
        RuntimeMode::Batch => "BATCH",
    };
    format!("Execution mode : {}\n\n{}", mode, blocks.join("\n")).trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_chain() {
        let labels = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        assert_eq!(render_chain(&labels), "A\n+- B\n   +- C");
    }

    #[test]
    fn test_normalize_stage_ids() {
        let text = "Stage 12 : Data Source\n\tStage 130 : Operator";
        assert_eq!(
            normalize_stage_ids(text),
            "Stage <id> : Data Source\n\tStage <id> : Operator"
        );
    }

    #[test]
    fn test_changelog_mode_annotation() {
        assert_eq!(with_changelog_mode("Calc(select=[a])", true), "Calc(select=[a], changelogMode=[I,D])");
        assert_eq!(with_changelog_mode("StreamMap", false), "StreamMap(changelogMode=[I])");
        assert_eq!(with_changelog_mode("Calc()", false), "Calc(changelogMode=[I])");
    }
}
