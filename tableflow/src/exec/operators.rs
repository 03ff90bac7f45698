// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Runtime state of physical operators
//!
//! Each pipeline of a running job owns one `OperatorChain`. Rows are pushed
//! through the chain one at a time; operators holding state (aggregations)
//! get a final `finish` call once the source is exhausted.

use std::collections::HashMap;

use crate::plan::physical::{PhysicalOperator, StreamTransform};
use crate::plan::{AggregateCall, AggregateFunction};
use crate::types::{DataType, ResolvedSchema, Row, Value};

/// Running aggregate value of one call within one group
#[derive(Debug, Clone)]
enum Accumulator {
    Count { argument: Option<usize>, count: i64 },
    SumBigInt { argument: usize, sum: i64, count: i64 },
    SumDouble { argument: usize, sum: f64, count: i64 },
}

impl Accumulator {
    fn new(call: &AggregateCall, input_schema: &ResolvedSchema) -> Self {
        match (call.function, call.argument) {
            (AggregateFunction::Count, argument) => Accumulator::Count { argument, count: 0 },
            (AggregateFunction::Sum, Some(argument)) => {
                match input_schema.column(argument).map(|c| c.data_type) {
                    Some(DataType::Double) => Accumulator::SumDouble {
                        argument,
                        sum: 0.0,
                        count: 0,
                    },
                    _ => Accumulator::SumBigInt {
                        argument,
                        sum: 0,
                        count: 0,
                    },
                }
            }
            // rejected when the logical plan is built
            (AggregateFunction::Sum, None) => Accumulator::Count {
                argument: None,
                count: 0,
            },
        }
    }

    /// Add (`sign` = 1) or retract (`sign` = -1) one input row
    fn update(&mut self, row: &Row, sign: i64) {
        match self {
            Accumulator::Count { argument, count } => {
                let counted = match argument {
                    Some(index) => row.get(*index).map(|v| !v.is_null()).unwrap_or(false),
                    None => true,
                };
                if counted {
                    *count += sign;
                }
            }
            Accumulator::SumBigInt { argument, sum, count } => {
                if let Some(Value::BigInt(v)) = row.get(*argument) {
                    *sum = sum.wrapping_add(sign.wrapping_mul(*v));
                    *count += sign;
                }
            }
            Accumulator::SumDouble { argument, sum, count } => {
                match row.get(*argument) {
                    Some(Value::Double(v)) => {
                        *sum += sign as f64 * v;
                        *count += sign;
                    }
                    Some(Value::BigInt(v)) => {
                        *sum += sign as f64 * *v as f64;
                        *count += sign;
                    }
                    _ => {}
                }
            }
        }
    }

    fn value(&self) -> Value {
        match self {
            Accumulator::Count { count, .. } => Value::BigInt(*count),
            Accumulator::SumBigInt { count, .. } | Accumulator::SumDouble { count, .. }
                if *count <= 0 =>
            {
                Value::Null
            }
            Accumulator::SumBigInt { sum, .. } => Value::BigInt(*sum),
            Accumulator::SumDouble { sum, .. } => Value::Double(*sum),
        }
    }
}

#[derive(Debug)]
struct GroupState {
    rows: i64,
    accumulators: Vec<Accumulator>,
    /// Last values emitted downstream, for changelog output
    emitted: Option<Vec<Value>>,
}

/// Hash aggregation over group keys
#[derive(Debug)]
pub(crate) struct GroupAggregateState {
    group_keys: Vec<usize>,
    prototypes: Vec<Accumulator>,
    emit_changelog: bool,
    groups: HashMap<Vec<Value>, GroupState>,
    /// Group keys in first-seen order
    order: Vec<Vec<Value>>,
}

impl GroupAggregateState {
    pub(crate) fn new(
        group_keys: &[usize],
        aggregates: &[AggregateCall],
        input_schema: &ResolvedSchema,
        emit_changelog: bool,
    ) -> Self {
        Self {
            group_keys: group_keys.to_vec(),
            prototypes: aggregates
                .iter()
                .map(|call| Accumulator::new(call, input_schema))
                .collect(),
            emit_changelog,
            groups: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn result_values(key: &[Value], group: &GroupState) -> Vec<Value> {
        let mut values = key.to_vec();
        values.extend(group.accumulators.iter().map(Accumulator::value));
        values
    }

    pub(crate) fn process(&mut self, row: Row, out: &mut Vec<Row>) {
        let key: Vec<Value> = self
            .group_keys
            .iter()
            .map(|&i| row.get(i).cloned().unwrap_or(Value::Null))
            .collect();
        let sign = if row.kind().is_accumulate() { 1 } else { -1 };

        if !self.groups.contains_key(&key) {
            self.order.push(key.clone());
        }
        let prototypes = &self.prototypes;
        let group = self.groups.entry(key.clone()).or_insert_with(|| GroupState {
            rows: 0,
            accumulators: prototypes.clone(),
            emitted: None,
        });
        group.rows += sign;
        for accumulator in &mut group.accumulators {
            accumulator.update(&row, sign);
        }

        if !self.emit_changelog {
            return;
        }
        let current = if group.rows > 0 {
            Some(Self::result_values(&key, group))
        } else {
            None
        };
        if current == group.emitted {
            return;
        }
        if let Some(previous) = group.emitted.take() {
            out.push(Row::delete(previous));
        }
        if let Some(values) = &current {
            out.push(Row::insert(values.clone()));
        }
        group.emitted = current;
    }

    /// Final results; only used when no changelog is emitted
    pub(crate) fn finish(&mut self, out: &mut Vec<Row>) {
        if self.emit_changelog {
            return;
        }
        if self.group_keys.is_empty() && self.order.is_empty() {
            // a global aggregate over no rows still yields one row
            let empty = GroupState {
                rows: 0,
                accumulators: self.prototypes.clone(),
                emitted: None,
            };
            out.push(Row::insert(Self::result_values(&[], &empty)));
            return;
        }
        for key in &self.order {
            if let Some(group) = self.groups.get(key) {
                if group.rows > 0 {
                    out.push(Row::insert(Self::result_values(key, group)));
                }
            }
        }
    }
}

/// One operator of a running pipeline
#[derive(Debug)]
pub(crate) enum OperatorState {
    Calc {
        projection: Option<Vec<usize>>,
        condition: Option<(usize, Value)>,
    },
    Aggregate(GroupAggregateState),
    Transform(StreamTransform),
}

impl OperatorState {
    pub(crate) fn from_physical(operator: &PhysicalOperator) -> Self {
        match operator {
            PhysicalOperator::Calc {
                projection,
                condition,
                ..
            } => OperatorState::Calc {
                projection: projection.clone(),
                condition: condition.clone(),
            },
            PhysicalOperator::GroupAggregate {
                group_keys,
                aggregates,
                emit_changelog,
                input_schema,
                ..
            } => OperatorState::Aggregate(GroupAggregateState::new(
                group_keys,
                aggregates,
                input_schema,
                *emit_changelog,
            )),
            PhysicalOperator::Transform(transform) => OperatorState::Transform(transform.clone()),
        }
    }

    fn process(&mut self, row: Row, out: &mut Vec<Row>) {
        match self {
            OperatorState::Calc {
                projection,
                condition,
            } => {
                if let Some((column, value)) = condition {
                    if row.get(*column) != Some(&*value) {
                        return;
                    }
                }
                match projection {
                    Some(indices) => out.push(row.project(indices)),
                    None => out.push(row),
                }
            }
            OperatorState::Aggregate(state) => state.process(row, out),
            OperatorState::Transform(StreamTransform::Map(f)) => {
                let kind = row.kind();
                out.push((f.as_ref())(row).with_kind(kind));
            }
            OperatorState::Transform(StreamTransform::Filter(f)) => {
                if (f.as_ref())(&row) {
                    out.push(row);
                }
            }
        }
    }

    fn finish(&mut self, out: &mut Vec<Row>) {
        if let OperatorState::Aggregate(state) = self {
            state.finish(out);
        }
    }
}

/// Operators of one pipeline, applied in order
#[derive(Debug)]
pub(crate) struct OperatorChain {
    operators: Vec<OperatorState>,
}

impl OperatorChain {
    pub(crate) fn new(operators: &[PhysicalOperator]) -> Self {
        Self {
            operators: operators.iter().map(OperatorState::from_physical).collect(),
        }
    }

    /// Push one source row through the chain
    pub(crate) fn push(&mut self, row: Row, out: &mut Vec<Row>) {
        push_from(&mut self.operators, row, out);
    }

    /// Flush stateful operators front to back
    pub(crate) fn finish(&mut self, out: &mut Vec<Row>) {
        for index in 0..self.operators.len() {
            let mut produced = Vec::new();
            self.operators[index].finish(&mut produced);
            for row in produced {
                push_from(&mut self.operators[index + 1..], row, out);
            }
        }
    }
}

fn push_from(operators: &mut [OperatorState], row: Row, out: &mut Vec<Row>) {
    match operators.split_first_mut() {
        None => out.push(row),
        Some((first, rest)) => {
            let mut produced = Vec::new();
            first.process(row, &mut produced);
            for next in produced {
                push_from(rest, next, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowKind;
    use std::sync::Arc;

    fn schema() -> ResolvedSchema {
        ResolvedSchema::of(&[("city", DataType::String), ("amount", DataType::BigInt)])
    }

    fn row(city: &str, amount: i64) -> Row {
        Row::insert(vec![Value::from(city), Value::BigInt(amount)])
    }

    fn run(chain: &mut OperatorChain, rows: Vec<Row>) -> Vec<Row> {
        let mut out = Vec::new();
        for r in rows {
            chain.push(r, &mut out);
        }
        chain.finish(&mut out);
        out
    }

    fn count_operator(keys: Vec<usize>, emit_changelog: bool) -> PhysicalOperator {
        PhysicalOperator::GroupAggregate {
            group_keys: keys,
            aggregates: vec![AggregateCall::count_star("cnt")],
            emit_changelog,
            input_schema: schema(),
            schema: ResolvedSchema::default(),
        }
    }

    #[test]
    fn test_streaming_count_emits_retract_changelog() {
        let mut chain = OperatorChain::new(&[count_operator(vec![], true)]);
        let out = run(&mut chain, (0..8).map(|i| row("x", i)).collect());

        let inserts = out.iter().filter(|r| r.kind() == RowKind::Insert).count();
        let deletes = out.iter().filter(|r| r.kind() == RowKind::Delete).count();
        assert_eq!(inserts, 8);
        assert_eq!(deletes, 7);
        assert_eq!(out[1], Row::delete(vec![Value::BigInt(1)]));
        assert_eq!(out.last().unwrap(), &Row::insert(vec![Value::BigInt(8)]));
    }

    #[test]
    fn test_batch_aggregate_emits_final_rows_in_first_seen_order() {
        let op = PhysicalOperator::GroupAggregate {
            group_keys: vec![0],
            aggregates: vec![
                AggregateCall::count_star("cnt"),
                AggregateCall::new(AggregateFunction::Sum, 1, "total"),
            ],
            emit_changelog: false,
            input_schema: schema(),
            schema: ResolvedSchema::default(),
        };
        let mut chain = OperatorChain::new(&[op]);
        let out = run(&mut chain, vec![row("b", 1), row("a", 2), row("b", 3)]);
        assert_eq!(
            out,
            vec![
                Row::insert(vec![Value::from("b"), Value::BigInt(2), Value::BigInt(4)]),
                Row::insert(vec![Value::from("a"), Value::BigInt(1), Value::BigInt(2)]),
            ]
        );
    }

    #[test]
    fn test_double_sum_retracts_extreme_integers() {
        let input = ResolvedSchema::of(&[("amount", DataType::Double)]);
        let call = AggregateCall::new(AggregateFunction::Sum, 0, "total");
        let mut acc = Accumulator::new(&call, &input);
        let extreme = Row::insert(vec![Value::BigInt(i64::MIN)]);

        acc.update(&extreme, 1);
        acc.update(&extreme, 1);
        acc.update(&extreme, -1);
        assert_eq!(acc.value(), Value::Double(i64::MIN as f64));
    }

    #[test]
    fn test_global_aggregate_over_empty_input() {
        let mut chain = OperatorChain::new(&[count_operator(vec![], false)]);
        assert_eq!(run(&mut chain, vec![]), vec![Row::insert(vec![Value::BigInt(0)])]);

        let mut grouped = OperatorChain::new(&[count_operator(vec![0], false)]);
        assert!(run(&mut grouped, vec![]).is_empty());
    }

    #[test]
    fn test_retraction_input_removes_group() {
        let mut chain = OperatorChain::new(&[count_operator(vec![0], true)]);
        let out = run(
            &mut chain,
            vec![row("a", 1), row("a", 1).with_kind(RowKind::Delete)],
        );
        assert_eq!(
            out,
            vec![
                Row::insert(vec![Value::from("a"), Value::BigInt(1)]),
                Row::delete(vec![Value::from("a"), Value::BigInt(1)]),
            ]
        );
    }

    #[test]
    fn test_calc_then_transforms() {
        let calc = PhysicalOperator::Calc {
            projection: Some(vec![1]),
            condition: Some((0, Value::from("a"))),
            input_schema: schema(),
            schema: ResolvedSchema::default(),
        };
        let double = PhysicalOperator::Transform(StreamTransform::Map(Arc::new(|r: Row| {
            let v = r.get(0).and_then(Value::as_i64).unwrap_or(0);
            Row::insert(vec![Value::BigInt(v * 2)])
        })));
        let positive = PhysicalOperator::Transform(StreamTransform::Filter(Arc::new(|r: &Row| {
            r.get(0).and_then(Value::as_i64).unwrap_or(0) > 2
        })));
        let mut chain = OperatorChain::new(&[calc, double, positive]);
        let out = run(&mut chain, vec![row("a", 1), row("b", 5), row("a", 4)]);
        assert_eq!(out, vec![Row::insert(vec![Value::BigInt(8)])]);
    }
}
