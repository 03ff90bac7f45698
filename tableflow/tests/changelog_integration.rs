// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Integration tests for changelog results
//!
//! Aggregations in streaming mode emit a retract-encoded changelog: every
//! superseded value is deleted right after its replacement is inserted.
//! Batch mode emits only final values.

#[cfg(test)]
mod changelog_integration {
    use std::sync::Arc;
    use tableflow::connectors::{MemorySink, MemorySource};
    use tableflow::{
        DataType, EnvironmentSettings, Internal, ResolvedSchema, Row, RowKind, TableEnvironment,
        TableError, TableSink, Value,
    };

    fn create_test_environment(settings: EnvironmentSettings) -> TableEnvironment<Internal> {
        let _ = env_logger::builder().is_test(true).try_init();
        let env = TableEnvironment::create_internal(settings).expect("Failed to create environment");
        let orders = (1..=8)
            .map(|i| {
                vec![
                    Value::from(if i % 2 == 0 { "even" } else { "odd" }),
                    Value::BigInt(i * 10),
                ]
            })
            .collect();
        env.register_table_source_internal(
            "orders",
            ResolvedSchema::of(&[("parity", DataType::String), ("amount", DataType::BigInt)]),
            Arc::new(MemorySource::from_values(orders)),
        )
        .expect("Failed to register source");
        env
    }

    fn kinds(rows: &[Row]) -> Vec<RowKind> {
        rows.iter().map(Row::kind).collect()
    }

    #[test]
    fn test_running_count_emits_eight_inserts_and_seven_deletes() {
        let env = create_test_environment(EnvironmentSettings::streaming());
        let table = env.sql_query("SELECT COUNT(*) AS cnt FROM orders").unwrap();
        assert!(table.is_updating());

        let rows = table.collect().unwrap().into_rows().unwrap();
        let inserts = rows.iter().filter(|r| r.kind() == RowKind::Insert).count();
        let deletes = rows.iter().filter(|r| r.kind() == RowKind::Delete).count();
        assert_eq!(inserts, 8);
        assert_eq!(deletes, 7);

        // I(1), D(1), I(2), D(2), ... I(8)
        assert_eq!(rows[0], Row::insert(vec![Value::BigInt(1)]));
        for n in 1..8 {
            assert_eq!(rows[2 * n - 1], Row::delete(vec![Value::BigInt(n as i64)]));
            assert_eq!(rows[2 * n], Row::insert(vec![Value::BigInt(n as i64 + 1)]));
        }
    }

    #[test]
    fn test_batch_count_emits_final_value_only() {
        let env = create_test_environment(EnvironmentSettings::batch());
        let table = env.sql_query("SELECT COUNT(*) AS cnt FROM orders").unwrap();

        let rows = table.collect().unwrap().into_rows().unwrap();
        assert_eq!(rows, vec![Row::insert(vec![Value::BigInt(8)])]);
    }

    #[test]
    fn test_grouped_sum_retracts_per_key() {
        let env = create_test_environment(EnvironmentSettings::streaming());
        let result = env
            .execute_sql("SELECT parity, SUM(amount) AS total FROM orders GROUP BY parity")
            .unwrap();
        let rows = result.collect().unwrap().into_rows().unwrap();

        assert_eq!(kinds(&rows[..3]), vec![RowKind::Insert, RowKind::Insert, RowKind::Delete]);
        let odd_deletes = rows
            .iter()
            .filter(|r| r.kind() == RowKind::Delete && r.get(0) == Some(&Value::from("odd")))
            .count();
        assert_eq!(odd_deletes, 3);

        let sink = MemorySink::new();
        sink.write(&rows).unwrap();
        let mut totals = sink.materialized();
        totals.sort_by(|a, b| a[0].to_string().cmp(&b[0].to_string()));
        assert_eq!(
            totals,
            vec![
                vec![Value::from("even"), Value::BigInt(200)],
                vec![Value::from("odd"), Value::BigInt(160)],
            ]
        );
    }

    #[test]
    fn test_changelog_printed_with_op_column() {
        let env = create_test_environment(EnvironmentSettings::streaming());
        let result = env.execute_sql("SELECT COUNT(*) FROM orders").unwrap();
        let printed = result.print_to_string().unwrap();
        assert!(printed.contains("op"));
        assert!(printed.contains("-D"));
        assert!(printed.ends_with("15 rows in set"));
    }

    #[test]
    fn test_updating_table_rejected_as_insert_only_stream() {
        let env = create_test_environment(EnvironmentSettings::streaming());
        let table = env.sql_query("SELECT COUNT(*) FROM orders").unwrap();

        assert!(matches!(env.to_data_stream(&table), Err(TableError::Compile(_))));
        let stream = env.to_changelog_stream(&table).unwrap();
        assert!(stream.is_changelog());
    }

    #[test]
    fn test_updating_query_into_append_only_sink_fails_to_compile() {
        let env = create_test_environment(EnvironmentSettings::streaming());
        env.register_table_sink_internal(
            "counts",
            ResolvedSchema::of(&[("cnt", DataType::BigInt)]),
            Arc::new(MemorySink::append_only()),
        )
        .unwrap();

        let result = env.execute_sql("INSERT INTO counts SELECT COUNT(*) FROM orders");
        assert!(matches!(result, Err(TableError::Compile(_))));
    }

    #[test]
    fn test_empty_global_aggregate_emits_default_row() {
        let env = create_test_environment(EnvironmentSettings::batch());
        let rows = env
            .sql_query("SELECT COUNT(*) FROM orders WHERE parity = 'none'")
            .unwrap()
            .collect()
            .unwrap()
            .into_rows()
            .unwrap();
        assert_eq!(rows, vec![Row::insert(vec![Value::BigInt(0)])]);
    }
}
