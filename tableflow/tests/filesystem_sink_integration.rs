// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Integration tests for SQL-registered filesystem tables
//!
//! Each submission writes only its own targets: executing a later statement
//! set never replays statements of an earlier one.

#[cfg(test)]
mod filesystem_sink_integration {
    use std::fs;
    use std::path::{Path, PathBuf};
    use tableflow::{EnvironmentSettings, TableEnvironment, TableError};
    use tempfile::TempDir;

    const PEOPLE: &str = "\
Ada,Lovelace
Alan,Turing
Grace,Hopper
Edsger,Dijkstra
Barbara,Liskov
Donald,Knuth
Frances,Allen
John,Backus
";

    /// Helper function to create an environment with a CSV source table
    fn create_test_environment() -> (TableEnvironment, TempDir) {
        let _ = env_logger::builder().is_test(true).try_init();
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source_path = temp_dir.path().join("people.csv");
        fs::write(&source_path, PEOPLE).expect("Failed to write source file");

        let env = TableEnvironment::create(EnvironmentSettings::batch())
            .expect("Failed to create environment");
        env.execute_sql(&format!(
            "CREATE TABLE people (first STRING, last STRING) \
             WITH ('connector' = 'filesystem', 'path' = '{}', 'format' = 'csv')",
            source_path.display()
        ))
        .expect("Failed to create source table");

        (env, temp_dir)
    }

    fn create_sink(env: &TableEnvironment, name: &str, path: &Path) {
        env.execute_sql(&format!(
            "CREATE TABLE {} (name STRING) WITH ('connector' = 'filesystem', 'path' = '{}')",
            name,
            path.display()
        ))
        .expect("Failed to create sink table");
    }

    fn sorted_lines(path: &PathBuf) -> Vec<String> {
        let mut lines: Vec<String> = fs::read_to_string(path)
            .expect("Failed to read sink file")
            .lines()
            .map(str::to_string)
            .collect();
        lines.sort();
        lines
    }

    fn expected(column: usize) -> Vec<String> {
        let mut values: Vec<String> = PEOPLE
            .lines()
            .map(|line| line.split(',').nth(column).unwrap_or_default().to_string())
            .collect();
        values.sort();
        values
    }

    #[test]
    fn test_independent_statement_sets_write_only_their_own_sinks() {
        let (env, temp_dir) = create_test_environment();
        let sink_path = temp_dir.path().join("first.csv");
        let sink2_path = temp_dir.path().join("last.csv");
        create_sink(&env, "Sink", &sink_path);
        create_sink(&env, "Sink2", &sink2_path);

        let mut first = env.create_statement_set();
        first
            .add_insert_sql("INSERT INTO Sink SELECT first FROM people")
            .unwrap();
        first.execute().expect("First statement set failed");
        assert_eq!(sorted_lines(&sink_path), expected(0));

        fs::remove_file(&sink_path).expect("Failed to delete sink file");

        let mut second = env.create_statement_set();
        second
            .add_insert_sql("INSERT INTO Sink2 SELECT last FROM people")
            .unwrap();
        second.execute().expect("Second statement set failed");

        assert!(!sink_path.exists(), "first sink must not be written again");
        assert_eq!(sorted_lines(&sink2_path), expected(1));
    }

    #[test]
    fn test_overwrite_twice_yields_same_content() {
        let (env, temp_dir) = create_test_environment();
        let sink_path = temp_dir.path().join("names.csv");
        create_sink(&env, "names", &sink_path);

        env.execute_sql("INSERT OVERWRITE names SELECT first FROM people")
            .unwrap();
        let after_first = fs::read_to_string(&sink_path).unwrap();

        env.execute_sql("INSERT OVERWRITE names SELECT first FROM people")
            .unwrap();
        let after_second = fs::read_to_string(&sink_path).unwrap();

        assert_eq!(after_first, after_second);
        assert_eq!(after_second.lines().count(), 8);
    }

    #[test]
    fn test_append_accumulates_content() {
        let (env, temp_dir) = create_test_environment();
        let sink_path = temp_dir.path().join("names.csv");
        create_sink(&env, "names", &sink_path);

        env.execute_sql("INSERT INTO names SELECT first FROM people")
            .unwrap();
        env.execute_sql("INSERT INTO names SELECT first FROM people")
            .unwrap();
        assert_eq!(fs::read_to_string(&sink_path).unwrap().lines().count(), 16);
    }

    #[test]
    fn test_show_tables_lists_registered_names() {
        let (env, temp_dir) = create_test_environment();
        create_sink(&env, "names", &temp_dir.path().join("names.csv"));

        let rows = env
            .execute_sql("SHOW TABLES")
            .unwrap()
            .collect()
            .unwrap()
            .into_rows()
            .unwrap();
        let names: Vec<String> = rows.iter().map(|r| r.values()[0].to_string()).collect();
        assert_eq!(names, vec!["names".to_string(), "people".to_string()]);
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let (env, temp_dir) = create_test_environment();
        let path = temp_dir.path().join("again.csv");
        let result = env.execute_sql(&format!(
            "CREATE TABLE people (first STRING) WITH ('connector' = 'filesystem', 'path' = '{}')",
            path.display()
        ));
        assert!(matches!(result, Err(TableError::DuplicateName(_))));
    }

    #[test]
    fn test_missing_source_file_fails_at_runtime() {
        let (env, temp_dir) = create_test_environment();
        let sink_path = temp_dir.path().join("names.csv");
        create_sink(&env, "names", &sink_path);
        fs::remove_file(temp_dir.path().join("people.csv")).unwrap();

        let result = env.execute_sql("INSERT INTO names SELECT first FROM people");
        assert!(matches!(result, Err(TableError::RuntimeExecution { .. })));
        assert!(!sink_path.exists());
    }
}
