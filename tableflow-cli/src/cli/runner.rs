// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Script execution for the `run` and `explain` commands

use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table as TextTable;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

use super::commands::OutputFormat;
use tableflow::sql::{split_statements, SimpleSqlParser, SqlParser, SqlStatement};
use tableflow::{
    EnvironmentSettings, RuntimeMode, StatementSet, TableEnvironment, TableError, TableResult,
    Value,
};

/// Errors raised while running a script
#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error("Statement {index}: {message}")]
    Script { index: usize, message: String },
}

/// What a runner does with INSERT and SELECT statements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptAction {
    Execute,
    Explain { extended: bool },
}

/// One line of the run summary
#[derive(Debug, Clone)]
struct StatementOutcome {
    label: String,
    elapsed_ms: u128,
}

/// Runs the statements of a script against one table environment
pub struct ScriptRunner {
    env: TableEnvironment,
    action: ScriptAction,
    format: OutputFormat,
    open_set: Option<StatementSet>,
    outcomes: Vec<StatementOutcome>,
}

impl ScriptRunner {
    pub fn new(settings: EnvironmentSettings, action: ScriptAction, format: OutputFormat) -> Result<Self, CliError> {
        Ok(Self {
            env: TableEnvironment::create(settings)?,
            action,
            format,
            open_set: None,
            outcomes: Vec::new(),
        })
    }

    /// Run every statement of `script`, returning the rendered output of each
    pub fn run_script(&mut self, script: &str) -> Result<Vec<String>, CliError> {
        let statements = split_statements(script);
        info!("Running script with {} statement(s)", statements.len());

        let mut outputs = Vec::new();
        for (index, statement) in statements.iter().enumerate() {
            let started = Instant::now();
            let output = self
                .run_statement(statement)
                .map_err(|e| match e {
                    CliError::Table(e) => CliError::Script {
                        index: index + 1,
                        message: e.to_string(),
                    },
                    other => other,
                })?;
            self.outcomes.push(StatementOutcome {
                label: summarize(statement),
                elapsed_ms: started.elapsed().as_millis(),
            });
            outputs.extend(output);
        }

        if self.open_set.is_some() {
            return Err(CliError::Script {
                index: statements.len(),
                message: "statement set is not closed with END".to_string(),
            });
        }
        Ok(outputs)
    }

    fn run_statement(&mut self, statement: &str) -> Result<Option<String>, CliError> {
        match normalized_keywords(statement).as_str() {
            "BEGIN STATEMENT SET" => {
                if self.open_set.is_some() {
                    return Err(TableError::InvalidState(
                        "statement sets cannot be nested".to_string(),
                    )
                    .into());
                }
                debug!("Opening statement set");
                self.open_set = Some(self.env.create_statement_set());
                return Ok(None);
            }
            "END" => {
                let mut set = self.open_set.take().ok_or_else(|| {
                    TableError::InvalidState("END without BEGIN STATEMENT SET".to_string())
                })?;
                return match self.action {
                    ScriptAction::Explain { extended } => Ok(Some(set.explain(extended)?)),
                    ScriptAction::Execute => {
                        let result = set.execute()?;
                        Ok(Some(self.render(&result)?))
                    }
                };
            }
            _ => {}
        }

        if let Some(set) = self.open_set.as_mut() {
            set.add_insert_sql(statement)?;
            return Ok(None);
        }

        match self.action {
            ScriptAction::Execute => {
                let result = self.env.execute_sql(statement)?;
                Ok(Some(self.render(&result)?))
            }
            ScriptAction::Explain { extended } => match SimpleSqlParser.parse(statement)? {
                SqlStatement::Insert(_) | SqlStatement::Select(_) => {
                    Ok(Some(self.env.explain_sql(statement, extended)?))
                }
                _ => {
                    self.env.execute_sql(statement)?;
                    Ok(None)
                }
            },
        }
    }

    fn render(&self, result: &TableResult) -> Result<String, CliError> {
        match self.format {
            OutputFormat::Table => Ok(result.print_to_string()?),
            OutputFormat::Json => render_json(result),
        }
    }

    /// Per-statement timing table
    pub fn summary(&self) -> String {
        let mut table = TextTable::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["#", "Statement", "Time (ms)"]);
        for (index, outcome) in self.outcomes.iter().enumerate() {
            table.add_row(vec![
                (index + 1).to_string(),
                outcome.label.clone(),
                outcome.elapsed_ms.to_string(),
            ]);
        }
        table.to_string()
    }
}

/// Upper-cased statement with collapsed whitespace, without trailing `;`
fn normalized_keywords(statement: &str) -> String {
    statement
        .trim()
        .trim_end_matches(';')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

fn summarize(statement: &str) -> String {
    let flat = statement.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > 60 {
        format!("{}...", flat.chars().take(57).collect::<String>())
    } else {
        flat
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::BigInt(i) => serde_json::Value::from(*i),
        Value::Double(d) => serde_json::Number::from_f64(*d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Boolean(b) => serde_json::Value::Bool(*b),
    }
}

fn render_json(result: &TableResult) -> Result<String, CliError> {
    let names = result.resolved_schema().column_names();
    let rows = result.collect()?.into_rows()?;
    let rows: Vec<serde_json::Value> = rows
        .iter()
        .map(|row| {
            let mut object = serde_json::Map::new();
            object.insert(
                "op".to_string(),
                serde_json::Value::String(row.kind().short_string().to_string()),
            );
            for (name, value) in names.iter().zip(row.values()) {
                object.insert(name.clone(), value_to_json(value));
            }
            serde_json::Value::Object(object)
        })
        .collect();
    serde_json::to_string_pretty(&rows).map_err(|e| CliError::Script {
        index: 0,
        message: format!("cannot render JSON: {}", e),
    })
}

/// Environment settings from an optional JSON file and mode override
pub fn load_settings(
    config: Option<&Path>,
    mode: Option<RuntimeMode>,
) -> Result<EnvironmentSettings, CliError> {
    let settings = match config {
        Some(path) => EnvironmentSettings::from_json_file(path)?,
        None => EnvironmentSettings::default(),
    };
    Ok(match mode {
        Some(mode) => settings.with_runtime_mode(mode),
        None => settings,
    })
}

/// Handle the run command
pub fn handle_run(
    script: PathBuf,
    mode: Option<RuntimeMode>,
    config: Option<PathBuf>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_settings(config.as_deref(), mode)?;
    let text = std::fs::read_to_string(&script)?;
    println!(
        "{}",
        format!("Running {:?} in {} mode", script, settings.runtime_mode)
            .bold()
            .green()
    );

    let mut runner = ScriptRunner::new(settings, ScriptAction::Execute, format)?;
    for output in runner.run_script(&text)? {
        println!("{}\n", output);
    }
    if format == OutputFormat::Table {
        println!("{}", runner.summary());
    }
    Ok(())
}

/// Handle the explain command
pub fn handle_explain(
    script: PathBuf,
    extended: bool,
    mode: Option<RuntimeMode>,
    config: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_settings(config.as_deref(), mode)?;
    let text = std::fs::read_to_string(&script)?;

    let mut runner = ScriptRunner::new(
        settings,
        ScriptAction::Explain { extended },
        OutputFormat::Table,
    )?;
    for output in runner.run_script(&text)? {
        println!("{}\n", output);
    }
    Ok(())
}

/// Handle the version command
pub fn handle_version() {
    println!("{}", format!("tableflow {}", env!("CARGO_PKG_VERSION")).bold().green());
    println!("  Runtime modes: {}, {}", RuntimeMode::Streaming, RuntimeMode::Batch);
    println!("  Connectors:    filesystem (csv), blackhole");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn script(dir: &Path) -> String {
        let source = dir.join("people.csv");
        fs::write(&source, "Ada,Lovelace\nAlan,Turing\n").unwrap();
        format!(
            "CREATE TABLE people (first STRING, last STRING) \
                 WITH ('connector' = 'filesystem', 'path' = '{}');\n\
             CREATE TABLE firsts (name STRING) \
                 WITH ('connector' = 'filesystem', 'path' = '{}');\n\
             CREATE TABLE lasts (name STRING) \
                 WITH ('connector' = 'filesystem', 'path' = '{}');\n\
             -- both inserts share one job\n\
             BEGIN STATEMENT SET;\n\
             INSERT INTO firsts SELECT first FROM people;\n\
             INSERT INTO lasts SELECT last FROM people;\n\
             END;\n",
            source.display(),
            dir.join("firsts.csv").display(),
            dir.join("lasts.csv").display()
        )
    }

    #[test]
    fn test_run_statement_set_script() {
        let temp_dir = TempDir::new().unwrap();
        let mut runner = ScriptRunner::new(
            EnvironmentSettings::batch(),
            ScriptAction::Execute,
            OutputFormat::Table,
        )
        .unwrap();

        let outputs = runner.run_script(&script(temp_dir.path())).unwrap();
        // three DDL results plus one statement set result
        assert_eq!(outputs.len(), 4);
        assert!(outputs[3].contains("default_catalog.default_database.firsts"));
        assert!(outputs[3].contains("default_catalog.default_database.lasts"));

        let firsts = fs::read_to_string(temp_dir.path().join("firsts.csv")).unwrap();
        assert_eq!(firsts, "Ada\nAlan\n");
        assert!(runner.summary().contains("BEGIN STATEMENT SET"));
    }

    #[test]
    fn test_explain_script_runs_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let mut runner = ScriptRunner::new(
            EnvironmentSettings::batch(),
            ScriptAction::Explain { extended: false },
            OutputFormat::Table,
        )
        .unwrap();

        let outputs = runner.run_script(&script(temp_dir.path())).unwrap();
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].contains("== Optimized Physical Plan =="));
        assert!(!temp_dir.path().join("firsts.csv").exists());
    }

    #[test]
    fn test_unclosed_statement_set_rejected() {
        let mut runner = ScriptRunner::new(
            EnvironmentSettings::batch(),
            ScriptAction::Execute,
            OutputFormat::Table,
        )
        .unwrap();
        let result = runner.run_script("BEGIN STATEMENT SET;");
        assert!(matches!(result, Err(CliError::Script { .. })));
    }

    #[test]
    fn test_json_output() {
        let temp_dir = TempDir::new().unwrap();
        let mut runner = ScriptRunner::new(
            EnvironmentSettings::batch(),
            ScriptAction::Execute,
            OutputFormat::Json,
        )
        .unwrap();
        let source = temp_dir.path().join("people.csv");
        fs::write(&source, "Ada,Lovelace\n").unwrap();
        let outputs = runner
            .run_script(&format!(
                "CREATE TABLE people (first STRING, last STRING) \
                 WITH ('connector' = 'filesystem', 'path' = '{}');\n\
                 SELECT last FROM people;",
                source.display()
            ))
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&outputs[1]).unwrap();
        assert_eq!(parsed[0]["last"], "Lovelace");
        assert_eq!(parsed[0]["op"], "+I");
    }

    #[test]
    fn test_load_settings_with_mode_override() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        fs::write(&path, r#"{"default_database": "analytics"}"#).unwrap();

        let settings = load_settings(Some(&path), Some(RuntimeMode::Batch)).unwrap();
        assert_eq!(settings.default_database, "analytics");
        assert_eq!(settings.runtime_mode, RuntimeMode::Batch);
    }
}
