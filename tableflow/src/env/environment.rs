// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Table environment - entry point for registering tables and running SQL
//!
//! Whether an environment can register connector objects directly is part
//! of its type: `TableEnvironment<Internal>` has the extra registration
//! methods, `TableEnvironment<Public>` (the default) does not.

use log::{debug, info};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::context::EnvContext;
use super::table::Table;
use crate::catalog::TableBinding;
use crate::config::{EnvironmentSettings, RuntimeMode};
use crate::connectors::{ConnectorFactory, TableDescriptor, TableSink, TableSource};
use crate::error::{Result, TableError};
use crate::exec::statement_set::{insert_job_name, Statement};
use crate::exec::{
    ExecutionBackend, ExecutionController, ExecutionServices, LocalExecutor, StatementSet,
    TableResult,
};
use crate::plan::{PlanCompiler, PlanRequest};
use crate::sql::{CreateTableStatement, SimpleSqlParser, SqlParser, SqlStatement};
use crate::stream::{DataStream, StreamEnvironment};
use crate::types::{Column, DataType, ResolvedSchema, Row, Value};

mod sealed {
    pub trait Sealed {}
}

/// Capability marker of a table environment
pub trait EnvironmentMode: sealed::Sealed + Send + Sync + 'static {}

/// Registration through descriptors and views only
#[derive(Debug, Clone, Copy, Default)]
pub struct Public;

/// Additionally registers source and sink objects directly
#[derive(Debug, Clone, Copy, Default)]
pub struct Internal;

impl sealed::Sealed for Public {}
impl sealed::Sealed for Internal {}
impl EnvironmentMode for Public {}
impl EnvironmentMode for Internal {}

pub struct TableEnvironment<M: EnvironmentMode = Public> {
    ctx: Arc<EnvContext>,
    streams: StreamEnvironment,
    _mode: PhantomData<M>,
}

impl<M: EnvironmentMode> fmt::Debug for TableEnvironment<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableEnvironment")
            .field("settings", &self.ctx.settings)
            .finish()
    }
}

impl TableEnvironment<Public> {
    /// Environment running jobs on the local backend
    pub fn create(settings: EnvironmentSettings) -> Result<Self> {
        Self::with_local_backend(settings)
    }
}

impl TableEnvironment<Internal> {
    pub fn create_internal(settings: EnvironmentSettings) -> Result<Self> {
        Self::with_local_backend(settings)
    }

    /// Register a source object under `name`
    pub fn register_table_source_internal(
        &self,
        name: &str,
        schema: ResolvedSchema,
        source: Arc<dyn TableSource>,
    ) -> Result<()> {
        self.ctx.register(name, TableBinding::source(schema, source))?;
        Ok(())
    }

    /// Register a sink object under `name`
    pub fn register_table_sink_internal(
        &self,
        name: &str,
        schema: ResolvedSchema,
        sink: Arc<dyn TableSink>,
    ) -> Result<()> {
        self.ctx.register(name, TableBinding::sink(schema, sink))?;
        Ok(())
    }
}

impl<M: EnvironmentMode> TableEnvironment<M> {
    fn with_local_backend(settings: EnvironmentSettings) -> Result<Self> {
        settings.validate()?;
        let backend = LocalExecutor::new(settings.result_buffer_capacity)?;
        Self::with_backend(settings, Arc::new(backend))
    }

    /// Environment running jobs on the given backend
    pub fn with_backend(settings: EnvironmentSettings, backend: Arc<dyn ExecutionBackend>) -> Result<Self> {
        Self::with_backend_and_parser(settings, backend, Box::new(SimpleSqlParser))
    }

    pub fn with_backend_and_parser(
        settings: EnvironmentSettings,
        backend: Arc<dyn ExecutionBackend>,
        parser: Box<dyn SqlParser>,
    ) -> Result<Self> {
        settings.validate()?;
        let services = ExecutionServices::new(PlanCompiler::new(settings.runtime_mode), backend);
        info!(
            "Created {} table environment ({}.{})",
            settings.runtime_mode, settings.default_catalog, settings.default_database
        );
        Ok(Self {
            streams: StreamEnvironment::new(services.clone()),
            ctx: Arc::new(EnvContext::new(settings, services, parser)),
            _mode: PhantomData,
        })
    }

    pub fn settings(&self) -> &EnvironmentSettings {
        &self.ctx.settings
    }

    pub fn runtime_mode(&self) -> RuntimeMode {
        self.ctx.settings.runtime_mode
    }

    /// Register a connector table described by `descriptor`
    pub fn create_temporary_table(&self, name: &str, descriptor: TableDescriptor) -> Result<()> {
        if self.ctx.contains(name)? {
            return Err(TableError::DuplicateName(self.ctx.identifier(name)?.as_summary_string()));
        }
        let instance = ConnectorFactory::create(&descriptor)?;
        self.ctx.register(
            name,
            TableBinding::connector(descriptor.schema, instance.source, instance.sink),
        )?;
        Ok(())
    }

    /// Register a query under `name`
    pub fn create_temporary_view(&self, name: &str, table: &Table) -> Result<()> {
        self.ctx
            .register(name, TableBinding::view(table.logical_plan().clone()))?;
        Ok(())
    }

    /// Table reading a registered source or view
    pub fn from_path(&self, name: &str) -> Result<Table> {
        Ok(Table::new(self.ctx.clone(), self.ctx.scan(name)?))
    }

    /// Plan a SELECT statement without running it
    pub fn sql_query(&self, sql: &str) -> Result<Table> {
        match self.ctx.parse(sql)? {
            SqlStatement::Select(select) => {
                Ok(Table::new(self.ctx.clone(), self.ctx.plan_select(&select)?))
            }
            other => Err(TableError::Compile(format!(
                "sql_query only accepts SELECT, got {}; use execute_sql",
                other.kind_name()
            ))),
        }
    }

    /// Execute one statement
    ///
    /// DDL answers `OK`, `SHOW TABLES` lists the current database, `INSERT`
    /// runs as its own submission and `SELECT` is submitted immediately.
    pub fn execute_sql(&self, sql: &str) -> Result<TableResult> {
        let statement = self.ctx.parse(sql)?;
        debug!("Executing {} statement", statement.kind_name());
        match statement {
            SqlStatement::CreateTable(create) => {
                self.create_table(create)?;
                Ok(TableResult::ok())
            }
            SqlStatement::ShowTables => {
                let schema = ResolvedSchema::new(vec![Column::not_null("table name", DataType::String)]);
                let rows = self
                    .list_tables()
                    .into_iter()
                    .map(|name| Row::insert(vec![Value::String(name)]))
                    .collect();
                Ok(TableResult::with_rows(schema, rows))
            }
            SqlStatement::Insert(insert) => {
                let query = self.ctx.plan_select(&insert.query)?;
                let target = self.ctx.sink_target(&insert.target, insert.overwrite)?;
                let requests = [Statement::new(target, query)?.to_request()];
                let job_name = insert_job_name(&self.ctx.settings.default_job_name, &requests);
                ExecutionController::new().execute_inserts(&self.ctx.services, &requests, &job_name)
            }
            SqlStatement::Select(select) => {
                Table::new(self.ctx.clone(), self.ctx.plan_select(&select)?).execute()
            }
        }
    }

    fn create_table(&self, create: CreateTableStatement) -> Result<()> {
        let schema = ResolvedSchema::new(
            create
                .columns
                .into_iter()
                .map(|c| Column {
                    name: c.name,
                    data_type: c.data_type,
                    nullable: c.nullable,
                })
                .collect(),
        );
        let descriptor = TableDescriptor {
            schema,
            options: create.options.into_iter().collect(),
        };
        self.create_temporary_table(&create.name, descriptor)
    }

    /// Explain an INSERT or SELECT statement without running it
    pub fn explain_sql(&self, sql: &str, extended: bool) -> Result<String> {
        let request = match self.ctx.parse(sql)? {
            SqlStatement::Insert(insert) => {
                let query = self.ctx.plan_select(&insert.query)?;
                let target = self.ctx.sink_target(&insert.target, insert.overwrite)?;
                Statement::new(target, query)?.to_request()
            }
            SqlStatement::Select(select) => PlanRequest::collect(self.ctx.plan_select(&select)?),
            other => {
                return Err(TableError::Compile(format!(
                    "cannot explain {} statements",
                    other.kind_name()
                )))
            }
        };
        ExecutionController::new().explain(&self.ctx.services.compiler, &[request], extended)
    }

    /// New, empty statement set bound to this environment
    pub fn create_statement_set(&self) -> StatementSet {
        StatementSet::new(self.ctx.clone())
    }

    /// Names registered in the current catalog and database, sorted
    pub fn list_tables(&self) -> Vec<String> {
        self.ctx.list_tables()
    }

    /// Insert-only stream of a table's rows
    pub fn to_data_stream(&self, table: &Table) -> Result<DataStream> {
        if self.runtime_mode() == RuntimeMode::Streaming && table.is_updating() {
            return Err(TableError::Compile(
                "table produces updates and cannot be converted to an insert-only stream; \
                 use to_changelog_stream"
                    .to_string(),
            ));
        }
        Ok(DataStream::new(table.logical_plan().clone(), false))
    }

    /// Stream of a table's rows including retractions
    pub fn to_changelog_stream(&self, table: &Table) -> Result<DataStream> {
        let changelog = self.runtime_mode() == RuntimeMode::Streaming && table.is_updating();
        Ok(DataStream::new(table.logical_plan().clone(), changelog))
    }

    /// Stream environment sharing this environment's backend
    pub fn stream_environment(&self) -> &StreamEnvironment {
        &self.streams
    }
}
