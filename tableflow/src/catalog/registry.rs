// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Name to binding registry

use log::info;
use std::collections::HashMap;
use std::sync::Arc;

use super::identifier::ObjectIdentifier;
use crate::connectors::{TableSink, TableSource};
use crate::error::{Result, TableError};
use crate::plan::LogicalNode;
use crate::types::ResolvedSchema;

/// What a registered name refers to
#[derive(Debug, Clone)]
pub enum BindingKind {
    /// Connector-backed table, readable and/or writable
    Connector {
        source: Option<Arc<dyn TableSource>>,
        sink: Option<Arc<dyn TableSink>>,
    },
    /// A registered query
    View(LogicalNode),
}

/// Schema plus binding, fixed at registration time
#[derive(Debug, Clone)]
pub struct TableBinding {
    schema: ResolvedSchema,
    kind: BindingKind,
}

impl TableBinding {
    pub fn source(schema: ResolvedSchema, source: Arc<dyn TableSource>) -> Self {
        Self {
            schema,
            kind: BindingKind::Connector {
                source: Some(source),
                sink: None,
            },
        }
    }

    pub fn sink(schema: ResolvedSchema, sink: Arc<dyn TableSink>) -> Self {
        Self {
            schema,
            kind: BindingKind::Connector {
                source: None,
                sink: Some(sink),
            },
        }
    }

    pub fn connector(
        schema: ResolvedSchema,
        source: Option<Arc<dyn TableSource>>,
        sink: Option<Arc<dyn TableSink>>,
    ) -> Self {
        Self {
            schema,
            kind: BindingKind::Connector { source, sink },
        }
    }

    pub fn view(query: LogicalNode) -> Self {
        Self {
            schema: query.schema(),
            kind: BindingKind::View(query),
        }
    }

    pub fn schema(&self) -> &ResolvedSchema {
        &self.schema
    }

    pub fn kind(&self) -> &BindingKind {
        &self.kind
    }

    pub fn is_readable(&self) -> bool {
        match &self.kind {
            BindingKind::Connector { source, .. } => source.is_some(),
            BindingKind::View(_) => true,
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(&self.kind, BindingKind::Connector { sink: Some(_), .. })
    }

    /// The sink behind this binding, if it has one
    pub fn sink_handle(&self) -> Option<Arc<dyn TableSink>> {
        match &self.kind {
            BindingKind::Connector { sink, .. } => sink.clone(),
            BindingKind::View(_) => None,
        }
    }
}

/// Registry of table bindings keyed by fully-qualified identifier
#[derive(Debug, Default)]
pub struct TableRegistry {
    tables: HashMap<ObjectIdentifier, TableBinding>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a name; an existing binding is never replaced
    pub fn register(&mut self, identifier: ObjectIdentifier, binding: TableBinding) -> Result<()> {
        if self.tables.contains_key(&identifier) {
            return Err(TableError::DuplicateName(identifier.as_summary_string()));
        }
        info!("Registered table '{}'", identifier);
        self.tables.insert(identifier, binding);
        Ok(())
    }

    pub fn resolve(&self, identifier: &ObjectIdentifier) -> Result<&TableBinding> {
        self.tables
            .get(identifier)
            .ok_or_else(|| TableError::unknown_table(identifier.as_summary_string(), "table"))
    }

    /// Resolve a binding that can be read from
    pub fn resolve_readable(&self, identifier: &ObjectIdentifier) -> Result<&TableBinding> {
        match self.tables.get(identifier) {
            Some(binding) if binding.is_readable() => Ok(binding),
            _ => Err(TableError::unknown_table(
                identifier.as_summary_string(),
                "source table",
            )),
        }
    }

    /// Resolve a binding that can be written to
    pub fn resolve_writable(&self, identifier: &ObjectIdentifier) -> Result<&TableBinding> {
        match self.tables.get(identifier) {
            Some(binding) if binding.is_writable() => Ok(binding),
            _ => Err(TableError::unknown_table(
                identifier.as_summary_string(),
                "sink table",
            )),
        }
    }

    pub fn contains(&self, identifier: &ObjectIdentifier) -> bool {
        self.tables.contains_key(identifier)
    }

    /// Sorted object names registered in one catalog/database
    pub fn list_tables(&self, catalog: &str, database: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .keys()
            .filter(|id| id.catalog() == catalog && id.database() == database)
            .map(|id| id.object().to_string())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::{MemorySink, MemorySource};
    use crate::types::DataType;

    fn id(name: &str) -> ObjectIdentifier {
        ObjectIdentifier::new("c", "d", name)
    }

    fn schema() -> ResolvedSchema {
        ResolvedSchema::of(&[("x", DataType::BigInt)])
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = TableRegistry::new();
        registry
            .register(id("src"), TableBinding::source(schema(), Arc::new(MemorySource::new(vec![]))))
            .unwrap();
        assert!(registry.contains(&id("src")));
        assert_eq!(registry.resolve(&id("src")).unwrap().schema(), &schema());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = TableRegistry::new();
        let sink = Arc::new(MemorySink::new());
        registry
            .register(id("t"), TableBinding::sink(schema(), sink.clone()))
            .unwrap();
        let err = registry
            .register(id("t"), TableBinding::sink(ResolvedSchema::default(), sink))
            .unwrap_err();
        assert!(matches!(err, TableError::DuplicateName(name) if name == "c.d.t"));
        // first binding untouched
        assert_eq!(registry.resolve(&id("t")).unwrap().schema(), &schema());
    }

    #[test]
    fn test_role_checks() {
        let mut registry = TableRegistry::new();
        registry
            .register(id("sink"), TableBinding::sink(schema(), Arc::new(MemorySink::new())))
            .unwrap();
        assert!(registry.resolve_writable(&id("sink")).is_ok());
        let err = registry.resolve_readable(&id("sink")).unwrap_err();
        assert!(matches!(err, TableError::UnknownTable { role: "source table", .. }));
        assert!(matches!(
            registry.resolve(&id("missing")),
            Err(TableError::UnknownTable { .. })
        ));
    }

    #[test]
    fn test_list_tables_is_scoped_and_sorted() {
        let mut registry = TableRegistry::new();
        for name in ["b", "a"] {
            registry
                .register(id(name), TableBinding::sink(schema(), Arc::new(MemorySink::new())))
                .unwrap();
        }
        registry
            .register(
                ObjectIdentifier::new("c", "other", "z"),
                TableBinding::sink(schema(), Arc::new(MemorySink::new())),
            )
            .unwrap();
        assert_eq!(registry.list_tables("c", "d"), vec!["a", "b"]);
    }
}
