//! Entity keys and the origin index.
//!
//! The origin index records which physical file owns each addressable entity
//! (plugin, schedule, environment) as of one load. It is handed out as an
//! immutable snapshot: [`crate::ProjectFiles::load`] builds it and
//! [`crate::ProjectFiles::update`] takes it back as an explicit argument, so
//! the freshness dependency between the two calls is visible in the API
//! rather than hidden in store state.

use crate::error::{Error, Result};
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::error;

/// Key addressing one entity inside the composite document.
///
/// Names are unique within their collection across all files of a project;
/// a duplicate anywhere (the root file included) is a structural error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    /// A plugin record, grouped by plugin type under the `plugins` key.
    Plugin { plugin_type: String, name: String },
    /// A schedule record under the `schedules` key.
    Schedule { name: String },
    /// An environment record under the `environments` key.
    Environment { name: String },
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Plugin { plugin_type, name } => {
                write!(f, "plugins:{plugin_type}:{name}")
            }
            EntityKey::Schedule { name } => write!(f, "schedules:{name}"),
            EntityKey::Environment { name } => write!(f, "environments:{name}"),
        }
    }
}

/// Immutable entity-to-file index produced by one load.
///
/// Also carries the include paths that load resolved, which `update` needs
/// to blank out files that lost all their entities.
#[derive(Debug, Clone, Default)]
pub struct OriginSnapshot {
    origins: HashMap<EntityKey, PathBuf>,
    include_paths: Vec<PathBuf>,
}

impl OriginSnapshot {
    pub(crate) fn new(include_paths: Vec<PathBuf>) -> Self {
        Self {
            origins: HashMap::new(),
            include_paths,
        }
    }

    /// Snapshot with no known origins; every entity splits to the root file.
    ///
    /// For updating a project that has never been loaded.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The file owning `key` as of the load that produced this snapshot.
    pub fn origin(&self, key: &EntityKey) -> Option<&Path> {
        self.origins.get(key).map(PathBuf::as_path)
    }

    /// Include files resolved by the load that produced this snapshot.
    pub fn include_paths(&self) -> &[PathBuf] {
        &self.include_paths
    }

    /// Number of indexed entities.
    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    /// Index every entity declared in `document` as owned by `path`.
    ///
    /// Fails on the first entity whose key is already present, reporting
    /// both owning files. Records without a string `name` are skipped; they
    /// cannot be addressed, so on split they route to the root file.
    pub(crate) fn index_document(&mut self, path: &Path, document: &Mapping) -> Result<()> {
        if let Some(plugin_types) = document.get("plugins").and_then(Value::as_mapping) {
            for (plugin_type, records) in plugin_types {
                let Some(plugin_type) = plugin_type.as_str() else {
                    continue;
                };
                for record in records.as_sequence().into_iter().flatten() {
                    if let Some(name) = record_name(record) {
                        let key = EntityKey::Plugin {
                            plugin_type: plugin_type.to_string(),
                            name,
                        };
                        self.insert(key, path)?;
                    }
                }
            }
        }
        for record in sequence_records(document, "schedules") {
            if let Some(name) = record_name(record) {
                self.insert(EntityKey::Schedule { name }, path)?;
            }
        }
        for record in sequence_records(document, "environments") {
            if let Some(name) = record_name(record) {
                self.insert(EntityKey::Environment { name }, path)?;
            }
        }
        Ok(())
    }

    fn insert(&mut self, key: EntityKey, path: &Path) -> Result<()> {
        if let Some(first) = self.origins.get(&key) {
            error!(
                "entity `{key}` in {} already declared in {}",
                path.display(),
                first.display()
            );
            return Err(Error::DuplicateEntity {
                first: first.clone(),
                second: path.to_path_buf(),
                key,
            });
        }
        self.origins.insert(key, path.to_path_buf());
        Ok(())
    }
}

/// The `name` of an entity record, when it has one.
pub(crate) fn record_name(record: &Value) -> Option<String> {
    record.get("name").and_then(Value::as_str).map(str::to_string)
}

fn sequence_records<'a>(
    document: &'a Mapping,
    key: &str,
) -> impl Iterator<Item = &'a Value> {
    document
        .get(key)
        .and_then(Value::as_sequence)
        .into_iter()
        .flatten()
}
