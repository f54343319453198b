//! Composite store: merge on load, split on update.
//!
//! [`ProjectFiles`] is the interface to a project's root config file and its
//! glob-discovered includes. `load` merges everything into one document and
//! records each entity's file of origin; `update` splits an edited composite
//! back so every entity lands in the file it was read from.

use crate::error::{Error, Result};
use crate::includes::resolve_include_paths;
use crate::index::{EntityKey, OriginSnapshot, record_name};
use crate::merge::merge_documents;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Canonical content for an include file stripped of all its entities.
///
/// Written instead of deleting the file, so stale entities cannot resurface
/// on the next load while the file keeps matching its `include_paths` glob.
pub fn blank_subfile() -> Mapping {
    let mut blank = Mapping::new();
    blank.insert(Value::from("plugins"), Value::Mapping(Mapping::new()));
    blank.insert(Value::from("schedules"), Value::Sequence(Vec::new()));
    blank
}

/// Result of one load: the merged document plus the origin snapshot.
#[derive(Debug, Clone)]
pub struct Composite {
    /// Root document with all includes deep-merged onto it.
    pub document: Mapping,
    /// Which file owns each entity, as of this load.
    pub origins: OriginSnapshot,
}

/// Interface for working with a project's multiple config files.
///
/// Long-lived for a project session; `load` and `update` are called
/// repeatedly. Single-owner mutable state, no internal synchronization.
#[derive(Debug)]
pub struct ProjectFiles {
    root: PathBuf,
    root_file: PathBuf,
    cached_root: Option<Mapping>,
}

impl ProjectFiles {
    /// Create a store for the project rooted at `root`, with its primary
    /// config file at `root_file`.
    pub fn new(root: impl Into<PathBuf>, root_file: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            root_file: root_file.into(),
            cached_root: None,
        }
    }

    /// Path of the project's primary config file.
    pub fn root_file(&self) -> &Path {
        &self.root_file
    }

    /// Drop the cached root document; the next access re-reads it from disk.
    pub fn reset_cache(&mut self) {
        self.cached_root = None;
    }

    /// Parsed contents of the root file, cached until [`Self::reset_cache`].
    pub fn root_document(&mut self) -> Result<&Mapping> {
        let document = match self.cached_root.take() {
            Some(document) => document,
            None => read_document(&self.root_file)?,
        };
        Ok(self.cached_root.insert(document))
    }

    /// Merge the root file and every resolved include into one document.
    ///
    /// Each parsed document is indexed before it is merged, so the returned
    /// snapshot reflects exactly the documents that produced the composite.
    /// The root document is indexed too: a name collision between the root
    /// and an include is as fatal as one between two includes. Any failure
    /// aborts the whole load; no partial composite is returned.
    pub fn load(&mut self) -> Result<Composite> {
        // The files may have changed on disk since the last call.
        self.reset_cache();
        let root_doc = self.root_document()?.clone();
        let patterns = include_patterns(&root_doc, &self.root_file)?;
        let include_paths = resolve_include_paths(&patterns, &self.root, &self.root_file)?;

        let mut origins = OriginSnapshot::new(include_paths.clone());
        origins.index_document(&self.root_file, &root_doc)?;

        let mut included = Vec::with_capacity(include_paths.len());
        for path in &include_paths {
            let document = read_document(path)?;
            origins.index_document(path, &document)?;
            included.push(document);
        }
        debug!(
            includes = include_paths.len(),
            entities = origins.len(),
            "loaded composite config"
        );
        let document = merge_documents(root_doc, included);
        Ok(Composite { document, origins })
    }

    /// Write `config` back to disk, splitting entities to their origin files.
    ///
    /// Entities unknown to `origins` are written to the root file. Include
    /// files from the snapshot that receive no entities are overwritten with
    /// [`blank_subfile`] rather than deleted. Each file write is individually
    /// atomic; there is no cross-file transaction, and a failure leaves
    /// already-written files in their new state (listed in the error).
    ///
    /// Returns the input config unchanged, for caller-side chaining.
    pub fn update(&mut self, config: Mapping, origins: &OriginSnapshot) -> Result<Mapping> {
        let groups = self.split_config(&config, origins);
        let mut written: Vec<PathBuf> = Vec::new();
        for (path, contents) in &groups {
            write_document(path, contents, &written)?;
            written.push(path.clone());
        }
        let mut blanked = 0usize;
        for path in origins.include_paths() {
            if !groups.iter().any(|(grouped, _)| grouped == path) {
                write_document(path, &blank_subfile(), &written)?;
                written.push(path.clone());
                blanked += 1;
            }
        }
        debug!(files = written.len(), blanked, "wrote split config");
        self.reset_cache();
        Ok(config)
    }

    /// Partition a composite config into per-file documents.
    ///
    /// Group order is first-assignment order; within a group, entity lists
    /// are deduplicated by name with the first occurrence winning.
    fn split_config(&self, config: &Mapping, origins: &OriginSnapshot) -> Vec<(PathBuf, Mapping)> {
        let mut groups: Vec<(PathBuf, Mapping)> = Vec::new();
        for (key, value) in config {
            match key.as_str() {
                Some("plugins") => self.split_plugins(&mut groups, value, origins),
                Some("schedules") => {
                    self.split_records(&mut groups, "schedules", value, origins, |name| {
                        EntityKey::Schedule { name }
                    });
                }
                Some("environments") => {
                    self.split_records(&mut groups, "environments", value, origins, |name| {
                        EntityKey::Environment { name }
                    });
                }
                // Settings and any other top-level key always belong to the
                // root file.
                _ => {
                    let group = group_for(&mut groups, &self.root_file);
                    group.insert(key.clone(), value.clone());
                }
            }
        }
        groups
    }

    fn split_plugins(
        &self,
        groups: &mut Vec<(PathBuf, Mapping)>,
        value: &Value,
        origins: &OriginSnapshot,
    ) {
        let Some(plugin_types) = value.as_mapping() else {
            return;
        };
        for (plugin_type, records) in plugin_types {
            let Some(plugin_type) = plugin_type.as_str() else {
                continue;
            };
            for record in records.as_sequence().into_iter().flatten() {
                let name = record_name(record);
                let target = name
                    .clone()
                    .and_then(|name| {
                        origins.origin(&EntityKey::Plugin {
                            plugin_type: plugin_type.to_string(),
                            name,
                        })
                    })
                    .unwrap_or(&self.root_file)
                    .to_path_buf();
                let group = group_for(groups, &target);
                let list = sequence_entry(mapping_entry(group, "plugins"), plugin_type);
                push_deduped(list, record, name.as_deref());
            }
        }
    }

    fn split_records<F>(
        &self,
        groups: &mut Vec<(PathBuf, Mapping)>,
        collection: &str,
        value: &Value,
        origins: &OriginSnapshot,
        make_key: F,
    ) where
        F: Fn(String) -> EntityKey,
    {
        let Some(records) = value.as_sequence() else {
            return;
        };
        for record in records {
            let name = record_name(record);
            let target = name
                .clone()
                .and_then(|name| origins.origin(&make_key(name)))
                .unwrap_or(&self.root_file)
                .to_path_buf();
            let group = group_for(groups, &target);
            let list = sequence_entry(group, collection);
            push_deduped(list, record, name.as_deref());
        }
    }
}

/// Glob patterns from the root document's `include_paths` key.
///
/// The key must hold a sequence of strings when present; anything else is a
/// parse error on the root file, not a pattern to be silently skipped.
fn include_patterns(root_doc: &Mapping, root_file: &Path) -> Result<Vec<String>> {
    match root_doc.get("include_paths") {
        Some(value) => serde_yaml::from_value(value.clone()).map_err(|source| Error::Parse {
            path: root_file.to_path_buf(),
            source,
        }),
        None => Ok(Vec::new()),
    }
}

/// The group document for `path`, created on first use.
fn group_for<'a>(groups: &'a mut Vec<(PathBuf, Mapping)>, path: &Path) -> &'a mut Mapping {
    let pos = match groups.iter().position(|(existing, _)| existing == path) {
        Some(pos) => pos,
        None => {
            groups.push((path.to_path_buf(), Mapping::new()));
            groups.len() - 1
        }
    };
    &mut groups[pos].1
}

/// The nested mapping under `key`, created (or reset to a mapping) on demand.
fn mapping_entry<'a>(map: &'a mut Mapping, key: &str) -> &'a mut Mapping {
    let key = Value::from(key);
    if !matches!(map.get(&key), Some(Value::Mapping(_))) {
        map.insert(key.clone(), Value::Mapping(Mapping::new()));
    }
    match map.get_mut(&key) {
        Some(Value::Mapping(inner)) => inner,
        _ => unreachable!("slot was just set to a mapping"),
    }
}

/// The sequence under `key`, created (or reset to a sequence) on demand.
fn sequence_entry<'a>(map: &'a mut Mapping, key: &str) -> &'a mut Vec<Value> {
    let key = Value::from(key);
    if !matches!(map.get(&key), Some(Value::Sequence(_))) {
        map.insert(key.clone(), Value::Sequence(Vec::new()));
    }
    match map.get_mut(&key) {
        Some(Value::Sequence(inner)) => inner,
        _ => unreachable!("slot was just set to a sequence"),
    }
}

/// Append `record` unless a record of the same name is already present.
/// Nameless records cannot collide and are always appended.
fn push_deduped(list: &mut Vec<Value>, record: &Value, name: Option<&str>) {
    if let Some(name) = name
        && list
            .iter()
            .any(|existing| record_name(existing).as_deref() == Some(name))
    {
        return;
    }
    list.push(record.clone());
}

/// Read and parse one config file as a top-level mapping.
///
/// An empty file is an empty document; any other non-mapping top level is a
/// parse error.
fn read_document(path: &Path) -> Result<Mapping> {
    let text = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_yaml::from_str(&text).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Null => Ok(Mapping::new()),
        other => serde_yaml::from_value(other).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Serialize and atomically replace one config file.
///
/// Writes to a temp file in the target directory, then renames over the
/// destination, so a concurrent reader sees either the old content or the
/// new content, never a torn write. `written` is carried into the error for
/// partial-failure reporting.
fn write_document(path: &Path, contents: &Mapping, written: &[PathBuf]) -> Result<()> {
    let write_err = |source: std::io::Error| Error::Write {
        path: path.to_path_buf(),
        written: written.to_vec(),
        source,
    };
    let text = serde_yaml::to_string(contents)
        .map_err(|source| write_err(std::io::Error::other(source)))?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(write_err)?;
    temp.write_all(text.as_bytes()).map_err(write_err)?;
    temp.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}
