//! Typed errors for config composition.

use crate::index::EntityKey;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for config file operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by loading or writing a multi-file project config.
///
/// Nothing is swallowed or retried internally; every failure aborts the
/// current `load` or `update` and propagates to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// A glob pattern matched a path that is not an existing regular file.
    #[error("included path `{}` is not an existing file", path.display())]
    InvalidIncludePath { path: PathBuf },

    /// An `include_paths` entry is not a valid glob pattern.
    #[error("invalid include pattern `{pattern}`: {source}")]
    InvalidIncludePattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// The same entity is declared twice, in one file or across two.
    #[error("duplicate `{key}` declared in both {} and {}", first.display(), second.display())]
    DuplicateEntity {
        key: EntityKey,
        first: PathBuf,
        second: PathBuf,
    },

    /// A config file could not be read from disk.
    #[error("failed to read `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A config file is not valid YAML (or not a mapping at the top level).
    #[error("failed to parse `{}`", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An atomic write failed. `written` lists the files of this update that
    /// were already replaced before the failure; files after `path` were not
    /// attempted.
    #[error("failed to write `{}` ({} earlier file(s) already written)", path.display(), written.len())]
    Write {
        path: PathBuf,
        written: Vec<PathBuf>,
        #[source]
        source: std::io::Error,
    },
}
