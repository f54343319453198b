//! Include path resolution.
//!
//! Expands the root file's `include_paths` glob patterns against the project
//! root into a validated, deduplicated list of include files. The root file
//! itself is never an include, even when a pattern matches it.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::error;

/// Resolve glob patterns to the ordered list of include files.
///
/// Patterns are expanded in the given order; each pattern's matches arrive in
/// the expansion's lexicographic order. Every match must be an existing
/// regular file or the whole resolution fails; no partial list is returned.
/// A path matched by two patterns appears once, at its first position.
pub fn resolve_include_paths(
    patterns: &[String],
    project_root: &Path,
    root_file: &Path,
) -> Result<Vec<PathBuf>> {
    let root_file = canonical(root_file);
    let mut resolved: Vec<PathBuf> = Vec::new();
    for pattern in patterns {
        let full_pattern = project_root.join(pattern);
        let matches = glob::glob(&full_pattern.to_string_lossy()).map_err(|source| {
            Error::InvalidIncludePattern {
                pattern: pattern.clone(),
                source,
            }
        })?;
        for entry in matches {
            let path = match entry {
                Ok(path) => path,
                Err(err) => {
                    let path = err.path().to_path_buf();
                    error!("include path {} is unreadable: {err}", path.display());
                    return Err(Error::InvalidIncludePath { path });
                }
            };
            if !path.is_file() {
                error!("include path {} is not an existing file", path.display());
                return Err(Error::InvalidIncludePath { path });
            }
            let path = canonical(&path);
            if path == root_file || resolved.contains(&path) {
                continue;
            }
            resolved.push(path);
        }
    }
    Ok(resolved)
}

/// Canonicalize where possible so paths from glob walks and paths from the
/// caller compare equal regardless of symlinks or `.` components.
fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
