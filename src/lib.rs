//! Multi-file declarative configuration composition.
//!
//! A project's configuration is logically one document but physically split
//! across a root YAML file and include files discovered via `include_paths`
//! glob patterns declared in the root file itself. [`ProjectFiles::load`]
//! deep-merges them into one composite document while recording which file
//! owns each plugin, schedule, and environment; [`ProjectFiles::update`]
//! splits an edited composite back so every entity is written to the file it
//! was read from, atomically per file.
//!
//! ## Merge strategy
//! - Mappings merge recursively, later files override
//! - Sequences concatenate: root items first, then includes in resolution order
//! - Scalars are replaced
//!
//! ## Origin tracking
//! `load` returns an [`OriginSnapshot`] alongside the merged document, and
//! `update` takes it back as an explicit argument, so the "index must come
//! from the most recent load" dependency lives in the API instead of hidden
//! store state. Entities unknown to the snapshot are written to the root
//! file; include files that lost all their entities are overwritten with the
//! blank subfile rather than deleted.

mod error;
mod includes;
mod index;
mod merge;
mod store;

pub use error::{Error, Result};
pub use includes::resolve_include_paths;
pub use index::{EntityKey, OriginSnapshot};
pub use merge::{deep_merge, merge_documents};
pub use store::{Composite, ProjectFiles, blank_subfile};
