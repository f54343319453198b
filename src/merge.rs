//! Deep merge for ordered YAML documents.
//!
//! Implements the composition rule for multi-file configs: mappings merge
//! recursively with later values overriding, sequences concatenate (earlier
//! items first), scalars are replaced entirely.

use serde_yaml::{Mapping, Value};

/// Deep merge two YAML values, with `overlay` layered onto `base`.
///
/// - Mappings are merged recursively: overlay keys override base keys
/// - Sequences are concatenated: base items first, then overlay items
/// - Scalars (including null) replace the base value
/// - Mismatched kinds: overlay replaces base entirely
///
/// Key order is preserved: base keys keep their positions, keys new in the
/// overlay are appended in overlay order.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                if let Some(slot) = base_map.get_mut(&key) {
                    let base_value = std::mem::replace(slot, Value::Null);
                    *slot = deep_merge(base_value, overlay_value);
                } else {
                    base_map.insert(key, overlay_value);
                }
            }
            Value::Mapping(base_map)
        }
        (Value::Sequence(mut base_seq), Value::Sequence(overlay_seq)) => {
            base_seq.extend(overlay_seq);
            Value::Sequence(base_seq)
        }
        (_, overlay) => overlay,
    }
}

/// Merge a root document with a list of overlays, in order.
///
/// Equivalent to folding [`deep_merge`] over the overlays.
pub fn merge_documents(root: Mapping, overlays: impl IntoIterator<Item = Mapping>) -> Mapping {
    let merged = overlays
        .into_iter()
        .fold(Value::Mapping(root), |base, overlay| {
            deep_merge(base, Value::Mapping(overlay))
        });
    match merged {
        Value::Mapping(map) => map,
        // merging two mappings always yields a mapping
        _ => Mapping::new(),
    }
}
