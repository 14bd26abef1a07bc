//! Dotted-path lookup into nested property maps

use crate::types::value::{LabelMap, LabelValue};

/// Separator between path segments
pub const PATH_SEPARATOR: char = '.';

/// Retrieve a value from a nested map using a dot-separated key.
///
/// `labels.app` looks up `labels` in `root`, then `app` in the mapping found
/// there. Returns `None` when a segment is missing or when an intermediate
/// value is not a mapping. A present `null` is returned as `Some(Null)`.
///
/// Keys containing a dot cannot be addressed.
pub fn resolve_path<'a>(path: &str, root: &'a LabelMap) -> Option<&'a LabelValue> {
    let mut segments = path.split(PATH_SEPARATOR);
    let first = segments.next()?;
    let mut current = root.get(first)?;

    for segment in segments {
        current = current.as_mapping()?.get(segment)?;
    }

    Some(current)
}
