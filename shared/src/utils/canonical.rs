//! Label value canonicalization
//!
//! Prometheus label values are plain strings, but allocation properties can
//! be sequences (`services`) or mappings (`labels`, `annotations`). These
//! functions turn any [`LabelValue`] into one string that does not depend on
//! the order in which the API happened to return elements or keys, so the
//! same allocation always lands on the same time series.

use crate::types::value::{LabelMap, LabelValue, ScalarKind};
use std::cmp::Ordering;

/// Separator used between sequence elements and mapping entries
pub const DEFAULT_SEPARATOR: &str = ",";

/// Convert a value into a deterministic label string.
///
/// - strings are returned verbatim
/// - sequences are sorted then joined with `sep`
/// - mappings are rendered as `key:value` pairs sorted by key, joined with `sep`
/// - anything else (numbers, booleans, `null`) is the empty string
///
/// Numbers are only rendered inside sequences and mappings, using the shortest
/// decimal form that parses back to the same value.
pub fn canonicalize(value: &LabelValue, sep: &str) -> String {
    match value {
        LabelValue::String(s) => s.clone(),
        LabelValue::Sequence(items) => sort_and_join_sequence(items, sep),
        LabelValue::Mapping(map) => sort_and_join_mapping(map, sep),
        _ => String::new(),
    }
}

/// Sort the elements of a sequence and join them with `sep`.
///
/// The ordering is chosen from the first element: lexicographic for text,
/// numeric for numbers, `false < true` for booleans. When the sequence mixes
/// kinds no ordering is applied and elements are joined as received.
pub fn sort_and_join_sequence(items: &[LabelValue], sep: &str) -> String {
    let Some(first) = items.first() else {
        return String::new();
    };

    let kind = first.scalar_kind();
    let homogeneous = kind.is_some() && items.iter().all(|v| v.scalar_kind() == kind);

    let mut sorted: Vec<&LabelValue> = items.iter().collect();
    if homogeneous {
        sorted.sort_by(|a, b| compare_scalars(a, b));
    }

    sorted
        .into_iter()
        .map(|v| render_scalar(v).unwrap_or_else(|| canonicalize(v, sep)))
        .collect::<Vec<_>>()
        .join(sep)
}

/// Render a mapping as `key:value` pairs ordered by key and joined with `sep`.
///
/// Only string and numeric values are rendered; entries holding anything
/// else (nested mappings, sequences, booleans, null) are left out.
pub fn sort_and_join_mapping(map: &LabelMap, sep: &str) -> String {
    // BTreeMap iterates in byte-wise key order
    map.iter()
        .filter_map(|(key, value)| match value {
            LabelValue::String(_) | LabelValue::Integer(_) | LabelValue::Float(_) => {
                render_scalar(value).map(|v| format!("{}:{}", key, v))
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(sep)
}

/// Render a scalar; `None` for sequences and mappings
fn render_scalar(value: &LabelValue) -> Option<String> {
    match value {
        LabelValue::Null => Some(String::new()),
        LabelValue::String(s) => Some(s.clone()),
        LabelValue::Integer(i) => Some(i.to_string()),
        LabelValue::Float(f) => Some(format_float(*f)),
        LabelValue::Bool(b) => Some(b.to_string()),
        LabelValue::Sequence(_) | LabelValue::Mapping(_) => None,
    }
}

/// Shortest decimal representation that round-trips, without exponent
pub fn format_float(f: f64) -> String {
    // Display for f64 already picks the minimal digit count
    format!("{}", f)
}

fn compare_scalars(a: &LabelValue, b: &LabelValue) -> Ordering {
    match (a, b) {
        (LabelValue::String(x), LabelValue::String(y)) => x.cmp(y),
        (LabelValue::Integer(x), LabelValue::Integer(y)) => x.cmp(y),
        (LabelValue::Bool(x), LabelValue::Bool(y)) => x.cmp(y),
        _ if a.scalar_kind() == Some(ScalarKind::Number) => {
            as_f64(a).total_cmp(&as_f64(b))
        }
        _ => Ordering::Equal,
    }
}

fn as_f64(value: &LabelValue) -> f64 {
    match value {
        LabelValue::Integer(i) => *i as f64,
        LabelValue::Float(f) => *f,
        _ => 0.0,
    }
}
