//! Utility functions and helpers

pub mod canonical;
pub mod path;
pub mod time;

pub use canonical::{canonicalize, DEFAULT_SEPARATOR};
pub use path::resolve_path;
pub use time::{parse_duration, window_param};
