//! Separator characters of the query wire format
//!
//! These are stable: expectation files, worker messages, and result maps
//! all key on the printed query form.

/// Separates the four query levels (suite, file, test, params).
pub const BIG_SEPARATOR: char = ':';

/// Separates segments within the file path and within the test path.
pub const PATH_SEPARATOR: char = ',';

/// Separates `key=value` pairs within the params level.
pub const PARAM_SEPARATOR: char = ';';

/// Multi-level wildcard, legal only as a complete final segment.
pub const WILDCARD: &str = "*";
