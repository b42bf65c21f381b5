//! Gauntlet query model - hierarchical test-case identifiers
//!
//! A query names a suite, a file path within the suite, a test path within
//! the file, and a set of case parameters, at one of four levels of
//! specificity:
//! - `suite:a,b,*` selects every file under `a/b` (multi-file)
//! - `suite:a,b:c,d,*` selects every test under `c;d` in file `a/b` (multi-test)
//! - `suite:a,b:c,d:x=1;*` selects every case of test `c;d` with `x=1` (multi-case)
//! - `suite:a,b:c,d:x=1` selects exactly one case (single)
//!
//! Queries round-trip through text: `parse_query` and `Display` are exact
//! inverses for every query this system produces, and the printed form is a
//! stable wire format shared with expectation files, the worker protocol,
//! and the HTTP RPC surface.

pub mod compare;
pub mod params;
pub mod parse;
pub mod query;
pub mod separators;

use thiserror::Error;

/// Errors produced when parsing query text
///
/// Every variant is fatal to the call that produced it; malformed query
/// text is never recovered locally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("query must contain at least one `:` separating the suite name: {0}")]
    MissingSuite(String),

    #[error("wildcard `*` must be the complete last segment of a query: {0}")]
    MisplacedWildcard(String),

    #[error(
        "file-level query must end with `,*` (or `:*` for a test-level query): {0}"
    )]
    MissingFileWildcard(String),

    #[error(
        "test-level query must end with `,*` (or `:*` for a case-level query): {0}"
    )]
    MissingTestWildcard(String),

    #[error("file part of a test-level query was empty (`::`): {0}")]
    EmptyFilePath(String),

    #[error("test part of a case-level query was empty (`::`): {0}")]
    EmptyTestPath(String),

    #[error("param in a query must not be blank (trailing `;`?): {0}")]
    BlankParam(String),

    #[error("param `{param}` must be of the form key=value")]
    MalformedParam { param: String },

    #[error("param key `{key}` must match [A-Za-z0-9_]+ and not start with `_`")]
    InvalidParamKey { key: String },

    #[error("param value `{value}` is not a legal query value")]
    BadParamValue { value: String },

    #[error("param key `{key}` appears twice in one query")]
    DuplicateParamKey { key: String },

    #[error("query text is not valid percent-encoded UTF-8: {0}")]
    InvalidEncoding(String),
}

pub use compare::{compare_queries, Ordering};
pub use params::{
    param_key_is_public, param_value_text_is_valid, parse_param_value, stringify_public_params,
    valid_query_part, ParamRecord, ParamValue,
};
pub use parse::parse_query;
pub use query::{QueryLevel, TestQuery};
