//! Gauntlet test tree
//!
//! Organizes every discoverable case into a lazily loaded tree. Test files
//! are registration closures behind a `SuiteLoader`; a file is imported the
//! first time a query needs it, and concurrent overlapping queries share
//! one in-flight import. The tree also hosts the minimal-query generator
//! that reconciles an expectations file into the smallest covering set of
//! queries.

pub mod group;
pub mod loader;
pub mod minimal;
pub mod tree;

use gauntlet_params::ParamsError;
use gauntlet_query::QueryError;
use thiserror::Error;

/// Errors raised while registering, loading, or reconciling tests
///
/// The registration and expectation variants are build-time errors: they
/// abort the whole invocation before any case runs.
#[derive(Error, Debug, Clone)]
pub enum TreeError {
    #[error("invalid test name segment `{segment}` in `{name}`; segments must match [A-Za-z0-9_]+")]
    InvalidTestName { name: String, segment: String },

    #[error("duplicate test name `{name}` in one group")]
    DuplicateTestName { name: String },

    #[error("test `{name}` was registered without a run callback")]
    MissingRunFn { name: String },

    #[error("duplicate test case `{name}`; two parameter records stringify identically")]
    DuplicateCase { name: String },

    #[error("param `{key}` of case `{name}` has a value that cannot appear in a query")]
    InvalidParamValue { name: String, key: String },

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error("unknown suite `{suite}`")]
    UnknownSuite { suite: String },

    #[error("unknown test file `{path}` in suite `{suite}`")]
    UnknownFile { suite: String, path: String },

    #[error("malformed expectation line `{line}`: {source}")]
    MalformedExpectation { line: String, source: QueryError },

    #[error("expectation `{line}` is not in canonical form (expected `{canonical}`)")]
    NonCanonicalExpectation { line: String, canonical: String },

    #[error("expectation `{line}` is coarser than a file; expectations must be at file granularity or finer")]
    ExpectationTooCoarse { line: String },

    #[error("expectations `{line}` and `{previous}` select the same query")]
    DuplicateExpectation { line: String, previous: String },

    #[error("expectation had no effect: {line}")]
    UnusedExpectation { line: String },

    #[error("expectation `{line}` did not surface in the minimal query list")]
    ExpectationNotEmitted { line: String },
}

pub use group::{CaseAbort, CaseEntry, RunContext, RunFn, SpecFile, TestBuilder, TestGroup};
pub use loader::{ListingEntry, MemoizedLoader, StaticSuiteLoader, SuiteLoader};
pub use minimal::{generate_minimal_query_list, parse_expectation_lines, ExpectationLine};
pub use tree::{load_tree, Subtree, SubtreeCounts, TestCase, TestTree, TestTreeNode};
