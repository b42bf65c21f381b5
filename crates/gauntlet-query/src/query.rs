//! The `TestQuery` value type and its canonical printed form

use crate::params::{stringify_public_params, ParamRecord};
use crate::separators::{BIG_SEPARATOR, PARAM_SEPARATOR, PATH_SEPARATOR, WILDCARD};
use std::fmt;

/// The four levels of query specificity, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QueryLevel {
    MultiFile,
    MultiTest,
    MultiCase,
    Single,
}

impl fmt::Display for QueryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryLevel::MultiFile => write!(f, "multi-file"),
            QueryLevel::MultiTest => write!(f, "multi-test"),
            QueryLevel::MultiCase => write!(f, "multi-case"),
            QueryLevel::Single => write!(f, "single"),
        }
    }
}

/// An immutable hierarchical test identifier
///
/// Components beyond the query's level are absent by construction: a
/// multi-file query has no test path, a multi-test query has no params,
/// and only a `Single` query names exactly one case.
#[derive(Debug, Clone, PartialEq)]
pub enum TestQuery {
    /// `suite:*` or `suite:a,b,*` - every file under a path prefix.
    MultiFile {
        suite: String,
        file_path: Vec<String>,
    },
    /// `suite:a,b:*` or `suite:a,b:t,u,*` - every test under a test-path
    /// prefix within one file.
    MultiTest {
        suite: String,
        file_path: Vec<String>,
        test_path: Vec<String>,
    },
    /// `suite:a,b:t,u:*` or `suite:a,b:t,u:k=1;*` - every case of one test
    /// whose params extend the given record.
    MultiCase {
        suite: String,
        file_path: Vec<String>,
        test_path: Vec<String>,
        params: ParamRecord,
    },
    /// `suite:a,b:t,u:k=1` - exactly one case.
    Single {
        suite: String,
        file_path: Vec<String>,
        test_path: Vec<String>,
        params: ParamRecord,
    },
}

impl TestQuery {
    pub fn level(&self) -> QueryLevel {
        match self {
            TestQuery::MultiFile { .. } => QueryLevel::MultiFile,
            TestQuery::MultiTest { .. } => QueryLevel::MultiTest,
            TestQuery::MultiCase { .. } => QueryLevel::MultiCase,
            TestQuery::Single { .. } => QueryLevel::Single,
        }
    }

    pub fn suite(&self) -> &str {
        match self {
            TestQuery::MultiFile { suite, .. }
            | TestQuery::MultiTest { suite, .. }
            | TestQuery::MultiCase { suite, .. }
            | TestQuery::Single { suite, .. } => suite,
        }
    }

    pub fn file_path(&self) -> &[String] {
        match self {
            TestQuery::MultiFile { file_path, .. }
            | TestQuery::MultiTest { file_path, .. }
            | TestQuery::MultiCase { file_path, .. }
            | TestQuery::Single { file_path, .. } => file_path,
        }
    }

    /// The test path, absent at multi-file level.
    pub fn test_path(&self) -> Option<&[String]> {
        match self {
            TestQuery::MultiFile { .. } => None,
            TestQuery::MultiTest { test_path, .. }
            | TestQuery::MultiCase { test_path, .. }
            | TestQuery::Single { test_path, .. } => Some(test_path),
        }
    }

    /// The params record, absent above multi-case level.
    pub fn params(&self) -> Option<&ParamRecord> {
        match self {
            TestQuery::MultiFile { .. } | TestQuery::MultiTest { .. } => None,
            TestQuery::MultiCase { params, .. } | TestQuery::Single { params, .. } => Some(params),
        }
    }

    pub fn ends_with_wildcard(&self) -> bool {
        !matches!(self, TestQuery::Single { .. })
    }

    /// Whether this query's own syntax guarantees it denotes an entire
    /// subtree of the test tree.
    ///
    /// Multi-file queries never qualify: the minimal-query generator uses
    /// this predicate to decide where collapsing may stop, and collapsing
    /// must never stop above file granularity (the output keeps at least
    /// one query per file).
    pub fn definitely_whole_subtree(&self) -> bool {
        !matches!(self, TestQuery::MultiFile { .. })
    }

    /// True iff `self` selects `other` (contains it or equals it).
    pub fn contains(&self, other: &TestQuery) -> bool {
        matches!(
            crate::compare::compare_queries(self, other),
            crate::compare::Ordering::Equal | crate::compare::Ordering::StrictSuperset
        )
    }

    /// Whether this query selects the case named by `case_text`.
    pub fn matches(&self, case_text: &str) -> Result<bool, crate::QueryError> {
        let other = crate::parse::parse_query(case_text)?;
        Ok(self.contains(&other))
    }
}

fn write_path(f: &mut fmt::Formatter<'_>, path: &[String]) -> fmt::Result {
    for (i, part) in path.iter().enumerate() {
        if i > 0 {
            write!(f, "{PATH_SEPARATOR}")?;
        }
        write!(f, "{part}")?;
    }
    Ok(())
}

impl fmt::Display for TestQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestQuery::MultiFile { suite, file_path } => {
                write!(f, "{suite}{BIG_SEPARATOR}")?;
                for part in file_path {
                    write!(f, "{part}{PATH_SEPARATOR}")?;
                }
                write!(f, "{WILDCARD}")
            }
            TestQuery::MultiTest {
                suite,
                file_path,
                test_path,
            } => {
                write!(f, "{suite}{BIG_SEPARATOR}")?;
                write_path(f, file_path)?;
                write!(f, "{BIG_SEPARATOR}")?;
                for part in test_path {
                    write!(f, "{part}{PATH_SEPARATOR}")?;
                }
                write!(f, "{WILDCARD}")
            }
            TestQuery::MultiCase {
                suite,
                file_path,
                test_path,
                params,
            } => {
                write!(f, "{suite}{BIG_SEPARATOR}")?;
                write_path(f, file_path)?;
                write!(f, "{BIG_SEPARATOR}")?;
                write_path(f, test_path)?;
                write!(f, "{BIG_SEPARATOR}")?;
                for (key, value) in params.public_entries() {
                    write!(f, "{key}={value}{PARAM_SEPARATOR}")?;
                }
                write!(f, "{WILDCARD}")
            }
            TestQuery::Single {
                suite,
                file_path,
                test_path,
                params,
            } => {
                write!(f, "{suite}{BIG_SEPARATOR}")?;
                write_path(f, file_path)?;
                write!(f, "{BIG_SEPARATOR}")?;
                write_path(f, test_path)?;
                write!(f, "{BIG_SEPARATOR}")?;
                write!(f, "{}", stringify_public_params(params))
            }
        }
    }
}
