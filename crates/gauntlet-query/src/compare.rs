//! Prefix ordering between queries
//!
//! Queries form a partial order: `a` strictly contains `b` when `b`'s
//! printed form begins with `a`'s through a separator boundary. The
//! comparison works structurally, level by level, so boundary cases
//! (`a` vs `ab` segments) never mis-compare.

use crate::params::ParamRecord;
use crate::query::TestQuery;

/// The result of comparing two queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    /// Neither selects the other.
    Unordered,
    /// The first query strictly contains the second.
    StrictSuperset,
    Equal,
    /// The first query is strictly contained in the second.
    StrictSubset,
}

/// Compare two queries for their containment ordering.
pub fn compare_queries(a: &TestQuery, b: &TestQuery) -> Ordering {
    if a.suite() != b.suite() {
        return Ordering::Unordered;
    }

    let file_ordering = cmp_level(
        compare_paths(a.file_path(), b.file_path()),
        a.test_path().is_none(),
        b.test_path().is_none(),
    );
    if let Some(ordering) = file_ordering {
        return ordering;
    }
    // Both queries specify a test path from here on.
    let (a_test, b_test) = match (a.test_path(), b.test_path()) {
        (Some(x), Some(y)) => (x, y),
        _ => return Ordering::Unordered,
    };

    let test_ordering = cmp_level(
        compare_paths(a_test, b_test),
        a.params().is_none(),
        b.params().is_none(),
    );
    if let Some(ordering) = test_ordering {
        return ordering;
    }
    let (a_params, b_params) = match (a.params(), b.params()) {
        (Some(x), Some(y)) => (x, y),
        _ => return Ordering::Unordered,
    };

    let params_ordering = cmp_level(
        compare_params(a_params, b_params),
        a.ends_with_wildcard(),
        b.ends_with_wildcard(),
    );
    params_ordering.unwrap_or(Ordering::Equal)
}

/// Resolve one level of the comparison.
///
/// "Big" means the query terminates at this level, e.g. for the file level
/// a multi-file query is big (its wildcard swallows everything deeper)
/// while any query with a test path is small.
fn cmp_level(ordering: Ordering, a_is_big: bool, b_is_big: bool) -> Option<Ordering> {
    if !a_is_big && !b_is_big {
        return match ordering {
            Ordering::Equal => None,
            _ => Some(Ordering::Unordered),
        };
    }
    match ordering {
        Ordering::Unordered => Some(Ordering::Unordered),
        Ordering::StrictSuperset => Some(if a_is_big || !b_is_big {
            Ordering::StrictSuperset
        } else {
            Ordering::Unordered
        }),
        Ordering::StrictSubset => Some(if !a_is_big || b_is_big {
            Ordering::StrictSubset
        } else {
            Ordering::Unordered
        }),
        Ordering::Equal => {
            if a_is_big && b_is_big {
                Some(Ordering::Equal)
            } else if a_is_big {
                Some(Ordering::StrictSuperset)
            } else {
                Some(Ordering::StrictSubset)
            }
        }
    }
}

/// Compare two segment paths by prefix.
pub fn compare_paths(a: &[String], b: &[String]) -> Ordering {
    let shorter = a.len().min(b.len());
    if a[..shorter] != b[..shorter] {
        return Ordering::Unordered;
    }
    match a.len().cmp(&b.len()) {
        std::cmp::Ordering::Equal => Ordering::Equal,
        std::cmp::Ordering::Less => Ordering::StrictSuperset,
        std::cmp::Ordering::Greater => Ordering::StrictSubset,
    }
}

/// Compare two param records by prefix over their public printed entries.
fn compare_params(a: &ParamRecord, b: &ParamRecord) -> Ordering {
    let a_entries = a.public_text_entries();
    let b_entries = b.public_text_entries();
    let shorter = a_entries.len().min(b_entries.len());
    if a_entries[..shorter] != b_entries[..shorter] {
        return Ordering::Unordered;
    }
    match a_entries.len().cmp(&b_entries.len()) {
        std::cmp::Ordering::Equal => Ordering::Equal,
        std::cmp::Ordering::Less => Ordering::StrictSuperset,
        std::cmp::Ordering::Greater => Ordering::StrictSubset,
    }
}
