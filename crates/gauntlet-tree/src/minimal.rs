//! Minimal covering query lists
//!
//! Given a loaded tree and a list of expectation lines (whole-subtree
//! queries carrying pre-classified outcomes), produce the smallest set of
//! queries such that every file has at least one query and every
//! expectation line appears verbatim, keeping exactly the granularity its
//! author chose.

use crate::tree::{Subtree, TestTree, TestTreeNode};
use crate::TreeError;
use gauntlet_query::{compare_queries, parse_query, Ordering, TestQuery};

/// One validated expectation line.
#[derive(Debug, Clone)]
pub struct ExpectationLine {
    pub query: TestQuery,
    pub line: String,
    seen: bool,
}

/// Parse and validate expectation lines.
///
/// Blank lines and `#` comments are ignored. Every other line must parse,
/// must be in canonical form, must denote a subtree at file granularity or
/// finer, and must not duplicate an earlier line. All of these are
/// configuration errors surfaced at load time, not at use time.
pub fn parse_expectation_lines(
    lines: &[String],
) -> Result<Vec<ExpectationLine>, TreeError> {
    let mut expectations: Vec<ExpectationLine> = Vec::new();
    for raw in lines {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let query = parse_query(line).map_err(|source| TreeError::MalformedExpectation {
            line: line.to_string(),
            source,
        })?;
        let canonical = query.to_string();
        if canonical != line {
            return Err(TreeError::NonCanonicalExpectation {
                line: line.to_string(),
                canonical,
            });
        }
        if !query.definitely_whole_subtree() {
            return Err(TreeError::ExpectationTooCoarse {
                line: line.to_string(),
            });
        }
        if let Some(previous) = expectations
            .iter()
            .find(|e| compare_queries(&e.query, &query) == Ordering::Equal)
        {
            return Err(TreeError::DuplicateExpectation {
                line: line.to_string(),
                previous: previous.line.clone(),
            });
        }
        expectations.push(ExpectationLine {
            query,
            line: line.to_string(),
            seen: false,
        });
    }
    Ok(expectations)
}

struct SplitterNode {
    query: TestQuery,
    needs_split: bool,
    children: Vec<SplitterNode>,
}

/// Produce the minimal covering query list for `tree` and `lines`.
///
/// Postconditions checked eagerly: every expectation was seen inside the
/// tree, and every expectation line appears verbatim in the output. An
/// expectation that had no effect is a configuration error, not a silent
/// success.
pub fn generate_minimal_query_list(
    tree: &TestTree,
    lines: &[String],
) -> Result<Vec<String>, TreeError> {
    let mut expectations = parse_expectation_lines(lines)?;

    let children = tree
        .root
        .children
        .values()
        .map(|child| splitter_node(child, &mut expectations).0)
        .collect::<Vec<_>>();

    for expectation in &expectations {
        if !expectation.seen {
            return Err(TreeError::UnusedExpectation {
                line: expectation.line.clone(),
            });
        }
    }

    let mut out = Vec::new();
    for child in &children {
        emit(child, &mut out);
    }

    for expectation in &expectations {
        if !out.iter().any(|name| *name == expectation.line) {
            return Err(TreeError::ExpectationNotEmitted {
                line: expectation.line.clone(),
            });
        }
    }
    Ok(out)
}

/// Build the splitter mirror of a tree node.
///
/// Returns the node plus whether any expectation falls inside it.
/// `needs_split` starts from the node's own syntax (a query that is not
/// definitely a whole subtree must split) and is OR-folded with every
/// child that carries an expectation; a node never splits merely because
/// an expectation selects the node itself, which is what lets an
/// expectation keep exactly the granularity its author chose.
fn splitter_node(
    node: &TestTreeNode,
    expectations: &mut [ExpectationLine],
) -> (SplitterNode, bool) {
    let query = node.query().clone();
    let mut needs_split = !query.definitely_whole_subtree();

    let mut has_expectation = false;
    for expectation in expectations.iter_mut() {
        if query.contains(&expectation.query) {
            expectation.seen = true;
            has_expectation = true;
        }
    }

    let mut children = Vec::new();
    if let TestTreeNode::Subtree(Subtree {
        children: tree_children,
        ..
    }) = node
    {
        for child in tree_children.values() {
            let (child_node, child_has_expectation) = splitter_node(child, expectations);
            needs_split |= child_has_expectation;
            children.push(child_node);
        }
    }

    (
        SplitterNode {
            query,
            needs_split,
            children,
        },
        has_expectation,
    )
}

fn emit(node: &SplitterNode, out: &mut Vec<String>) {
    if node.needs_split && !node.children.is_empty() {
        for child in &node.children {
            emit(child, out);
        }
    } else {
        out.push(node.query.to_string());
    }
}
