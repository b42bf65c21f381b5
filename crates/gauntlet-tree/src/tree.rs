//! The loaded test tree
//!
//! Nodes are keyed by their printed query. Interior nodes are subtrees
//! (suite, directories, files, test groups, param prefixes); leaves are
//! concrete cases. Below file level, a subtree with a single child
//! collapses into that child, so a parameterless case hangs directly off
//! its file node and can be named exactly by the minimal query list.

use crate::group::{CaseAbort, CaseEntry, RunContext, RunFn};
use crate::loader::{MemoizedLoader, SuiteLoader};
use crate::TreeError;
use futures_util::FutureExt;
use gauntlet_log::{CaseRecorder, CaseResult, Expectation, QueryExpectation};
use gauntlet_query::compare::{compare_paths, Ordering};
use gauntlet_query::{parse_query, ParamRecord, TestQuery};
use indexmap::IndexMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Aggregate metadata of a subtree, summed bottom-up once loading finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubtreeCounts {
    /// Number of concrete cases in the subtree.
    pub tests: usize,
    /// Number of cases marked TODO.
    pub nodes_with_todo: usize,
}

impl std::ops::AddAssign for SubtreeCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.tests += rhs.tests;
        self.nodes_with_todo += rhs.nodes_with_todo;
    }
}

/// An interior node of the tree.
pub struct Subtree {
    pub query: TestQuery,
    pub description: Option<String>,
    /// Children keyed by their printed query, in load order.
    pub children: IndexMap<String, TestTreeNode>,
    /// Absent until the bottom-up fold runs; readers must tolerate `None`.
    pub counts: Option<SubtreeCounts>,
}

impl Subtree {
    fn new(query: TestQuery) -> Self {
        Self {
            query,
            description: None,
            children: IndexMap::new(),
            counts: None,
        }
    }
}

/// One concrete, runnable case.
pub struct TestCase {
    /// The case's `Single` query.
    pub query: TestQuery,
    /// Full parameter record, private keys included.
    pub params: ParamRecord,
    /// Extra fields of each subcase; empty when the case has none.
    pub subcases: Vec<ParamRecord>,
    pub todo: bool,
    run: RunFn,
}

impl TestCase {
    /// Drive the case body to completion and produce its result.
    ///
    /// Never fails: skips, explicit failures, and panics inside the body
    /// are all captured into the recorder, and expectation overrides are
    /// applied before the result is finalized.
    pub async fn execute(
        &self,
        recorder: CaseRecorder,
        expectations: &[QueryExpectation],
    ) -> CaseResult {
        recorder.start();

        let expected = match self.resolve_expectation(expectations) {
            Ok(expected) => expected,
            Err(err) => {
                recorder.threw(err.to_string(), None);
                return recorder.finish();
            }
        };
        if expected == Expectation::Skip {
            recorder.skipped("skipped by expectation");
            return recorder.finish();
        }

        if self.subcases.is_empty() {
            self.run_body(self.params.clone(), recorder.clone()).await;
            if expected == Expectation::Fail {
                recorder.apply_expected_failure();
            }
        } else {
            for extras in &self.subcases {
                let mut merged = self.params.clone();
                for (key, value) in extras.iter() {
                    merged.insert(key.to_string(), value.clone());
                }
                let name = gauntlet_query::stringify_public_params(extras);
                let subcase = recorder.record_subcase(name);
                self.run_body(merged, subcase.recorder().clone()).await;
                subcase.finish_subcase(expected);
            }
        }
        recorder.finish()
    }

    fn resolve_expectation(
        &self,
        expectations: &[QueryExpectation],
    ) -> Result<Expectation, TreeError> {
        for expectation in expectations {
            let query =
                parse_query(&expectation.query).map_err(|source| TreeError::MalformedExpectation {
                    line: expectation.query.clone(),
                    source,
                })?;
            if query.contains(&self.query) {
                return Ok(expectation.expectation);
            }
        }
        Ok(Expectation::Pass)
    }

    async fn run_body(&self, params: ParamRecord, recorder: CaseRecorder) {
        let context = RunContext {
            params,
            recorder: recorder.clone(),
        };
        let body = (self.run)(context);
        match AssertUnwindSafe(body).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(CaseAbort::Skip(message))) => recorder.skipped(message),
            Ok(Err(CaseAbort::Fail(message))) => recorder.expectation_failed(message),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                recorder.threw(
                    format!("case body panicked: {message}"),
                    Some(std::backtrace::Backtrace::force_capture().to_string()),
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// A node: an interior subtree or a concrete case.
pub enum TestTreeNode {
    Subtree(Subtree),
    Leaf(Arc<TestCase>),
}

impl TestTreeNode {
    pub fn query(&self) -> &TestQuery {
        match self {
            TestTreeNode::Subtree(subtree) => &subtree.query,
            TestTreeNode::Leaf(case) => &case.query,
        }
    }
}

/// The tree loaded for one root query.
pub struct TestTree {
    pub root: Subtree,
}

impl TestTree {
    /// All cases, in deterministic load order.
    pub fn leaves(&self) -> Vec<Arc<TestCase>> {
        fn walk(node: &TestTreeNode, out: &mut Vec<Arc<TestCase>>) {
            match node {
                TestTreeNode::Subtree(subtree) => {
                    for child in subtree.children.values() {
                        walk(child, out);
                    }
                }
                TestTreeNode::Leaf(case) => out.push(Arc::clone(case)),
            }
        }
        let mut out = Vec::new();
        for child in self.root.children.values() {
            walk(child, &mut out);
        }
        out
    }

    /// Find the case with exactly this `Single` query, if loaded.
    pub fn find_case(&self, query: &TestQuery) -> Option<Arc<TestCase>> {
        self.leaves()
            .into_iter()
            .find(|case| case.query == *query)
    }
}

/// Load the subtree selected by `root_query`.
///
/// Only files whose path is ordered against the query's file path are
/// imported; everything else in the listing is skipped untouched.
pub async fn load_tree<L: SuiteLoader + 'static>(
    loader: &MemoizedLoader<L>,
    root_query: &TestQuery,
) -> Result<TestTree, TreeError> {
    let suite = root_query.suite().to_string();
    let listing = loader.listing(&suite)?;

    let mut root = Subtree::new(TestQuery::MultiFile {
        suite: suite.clone(),
        file_path: vec![],
    });

    for entry in listing {
        let ordering = compare_paths(&entry.path, root_query.file_path());
        if ordering == Ordering::Unordered {
            continue;
        }
        let query_is_multi_file = matches!(root_query, TestQuery::MultiFile { .. });

        if !entry.is_file {
            // Readme entries decorate the suite root, ancestor directories,
            // and (for multi-file queries) directories inside the prefix.
            if entry.path.is_empty() {
                root.description = entry.readme.clone();
            } else if ordering == Ordering::StrictSuperset
                || (query_is_multi_file
                    && matches!(ordering, Ordering::Equal | Ordering::StrictSubset))
            {
                let node = ensure_dir_chain(&mut root, &suite, &entry.path);
                node.description = entry.readme.clone();
            }
            continue;
        }

        let file_matches = if query_is_multi_file {
            matches!(ordering, Ordering::Equal | Ordering::StrictSubset)
        } else {
            ordering == Ordering::Equal
        };
        if !file_matches {
            continue;
        }

        let spec = loader.import(&suite, &entry.path).await?;
        let file_node = ensure_file_node(&mut root, &suite, &entry.path);
        file_node.description = Some(spec.description.clone());

        let cases = spec.group.collect_cases()?;
        tracing::debug!(
            suite = suite.as_str(),
            file = %entry.path.join(","),
            cases = cases.len(),
            "loaded test file"
        );
        for case in cases {
            insert_case(file_node, &suite, &entry.path, case, root_query);
        }
    }

    // Lock in the shape: collapse single-child chains below file level,
    // then fold counts bottom-up.
    collapse_below_files(&mut root);
    fold_counts(&mut root);

    Ok(TestTree { root })
}

fn subtree_child<'a>(parent: &'a mut Subtree, query: TestQuery) -> &'a mut Subtree {
    let key = query.to_string();
    let node = parent
        .children
        .entry(key)
        .or_insert_with(|| TestTreeNode::Subtree(Subtree::new(query)));
    match node {
        TestTreeNode::Subtree(subtree) => subtree,
        // Construction only places leaves at fully concrete queries and
        // interior nodes at wildcard queries, so the keys cannot clash.
        TestTreeNode::Leaf(_) => unreachable!("interior node keyed as a leaf"),
    }
}

fn ensure_dir_chain<'a>(
    root: &'a mut Subtree,
    suite: &str,
    path: &[String],
) -> &'a mut Subtree {
    let mut node = root;
    for depth in 1..=path.len() {
        node = subtree_child(
            node,
            TestQuery::MultiFile {
                suite: suite.to_string(),
                file_path: path[..depth].to_vec(),
            },
        );
    }
    node
}

fn ensure_file_node<'a>(
    root: &'a mut Subtree,
    suite: &str,
    path: &[String],
) -> &'a mut Subtree {
    let node = if path.len() > 1 {
        ensure_dir_chain(root, suite, &path[..path.len() - 1])
    } else {
        root
    };
    subtree_child(
        node,
        TestQuery::MultiTest {
            suite: suite.to_string(),
            file_path: path.to_vec(),
            test_path: vec![],
        },
    )
}

fn insert_case(
    file_node: &mut Subtree,
    suite: &str,
    file_path: &[String],
    case: CaseEntry,
    root_query: &TestQuery,
) {
    let case_query = TestQuery::Single {
        suite: suite.to_string(),
        file_path: file_path.to_vec(),
        test_path: case.test_path.clone(),
        params: case.params.clone(),
    };
    if !root_query.contains(&case_query) {
        return;
    }

    // Test-path prefix nodes, then the test node itself.
    let mut node = file_node;
    for depth in 1..case.test_path.len() {
        node = subtree_child(
            node,
            TestQuery::MultiTest {
                suite: suite.to_string(),
                file_path: file_path.to_vec(),
                test_path: case.test_path[..depth].to_vec(),
            },
        );
    }
    node = subtree_child(
        node,
        TestQuery::MultiCase {
            suite: suite.to_string(),
            file_path: file_path.to_vec(),
            test_path: case.test_path.clone(),
            params: ParamRecord::new(),
        },
    );
    if node.description.is_none() {
        node.description = case.desc.clone();
    }

    // Param-prefix nodes for all but the last public param.
    let public: Vec<(String, gauntlet_query::ParamValue)> = case
        .params
        .public_entries()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    if public.len() > 1 {
        for depth in 1..public.len() {
            let prefix: ParamRecord = public[..depth].iter().cloned().collect();
            node = subtree_child(
                node,
                TestQuery::MultiCase {
                    suite: suite.to_string(),
                    file_path: file_path.to_vec(),
                    test_path: case.test_path.clone(),
                    params: prefix,
                },
            );
        }
    }

    let leaf = TestCase {
        query: case_query,
        params: case.params,
        subcases: case.subcases,
        todo: case.todo,
        run: case.run,
    };
    node.children
        .insert(leaf.query.to_string(), TestTreeNode::Leaf(Arc::new(leaf)));
}

/// True for file nodes: the coarsest level that may host collapsing below.
fn is_file_node(query: &TestQuery) -> bool {
    matches!(query, TestQuery::MultiTest { test_path, .. } if test_path.is_empty())
}

fn collapse_below_files(root: &mut Subtree) {
    for child in root.children.values_mut() {
        if let TestTreeNode::Subtree(subtree) = child {
            if is_file_node(&subtree.query) {
                collapse_chains(subtree);
            } else {
                collapse_below_files(subtree);
            }
        }
    }
}

fn collapse_chains(parent: &mut Subtree) {
    let children = std::mem::take(&mut parent.children);
    for (_, mut child) in children {
        if let TestTreeNode::Subtree(ref mut subtree) = child {
            collapse_chains(subtree);
            if subtree.children.len() == 1 {
                let (_, only) = subtree
                    .children
                    .shift_remove_index(0)
                    .unwrap_or_else(|| unreachable!("len checked above"));
                child = only;
            }
        }
        parent
            .children
            .insert(child.query().to_string(), child);
    }
}

fn fold_counts(subtree: &mut Subtree) -> SubtreeCounts {
    let mut total = SubtreeCounts::default();
    for child in subtree.children.values_mut() {
        match child {
            TestTreeNode::Subtree(sub) => total += fold_counts(sub),
            TestTreeNode::Leaf(case) => {
                total += SubtreeCounts {
                    tests: 1,
                    nodes_with_todo: usize::from(case.todo),
                }
            }
        }
    }
    subtree.counts = Some(total);
    total
}
