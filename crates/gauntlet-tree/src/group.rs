//! Test registration: groups, builders, and the run-callback contract
//!
//! A test file module produces a `SpecFile`: a description plus a
//! `TestGroup` of registered tests. The engine never interprets what a
//! case does; it only needs the case's identity and a callback it can
//! invoke and await.

use crate::TreeError;
use futures_util::future::BoxFuture;
use gauntlet_log::CaseRecorder;
use gauntlet_params::{CaseSpec, ParamsBuilder};
use gauntlet_query::{
    param_value_text_is_valid, stringify_public_params, valid_query_part, ParamRecord,
};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

/// Everything a case body receives when invoked.
pub struct RunContext {
    /// The merged parameter record (case params plus the active subcase's
    /// fields, private keys included).
    pub params: ParamRecord,
    pub recorder: CaseRecorder,
}

/// Early termination of a case body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseAbort {
    /// The case does not apply in this configuration.
    Skip(String),
    /// The case failed with a message.
    Fail(String),
}

/// The registered run callback of one test.
pub type RunFn =
    Arc<dyn Fn(RunContext) -> BoxFuture<'static, Result<(), CaseAbort>> + Send + Sync>;

/// What importing one test file yields.
pub struct SpecFile {
    pub description: String,
    pub group: TestGroup,
}

struct TestDecl {
    path: Vec<String>,
    desc: Option<String>,
    todo: bool,
    params: Option<ParamsBuilder>,
    run: Option<RunFn>,
}

/// An ordered collection of test declarations within one file.
#[derive(Default)]
pub struct TestGroup {
    decls: Vec<TestDecl>,
}

impl TestGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a test. `name` may contain `,` to introduce test-path
    /// segments; segment validity is checked when the group is collected.
    pub fn test(&mut self, name: &str) -> TestBuilder<'_> {
        self.decls.push(TestDecl {
            path: name.split(',').map(str::to_string).collect(),
            desc: None,
            todo: false,
            params: None,
            run: None,
        });
        TestBuilder {
            decl: self.decls.last_mut().expect("just pushed"),
        }
    }

    /// Expand every declaration into its concrete case list.
    ///
    /// Fails fast on invalid or duplicate names and on duplicate case
    /// identities; these are corpus authoring bugs that must stop the whole
    /// invocation before anything runs.
    pub fn collect_cases(&self) -> Result<Vec<CaseEntry>, TreeError> {
        let mut seen_tests: HashSet<String> = HashSet::new();
        let mut seen_cases: HashSet<String> = HashSet::new();
        let mut cases = Vec::new();

        for decl in &self.decls {
            let name = decl.path.join(",");
            for segment in &decl.path {
                if !valid_query_part(segment) {
                    return Err(TreeError::InvalidTestName {
                        name: name.clone(),
                        segment: segment.clone(),
                    });
                }
            }
            if !seen_tests.insert(name.clone()) {
                return Err(TreeError::DuplicateTestName { name });
            }
            let Some(run) = &decl.run else {
                return Err(TreeError::MissingRunFn { name });
            };

            let specs: Vec<CaseSpec> = match &decl.params {
                Some(builder) => builder.iter_cases().collect::<Result<_, _>>()?,
                None => vec![CaseSpec {
                    params: ParamRecord::new(),
                    subcases: vec![],
                }],
            };

            for spec in specs {
                let case_name = format!("{name}:{}", stringify_public_params(&spec.params));
                for (key, value) in spec.params.public_entries() {
                    if !valid_query_part(key) || !param_value_text_is_valid(&value.to_string()) {
                        return Err(TreeError::InvalidParamValue {
                            name: case_name.clone(),
                            key: key.to_string(),
                        });
                    }
                }
                if !seen_cases.insert(case_name.clone()) {
                    return Err(TreeError::DuplicateCase { name: case_name });
                }
                cases.push(CaseEntry {
                    test_path: decl.path.clone(),
                    desc: decl.desc.clone(),
                    params: spec.params,
                    subcases: spec.subcases,
                    run: Arc::clone(run),
                    todo: decl.todo,
                });
            }
        }
        Ok(cases)
    }
}

/// Fluent builder for one test declaration; `run_fn` is the terminal call.
pub struct TestBuilder<'a> {
    decl: &'a mut TestDecl,
}

impl TestBuilder<'_> {
    pub fn desc(self, text: &str) -> Self {
        self.decl.desc = Some(text.to_string());
        self
    }

    /// Mark the test as not yet implemented; the marker aggregates into
    /// subtree counts.
    pub fn todo(self) -> Self {
        self.decl.todo = true;
        self
    }

    /// Attach a parameter pipeline. At most one per test.
    pub fn params(self, builder: ParamsBuilder) -> Self {
        self.decl.params = Some(builder);
        self
    }

    /// Register the case body.
    pub fn run_fn<F, Fut>(self, body: F)
    where
        F: Fn(RunContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CaseAbort>> + Send + 'static,
    {
        self.decl.run = Some(Arc::new(move |ctx| Box::pin(body(ctx))));
    }
}

/// One fully concrete case produced by expanding a declaration.
#[derive(Clone)]
pub struct CaseEntry {
    pub test_path: Vec<String>,
    pub desc: Option<String>,
    pub params: ParamRecord,
    /// Extra fields of each subcase, empty when the test has none.
    pub subcases: Vec<ParamRecord>,
    pub run: RunFn,
    pub todo: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_params::params;
    use pretty_assertions::assert_eq;

    fn noop_group(names: &[&str]) -> TestGroup {
        let mut group = TestGroup::new();
        for name in names {
            group.test(name).run_fn(|_ctx| async { Ok(()) });
        }
        group
    }

    #[test]
    fn collects_in_registration_order() {
        let group = noop_group(&["zeta", "alpha"]);
        let cases = group.collect_cases().unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].test_path, vec!["zeta"]);
        assert_eq!(cases[1].test_path, vec!["alpha"]);
    }

    #[test]
    fn parameterized_test_expands() {
        let mut group = TestGroup::new();
        group
            .test("t")
            .params(params().combine("x", [1i64, 2]))
            .run_fn(|_ctx| async { Ok(()) });
        let cases = group.collect_cases().unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(stringify_public_params(&cases[0].params), "x=1");
    }

    #[test]
    fn duplicate_test_name_rejected() {
        let group = noop_group(&["same", "same"]);
        assert!(matches!(
            group.collect_cases(),
            Err(TreeError::DuplicateTestName { .. })
        ));
    }

    #[test]
    fn invalid_segment_rejected() {
        let group = noop_group(&["has space"]);
        assert!(matches!(
            group.collect_cases(),
            Err(TreeError::InvalidTestName { .. })
        ));
    }

    #[test]
    fn missing_run_fn_rejected() {
        let mut group = TestGroup::new();
        group.test("declared_only").desc("no body");
        assert!(matches!(
            group.collect_cases(),
            Err(TreeError::MissingRunFn { .. })
        ));
    }

    #[test]
    fn duplicate_case_identity_rejected() {
        // Public identity collides even though private params differ.
        let mut group = TestGroup::new();
        group
            .test("t")
            .params(params().combine("_hidden", [1i64, 2]).combine("x", [5i64]))
            .run_fn(|_ctx| async { Ok(()) });
        assert!(matches!(
            group.collect_cases(),
            Err(TreeError::DuplicateCase { .. })
        ));
    }

    #[test]
    fn param_value_with_separator_rejected() {
        let mut group = TestGroup::new();
        group
            .test("t")
            .params(params().combine("s", ["a;b"]))
            .run_fn(|_ctx| async { Ok(()) });
        assert!(matches!(
            group.collect_cases(),
            Err(TreeError::InvalidParamValue { .. })
        ));
    }
}
