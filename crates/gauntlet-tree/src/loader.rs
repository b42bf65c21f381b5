//! Suite loaders: listings, imports, and import memoization
//!
//! A `SuiteLoader` answers two questions: which test files exist in a
//! suite, and what does one of them contain. Imports are async because in a
//! hosted deployment they are real module loads; `MemoizedLoader` makes a
//! second concurrent request for the same file await the same in-flight
//! load instead of re-importing.

use crate::group::SpecFile;
use crate::TreeError;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One entry of a suite listing: a test file, or a directory/suite readme.
#[derive(Debug, Clone)]
pub struct ListingEntry {
    pub path: Vec<String>,
    pub readme: Option<String>,
    /// False for readme-only entries (directories and the suite root).
    pub is_file: bool,
}

/// Source of test files for one or more suites.
pub trait SuiteLoader: Send + Sync {
    fn listing(&self, suite: &str) -> Result<Vec<ListingEntry>, TreeError>;

    /// Import one test file, producing its registered spec.
    fn import(&self, suite: &str, path: &[String])
        -> BoxFuture<'static, Result<Arc<SpecFile>, TreeError>>;
}

type RegisterFn = Arc<dyn Fn() -> SpecFile + Send + Sync>;

struct StaticEntry {
    path: Vec<String>,
    readme: Option<String>,
    register: Option<RegisterFn>,
}

/// In-process suite registry
///
/// The Rust analog of a generated listing plus dynamic import: each test
/// file is a registration closure that runs the first time the file is
/// imported.
#[derive(Default)]
pub struct StaticSuiteLoader {
    suites: IndexMap<String, Vec<StaticEntry>>,
}

impl StaticSuiteLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a readme to a directory (or to the suite root with an empty
    /// path).
    pub fn add_readme(&mut self, suite: &str, path: &[&str], text: &str) {
        self.suites
            .entry(suite.to_string())
            .or_default()
            .push(StaticEntry {
                path: path.iter().map(|s| s.to_string()).collect(),
                readme: Some(text.to_string()),
                register: None,
            });
    }

    /// Register a test file under `path`.
    pub fn add_file(
        &mut self,
        suite: &str,
        path: &[&str],
        register: impl Fn() -> SpecFile + Send + Sync + 'static,
    ) {
        self.suites
            .entry(suite.to_string())
            .or_default()
            .push(StaticEntry {
                path: path.iter().map(|s| s.to_string()).collect(),
                readme: None,
                register: Some(Arc::new(register)),
            });
    }
}

impl SuiteLoader for StaticSuiteLoader {
    fn listing(&self, suite: &str) -> Result<Vec<ListingEntry>, TreeError> {
        let entries = self
            .suites
            .get(suite)
            .ok_or_else(|| TreeError::UnknownSuite {
                suite: suite.to_string(),
            })?;
        Ok(entries
            .iter()
            .map(|entry| ListingEntry {
                path: entry.path.clone(),
                readme: entry.readme.clone(),
                is_file: entry.register.is_some(),
            })
            .collect())
    }

    fn import(
        &self,
        suite: &str,
        path: &[String],
    ) -> BoxFuture<'static, Result<Arc<SpecFile>, TreeError>> {
        let register = self
            .suites
            .get(suite)
            .and_then(|entries| {
                entries
                    .iter()
                    .find(|entry| entry.path == path && entry.register.is_some())
            })
            .and_then(|entry| entry.register.clone());
        let suite = suite.to_string();
        let path = path.join(",");
        async move {
            match register {
                Some(register) => Ok(Arc::new(register())),
                None => Err(TreeError::UnknownFile { suite, path }),
            }
        }
        .boxed()
    }
}

type SharedImport = Shared<BoxFuture<'static, Result<Arc<SpecFile>, TreeError>>>;

/// Wraps a loader so each `(suite, path)` is imported at most once.
///
/// The first request starts the import and memoizes the shared future;
/// later requests (concurrent or not) await the same future.
pub struct MemoizedLoader<L> {
    inner: L,
    in_flight: Mutex<HashMap<(String, Vec<String>), SharedImport>>,
}

impl<L: SuiteLoader> MemoizedLoader<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn listing(&self, suite: &str) -> Result<Vec<ListingEntry>, TreeError> {
        self.inner.listing(suite)
    }

    pub fn import(&self, suite: &str, path: &[String]) -> SharedImport {
        let key = (suite.to_string(), path.to_vec());
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight
            .entry(key)
            .or_insert_with(|| {
                tracing::debug!(suite, file = %path.join(","), "importing test file");
                self.inner.import(suite, path).shared()
            })
            .clone()
    }
}
