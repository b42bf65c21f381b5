//! Direct, same-context case execution

use crate::runner::{CaseRunner, DispatchError};
use futures_util::future::BoxFuture;
use gauntlet_config::HarnessConfig;
use gauntlet_log::{CaseResult, Logger, QueryExpectation};
use gauntlet_query::{parse_query, QueryLevel, TestQuery};
use gauntlet_tree::{load_tree, MemoizedLoader, SuiteLoader};
use std::sync::Arc;

/// Runs case bodies directly on the scheduler's runtime.
///
/// Also the execution core of every worker task: a worker is an
/// `InProcessRunner` living in its own context.
pub struct InProcessRunner<L> {
    loader: Arc<MemoizedLoader<L>>,
    logger: Arc<Logger>,
    options: HarnessConfig,
}

impl<L: SuiteLoader + 'static> InProcessRunner<L> {
    pub fn new(loader: Arc<MemoizedLoader<L>>, options: HarnessConfig) -> Self {
        let logger = Arc::new(Logger::new(options.debug));
        Self {
            loader,
            logger,
            options,
        }
    }

    /// The logger collecting results of every case this runner executed.
    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    pub fn options(&self) -> &HarnessConfig {
        &self.options
    }

    async fn run_case(
        &self,
        query_text: &str,
        expectations: &[QueryExpectation],
    ) -> Result<CaseResult, DispatchError> {
        let query: TestQuery = parse_query(query_text)?;
        if query.level() != QueryLevel::Single {
            return Err(DispatchError::NotASingleCase {
                query: query_text.to_string(),
            });
        }
        // Lazily loads just the file this case lives in; the memoized
        // loader makes repeat hits cheap.
        let tree = load_tree(self.loader.as_ref(), &query).await?;
        let case = tree
            .find_case(&query)
            .ok_or_else(|| DispatchError::CaseNotFound {
                query: query_text.to_string(),
            })?;
        let recorder = self.logger.record(query_text);
        Ok(case.execute(recorder, expectations).await)
    }
}

impl<L: SuiteLoader + 'static> CaseRunner for InProcessRunner<L> {
    fn run<'a>(
        &'a self,
        query: &'a str,
        expectations: &'a [QueryExpectation],
    ) -> BoxFuture<'a, Result<CaseResult, DispatchError>> {
        Box::pin(self.run_case(query, expectations))
    }
}
