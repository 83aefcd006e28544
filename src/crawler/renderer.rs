use crate::crawler::request::{FetchOutcome, FetchRequest, FetchStrategy};
use async_trait::async_trait;

/// A way of turning a request into a fetched page
///
/// Both strategies produce the same outcome shape. Implementations perform
/// exactly one attempt; retrying is the orchestrator's job.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    fn strategy(&self) -> FetchStrategy;

    /// Performs a single fetch attempt for `request`
    async fn render(&self, request: &FetchRequest) -> FetchOutcome;

    /// Releases any session resources; called once when the crawl ends
    async fn shutdown(&self) {}
}
