//! Crawler coordinator - the worklist loop shared by every pipeline
//!
//! The frontier lives in [`CrawlState`] behind a mutex. The loop drains it
//! into spawned page tasks; each task fetches through the orchestrator,
//! interprets the page with the pipeline's handler, and pushes records and
//! discovered requests back into the state. The run ends when the frontier
//! is empty and no task is outstanding.

use crate::config::{Config, PipelineSettings};
use crate::crawler::handler::PageHandler;
use crate::crawler::orchestrator::FetchOrchestrator;
use crate::crawler::pagination::PaginationWalker;
use crate::crawler::renderer::PageRenderer;
use crate::crawler::request::{FetchOutcome, FetchRequest, FetchStrategy, FetchedPage, PageRole};
use crate::crawler::retry::RetryPolicy;
use crate::extract::SiteProfile;
use crate::output::CrawlStatistics;
use crate::state::CrawlState;
use crate::url::is_allowed_domain;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Execution context handed to every pipeline
///
/// Built once per process. The global permit pool bounds in-flight fetches
/// across all pipelines that run at the same time.
#[derive(Clone)]
pub struct CrawlContext {
    pub config: Arc<Config>,
    pub profile: Arc<SiteProfile>,
    pub global_permits: Arc<Semaphore>,
}

impl CrawlContext {
    pub fn new(config: Config, profile: SiteProfile) -> Self {
        let permits = config.crawler.global_max_concurrent_fetches.max(1) as usize;
        Self {
            config: Arc::new(config),
            profile: Arc::new(profile),
            global_permits: Arc::new(Semaphore::new(permits)),
        }
    }
}

/// Records and statistics of a finished pipeline run
#[derive(Debug)]
pub struct PipelineRun<R> {
    pub records: Vec<R>,
    pub stats: CrawlStatistics,
}

/// Locks a mutex, recovering the data if a page task panicked while holding it
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between the loop and its page tasks
struct Shared<H: PageHandler> {
    handler: H,
    orchestrator: FetchOrchestrator,
    walker: PaginationWalker,
    strategy: FetchStrategy,
    allowed_domains: Vec<String>,
    state: Mutex<CrawlState<H::Record>>,
    off_domain: AtomicU64,
}

impl<H: PageHandler> Shared<H> {
    /// Fetches one request and folds its page into the crawl state
    async fn visit(&self, request: FetchRequest) {
        let role = request.role;
        // Abandoned requests were logged by the orchestrator and contribute nothing
        if let FetchOutcome::Success(page) = self.orchestrator.fetch(request).await {
            let (records, requests) = self.process_page(role, &page);
            let mut state = lock(&self.state);
            state.add_records(records);
            for request in requests {
                state.enqueue(request);
            }
        }
    }

    /// Parses a page and works out its records and follow-up requests
    ///
    /// Parsed documents never cross an await point.
    fn process_page(&self, role: PageRole, page: &FetchedPage) -> (Vec<H::Record>, Vec<FetchRequest>) {
        let document = page.document();
        let page_url = &page.final_url;
        let output = self.handler.handle(role, &document, page_url);

        let mut requests = Vec::with_capacity(output.follow.len() + 1);
        for (url, next_role) in output.follow {
            if self.admits(&url) {
                requests.push(FetchRequest::discovered(
                    url,
                    self.strategy,
                    next_role,
                    Duration::ZERO,
                ));
            }
        }

        if self.handler.paginates(role) {
            match self.walker.next_request(&document, page_url, role) {
                Some(next) if self.admits(&next.url) => requests.push(next),
                Some(_) => {}
                None => tracing::info!("No next page on {}, lineage complete", page_url),
            }
        }

        (output.records, requests)
    }

    fn admits(&self, url: &Url) -> bool {
        if is_allowed_domain(url, &self.allowed_domains) {
            true
        } else {
            tracing::debug!("Skipping off-domain link {}", url);
            self.off_domain.fetch_add(1, Ordering::Relaxed);
            false
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator<H: PageHandler> {
    shared: Arc<Shared<H>>,
    name: &'static str,
    dedupe: bool,
}

impl<H: PageHandler> Coordinator<H> {
    /// Creates a coordinator for one pipeline run
    ///
    /// # Arguments
    ///
    /// * `ctx` - Shared execution context
    /// * `handler` - Page interpretation for this pipeline
    /// * `renderer` - Fetch strategy implementation
    /// * `settings` - Resolved pipeline settings
    pub fn new(
        ctx: &CrawlContext,
        handler: H,
        renderer: Arc<dyn PageRenderer>,
        settings: &PipelineSettings,
    ) -> Self {
        let config = &ctx.config;
        let orchestrator = FetchOrchestrator::new(
            renderer,
            RetryPolicy::new(config.retry.clone()),
            ctx.global_permits.clone(),
            settings.max_concurrent_fetches as usize,
        );
        let walker = PaginationWalker::new(
            ctx.profile.pagination.clone(),
            config.crawler.page_delay_ms,
            settings.strategy,
        );
        let name = handler.name();

        Self {
            shared: Arc::new(Shared {
                handler,
                orchestrator,
                walker,
                strategy: settings.strategy,
                allowed_domains: config.crawler.allowed_domains.clone(),
                state: Mutex::new(CrawlState::new(config.crawler.dedupe)),
                off_domain: AtomicU64::new(0),
            }),
            name,
            dedupe: config.crawler.dedupe,
        }
    }

    /// Runs the crawl from `seeds` until the frontier drains
    ///
    /// Seeds are not domain-filtered. Per-URL failures never fail the run;
    /// they only reduce the records collected.
    pub async fn run(self, seeds: Vec<Url>) -> PipelineRun<H::Record> {
        let start_time = Instant::now();
        let seed_role = self.shared.handler.seed_role();

        {
            let mut state = lock(&self.shared.state);
            for seed in seeds {
                state.enqueue(FetchRequest::seed(seed, self.shared.strategy, seed_role));
            }
            tracing::info!(
                "Starting {} crawl with {} seed URL(s)",
                self.name,
                state.frontier_len()
            );
        }

        let mut tasks = JoinSet::new();
        let mut pages_done = 0u64;

        loop {
            loop {
                let next = lock(&self.shared.state).dequeue();
                let Some(request) = next else { break };
                let shared = self.shared.clone();
                tasks.spawn(async move { shared.visit(request).await });
            }

            match tasks.join_next().await {
                Some(Ok(())) => {}
                Some(Err(e)) => tracing::error!("Page task failed: {}", e),
                None => break,
            }

            pages_done += 1;
            if pages_done % 10 == 0 {
                let frontier = lock(&self.shared.state).frontier_len();
                tracing::info!(
                    "Progress: {} pages processed, {} in flight, {} in frontier",
                    pages_done,
                    tasks.len(),
                    frontier
                );
            }
        }

        let state = std::mem::replace(
            &mut *lock(&self.shared.state),
            CrawlState::new(self.dedupe),
        );
        let already_seen = state.rejected();
        let results = state.finish();
        let counts = self.shared.orchestrator.counts();

        let stats = CrawlStatistics {
            pipeline: self.name.to_string(),
            pages_dispatched: counts.dispatched,
            pages_fetched: counts.succeeded,
            pages_abandoned: counts.abandoned,
            retries: counts.retries,
            records: results.len() as u64,
            duplicates: results.duplicates(),
            urls_already_seen: already_seen,
            urls_off_domain: self.shared.off_domain.load(Ordering::Relaxed),
            elapsed: start_time.elapsed(),
        };
        tracing::info!("{}", stats.summary_line());

        PipelineRun {
            records: results.into_records(),
            stats,
        }
    }
}
