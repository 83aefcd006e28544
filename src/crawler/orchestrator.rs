//! Bounded fetch dispatch with retries
//!
//! Every fetch takes one permit from its pipeline's pool and one from the
//! crawl-wide pool shared by all simultaneously running pipelines. Excess
//! requests wait for a free slot; nothing is rejected. A request keeps its
//! slots through back-off sleeps until it resolves.

use crate::crawler::renderer::PageRenderer;
use crate::crawler::request::{FetchOutcome, FetchRequest, TransientKind};
use crate::crawler::retry::RetryPolicy;
use crate::state::FetchState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Running totals kept by an orchestrator
#[derive(Debug, Default)]
pub struct FetchCounters {
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    abandoned: AtomicU64,
    retries: AtomicU64,
}

/// Point-in-time copy of [`FetchCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchCounts {
    pub dispatched: u64,
    pub succeeded: u64,
    pub abandoned: u64,
    pub retries: u64,
}

impl FetchCounters {
    pub fn snapshot(&self) -> FetchCounts {
        FetchCounts {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

/// Dispatches requests to a renderer and applies the retry policy
pub struct FetchOrchestrator {
    renderer: Arc<dyn PageRenderer>,
    policy: RetryPolicy,
    global_permits: Arc<Semaphore>,
    pipeline_permits: Arc<Semaphore>,
    counters: FetchCounters,
}

impl FetchOrchestrator {
    /// Creates an orchestrator
    ///
    /// # Arguments
    ///
    /// * `renderer` - Strategy that performs single attempts
    /// * `policy` - Retry decisions
    /// * `global_permits` - Crawl-wide in-flight bound, shared across pipelines
    /// * `max_concurrent` - This pipeline's own in-flight bound
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        policy: RetryPolicy,
        global_permits: Arc<Semaphore>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            renderer,
            policy,
            global_permits,
            pipeline_permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            counters: FetchCounters::default(),
        }
    }

    pub fn counts(&self) -> FetchCounts {
        self.counters.snapshot()
    }

    /// Fetches `request` to completion
    ///
    /// Returns the successful page, or the last failure once the request is
    /// abandoned. Never returns early on a transient failure that still has
    /// attempts left.
    pub async fn fetch(&self, request: FetchRequest) -> FetchOutcome {
        if !request.dispatch_delay.is_zero() {
            tracing::debug!(
                "Waiting {:.2}s before dispatching {}",
                request.dispatch_delay.as_secs_f64(),
                request.url
            );
            tokio::time::sleep(request.dispatch_delay).await;
        }

        let Ok(_pipeline_permit) = self.pipeline_permits.acquire().await else {
            return FetchOutcome::TransientFailure(TransientKind::Network(
                "fetch pool closed".to_string(),
            ));
        };
        let Ok(_global_permit) = self.global_permits.acquire().await else {
            return FetchOutcome::TransientFailure(TransientKind::Network(
                "fetch pool closed".to_string(),
            ));
        };

        tracing::info!(
            "Dispatching {} ({} fetch, {} page)",
            request.url,
            request.strategy,
            request.role
        );
        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);

        let mut state = FetchState::start(request.attempt);
        let mut current = request;

        loop {
            let outcome = self.renderer.render(&current).await;
            let decision = self
                .policy
                .decide(&outcome, current.attempt, &mut rand::rng());
            state = state.after(decision);

            match state {
                FetchState::Succeeded => {
                    if let FetchOutcome::Success(page) = &outcome {
                        tracing::info!(
                            "Fetched {} (HTTP {}) on attempt {}",
                            current.url,
                            page.status,
                            current.attempt + 1
                        );
                    }
                    self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                    return outcome;
                }
                FetchState::PermanentlyFailed => {
                    tracing::error!(
                        "Abandoning {} after {} attempt(s): {}",
                        current.url,
                        current.attempt + 1,
                        outcome
                    );
                    self.counters.abandoned.fetch_add(1, Ordering::Relaxed);
                    return outcome;
                }
                FetchState::Backoff { next_attempt, delay } => {
                    tracing::warn!(
                        "{} on {}, retrying in {:.2}s (attempt {})",
                        outcome,
                        current.url,
                        delay.as_secs_f64(),
                        next_attempt + 1
                    );
                    self.counters.retries.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                    state = state.resume();
                    current = current.next_attempt();
                }
                FetchState::Attempting { .. } => {}
            }
        }
    }
}
