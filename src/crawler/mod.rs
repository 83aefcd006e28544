//! Crawler module for page fetching and crawl coordination
//!
//! This module contains the core crawling logic, including:
//! - Plain HTTP and browser-rendered fetch strategies
//! - Retry decisions with back-off and jitter
//! - Bounded fetch dispatch
//! - Pagination traversal and per-pipeline page handling
//! - Overall crawl coordination

mod coordinator;
mod handler;
mod light;
mod orchestrator;
mod pagination;
mod pipeline;
mod rendered;
mod renderer;
mod request;
mod retry;
mod stealth;

pub use coordinator::{Coordinator, CrawlContext, PipelineRun};
pub use handler::{
    CatalogHandler, CountHandler, DetailsHandler, PageHandler, PageOutput, ProductsHandler,
};
pub use light::{build_http_client, LightFetch};
pub use orchestrator::{FetchCounters, FetchCounts, FetchOrchestrator};
pub use pagination::PaginationWalker;
pub use pipeline::{build_renderer, output_path, run_pipeline, PipelineReport};
pub use rendered::{classify_cdp_error, pointer_target, RenderedFetch};
pub use renderer::PageRenderer;
pub use request::{
    is_retryable_status, FetchOutcome, FetchRequest, FetchStrategy, FetchedPage, PageRole,
    TransientKind,
};
pub use retry::{RetryDecision, RetryPolicy};
pub use stealth::{evasion_script, scroll_script};
