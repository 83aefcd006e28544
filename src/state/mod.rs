//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `FetchState`: Retry lifecycle of a single fetch request
//! - `CrawlState`: Frontier, visited set and results of one pipeline run
//! - `ResultAggregator`: Ordered record collection with optional dedupe

mod aggregator;
mod crawl_state;
mod fetch_state;

// Re-export main types
pub use aggregator::ResultAggregator;
pub use crawl_state::CrawlState;
pub use fetch_state::FetchState;
