//! Output module for datasets, run summaries and reconciliation
//!
//! This module handles:
//! - Writing record datasets as JSON, atomically, once per run
//! - Reading the product-link input of the details pass
//! - Recording and printing per-run statistics
//! - Reconciling expected totals against scraped records

mod reconcile;
pub mod stats;
mod writer;

pub use reconcile::{print_reconcile, reconcile, ReconcileReport};
pub use stats::{print_statistics, CrawlStatistics};
pub use writer::{load_links, write_records};
