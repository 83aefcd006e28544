//! Next-page discovery
//!
//! A lineage ends when no pagination candidate matches. Loop safety comes
//! from [`crate::state::CrawlState`], which never admits a visited URL twice.

use crate::config::DelayRange;
use crate::crawler::request::{FetchRequest, FetchStrategy, PageRole};
use crate::extract::SelectorChain;
use scraper::Html;
use url::Url;

/// Finds the next page of a listing and turns it into a delayed request
#[derive(Debug, Clone)]
pub struct PaginationWalker {
    chain: SelectorChain,
    delay: DelayRange,
    strategy: FetchStrategy,
}

impl PaginationWalker {
    /// # Arguments
    ///
    /// * `chain` - Pagination chain; candidates should resolve hrefs
    /// * `delay` - Inter-page jitter applied before the next page is dispatched
    /// * `strategy` - Strategy used for every page of the lineage
    pub fn new(chain: SelectorChain, delay: DelayRange, strategy: FetchStrategy) -> Self {
        Self {
            chain,
            delay,
            strategy,
        }
    }

    /// Absolute URL of the next page, or None when the lineage ends
    pub fn next_page(&self, document: &Html, page_url: &Url) -> Option<Url> {
        let href = self.chain.extract(document.root_element(), page_url)?;
        match page_url.join(&href) {
            Ok(next) if matches!(next.scheme(), "http" | "https") => Some(next),
            Ok(next) => {
                tracing::debug!("Ignoring non-http pagination link {} on {}", next, page_url);
                None
            }
            Err(e) => {
                tracing::debug!("Unusable pagination link '{}' on {}: {}", href, page_url, e);
                None
            }
        }
    }

    /// The request for the next page, carrying a freshly sampled dispatch delay
    pub fn next_request(&self, document: &Html, page_url: &Url, role: PageRole) -> Option<FetchRequest> {
        let next = self.next_page(document, page_url)?;
        let delay = self.delay.sample(&mut rand::rng());
        tracing::info!(
            "Next page {} found on {}, dispatching in {:.2}s",
            next,
            page_url,
            delay.as_secs_f64()
        );
        Some(FetchRequest::discovered(next, self.strategy, role, delay))
    }
}
