//! Per-pipeline page interpretation
//!
//! A handler decides what a fetched document means for its pipeline: which
//! records it yields and which links are followed with which role. The
//! coordinator is generic over the handler, so the four pipelines share one
//! crawl loop.

use crate::crawler::request::PageRole;
use crate::extract::{
    extract_count, extract_detail, extract_products, CountRecord, DetailRecord, ProductRecord,
    Record, SelectorChain, SiteProfile,
};
use scraper::Html;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// What one page contributed
#[derive(Debug)]
pub struct PageOutput<R> {
    pub records: Vec<R>,
    /// Links to follow, each with the role of the page it points at
    pub follow: Vec<(Url, PageRole)>,
}

impl<R> PageOutput<R> {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            follow: Vec::new(),
        }
    }

    pub fn records(records: Vec<R>) -> Self {
        Self {
            records,
            follow: Vec::new(),
        }
    }

    pub fn follow(links: Vec<Url>, role: PageRole) -> Self {
        Self {
            records: Vec::new(),
            follow: links.into_iter().map(|url| (url, role)).collect(),
        }
    }
}

/// Interprets fetched documents for one pipeline
pub trait PageHandler: Send + Sync + 'static {
    type Record: Record;

    fn name(&self) -> &'static str;

    /// Role given to start URLs
    fn seed_role(&self) -> PageRole;

    /// Extracts records and follow-up links from a parsed page
    ///
    /// `page_url` is the final URL the page was served from.
    fn handle(&self, role: PageRole, document: &Html, page_url: &Url) -> PageOutput<Self::Record>;

    /// Whether pages of `role` have their pagination followed
    fn paginates(&self, role: PageRole) -> bool;
}

/// Resolves every link a chain yields into absolute URLs, first occurrence wins
fn collect_links(chain: &SelectorChain, document: &Html, page_url: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    chain
        .extract_all(document.root_element(), page_url)
        .into_iter()
        .filter(|href| seen.insert(href.clone()))
        .filter_map(|href| Url::parse(&href).ok())
        .collect()
}

fn detail_records(document: &Html, page_url: &Url, profile: &SiteProfile) -> Vec<DetailRecord> {
    match extract_detail(document, page_url, profile) {
        Ok(record) => vec![record],
        Err(e) => {
            tracing::warn!("No detail record on {}: {}", page_url, e);
            Vec::new()
        }
    }
}

/// Product cards from paginated listing pages
pub struct ProductsHandler {
    profile: Arc<SiteProfile>,
}

impl ProductsHandler {
    pub fn new(profile: Arc<SiteProfile>) -> Self {
        Self { profile }
    }
}

impl PageHandler for ProductsHandler {
    type Record = ProductRecord;

    fn name(&self) -> &'static str {
        "products"
    }

    fn seed_role(&self) -> PageRole {
        PageRole::Listing
    }

    fn handle(&self, role: PageRole, document: &Html, page_url: &Url) -> PageOutput<ProductRecord> {
        match role {
            PageRole::Listing => {
                PageOutput::records(extract_products(document, page_url, &self.profile))
            }
            _ => PageOutput::empty(),
        }
    }

    fn paginates(&self, role: PageRole) -> bool {
        role == PageRole::Listing
    }
}

/// Brand index, then collections, then one detail record per product page
pub struct CatalogHandler {
    profile: Arc<SiteProfile>,
}

impl CatalogHandler {
    pub fn new(profile: Arc<SiteProfile>) -> Self {
        Self { profile }
    }
}

impl PageHandler for CatalogHandler {
    type Record = DetailRecord;

    fn name(&self) -> &'static str {
        "catalog"
    }

    fn seed_role(&self) -> PageRole {
        PageRole::Index
    }

    fn handle(&self, role: PageRole, document: &Html, page_url: &Url) -> PageOutput<DetailRecord> {
        match role {
            PageRole::Index => {
                let links = collect_links(&self.profile.collection_links, document, page_url);
                tracing::info!("Found {} collections on {}", links.len(), page_url);
                PageOutput::follow(links, PageRole::Listing)
            }
            PageRole::Listing => {
                let links = collect_links(&self.profile.product_links, document, page_url);
                tracing::info!("Found {} product links on {}", links.len(), page_url);
                PageOutput::follow(links, PageRole::Detail)
            }
            PageRole::Detail => {
                PageOutput::records(detail_records(document, page_url, &self.profile))
            }
        }
    }

    fn paginates(&self, role: PageRole) -> bool {
        role == PageRole::Listing
    }
}

/// Brand index, then the expected product total of each collection
pub struct CountHandler {
    profile: Arc<SiteProfile>,
}

impl CountHandler {
    pub fn new(profile: Arc<SiteProfile>) -> Self {
        Self { profile }
    }
}

impl PageHandler for CountHandler {
    type Record = CountRecord;

    fn name(&self) -> &'static str {
        "count"
    }

    fn seed_role(&self) -> PageRole {
        PageRole::Index
    }

    fn handle(&self, role: PageRole, document: &Html, page_url: &Url) -> PageOutput<CountRecord> {
        match role {
            PageRole::Index => {
                let links = collect_links(&self.profile.collection_links, document, page_url);
                tracing::info!("Found {} collections on {}", links.len(), page_url);
                PageOutput::follow(links, PageRole::Listing)
            }
            PageRole::Listing => match extract_count(document, page_url, &self.profile) {
                Ok(record) => PageOutput::records(vec![record]),
                Err(e) => {
                    tracing::warn!("No product count on {}: {}", page_url, e);
                    PageOutput::empty()
                }
            },
            PageRole::Detail => PageOutput::empty(),
        }
    }

    fn paginates(&self, _role: PageRole) -> bool {
        false
    }
}

/// Detail records for a previously collected list of product links
pub struct DetailsHandler {
    profile: Arc<SiteProfile>,
}

impl DetailsHandler {
    pub fn new(profile: Arc<SiteProfile>) -> Self {
        Self { profile }
    }
}

impl PageHandler for DetailsHandler {
    type Record = DetailRecord;

    fn name(&self) -> &'static str {
        "details"
    }

    fn seed_role(&self) -> PageRole {
        PageRole::Detail
    }

    fn handle(&self, role: PageRole, document: &Html, page_url: &Url) -> PageOutput<DetailRecord> {
        match role {
            PageRole::Detail => {
                PageOutput::records(detail_records(document, page_url, &self.profile))
            }
            _ => PageOutput::empty(),
        }
    }

    fn paginates(&self, _role: PageRole) -> bool {
        false
    }
}
