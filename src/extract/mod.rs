//! Field extraction for Catalog-Sweep
//!
//! This module turns fetched documents into records:
//! - Ordered fallback selector chains ([`SelectorChain`])
//! - The site selector table ([`SiteProfile`]), loaded once at startup
//! - Record builders for product cards, detail pages and collection counts
//!
//! Missing optional fields degrade to `None`. A block that cannot produce a
//! record is skipped without affecting its siblings.

mod chain;
mod profile;
mod records;

pub use chain::{
    CandidateEntry, ExtractionMode, ModeName, SelectorCandidate, SelectorChain, DEFAULT_IMAGE_ATTRS,
};
pub use profile::{SiteProfile, BUILTIN_PROFILE};
pub use records::{
    build_product, clean_price, extract_count, extract_detail, extract_products, CountRecord,
    DetailRecord, ExtractError, ProductLink, ProductRecord, Record,
};
