use crate::extract::profile::SiteProfile;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Record-level extraction problems
///
/// These are logged and the offending block is skipped; they never abort a page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("required field '{0}' is missing or blank")]
    MissingField(&'static str),

    #[error("count text '{0}' does not match the count pattern")]
    UnparsableCount(String),
}

/// Anything the aggregator can collect and the writer can persist
pub trait Record: Serialize + Send + 'static {
    /// Key used by the optional dedupe consumer
    fn identity(&self) -> String;
}

/// A product card extracted from a listing page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub title: String,
    pub price: Option<String>,
    pub link: Option<String>,
    pub image: Option<String>,
    pub brand: String,
    pub reviews: Option<String>,
    pub availability: Option<String>,
    pub sale_info: Option<String>,
    pub source_url: String,
}

impl Record for ProductRecord {
    fn identity(&self) -> String {
        format!("{}\u{1f}{}", self.title, self.link.as_deref().unwrap_or(""))
    }
}

/// A product detail page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub link: String,
    pub name: String,
    pub price: Option<String>,
    pub ingredients: Option<String>,
}

impl Record for DetailRecord {
    fn identity(&self) -> String {
        self.link.clone()
    }
}

/// Expected product total for one collection page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountRecord {
    pub page: String,
    #[serde(rename = "Total products")]
    pub total_products: u64,
}

impl Record for CountRecord {
    fn identity(&self) -> String {
        self.page.clone()
    }
}

/// Input row of the details pass; extra keys are ignored
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductLink {
    pub link: String,
}

/// Collapses whitespace runs into single spaces
pub fn clean_price(raw: &str) -> Option<String> {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Extracts every product card on a listing page
///
/// The first `cards` locator matching at least one element defines the
/// product blocks. Blocks that fail to build a record are logged and
/// skipped; their siblings still produce records.
///
/// # Arguments
///
/// * `document` - Parsed listing page
/// * `page_url` - URL the page was served from; recorded as `source_url`
/// * `profile` - Compiled selector table
pub fn extract_products(document: &Html, page_url: &Url, profile: &SiteProfile) -> Vec<ProductRecord> {
    let Some((locator, blocks)) = profile.cards.select_blocks(document.root_element()) else {
        tracing::warn!("No products found with any card selector on {}", page_url);
        return Vec::new();
    };

    tracing::info!(
        "Found {} products using selector '{}' on {}",
        blocks.len(),
        locator,
        page_url
    );

    let mut records = Vec::with_capacity(blocks.len());
    for (index, block) in blocks.into_iter().enumerate() {
        match build_product(block, page_url, profile) {
            Ok(record) => records.push(record),
            Err(e) => tracing::debug!("Skipping product block {} on {}: {}", index, page_url, e),
        }
    }
    records
}

/// Builds one ProductRecord from a product block
pub fn build_product(
    block: ElementRef<'_>,
    page_url: &Url,
    profile: &SiteProfile,
) -> Result<ProductRecord, ExtractError> {
    let title = profile
        .title
        .extract(block, page_url)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(ExtractError::MissingField("title"))?;

    let price = profile
        .price
        .extract(block, page_url)
        .and_then(|p| clean_price(&p));

    let brand = profile
        .brand
        .extract(block, page_url)
        .unwrap_or_else(|| profile.default_brand.clone());

    Ok(ProductRecord {
        title,
        price,
        link: profile.link.extract(block, page_url),
        image: profile.image.extract(block, page_url),
        brand,
        reviews: profile.reviews.extract(block, page_url),
        availability: profile.availability.extract(block, page_url),
        sale_info: profile.sale.extract(block, page_url),
        source_url: page_url.to_string(),
    })
}

/// Extracts the detail record of a product page
///
/// `link` is the URL the page was finally served from.
pub fn extract_detail(
    document: &Html,
    page_url: &Url,
    profile: &SiteProfile,
) -> Result<DetailRecord, ExtractError> {
    let root = document.root_element();

    let name = profile
        .detail_name
        .extract(root, page_url)
        .ok_or(ExtractError::MissingField("name"))?;

    Ok(DetailRecord {
        link: page_url.to_string(),
        name,
        price: profile
            .detail_price
            .extract(root, page_url)
            .and_then(|p| clean_price(&p)),
        ingredients: profile.detail_ingredients.extract(root, page_url),
    })
}

/// Extracts the expected product total of a collection page
pub fn extract_count(
    document: &Html,
    page_url: &Url,
    profile: &SiteProfile,
) -> Result<CountRecord, ExtractError> {
    let text = profile
        .count
        .extract(document.root_element(), page_url)
        .ok_or(ExtractError::MissingField("count"))?;

    let total_products = profile
        .count_pattern
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .ok_or_else(|| ExtractError::UnparsableCount(text.clone()))?;

    Ok(CountRecord {
        page: page_url.to_string(),
        total_products,
    })
}
