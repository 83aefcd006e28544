use crate::config::compute_text_hash;
use crate::extract::chain::{CandidateEntry, SelectorChain};
use crate::ConfigError;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

/// Selector table compiled into the binary
pub const BUILTIN_PROFILE: &str = include_str!("../../profiles/hikoco.toml");

const DEFAULT_BRAND: &str = "Abib";
const DEFAULT_COUNT_PATTERN: &str = r"(\d+) product";

/// Selector table as written on disk
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct ProfileFile {
    default_brand: Option<String>,
    count_pattern: Option<String>,
    chains: ChainsFile,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct ChainsFile {
    cards: Vec<CandidateEntry>,
    title: Vec<CandidateEntry>,
    price: Vec<CandidateEntry>,
    link: Vec<CandidateEntry>,
    image: Vec<CandidateEntry>,
    brand: Vec<CandidateEntry>,
    reviews: Vec<CandidateEntry>,
    availability: Vec<CandidateEntry>,
    sale: Vec<CandidateEntry>,
    pagination: Vec<CandidateEntry>,
    ready_markers: Vec<CandidateEntry>,
    collection_links: Vec<CandidateEntry>,
    product_links: Vec<CandidateEntry>,
    detail_name: Vec<CandidateEntry>,
    detail_price: Vec<CandidateEntry>,
    detail_ingredients: Vec<CandidateEntry>,
    count: Vec<CandidateEntry>,
}

/// The compiled site-boundary contract
///
/// Holds every selector chain the pipelines evaluate. Built once at startup
/// and shared read-only between tasks.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub cards: SelectorChain,
    pub title: SelectorChain,
    pub price: SelectorChain,
    pub link: SelectorChain,
    pub image: SelectorChain,
    pub brand: SelectorChain,
    pub reviews: SelectorChain,
    pub availability: SelectorChain,
    pub sale: SelectorChain,
    pub pagination: SelectorChain,
    pub ready_markers: SelectorChain,
    pub collection_links: SelectorChain,
    pub product_links: SelectorChain,
    pub detail_name: SelectorChain,
    pub detail_price: SelectorChain,
    pub detail_ingredients: SelectorChain,
    pub count: SelectorChain,
    pub default_brand: String,
    pub count_pattern: Regex,
    /// SHA-256 of the table text
    pub version: String,
}

impl SiteProfile {
    /// Parses and compiles a selector table
    ///
    /// # Errors
    ///
    /// * `ConfigError::Parse` - the text is not valid TOML
    /// * `ConfigError::InvalidSelector` - a locator does not compile
    /// * `ConfigError::Validation` - the count pattern is invalid or has no capture group
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let file: ProfileFile = toml::from_str(text)?;
        let chains = &file.chains;

        let pattern = file
            .count_pattern
            .as_deref()
            .unwrap_or(DEFAULT_COUNT_PATTERN);
        let count_pattern = Regex::new(pattern).map_err(|e| {
            ConfigError::Validation(format!("Invalid count-pattern '{}': {}", pattern, e))
        })?;
        if count_pattern.captures_len() < 2 {
            return Err(ConfigError::Validation(format!(
                "count-pattern '{}' must contain a capture group",
                pattern
            )));
        }

        Ok(Self {
            cards: SelectorChain::compile("cards", &chains.cards)?,
            title: SelectorChain::compile("title", &chains.title)?,
            price: SelectorChain::compile("price", &chains.price)?,
            link: SelectorChain::compile("link", &chains.link)?,
            image: SelectorChain::compile("image", &chains.image)?,
            brand: SelectorChain::compile("brand", &chains.brand)?,
            reviews: SelectorChain::compile("reviews", &chains.reviews)?,
            availability: SelectorChain::compile("availability", &chains.availability)?,
            sale: SelectorChain::compile("sale", &chains.sale)?,
            pagination: SelectorChain::compile("pagination", &chains.pagination)?,
            ready_markers: SelectorChain::compile("ready-markers", &chains.ready_markers)?,
            collection_links: SelectorChain::compile("collection-links", &chains.collection_links)?,
            product_links: SelectorChain::compile("product-links", &chains.product_links)?,
            detail_name: SelectorChain::compile("detail-name", &chains.detail_name)?,
            detail_price: SelectorChain::compile("detail-price", &chains.detail_price)?,
            detail_ingredients: SelectorChain::compile(
                "detail-ingredients",
                &chains.detail_ingredients,
            )?,
            count: SelectorChain::compile("count", &chains.count)?,
            default_brand: file
                .default_brand
                .clone()
                .filter(|b| !b.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BRAND.to_string()),
            count_pattern,
            version: compute_text_hash(text),
        })
    }

    /// The built-in storefront profile
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml(BUILTIN_PROFILE)
    }

    /// Loads the profile at `path`, or the built-in one when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Self::from_toml(&text)
            }
            None => Self::builtin(),
        }
    }

    /// CSS group used when waiting for rendered product containers
    ///
    /// Joins the ready-marker locators into one selector list so a single
    /// query matches any of them.
    pub fn ready_marker_group(&self) -> Option<String> {
        let locators: Vec<&str> = self
            .ready_markers
            .candidates()
            .iter()
            .map(|c| c.locator.as_str())
            .collect();

        if locators.is_empty() {
            None
        } else {
            Some(locators.join(", "))
        }
    }
}
