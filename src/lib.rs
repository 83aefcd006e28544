//! Catalog-Sweep: a resilient storefront crawler
//!
//! This crate crawls catalog-style storefronts and extracts structured product
//! records across paginated listing pages and per-product detail pages,
//! surviving rate limiting, transient server failures and inconsistent markup.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod logging;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Catalog-Sweep operations
///
/// Only setup and final output can fail a run. Per-URL failures are carried
/// as [`crawler::FetchOutcome`] values and never surface here.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Logging setup error: {0}")]
    Logging(String),
}

impl From<chromiumoxide::error::CdpError> for SweepError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        SweepError::Browser(err.to_string())
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector '{locator}' in chain '{chain}'")]
    InvalidSelector { chain: String, locator: String },
}

/// Result type alias for Catalog-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{FetchOutcome, FetchRequest, FetchStrategy, PageRole};
pub use extract::{DetailRecord, ProductRecord, SelectorChain, SiteProfile};
pub use state::{CrawlState, FetchState};
