//! Configuration module for Catalog-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so running without a file targets the built-in storefront.
//!
//! # Example
//!
//! ```no_run
//! use catalog_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sweep.toml")).unwrap();
//! println!("Retry cap: {}", config.retry.max_attempts);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CookieConfig, CrawlerConfig, DelayRange, EvasionConfig, LightConfig, OutputConfig,
    PipelineConfig, PipelineKind, PipelineSettings, PipelinesConfig, RenderedConfig, RetryConfig,
    SiteConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, compute_text_hash, load_config, load_config_or_default,
    load_config_with_hash, parse_config,
};
