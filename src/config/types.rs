use crate::crawler::FetchStrategy;
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Catalog-Sweep
///
/// Every section has defaults matching the target storefront, so an empty
/// TOML document is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub light: LightConfig,
    pub rendered: RenderedConfig,
    pub retry: RetryConfig,
    pub output: OutputConfig,
    pub site: SiteConfig,
    pub pipelines: PipelinesConfig,
}

/// An inclusive `[min, max]` millisecond range sampled uniformly for jitter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DelayRange(pub u64, pub u64);

impl DelayRange {
    /// A range that always yields zero
    pub const ZERO: DelayRange = DelayRange(0, 0);

    pub fn min_ms(&self) -> u64 {
        self.0
    }

    pub fn max_ms(&self) -> u64 {
        self.1
    }

    /// Draws a uniformly distributed delay from the range
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.1 <= self.0 {
            return Duration::from_millis(self.0);
        }
        Duration::from_millis(rng.random_range(self.0..=self.1))
    }
}

/// Crawl-wide behaviour shared by every pipeline
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Upper bound on in-flight fetches across all simultaneously running pipelines
    pub global_max_concurrent_fetches: u32,

    /// Delay applied before dispatching a pagination-discovered page
    pub page_delay_ms: DelayRange,

    /// Wildcard domain patterns followed links must match
    pub allowed_domains: Vec<String>,

    /// Drop records whose identity was already aggregated
    pub dedupe: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            global_max_concurrent_fetches: 25,
            page_delay_ms: DelayRange(3_000, 7_000),
            allowed_domains: vec!["*.hikoco.co.nz".to_string()],
            dedupe: false,
        }
    }
}

/// Plain HTTP fetch settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LightConfig {
    /// Realistic desktop user agents, one picked at random per request
    pub user_agents: Vec<String>,
    pub referer: String,
    pub accept: String,
    pub accept_language: String,
    pub pre_request_delay_ms: DelayRange,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            user_agents: vec![
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15".to_string(),
            ],
            referer: "https://hikoco.co.nz/".to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"
                .to_string(),
            accept_language: "en-US,en;q=0.5".to_string(),
            pre_request_delay_ms: DelayRange(500, 2_000),
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// Browser rendering settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RenderedConfig {
    pub headless: bool,

    /// Explicit Chrome/Chromium binary; auto-detected when absent
    pub chrome_executable: Option<String>,

    pub user_agent: String,
    pub window_size: (u32, u32),
    pub pre_navigation_delay_ms: DelayRange,
    pub navigation_timeout_secs: u64,

    /// Pause after load before the interaction pass
    pub settle_delay_ms: DelayRange,

    /// Pause after the pointer move
    pub pointer_pause_ms: DelayRange,

    /// Pause after scrolling, before waiting on ready markers
    pub scroll_settle_ms: DelayRange,

    /// Bounded wait for a product container marker; expiry is tolerated
    pub selector_wait_ms: u64,

    pub marker_cookie: CookieConfig,
    pub evasion: EvasionConfig,
}

impl Default for RenderedConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_executable: None,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            window_size: (1920, 1080),
            pre_navigation_delay_ms: DelayRange(2_000, 5_000),
            navigation_timeout_secs: 60,
            settle_delay_ms: DelayRange(1_000, 3_000),
            pointer_pause_ms: DelayRange(100, 500),
            scroll_settle_ms: DelayRange(2_000, 4_000),
            selector_wait_ms: 10_000,
            marker_cookie: CookieConfig::default(),
            evasion: EvasionConfig::default(),
        }
    }
}

/// Cookie seeded into every rendered session before navigation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    pub name: String,
    pub value: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "visited".to_string(),
            value: "true".to_string(),
        }
    }
}

/// Anti-detection profile applied to rendered pages
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EvasionConfig {
    pub enabled: bool,
    pub hide_webdriver: bool,
    pub languages: Vec<String>,
    pub plugin_count: u32,
    pub mask_notification_permission: bool,

    /// Number of discrete steps used to scroll through the full document height
    pub scroll_steps: u32,

    /// Pointer coordinates are drawn from this range on both axes
    pub pointer_range: (u32, u32),
}

impl Default for EvasionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hide_webdriver: true,
            languages: vec!["en-US".to_string(), "en".to_string()],
            plugin_count: 5,
            mask_notification_permission: true,
            scroll_steps: 4,
            pointer_range: (100, 700),
        }
    }
}

/// Retry policy tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Total attempts allowed for rate-limited and server-error responses
    pub max_attempts: u32,

    /// Attempt index below which network failures are retried
    pub max_network_attempts: u32,

    /// Unit of the exponential `2^attempt` term
    pub backoff_unit_ms: u64,

    pub max_delay_ms: u64,
    pub rate_limit_jitter_ms: DelayRange,
    pub server_error_jitter_ms: DelayRange,
    pub network_jitter_ms: DelayRange,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_network_attempts: 4,
            backoff_unit_ms: 1_000,
            max_delay_ms: 60_000,
            rate_limit_jitter_ms: DelayRange(5_000, 15_000),
            server_error_jitter_ms: DelayRange(5_000, 15_000),
            network_jitter_ms: DelayRange(2_000, 10_000),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory datasets are written into
    pub directory: String,

    /// Directory for the rotating log file
    pub log_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: ".".to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

/// Site selector table location
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteConfig {
    /// External selector table; the built-in profile is used when absent
    pub profile_path: Option<String>,
}

/// The pipelines this crate can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Listing crawl emitting product-card records
    Products,
    /// Brand index → collections → product detail pages
    Catalog,
    /// Brand index → collections, emitting expected totals
    Count,
    /// Detail pass over a previously collected link file
    Details,
}

impl PipelineKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Catalog => "catalog",
            Self::Count => "count",
            Self::Details => "details",
        }
    }

    /// Built-in settings for this pipeline
    pub fn defaults(&self) -> PipelineSettings {
        let brand_index = vec!["https://hikoco.co.nz/pages/brand".to_string()];
        match self {
            Self::Products => PipelineSettings {
                start_urls: vec!["https://hikoco.co.nz/collections/abib".to_string()],
                links_file: None,
                strategy: FetchStrategy::Rendered,
                max_concurrent_fetches: 5,
                output: "abib_products.json".to_string(),
            },
            Self::Catalog => PipelineSettings {
                start_urls: brand_index,
                links_file: None,
                strategy: FetchStrategy::Light,
                max_concurrent_fetches: 20,
                output: "product-links.json".to_string(),
            },
            Self::Count => PipelineSettings {
                start_urls: brand_index,
                links_file: None,
                strategy: FetchStrategy::Light,
                max_concurrent_fetches: 25,
                output: "total-products.json".to_string(),
            },
            Self::Details => PipelineSettings {
                start_urls: Vec::new(),
                links_file: Some("product-links.json".to_string()),
                strategy: FetchStrategy::Light,
                max_concurrent_fetches: 5,
                output: "product_details.json".to_string(),
            },
        }
    }
}

/// Per-pipeline overrides as written in the TOML file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PipelineConfig {
    pub start_urls: Option<Vec<String>>,
    pub links_file: Option<String>,
    pub strategy: Option<FetchStrategy>,
    pub max_concurrent_fetches: Option<u32>,
    pub output: Option<String>,
}

/// Pipeline overrides keyed by pipeline name
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelinesConfig {
    pub products: PipelineConfig,
    pub catalog: PipelineConfig,
    pub count: PipelineConfig,
    pub details: PipelineConfig,
}

/// Fully resolved settings for one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub start_urls: Vec<String>,
    pub links_file: Option<String>,
    pub strategy: FetchStrategy,
    pub max_concurrent_fetches: u32,
    pub output: String,
}

impl Config {
    /// Merges the TOML overrides for `kind` over its built-in defaults
    pub fn pipeline(&self, kind: PipelineKind) -> PipelineSettings {
        let overrides = match kind {
            PipelineKind::Products => &self.pipelines.products,
            PipelineKind::Catalog => &self.pipelines.catalog,
            PipelineKind::Count => &self.pipelines.count,
            PipelineKind::Details => &self.pipelines.details,
        };
        let defaults = kind.defaults();

        PipelineSettings {
            start_urls: overrides
                .start_urls
                .clone()
                .unwrap_or(defaults.start_urls),
            links_file: overrides.links_file.clone().or(defaults.links_file),
            strategy: overrides.strategy.unwrap_or(defaults.strategy),
            max_concurrent_fetches: overrides
                .max_concurrent_fetches
                .unwrap_or(defaults.max_concurrent_fetches),
            output: overrides.output.clone().unwrap_or(defaults.output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_delay_range_sample_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let range = DelayRange(5, 15);
        for _ in 0..100 {
            let d = range.sample(&mut rng);
            assert!(d >= Duration::from_millis(5) && d <= Duration::from_millis(15));
        }
    }

    #[test]
    fn test_zero_range() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(DelayRange::ZERO.sample(&mut rng), Duration::ZERO);
    }

    #[test]
    fn test_default_domains_cover_subdomains() {
        let domains = CrawlerConfig::default().allowed_domains;
        for host in ["https://hikoco.co.nz/", "https://www.hikoco.co.nz/products/a"] {
            let url = url::Url::parse(host).unwrap();
            assert!(crate::url::is_allowed_domain(&url, &domains), "{host}");
        }
        let offsite = url::Url::parse("https://cdn.shopify.com/x.jpg").unwrap();
        assert!(!crate::url::is_allowed_domain(&offsite, &domains));
    }

    #[test]
    fn test_pipeline_defaults_when_not_overridden() {
        let config = Config::default();
        let products = config.pipeline(PipelineKind::Products);
        assert_eq!(products.strategy, FetchStrategy::Rendered);
        assert_eq!(products.output, "abib_products.json");

        let count = config.pipeline(PipelineKind::Count);
        assert_eq!(count.max_concurrent_fetches, 25);
    }

    #[test]
    fn test_pipeline_override_merges_per_field() {
        let mut config = Config::default();
        config.pipelines.catalog.output = Some("links.json".to_string());

        let catalog = config.pipeline(PipelineKind::Catalog);
        assert_eq!(catalog.output, "links.json");
        assert_eq!(catalog.max_concurrent_fetches, 20);
        assert_eq!(
            catalog.start_urls,
            vec!["https://hikoco.co.nz/pages/brand".to_string()]
        );
    }
}
