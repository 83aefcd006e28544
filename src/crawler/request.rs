//! Fetch requests and their outcomes
//!
//! Per-URL failures are carried as [`FetchOutcome`] values. They are never
//! raised as errors, so a failing URL cannot abort the crawl.

use scraper::Html;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use url::Url;

/// How a page is fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Plain HTTP GET, no script execution
    Light,
    /// Full browser navigation with an interaction pass
    Rendered,
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => write!(f, "light"),
            Self::Rendered => write!(f, "rendered"),
        }
    }
}

/// What kind of page a request points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageRole {
    /// Brand index linking to collections
    Index,
    /// Paginated collection or listing page
    Listing,
    /// Single product page
    Detail,
}

impl fmt::Display for PageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index => write!(f, "index"),
            Self::Listing => write!(f, "listing"),
            Self::Detail => write!(f, "detail"),
        }
    }
}

/// A URL to fetch, owned by the orchestrator until it resolves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: Url,
    pub attempt: u32,
    pub strategy: FetchStrategy,
    pub role: PageRole,
    /// Wait applied before the request takes a fetch slot
    pub dispatch_delay: Duration,
}

impl FetchRequest {
    /// A starting URL, dispatched without delay
    pub fn seed(url: Url, strategy: FetchStrategy, role: PageRole) -> Self {
        Self {
            url,
            attempt: 0,
            strategy,
            role,
            dispatch_delay: Duration::ZERO,
        }
    }

    /// A URL discovered on a fetched page
    pub fn discovered(
        url: Url,
        strategy: FetchStrategy,
        role: PageRole,
        dispatch_delay: Duration,
    ) -> Self {
        Self {
            url,
            attempt: 0,
            strategy,
            role,
            dispatch_delay,
        }
    }

    /// The same request, one attempt later
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            dispatch_delay: Duration::ZERO,
            ..self.clone()
        }
    }
}

/// A successfully fetched page
///
/// The body is kept as text and parsed on demand; parsed trees stay on the
/// task that parsed them.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub final_url: Url,
    pub body: String,
}

impl FetchedPage {
    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// Why a fetch may succeed if tried again
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransientKind {
    /// Rate limited (429) or a retryable server error
    Status(u16),
    /// Request or navigation timed out
    Timeout,
    /// Connection, protocol or browser failure
    Network(String),
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "HTTP {}", status),
            Self::Timeout => write!(f, "timeout"),
            Self::Network(e) => write!(f, "network error: {}", e),
        }
    }
}

/// Result of one fetch attempt, or of a request once retries are exhausted
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success(FetchedPage),
    TransientFailure(TransientKind),
    PermanentFailure { status: u16 },
}

/// Status codes worth retrying
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

impl FetchOutcome {
    /// Classifies a completed HTTP exchange
    ///
    /// | Status | Outcome |
    /// |--------|---------|
    /// | < 400 (redirects included) | Success |
    /// | 429, 500, 502, 503, 504 | TransientFailure |
    /// | any other >= 400 | PermanentFailure |
    pub fn from_response(status: u16, final_url: Url, body: String) -> Self {
        if status < 400 {
            FetchOutcome::Success(FetchedPage {
                status,
                final_url,
                body,
            })
        } else if is_retryable_status(status) {
            FetchOutcome::TransientFailure(TransientKind::Status(status))
        } else {
            FetchOutcome::PermanentFailure { status }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(page) => write!(f, "HTTP {}", page.status),
            Self::TransientFailure(kind) => write!(f, "transient failure ({})", kind),
            Self::PermanentFailure { status } => write!(f, "permanent failure (HTTP {})", status),
        }
    }
}
