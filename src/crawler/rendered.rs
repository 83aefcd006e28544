//! Headless browser fetch strategy
//!
//! One browser is launched per crawl invocation. Every attempt gets its own
//! isolated browser context and page, so concurrent pages never share
//! cookies or storage. An attempt runs:
//!
//! 1. randomized pre-navigation delay
//! 2. evasion script, extra headers and marker cookie on the fresh page
//! 3. navigation, bounded by `navigation_timeout_secs` (expiry is a transient timeout)
//! 4. a network-idle wait inside the same deadline (expiry is tolerated)
//! 5. a human interaction pass: settle, one pointer move, stepped scroll
//! 6. on listing pages, a bounded wait for a product container marker (expiry is tolerated)
//! 7. a snapshot of the rendered document

use crate::config::RenderedConfig;
use crate::crawler::renderer::PageRenderer;
use crate::crawler::request::{FetchOutcome, FetchRequest, FetchStrategy, PageRole, TransientKind};
use crate::crawler::stealth::{evasion_script, scroll_script};
use crate::SweepError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::browser::CloseParams;
use chromiumoxide::cdp::browser_protocol::input::{DispatchMouseEventParams, DispatchMouseEventType};
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
    EventResponseReceived, Headers, ResourceType, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::listeners::EventStream;
use chromiumoxide::Page;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use rand::Rng;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, timeout_at, Instant};
use url::Url;

/// How long to wait for the main document's response event after load
const RESPONSE_EVENT_WAIT: Duration = Duration::from_millis(500);

/// Poll interval while waiting for ready markers
const MARKER_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How long the page must have no request in flight to count as idle
const NETWORK_QUIET_WINDOW: Duration = Duration::from_millis(500);

/// Browser-driven renderer
pub struct RenderedFetch {
    browser: Browser,
    handler: Mutex<Option<JoinHandle<()>>>,
    config: RenderedConfig,
    accept: String,
    accept_language: String,
    referer: String,
    ready_markers: Option<String>,
}

/// Locates a Chrome binary: explicit config first, then `CHROMIUM_PATH`
fn resolve_executable(config: &RenderedConfig) -> Option<PathBuf> {
    if let Some(path) = &config.chrome_executable {
        return Some(PathBuf::from(path));
    }

    match std::env::var("CHROMIUM_PATH") {
        Ok(path) if PathBuf::from(&path).exists() => Some(PathBuf::from(path)),
        Ok(path) => {
            tracing::warn!("CHROMIUM_PATH points to non-existent file: {}", path);
            None
        }
        Err(_) => None,
    }
}

fn browser_config(config: &RenderedConfig) -> Result<BrowserConfig, SweepError> {
    let (width, height) = config.window_size;
    let mut builder = BrowserConfig::builder()
        .window_size(width, height)
        .request_timeout(Duration::from_secs(config.navigation_timeout_secs))
        .arg(format!("--user-agent={}", config.user_agent))
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-features=VizDisplayCompositor")
        .arg("--no-first-run")
        .arg("--no-default-browser-check");

    builder = if config.headless {
        builder.headless_mode(HeadlessMode::default())
    } else {
        builder.with_head()
    };

    if let Some(path) = resolve_executable(config) {
        builder = builder.chrome_executable(path);
    }

    builder
        .build()
        .map_err(|e| SweepError::Browser(format!("Failed to build browser config: {}", e)))
}

/// Failure inside one rendered attempt
#[derive(Debug)]
enum SessionError {
    Cdp(CdpError),
    Setup(String),
}

impl From<CdpError> for SessionError {
    fn from(err: CdpError) -> Self {
        SessionError::Cdp(err)
    }
}

impl SessionError {
    fn kind(&self) -> TransientKind {
        match self {
            SessionError::Cdp(e) => classify_cdp_error(e),
            SessionError::Setup(e) => TransientKind::Network(e.clone()),
        }
    }
}

/// Maps a browser protocol error onto a transient failure kind
pub fn classify_cdp_error(error: &CdpError) -> TransientKind {
    match error {
        CdpError::Timeout => TransientKind::Timeout,
        other => TransientKind::Network(other.to_string()),
    }
}

/// Draws a pointer target from `range` on both axes
pub fn pointer_target<R: Rng + ?Sized>(range: (u32, u32), rng: &mut R) -> (f64, f64) {
    let (low, high) = if range.0 <= range.1 {
        range
    } else {
        (range.1, range.0)
    };
    (
        f64::from(rng.random_range(low..=high)),
        f64::from(rng.random_range(low..=high)),
    )
}

/// Request lifecycle signal observed on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    Started(String),
    Finished(String),
}

/// Tracks in-flight requests to detect network idle
///
/// The page is idle once no request has been in flight for the whole quiet
/// window. A request that starts resets the window.
#[derive(Debug)]
pub struct NetworkIdle {
    in_flight: HashSet<String>,
    quiet_since: Option<Instant>,
    quiet_window: Duration,
}

impl NetworkIdle {
    /// Starts tracking at `now` with nothing in flight
    pub fn new(quiet_window: Duration, now: Instant) -> Self {
        Self {
            in_flight: HashSet::new(),
            quiet_since: Some(now),
            quiet_window,
        }
    }

    pub fn observe(&mut self, event: NetworkEvent, now: Instant) {
        match event {
            NetworkEvent::Started(id) => {
                self.in_flight.insert(id);
                self.quiet_since = None;
            }
            // Requests started before tracking began are unknown and ignored
            NetworkEvent::Finished(id) => {
                if self.in_flight.remove(&id) && self.in_flight.is_empty() {
                    self.quiet_since = Some(now);
                }
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// When the page becomes idle if nothing else starts
    pub fn idle_at(&self) -> Option<Instant> {
        self.quiet_since.map(|since| since + self.quiet_window)
    }

    pub fn is_idle(&self, now: Instant) -> bool {
        self.idle_at().is_some_and(|at| now >= at)
    }
}

/// Feeds `events` into `idle` until the page is idle or `deadline` passes
///
/// Returns false if the deadline expired first.
pub async fn wait_for_network_idle<S>(events: &mut S, idle: &mut NetworkIdle, deadline: Instant) -> bool
where
    S: futures::Stream<Item = NetworkEvent> + Unpin,
{
    loop {
        let now = Instant::now();
        if idle.is_idle(now) {
            return true;
        }
        if now >= deadline {
            return false;
        }

        let wake = idle.idle_at().map_or(deadline, |at| at.min(deadline));
        match timeout_at(wake, events.next()).await {
            Ok(Some(event)) => idle.observe(event, Instant::now()),
            Ok(None) => return idle.in_flight() == 0,
            Err(_) => {}
        }
    }
}

/// Subscribes to request start, finish and failure events on `page`
async fn network_events(page: &Page) -> Result<BoxStream<'static, NetworkEvent>, CdpError> {
    let started = page
        .event_listener::<EventRequestWillBeSent>()
        .await?
        .map(|e| NetworkEvent::Started(e.request_id.inner().clone()));
    let finished = page
        .event_listener::<EventLoadingFinished>()
        .await?
        .map(|e| NetworkEvent::Finished(e.request_id.inner().clone()));
    let failed = page
        .event_listener::<EventLoadingFailed>()
        .await?
        .map(|e| NetworkEvent::Finished(e.request_id.inner().clone()));

    Ok(stream::select(started, stream::select(finished, failed)).boxed())
}

/// Whether pages of `role` wait for the product container markers
pub fn awaits_markers(role: PageRole) -> bool {
    role == PageRole::Listing
}

/// Waits for the main document's response and returns its status
///
/// Falls back to 200 when no document response event arrives; the page did
/// load, so a missing event is not a failure.
async fn document_status(events: &mut EventStream<EventResponseReceived>) -> u16 {
    loop {
        match timeout(RESPONSE_EVENT_WAIT, events.next()).await {
            Ok(Some(event)) if event.r#type == ResourceType::Document => {
                return u16::try_from(event.response.status).unwrap_or(200);
            }
            Ok(Some(_)) => continue,
            Ok(None) | Err(_) => return 200,
        }
    }
}

impl RenderedFetch {
    /// Launches the browser session for this crawl
    ///
    /// # Arguments
    ///
    /// * `config` - Browser rendering settings
    /// * `accept`, `accept_language`, `referer` - Headers sent with every navigation
    /// * `ready_markers` - Selector group that signals rendered product containers
    pub async fn launch(
        config: RenderedConfig,
        accept: String,
        accept_language: String,
        referer: String,
        ready_markers: Option<String>,
    ) -> Result<Self, SweepError> {
        let browser_config = browser_config(&config)?;

        tracing::info!("Launching browser (headless: {})", config.headless);
        let (browser, mut handler) = Browser::launch(browser_config).await?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::trace!("Browser handler event error: {}", e);
                }
            }
            tracing::debug!("Browser handler task completed");
        });

        Ok(Self {
            browser,
            handler: Mutex::new(Some(handler_task)),
            config,
            accept,
            accept_language,
            referer,
            ready_markers,
        })
    }

    /// Opens a page inside a fresh browser context
    async fn open_page(&self) -> Result<(BrowserContextId, Page), SessionError> {
        let context_id = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(SessionError::Setup)?;

        match self.browser.new_page(target).await {
            Ok(page) => Ok((context_id, page)),
            Err(e) => {
                self.dispose_context(context_id).await;
                Err(e.into())
            }
        }
    }

    async fn dispose_context(&self, context_id: BrowserContextId) {
        if let Err(e) = self
            .browser
            .execute(DisposeBrowserContextParams::new(context_id))
            .await
        {
            tracing::debug!("Failed to dispose browser context: {}", e);
        }
    }

    /// Applies headers, evasion overrides and the marker cookie before navigation
    async fn prepare_page(&self, page: &Page, url: &Url) -> Result<(), SessionError> {
        let mut headers = serde_json::Map::new();
        headers.insert("Accept".to_string(), self.accept.clone().into());
        headers.insert(
            "Accept-Language".to_string(),
            self.accept_language.clone().into(),
        );
        if !self.referer.is_empty() {
            headers.insert("Referer".to_string(), self.referer.clone().into());
        }
        page.execute(SetExtraHttpHeadersParams::new(Headers::new(
            serde_json::Value::Object(headers),
        )))
        .await?;

        if let Some(script) = evasion_script(&self.config.evasion) {
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(script))
                .await?;
        }

        let cookie = &self.config.marker_cookie;
        if !cookie.name.is_empty() {
            let param = CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value.clone())
                .url(url.as_str())
                .path("/")
                .build()
                .map_err(SessionError::Setup)?;
            page.set_cookie(param).await?;
        }

        Ok(())
    }

    /// Pointer move and stepped scroll to trigger lazy-loaded content
    async fn interact(&self, page: &Page) -> Result<(), CdpError> {
        let settle = self.config.settle_delay_ms.sample(&mut rand::rng());
        sleep(settle).await;

        let (x, y) = pointer_target(self.config.evasion.pointer_range, &mut rand::rng());
        page.execute(DispatchMouseEventParams::new(
            DispatchMouseEventType::MouseMoved,
            x,
            y,
        ))
        .await?;

        let pause = self.config.pointer_pause_ms.sample(&mut rand::rng());
        sleep(pause).await;

        page.evaluate(scroll_script(self.config.evasion.scroll_steps))
            .await?;

        let scroll_settle = self.config.scroll_settle_ms.sample(&mut rand::rng());
        sleep(scroll_settle).await;

        Ok(())
    }

    /// Waits for any ready marker to appear; returns false if the wait expired
    async fn wait_for_markers(&self, page: &Page, role: PageRole) -> bool {
        let Some(markers) = self.ready_markers.as_deref() else {
            return true;
        };
        if !awaits_markers(role) {
            return true;
        }

        let deadline = Instant::now() + Duration::from_millis(self.config.selector_wait_ms);
        loop {
            if page.find_element(markers).await.is_ok() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(MARKER_POLL_INTERVAL).await;
        }
    }

    /// One navigation attempt on an already prepared page
    async fn visit(&self, page: &Page, request: &FetchRequest) -> Result<FetchOutcome, CdpError> {
        let mut responses = page.event_listener::<EventResponseReceived>().await?;
        let mut network = network_events(page).await?;

        let deadline = Instant::now() + Duration::from_secs(self.config.navigation_timeout_secs);
        let mut idle = NetworkIdle::new(NETWORK_QUIET_WINDOW, Instant::now());

        match timeout_at(deadline, page.goto(request.url.as_str())).await {
            Ok(result) => {
                result?;
            }
            Err(_) => return Ok(FetchOutcome::TransientFailure(TransientKind::Timeout)),
        }

        if !wait_for_network_idle(&mut network, &mut idle, deadline).await {
            tracing::warn!(
                "Network not idle on {} ({} request(s) in flight), continuing anyway",
                request.url,
                idle.in_flight()
            );
        }

        let status = document_status(&mut responses).await;
        if status >= 400 {
            return Ok(FetchOutcome::from_response(
                status,
                request.url.clone(),
                String::new(),
            ));
        }

        self.interact(page).await?;

        if !self.wait_for_markers(page, request.role).await {
            tracing::warn!(
                "Couldn't find product selectors on {}, continuing anyway",
                request.url
            );
        }

        let body = page.content().await?;
        let final_url = page
            .url()
            .await?
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| request.url.clone());

        Ok(FetchOutcome::from_response(status, final_url, body))
    }
}

#[async_trait]
impl PageRenderer for RenderedFetch {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Rendered
    }

    async fn render(&self, request: &FetchRequest) -> FetchOutcome {
        let delay = self.config.pre_navigation_delay_ms.sample(&mut rand::rng());
        tracing::info!(
            "Waiting {:.2}s before visiting {}",
            delay.as_secs_f64(),
            request.url
        );
        sleep(delay).await;

        let (context_id, page) = match self.open_page().await {
            Ok(opened) => opened,
            Err(e) => return FetchOutcome::TransientFailure(e.kind()),
        };

        let outcome = match self.prepare_page(&page, &request.url).await {
            Ok(()) => self
                .visit(&page, request)
                .await
                .unwrap_or_else(|e| FetchOutcome::TransientFailure(classify_cdp_error(&e))),
            Err(e) => FetchOutcome::TransientFailure(e.kind()),
        };

        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close page: {}", e);
        }
        self.dispose_context(context_id).await;

        outcome
    }

    async fn shutdown(&self) {
        if let Err(e) = self.browser.execute(CloseParams::default()).await {
            tracing::debug!("Browser close failed: {}", e);
        }

        let handler = self.handler.lock().ok().and_then(|mut guard| guard.take());
        if let Some(handler) = handler {
            handler.abort();
        }
        tracing::info!("Browser session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_pointer_target_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let (x, y) = pointer_target((100, 700), &mut rng);
            assert!((100.0..=700.0).contains(&x));
            assert!((100.0..=700.0).contains(&y));
        }
    }

    #[test]
    fn test_pointer_target_fixed_point() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(pointer_target((250, 250), &mut rng), (250.0, 250.0));
    }

    #[test]
    fn test_cdp_timeout_is_transient_timeout() {
        assert_eq!(classify_cdp_error(&CdpError::Timeout), TransientKind::Timeout);
    }

    #[test]
    fn test_other_cdp_errors_are_network() {
        assert!(matches!(
            classify_cdp_error(&CdpError::NotFound),
            TransientKind::Network(_)
        ));
    }

    fn started(id: &str) -> NetworkEvent {
        NetworkEvent::Started(id.to_string())
    }

    fn finished(id: &str) -> NetworkEvent {
        NetworkEvent::Finished(id.to_string())
    }

    #[test]
    fn test_idle_after_quiet_window() {
        let t0 = Instant::now();
        let window = Duration::from_millis(500);
        let mut idle = NetworkIdle::new(window, t0);

        idle.observe(started("1"), t0);
        idle.observe(started("2"), t0);
        idle.observe(finished("1"), t0 + Duration::from_millis(100));
        assert_eq!(idle.in_flight(), 1);
        assert!(!idle.is_idle(t0 + Duration::from_secs(5)));

        let quiet = t0 + Duration::from_millis(200);
        idle.observe(finished("2"), quiet);
        assert!(!idle.is_idle(quiet + Duration::from_millis(499)));
        assert!(idle.is_idle(quiet + window));
    }

    #[test]
    fn test_new_request_resets_quiet_window() {
        let t0 = Instant::now();
        let mut idle = NetworkIdle::new(Duration::from_millis(500), t0);
        assert_eq!(idle.idle_at(), Some(t0 + Duration::from_millis(500)));

        idle.observe(started("xhr"), t0 + Duration::from_millis(400));
        assert_eq!(idle.idle_at(), None);
        assert!(!idle.is_idle(t0 + Duration::from_millis(600)));

        idle.observe(finished("xhr"), t0 + Duration::from_millis(700));
        assert_eq!(idle.idle_at(), Some(t0 + Duration::from_millis(1200)));
    }

    #[test]
    fn test_unknown_finish_ignored() {
        let t0 = Instant::now();
        let mut idle = NetworkIdle::new(Duration::from_millis(500), t0);
        idle.observe(started("a"), t0);
        idle.observe(finished("b"), t0 + Duration::from_millis(10));
        assert_eq!(idle.in_flight(), 1);
        assert_eq!(idle.idle_at(), None);
    }

    #[tokio::test]
    async fn test_wait_for_network_idle_settles() {
        let events = vec![started("doc"), finished("doc"), started("xhr"), finished("xhr")];
        let mut events = stream::iter(events).chain(stream::pending());
        let mut idle = NetworkIdle::new(Duration::from_millis(20), Instant::now());

        let deadline = Instant::now() + Duration::from_secs(5);
        assert!(wait_for_network_idle(&mut events, &mut idle, deadline).await);
        assert_eq!(idle.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_network_idle_expires_with_request_in_flight() {
        let mut events = stream::iter(vec![started("long-poll")]).chain(stream::pending());
        let mut idle = NetworkIdle::new(Duration::from_millis(20), Instant::now());

        let deadline = Instant::now() + Duration::from_millis(100);
        assert!(!wait_for_network_idle(&mut events, &mut idle, deadline).await);
        assert_eq!(idle.in_flight(), 1);
    }

    #[test]
    fn test_only_listing_pages_await_markers() {
        assert!(awaits_markers(PageRole::Listing));
        assert!(!awaits_markers(PageRole::Index));
        assert!(!awaits_markers(PageRole::Detail));
    }

    #[test]
    fn test_explicit_executable_wins() {
        let config = RenderedConfig {
            chrome_executable: Some("/opt/chrome/chrome".to_string()),
            ..RenderedConfig::default()
        };
        assert_eq!(
            resolve_executable(&config),
            Some(PathBuf::from("/opt/chrome/chrome"))
        );
    }
}
