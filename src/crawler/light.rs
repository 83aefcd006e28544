//! Plain HTTP fetch strategy
//!
//! One GET per attempt with a user agent drawn from a fixed pool,
//! browser-like headers and a referer pointing at the site root. Redirects
//! are not followed; a 3xx response is surfaced with its own status.

use crate::config::LightConfig;
use crate::crawler::renderer::PageRenderer;
use crate::crawler::request::{FetchOutcome, FetchRequest, FetchStrategy, TransientKind};
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Builds the HTTP client shared by every light fetch
///
/// The user agent is set per request, so the client carries none.
///
/// # Arguments
///
/// * `config` - The plain-fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &LightConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Plain HTTP GET renderer
pub struct LightFetch {
    client: Client,
    config: LightConfig,
}

impl LightFetch {
    pub fn new(config: LightConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config)?;
        Ok(Self { client, config })
    }

}

/// Draws a user agent from the pool, skipping blank entries
fn pick_user_agent<'a, R: rand::Rng + ?Sized>(pool: &'a [String], rng: &mut R) -> Option<&'a str> {
    let usable: Vec<&str> = pool
        .iter()
        .map(String::as_str)
        .filter(|ua| !ua.trim().is_empty())
        .collect();
    usable.choose(rng).copied()
}

/// Maps a transport error onto a transient failure kind
fn classify_error(error: &reqwest::Error) -> TransientKind {
    if error.is_timeout() {
        TransientKind::Timeout
    } else if error.is_connect() {
        TransientKind::Network(format!("connection failed: {}", error))
    } else {
        TransientKind::Network(error.to_string())
    }
}

#[async_trait]
impl PageRenderer for LightFetch {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Light
    }

    async fn render(&self, request: &FetchRequest) -> FetchOutcome {
        let delay = self.config.pre_request_delay_ms.sample(&mut rand::rng());
        tokio::time::sleep(delay).await;

        let mut builder = self
            .client
            .get(request.url.clone())
            .header(ACCEPT, &self.config.accept)
            .header(ACCEPT_LANGUAGE, &self.config.accept_language);
        if let Some(user_agent) = pick_user_agent(&self.config.user_agents, &mut rand::rng()) {
            builder = builder.header(USER_AGENT, user_agent);
        }
        if !self.config.referer.is_empty() {
            builder = builder.header(REFERER, &self.config.referer);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::TransientFailure(classify_error(&e)),
        };

        let status = response.status().as_u16();
        let final_url = response.url().clone();

        match response.text().await {
            Ok(body) => FetchOutcome::from_response(status, final_url, body),
            Err(e) => FetchOutcome::TransientFailure(classify_error(&e)),
        }
    }
}
