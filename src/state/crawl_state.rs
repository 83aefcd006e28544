use crate::crawler::FetchRequest;
use crate::extract::Record;
use crate::state::aggregator::ResultAggregator;
use crate::url::visit_key;
use std::collections::{HashSet, VecDeque};

/// Shared crawl bookkeeping for one pipeline run
///
/// Holds the frontier of pending requests, the set of URLs already
/// dispatched, and the aggregated results. A URL is admitted to the
/// frontier at most once per run, keyed by [`visit_key`], so a pagination
/// chain that points back at an earlier page cannot loop.
#[derive(Debug)]
pub struct CrawlState<R> {
    frontier: VecDeque<FetchRequest>,
    queued: HashSet<String>,
    visited: HashSet<String>,
    results: ResultAggregator<R>,
    rejected: u64,
}

impl<R: Record> CrawlState<R> {
    pub fn new(dedupe: bool) -> Self {
        Self {
            frontier: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
            results: ResultAggregator::new(dedupe),
            rejected: 0,
        }
    }

    /// Adds a request to the frontier
    ///
    /// Returns false (and drops the request) when its URL is already queued
    /// or was already dispatched.
    pub fn enqueue(&mut self, request: FetchRequest) -> bool {
        let key = visit_key(&request.url);
        if self.visited.contains(&key) || self.queued.contains(&key) {
            tracing::debug!("Skipping already seen URL {}", request.url);
            self.rejected += 1;
            return false;
        }

        self.queued.insert(key);
        self.frontier.push_back(request);
        true
    }

    /// Takes the next request and marks its URL visited
    pub fn dequeue(&mut self) -> Option<FetchRequest> {
        let request = self.frontier.pop_front()?;
        let key = visit_key(&request.url);
        self.queued.remove(&key);
        self.visited.insert(key);
        Some(request)
    }

    pub fn is_visited(&self, url: &url::Url) -> bool {
        self.visited.contains(&visit_key(url))
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    /// Requests dropped because their URL was already seen
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn add_records(&mut self, records: impl IntoIterator<Item = R>) {
        self.results.extend(records);
    }

    pub fn results(&self) -> &ResultAggregator<R> {
        &self.results
    }

    /// Consumes the state, yielding the aggregated records
    pub fn finish(self) -> ResultAggregator<R> {
        self.results
    }
}
