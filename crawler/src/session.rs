//! State shared between the orchestrating loop and fetch workers for the
//! lifetime of a single crawl.

use crate::robots::Robots;
use crate::CrawlConfig;
use anyhow::Result;
use linkrank_core::html::{parse_page, ParsedPage};
use linkrank_core::urlnorm::origin_of;
use parking_lot::{Mutex, RwLock};
use reqwest::{header, Client, Url};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

pub(crate) struct CrawlSession {
    client: Client,
    config: CrawlConfig,
    /// Normalized URLs already dequeued.
    visited: Mutex<HashSet<String>>,
    /// Raw bytes accepted so far, checked against `max_total_bytes`.
    bytes: Mutex<u64>,
    robots: RwLock<HashMap<String, Arc<Robots>>>,
    /// Per origin: the instant the most recently scheduled request may start.
    next_fetch: Mutex<HashMap<String, Instant>>,
}

#[derive(Debug)]
pub(crate) enum FetchOutcome {
    Accepted { html: String, page: ParsedPage },
    Skipped(SkipReason),
    /// Accepting this page would overshoot the global byte quota.
    QuotaExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SkipReason {
    InvalidUrl,
    Disallowed,
    FetchFailed,
    NotHtml,
    Oversized,
}

#[derive(Debug)]
pub(crate) struct WorkerReport {
    pub url: String,
    pub depth: usize,
    pub outcome: FetchOutcome,
}

impl CrawlSession {
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            config,
            visited: Mutex::new(HashSet::new()),
            bytes: Mutex::new(0),
            robots: RwLock::new(HashMap::new()),
            next_fetch: Mutex::new(HashMap::new()),
        })
    }

    /// Test-and-set: true only for the first caller with this URL.
    pub fn mark_visited(&self, url: &str) -> bool {
        self.visited.lock().insert(url.to_string())
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.lock().contains(url)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.lock().len()
    }

    /// Add `len` to the byte counter unless that would exceed the quota.
    pub fn reserve_bytes(&self, len: u64) -> bool {
        let mut total = self.bytes.lock();
        if total.saturating_add(len) > self.config.max_total_bytes {
            return false;
        }
        *total += len;
        true
    }

    pub fn bytes_accepted(&self) -> u64 {
        *self.bytes.lock()
    }

    async fn robots_for(&self, origin: &str) -> Arc<Robots> {
        if let Some(cached) = self.robots.read().get(origin).cloned() {
            return cached;
        }
        let robots_url = format!("{origin}/robots.txt");
        let txt = match self.client.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => resp.text().await.unwrap_or_default(),
            _ => String::new(),
        };
        let rules = Arc::new(Robots::parse(&txt, &self.config.user_agent));
        self.robots.write().entry(origin.to_string()).or_insert(rules).clone()
    }

    /// Reserve the next request slot for `origin`, `delay` after the previous
    /// one, and return when it starts.
    fn schedule(&self, origin: &str, delay: Duration) -> Instant {
        let mut next = self.next_fetch.lock();
        let now = Instant::now();
        let after = next.get(origin).copied().filter(|t| *t > now).unwrap_or(now);
        let slot = after + delay;
        next.insert(origin.to_string(), slot);
        slot
    }

    /// Fetch and parse one page; every failure is reported, never raised.
    pub async fn fetch(self: Arc<Self>, url: String, depth: usize) -> WorkerReport {
        let outcome = self.fetch_outcome(&url).await;
        WorkerReport { url, depth, outcome }
    }

    async fn fetch_outcome(&self, url: &str) -> FetchOutcome {
        let Ok(parsed) = Url::parse(url) else { return FetchOutcome::Skipped(SkipReason::InvalidUrl) };
        if !matches!(parsed.scheme(), "http" | "https") {
            return FetchOutcome::Skipped(SkipReason::InvalidUrl);
        }

        let Some(origin) = origin_of(&parsed) else { return FetchOutcome::Skipped(SkipReason::InvalidUrl) };
        let robots = self.robots_for(&origin).await;
        let target = match parsed.query() {
            Some(q) => format!("{}?{}", parsed.path(), q),
            None => parsed.path().to_string(),
        };
        if !robots.allows(&target) {
            return FetchOutcome::Skipped(SkipReason::Disallowed);
        }
        if let Some(delay) = robots.crawl_delay() {
            sleep_until(self.schedule(&origin, delay)).await;
        }

        let mut resp = match self.client.get(parsed).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::debug!(url, status = %r.status(), "non-success response");
                return FetchOutcome::Skipped(SkipReason::FetchFailed);
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "fetch failed");
                return FetchOutcome::Skipped(SkipReason::FetchFailed);
            }
        };
        if let Some(ct) = resp.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
            let ct = ct.to_ascii_lowercase();
            if !ct.starts_with("text/html") && !ct.starts_with("application/xhtml") {
                return FetchOutcome::Skipped(SkipReason::NotHtml);
            }
        }
        if resp.content_length().is_some_and(|len| len > self.config.max_html_bytes) {
            tracing::warn!(url, "html over size cap, skipped");
            return FetchOutcome::Skipped(SkipReason::Oversized);
        }
        let mut bytes: Vec<u8> = Vec::new();
        loop {
            match resp.chunk().await {
                Ok(Some(chunk)) => {
                    if (bytes.len() + chunk.len()) as u64 > self.config.max_html_bytes {
                        tracing::warn!(url, "html over size cap, skipped");
                        return FetchOutcome::Skipped(SkipReason::Oversized);
                    }
                    bytes.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(url, error = %e, "reading body failed");
                    return FetchOutcome::Skipped(SkipReason::FetchFailed);
                }
            }
        }
        if !self.reserve_bytes(bytes.len() as u64) {
            return FetchOutcome::QuotaExceeded;
        }

        let html = String::from_utf8_lossy(&bytes).into_owned();
        let page = parse_page(&html, url);
        FetchOutcome::Accepted { html, page }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(max_total_bytes: u64) -> CrawlSession {
        CrawlSession::new(CrawlConfig { max_total_bytes, ..Default::default() }).unwrap()
    }

    #[test]
    fn visited_is_test_and_set() {
        let s = session(10);
        assert!(s.mark_visited("http://a.com/"));
        assert!(!s.mark_visited("http://a.com/"));
        assert!(s.is_visited("http://a.com/"));
        assert_eq!(s.visited_count(), 1);
    }

    #[test]
    fn byte_quota_never_overshoots() {
        let s = session(10);
        assert!(s.reserve_bytes(6));
        assert!(!s.reserve_bytes(5));
        assert!(s.reserve_bytes(4));
        assert!(!s.reserve_bytes(1));
        assert_eq!(s.bytes_accepted(), 10);
    }

    #[tokio::test]
    async fn request_slots_are_spaced_per_origin() {
        let s = session(10);
        let delay = Duration::from_millis(200);
        let first = s.schedule("http://a.test", delay);
        let second = s.schedule("http://a.test", delay);
        let other = s.schedule("http://b.test", delay);
        assert_eq!(second - first, delay);
        assert!(other < second);
    }
}
