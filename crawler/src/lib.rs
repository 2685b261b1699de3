//! Breadth-first, robots-aware crawler that writes accepted pages into
//! bucketed raw storage.

mod robots;
mod session;

pub use robots::Robots;

use anyhow::Result;
use linkrank_core::persist::{DocMetadata, RawPaths};
use linkrank_core::urlnorm::domain_of;
use linkrank_core::normalize_url;
use session::{CrawlSession, FetchOutcome, SkipReason, WorkerReport};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

pub const DEFAULT_USER_AGENT: &str = "linkrank-bot/0.1 (+https://example.com/bot)";

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Concurrent fetch workers.
    pub workers: usize,
    /// Pages larger than this are skipped.
    pub max_html_bytes: u64,
    /// Raw bytes accepted across the whole crawl before it stops.
    pub max_total_bytes: u64,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            max_html_bytes: 5 * 1024 * 1024,
            max_total_bytes: 10 * 1024 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Crawl from `seeds` and store every accepted page under `raw_dir`.
///
/// Stops when the frontier drains, `max_pages` documents are stored or the
/// byte quota would be exceeded. Returns the content paths written, in the
/// order they were accepted.
pub async fn crawl(
    seeds: &[String],
    max_pages: usize,
    max_depth: usize,
    raw_dir: &Path,
    config: &CrawlConfig,
) -> Result<Vec<PathBuf>> {
    let session = Arc::new(CrawlSession::new(config.clone())?);
    let raw = RawPaths::new(raw_dir);
    let mut next_number = raw.next_doc_number();
    let workers = config.workers.max(1);

    let mut frontier: VecDeque<(String, usize)> = seeds.iter().map(|s| (normalize_url(s), 0)).collect();
    let mut inflight: JoinSet<WorkerReport> = JoinSet::new();
    let mut stored: Vec<PathBuf> = Vec::new();
    let mut skipped = 0usize;
    let mut quota_hit = false;

    tracing::info!(seeds = frontier.len(), max_pages, max_depth, workers, dir = %raw_dir.display(), "crawl started");

    'crawl: while stored.len() < max_pages {
        while inflight.len() < workers && stored.len() + inflight.len() < max_pages {
            let Some((url, depth)) = frontier.pop_front() else { break };
            if !session.mark_visited(&url) {
                continue;
            }
            inflight.spawn(Arc::clone(&session).fetch(url, depth));
        }

        let Some(joined) = inflight.join_next().await else { break };
        let report = match joined {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "fetch worker failed");
                continue;
            }
        };

        let WorkerReport { url, depth, outcome } = report;
        match outcome {
            FetchOutcome::Accepted { html, page } => {
                let meta = DocMetadata {
                    title: page.metadata.title.clone(),
                    h1: page.metadata.h1.clone(),
                    description: page.metadata.description.clone(),
                    url: Some(url.clone()),
                };
                let path = match raw.save_document(next_number, &html, &meta) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "could not store page");
                        continue;
                    }
                };
                next_number += 1;
                stored.push(path);
                if stored.len() % 100 == 0 {
                    tracing::info!(stored = stored.len(), frontier = frontier.len(), visited = session.visited_count(), "crawl progress");
                }

                if depth < max_depth {
                    let domain = domain_of(&url);
                    for link in page.links {
                        let link = normalize_url(&link);
                        if domain_of(&link) == domain && !session.is_visited(&link) {
                            frontier.push_back((link, depth + 1));
                        }
                    }
                }
            }
            FetchOutcome::Skipped(reason) => {
                skipped += 1;
                if reason == SkipReason::Disallowed {
                    tracing::debug!(url = %url, "disallowed by robots.txt");
                }
            }
            FetchOutcome::QuotaExceeded => {
                tracing::warn!(url = %url, bytes = session.bytes_accepted(), "byte quota reached, stopping crawl");
                quota_hit = true;
                break 'crawl;
            }
        }
    }

    // in-flight fetches run to completion on their own; their results are dropped
    inflight.detach_all();

    tracing::info!(
        stored = stored.len(),
        skipped,
        visited = session.visited_count(),
        bytes = session.bytes_accepted(),
        quota_hit,
        "crawl finished"
    );
    Ok(stored)
}
