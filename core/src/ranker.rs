//! BM25 relevance fused with normalized PageRank, plus snippet annotation.

use crate::html::visible_text;
use crate::index::DocId;
use crate::snippet::extract_snippet;
use crate::store::IndexStore;
use crate::tokenizer::normalize_text;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankerConfig {
    pub k1: f64,
    pub b: f64,
    /// Weight of BM25 in the fused score; PageRank gets `1 - alpha`.
    pub alpha: f64,
    pub snippet_window: usize,
    pub max_snippets: usize,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75, alpha: 0.7, snippet_window: 15, max_snippets: 3 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub topk: usize,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self { topk: 10, page: 1, page_size: 5 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub title: String,
    pub score_bm25: f64,
    pub pagerank_raw: f64,
    pub pagerank_norm: f64,
    pub score: f64,
    pub path: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query_terms: Vec<String>,
    pub page: usize,
    pub page_size: usize,
    /// Size of the BM25 list after the `topk` cap.
    pub total_results: usize,
    pub results: Vec<SearchHit>,
}

pub fn idf(num_docs: f64, df: f64) -> f64 {
    (1.0 + (num_docs - df + 0.5) / (df + 0.5)).ln()
}

/// One term's contribution for a document of length `dl`.
pub fn bm25_term(idf: f64, tf: f64, dl: f64, avgdl: f64, config: &RankerConfig) -> f64 {
    let avgdl = if avgdl > 0.0 { avgdl } else { 1.0 };
    let denom = tf + config.k1 * (1.0 - config.b + config.b * (dl / avgdl));
    if denom > 0.0 { idf * (tf * (config.k1 + 1.0)) / denom } else { 0.0 }
}

/// Documents with a nonzero BM25 score, best first, capped at `topk`.
/// Equal scores are ordered by ascending doc id.
pub fn bm25_rank(store: &IndexStore, query_terms: &[String], topk: usize, config: &RankerConfig) -> Result<Vec<(DocId, f64)>> {
    let stats = store.corpus_stats()?;
    let n = f64::from(stats.num_docs);
    let unique: BTreeSet<&str> = query_terms.iter().map(String::as_str).collect();

    let mut scores: HashMap<DocId, f64> = HashMap::new();
    for term in unique {
        let Some(df) = store.doc_freq(term)? else { continue };
        let term_idf = idf(n, f64::from(df));
        for (doc_id, tf, dl) in store.term_postings(term)? {
            let contribution = bm25_term(term_idf, f64::from(tf), f64::from(dl), stats.avgdl, config);
            *scores.entry(doc_id).or_insert(0.0) += contribution;
        }
    }

    let mut ranked: Vec<(DocId, f64)> = scores.into_iter().filter(|(_, s)| *s != 0.0).collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
    ranked.truncate(topk);
    Ok(ranked)
}

/// `[(page-1)*page_size, page*page_size)` of `ranked`; page 0 or a page past
/// the end is empty.
pub fn paginate<T>(ranked: &[T], page: usize, page_size: usize) -> &[T] {
    if page == 0 {
        return &[];
    }
    let start = (page - 1).saturating_mul(page_size).min(ranked.len());
    let end = page.saturating_mul(page_size).min(ranked.len());
    &ranked[start..end]
}

fn snippet_for(path: &str, url: &str, query_terms: &[String], config: &RankerConfig) -> String {
    let raw = match std::fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            tracing::debug!(path, error = %e, "raw document unavailable for snippet");
            String::new()
        }
    };
    let text = normalize_text(&visible_text(&raw, url));
    extract_snippet(&text, query_terms, config.snippet_window, config.max_snippets)
}

/// Rank by BM25, cap at `topk`, slice the requested page, then re-sort that
/// page by the fused BM25/PageRank score.
///
/// Pagination happens before fusion, so a document can sit on a page that
/// does not match its fused rank.
pub fn search(store: &IndexStore, query_terms: &[String], params: &SearchParams, config: &RankerConfig) -> Result<SearchResponse> {
    let ranked = bm25_rank(store, query_terms, params.topk, config)?;
    let max_pr = match store.max_pagerank()? {
        Some(m) if m != 0.0 => m,
        _ => 1.0,
    };

    let mut results = Vec::new();
    for &(doc_id, score_bm25) in paginate(&ranked, params.page, params.page_size) {
        let doc = store.document(doc_id)?;
        let (title, path, url) = doc.map(|d| (d.title, d.path, d.url)).unwrap_or_default();
        let pagerank_raw = store.pagerank(doc_id)?.unwrap_or(0.0);
        let pagerank_norm = pagerank_raw / max_pr;
        let score = config.alpha * score_bm25 + (1.0 - config.alpha) * pagerank_norm;
        let snippet = snippet_for(&path, &url, query_terms, config);
        results.push(SearchHit { doc_id, title, score_bm25, pagerank_raw, pagerank_norm, score, path, snippet });
    }
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    Ok(SearchResponse {
        query_terms: query_terms.to_vec(),
        page: params.page,
        page_size: params.page_size,
        total_results: ranked.len(),
        results,
    })
}
