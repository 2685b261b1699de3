//! Full-rebuild indexer: raw pages on disk to postings, document
//! frequencies, corpus statistics and the link graph.

use anyhow::Context;
use linkrank_core::html::parse_page;
use linkrank_core::persist::{load_metadata, DocMetadata, RawDocument, RawPaths};
use linkrank_core::tokenizer::analyze;
use linkrank_core::{normalize_url, CorpusStats, DocId, DocRecord, IndexStore};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("raw document directory does not exist: {}", .0.display())]
    MissingSource(PathBuf),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndexStats {
    pub indexed_docs: u32,
    pub avgdl: f64,
}

/// A document accepted into this run, waiting for link resolution.
struct Accepted {
    doc_id: DocId,
    links: Vec<String>,
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn read_lossy(path: &Path) -> std::io::Result<String> {
    std::fs::read(path).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Drop every indexer-owned row and rebuild from the files under `raw_dir`.
///
/// Documents are visited in sorted path order; ids are handed out only to
/// documents that keep at least one term after filtering. Links are resolved
/// once all ids are known, and only between documents of this run.
pub fn index_documents(store: &mut IndexStore, raw_dir: &Path) -> Result<IndexStats, IndexError> {
    if !raw_dir.is_dir() {
        return Err(IndexError::MissingSource(raw_dir.to_path_buf()));
    }
    let raw_docs = RawPaths::new(raw_dir).list_documents();
    tracing::info!(dir = %raw_dir.display(), files = raw_docs.len(), "indexing raw documents");

    let rebuild = store.rebuild()?;
    let mut url_to_id: HashMap<String, DocId> = HashMap::new();
    let mut accepted: Vec<Accepted> = Vec::new();
    let mut df: BTreeMap<String, u32> = BTreeMap::new();
    let mut total_len: u64 = 0;

    for RawDocument { content_path, meta_path } in raw_docs {
        let content = match read_lossy(&content_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(path = %content_path.display(), error = %e, "unreadable raw document");
                continue;
            }
        };
        let sidecar: Option<DocMetadata> = meta_path.as_deref().map(|p| load_metadata(Some(p)));
        let raw_url = sidecar
            .as_ref()
            .and_then(|m| m.url.clone())
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| file_name(&content_path));
        let url = normalize_url(&raw_url);
        if url_to_id.contains_key(&url) {
            tracing::warn!(url = %url, path = %content_path.display(), "duplicate url, keeping first document");
            continue;
        }

        let page = parse_page(&content, &url);
        let (title, h1, description) = match &sidecar {
            Some(m) => (m.title.clone(), m.h1.clone(), m.description.clone()),
            None => (page.metadata.title.clone(), page.metadata.h1.clone(), page.metadata.description.clone()),
        };
        let terms = analyze(&format!("{title} {h1} {description} {}", page.visible_text));
        if terms.is_empty() {
            tracing::debug!(path = %content_path.display(), "no terms after filtering, skipped");
            continue;
        }

        let doc_id = accepted.len() as DocId + 1;
        let mut tf: BTreeMap<String, u32> = BTreeMap::new();
        for term in &terms {
            *tf.entry(term.clone()).or_insert(0) += 1;
        }
        for term in tf.keys() {
            *df.entry(term.clone()).or_insert(0) += 1;
        }

        let record = DocRecord {
            doc_id,
            url: url.clone(),
            title: if title.trim().is_empty() { file_name(&content_path) } else { title },
            path: content_path.to_string_lossy().into_owned(),
            length: terms.len() as u32,
        };
        rebuild.insert_document(&record)?;
        rebuild.insert_postings(doc_id, &tf)?;
        total_len += terms.len() as u64;
        url_to_id.insert(url, doc_id);
        accepted.push(Accepted { doc_id, links: page.links });

        if accepted.len() % 100 == 0 {
            tracing::info!(indexed = accepted.len(), "indexing progress");
        }
    }

    let mut edges = 0usize;
    for doc in &accepted {
        let targets: BTreeSet<DocId> = doc
            .links
            .iter()
            .filter_map(|link| url_to_id.get(&normalize_url(link)).copied())
            .collect();
        for to in targets {
            rebuild.insert_link(doc.doc_id, to)?;
            edges += 1;
        }
    }

    let num_docs = accepted.len() as u32;
    let avgdl = if num_docs == 0 { 0.0 } else { total_len as f64 / f64::from(num_docs) };
    rebuild.insert_doc_freqs(&df)?;
    rebuild.set_corpus_stats(&CorpusStats { num_docs, avgdl })?;
    rebuild.commit().context("finishing index rebuild")?;

    tracing::info!(num_docs, num_terms = df.len(), edges, avgdl, "index build complete");
    Ok(IndexStats { indexed_docs: num_docs, avgdl })
}
