use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dense, 1-based id assigned per indexing run.
pub type DocId = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocRecord {
    pub doc_id: DocId,
    /// Normalized URL, unique across the corpus.
    pub url: String,
    pub title: String,
    /// Back-reference to the raw content file; the store never touches it.
    pub path: String,
    /// Filtered token count.
    pub length: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub term: String,
    pub doc_id: DocId,
    pub tf: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub num_docs: u32,
    pub avgdl: f64,
}

/// Adjacency list over every indexed document; nodes without edges map to
/// an empty list.
pub type LinkGraph = BTreeMap<DocId, Vec<DocId>>;
