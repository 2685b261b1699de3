//! Shared building blocks for crawling, indexing and ranking.

pub mod html;
pub mod index;
pub mod pagerank;
pub mod persist;
pub mod ranker;
pub mod snippet;
pub mod store;
pub mod tokenizer;
pub mod urlnorm;

pub use index::{CorpusStats, DocId, DocRecord, LinkGraph, Posting};
pub use pagerank::{compute_pagerank, run_pagerank, PageRankConfig};
pub use ranker::{search, RankerConfig, SearchParams, SearchResponse};
pub use store::IndexStore;
pub use urlnorm::normalize_url;
