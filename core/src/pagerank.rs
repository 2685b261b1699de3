//! Power-method PageRank over the indexed link graph.
//!
//! Nodes without outbound links contribute nothing to other nodes: their
//! rank mass is dropped rather than redistributed, so scores need not sum
//! to one. This is a known approximation of canonical PageRank.

use crate::index::{DocId, LinkGraph};
use crate::store::IndexStore;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRankConfig {
    pub damping: f64,
    pub max_iterations: usize,
    /// Convergence threshold on the summed absolute change per iteration.
    pub tolerance: f64,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self { damping: 0.85, max_iterations: 100, tolerance: 1e-6 }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRankOutcome {
    pub scores: BTreeMap<DocId, f64>,
    pub iterations: usize,
    pub converged: bool,
}

pub fn compute_pagerank(graph: &LinkGraph, config: &PageRankConfig) -> PageRankOutcome {
    let n = graph.len();
    if n == 0 {
        return PageRankOutcome { converged: true, ..Default::default() };
    }

    let nodes: Vec<DocId> = graph.keys().copied().collect();
    let slot: HashMap<DocId, usize> = nodes.iter().enumerate().map(|(i, d)| (*d, i)).collect();
    // (source slot, target slot) for every edge between known nodes
    let mut edges: Vec<(usize, usize)> = Vec::new();
    let mut outdegree = vec![0usize; n];
    for (from, targets) in graph {
        let src = slot[from];
        for to in targets {
            if let Some(&dst) = slot.get(to) {
                edges.push((src, dst));
                outdegree[src] += 1;
            }
        }
    }

    let base = (1.0 - config.damping) / n as f64;
    let mut rank = vec![1.0 / n as f64; n];
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iterations {
        let mut inflow = vec![0.0f64; n];
        for &(src, dst) in &edges {
            inflow[dst] += rank[src] / outdegree[src] as f64;
        }
        let next: Vec<f64> = inflow.iter().map(|s| base + config.damping * s).collect();
        let diff: f64 = next.iter().zip(&rank).map(|(a, b)| (a - b).abs()).sum();
        rank = next;
        iterations += 1;
        if diff < config.tolerance {
            converged = true;
            break;
        }
    }

    tracing::debug!(nodes = n, edges = edges.len(), iterations, converged, "pagerank computed");
    let scores = nodes.into_iter().zip(rank).collect();
    PageRankOutcome { scores, iterations, converged }
}

fn try_run(store: &mut IndexStore, config: &PageRankConfig) -> Result<BTreeMap<DocId, f64>> {
    let graph = store.load_graph()?;
    if graph.is_empty() {
        tracing::info!("no documents in graph, skipping pagerank");
        return Ok(BTreeMap::new());
    }
    let outcome = compute_pagerank(&graph, config);
    if !outcome.converged {
        tracing::warn!(iterations = outcome.iterations, "pagerank hit the iteration cap before converging");
    }
    store.save_pagerank(&outcome.scores)?;
    tracing::info!(nodes = graph.len(), iterations = outcome.iterations, "pagerank saved");
    Ok(outcome.scores)
}

/// Load the graph, compute and persist scores. Failures are logged and
/// yield an empty map; callers treat absent scores as zero.
pub fn run_pagerank(store: &mut IndexStore, config: &PageRankConfig) -> BTreeMap<DocId, f64> {
    match try_run(store, config) {
        Ok(scores) => scores,
        Err(e) => {
            tracing::warn!(error = %e, "pagerank failed");
            BTreeMap::new()
        }
    }
}
