use anyhow::Result;
use clap::{Parser, Subcommand};
use linkrank_core::{run_pagerank, IndexStore, PageRankConfig};
use linkrank_indexer::index_documents;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build the BM25 index and link graph, then score it with PageRank", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the index from a raw document directory
    Build {
        /// Raw document directory (bucketed .txt + .meta.json files)
        #[arg(long)]
        input: PathBuf,
        /// SQLite index database
        #[arg(long, default_value = "./data/index/index.db")]
        db: PathBuf,
        /// Do not run PageRank after indexing
        #[arg(long, default_value_t = false)]
        skip_pagerank: bool,
    },
    /// Recompute PageRank over the stored link graph
    Pagerank {
        /// SQLite index database
        #[arg(long, default_value = "./data/index/index.db")]
        db: PathBuf,
        #[arg(long, default_value_t = 0.85)]
        damping: f64,
        #[arg(long, default_value_t = 100)]
        max_iterations: usize,
        #[arg(long, default_value_t = 1e-6)]
        tolerance: f64,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, db, skip_pagerank } => {
            let mut store = IndexStore::open(&db)?;
            let stats = index_documents(&mut store, &input)?;
            if !skip_pagerank {
                let scores = run_pagerank(&mut store, &PageRankConfig::default());
                tracing::info!(scored = scores.len(), "pagerank after build");
            }
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Pagerank { db, damping, max_iterations, tolerance } => {
            let mut store = IndexStore::open(&db)?;
            let config = PageRankConfig { damping, max_iterations, tolerance };
            let scores = run_pagerank(&mut store, &config);
            println!("{}", serde_json::json!({ "scored_docs": scores.len() }));
        }
    }
    Ok(())
}
