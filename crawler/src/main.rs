use anyhow::{anyhow, Context, Result};
use clap::Parser;
use linkrank_crawler::{crawl, CrawlConfig, DEFAULT_USER_AGENT};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Crawl from seed URLs into bucketed raw storage, respecting robots.txt")]
struct Cli {
    /// Path to a file with seed URLs (one per line)
    #[arg(long)]
    seeds: PathBuf,
    /// Raw document directory
    #[arg(long, default_value = "./data/raw")]
    output: PathBuf,
    /// Maximum number of documents to store
    #[arg(long, default_value_t = 50)]
    max_pages: usize,
    /// Maximum link hops from a seed
    #[arg(long, default_value_t = 1)]
    max_depth: usize,
    /// Number of concurrent fetch workers
    #[arg(long, default_value_t = 5)]
    workers: usize,
    /// Pages larger than this many bytes are skipped
    #[arg(long, default_value_t = 5 * 1024 * 1024)]
    max_html_bytes: u64,
    /// Stop once this many raw bytes have been accepted
    #[arg(long, default_value_t = 10 * 1024 * 1024 * 1024)]
    max_total_bytes: u64,
    /// Request timeout seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
    /// User-Agent string to use for robots.txt and crawling
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,
}

#[derive(Serialize)]
struct CrawlSummary {
    total_crawled: usize,
    files: Vec<String>,
}

fn load_seeds(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("opening seeds file {}", path.display()))?;
    let mut seeds = Vec::new();
    for line in BufReader::new(file).lines() {
        let s = line?.trim().to_string();
        if s.is_empty() || s.starts_with('#') { continue; }
        let u = Url::parse(&s).or_else(|_| Url::parse(&format!("https://{}", s)));
        match u {
            Ok(u) => seeds.push(u.to_string()),
            Err(e) => tracing::warn!(seed = %s, error = %e, "ignoring invalid seed"),
        }
    }
    Ok(seeds)
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Cli::parse();

    let seeds = load_seeds(&args.seeds)?;
    if seeds.is_empty() { return Err(anyhow!("no valid seeds")); }

    let config = CrawlConfig {
        workers: args.workers,
        max_html_bytes: args.max_html_bytes,
        max_total_bytes: args.max_total_bytes,
        user_agent: args.user_agent,
        timeout: Duration::from_secs(args.timeout_secs),
    };
    let files = crawl(&seeds, args.max_pages, args.max_depth, &args.output, &config).await?;

    let files: Vec<String> = files.iter().map(|p| p.to_string_lossy().into_owned()).collect();
    let summary = CrawlSummary { total_crawled: files.len(), files };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
