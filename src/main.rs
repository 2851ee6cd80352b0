//! mcp-scout - search an MCP server directory from the command line.
//!
//! Scrapes the directory's search page, drops promoted listings and keeps a
//! per-query JSON cache so repeated searches never touch the network.

mod browser;
mod cache;
mod cards;
mod cascade;
mod config;
mod engine;
mod error;
mod featured;
mod fields;
mod html_page;
mod links;
mod record;
mod region;

use anyhow::{Context, Result};
use clap::builder::FalseyValueParser;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::ScoutConfig;
use engine::Scout;
use html_page::HttpBrowser;
use record::{Query, ResultRecord};

#[derive(Debug, Parser)]
#[command(
    name = "mcp-scout",
    version,
    about = "Search MCP server directory listings with a local cache"
)]
struct Cli {
    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[arg(long, global = true, value_name = "DIR", env = "MCP_SCOUT_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "URL", env = "MCP_SCOUT_BASE_URL")]
    base_url: Option<String>,

    /// Wait after navigation before reading the page
    #[arg(long, global = true, value_name = "MS", env = "MCP_SCOUT_SETTLE_DELAY_MS")]
    settle_delay_ms: Option<u64>,

    /// Let card selectors whose cards are all promoted fall through
    #[arg(
        long,
        global = true,
        env = "MCP_SCOUT_CARD_FALLTHROUGH",
        value_parser = FalseyValueParser::new()
    )]
    card_fallthrough: bool,

    /// Keywords marking promoted listings, comma separated
    #[arg(
        long,
        global = true,
        value_name = "WORDS",
        value_delimiter = ',',
        env = "MCP_SCOUT_FEATURED_KEYWORDS"
    )]
    featured_keywords: Option<Vec<String>>,

    #[arg(long, global = true, value_name = "SECS", env = "MCP_SCOUT_NAVIGATION_TIMEOUT")]
    navigation_timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search for servers matching a query
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Show the directory's featured servers
    Featured,
    /// List cached queries
    Cache,
    /// Show cache statistics
    Stats,
    /// Delete every cached entry
    Clear,
}

impl Cli {
    fn config(&self) -> ScoutConfig {
        let mut config = ScoutConfig::new().with_card_fallthrough(self.card_fallthrough);
        if let Some(dir) = &self.cache_dir {
            config = config.with_cache_dir(dir);
        }
        if let Some(url) = &self.base_url {
            config = config.with_base_url(url);
        }
        if let Some(delay) = self.settle_delay_ms {
            config = config.with_settle_delay_ms(delay);
        }
        if let Some(secs) = self.navigation_timeout_secs {
            config = config.with_navigation_timeout_secs(secs);
        }
        if let Some(keywords) = &self.featured_keywords {
            config = config.with_featured_keywords(keywords);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "mcp_scout=debug"
    } else {
        "mcp_scout=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.config();
    let browser = HttpBrowser::new(&config).context("Failed to build HTTP client")?;
    let scout = Scout::new(config, browser)?;

    match &cli.command {
        Command::Search { query } => {
            let query = Query::new(query.join(" "))?;
            let records = scout.search(&query).await;
            print_records(&records, cli.json)?;
        }
        Command::Featured => {
            let records = scout.featured().await;
            print_records(&records, cli.json)?;
        }
        Command::Cache => {
            let queries = scout.cache().list_queries().context("Failed to list cache")?;
            if cli.json {
                let queries: Vec<&str> = queries.iter().map(Query::as_str).collect();
                println!("{}", serde_json::to_string_pretty(&queries)?);
            } else if queries.is_empty() {
                println!("Cache is empty");
            } else {
                for query in &queries {
                    println!("{}", query);
                }
            }
        }
        Command::Stats => {
            let stats = scout.cache().stats().context("Failed to read cache")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Cache directory: {}", stats.cache_dir.display());
                println!("Files: {}", stats.file_count);
                println!(
                    "Total size: {} bytes ({} MB)",
                    stats.total_size_bytes,
                    stats.total_size_mb()
                );
                for file in &stats.files {
                    println!("  {:<40} {:>10}", file.name, file.size);
                }
            }
        }
        Command::Clear => {
            let removed = scout.cache().clear().context("Failed to clear cache")?;
            println!(
                "Removed {} cache entries from {}",
                removed,
                scout.cache().root().display()
            );
        }
    }

    Ok(())
}

fn print_records(records: &[ResultRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No servers found");
        return Ok(());
    }

    for (i, record) in records.iter().enumerate() {
        println!("{}. {}", i + 1, record.title);
        if !record.description.is_empty() {
            println!("   {}", record.description);
        }
        if !record.link.is_empty() {
            println!("   {}", record.link);
        }
    }
    Ok(())
}
