use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "fleetcrawl", about = "High-throughput polite web crawler")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start crawling from seed URLs
    Crawl {
        /// Seed URLs (comma-separated or file path)
        #[arg(short, long)]
        seeds: Option<String>,

        /// Single seed URL
        #[arg(long)]
        seed: Option<String>,

        /// Page budget override
        #[arg(short = 'p', long)]
        max_pages: Option<u64>,

        /// Worker count override
        #[arg(short, long)]
        workers: Option<usize>,
    },
}
