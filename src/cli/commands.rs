use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "newslink")]
#[command(about = "Resolve encoded news-aggregator article links to publisher URLs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode a token offline, without any network access
    Decode {
        /// Aggregator article URL
        token: String,
    },

    /// Resolve tokens to publisher URLs (codec, redirect, then browser)
    Resolve {
        /// Aggregator article URLs
        tokens: Vec<String>,

        /// Read additional tokens from a file, one per line
        #[arg(short, long)]
        file: Option<String>,

        /// Number of tokens resolved at the same time
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Browser navigation timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Never fall back to the headless browser
        #[arg(long)]
        no_browser: bool,

        /// Print the full batch as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract articles from an aggregator topic, search or section feed
    Feed {
        /// Topic, search or feed URL
        url: String,

        /// Resolve the extracted items and print article records as JSON
        #[arg(long)]
        resolve: bool,

        /// Never fall back to the headless browser
        #[arg(long)]
        no_browser: bool,

        /// Number of tokens resolved at the same time
        #[arg(short, long)]
        concurrency: Option<usize>,
    },
}
