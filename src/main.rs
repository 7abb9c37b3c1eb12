use std::fs;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use newslink::cli::{Cli, Commands};
use newslink::codec;
use newslink::config::Config;
use newslink::domain::{scan_tokens, Token};
use newslink::errors::{ResolverError, ResolverResult};
use newslink::resolvers::{
    BrowserSettings, ChromeNavigator, HttpRedirectResolver, RedirectSettings,
};
use newslink::services::{ResolutionService, ResolveOptions};
use newslink::sources::{FeedSource, GoogleNewsSource};
use newslink::storage::MemoryResolutionCache;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> ResolverResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Decode { token } => cmd_decode(&token),
        Commands::Resolve {
            tokens,
            file,
            concurrency,
            timeout_ms,
            no_browser,
            json,
        } => {
            let config = Config::from_env()?;
            let mut opts = config.resolve_options();
            if let Some(concurrency) = concurrency {
                opts = opts.with_concurrency(concurrency);
            }
            if let Some(timeout_ms) = timeout_ms {
                opts = opts.with_timeout(std::time::Duration::from_millis(timeout_ms));
            }
            if no_browser {
                opts = opts.with_browser_fallback(false);
            }
            cmd_resolve(tokens, file, &config, &opts, json).await
        }
        Commands::Feed {
            url,
            resolve,
            no_browser,
            concurrency,
        } => {
            let config = Config::from_env()?;
            let mut opts = config.resolve_options();
            if let Some(concurrency) = concurrency {
                opts = opts.with_concurrency(concurrency);
            }
            if no_browser {
                opts = opts.with_browser_fallback(false);
            }
            cmd_feed(&url, resolve, &config, &opts).await
        }
    }
}

fn build_service(config: &Config, opts: &ResolveOptions) -> ResolutionService {
    let redirect = HttpRedirectResolver::new(RedirectSettings {
        user_agent: config.user_agent.clone(),
        ..RedirectSettings::default()
    });

    let cache = MemoryResolutionCache::new(config.cache_ttl);
    tracing::debug!(ttl_secs = cache.ttl().as_secs(), "Resolution cache enabled");

    let mut service = ResolutionService::new(Arc::new(redirect)).with_cache(Arc::new(cache));

    if opts.enable_browser_fallback {
        let navigator = ChromeNavigator::new(BrowserSettings {
            chrome_bin: config.chrome_bin.clone(),
            user_agent: config.user_agent.clone(),
            ..BrowserSettings::default()
        });
        service = service.with_browser(Arc::new(navigator));
    }

    service
}

fn cmd_decode(token: &str) -> ResolverResult<()> {
    match codec::decode(token) {
        Some(url) => println!("{}", url),
        None => println!("No embedded URL found; the token needs online resolution."),
    }
    Ok(())
}

async fn cmd_resolve(
    raw_tokens: Vec<String>,
    file: Option<String>,
    config: &Config,
    opts: &ResolveOptions,
    json: bool,
) -> ResolverResult<()> {
    let mut tokens: Vec<Token> = raw_tokens.into_iter().map(Token::new).collect();

    if let Some(path) = file {
        let content = fs::read_to_string(&path)?;
        let scanned = scan_tokens(&content);
        if scanned.is_empty() {
            // Plain list, one token per line
            tokens.extend(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(Token::new),
            );
        } else {
            tracing::info!(path = %path, found = scanned.len(), "Scanned tokens from file");
            tokens.extend(scanned);
        }
    }

    if tokens.is_empty() {
        return Err(ResolverError::InvalidInput(
            "No tokens given; pass them as arguments or with --file".to_string(),
        ));
    }

    let service = build_service(config, opts);
    let batch = service.resolve_batch(tokens, opts).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&batch)?);
        return Ok(());
    }

    for url in batch.resolved_urls() {
        println!("{}", url);
    }
    println!();
    let counters = batch.counters();
    println!(
        "Resolved {} of {} tokens ({})",
        batch.resolved_urls().len(),
        counters.total(),
        counters
    );

    Ok(())
}

async fn cmd_feed(
    url: &str,
    resolve: bool,
    config: &Config,
    opts: &ResolveOptions,
) -> ResolverResult<()> {
    let source = GoogleNewsSource::with_user_agent(&config.user_agent);
    if !source.can_handle(url) {
        tracing::warn!(url, "Not an aggregator URL, trying it as a feed anyway");
    }

    let items = source.extract(url).await?;

    if resolve {
        let service = build_service(config, opts);
        let records = service.resolve_items(&items, opts).await?;
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No items in feed.");
        return Ok(());
    }

    for item in &items {
        match &item.source {
            Some(source) => println!("{} [{}]", item.title, source),
            None => println!("{}", item.title),
        }
        if let Some(published) = &item.published {
            println!("    Published: {}", published);
        }
        println!("    Token: {}", item.token);
        if let Some(decoded) = &item.decoded {
            println!("    Decoded: {}", decoded);
        }
        println!();
    }

    println!("{} items", items.len());
    Ok(())
}
