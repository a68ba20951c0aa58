//! Fathom main entry point
//!
//! Command-line front end for the deep crawler: parses flags (optionally
//! layered over a TOML config file), runs the crawl in batch or streaming
//! mode, writes markdown output, and prints the final summary.

use anyhow::Context;
use clap::Parser;
use fathom::config::{
    load_config, CacheMode, ContentFilterKind, CrawlConfig, DispatcherKind, ThresholdKind,
};
use fathom::output::{
    derive_stem, print_report, print_summary, DirSink, MarkdownSink, PageOutcome,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Fathom: a breadth-first deep crawler
///
/// Crawls from a start URL under depth/page/domain constraints, renders
/// fetched pages to markdown through an optional content filter, and
/// delivers results as a batch or as a stream.
#[derive(Parser, Debug)]
#[command(name = "fathom")]
#[command(version)]
#[command(about = "A breadth-first deep crawler", long_about = None)]
struct Cli {
    /// Starting URL for the crawl
    #[arg(value_name = "URL", required_unless_present = "config")]
    url: Option<String>,

    /// TOML configuration file; explicit flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum depth to crawl
    #[arg(long)]
    max_depth: Option<u32>,

    /// Maximum number of successfully crawled pages
    #[arg(long)]
    max_pages: Option<u32>,

    /// Follow links to external domains
    #[arg(long)]
    include_external: bool,

    /// URL glob patterns to include
    #[arg(long, num_args = 0..)]
    url_patterns: Vec<String>,

    /// Domains to allow
    #[arg(long, num_args = 0..)]
    allowed_domains: Vec<String>,

    /// Domains to block
    #[arg(long, num_args = 0..)]
    blocked_domains: Vec<String>,

    /// Response content types to accept
    #[arg(long, num_args = 0..)]
    allowed_content_types: Vec<String>,

    /// Content filter to use
    #[arg(long, value_enum)]
    content_filter: Option<ContentFilterKind>,

    /// Threshold for content pruning
    #[arg(long)]
    pruning_threshold: Option<f64>,

    /// Threshold type for content pruning
    #[arg(long, value_enum)]
    threshold_type: Option<ThresholdKind>,

    /// Minimum word count for pruned segments
    #[arg(long)]
    min_word_threshold: Option<usize>,

    /// Search query for BM25 content filtering
    #[arg(long)]
    user_query: Option<String>,

    /// BM25 score threshold
    #[arg(long)]
    bm25_threshold: Option<f64>,

    /// Enable word stemming for BM25 filtering
    #[arg(long)]
    use_stemming: bool,

    /// LLM provider for content filtering (e.g. openai/gpt-4o)
    #[arg(long)]
    llm_provider: Option<String>,

    /// API token for the LLM provider; falls back to <PROVIDER>_API_KEY
    #[arg(long)]
    llm_api_token: Option<String>,

    /// Custom instruction for LLM content filtering
    #[arg(long)]
    llm_instruction: Option<String>,

    /// Token threshold per chunk for LLM filtering
    #[arg(long)]
    chunk_token_threshold: Option<usize>,

    /// Remove all hyperlinks from the markdown output
    #[arg(long)]
    ignore_links: bool,

    /// Remove all image references from the markdown output
    #[arg(long)]
    ignore_images: bool,

    /// Escape HTML entities in the markdown output
    #[arg(long)]
    escape_html: bool,

    /// Wrap text at N characters (0 means no wrapping)
    #[arg(long)]
    body_width: Option<usize>,

    /// Omit local anchors referencing the same page
    #[arg(long)]
    skip_internal_links: bool,

    /// Save markdown content for each crawled URL
    #[arg(long)]
    save_markdown: bool,

    /// Directory to save markdown files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Enable per-domain rate limiting
    #[arg(long)]
    enable_rate_limiter: bool,

    /// Base delay range in seconds between requests
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"])]
    base_delay: Option<Vec<f64>>,

    /// Maximum backoff delay in seconds
    #[arg(long)]
    max_delay: Option<f64>,

    /// Maximum retries for throttled requests
    #[arg(long)]
    max_retries: Option<u32>,

    /// Dispatcher strategy
    #[arg(long, value_enum)]
    dispatcher: Option<DispatcherKind>,

    /// Memory threshold percentage for the adaptive dispatcher
    #[arg(long)]
    memory_threshold: Option<f64>,

    /// Memory check interval in seconds
    #[arg(long)]
    check_interval: Option<f64>,

    /// Maximum concurrent fetches
    #[arg(long)]
    max_concurrent: Option<u32>,

    /// Process results as they become available
    #[arg(long)]
    stream: bool,

    /// Report live crawl statistics
    #[arg(long)]
    enable_monitor: bool,

    /// Cache mode for requests
    #[arg(long, value_enum)]
    cache_mode: Option<CacheMode>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;

    if config.stream {
        run_streaming(config).await
    } else {
        run_batch(config).await
    }
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("fathom=info,warn"),
            1 => EnvFilter::new("fathom=debug,info"),
            2 => EnvFilter::new("fathom=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Assembles the crawl configuration: file first, then explicit flags
fn build_config(cli: &Cli) -> anyhow::Result<CrawlConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => CrawlConfig::default(),
    };

    if let Some(url) = &cli.url {
        config.start_url = url.clone();
    }
    if let Some(depth) = cli.max_depth {
        config.max_depth = depth;
    }
    if let Some(pages) = cli.max_pages {
        config.max_pages = Some(pages);
    }
    if cli.include_external {
        config.include_external = true;
    }
    if cli.stream {
        config.stream = true;
    }
    if cli.enable_monitor {
        config.monitor = true;
    }
    if let Some(mode) = cli.cache_mode {
        config.cache_mode = mode;
    }

    if !cli.url_patterns.is_empty() {
        config.filters.url_patterns = cli.url_patterns.clone();
    }
    if !cli.allowed_domains.is_empty() {
        config.filters.allowed_domains = cli.allowed_domains.clone();
    }
    if !cli.blocked_domains.is_empty() {
        config.filters.blocked_domains = cli.blocked_domains.clone();
    }
    if !cli.allowed_content_types.is_empty() {
        config.filters.allowed_content_types = cli.allowed_content_types.clone();
    }

    if let Some(filter) = cli.content_filter {
        config.content_filter = filter;
    }
    if let Some(threshold) = cli.pruning_threshold {
        config.pruning.threshold = threshold;
    }
    if let Some(kind) = cli.threshold_type {
        config.pruning.threshold_type = kind;
    }
    if let Some(words) = cli.min_word_threshold {
        config.pruning.min_word_threshold = words;
    }
    if let Some(query) = &cli.user_query {
        config.bm25.query = Some(query.clone());
    }
    if let Some(threshold) = cli.bm25_threshold {
        config.bm25.threshold = threshold;
    }
    if cli.use_stemming {
        config.bm25.use_stemming = true;
    }
    if let Some(provider) = &cli.llm_provider {
        config.llm.provider = provider.clone();
    }
    if let Some(token) = &cli.llm_api_token {
        config.llm.api_token = Some(token.clone());
    }
    if let Some(instruction) = &cli.llm_instruction {
        config.llm.instruction = instruction.clone();
    }
    if let Some(tokens) = cli.chunk_token_threshold {
        config.llm.chunk_token_threshold = tokens;
    }

    if cli.ignore_links {
        config.markdown.ignore_links = true;
    }
    if cli.ignore_images {
        config.markdown.ignore_images = true;
    }
    if cli.escape_html {
        config.markdown.escape_html = true;
    }
    if let Some(width) = cli.body_width {
        config.markdown.body_width = width;
    }
    if cli.skip_internal_links {
        config.markdown.skip_internal_links = true;
    }

    if cli.save_markdown {
        config.output.save_markdown = true;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.output_dir = dir.clone();
    }

    if cli.enable_rate_limiter {
        config.rate_limiter.enabled = true;
    }
    if let Some(range) = &cli.base_delay {
        config.rate_limiter.base_delay_ms = (secs_to_ms(range[0]), secs_to_ms(range[1]));
    }
    if let Some(delay) = cli.max_delay {
        config.rate_limiter.max_delay_ms = secs_to_ms(delay);
    }
    if let Some(retries) = cli.max_retries {
        config.rate_limiter.max_retries = retries;
    }

    if let Some(kind) = cli.dispatcher {
        config.dispatcher.kind = kind;
    }
    if let Some(threshold) = cli.memory_threshold {
        config.dispatcher.memory_threshold_percent = threshold;
    }
    if let Some(interval) = cli.check_interval {
        config.dispatcher.check_interval_ms = secs_to_ms(interval);
    }
    if let Some(concurrent) = cli.max_concurrent {
        config.dispatcher.max_concurrent = concurrent;
    }

    Ok(config)
}

fn secs_to_ms(secs: f64) -> u64 {
    (secs * 1000.0).round().max(0.0) as u64
}

/// Writes one outcome's markdown through the sink, if there is any
fn persist_outcome(
    outcome: &PageOutcome,
    sink: &DirSink,
    filtered: bool,
) -> anyhow::Result<bool> {
    if !outcome.success {
        return Ok(false);
    }

    let markdown = match outcome.output_markdown(filtered) {
        Some(markdown) => markdown,
        None => return Ok(false),
    };

    let stem = derive_stem(&outcome.url);
    let content = format!("# {}\n\n{}", outcome.url, markdown);
    sink.persist(&stem, &content)
        .with_context(|| format!("failed to write markdown for {}", outcome.url))?;

    println!("  -> Saved markdown for {} as {}.md", outcome.url, stem);
    Ok(true)
}

/// Batch mode: collect everything, then report and save
async fn run_batch(config: CrawlConfig) -> anyhow::Result<()> {
    let save_markdown = config.output.save_markdown;
    let output_dir = config.output.output_dir.clone();
    let filtered = config.content_filter != ContentFilterKind::None;

    let report = fathom::crawl(config).await?;

    print_report(&report);

    if save_markdown {
        let sink = DirSink::new(&output_dir);
        let mut saved = 0;

        println!("\n===== SAVING MARKDOWN CONTENT =====\n");
        for (_, outcomes) in report.buckets.iter() {
            for outcome in outcomes {
                if persist_outcome(outcome, &sink, filtered)? {
                    saved += 1;
                }
            }
        }

        if saved > 0 {
            println!("\nMarkdown files saved to: {}", output_dir.display());
        } else {
            println!("\nNo markdown content was generated for any of the crawled pages.");
        }
    }

    Ok(())
}

/// Streaming mode: process each outcome as it arrives
async fn run_streaming(config: CrawlConfig) -> anyhow::Result<()> {
    let save_markdown = config.output.save_markdown;
    let output_dir = config.output.output_dir.clone();
    let filtered = config.content_filter != ContentFilterKind::None;

    println!("\n===== STREAMING MODE ENABLED =====\n");

    let sink = DirSink::new(&output_dir);
    let mut stream = fathom::crawl_stream(config).await?;
    let mut total = 0u64;
    let mut saved = 0u64;

    while let Some(outcome) = stream.next().await {
        total += 1;
        println!(
            "Processed page {}: {} (depth {})",
            total, outcome.url, outcome.depth
        );

        if let Some(kind) = &outcome.error_kind {
            println!("  -> {}", kind);
        }

        if save_markdown && persist_outcome(&outcome, &sink, filtered)? {
            saved += 1;
        }
    }

    let summary = stream.finish().await?;
    print_summary(&summary);

    if save_markdown {
        if saved > 0 {
            println!("\nMarkdown files saved to: {}", output_dir.display());
        } else {
            println!("\nNo markdown content was generated for any of the crawled pages.");
        }
    }

    Ok(())
}
