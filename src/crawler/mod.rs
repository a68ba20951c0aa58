//! Crawl orchestration
//!
//! This module contains the breadth-first crawl engine:
//! - HTTP fetching behind an injectable seam
//! - HTML parsing and link extraction
//! - The frontier coordinator
//! - The batch and streaming entry points

mod coordinator;
mod fetcher;
mod parser;

pub use coordinator::{Coordinator, CrawlTask};
pub use fetcher::{build_http_client, FetchResponse, HttpFetcher, PageFetcher};
pub use parser::{parse_page, ParsedPage};

use crate::config::CrawlConfig;
use crate::output::{CrawlReport, CrawlSummary, PageOutcome};
use crate::{FathomError, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Runs a complete crawl and returns the batch report
///
/// The report is handed over only after the crawl reaches its terminal
/// state: frontier exhausted, page budget met, or depth bound hit.
///
/// # Example
///
/// ```no_run
/// use fathom::config::CrawlConfig;
///
/// # async fn example() -> fathom::Result<()> {
/// let config = CrawlConfig::new("https://example.com/");
/// let report = fathom::crawl(config).await?;
/// println!("{} pages", report.buckets.total());
/// # Ok(())
/// # }
/// ```
pub async fn crawl(config: CrawlConfig) -> Result<CrawlReport> {
    let coordinator = Coordinator::new(config)?;
    run_batch(coordinator).await
}

/// Runs a batch crawl over an injected fetch layer
///
/// Test seam: a deterministic [`PageFetcher`] makes whole-crawl behavior
/// reproducible without a network.
pub async fn crawl_with_fetcher(
    config: CrawlConfig,
    fetcher: Arc<dyn PageFetcher>,
) -> Result<CrawlReport> {
    let coordinator = Coordinator::with_fetcher(config, fetcher)?;
    run_batch(coordinator).await
}

async fn run_batch(coordinator: Coordinator) -> Result<CrawlReport> {
    let (buckets, summary) = coordinator.run(None).await?;
    Ok(CrawlReport { buckets, summary })
}

/// Handle to an in-progress streaming crawl
///
/// Outcomes arrive one at a time through a rendezvous channel: the crawl
/// does not produce the next delivery until the consumer has taken the
/// current one, so a slow consumer naturally backpressures the producer.
/// Dropping the handle (or calling [`CrawlStream::finish`] early) winds the
/// crawl down: in-flight fetches complete, nothing new is admitted.
pub struct CrawlStream {
    outcomes: mpsc::Receiver<PageOutcome>,
    handle: JoinHandle<Result<(crate::output::DepthBuckets, CrawlSummary)>>,
}

impl CrawlStream {
    /// Receives the next outcome; `None` once the crawl has terminated
    pub async fn next(&mut self) -> Option<PageOutcome> {
        self.outcomes.recv().await
    }

    /// Waits for the crawl to terminate and returns the final summary
    pub async fn finish(self) -> Result<CrawlSummary> {
        // Closing the receiver first lets the crawl wind down instead of
        // blocking on deliveries nobody will take
        drop(self.outcomes);

        let (_, summary) = self
            .handle
            .await
            .map_err(|e| FathomError::ChannelClosed(format!("crawl task failed: {}", e)))??;
        Ok(summary)
    }
}

/// Starts a streaming crawl
///
/// Configuration errors surface here, before any fetch. Each outcome is
/// delivered as soon as it is produced; depth grouping is kept as a running
/// side-table and reported by [`CrawlStream::finish`], never used to gate
/// delivery.
pub async fn crawl_stream(config: CrawlConfig) -> Result<CrawlStream> {
    let coordinator = Coordinator::new(config)?;
    Ok(spawn_stream(coordinator))
}

/// Starts a streaming crawl over an injected fetch layer
pub async fn crawl_stream_with_fetcher(
    config: CrawlConfig,
    fetcher: Arc<dyn PageFetcher>,
) -> Result<CrawlStream> {
    let coordinator = Coordinator::with_fetcher(config, fetcher)?;
    Ok(spawn_stream(coordinator))
}

fn spawn_stream(coordinator: Coordinator) -> CrawlStream {
    // Capacity 1: rendezvous delivery, which is the backpressure story
    let (tx, rx) = mpsc::channel(1);
    let handle = tokio::spawn(coordinator.run(Some(tx)));

    CrawlStream {
        outcomes: rx,
        handle,
    }
}
