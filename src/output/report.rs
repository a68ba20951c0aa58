//! Crawl reports and summary statistics

use crate::output::outcome::PageOutcome;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Outcomes grouped by breadth-first depth
///
/// Buckets grow monotonically during a crawl and preserve arrival order
/// within a depth. Arrival order is a display convenience, not a guarantee:
/// tasks at the same depth complete in any order.
#[derive(Debug, Default)]
pub struct DepthBuckets {
    buckets: BTreeMap<u32, Vec<PageOutcome>>,
}

impl DepthBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: PageOutcome) {
        self.buckets.entry(outcome.depth).or_default().push(outcome);
    }

    pub fn get(&self, depth: u32) -> Option<&[PageOutcome]> {
        self.buckets.get(&depth).map(|v| v.as_slice())
    }

    /// Iterates buckets in ascending depth order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[PageOutcome])> {
        self.buckets.iter().map(|(d, v)| (*d, v.as_slice()))
    }

    pub fn total(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Outcome counts per depth
    pub fn counts(&self) -> BTreeMap<u32, u64> {
        self.buckets
            .iter()
            .map(|(d, v)| (*d, v.len() as u64))
            .collect()
    }

    pub fn max_depth(&self) -> Option<u32> {
        self.buckets.keys().next_back().copied()
    }
}

/// Final crawl statistics
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    /// Tasks dispatched (every delivered outcome counts as attempted)
    pub attempted: u64,

    /// Outcomes with success = true
    pub succeeded: u64,

    /// Outcomes with success = false
    pub failed: u64,

    /// Delivered outcomes per depth
    pub pages_per_depth: BTreeMap<u32, u64>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CrawlSummary {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// The complete result of a batch crawl
///
/// Handed to the caller only once the crawl reaches its terminal state.
#[derive(Debug)]
pub struct CrawlReport {
    pub buckets: DepthBuckets,
    pub summary: CrawlSummary,
}

/// Prints the crawl structure and summary to stdout
///
/// Shows up to five example URLs per depth, the way the crawl is usually
/// eyeballed.
pub fn print_report(report: &CrawlReport) {
    println!("\n===== CRAWL RESULTS =====\n");
    println!("Total pages crawled: {}", report.buckets.total());

    for (depth, outcomes) in report.buckets.iter() {
        println!("\nDepth {}: {} pages", depth, outcomes.len());
        for outcome in outcomes.iter().take(5) {
            match &outcome.error_kind {
                Some(kind) if !outcome.success => {
                    println!("  -> {} ({})", outcome.url, kind)
                }
                _ => println!("  -> {}", outcome.url),
            }
        }
        if outcomes.len() > 5 {
            println!("  ... and {} more", outcomes.len() - 5);
        }
    }

    print_summary(&report.summary);
}

/// Prints the final summary counters to stdout
pub fn print_summary(summary: &CrawlSummary) {
    println!("\n===== SUMMARY =====\n");
    println!("Attempted: {}", summary.attempted);
    println!("Succeeded: {}", summary.succeeded);
    println!("Failed:    {}", summary.failed);

    for (depth, count) in &summary.pages_per_depth {
        println!("  depth {}: {} pages", depth, count);
    }

    let secs = summary.duration().num_milliseconds() as f64 / 1000.0;
    println!("\nElapsed: {:.2}s", secs);
}
