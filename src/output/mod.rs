//! Result collection and delivery
//!
//! Outcomes are collected either eagerly (batch: the complete
//! [`CrawlReport`] is handed over after the crawl terminates) or lazily
//! (streaming: each [`PageOutcome`] is delivered as it is produced, with
//! depth grouping maintained only as a summary side-table). Both modes see
//! the same set of outcomes.

mod outcome;
mod report;
mod sink;

pub use outcome::{ErrorKind, PageOutcome};
pub use report::{print_report, print_summary, CrawlReport, CrawlSummary, DepthBuckets};
pub use sink::{derive_stem, DirSink, MarkdownSink};
