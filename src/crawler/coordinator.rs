//! Crawl coordination - the breadth-first frontier state machine
//!
//! The coordinator is the single owner of all frontier state: the visited
//! set, the current depth level's task queue, and the crawl counters.
//! Workers only fetch, extract, and report back; they never touch shared
//! mutable state, which makes the at-most-once-per-URL guarantee a matter
//! of single-task reasoning rather than locking discipline.
//!
//! Per depth level the coordinator:
//! 1. admits candidate links (dedup, origin-domain check, filter chain,
//!    page budget),
//! 2. dispatches each admitted task once the dispatcher grants a permit,
//! 3. drains completed tasks (biased over dispatching, so the page budget
//!    stays current),
//! 4. hands the level's discovered links to the next round of admission.
//!
//! All tasks at depth d are dispatched before any task at depth d+1 is
//! admitted. Reaching the page budget lets in-flight tasks complete but
//! admits no new ones; queued-but-undispatched tasks are dropped silently.

use crate::config::{CacheMode, CrawlConfig};
use crate::crawler::fetcher::{FetchResponse, HttpFetcher, PageFetcher};
use crate::crawler::parser::parse_page;
use crate::dispatch::{build_dispatcher, DispatchPermit, Dispatcher, Monitor};
use crate::extract::{ExtractionPipeline, PageContext};
use crate::filter::FilterChain;
use crate::limiter::{RateLimiter, ThrottleDecision};
use crate::output::{CrawlSummary, DepthBuckets, ErrorKind, PageOutcome};
use crate::url::{dedup_key, extract_domain, normalize_url};
use crate::{config, FathomError, UrlError};
use chrono::Utc;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use url::Url;

/// One unit of frontier work
///
/// Created when a link is admitted; owned by its worker while in flight;
/// gone once its outcome is recorded.
#[derive(Debug, Clone)]
pub struct CrawlTask {
    pub url: Url,

    /// Breadth-first distance from the start URL
    pub depth: u32,

    /// Domain this task was admitted under; links discovered here are
    /// compared against it when external links are excluded
    pub origin_domain: String,
}

/// A link found on a fetched page, awaiting admission at the next depth
#[derive(Debug)]
struct DiscoveredLink {
    href: String,
    parent_domain: String,
}

/// Everything a worker needs, shared immutably across all workers
struct TaskContext {
    fetcher: Arc<dyn PageFetcher>,
    limiter: Option<Arc<RateLimiter>>,
    pipeline: Option<Arc<ExtractionPipeline>>,
    chain: FilterChain,
    cache_mode: CacheMode,
}

/// What a worker reports back to the coordinator
struct TaskReport {
    task: CrawlTask,

    /// The recorded outcome; absent when the response content type was
    /// rejected, which suppresses both retention and link expansion
    outcome: Option<PageOutcome>,
}

/// The breadth-first crawl coordinator
pub struct Coordinator {
    config: Arc<CrawlConfig>,
    dispatcher: Arc<dyn Dispatcher>,
    monitor: Option<Arc<Monitor>>,
    ctx: Arc<TaskContext>,

    visited: HashSet<String>,
    attempted: u64,
    succeeded: u64,
    failed: u64,
    pages_per_depth: BTreeMap<u32, u64>,

    /// Set once max_pages successes have been produced, or the streaming
    /// consumer went away; admits no further tasks either way
    budget_reached: bool,
}

impl Coordinator {
    /// Creates a coordinator with the production HTTP fetcher
    ///
    /// All configuration-time errors surface here, before any fetch.
    pub fn new(crawl_config: CrawlConfig) -> Result<Self, FathomError> {
        let fetcher = Arc::new(HttpFetcher::new()?);
        Self::with_fetcher(crawl_config, fetcher)
    }

    /// Creates a coordinator over an injected fetch layer
    ///
    /// This is the deterministic-fetcher seam the test suite uses.
    pub fn with_fetcher(
        crawl_config: CrawlConfig,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self, FathomError> {
        config::validate(&crawl_config)?;

        let monitor = crawl_config.monitor.then(|| Arc::new(Monitor::new()));
        let dispatcher = build_dispatcher(&crawl_config.dispatcher, monitor.clone());

        let limiter = crawl_config
            .rate_limiter
            .enabled
            .then(|| Arc::new(RateLimiter::new(crawl_config.rate_limiter.clone())));

        let pipeline = ExtractionPipeline::from_config(&crawl_config)
            .map_err(FathomError::Config)?
            .map(Arc::new);

        let chain = FilterChain::from_config(&crawl_config.filters);

        let ctx = Arc::new(TaskContext {
            fetcher,
            limiter,
            pipeline,
            chain,
            cache_mode: crawl_config.cache_mode,
        });

        Ok(Self {
            config: Arc::new(crawl_config),
            dispatcher,
            monitor,
            ctx,
            visited: HashSet::new(),
            attempted: 0,
            succeeded: 0,
            failed: 0,
            pages_per_depth: BTreeMap::new(),
            budget_reached: false,
        })
    }

    /// Runs the crawl to its terminal state
    ///
    /// With a stream sender, every outcome is handed over as soon as it is
    /// produced and the returned buckets stay empty; without one, outcomes
    /// accumulate in the buckets for batch delivery.
    pub async fn run(
        mut self,
        mut stream_tx: Option<mpsc::Sender<PageOutcome>>,
    ) -> Result<(DepthBuckets, CrawlSummary), FathomError> {
        let started_at = Utc::now();

        let start = normalize_url(&self.config.start_url)?;
        let origin = extract_domain(&start).ok_or(UrlError::MissingDomain)?;

        self.visited.insert(dedup_key(&start));

        let mut current = VecDeque::new();
        current.push_back(CrawlTask {
            url: start,
            depth: 0,
            origin_domain: origin,
        });

        let mut buckets = DepthBuckets::new();
        let mut depth = 0;

        tracing::info!(
            "Starting crawl of {} (max depth {}, max pages {:?})",
            self.config.start_url,
            self.config.max_depth,
            self.config.max_pages
        );

        while !current.is_empty() {
            tracing::debug!("Dispatching depth {} ({} tasks)", depth, current.len());

            let discovered = self
                .run_level(current, &mut stream_tx, &mut buckets)
                .await?;

            current = self.admit_level(discovered, depth + 1);
            depth += 1;
        }

        self.dispatcher.close();

        let summary = CrawlSummary {
            attempted: self.attempted,
            succeeded: self.succeeded,
            failed: self.failed,
            pages_per_depth: self.pages_per_depth,
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            "Crawl complete: {} attempted, {} succeeded, {} failed",
            summary.attempted,
            summary.succeeded,
            summary.failed
        );

        Ok((buckets, summary))
    }

    /// Dispatches and drains one depth level, returning its discovered links
    async fn run_level(
        &mut self,
        mut queue: VecDeque<CrawlTask>,
        stream_tx: &mut Option<mpsc::Sender<PageOutcome>>,
        buckets: &mut DepthBuckets,
    ) -> Result<Vec<DiscoveredLink>, FathomError> {
        let mut join_set: JoinSet<TaskReport> = JoinSet::new();
        let mut discovered = Vec::new();

        if let Some(monitor) = &self.monitor {
            monitor.set_queue_depth(queue.len());
        }

        while !queue.is_empty() || !join_set.is_empty() {
            if self.budget_reached && !queue.is_empty() {
                tracing::debug!(
                    "Page budget reached, dropping {} queued tasks",
                    queue.len()
                );
                queue.clear();
                if let Some(monitor) = &self.monitor {
                    monitor.set_queue_depth(0);
                }
                continue;
            }

            let dispatcher = Arc::clone(&self.dispatcher);
            let can_dispatch = !queue.is_empty() && !self.budget_reached;

            tokio::select! {
                biased;

                Some(joined) = join_set.join_next() => {
                    match joined {
                        Ok(report) => {
                            self.handle_report(report, &mut discovered, stream_tx, buckets)
                                .await;
                        }
                        Err(e) => tracing::error!("Crawl worker panicked: {}", e),
                    }
                }

                permit = dispatcher.acquire(), if can_dispatch => {
                    let permit = permit.map_err(|_| FathomError::DispatcherClosed)?;
                    let task = queue.pop_front().expect("guarded by can_dispatch");

                    if let Some(monitor) = &self.monitor {
                        monitor.set_queue_depth(queue.len());
                    }

                    let ctx = Arc::clone(&self.ctx);
                    join_set.spawn(run_task(task, permit, ctx));
                }
            }
        }

        Ok(discovered)
    }

    /// Processes one worker report: counters, budget, delivery, expansion
    async fn handle_report(
        &mut self,
        report: TaskReport,
        discovered: &mut Vec<DiscoveredLink>,
        stream_tx: &mut Option<mpsc::Sender<PageOutcome>>,
        buckets: &mut DepthBuckets,
    ) {
        self.attempted += 1;

        let outcome = match report.outcome {
            Some(outcome) => outcome,
            None => {
                // Content type rejected post-fetch: neither retained nor
                // expanded, but it consumed an attempt
                tracing::debug!("Dropped {} (disallowed content type)", report.task.url);
                return;
            }
        };

        if outcome.success {
            self.succeeded += 1;
            if let Some(max_pages) = self.config.max_pages {
                if self.succeeded >= max_pages as u64 && !self.budget_reached {
                    tracing::info!("Reached max pages ({}), winding down", max_pages);
                    self.budget_reached = true;
                }
            }
        } else {
            self.failed += 1;
            if let Some(kind) = &outcome.error_kind {
                tracing::warn!("Failed {}: {}", outcome.url, kind);
            }
        }

        *self.pages_per_depth.entry(outcome.depth).or_default() += 1;

        for href in &outcome.discovered_links {
            discovered.push(DiscoveredLink {
                href: href.clone(),
                parent_domain: report.task.origin_domain.clone(),
            });
        }

        if self.attempted % 10 == 0 {
            tracing::info!(
                "Progress: {} attempted, {} succeeded, {} failed",
                self.attempted,
                self.succeeded,
                self.failed
            );
            if let Some(monitor) = &self.monitor {
                monitor.log_progress();
            }
        }

        match stream_tx.clone() {
            Some(tx) => {
                // Rendezvous send: the consumer processes one outcome at a
                // time, which is the crawl's backpressure
                if tx.send(outcome).await.is_err() {
                    tracing::info!("Stream consumer dropped, winding down crawl");
                    *stream_tx = None;
                    self.budget_reached = true;
                }
            }
            None => buckets.push(outcome),
        }
    }

    /// Admits the next depth level from the previous level's discoveries
    ///
    /// Dropped links (over depth, over budget, duplicate, filtered,
    /// external) disappear silently; that is the documented lifecycle, not
    /// an error.
    fn admit_level(&mut self, discovered: Vec<DiscoveredLink>, depth: u32) -> VecDeque<CrawlTask> {
        let mut admitted = VecDeque::new();

        if self.budget_reached || depth > self.config.max_depth {
            return admitted;
        }

        for candidate in discovered {
            let url = match normalize_url(&candidate.href) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("Skipping malformed link {}: {}", candidate.href, e);
                    continue;
                }
            };

            let domain = match extract_domain(&url) {
                Some(domain) => domain,
                None => continue,
            };

            // Structural origin-domain constraint, ahead of the filter chain
            if !self.config.include_external && domain != candidate.parent_domain {
                continue;
            }

            if !self.ctx.chain.admits_link(&url, &domain) {
                continue;
            }

            // At-most-once: only the first admission of a normalized URL wins
            if !self.visited.insert(dedup_key(&url)) {
                continue;
            }

            admitted.push_back(CrawlTask {
                url,
                depth,
                origin_domain: domain,
            });
        }

        admitted
    }
}

/// Worker body: holds the permit for the task's whole lifetime
async fn run_task(task: CrawlTask, permit: DispatchPermit, ctx: Arc<TaskContext>) -> TaskReport {
    let report = execute_task(task, &ctx).await;
    drop(permit);
    report
}

/// Builds a failure outcome for a task
fn failure(task: &CrawlTask, kind: ErrorKind) -> PageOutcome {
    PageOutcome {
        url: task.url.clone(),
        depth: task.depth,
        success: false,
        raw_markdown: None,
        fit_markdown: None,
        discovered_links: Vec::new(),
        error_kind: Some(kind),
    }
}

/// Fetches one task with throttle retries, then runs extraction
async fn execute_task(task: CrawlTask, ctx: &TaskContext) -> TaskReport {
    loop {
        if let Some(limiter) = &ctx.limiter {
            limiter.wait_for(&task.origin_domain).await;
        }

        match ctx.fetcher.fetch(&task.url, ctx.cache_mode).await {
            FetchResponse::Throttled => match &ctx.limiter {
                Some(limiter) => match limiter.record_throttle(&task.origin_domain) {
                    ThrottleDecision::Backoff => {
                        tracing::debug!("Throttled by {}, backing off", task.origin_domain);
                        continue;
                    }
                    ThrottleDecision::Exhausted => {
                        let outcome = failure(&task, ErrorKind::ThrottleExhausted);
                        return TaskReport {
                            task,
                            outcome: Some(outcome),
                        };
                    }
                },
                // Without a rate limiter a throttle is just a failed fetch
                None => {
                    let outcome = failure(&task, ErrorKind::FetchFailure("HTTP 429".to_string()));
                    return TaskReport {
                        task,
                        outcome: Some(outcome),
                    };
                }
            },

            FetchResponse::HttpError { status } => {
                let outcome = failure(&task, ErrorKind::FetchFailure(format!("HTTP {}", status)));
                return TaskReport {
                    task,
                    outcome: Some(outcome),
                };
            }

            FetchResponse::NetworkError { error } => {
                let outcome = failure(&task, ErrorKind::FetchFailure(error));
                return TaskReport {
                    task,
                    outcome: Some(outcome),
                };
            }

            FetchResponse::Success {
                final_url,
                content_type,
                body,
                ..
            } => {
                if let Some(limiter) = &ctx.limiter {
                    limiter.record_success(&task.origin_domain);
                }

                if !ctx.chain.admits_content_type(&content_type) {
                    return TaskReport {
                        task,
                        outcome: None,
                    };
                }

                let base = Url::parse(&final_url).unwrap_or_else(|_| task.url.clone());
                let parsed = parse_page(&body, &base);

                let mut outcome = PageOutcome {
                    url: task.url.clone(),
                    depth: task.depth,
                    success: true,
                    raw_markdown: None,
                    fit_markdown: None,
                    discovered_links: parsed.links,
                    error_kind: None,
                };

                if let Some(pipeline) = &ctx.pipeline {
                    let context = PageContext {
                        url: base,
                        title: parsed.title,
                        description: parsed.description,
                    };
                    let extracted = pipeline.extract(&body, &context).await;

                    outcome.raw_markdown = Some(extracted.raw_markdown);
                    outcome.fit_markdown = extracted.fit_markdown;
                    outcome.error_kind = extracted
                        .filter_error
                        .map(|e| ErrorKind::FilterFailure(e.to_string()));
                }

                return TaskReport {
                    task,
                    outcome: Some(outcome),
                };
            }
        }
    }
}
