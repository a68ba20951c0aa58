//! Fetch dispatching under a concurrency budget
//!
//! A [`Dispatcher`] grants [`DispatchPermit`]s, one per in-flight fetch.
//! Two interchangeable strategies exist:
//!
//! - [`FixedDispatcher`]: a counting semaphore with a fixed permit budget.
//! - [`MemoryAdaptiveDispatcher`]: the same budget plus a memory gate that
//!   withholds new permits while process memory utilization sits above a
//!   configured threshold. Memory is sampled at most once per check
//!   interval, trading a small staleness window for not probing on every
//!   submission.
//!
//! Permit release is RAII: dropping the permit frees the slot. A dispatcher
//! rejects acquisition only after [`Dispatcher::close`]; otherwise every
//! waiter is eventually admitted once a permit frees up.

mod monitor;

pub use monitor::{Monitor, MonitorSnapshot};

use crate::config::{DispatcherConfig, DispatcherKind};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Returned when a permit is requested from a shut-down dispatcher
#[derive(Debug, Error)]
#[error("dispatcher is shut down")]
pub struct DispatcherClosed;

/// One unit of concurrency budget for an in-flight fetch
///
/// Dropping the permit releases the slot and updates the monitor.
pub struct DispatchPermit {
    _permit: OwnedSemaphorePermit,
    monitor: Option<Arc<Monitor>>,
}

impl Drop for DispatchPermit {
    fn drop(&mut self) {
        if let Some(monitor) = &self.monitor {
            monitor.task_finished();
        }
    }
}

/// Concurrency strategy interface
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Suspends until a permit is available (or the dispatcher is closed)
    async fn acquire(&self) -> Result<DispatchPermit, DispatcherClosed>;

    /// Shuts the dispatcher down; pending and future acquisitions fail
    fn close(&self);

    /// The monitor wired into this dispatcher, if any
    fn monitor(&self) -> Option<Arc<Monitor>>;
}

/// Builds the dispatcher selected by the configuration
pub fn build_dispatcher(
    config: &DispatcherConfig,
    monitor: Option<Arc<Monitor>>,
) -> Arc<dyn Dispatcher> {
    match config.kind {
        DispatcherKind::Fixed => Arc::new(FixedDispatcher::new(config.max_concurrent, monitor)),
        DispatcherKind::MemoryAdaptive => Arc::new(MemoryAdaptiveDispatcher::new(
            config.max_concurrent,
            config.memory_threshold_percent,
            Duration::from_millis(config.check_interval_ms),
            Arc::new(SysinfoProbe::new()),
            monitor,
        )),
    }
}

/// Fixed-permit strategy: a plain counting semaphore
pub struct FixedDispatcher {
    semaphore: Arc<Semaphore>,
    monitor: Option<Arc<Monitor>>,
}

impl FixedDispatcher {
    pub fn new(max_permits: u32, monitor: Option<Arc<Monitor>>) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_permits as usize)),
            monitor,
        }
    }
}

#[async_trait]
impl Dispatcher for FixedDispatcher {
    async fn acquire(&self) -> Result<DispatchPermit, DispatcherClosed> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DispatcherClosed)?;

        if let Some(monitor) = &self.monitor {
            monitor.task_started();
        }

        Ok(DispatchPermit {
            _permit: permit,
            monitor: self.monitor.clone(),
        })
    }

    fn close(&self) {
        self.semaphore.close();
    }

    fn monitor(&self) -> Option<Arc<Monitor>> {
        self.monitor.clone()
    }
}

/// Source of process memory utilization readings
///
/// Injectable so tests can script utilization without touching the host.
pub trait MemoryProbe: Send + Sync {
    /// Current memory utilization as a percentage of total (0.0 to 100.0)
    fn usage_percent(&self) -> f64;
}

/// Production probe backed by sysinfo
pub struct SysinfoProbe {
    sys: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let sys = System::new_with_specifics(
            RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
        );
        Self {
            sys: Mutex::new(sys),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn usage_percent(&self) -> f64 {
        let mut sys = self.sys.lock().unwrap();
        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return 0.0;
        }
        sys.used_memory() as f64 / total as f64 * 100.0
    }
}

/// Memory-adaptive strategy: semaphore budget plus a utilization gate
pub struct MemoryAdaptiveDispatcher {
    semaphore: Arc<Semaphore>,
    threshold_percent: f64,
    check_interval: Duration,
    probe: Arc<dyn MemoryProbe>,
    last_reading: Mutex<Option<(Instant, f64)>>,
    monitor: Option<Arc<Monitor>>,
}

impl MemoryAdaptiveDispatcher {
    pub fn new(
        max_permits: u32,
        threshold_percent: f64,
        check_interval: Duration,
        probe: Arc<dyn MemoryProbe>,
        monitor: Option<Arc<Monitor>>,
    ) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_permits as usize)),
            threshold_percent,
            check_interval,
            probe,
            last_reading: Mutex::new(None),
            monitor,
        }
    }

    /// Returns the cached utilization, probing only when the cached value
    /// is older than the check interval
    fn sample(&self) -> f64 {
        let mut last = self.last_reading.lock().unwrap();
        let now = Instant::now();

        if let Some((at, value)) = *last {
            if now.duration_since(at) < self.check_interval {
                return value;
            }
        }

        let value = self.probe.usage_percent();
        *last = Some((now, value));
        value
    }
}

#[async_trait]
impl Dispatcher for MemoryAdaptiveDispatcher {
    async fn acquire(&self) -> Result<DispatchPermit, DispatcherClosed> {
        // The semaphore slot is taken first so active permits stay bounded;
        // the grant itself is withheld until memory shows headroom.
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DispatcherClosed)?;

        loop {
            let usage = self.sample();
            if usage < self.threshold_percent {
                break;
            }

            tracing::debug!(
                "Memory utilization {:.1}% over threshold {:.1}%, holding dispatch",
                usage,
                self.threshold_percent
            );
            tokio::time::sleep(self.check_interval).await;
        }

        if let Some(monitor) = &self.monitor {
            monitor.task_started();
        }

        Ok(DispatchPermit {
            _permit: permit,
            monitor: self.monitor.clone(),
        })
    }

    fn close(&self) {
        self.semaphore.close();
    }

    fn monitor(&self) -> Option<Arc<Monitor>> {
        self.monitor.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    /// Probe returning a scripted utilization value
    struct FakeProbe {
        usage: Mutex<f64>,
    }

    impl FakeProbe {
        fn new(usage: f64) -> Arc<Self> {
            Arc::new(Self {
                usage: Mutex::new(usage),
            })
        }

        fn set(&self, usage: f64) {
            *self.usage.lock().unwrap() = usage;
        }
    }

    impl MemoryProbe for FakeProbe {
        fn usage_percent(&self) -> f64 {
            *self.usage.lock().unwrap()
        }
    }

    #[tokio::test]
    async fn test_fixed_grants_up_to_max() {
        let dispatcher = FixedDispatcher::new(2, None);

        let p1 = dispatcher.acquire().await.unwrap();
        let _p2 = dispatcher.acquire().await.unwrap();

        // Third acquisition must block
        let blocked = timeout(Duration::from_millis(50), dispatcher.acquire()).await;
        assert!(blocked.is_err());

        // Releasing a permit unblocks the next waiter
        drop(p1);
        let granted = timeout(Duration::from_millis(50), dispatcher.acquire()).await;
        assert!(granted.is_ok());
    }

    #[tokio::test]
    async fn test_fixed_close_rejects() {
        let dispatcher = FixedDispatcher::new(1, None);
        dispatcher.close();
        assert!(dispatcher.acquire().await.is_err());
    }

    #[tokio::test]
    async fn test_fixed_updates_monitor() {
        let monitor = Arc::new(Monitor::new());
        let dispatcher = FixedDispatcher::new(2, Some(monitor.clone()));

        let permit = dispatcher.acquire().await.unwrap();
        assert_eq!(monitor.snapshot().active, 1);

        drop(permit);
        let snap = monitor.snapshot();
        assert_eq!(snap.active, 0);
        assert_eq!(snap.completed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_adaptive_withholds_over_threshold() {
        let probe = FakeProbe::new(95.0);
        let dispatcher = MemoryAdaptiveDispatcher::new(
            4,
            90.0,
            Duration::from_millis(100),
            probe.clone(),
            None,
        );

        // Over threshold: no permit granted
        let blocked = timeout(Duration::from_millis(500), dispatcher.acquire()).await;
        assert!(blocked.is_err());

        // Headroom appears: the next tick grants
        probe.set(50.0);
        let granted = timeout(Duration::from_millis(500), dispatcher.acquire()).await;
        assert!(granted.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_adaptive_respects_permit_budget() {
        let probe = FakeProbe::new(10.0);
        let dispatcher = MemoryAdaptiveDispatcher::new(
            1,
            90.0,
            Duration::from_millis(100),
            probe,
            None,
        );

        let _p1 = dispatcher.acquire().await.unwrap();
        let blocked = timeout(Duration::from_millis(500), dispatcher.acquire()).await;
        assert!(blocked.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_adaptive_caches_reading_between_ticks() {
        struct CountingProbe {
            calls: Mutex<u32>,
        }

        impl MemoryProbe for CountingProbe {
            fn usage_percent(&self) -> f64 {
                *self.calls.lock().unwrap() += 1;
                10.0
            }
        }

        let probe = Arc::new(CountingProbe {
            calls: Mutex::new(0),
        });
        let dispatcher = MemoryAdaptiveDispatcher::new(
            8,
            90.0,
            Duration::from_secs(5),
            probe.clone(),
            None,
        );

        // Several immediate acquisitions within one interval share a reading
        let _a = dispatcher.acquire().await.unwrap();
        let _b = dispatcher.acquire().await.unwrap();
        let _c = dispatcher.acquire().await.unwrap();
        assert_eq!(*probe.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_build_dispatcher_kinds() {
        let fixed = build_dispatcher(
            &DispatcherConfig {
                kind: DispatcherKind::Fixed,
                max_concurrent: 3,
                ..Default::default()
            },
            None,
        );
        assert!(fixed.acquire().await.is_ok());

        let adaptive = build_dispatcher(&DispatcherConfig::default(), None);
        assert!(adaptive.monitor().is_none());
    }

    #[test]
    fn test_sysinfo_probe_reads_percentage() {
        let probe = SysinfoProbe::new();
        let usage = probe.usage_percent();
        assert!((0.0..=100.0).contains(&usage));
    }
}
