use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::delivery::{DeliveryChannel, RefreshTrigger};
use crate::system::collector::Collector;
use crate::system::snapshot::{MetricCategory, Snapshot};

/// Categories re-polled on the fast cadence. The rest change slowly and are
/// sampled at start-up and on demand only.
pub const PERIODIC_CATEGORIES: [MetricCategory; 1] = [MetricCategory::CpuMemory];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Decides when cached data is old enough that a fetch should kick off a
/// refresh outside the normal cadence.
#[derive(Debug, Clone, Copy)]
pub struct RefreshPolicy {
    pub polling_interval: Duration,
}

impl RefreshPolicy {
    pub fn new(polling_interval: Duration) -> Self {
        RefreshPolicy { polling_interval }
    }

    /// CPU/memory is due once its last attempt is two intervals old; disk and
    /// folder counts only while they have never been attempted. Static info is
    /// never due: it has exactly one attempt, made at start-up.
    pub fn due(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<MetricCategory> {
        let grace = chrono::Duration::from_std(self.polling_interval * 2)
            .unwrap_or(chrono::Duration::MAX);
        let mut due = Vec::new();
        match snapshot.cpu_memory.last_attempt_at() {
            Some(at) if now.signed_duration_since(at) <= grace => {}
            _ => due.push(MetricCategory::CpuMemory),
        }
        if snapshot.disk.last_attempt_at().is_none() {
            due.push(MetricCategory::Disk);
        }
        if snapshot.folder_counts.last_attempt_at().is_none() {
            due.push(MetricCategory::FolderCounts);
        }
        due
    }
}

/// Drives the collector: one start-up cycle per category, CPU/memory on a
/// fixed ticker, and on-demand cycles that never touch the ticker.
pub struct Scheduler {
    collector: Arc<Collector>,
    channel: Arc<DeliveryChannel>,
    interval: Duration,
}

#[derive(Default)]
struct Counters {
    active: AtomicUsize,
    completed: AtomicU64,
}

pub struct SchedulerHandle {
    requests: mpsc::UnboundedSender<Vec<MetricCategory>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    counters: Arc<Counters>,
}

impl Scheduler {
    pub fn new(collector: Arc<Collector>, channel: Arc<DeliveryChannel>, interval: Duration) -> Self {
        Scheduler {
            collector,
            channel,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Starts the scheduler on the current tokio runtime.
    ///
    /// Dropping the returned handle stops it, like calling `shutdown`.
    pub fn spawn(self) -> SchedulerHandle {
        let (requests_tx, mut requests_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        self.channel.attach_refresh(RefreshTrigger {
            policy: RefreshPolicy::new(self.interval),
            requests: requests_tx.clone(),
        });
        let counters = Arc::new(Counters::default());

        let Scheduler {
            collector,
            channel,
            interval,
        } = self;
        let task_counters = Arc::clone(&counters);
        let task = tokio::spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "scheduler started");
            let mut cycles = JoinSet::new();
            let spawn_cycle = |cycles: &mut JoinSet<()>, categories: Vec<MetricCategory>| {
                cycles.spawn(run_cycle(
                    Arc::clone(&collector),
                    Arc::clone(&channel),
                    Arc::clone(&task_counters),
                    categories,
                ));
            };

            // Separate cycles so a slow category never holds back the first push.
            for category in MetricCategory::ALL {
                spawn_cycle(&mut cycles, vec![category]);
            }

            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => spawn_cycle(&mut cycles, PERIODIC_CATEGORIES.to_vec()),
                    Some(categories) = requests_rx.recv() => {
                        debug!(?categories, "on-demand refresh");
                        spawn_cycle(&mut cycles, categories);
                    }
                    Some(_) = cycles.join_next(), if !cycles.is_empty() => {}
                }
            }

            cycles.abort_all();
            while cycles.join_next().await.is_some() {}
            task_counters.active.store(0, Ordering::Release);
            info!("scheduler stopped");
        });

        SchedulerHandle {
            requests: requests_tx,
            shutdown: Some(shutdown_tx),
            task,
            counters,
        }
    }
}

async fn run_cycle(
    collector: Arc<Collector>,
    channel: Arc<DeliveryChannel>,
    counters: Arc<Counters>,
    categories: Vec<MetricCategory>,
) {
    counters.active.fetch_add(1, Ordering::AcqRel);
    let report = collector.collect(&categories).await;
    if report.ran() {
        let notified = channel.publish();
        debug!(notified, "snapshot published");
    }
    counters.active.fetch_sub(1, Ordering::AcqRel);
    counters.completed.fetch_add(1, Ordering::AcqRel);
}

impl SchedulerHandle {
    /// Asks for an immediate collection of `categories` without resetting
    /// the periodic ticker.
    pub fn request_refresh(&self, categories: &[MetricCategory]) {
        if self.requests.send(categories.to_vec()).is_err() {
            debug!("scheduler already stopped, refresh request dropped");
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.counters.active.load(Ordering::Acquire) > 0 {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    /// Number of collection cycles that have finished, of any kind.
    pub fn cycles_completed(&self) -> u64 {
        self.counters.completed.load(Ordering::Acquire)
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(err) = self.task.await {
            debug!(error = %err, "scheduler task ended abnormally");
        }
    }
}
