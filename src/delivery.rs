use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::scheduler::RefreshPolicy;
use crate::system::cache::SnapshotCache;
use crate::system::snapshot::{
    CacheEntry, CpuMemory, DiskUsage, FolderCounts, MetricCategory, Snapshot, StaticInfo,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTarget {
    All,
    Category(MetricCategory),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Fetched {
    All(Snapshot),
    CpuMemory(CacheEntry<CpuMemory>),
    Disk(CacheEntry<DiskUsage>),
    FolderCounts(CacheEntry<FolderCounts>),
    StaticSystemInfo(CacheEntry<StaticInfo>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Receives one snapshot per completed collection cycle, in order.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::UnboundedReceiver<Arc<Snapshot>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Waits for the next snapshot; `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<Arc<Snapshot>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<Snapshot>> {
        self.receiver.try_recv().ok()
    }
}

type Subscribers = Vec<(SubscriberId, mpsc::UnboundedSender<Arc<Snapshot>>)>;

pub(crate) struct RefreshTrigger {
    pub(crate) policy: RefreshPolicy,
    pub(crate) requests: mpsc::UnboundedSender<Vec<MetricCategory>>,
}

/// Consumer-facing side of the pipeline.
///
/// `fetch` answers from the cache without waiting on any host query;
/// subscribers get the same assembled snapshot pushed after each cycle.
pub struct DeliveryChannel {
    cache: Arc<SnapshotCache>,
    subscribers: Mutex<Subscribers>,
    next_id: AtomicU64,
    refresh: OnceLock<RefreshTrigger>,
}

impl DeliveryChannel {
    pub fn new(cache: Arc<SnapshotCache>) -> Self {
        DeliveryChannel {
            cache,
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            refresh: OnceLock::new(),
        }
    }

    /// Lets `fetch` ask for a background refresh when `policy` says one is due.
    /// Only the first attached trigger is kept.
    pub(crate) fn attach_refresh(&self, trigger: RefreshTrigger) {
        if self.refresh.set(trigger).is_err() {
            debug!("refresh trigger already attached, ignoring");
        }
    }

    pub fn fetch(&self, target: FetchTarget) -> Fetched {
        let snapshot = self.cache.read_current();
        self.request_refresh_if_due(&snapshot, target);
        match target {
            FetchTarget::All => Fetched::All(snapshot),
            FetchTarget::Category(MetricCategory::CpuMemory) => {
                Fetched::CpuMemory(snapshot.cpu_memory)
            }
            FetchTarget::Category(MetricCategory::Disk) => Fetched::Disk(snapshot.disk),
            FetchTarget::Category(MetricCategory::FolderCounts) => {
                Fetched::FolderCounts(snapshot.folder_counts)
            }
            FetchTarget::Category(MetricCategory::StaticSystemInfo) => {
                Fetched::StaticSystemInfo(snapshot.static_info)
            }
        }
    }

    fn request_refresh_if_due(&self, snapshot: &Snapshot, target: FetchTarget) {
        let Some(trigger) = self.refresh.get() else {
            return;
        };
        let mut due = trigger.policy.due(snapshot, Utc::now());
        if let FetchTarget::Category(category) = target {
            due.retain(|c| *c == category);
        }
        if !due.is_empty() {
            debug!(?due, "fetch found stale data, requesting refresh");
            // Scheduler gone means the process is shutting down.
            let _ = trigger.requests.send(due);
        }
    }

    /// Registers a push subscriber.
    ///
    /// The queue is unbounded so every cycle reaches the subscriber in order.
    /// A subscriber that stays alive without reading keeps one `Arc<Snapshot>`
    /// per cycle queued; drop the `Subscription` or call `unsubscribe` to
    /// release the backlog.
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock_subscribers().push((id, tx));
        debug!(%id, "subscriber added");
        Subscription { id, receiver: rx }
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.lock_subscribers();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        before != subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    /// Pushes the current snapshot to every subscriber, dropping those whose
    /// receiver is gone. Returns how many were notified.
    pub fn publish(&self) -> usize {
        let snapshot = Arc::new(self.cache.read_current());
        let mut subscribers = self.lock_subscribers();
        subscribers.retain(|(id, tx)| {
            let delivered = tx.send(Arc::clone(&snapshot)).is_ok();
            if !delivered {
                debug!(%id, "subscriber went away, pruning");
            }
            delivered
        });
        subscribers.len()
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Subscribers> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
