use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use super::cache::SnapshotCache;
use super::provider::MetricsProvider;
use super::snapshot::{CategoryUpdate, MetricCategory};
use crate::config::Config;
use crate::error::MetricError;

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub query_timeout: Duration,
    pub folders: Vec<String>,
    pub mount_index: usize,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl CollectorSettings {
    pub fn from_config(config: &Config) -> Self {
        CollectorSettings {
            query_timeout: config.general.query_timeout(),
            folders: config.folders.monitored.clone(),
            mount_index: config.disk.mount_index,
        }
    }
}

/// Outcome of one `collect` call, per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub succeeded: Vec<MetricCategory>,
    pub failed: Vec<(MetricCategory, MetricError)>,
    /// Already in flight, or static info that was already collected.
    pub skipped: Vec<MetricCategory>,
}

impl CycleReport {
    pub fn ran(&self) -> bool {
        !self.succeeded.is_empty() || !self.failed.is_empty()
    }
}

pub struct Collector {
    provider: Arc<dyn MetricsProvider>,
    cache: Arc<SnapshotCache>,
    query_timeout: Duration,
    folders: Arc<[String]>,
    mount_index: usize,
    static_requested: AtomicBool,
    slots: [Arc<QuerySlot>; 4],
}

/// Per-category query state. `running` stays set until the host call itself
/// returns, even when the cycle that started it has given up waiting.
#[derive(Default)]
struct QuerySlot {
    running: AtomicBool,
    abandoned: AtomicBool,
}

/// Owned by the blocking closure; clears the slot once the host call returns.
struct InFlight(Arc<QuerySlot>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.abandoned.store(false, Ordering::Release);
        self.0.running.store(false, Ordering::Release);
    }
}

impl Collector {
    pub fn new(
        provider: Arc<dyn MetricsProvider>,
        cache: Arc<SnapshotCache>,
        settings: CollectorSettings,
    ) -> Self {
        Collector {
            provider,
            cache,
            query_timeout: settings.query_timeout,
            folders: settings.folders.into(),
            mount_index: settings.mount_index,
            static_requested: AtomicBool::new(false),
            slots: Default::default(),
        }
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Queries the requested categories concurrently.
    ///
    /// Each result is written to the cache as soon as its own query settles,
    /// so a slow or failing category never holds back the others. A category
    /// whose previous query is still running is skipped rather than queued.
    /// If that query was already abandoned after a timeout, the category is
    /// recorded as timed out again instead of piling up another host call.
    pub async fn collect(&self, categories: &[MetricCategory]) -> CycleReport {
        let mut requested = categories.to_vec();
        requested.sort();
        requested.dedup();

        let mut report = CycleReport::default();
        let mut claimed = Vec::with_capacity(requested.len());
        for category in requested {
            if category == MetricCategory::StaticSystemInfo
                && self.static_requested.swap(true, Ordering::AcqRel)
            {
                report.skipped.push(category);
                continue;
            }
            let slot = &self.slots[category.index()];
            if slot.running.swap(true, Ordering::AcqRel) {
                if slot.abandoned.load(Ordering::Acquire) {
                    let err = MetricError::Timeout(self.query_timeout);
                    warn!(%category, "previous query still hung, not starting another");
                    self.cache
                        .apply_update(CategoryUpdate::failed(category, err.clone()));
                    report.failed.push((category, err));
                } else {
                    debug!(%category, "query already in flight, coalescing");
                    report.skipped.push(category);
                }
                continue;
            }
            slot.abandoned.store(false, Ordering::Release);
            claimed.push((category, InFlight(Arc::clone(slot))));
        }

        let outcomes = join_all(
            claimed
                .into_iter()
                .map(|(category, guard)| self.query_and_record(category, guard)),
        )
        .await;

        for (category, error) in outcomes {
            match error {
                Some(err) => report.failed.push((category, err)),
                None => report.succeeded.push(category),
            }
        }
        debug!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "collection cycle finished"
        );
        report
    }

    async fn query_and_record(
        &self,
        category: MetricCategory,
        guard: InFlight,
    ) -> (MetricCategory, Option<MetricError>) {
        let update = self.query(category, guard).await;
        let error = update.error().cloned();
        if let Some(err) = &error {
            warn!(%category, error = %err, "metric query failed, keeping last good value");
        }
        self.cache.apply_update(update);
        (category, error)
    }

    async fn query(&self, category: MetricCategory, guard: InFlight) -> CategoryUpdate {
        let provider = Arc::clone(&self.provider);
        let slot = Arc::clone(&guard.0);
        let mount_index = self.mount_index;
        let folders = Arc::clone(&self.folders);
        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            match category {
                MetricCategory::CpuMemory => {
                    CategoryUpdate::CpuMemory(provider.sample_cpu_and_memory())
                }
                MetricCategory::Disk => CategoryUpdate::Disk(provider.sample_disk(mount_index)),
                MetricCategory::FolderCounts => {
                    CategoryUpdate::FolderCounts(Ok(provider.count_folder_entries(&folders)))
                }
                MetricCategory::StaticSystemInfo => {
                    CategoryUpdate::StaticSystemInfo(provider.sample_static_info())
                }
            }
        });

        // On timeout the join handle is dropped and the blocking call keeps
        // the slot busy until it returns; its result is discarded.
        match tokio::time::timeout(self.query_timeout, task).await {
            Ok(Ok(update)) => update,
            Ok(Err(join_err)) => CategoryUpdate::failed(
                category,
                MetricError::HostQueryFailure(format!("query task failed: {join_err}")),
            ),
            Err(_) => {
                slot.abandoned.store(true, Ordering::Release);
                CategoryUpdate::failed(category, MetricError::Timeout(self.query_timeout))
            }
        }
    }
}
