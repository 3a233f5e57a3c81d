use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};

use super::snapshot::{CacheEntry, CategoryUpdate, MetricCategory, Snapshot};

/// Latest known-good value per category.
///
/// The collector is the only writer; every write replaces one category's
/// entry under the lock, so readers never see a half-applied fragment.
#[derive(Debug)]
pub struct SnapshotCache {
    state: RwLock<CacheState>,
}

#[derive(Debug)]
struct CacheState {
    snapshot: Snapshot,
    static_settled: bool,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::created_at(Utc::now())
    }

    pub fn created_at(at: DateTime<Utc>) -> Self {
        SnapshotCache {
            state: RwLock::new(CacheState {
                snapshot: Snapshot {
                    cpu_memory: CacheEntry::unavailable(),
                    disk: CacheEntry::unavailable(),
                    folder_counts: CacheEntry::unavailable(),
                    static_info: CacheEntry::unavailable(),
                    captured_at: at,
                },
                static_settled: false,
            }),
        }
    }

    pub fn apply_update(&self, update: CategoryUpdate) {
        self.apply_update_at(update, Utc::now());
    }

    /// Records one sub-query outcome.
    ///
    /// Success replaces the fragment; failure only stamps the error fields.
    /// The static-info entry accepts exactly one outcome for the process
    /// lifetime and ignores anything after it.
    pub fn apply_update_at(&self, update: CategoryUpdate, at: DateTime<Utc>) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if update.category() == MetricCategory::StaticSystemInfo {
            if state.static_settled {
                return;
            }
            state.static_settled = true;
        }

        let snapshot = &mut state.snapshot;
        match update {
            CategoryUpdate::CpuMemory(result) => snapshot.cpu_memory.record(result, at),
            CategoryUpdate::Disk(result) => snapshot.disk.record(result, at),
            CategoryUpdate::FolderCounts(result) => snapshot.folder_counts.record(result, at),
            CategoryUpdate::StaticSystemInfo(result) => snapshot.static_info.record(result, at),
        }
        snapshot.captured_at = at;
    }

    pub fn read_current(&self) -> Snapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot
            .clone()
    }

    pub fn static_settled(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .static_settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetricError;
    use crate::system::snapshot::{CpuMemory, DiskUsage, Fragment, StaticInfo};
    use proptest::prelude::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    fn disk(used: u64) -> DiskUsage {
        DiskUsage {
            total_bytes: 1000,
            used_bytes: used,
            available_bytes: 1000 - used,
            mount_path: "/".to_string(),
        }
    }

    fn host_failure() -> MetricError {
        MetricError::HostQueryFailure("mount vanished".to_string())
    }

    #[test]
    fn fresh_cache_is_fully_populated_with_sentinels() {
        let cache = SnapshotCache::created_at(ts(10));
        let snap = cache.read_current();
        assert_eq!(snap.cpu_memory.fragment, Fragment::Unavailable);
        assert_eq!(snap.disk.fragment, Fragment::Unavailable);
        assert_eq!(snap.folder_counts.fragment, Fragment::Unavailable);
        assert_eq!(snap.static_info.fragment, Fragment::Unavailable);
        assert_eq!(snap.captured_at, ts(10));
    }

    #[test]
    fn failure_before_success_stays_unavailable() {
        let cache = SnapshotCache::created_at(ts(0));
        cache.apply_update_at(CategoryUpdate::Disk(Err(host_failure())), ts(1));
        let snap = cache.read_current();
        assert_eq!(snap.disk.fragment, Fragment::Unavailable);
        assert_eq!(snap.disk.last_error_at, Some(ts(1)));
        assert!(snap.disk.is_stale());
    }

    #[test]
    fn failures_retain_last_good_disk_sample() {
        let cache = SnapshotCache::created_at(ts(0));
        cache.apply_update_at(CategoryUpdate::Disk(Ok(disk(400))), ts(1));
        for i in 0..5 {
            cache.apply_update_at(CategoryUpdate::Disk(Err(host_failure())), ts(2 + i));
            let snap = cache.read_current();
            assert_eq!(snap.disk.fragment, Fragment::Available(disk(400)));
            assert_eq!(snap.disk.last_success_at, Some(ts(1)));
        }
    }

    #[test]
    fn success_after_failure_keeps_error_timestamp_for_diagnostics() {
        let cache = SnapshotCache::created_at(ts(0));
        cache.apply_update_at(
            CategoryUpdate::CpuMemory(Err(MetricError::Timeout(
                std::time::Duration::from_secs(5),
            ))),
            ts(1),
        );
        cache.apply_update_at(
            CategoryUpdate::CpuMemory(Ok(CpuMemory::new(12.0, 100, 40))),
            ts(2),
        );
        let snap = cache.read_current();
        assert!(snap.cpu_memory.fragment.is_available());
        assert_eq!(snap.cpu_memory.last_error_at, Some(ts(1)));
        assert!(!snap.cpu_memory.is_stale());
    }

    #[test]
    fn updates_only_touch_their_own_category() {
        let cache = SnapshotCache::created_at(ts(0));
        cache.apply_update_at(
            CategoryUpdate::CpuMemory(Ok(CpuMemory::new(50.0, 100, 10))),
            ts(1),
        );
        cache.apply_update_at(CategoryUpdate::Disk(Err(host_failure())), ts(2));
        let snap = cache.read_current();
        assert_eq!(snap.cpu_memory.last_error_at, None);
        assert_eq!(snap.cpu_memory.last_success_at, Some(ts(1)));
        assert_eq!(snap.captured_at, ts(2));
    }

    #[test]
    fn static_info_accepts_a_single_outcome() {
        let cache = SnapshotCache::created_at(ts(0));
        cache.apply_update_at(
            CategoryUpdate::StaticSystemInfo(Err(MetricError::UnsupportedPlatform("static"))),
            ts(1),
        );
        assert!(cache.static_settled());
        cache.apply_update_at(
            CategoryUpdate::StaticSystemInfo(Ok(StaticInfo {
                os_name: "Linux".to_string(),
                kernel_version: "6.1".to_string(),
                cpu_model: "cpu".to_string(),
                graphics: "gpu".to_string(),
                total_memory_bytes: 1,
            })),
            ts(2),
        );
        let snap = cache.read_current();
        assert_eq!(snap.static_info.fragment, Fragment::Unavailable);
        assert_eq!(snap.captured_at, ts(1));
    }

    #[test]
    fn reads_between_writes_are_identical() {
        let cache = SnapshotCache::created_at(ts(0));
        cache.apply_update_at(CategoryUpdate::Disk(Ok(disk(1))), ts(1));
        let a = serde_json::to_string(&cache.read_current()).unwrap();
        let b = serde_json::to_string(&cache.read_current()).unwrap();
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn fragment_is_last_success_for_any_outcome_sequence(
            outcomes in proptest::collection::vec(proptest::option::of(0u64..1000), 1..40)
        ) {
            let cache = SnapshotCache::created_at(ts(0));
            let mut expected = Fragment::Unavailable;
            for (i, outcome) in outcomes.iter().enumerate() {
                let at = ts(i as i64 + 1);
                match outcome {
                    Some(used) => {
                        cache.apply_update_at(CategoryUpdate::Disk(Ok(disk(*used))), at);
                        expected = Fragment::Available(disk(*used));
                    }
                    None => cache.apply_update_at(CategoryUpdate::Disk(Err(host_failure())), at),
                }
                prop_assert_eq!(&cache.read_current().disk.fragment, &expected);
            }
        }
    }
}
