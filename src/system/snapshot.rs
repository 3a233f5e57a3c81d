use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::MetricError;

/// Independently sampled and cached metric groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    CpuMemory,
    Disk,
    FolderCounts,
    StaticSystemInfo,
}

impl MetricCategory {
    pub const ALL: [MetricCategory; 4] = [
        MetricCategory::CpuMemory,
        MetricCategory::Disk,
        MetricCategory::FolderCounts,
        MetricCategory::StaticSystemInfo,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MetricCategory::CpuMemory => "cpu_memory",
            MetricCategory::Disk => "disk",
            MetricCategory::FolderCounts => "folder_counts",
            MetricCategory::StaticSystemInfo => "static_system_info",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            MetricCategory::CpuMemory => 0,
            MetricCategory::Disk => 1,
            MetricCategory::FolderCounts => 2,
            MetricCategory::StaticSystemInfo => 3,
        }
    }
}

impl fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuMemory {
    pub cpu_usage_percent: f32,
    pub mem_total_bytes: u64,
    pub mem_used_bytes: u64,
}

impl CpuMemory {
    /// Clamps CPU usage into `0..=100`; NaN readings become 0.
    pub fn new(cpu_usage_percent: f32, mem_total_bytes: u64, mem_used_bytes: u64) -> Self {
        let cpu_usage_percent = if cpu_usage_percent.is_nan() {
            0.0
        } else {
            cpu_usage_percent.clamp(0.0, 100.0)
        };
        CpuMemory {
            cpu_usage_percent,
            mem_total_bytes,
            mem_used_bytes,
        }
    }

    pub fn memory_percent(&self) -> f64 {
        if self.mem_total_bytes == 0 {
            return 0.0;
        }
        self.mem_used_bytes as f64 / self.mem_total_bytes as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub mount_path: String,
}

impl DiskUsage {
    pub fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.total_bytes as f64 * 100.0
    }
}

/// Regular-file counts keyed by folder name, in name order.
pub type FolderCounts = BTreeMap<String, u64>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaticInfo {
    pub os_name: String,
    pub kernel_version: String,
    pub cpu_model: String,
    pub graphics: String,
    pub total_memory_bytes: u64,
}

/// A category's value, or the sentinel for "never sampled successfully".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Fragment<T> {
    Available(T),
    Unavailable,
}

impl<T> Fragment<T> {
    pub fn as_available(&self) -> Option<&T> {
        match self {
            Fragment::Available(value) => Some(value),
            Fragment::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Fragment::Available(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry<T> {
    pub fragment: Fragment<T>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl<T> CacheEntry<T> {
    pub fn unavailable() -> Self {
        CacheEntry {
            fragment: Fragment::Unavailable,
            last_success_at: None,
            last_error_at: None,
            last_error: None,
        }
    }

    /// True when the most recent attempt failed, so the shown value is older
    /// than the latest poll.
    pub fn is_stale(&self) -> bool {
        match (self.last_success_at, self.last_error_at) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(ok), Some(err)) => err > ok,
        }
    }

    /// Time of the most recent attempt, successful or not.
    pub fn last_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.last_success_at.max(self.last_error_at)
    }

    pub(crate) fn record(&mut self, result: Result<T, MetricError>, at: DateTime<Utc>) {
        match result {
            Ok(value) => {
                self.fragment = Fragment::Available(value);
                self.last_success_at = Some(at);
            }
            Err(err) => {
                self.last_error_at = Some(at);
                self.last_error = Some(err.to_string());
            }
        }
    }
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self::unavailable()
    }
}

/// Fully populated view of every category at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub cpu_memory: CacheEntry<CpuMemory>,
    pub disk: CacheEntry<DiskUsage>,
    pub folder_counts: CacheEntry<FolderCounts>,
    pub static_info: CacheEntry<StaticInfo>,
    pub captured_at: DateTime<Utc>,
}

/// The result of one sub-query, tagged with the category it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryUpdate {
    CpuMemory(Result<CpuMemory, MetricError>),
    Disk(Result<DiskUsage, MetricError>),
    FolderCounts(Result<FolderCounts, MetricError>),
    StaticSystemInfo(Result<StaticInfo, MetricError>),
}

impl CategoryUpdate {
    pub fn category(&self) -> MetricCategory {
        match self {
            CategoryUpdate::CpuMemory(_) => MetricCategory::CpuMemory,
            CategoryUpdate::Disk(_) => MetricCategory::Disk,
            CategoryUpdate::FolderCounts(_) => MetricCategory::FolderCounts,
            CategoryUpdate::StaticSystemInfo(_) => MetricCategory::StaticSystemInfo,
        }
    }

    pub fn error(&self) -> Option<&MetricError> {
        match self {
            CategoryUpdate::CpuMemory(r) => r.as_ref().err(),
            CategoryUpdate::Disk(r) => r.as_ref().err(),
            CategoryUpdate::FolderCounts(r) => r.as_ref().err(),
            CategoryUpdate::StaticSystemInfo(r) => r.as_ref().err(),
        }
    }

    /// Builds the failure variant for `category`.
    pub fn failed(category: MetricCategory, err: MetricError) -> Self {
        match category {
            MetricCategory::CpuMemory => CategoryUpdate::CpuMemory(Err(err)),
            MetricCategory::Disk => CategoryUpdate::Disk(Err(err)),
            MetricCategory::FolderCounts => CategoryUpdate::FolderCounts(Err(err)),
            MetricCategory::StaticSystemInfo => CategoryUpdate::StaticSystemInfo(Err(err)),
        }
    }
}
