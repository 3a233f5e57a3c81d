use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, RefreshKind, System};

use super::platform;
use super::snapshot::{CpuMemory, DiskUsage, FolderCounts, StaticInfo};
use crate::error::MetricError;

/// Host metric queries. Each call is independent and may fail on its own.
///
/// Implementations may block on host I/O; the collector runs every call on
/// the blocking pool and bounds it with a timeout.
pub trait MetricsProvider: Send + Sync + 'static {
    fn sample_cpu_and_memory(&self) -> Result<CpuMemory, MetricError>;

    fn sample_disk(&self, mount_index: usize) -> Result<DiskUsage, MetricError>;

    /// Never fails as a whole: an unreadable folder counts as zero.
    fn count_folder_entries(&self, folders: &[String]) -> FolderCounts;

    fn sample_static_info(&self) -> Result<StaticInfo, MetricError>;
}

/// Counts regular files directly inside `base/<folder>` for each folder.
pub fn count_folder_entries(base: Option<&Path>, folders: &[String]) -> FolderCounts {
    folders
        .iter()
        .map(|folder| {
            let count = base.map_or(0, |base| count_files(&base.join(folder)));
            (folder.clone(), count)
        })
        .collect()
}

fn count_files(dir: &Path) -> u64 {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .flatten()
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .count() as u64,
        Err(err) => {
            tracing::debug!(path = %dir.display(), error = %err, "folder unreadable, counting as 0");
            0
        }
    }
}

pub struct SysinfoProvider {
    sys: Mutex<System>,
    folder_base: Option<PathBuf>,
}

impl Default for SysinfoProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SysinfoProvider {
    /// `folder_base` defaults to the user's home directory.
    pub fn new(folder_base: Option<PathBuf>) -> Self {
        let mut sys = System::new_with_specifics(
            RefreshKind::nothing()
                .with_memory(MemoryRefreshKind::everything())
                .with_cpu(CpuRefreshKind::everything()),
        );
        sys.refresh_memory();
        sys.refresh_cpu_all();
        SysinfoProvider {
            sys: Mutex::new(sys),
            folder_base: folder_base.or_else(dirs::home_dir),
        }
    }

    fn ensure_supported(what: &'static str) -> Result<(), MetricError> {
        if sysinfo::IS_SUPPORTED_SYSTEM {
            Ok(())
        } else {
            Err(MetricError::UnsupportedPlatform(what))
        }
    }
}

impl MetricsProvider for SysinfoProvider {
    fn sample_cpu_and_memory(&self) -> Result<CpuMemory, MetricError> {
        Self::ensure_supported("cpu/memory")?;
        let mut sys = self.sys.lock().unwrap_or_else(PoisonError::into_inner);
        sys.refresh_memory();
        sys.refresh_cpu_usage();
        let total = sys.total_memory();
        if total == 0 {
            return Err(MetricError::HostQueryFailure(
                "host reported zero total memory".to_string(),
            ));
        }
        Ok(CpuMemory::new(sys.global_cpu_usage(), total, sys.used_memory()))
    }

    fn sample_disk(&self, mount_index: usize) -> Result<DiskUsage, MetricError> {
        Self::ensure_supported("disk")?;
        let disks = Disks::new_with_refreshed_list();
        let disk = disks.list().get(mount_index).ok_or_else(|| {
            MetricError::HostQueryFailure(format!(
                "no mounted filesystem at index {mount_index} ({} found)",
                disks.list().len()
            ))
        })?;
        let total = disk.total_space();
        let available = disk.available_space().min(total);
        Ok(DiskUsage {
            total_bytes: total,
            used_bytes: total - available,
            available_bytes: available,
            mount_path: disk.mount_point().display().to_string(),
        })
    }

    fn count_folder_entries(&self, folders: &[String]) -> FolderCounts {
        count_folder_entries(self.folder_base.as_deref(), folders)
    }

    fn sample_static_info(&self) -> Result<StaticInfo, MetricError> {
        Self::ensure_supported("static system info")?;
        let sys = self.sys.lock().unwrap_or_else(PoisonError::into_inner);
        let os_name = System::long_os_version()
            .or_else(System::name)
            .ok_or_else(|| MetricError::HostQueryFailure("os name unavailable".to_string()))?;
        let cpu_model = sys
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(StaticInfo {
            os_name,
            kernel_version: System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
            cpu_model,
            graphics: platform::graphics_adapter().unwrap_or_else(|| "unknown".to_string()),
            total_memory_bytes: sys.total_memory(),
        })
    }
}
