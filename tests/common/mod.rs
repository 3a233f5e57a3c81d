#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hostglance::error::MetricError;
use hostglance::system::cache::SnapshotCache;
use hostglance::system::collector::{Collector, CollectorSettings};
use hostglance::system::provider::MetricsProvider;
use hostglance::system::snapshot::{CpuMemory, DiskUsage, FolderCounts, StaticInfo};

pub const GB: u64 = 1024 * 1024 * 1024;

/// Scriptable provider that counts calls per query.
#[derive(Default)]
pub struct FakeProvider {
    pub cpu_calls: AtomicUsize,
    pub disk_calls: AtomicUsize,
    pub folder_calls: AtomicUsize,
    pub static_calls: AtomicUsize,
    pub fail_disk: AtomicBool,
    /// When set, CPU/memory queries block until the sender side is dropped.
    cpu_gate: Mutex<Option<Receiver<()>>>,
    disk_delay: Option<Duration>,
}

impl FakeProvider {
    pub fn with_cpu_gate(mut self, gate: Receiver<()>) -> Self {
        self.cpu_gate = Mutex::new(Some(gate));
        self
    }

    pub fn with_disk_delay(mut self, delay: Duration) -> Self {
        self.disk_delay = Some(delay);
        self
    }

    pub fn failing_disk(self) -> Self {
        self.fail_disk.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_disk_failing(&self, failing: bool) {
        self.fail_disk.store(failing, Ordering::SeqCst);
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// The n-th successful disk sample, starting at 1.
pub fn disk_sample(n: usize) -> DiskUsage {
    let used = n as u64 * GB;
    DiskUsage {
        total_bytes: 500 * GB,
        used_bytes: used,
        available_bytes: 500 * GB - used,
        mount_path: "/".to_string(),
    }
}

pub fn static_sample() -> StaticInfo {
    StaticInfo {
        os_name: "TestOS 1.0".to_string(),
        kernel_version: "6.9.0".to_string(),
        cpu_model: "Fake CPU @ 3.0GHz".to_string(),
        graphics: "Fake GPU".to_string(),
        total_memory_bytes: 16 * GB,
    }
}

impl MetricsProvider for FakeProvider {
    fn sample_cpu_and_memory(&self) -> Result<CpuMemory, MetricError> {
        let n = self.cpu_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = self.cpu_gate.lock().unwrap().as_ref() {
            // Returns once the test drops the sender.
            let _ = gate.recv();
        }
        Ok(CpuMemory::new(n as f32, 16 * GB, n as u64 * GB / 4))
    }

    fn sample_disk(&self, _mount_index: usize) -> Result<DiskUsage, MetricError> {
        let n = self.disk_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.disk_delay {
            std::thread::sleep(delay);
        }
        if self.fail_disk.load(Ordering::SeqCst) {
            return Err(MetricError::HostQueryFailure("disk unplugged".to_string()));
        }
        Ok(disk_sample(n))
    }

    fn count_folder_entries(&self, folders: &[String]) -> FolderCounts {
        self.folder_calls.fetch_add(1, Ordering::SeqCst);
        folders
            .iter()
            .enumerate()
            .map(|(i, f)| (f.clone(), i as u64))
            .collect::<BTreeMap<_, _>>()
    }

    fn sample_static_info(&self) -> Result<StaticInfo, MetricError> {
        self.static_calls.fetch_add(1, Ordering::SeqCst);
        Ok(static_sample())
    }
}

pub fn settings(timeout: Duration) -> CollectorSettings {
    CollectorSettings {
        query_timeout: timeout,
        ..CollectorSettings::default()
    }
}

pub fn collector_with(
    provider: Arc<FakeProvider>,
    timeout: Duration,
) -> (Arc<Collector>, Arc<SnapshotCache>) {
    let cache = Arc::new(SnapshotCache::new());
    let collector = Arc::new(Collector::new(provider, Arc::clone(&cache), settings(timeout)));
    (collector, cache)
}
