use std::fmt::Write;

use crate::system::snapshot::{CacheEntry, Fragment, Snapshot};

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn section<T>(entry: &CacheEntry<T>, render: impl FnOnce(&T) -> String) -> String {
    match &entry.fragment {
        Fragment::Available(value) if entry.is_stale() => format!("{} (stale)", render(value)),
        Fragment::Available(value) => render(value),
        Fragment::Unavailable => "n/a".to_string(),
    }
}

/// One-line, human-readable rendering of a snapshot for terminal output.
pub fn summary_line(snapshot: &Snapshot) -> String {
    let cpu = section(&snapshot.cpu_memory, |m| {
        format!(
            "cpu {:.1}% | mem {} / {} ({:.1}%)",
            m.cpu_usage_percent,
            format_bytes(m.mem_used_bytes),
            format_bytes(m.mem_total_bytes),
            m.memory_percent()
        )
    });
    let disk = section(&snapshot.disk, |d| {
        format!(
            "disk {} {} free of {}",
            d.mount_path,
            format_bytes(d.available_bytes),
            format_bytes(d.total_bytes)
        )
    });
    let files = section(&snapshot.folder_counts, |counts| {
        let mut out = String::from("files");
        for (folder, count) in counts {
            let _ = write!(out, " {folder}={count}");
        }
        out
    });
    format!("{cpu} | {disk} | {files}")
}

/// Static host description: OS, kernel, CPU model, graphics and installed memory.
pub fn host_line(snapshot: &Snapshot) -> String {
    let host = section(&snapshot.static_info, |info| {
        format!(
            "{} | kernel {} | {} | {} | {} RAM",
            info.os_name,
            info.kernel_version,
            info.cpu_model,
            info.graphics,
            format_bytes(info.total_memory_bytes)
        )
    });
    format!("host {host}")
}
