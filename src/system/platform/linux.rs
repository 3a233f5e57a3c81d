use std::fs;
use std::path::Path;

use super::{PlatformExtensions, field_after};

pub struct Platform;

impl PlatformExtensions for Platform {
    fn graphics_adapter() -> Option<String> {
        nvidia_model().or_else(drm_adapter)
    }
}

/// The proprietary NVIDIA driver publishes a readable model name.
fn nvidia_model() -> Option<String> {
    let gpus = fs::read_dir("/proc/driver/nvidia/gpus").ok()?;
    gpus.flatten().find_map(|gpu| {
        let info = fs::read_to_string(gpu.path().join("information")).ok()?;
        field_after(&info, "Model:").map(str::to_string)
    })
}

/// Falls back to the kernel driver name and PCI id of the first DRM card.
fn drm_adapter() -> Option<String> {
    let mut cards: Vec<_> = fs::read_dir("/sys/class/drm")
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("card") && !n.contains('-'))
        })
        .collect();
    cards.sort();
    cards.iter().find_map(|card| describe_card(card))
}

fn describe_card(card: &Path) -> Option<String> {
    // uevent lines look like "DRIVER=i915" and "PCI_ID=8086:9A49"
    let uevent = fs::read_to_string(card.join("device").join("uevent")).ok()?;
    let driver = field_after(&uevent, "DRIVER=")?;
    Some(match field_after(&uevent, "PCI_ID=") {
        Some(pci_id) => format!("{driver} ({pci_id})"),
        None => driver.to_string(),
    })
}
