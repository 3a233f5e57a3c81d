use std::process::Command;

use super::{PlatformExtensions, field_after};

pub struct Platform;

impl PlatformExtensions for Platform {
    fn graphics_adapter() -> Option<String> {
        let output = Command::new("system_profiler")
            .arg("SPDisplaysDataType")
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout);
        field_after(&text, "Chipset Model:").map(str::to_string)
    }
}
