use super::PlatformExtensions;

pub struct Platform;

impl PlatformExtensions for Platform {
    fn graphics_adapter() -> Option<String> {
        None
    }
}
