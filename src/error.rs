use std::time::Duration;

use thiserror::Error;

/// Reasons a single metric sub-query can fail.
///
/// These never escape the collector: each one is recorded against the
/// category that produced it and the previous good value stays visible.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricError {
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("host query failed: {0}")]
    HostQueryFailure(String),

    #[error("not supported on this platform: {0}")]
    UnsupportedPlatform(&'static str),
}

impl From<std::io::Error> for MetricError {
    fn from(err: std::io::Error) -> Self {
        MetricError::HostQueryFailure(err.to_string())
    }
}
