use serde::Serialize;

use crate::config::Config;

/// How a job moves its file to the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStrategy {
    /// File bytes travel inline in the convert request.
    Direct,
    /// File is first written to object storage through a presigned grant, then converted by key.
    Staged,
}

/// Which server receives the requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Converter,
    Relay,
}

/// Strategy and route decided for one job before any network I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StrategyPlan {
    pub strategy: UploadStrategy,
    pub route: Route,
}

/// Staged only when the file exceeds the threshold and the converter is reachable directly;
/// everything else goes inline.
pub fn select_strategy(
    file_size_bytes: u64,
    threshold_bytes: u64,
    converter_reachable_directly: bool,
) -> UploadStrategy {
    if converter_reachable_directly && file_size_bytes > threshold_bytes {
        UploadStrategy::Staged
    } else {
        UploadStrategy::Direct
    }
}

impl StrategyPlan {
    pub fn for_size(file_size_bytes: u64, config: &Config) -> Self {
        let direct = config.converter_url().is_some();
        Self {
            strategy: select_strategy(file_size_bytes, config.staging_threshold_bytes(), direct),
            route: if direct { Route::Converter } else { Route::Relay },
        }
    }
}
