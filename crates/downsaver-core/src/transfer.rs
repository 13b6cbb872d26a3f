//! Transfer telemetry: percent, rate and ETA derived from cumulative byte counts.
//!
//! Values are instantaneous (cumulative bytes over cumulative elapsed time since the phase
//! started), not smoothed. Unknown values stay `None` and render as [`PLACEHOLDER`].

use std::time::{Duration, Instant};

use serde::Serialize;

/// Rendered in place of an unknown rate or ETA.
pub const PLACEHOLDER: &str = "--";

/// One derived progress reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferSample {
    pub bytes_loaded: u64,
    pub bytes_total: u64,
    pub percent: u8,
    pub rate_bps: Option<f64>,
    pub eta_seconds: Option<u64>,
    pub elapsed_ms: u64,
}

impl TransferSample {
    /// Pure derivation; identical inputs always give identical samples.
    pub fn compute(bytes_loaded: u64, bytes_total: u64, elapsed: Duration) -> Self {
        let percent = if bytes_total == 0 {
            0
        } else {
            let ratio = bytes_loaded as f64 / bytes_total as f64;
            (ratio * 100.0).round().clamp(0.0, 100.0) as u8
        };

        let elapsed_secs = elapsed.as_secs_f64();
        let rate_bps = (elapsed_secs > 0.0).then(|| bytes_loaded as f64 / elapsed_secs);

        let eta_seconds = rate_bps.filter(|rate| *rate > 0.0).map(|rate| {
            let remaining = bytes_total.saturating_sub(bytes_loaded) as f64;
            (remaining / rate).round().max(0.0) as u64
        });

        Self {
            bytes_loaded,
            bytes_total,
            percent,
            rate_bps,
            eta_seconds,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn rate_display(&self) -> String {
        self.rate_bps
            .map(format_rate)
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }

    pub fn eta_display(&self) -> String {
        self.eta_seconds
            .map(format_duration)
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }
}

/// Progress tracker for one network phase.
#[derive(Debug, Clone)]
pub struct TransferTelemetry {
    phase_started: Instant,
    high_water: u64,
    last: Option<TransferSample>,
}

impl TransferTelemetry {
    pub fn start(now: Instant) -> Self {
        Self {
            phase_started: now,
            high_water: 0,
            last: None,
        }
    }

    /// Record a progress event. A byte count lower than one already seen in this phase is
    /// clamped to the previous maximum.
    pub fn on_progress(
        &mut self,
        bytes_loaded: u64,
        bytes_total: u64,
        now: Instant,
    ) -> TransferSample {
        self.high_water = self.high_water.max(bytes_loaded);
        let elapsed = now.saturating_duration_since(self.phase_started);
        let sample = TransferSample::compute(self.high_water, bytes_total, elapsed);
        self.last = Some(sample.clone());
        sample
    }

    /// Start a new phase from zero.
    pub fn reset(&mut self, now: Instant) {
        *self = Self::start(now);
    }

    pub fn last_sample(&self) -> Option<&TransferSample> {
        self.last.as_ref()
    }
}

/// `512 B/s`, `1.5 KB/s`, `12.3 MB/s`
pub fn format_rate(bps: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    if bps >= MB {
        format!("{:.1} MB/s", bps / MB)
    } else if bps >= KB {
        format!("{:.1} KB/s", bps / KB)
    } else {
        format!("{:.0} B/s", bps)
    }
}

/// `42s`, `1m 05s`, `2h 03m`
pub fn format_duration(secs: u64) -> String {
    if secs >= 3600 {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}
