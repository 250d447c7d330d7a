use std::time::Duration;

/// Tunable knobs for the acquisition session. None of these are contractual;
/// the defaults are what works on mid-range phone cameras.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Delay between detection attempts.
    pub poll_interval: Duration,

    /// Upper bound for a single grab-and-decode attempt before it is
    /// abandoned and the next tick runs.
    pub attempt_timeout: Duration,

    /// Requested capture resolution. The device may negotiate down.
    pub target_width: u32,
    pub target_height: u32,

    /// Digital zoom applied at start when the track supports it, capped at
    /// the device maximum.
    pub default_zoom: f64,

    /// Settle time between a single-shot refocus and the return to
    /// continuous autofocus.
    pub focus_settle: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(160),
            attempt_timeout: Duration::from_secs(5),
            target_width: 1920,
            target_height: 1080,
            default_zoom: 2.0,
            focus_settle: Duration::from_millis(120),
        }
    }
}
