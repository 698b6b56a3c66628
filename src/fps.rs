//! Windowed frame-rate estimation shared by the capture and perception loops.

use std::time::Instant;

/// Window used when a device reports an unusable nominal rate.
pub const DEFAULT_FPS_WINDOW: u32 = 30;

/// Sanitise a device-reported rate into a usable window length.
pub fn window_for_rate(reported_fps: f64) -> u32 {
    if reported_fps.is_finite() && reported_fps >= 1.0 {
        reported_fps as u32
    } else {
        DEFAULT_FPS_WINDOW
    }
}

/// Counts frames and yields a rate each time `window` frames have been seen.
///
/// Between window boundaries no estimate is produced, so the published figure
/// lags by at most one window.
#[derive(Clone, Debug)]
pub struct FpsEstimator {
    frame_count: u32,
    window_start: Instant,
}

impl FpsEstimator {
    pub fn new(start: Instant) -> Self {
        Self {
            frame_count: 0,
            window_start: start,
        }
    }

    /// Record one frame at `now`. Returns the rate when the window closes.
    ///
    /// A zero window never closes.
    pub fn tick(&mut self, window: u32, now: Instant) -> Option<f64> {
        self.frame_count = self.frame_count.saturating_add(1);
        if window == 0 || self.frame_count % window != 0 {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.window_start).as_secs_f64();
        let fps = if elapsed > 0.0 {
            self.frame_count as f64 / elapsed
        } else {
            f64::INFINITY
        };
        self.frame_count = 0;
        self.window_start = now;
        Some(fps)
    }

    pub fn frames_in_window(&self) -> u32 {
        self.frame_count
    }
}
