//! Synthetic camera for `stub://` devices.
//!
//! Produces a grey gradient with a solid coloured marker square, so the whole
//! pipeline (marker detector, controller, diagnostics) can run without hardware.
//! An optional frame limit makes the device fail after N frames, which is how
//! tests exercise the mid-stream failure path.

use anyhow::Result;
use std::time::{Duration, Instant};

use super::CaptureDevice;
use crate::fault::DeviceFault;
use crate::frame::{expected_len, RGB_CHANNELS};

/// Where the marker is drawn in each frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MarkerMotion {
    /// No marker: every frame is background only.
    Hidden,
    /// Marker centred at a fixed pixel position.
    Fixed { x: u32, y: u32 },
    /// Fixed marker for the first `after_frames` frames, then gone for good.
    Vanishing { x: u32, y: u32, after_frames: u64 },
    /// Marker circles the frame centre, one revolution per `period_frames`.
    Orbit { radius: u32, period_frames: u32 },
}

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Reported and paced frame rate. Zero disables pacing (frames as fast as read).
    pub fps: u32,
    pub marker_color: [u8; 3],
    pub marker_size: u32,
    pub motion: MarkerMotion,
    /// Fail the read after this many frames.
    pub frame_limit: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            name: "stub://camera".to_string(),
            width: 640,
            height: 480,
            fps: 30,
            marker_color: [255, 0, 0],
            marker_size: 48,
            motion: MarkerMotion::Orbit {
                radius: 150,
                period_frames: 300,
            },
            frame_limit: None,
        }
    }
}

pub struct SyntheticCamera {
    config: SyntheticConfig,
    frame_count: u64,
    next_deadline: Option<Instant>,
    released: bool,
}

impl SyntheticCamera {
    pub fn new(config: SyntheticConfig) -> Self {
        log::info!(
            "SyntheticCamera: opened {} ({}x{} @ {} fps)",
            config.name,
            config.width,
            config.height,
            config.fps
        );
        Self {
            config,
            frame_count: 0,
            next_deadline: None,
            released: false,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    /// Marker centre for the frame with the given sequence number.
    pub fn marker_center(&self, sequence: u64) -> Option<(u32, u32)> {
        let (cx, cy) = (self.config.width / 2, self.config.height / 2);
        match self.config.motion {
            MarkerMotion::Hidden => None,
            MarkerMotion::Fixed { x, y } => Some((x, y)),
            MarkerMotion::Vanishing { x, y, after_frames } => {
                (sequence <= after_frames).then_some((x, y))
            }
            MarkerMotion::Orbit {
                radius,
                period_frames,
            } => {
                let period = period_frames.max(1) as f64;
                let phase = (sequence % period_frames.max(1) as u64) as f64 / period;
                let angle = phase * std::f64::consts::TAU;
                let x = cx as f64 + radius as f64 * angle.cos();
                let y = cy as f64 + radius as f64 * angle.sin();
                Some((
                    x.clamp(0.0, (self.config.width - 1) as f64) as u32,
                    y.clamp(0.0, (self.config.height - 1) as f64) as u32,
                ))
            }
        }
    }

    fn pace(&mut self) {
        if self.config.fps == 0 {
            return;
        }
        let interval = Duration::from_secs_f64(1.0 / self.config.fps as f64);
        let now = Instant::now();
        let deadline = self.next_deadline.unwrap_or(now);
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        self.next_deadline = Some(deadline.max(now) + interval);
    }

    fn render(&self, sequence: u64) -> Result<Vec<u8>> {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let mut pixels = vec![0u8; expected_len(self.config.width, self.config.height)?];

        for y in 0..height {
            for x in 0..width {
                // Grey ramp between 40 and 140: far from any saturated marker colour.
                let v = (40 + (x + y) * 100 / (width + height).max(1)) as u8;
                let idx = (y * width + x) * RGB_CHANNELS;
                pixels[idx..idx + RGB_CHANNELS].copy_from_slice(&[v, v, v]);
            }
        }

        if let Some((mx, my)) = self.marker_center(sequence) {
            let half = self.config.marker_size / 2;
            let x0 = mx.saturating_sub(half) as usize;
            let y0 = my.saturating_sub(half) as usize;
            let x1 = ((mx + half) as usize).min(width);
            let y1 = ((my + half) as usize).min(height);
            for y in y0..y1 {
                for x in x0..x1 {
                    let idx = (y * width + x) * RGB_CHANNELS;
                    pixels[idx..idx + RGB_CHANNELS].copy_from_slice(&self.config.marker_color);
                }
            }
        }

        Ok(pixels)
    }
}

impl CaptureDevice for SyntheticCamera {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn reported_fps(&self) -> f64 {
        self.config.fps as f64
    }

    fn read_frame(&mut self) -> Result<Vec<u8>> {
        if self.released {
            return Err(DeviceFault::new(&self.config.name, "device released").into());
        }
        if let Some(limit) = self.config.frame_limit {
            if self.frame_count >= limit {
                return Err(DeviceFault::new(
                    &self.config.name,
                    format!("stream ended after {} frames", limit),
                )
                .into());
            }
        }
        self.pace();
        self.frame_count += 1;
        self.render(self.frame_count)
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            log::info!("SyntheticCamera: released {}", self.config.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(motion: MarkerMotion) -> SyntheticConfig {
        SyntheticConfig {
            name: "stub://test".to_string(),
            width: 64,
            height: 48,
            fps: 0,
            marker_size: 8,
            motion,
            ..SyntheticConfig::default()
        }
    }

    #[test]
    fn fixed_marker_is_drawn_at_requested_position() -> Result<()> {
        let mut camera = SyntheticCamera::new(config(MarkerMotion::Fixed { x: 20, y: 10 }));
        let pixels = camera.read_frame()?;
        let at = |x: usize, y: usize| {
            let idx = (y * 64 + x) * RGB_CHANNELS;
            [pixels[idx], pixels[idx + 1], pixels[idx + 2]]
        };
        assert_eq!(at(20, 10), [255, 0, 0]);
        assert_eq!(at(16, 6), [255, 0, 0]);
        assert_ne!(at(40, 40), [255, 0, 0]);
        Ok(())
    }

    #[test]
    fn orbit_stays_inside_frame() {
        let camera = SyntheticCamera::new(SyntheticConfig {
            motion: MarkerMotion::Orbit {
                radius: 500,
                period_frames: 8,
            },
            ..config(MarkerMotion::Hidden)
        });
        for seq in 0..16 {
            let (x, y) = camera.marker_center(seq).expect("orbit has a marker");
            assert!(x < 64 && y < 48);
        }
    }

    #[test]
    fn vanishing_marker_disappears_after_its_frames() {
        let camera = SyntheticCamera::new(config(MarkerMotion::Vanishing {
            x: 20,
            y: 10,
            after_frames: 3,
        }));
        assert_eq!(camera.marker_center(1), Some((20, 10)));
        assert_eq!(camera.marker_center(3), Some((20, 10)));
        assert_eq!(camera.marker_center(4), None);
        assert_eq!(camera.marker_center(100), None);
    }

    #[test]
    fn frame_limit_turns_into_device_fault() -> Result<()> {
        let mut camera = SyntheticCamera::new(SyntheticConfig {
            frame_limit: Some(2),
            ..config(MarkerMotion::Hidden)
        });
        camera.read_frame()?;
        camera.read_frame()?;
        let err = camera.read_frame().unwrap_err();
        assert!(crate::fault::is_device_fault(&err));
        assert_eq!(camera.frames_captured(), 2);
        Ok(())
    }

    #[test]
    fn released_camera_refuses_reads() {
        let mut camera = SyntheticCamera::new(config(MarkerMotion::Hidden));
        camera.release();
        camera.release();
        assert!(camera.read_frame().is_err());
    }
}
