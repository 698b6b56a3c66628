//! Frame acquisition.
//!
//! This module provides:
//! - `CaptureDevice`: the camera driver boundary (open / read / release / reported fps)
//! - `SyntheticCamera`: generated frames for `stub://` devices (tests, dry runs)
//! - `V4l2Camera`: local USB/V4L2 cameras (feature: ingest-v4l2)
//! - `FrameSource`: owns one device and runs its acquisition thread
//!
//! The device is moved into the acquisition thread on `FrameSource::open` and
//! is never touched from any other thread afterwards.

mod source;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::Result;

pub use source::{FrameReader, FrameSource};
pub use synthetic::{MarkerMotion, SyntheticCamera, SyntheticConfig};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Camera;

use crate::config::CameraSettings;

/// Camera driver boundary.
///
/// Opening happens in the implementation's constructor; an open failure is a
/// `DeviceFault` surfaced to whoever builds the device.
pub trait CaptureDevice: Send {
    /// Human readable device identifier for logs.
    fn name(&self) -> &str;

    /// Negotiated resolution `(width, height)`.
    fn size(&self) -> (u32, u32);

    /// Frame rate reported by the driver. May be zero or garbage.
    fn reported_fps(&self) -> f64;

    /// Block until the next frame and return it as RGB24 at `size()`.
    fn read_frame(&mut self) -> Result<Vec<u8>>;

    /// Release the underlying device. Called once by the acquisition loop.
    fn release(&mut self);
}

/// Open the camera described by `settings`.
///
/// `stub://` devices are synthetic. Anything else is a V4L2 device path or a
/// bare camera index (`0` → `/dev/video0`).
pub fn open_camera(settings: &CameraSettings) -> Result<Box<dyn CaptureDevice>> {
    if settings.device.starts_with("stub://") {
        let config = SyntheticConfig {
            name: settings.device.clone(),
            width: settings.width,
            height: settings.height,
            ..SyntheticConfig::default()
        };
        return Ok(Box::new(SyntheticCamera::new(config)));
    }

    #[cfg(feature = "ingest-v4l2")]
    {
        let path = device_path(&settings.device);
        Ok(Box::new(V4l2Camera::open(&path, settings.width, settings.height)?))
    }
    #[cfg(not(feature = "ingest-v4l2"))]
    {
        anyhow::bail!(
            "camera '{}' requires the ingest-v4l2 feature",
            settings.device
        )
    }
}

/// Map a bare camera index to its device node.
pub fn device_path(device: &str) -> String {
    match device.trim().parse::<u32>() {
        Ok(index) => format!("/dev/video{}", index),
        Err(_) => device.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_index_maps_to_device_node() {
        assert_eq!(device_path("0"), "/dev/video0");
        assert_eq!(device_path(" 2 "), "/dev/video2");
        assert_eq!(device_path("/dev/video5"), "/dev/video5");
    }

    #[test]
    fn stub_device_opens_synthetic_camera() -> Result<()> {
        let settings = CameraSettings {
            device: "stub://unit".to_string(),
            width: 320,
            height: 240,
        };
        let camera = open_camera(&settings)?;
        assert_eq!(camera.size(), (320, 240));
        assert_eq!(camera.name(), "stub://unit");
        Ok(())
    }
}
