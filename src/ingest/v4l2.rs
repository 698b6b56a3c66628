//! V4L2 capture device.
//!
//! Opens a local device node (e.g. /dev/video0), negotiates RGB3 at the requested
//! resolution and streams frames through an mmap buffer queue.

use anyhow::{Context, Result};
use ouroboros::self_referencing;

use super::CaptureDevice;
use crate::fault::DeviceFault;
use crate::frame::expected_len;

pub struct V4l2Camera {
    path: String,
    state: Option<V4l2State>,
    width: u32,
    height: u32,
    reported_fps: f64,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Camera {
    /// Open `path` and start streaming. Failure here is fatal to the caller.
    pub fn open(path: &str, width: u32, height: u32) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(path)
            .map_err(|err| DeviceFault::new(path, err.to_string()))
            .with_context(|| format!("open v4l2 device {}", path))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = width;
        format.height = height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Camera: failed to set format on {}: {}", path, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        let reported_fps = match device.params() {
            Ok(params) if params.interval.numerator > 0 => {
                params.interval.denominator as f64 / params.interval.numerator as f64
            }
            Ok(_) => 0.0,
            Err(err) => {
                log::warn!("V4l2Camera: failed to read fps on {}: {}", path, err);
                0.0
            }
        };

        let state = V4l2StateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!(
            "V4l2Camera: opened {} ({}x{}, reported {:.1} fps)",
            path,
            format.width,
            format.height,
            reported_fps
        );

        Ok(Self {
            path: path.to_string(),
            state: Some(state),
            width: format.width,
            height: format.height,
            reported_fps,
        })
    }
}

impl CaptureDevice for V4l2Camera {
    fn name(&self) -> &str {
        &self.path
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn reported_fps(&self) -> f64 {
        self.reported_fps
    }

    fn read_frame(&mut self) -> Result<Vec<u8>> {
        use v4l::io::traits::CaptureStream;

        let state = self
            .state
            .as_mut()
            .ok_or_else(|| DeviceFault::new(&self.path, "device released"))?;
        let buf = state
            .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
            .map_err(|err| DeviceFault::new(&self.path, format!("capture failed: {}", err)))?;

        let expected = expected_len(self.width, self.height)?;
        if buf.len() < expected {
            return Err(DeviceFault::new(
                &self.path,
                format!("short frame: {} of {} bytes", buf.len(), expected),
            )
            .into());
        }
        Ok(buf[..expected].to_vec())
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!("V4l2Camera: released {}", self.path);
        }
    }
}
