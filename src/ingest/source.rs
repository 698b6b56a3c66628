use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use super::CaptureDevice;
use crate::fps::{window_for_rate, FpsEstimator};
use crate::frame::Frame;
use crate::publish::Published;

struct SourceShared {
    latest: Published<Option<Arc<Frame>>>,
    fps: Published<Option<f64>>,
    stopped: AtomicBool,
}

/// Owns one capture device and its acquisition thread.
///
/// `read()` never blocks: it returns a copy of the most recent frame, or `None`
/// before the first frame arrives and after the device has failed.
pub struct FrameSource {
    shared: Arc<SourceShared>,
    name: String,
    size: (u32, u32),
    nominal_fps: f64,
    device: Option<Box<dyn CaptureDevice>>,
    thread: Option<JoinHandle<()>>,
}

impl FrameSource {
    pub fn new(device: Box<dyn CaptureDevice>) -> Self {
        Self {
            shared: Arc::new(SourceShared {
                latest: Published::new(None),
                fps: Published::new(None),
                stopped: AtomicBool::new(false),
            }),
            name: device.name().to_string(),
            size: device.size(),
            nominal_fps: device.reported_fps(),
            device: Some(device),
            thread: None,
        }
    }

    /// Start continuous acquisition on a dedicated thread.
    pub fn open(&mut self) -> Result<()> {
        let device = self
            .device
            .take()
            .ok_or_else(|| anyhow!("frame source {} already opened", self.name))?;
        self.shared.stopped.store(false, Ordering::SeqCst);

        let window = window_for_rate(self.nominal_fps);
        log::info!(
            "FrameSource: starting {} at {}x{} (reported {:.1} fps, window {})",
            self.name,
            self.size.0,
            self.size.1,
            self.nominal_fps,
            window
        );

        let shared = self.shared.clone();
        let size = self.size;
        let thread = std::thread::Builder::new()
            .name(format!("capture:{}", self.name))
            .spawn(move || acquire(device, shared, size, window))?;
        self.thread = Some(thread);
        Ok(())
    }

    /// Request the acquisition loop to stop. Idempotent.
    pub fn close(&self) {
        if !self.shared.stopped.swap(true, Ordering::SeqCst) {
            log::info!("FrameSource: close requested for {}", self.name);
        }
    }

    pub fn read(&self) -> Option<Frame> {
        read_latest(&self.shared)
    }

    pub fn is_open(&self) -> bool {
        !self.shared.stopped.load(Ordering::SeqCst)
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Rate reported by the device at open time.
    pub fn nominal_fps(&self) -> f64 {
        self.nominal_fps
    }

    /// Latest measured rate; `None` until the first window closes.
    pub fn fps(&self) -> Option<f64> {
        self.shared.fps.get()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read-side handle for perception threads.
    pub fn reader(&self) -> FrameReader {
        FrameReader {
            shared: self.shared.clone(),
            size: self.size,
            nominal_fps: self.nominal_fps,
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.close();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("FrameSource: acquisition thread for {} panicked", self.name);
            }
        }
    }
}

/// Cloneable read-only view of a `FrameSource`.
#[derive(Clone)]
pub struct FrameReader {
    shared: Arc<SourceShared>,
    size: (u32, u32),
    nominal_fps: f64,
}

impl FrameReader {
    pub fn read(&self) -> Option<Frame> {
        read_latest(&self.shared)
    }

    pub fn is_open(&self) -> bool {
        !self.shared.stopped.load(Ordering::SeqCst)
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn nominal_fps(&self) -> f64 {
        self.nominal_fps
    }

    pub fn fps(&self) -> Option<f64> {
        self.shared.fps.get()
    }
}

fn read_latest(shared: &SourceShared) -> Option<Frame> {
    let snapshot = shared.latest.snapshot();
    snapshot.value.as_deref().cloned()
}

fn acquire(
    mut device: Box<dyn CaptureDevice>,
    shared: Arc<SourceShared>,
    size: (u32, u32),
    window: u32,
) {
    let mut fps = FpsEstimator::new(Instant::now());
    let mut sequence = 0u64;

    while !shared.stopped.load(Ordering::SeqCst) {
        let frame = device
            .read_frame()
            .and_then(|pixels| Frame::from_rgb(pixels, size.0, size.1, sequence + 1));
        match frame {
            Ok(frame) => {
                sequence = frame.sequence;
                shared.latest.publish(Some(Arc::new(frame)));
                if let Some(value) = fps.tick(window, Instant::now()) {
                    log::trace!("FrameSource: {} at {:.1} fps", device.name(), value);
                    shared.fps.publish(Some(value));
                }
            }
            Err(err) => {
                log::warn!(
                    "FrameSource: read failed on {} after {} frames, closing: {:#}",
                    device.name(),
                    sequence,
                    err
                );
                shared.latest.publish(None);
                shared.stopped.store(true, Ordering::SeqCst);
                break;
            }
        }
    }

    device.release();
}
