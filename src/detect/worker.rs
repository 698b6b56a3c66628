use anyhow::{anyhow, Result};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::detect::backend::Perception;
use crate::detect::preprocess;
use crate::detect::result::{Detections, ScaleFactor};
use crate::fps::{window_for_rate, FpsEstimator};
use crate::frame::Frame;
use crate::ingest::FrameReader;
use crate::publish::Published;

const FAULT_LOG_EVERY: u64 = 100;

struct WorkerShared {
    latest: Published<Detections>,
    fps: Published<Option<f64>>,
    stopped: AtomicBool,
}

/// Runs a `Perception` capability on its own thread against a frame source.
///
/// Results are published whole; `read()` returns a copy of the latest cycle.
pub struct PerceptionWorker<P: Perception> {
    name: &'static str,
    shared: Arc<WorkerShared>,
    perception: Option<P>,
    reader: FrameReader,
    rate: f64,
    scale: ScaleFactor,
    thread: Option<JoinHandle<()>>,
}

impl<P: Perception> PerceptionWorker<P> {
    /// `rate` caps cycles per second. Zero or negative runs inference-bound.
    pub fn new(mut perception: P, reader: FrameReader, rate: f64) -> Self {
        let scale = ScaleFactor::new(reader.size(), perception.detection_size());
        perception.bind_scale(scale);
        Self {
            name: perception.name(),
            shared: Arc::new(WorkerShared {
                latest: Published::default(),
                fps: Published::new(None),
                stopped: AtomicBool::new(false),
            }),
            perception: Some(perception),
            reader,
            rate,
            scale,
            thread: None,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        let perception = self
            .perception
            .take()
            .ok_or_else(|| anyhow!("perception worker {} already started", self.name))?;
        self.shared.stopped.store(false, Ordering::SeqCst);

        log::info!(
            "PerceptionWorker: starting {} (rate {}, scale {:.2}x{:.2})",
            self.name,
            if self.rate > 0.0 {
                format!("{:.1}/s", self.rate)
            } else {
                "unlimited".to_string()
            },
            self.scale.x,
            self.scale.y
        );

        let cycle = CycleLoop {
            name: self.name,
            reader: self.reader.clone(),
            shared: self.shared.clone(),
            rate: self.rate,
            scale: self.scale,
        };
        let thread = std::thread::Builder::new()
            .name(format!("perception:{}", self.name))
            .spawn(move || cycle.run(perception))?;
        self.thread = Some(thread);
        Ok(())
    }

    /// Stop the cycle and wait for the thread. Idempotent.
    pub fn stop(&mut self) {
        if !self.shared.stopped.swap(true, Ordering::SeqCst) {
            log::info!("PerceptionWorker: stop requested for {}", self.name);
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("PerceptionWorker: {} thread panicked", self.name);
            }
        }
    }

    pub fn read(&self) -> Detections {
        self.shared.latest.get()
    }

    /// Number of results published so far.
    pub fn version(&self) -> u64 {
        self.shared.latest.version()
    }

    pub fn fps(&self) -> Option<f64> {
        self.shared.fps.get()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn scale(&self) -> ScaleFactor {
        self.scale
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl<P: Perception> Drop for PerceptionWorker<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

struct CycleLoop {
    name: &'static str,
    reader: FrameReader,
    shared: Arc<WorkerShared>,
    rate: f64,
    scale: ScaleFactor,
}

impl CycleLoop {
    fn run<P: Perception>(self, mut perception: P) {
        // Windowed over the camera's nominal rate, not this worker's.
        let window = window_for_rate(self.reader.nominal_fps());
        let mut fps = FpsEstimator::new(Instant::now());
        let mut faults = 0u64;

        while !self.shared.stopped.load(Ordering::SeqCst) {
            let started = Instant::now();

            let Some(frame) = self.reader.read() else {
                if !self.reader.is_open() {
                    log::info!("PerceptionWorker: {} source closed, exiting", self.name);
                    break;
                }
                std::thread::yield_now();
                continue;
            };

            let detections = match run_cycle(&mut perception, frame, self.scale) {
                Ok(detections) => detections,
                Err(err) => {
                    faults += 1;
                    if faults == 1 || faults % FAULT_LOG_EVERY == 0 {
                        log::warn!(
                            "PerceptionWorker: {} inference fault #{}: {:#}",
                            self.name,
                            faults,
                            err
                        );
                    }
                    Detections::default()
                }
            };
            log::trace!(
                "PerceptionWorker: {} published {} boxes",
                self.name,
                detections.boxes.len()
            );
            self.shared.latest.publish(detections);

            if let Some(pause) = pacing_delay(self.rate, started.elapsed()) {
                std::thread::sleep(pause);
            }

            if let Some(value) = fps.tick(window, Instant::now()) {
                self.shared.fps.publish(Some(value));
            }
        }
    }
}

/// One full cycle for one frame. Panics inside the model are turned into errors.
fn run_cycle<P: Perception>(
    perception: &mut P,
    frame: Frame,
    scale: ScaleFactor,
) -> Result<Detections> {
    let (width, height) = perception.detection_size();
    let resized = preprocess::resize(frame.into_image()?, width, height);
    let input = perception.preprocess(resized);

    let output = catch_unwind(AssertUnwindSafe(|| {
        let raw = perception.infer(&input)?;
        Ok::<_, anyhow::Error>(perception.post_process(raw))
    }))
    .map_err(|_| anyhow!("inference panicked"))??;

    Ok(output.scaled(scale))
}

/// Remaining budget of a cycle at `rate` per second, if any.
///
/// Best-effort pacing: the sleep never goes negative and does not correct drift.
pub fn pacing_delay(rate: f64, elapsed: Duration) -> Option<Duration> {
    if rate <= 0.0 || !rate.is_finite() {
        return None;
    }
    let budget = Duration::from_secs_f64(1.0 / rate);
    budget.checked_sub(elapsed).filter(|d| !d.is_zero())
}
