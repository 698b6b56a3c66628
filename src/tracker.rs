use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::actuate::{EyeController, Motor, MotorController, SecondaryActuator};
use crate::detect::{BoxedGestureRecognizer, DetectorVariant, Gesture, PerceptionWorker};
use crate::diagnostics::{DiagnosticsSink, Stats};
use crate::ingest::FrameSource;

const IDLE_PAUSE: Duration = Duration::from_millis(1);

/// What one control iteration did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterationOutcome {
    /// No new frame yet.
    Skipped,
    /// A primary target was handed to the controller.
    Tracked { center: (i32, i32) },
    /// Nothing detected; motors were told to stop.
    NoTarget,
}

/// The control loop: frames in, motor and LED commands out.
pub struct Tracker {
    source: FrameSource,
    detector: PerceptionWorker<DetectorVariant>,
    gesture: Option<PerceptionWorker<BoxedGestureRecognizer>>,
    controller: Option<MotorController<Box<dyn Motor>>>,
    eyes: Option<EyeController<Box<dyn SecondaryActuator>>>,
    sinks: Vec<Box<dyn DiagnosticsSink>>,
    frame_middle: (i32, i32),
    home: (i32, i32),
    shutdown: Arc<AtomicBool>,
    last_sequence: Option<u64>,
    started: bool,
}

impl Tracker {
    pub fn new(source: FrameSource, detector: PerceptionWorker<DetectorVariant>) -> Self {
        let (width, height) = source.size();
        Self {
            frame_middle: ((width / 2) as i32, (height / 2) as i32),
            source,
            detector,
            gesture: None,
            controller: None,
            eyes: None,
            sinks: Vec::new(),
            home: (0, 0),
            shutdown: Arc::new(AtomicBool::new(false)),
            last_sequence: None,
            started: false,
        }
    }

    pub fn with_gesture(mut self, worker: PerceptionWorker<BoxedGestureRecognizer>) -> Self {
        self.gesture = Some(worker);
        self
    }

    /// Without a controller the tracker runs perception only.
    pub fn with_controller(
        mut self,
        controller: MotorController<Box<dyn Motor>>,
        home: (i32, i32),
    ) -> Self {
        self.controller = Some(controller);
        self.home = home;
        self
    }

    pub fn with_eyes(mut self, eyes: EyeController<Box<dyn SecondaryActuator>>) -> Self {
        self.eyes = Some(eyes);
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn DiagnosticsSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Flag that ends `run()` after the current iteration when set.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn frame_middle(&self) -> (i32, i32) {
        self.frame_middle
    }

    pub fn source(&self) -> &FrameSource {
        &self.source
    }

    pub fn controller(&self) -> Option<&MotorController<Box<dyn Motor>>> {
        self.controller.as_ref()
    }

    /// Open the camera and start the perception workers. Idempotent.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.source.open()?;
        self.detector.start()?;
        if let Some(gesture) = self.gesture.as_mut() {
            gesture.start()?;
        }
        self.started = true;
        log::info!(
            "Tracker: started on {} (middle {:?}, controller {})",
            self.source.name(),
            self.frame_middle,
            if self.controller.is_some() {
                "enabled"
            } else {
                "disabled"
            }
        );
        Ok(())
    }

    pub fn run_iteration(&mut self) -> Result<IterationOutcome> {
        let Some(frame) = self.source.read() else {
            return Ok(IterationOutcome::Skipped);
        };
        if self.last_sequence == Some(frame.sequence) {
            return Ok(IterationOutcome::Skipped);
        }
        self.last_sequence = Some(frame.sequence);

        let detections = self.detector.read();
        let gesture = self
            .gesture
            .as_ref()
            .map(|worker| worker.read())
            .unwrap_or_default();

        let outcome = match detections.primary() {
            Some(primary) => {
                let center = primary.center();
                if let Some(controller) = self.controller.as_mut() {
                    controller.move_to_target(self.frame_middle, center)?;
                }
                IterationOutcome::Tracked { center }
            }
            None => {
                if let Some(controller) = self.controller.as_mut() {
                    controller.stop()?;
                }
                IterationOutcome::NoTarget
            }
        };

        let mut distance_cm = None;
        if let Some(eyes) = self.eyes.as_mut() {
            if self.gesture.is_some() {
                eyes.apply(gesture.gesture)?;
            }
            distance_cm = eyes.distance()?;
        }

        if !self.sinks.is_empty() {
            let stats = Stats {
                camera_fps: self.source.fps(),
                detector_fps: self.detector.fps(),
                gesture_fps: self.gesture.as_ref().and_then(|w| w.fps()),
                distance_cm,
                gesture: if self.gesture.is_some() {
                    gesture.gesture
                } else {
                    Gesture::None
                },
            };
            let mut annotated = detections;
            annotated.keypoints = gesture.keypoints;
            annotated.gesture = stats.gesture;
            for sink in self.sinks.iter_mut() {
                if let Err(err) = sink.observe(&frame, &annotated, &stats) {
                    log::warn!("Tracker: diagnostics sink failed: {:#}", err);
                }
            }
        }

        log::trace!("Tracker: frame {} -> {:?}", frame.sequence, outcome);
        Ok(outcome)
    }

    /// Loop until the camera closes or shutdown is requested, then clean up.
    ///
    /// Device faults end the loop and are returned after cleanup.
    pub fn run(&mut self) -> Result<()> {
        self.start()?;
        let result = self.control_loop();
        self.shutdown();
        result
    }

    fn control_loop(&mut self) -> Result<()> {
        let mut iterations = 0u64;
        while self.source.is_open() && !self.shutdown.load(Ordering::SeqCst) {
            match self.run_iteration()? {
                IterationOutcome::Skipped => std::thread::sleep(IDLE_PAUSE),
                _ => iterations += 1,
            }
        }
        log::info!(
            "Tracker: loop ended after {} iterations ({})",
            iterations,
            if self.source.is_open() {
                "shutdown requested"
            } else {
                "camera closed"
            }
        );
        Ok(())
    }

    /// Close the camera, stop the workers and, best effort, the motors.
    pub fn shutdown(&mut self) {
        self.source.close();
        self.detector.stop();
        if let Some(gesture) = self.gesture.as_mut() {
            gesture.stop();
        }
        if let Some(controller) = self.controller.as_mut() {
            if let Err(err) = controller.stop() {
                log::warn!("Tracker: failed to stop motors: {:#}", err);
            }
        }
    }

    /// Send both motors to the configured home position.
    pub fn recenter(&mut self) -> Result<()> {
        let (x, y) = self.home;
        match self.controller.as_mut() {
            Some(controller) => controller.to_position(x, y),
            None => {
                log::warn!("Tracker: recenter requested without a controller");
                Ok(())
            }
        }
    }
}
