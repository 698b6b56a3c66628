//! trackstorm
//!
//! Camera tracking robot: frames come in from a camera, perception workers find a
//! target (and optionally a hand gesture), and a rate-limited controller drives a
//! pan/tilt motor pair toward it.
//!
//! # Architecture
//!
//! Each stage runs on its own thread and publishes its latest result through a
//! versioned snapshot cell. Readers never block writers:
//!
//! 1. **Acquisition**: `FrameSource` keeps the most recent camera frame.
//! 2. **Perception**: `PerceptionWorker` runs one `Perception` capability at a
//!    fixed detection resolution and publishes camera-space `Detections`.
//! 3. **Control**: `Tracker` (caller's thread) feeds the primary target into
//!    `MotorController`, whose per-axis state machine only commands the hardware
//!    on a state change.
//!
//! # Module Structure
//!
//! - `ingest`: capture devices (synthetic, V4L2) and the acquisition thread
//! - `detect`: perception capability, variants, worker
//! - `actuate`: motors, eye LEDs, hysteresis controller
//! - `tracker`: the control loop
//! - `diagnostics`: stats and annotated MJPEG output
//! - `config`: file, env and validation

pub mod actuate;
pub mod config;
pub mod detect;
pub mod diagnostics;
pub mod fault;
pub mod fps;
pub mod frame;
pub mod ingest;
pub mod publish;
pub mod tracker;

pub use actuate::{
    AxisState, EyeController, Motor, MotorController, MoveOutcome, SecondaryActuator,
    SimulatedEyes, SimulatedMotor,
};
pub use config::TrackerConfig;
pub use detect::{
    BoundingBox, Detections, DetectorKind, DetectorVariant, Gesture, Perception,
    PerceptionWorker,
};
pub use fault::{is_device_fault, DeviceFault};
pub use frame::Frame;
pub use ingest::{open_camera, FrameReader, FrameSource};
pub use publish::Published;
pub use tracker::{IterationOutcome, Tracker};
