//! Pan/tilt motors and the eye LEDs.

mod axis;
mod controller;
mod device;
mod eyes;

pub use axis::{Axis, AxisState};
pub use controller::{MotorController, MoveOutcome};
pub use device::{Command, CommandLog, Motor, SecondaryActuator, SimulatedEyes, SimulatedMotor};
pub use eyes::EyeController;
