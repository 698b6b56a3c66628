use anyhow::Result;

use super::device::SecondaryActuator;
use crate::detect::Gesture;
use crate::fault::device_error;

const EYES_ON: [u8; 4] = [100, 100, 100, 100];
const EYES_OFF: [u8; 4] = [0, 0, 0, 0];

/// Drives the eye LEDs from the recognised gesture.
pub struct EyeController<A: SecondaryActuator> {
    device: A,
    name: String,
    applied: [u8; 4],
}

impl<A: SecondaryActuator> EyeController<A> {
    /// The LEDs are assumed off until the first non-off gesture.
    pub fn new(device: A, name: impl Into<String>) -> Self {
        Self {
            device,
            name: name.into(),
            applied: EYES_OFF,
        }
    }

    pub fn outputs_for(gesture: Gesture) -> [u8; 4] {
        match gesture {
            Gesture::Point => EYES_ON,
            _ => EYES_OFF,
        }
    }

    /// Returns true when the device was written.
    pub fn apply(&mut self, gesture: Gesture) -> Result<bool> {
        let desired = Self::outputs_for(gesture);
        if self.applied == desired {
            return Ok(false);
        }
        log::info!("EyeController: {} -> {:?}", gesture, desired);
        self.device
            .set_outputs(desired)
            .map_err(|err| device_error(&self.name, "set outputs", err))?;
        self.applied = desired;
        Ok(true)
    }

    pub fn distance(&mut self) -> Result<Option<f64>> {
        self.device
            .distance_cm()
            .map_err(|err| device_error(&self.name, "read distance", err))
    }
}
