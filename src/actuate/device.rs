use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::fault::DeviceFault;

/// A tacho motor on one output port.
pub trait Motor: Send {
    fn port(&self) -> &str;

    /// Run continuously at `duty` in `-1.0..=1.0`; zero stops.
    fn set_duty_cycle(&mut self, duty: f64) -> Result<()>;

    /// Start an absolute move and return without waiting for it to finish.
    fn run_to_position(&mut self, position: i32) -> Result<()>;
}

/// LED outputs plus an ultrasonic distance sensor.
pub trait SecondaryActuator: Send {
    fn set_outputs(&mut self, outputs: [u8; 4]) -> Result<()>;

    /// Distance in centimetres, `None` when nothing is in range.
    fn distance_cm(&mut self) -> Result<Option<f64>>;
}

impl<T: Motor + ?Sized> Motor for Box<T> {
    fn port(&self) -> &str {
        (**self).port()
    }

    fn set_duty_cycle(&mut self, duty: f64) -> Result<()> {
        (**self).set_duty_cycle(duty)
    }

    fn run_to_position(&mut self, position: i32) -> Result<()> {
        (**self).run_to_position(position)
    }
}

impl<T: SecondaryActuator + ?Sized> SecondaryActuator for Box<T> {
    fn set_outputs(&mut self, outputs: [u8; 4]) -> Result<()> {
        (**self).set_outputs(outputs)
    }

    fn distance_cm(&mut self) -> Result<Option<f64>> {
        (**self).distance_cm()
    }
}

/// A command received by a simulated device.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Duty { port: String, duty: f64 },
    Position { port: String, position: i32 },
    Outputs([u8; 4]),
}

/// Shared record of simulated commands, in issue order.
#[derive(Clone, Debug, Default)]
pub struct CommandLog {
    entries: Arc<Mutex<Vec<Command>>>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Command>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn push(&self, command: Command) {
        self.lock().push(command);
    }

    pub fn commands(&self) -> Vec<Command> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Commands addressed to `port`.
    pub fn for_port(&self, port: &str) -> Vec<Command> {
        self.lock()
            .iter()
            .filter(|c| match c {
                Command::Duty { port: p, .. } | Command::Position { port: p, .. } => p == port,
                Command::Outputs(_) => false,
            })
            .cloned()
            .collect()
    }
}

/// Motor that only records what it was told. Used for dry runs and tests.
#[derive(Debug)]
pub struct SimulatedMotor {
    port: String,
    log: CommandLog,
    fail_after: Option<usize>,
    issued: usize,
}

impl SimulatedMotor {
    pub fn new(port: impl Into<String>, log: CommandLog) -> Self {
        Self {
            port: port.into(),
            log,
            fail_after: None,
            issued: 0,
        }
    }

    /// Stop answering after `commands` successful commands.
    pub fn failing_after(mut self, commands: usize) -> Self {
        self.fail_after = Some(commands);
        self
    }

    fn check(&mut self) -> Result<()> {
        if self.fail_after.is_some_and(|limit| self.issued >= limit) {
            return Err(DeviceFault::new(format!("motor {}", self.port), "no response").into());
        }
        self.issued += 1;
        Ok(())
    }
}

impl Motor for SimulatedMotor {
    fn port(&self) -> &str {
        &self.port
    }

    fn set_duty_cycle(&mut self, duty: f64) -> Result<()> {
        self.check()?;
        self.log.push(Command::Duty {
            port: self.port.clone(),
            duty,
        });
        Ok(())
    }

    fn run_to_position(&mut self, position: i32) -> Result<()> {
        self.check()?;
        self.log.push(Command::Position {
            port: self.port.clone(),
            position,
        });
        Ok(())
    }
}

/// Eye LEDs and distance sensor that record outputs and report a fixed distance.
#[derive(Debug)]
pub struct SimulatedEyes {
    log: CommandLog,
    distance: Option<f64>,
}

impl SimulatedEyes {
    pub fn new(log: CommandLog) -> Self {
        Self {
            log,
            distance: None,
        }
    }

    pub fn with_distance(mut self, distance: Option<f64>) -> Self {
        self.distance = distance;
        self
    }
}

impl SecondaryActuator for SimulatedEyes {
    fn set_outputs(&mut self, outputs: [u8; 4]) -> Result<()> {
        self.log.push(Command::Outputs(outputs));
        Ok(())
    }

    fn distance_cm(&mut self) -> Result<Option<f64>> {
        Ok(self.distance)
    }
}
