use anyhow::Result;
use std::time::{Duration, Instant};

use super::axis::{Axis, AxisState};
use super::device::Motor;
use crate::config::{AxisTuning, ControllerSettings};
use crate::fault::device_error;

/// Result of one tracking update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Same target as last time; nothing evaluated.
    Unchanged,
    /// Too soon after the previous accepted update; memory untouched.
    RateLimited,
    /// Evaluated. Each field holds the new state when a command was sent for that axis.
    Commanded {
        horizontal: Option<AxisState>,
        vertical: Option<AxisState>,
    },
}

struct AxisDrive<M> {
    axis: Axis,
    motor: M,
    tuning: AxisTuning,
    state: AxisState,
}

impl<M: Motor> AxisDrive<M> {
    fn new(axis: Axis, motor: M, tuning: AxisTuning) -> Self {
        Self {
            axis,
            motor,
            tuning,
            state: AxisState::Stop,
        }
    }

    /// Move to `desired`, commanding the motor only when the state changes.
    fn drive(&mut self, desired: AxisState) -> Result<Option<AxisState>> {
        let (next, emit) = AxisState::transition(self.state, desired);
        self.state = next;
        if !emit {
            return Ok(None);
        }
        match next {
            AxisState::Stop => log::info!("stop {}", self.axis),
            moving => log::info!("move {}", self.axis.direction(moving)),
        }
        let duty = next.duty(self.tuning.speed);
        let port = self.motor.port().to_string();
        self.motor
            .set_duty_cycle(duty)
            .map_err(|err| device_error(&port, "set duty cycle", err))?;
        Ok(Some(next))
    }
}

/// Two-axis pan/tilt controller with hysteresis and rate limiting.
pub struct MotorController<M: Motor> {
    horizontal: AxisDrive<M>,
    vertical: AxisDrive<M>,
    min_interval: Option<Duration>,
    last_target: Option<(i32, i32)>,
    last_command: Option<Instant>,
}

impl<M: Motor> MotorController<M> {
    pub fn new(horizontal: M, vertical: M, settings: &ControllerSettings) -> Self {
        let min_interval = (settings.command_rate > 0.0 && settings.command_rate.is_finite())
            .then(|| Duration::from_secs_f64(1.0 / settings.command_rate));
        log::info!(
            "MotorController: horizontal on {}, vertical on {}, {}",
            horizontal.port(),
            vertical.port(),
            match min_interval {
                Some(interval) => format!("min interval {:?}", interval),
                None => "no rate limit".to_string(),
            }
        );
        Self {
            horizontal: AxisDrive::new(Axis::Horizontal, horizontal, settings.horizontal),
            vertical: AxisDrive::new(Axis::Vertical, vertical, settings.vertical),
            min_interval,
            last_target: None,
            last_command: None,
        }
    }

    pub fn move_to_target(
        &mut self,
        frame_middle: (i32, i32),
        target: (i32, i32),
    ) -> Result<MoveOutcome> {
        self.move_to_target_at(frame_middle, target, Instant::now())
    }

    pub fn move_to_target_at(
        &mut self,
        frame_middle: (i32, i32),
        target: (i32, i32),
        now: Instant,
    ) -> Result<MoveOutcome> {
        if self.last_target == Some(target) {
            return Ok(MoveOutcome::Unchanged);
        }
        if let (Some(interval), Some(last)) = (self.min_interval, self.last_command) {
            if now.saturating_duration_since(last) < interval {
                return Ok(MoveOutcome::RateLimited);
            }
        }

        let desired_h =
            AxisState::desired(frame_middle.0, target.0, self.horizontal.tuning.tolerance);
        let desired_v =
            AxisState::desired(frame_middle.1, target.1, self.vertical.tuning.tolerance);
        log::debug!(
            "MotorController: target {:?} middle {:?} -> {:?}/{:?}",
            target,
            frame_middle,
            desired_h,
            desired_v
        );
        let horizontal = self.horizontal.drive(desired_h)?;
        let vertical = self.vertical.drive(desired_v)?;

        self.last_target = Some(target);
        self.last_command = Some(now);
        Ok(MoveOutcome::Commanded {
            horizontal,
            vertical,
        })
    }

    pub fn stop(&mut self) -> Result<()> {
        self.stop_at(Instant::now())
    }

    /// Force both axes to `Stop`. Repeated calls send nothing further and
    /// leave the rate limit window alone.
    ///
    /// The last target is forgotten so a re-acquired target is evaluated again.
    pub fn stop_at(&mut self, now: Instant) -> Result<()> {
        let horizontal = self.horizontal.drive(AxisState::Stop);
        let vertical = self.vertical.drive(AxisState::Stop);
        self.last_target = None;
        let sent = matches!(horizontal, Ok(Some(_))) || matches!(vertical, Ok(Some(_)));
        if sent {
            self.last_command = Some(now);
        }
        horizontal?;
        vertical?;
        Ok(())
    }

    /// Absolute move of both motors, independent of the tracking state.
    pub fn to_position(&mut self, x: i32, y: i32) -> Result<()> {
        log::info!("MotorController: to position ({}, {})", x, y);
        for (drive, position) in [(&mut self.horizontal, x), (&mut self.vertical, y)] {
            let port = drive.motor.port().to_string();
            drive
                .motor
                .run_to_position(position)
                .map_err(|err| device_error(&port, "run to position", err))?;
        }
        Ok(())
    }

    pub fn states(&self) -> (AxisState, AxisState) {
        (self.horizontal.state, self.vertical.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuate::device::{Command, CommandLog, SimulatedMotor};
    use crate::config::TrackerConfig;

    const MIDDLE: (i32, i32) = (320, 240);

    fn controller(command_rate: f64) -> (MotorController<SimulatedMotor>, CommandLog) {
        let log = CommandLog::new();
        let mut settings = TrackerConfig::default().controller;
        settings.command_rate = command_rate;
        let controller = MotorController::new(
            SimulatedMotor::new("A", log.clone()),
            SimulatedMotor::new("B", log.clone()),
            &settings,
        );
        (controller, log)
    }

    #[test]
    fn same_target_twice_is_a_no_op() -> Result<()> {
        let (mut ctl, log) = controller(0.0);
        ctl.move_to_target(MIDDLE, (100, 240))?;
        let issued = log.len();
        assert_eq!(ctl.move_to_target(MIDDLE, (100, 240))?, MoveOutcome::Unchanged);
        assert_eq!(log.len(), issued);
        Ok(())
    }

    #[test]
    fn dead_band_maps_targets_to_states() -> Result<()> {
        let (mut ctl, _) = controller(0.0);
        ctl.move_to_target(MIDDLE, (300, 240))?;
        assert_eq!(ctl.states().0, AxisState::Stop);
        ctl.move_to_target(MIDDLE, (200, 240))?;
        assert_eq!(ctl.states().0, AxisState::Negative);
        ctl.move_to_target(MIDDLE, (450, 240))?;
        assert_eq!(ctl.states().0, AxisState::Positive);
        Ok(())
    }

    #[test]
    fn repeated_direction_commands_once() -> Result<()> {
        let (mut ctl, log) = controller(0.0);
        ctl.move_to_target(MIDDLE, (450, 240))?;
        ctl.move_to_target(MIDDLE, (460, 240))?;
        ctl.move_to_target(MIDDLE, (470, 240))?;

        assert_eq!(
            log.for_port("A"),
            vec![Command::Duty {
                port: "A".to_string(),
                duty: 0.12
            }]
        );
        assert!(log.for_port("B").is_empty());
        Ok(())
    }

    #[test]
    fn rate_limit_drops_updates_without_recording_them() -> Result<()> {
        let (mut ctl, _) = controller(10.0);
        let start = Instant::now();
        let mut accepted = 0;
        for i in 0..100u64 {
            let now = start + Duration::from_millis(i * 5);
            // Distinct targets, all inside the dead band.
            let target = (300 + (i % 50) as i32, 240);
            if matches!(
                ctl.move_to_target_at(MIDDLE, target, now)?,
                MoveOutcome::Commanded { .. }
            ) {
                accepted += 1;
            }
        }
        assert!(accepted <= 5, "accepted = {accepted}");

        // The next allowed tick evaluates the latest target.
        let later = start + Duration::from_millis(600);
        let outcome = ctl.move_to_target_at(MIDDLE, (600, 240), later)?;
        assert_eq!(
            outcome,
            MoveOutcome::Commanded {
                horizontal: Some(AxisState::Positive),
                vertical: None
            }
        );
        Ok(())
    }

    #[test]
    fn stop_is_idempotent() -> Result<()> {
        let (mut ctl, log) = controller(0.0);
        ctl.move_to_target(MIDDLE, (600, 20))?;
        assert_eq!(log.len(), 2);

        ctl.stop()?;
        ctl.stop()?;
        assert_eq!(ctl.states(), (AxisState::Stop, AxisState::Stop));
        assert_eq!(log.len(), 4);

        // Forgotten target: the same box is evaluated again after a stop.
        assert!(matches!(
            ctl.move_to_target(MIDDLE, (600, 20))?,
            MoveOutcome::Commanded { .. }
        ));
        assert_eq!(log.len(), 6);
        Ok(())
    }

    #[test]
    fn idle_stops_do_not_hold_back_reacquisition() -> Result<()> {
        let (mut ctl, log) = controller(10.0);
        let start = Instant::now();
        ctl.move_to_target_at(MIDDLE, (600, 240), start)?;
        ctl.stop_at(start + Duration::from_millis(100))?;
        let issued = log.len();

        // Target lost: the loop keeps stopping an already stopped rig.
        for i in 1..=50u64 {
            ctl.stop_at(start + Duration::from_millis(100 + i * 10))?;
        }
        assert_eq!(log.len(), issued);

        let outcome =
            ctl.move_to_target_at(MIDDLE, (600, 240), start + Duration::from_millis(610))?;
        assert_eq!(
            outcome,
            MoveOutcome::Commanded {
                horizontal: Some(AxisState::Positive),
                vertical: None
            }
        );
        Ok(())
    }

    #[test]
    fn to_position_leaves_axis_state_alone() -> Result<()> {
        let (mut ctl, log) = controller(0.0);
        ctl.move_to_target(MIDDLE, (600, 240))?;
        ctl.to_position(0, 0)?;
        assert_eq!(ctl.states().0, AxisState::Positive);
        assert_eq!(
            log.commands().last(),
            Some(&Command::Position {
                port: "B".to_string(),
                position: 0
            })
        );
        Ok(())
    }

    #[test]
    fn motor_failure_is_a_device_fault() {
        let log = CommandLog::new();
        let settings = TrackerConfig::default().controller;
        let mut ctl = MotorController::new(
            SimulatedMotor::new("A", log.clone()).failing_after(0),
            SimulatedMotor::new("B", log),
            &settings,
        );
        let err = ctl.move_to_target(MIDDLE, (0, 240)).unwrap_err();
        assert!(crate::fault::is_device_fault(&err));
    }
}
