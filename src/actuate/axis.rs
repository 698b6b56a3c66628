use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    pub fn name(&self) -> &'static str {
        match self {
            Axis::Horizontal => "horizontal",
            Axis::Vertical => "vertical",
        }
    }

    /// Human direction of a non-stop state on this axis.
    pub fn direction(&self, state: AxisState) -> &'static str {
        match (self, state) {
            (_, AxisState::Stop) => "stop",
            (Axis::Horizontal, AxisState::Negative) => "left",
            (Axis::Horizontal, AxisState::Positive) => "right",
            (Axis::Vertical, AxisState::Negative) => "up",
            (Axis::Vertical, AxisState::Positive) => "down",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Drive state of one axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AxisState {
    #[default]
    Stop,
    Positive,
    Negative,
}

impl AxisState {
    /// Desired state for a target coordinate against the frame middle.
    ///
    /// The dead band is `middle * tolerance` either side of the middle; a target
    /// before it is `Negative`, past it `Positive`.
    pub fn desired(middle: i32, target: i32, tolerance: f64) -> Self {
        let middle = middle as f64;
        let band = middle * tolerance;
        let target = target as f64;
        if target < middle - band {
            AxisState::Negative
        } else if target > middle + band {
            AxisState::Positive
        } else {
            AxisState::Stop
        }
    }

    /// Next state and whether the hardware must be told.
    pub fn transition(current: AxisState, desired: AxisState) -> (AxisState, bool) {
        (desired, current != desired)
    }

    /// Signed duty cycle for `speed` percent.
    pub fn duty(&self, speed: f64) -> f64 {
        match self {
            AxisState::Stop => 0.0,
            AxisState::Positive => speed / 100.0,
            AxisState::Negative => -speed / 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerance_band_around_the_middle() {
        assert_eq!(AxisState::desired(320, 300, 0.2), AxisState::Stop);
        assert_eq!(AxisState::desired(320, 200, 0.2), AxisState::Negative);
        assert_eq!(AxisState::desired(320, 450, 0.2), AxisState::Positive);
        // Band edges are inside.
        assert_eq!(AxisState::desired(320, 256, 0.2), AxisState::Stop);
        assert_eq!(AxisState::desired(320, 384, 0.2), AxisState::Stop);
    }

    #[test]
    fn transition_emits_only_on_change() {
        assert_eq!(
            AxisState::transition(AxisState::Stop, AxisState::Stop),
            (AxisState::Stop, false)
        );
        assert_eq!(
            AxisState::transition(AxisState::Stop, AxisState::Positive),
            (AxisState::Positive, true)
        );
        assert_eq!(
            AxisState::transition(AxisState::Positive, AxisState::Positive),
            (AxisState::Positive, false)
        );
        assert_eq!(
            AxisState::transition(AxisState::Positive, AxisState::Negative),
            (AxisState::Negative, true)
        );
    }

    #[test]
    fn duty_follows_state_sign() {
        assert_eq!(AxisState::Positive.duty(12.0), 0.12);
        assert_eq!(AxisState::Negative.duty(3.0), -0.03);
        assert_eq!(AxisState::Stop.duty(50.0), 0.0);
        assert_eq!(Axis::Vertical.direction(AxisState::Negative), "up");
    }
}
