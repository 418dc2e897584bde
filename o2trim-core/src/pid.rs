//! Oxygen Trim PID Regulator
//!
//! ## Control Law
//!
//! ```text
//! error      = o2_setpoint - o2_measured        (positive: too little air)
//! integral  += error * dt
//! derivative = (error - last_error) / dt
//! output     = Kp*error + Ki*integral + Kd*derivative
//! correction = clamp(output, -max_correction, +max_correction)
//! ```
//!
//! `dt` is the configured control interval, never the measured elapsed time,
//! so integral and derivative advance in fixed nominal steps whatever the
//! call jitter.
//!
//! ## Deadband
//!
//! While `|error| <= deadband` the regulator holds: correction is zero and
//! both the integral and the last error are zeroed. There is no other
//! anti-windup.
//!
//! ## Action Mapping
//!
//! The relay direction comes from the correction, against
//! [`ACTION_THRESHOLD`] rather than the deadband:
//!
//! | correction                  | action |
//! |-----------------------------|--------|
//! | `> ACTION_THRESHOLD`        | Up     |
//! | `< -ACTION_THRESHOLD`       | Down   |
//! | otherwise                   | Hold   |
//!
//! A correction in the gap between the deadband and the threshold is reported
//! but moves nothing.
//!
//! ## State
//!
//! The regulator itself is stateless. [`PidRegulator::update`] takes the
//! previous [`RegulatorState`] by reference and returns the next one; the
//! caller decides whether to commit it.

use crate::config::PidConfig;
use crate::constants::ACTION_THRESHOLD;
use crate::time::Timestamp;

/// Relay direction requested by one regulator step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    Hold,
    /// More air
    Up,
    /// Less air
    Down,
}

impl Action {
    /// Map a correction to a relay direction
    pub fn from_correction(correction: f32) -> Self {
        if correction > ACTION_THRESHOLD {
            Self::Up
        } else if correction < -ACTION_THRESHOLD {
            Self::Down
        } else {
            Self::Hold
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hold => "HOLD",
            Self::Up => "UP",
            Self::Down => "DOWN",
        }
    }
}

/// Regulator memory carried between cycles
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegulatorState {
    pub integral: f32,
    pub last_error: f32,
    /// When the computation last ran, `None` before the first run
    pub last_control_time: Option<Timestamp>,
}

impl RegulatorState {
    /// Milliseconds until the next computation is allowed, zero when due
    pub fn remaining_ms(&self, now: Timestamp, interval_ms: Timestamp) -> Timestamp {
        match self.last_control_time {
            None => 0,
            Some(last) => interval_ms.saturating_sub(now.saturating_sub(last)),
        }
    }

    /// Whether `interval_ms` has passed since the last computation
    pub fn is_due(&self, now: Timestamp, interval_ms: Timestamp) -> bool {
        self.remaining_ms(now, interval_ms) == 0
    }
}

/// Result of one regulator step
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Correction {
    pub error: f32,
    pub correction: f32,
    pub action: Action,
}

/// PID gains and limits for one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidRegulator {
    pub setpoint: f32,
    pub deadband: f32,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub max_correction: f32,
    /// Integration step in seconds
    pub dt: f32,
}

impl PidRegulator {
    pub fn new(config: &PidConfig) -> Self {
        Self {
            setpoint: config.o2_setpoint,
            deadband: config.deadband,
            kp: config.kp,
            ki: config.ki,
            kd: config.kd,
            max_correction: config.max_correction,
            dt: config.control_interval_s,
        }
    }

    /// Run one step on the measured oxygen.
    ///
    /// The returned state always has `last_control_time = Some(now)`, HOLD
    /// included, and never carries a NaN or infinite term. A non-finite
    /// measurement holds without touching the accumulated terms.
    pub fn update(
        &self,
        state: &RegulatorState,
        measured: f32,
        now: Timestamp,
    ) -> (RegulatorState, Correction) {
        let error = self.setpoint - measured;
        let integral = finite_or_zero(state.integral);
        let last_error = finite_or_zero(state.last_error);

        if !error.is_finite() {
            let next = RegulatorState {
                integral,
                last_error,
                last_control_time: Some(now),
            };
            return (next, Correction { error, correction: 0.0, action: Action::Hold });
        }

        if libm::fabsf(error) <= self.deadband {
            let next = RegulatorState {
                integral: 0.0,
                last_error: 0.0,
                last_control_time: Some(now),
            };
            return (next, Correction { error, correction: 0.0, action: Action::Hold });
        }

        // overflowing the accumulator restarts integration
        let integral = finite_or_zero(integral + error * self.dt);
        let derivative = (error - last_error) / self.dt;
        let output = self.kp * error + self.ki * integral + self.kd * derivative;
        let correction = clamp_symmetric(output, self.max_correction);

        let next = RegulatorState {
            integral,
            last_error: error,
            last_control_time: Some(now),
        };
        (next, Correction { error, correction, action: Action::from_correction(correction) })
    }
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Clamp to `[-limit, limit]`. A NaN output collapses to zero.
fn clamp_symmetric(value: f32, limit: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    let limit = libm::fabsf(limit);
    value.max(-limit).min(limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p_only() -> PidRegulator {
        PidRegulator {
            setpoint: 3.5,
            deadband: 0.1,
            kp: 0.8,
            ki: 0.0,
            kd: 0.0,
            max_correction: 0.8,
            dt: 10.0,
        }
    }

    #[test]
    fn proportional_step_goes_up() {
        let (state, out) = p_only().update(&RegulatorState::default(), 3.0, 1_000);

        assert!((out.error - 0.5).abs() < 1e-6);
        assert!((out.correction - 0.4).abs() < 1e-6);
        assert_eq!(out.action, Action::Up);
        assert_eq!(state.last_control_time, Some(1_000));
        assert!((state.last_error - 0.5).abs() < 1e-6);
    }

    #[test]
    fn too_much_oxygen_goes_down() {
        let (_, out) = p_only().update(&RegulatorState::default(), 4.5, 0);
        assert_eq!(out.action, Action::Down);
        assert!((out.correction + 0.8).abs() < 1e-6);
    }

    #[test]
    fn deadband_resets_memory() {
        let before = RegulatorState {
            integral: 12.0,
            last_error: 0.7,
            last_control_time: Some(5),
        };
        let (state, out) = p_only().update(&before, 3.45, 20_000);

        assert_eq!(out.correction, 0.0);
        assert_eq!(out.action, Action::Hold);
        assert_eq!(state.integral, 0.0);
        assert_eq!(state.last_error, 0.0);
        assert_eq!(state.last_control_time, Some(20_000));
    }

    #[test]
    fn integral_and_derivative_use_configured_step() {
        let regulator = PidRegulator { ki: 0.02, kd: 0.1, ..p_only() };
        let before = RegulatorState { integral: 1.0, last_error: 0.2, last_control_time: Some(0) };
        let (state, out) = regulator.update(&before, 3.2, 10_000);

        // error 0.3, integral 1 + 3 = 4, derivative 0.01
        assert!((state.integral - 4.0).abs() < 1e-5);
        let expected = 0.8 * 0.3 + 0.02 * 4.0 + 0.1 * 0.01;
        assert!((out.correction - expected).abs() < 1e-5);
    }

    #[test]
    fn gap_zone_reports_without_action() {
        let regulator = PidRegulator { kp: 0.3, ..p_only() };
        let (_, out) = regulator.update(&RegulatorState::default(), 3.2, 0);

        // error 0.3 is outside the deadband, correction 0.09 is under the threshold
        assert!(out.correction > 0.0);
        assert_eq!(out.action, Action::Hold);
    }

    #[test]
    fn rate_limit_window() {
        let state = RegulatorState { last_control_time: Some(1_000), ..Default::default() };
        assert_eq!(state.remaining_ms(4_000, 10_000), 7_000);
        assert!(!state.is_due(10_999, 10_000));
        assert!(state.is_due(11_000, 10_000));
        assert!(RegulatorState::default().is_due(0, 10_000));
    }

    #[test]
    fn nan_measurement_keeps_accumulated_terms() {
        let regulator = PidRegulator { ki: 0.02, ..p_only() };
        let before = RegulatorState { integral: 2.0, last_error: 0.4, last_control_time: Some(0) };
        let (state, out) = regulator.update(&before, f32::NAN, 10_000);

        assert_eq!(out.action, Action::Hold);
        assert_eq!(out.correction, 0.0);
        assert_eq!(state.integral, 2.0);
        assert_eq!(state.last_error, 0.4);
        assert_eq!(state.last_control_time, Some(10_000));
    }

    #[test]
    fn non_finite_state_restarts_integration() {
        let regulator = PidRegulator { ki: 0.02, kd: 0.1, ..p_only() };
        let poisoned = RegulatorState {
            integral: f32::NAN,
            last_error: f32::INFINITY,
            last_control_time: Some(0),
        };
        let (state, out) = regulator.update(&poisoned, 2.0, 10_000);

        // error 1.5 from a clean slate: integral 15, derivative 0.15
        assert!((state.integral - 15.0).abs() < 1e-5);
        assert_eq!(out.action, Action::Up);
        assert!(state.integral.is_finite() && state.last_error.is_finite());
    }

    #[test]
    fn nan_output_holds() {
        assert_eq!(clamp_symmetric(f32::NAN, 0.8), 0.0);
        assert_eq!(Action::from_correction(0.1), Action::Hold);
        assert_eq!(Action::from_correction(-0.11), Action::Down);
    }
}
