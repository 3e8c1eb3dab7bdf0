//! Runtime configuration types for the arm control core.
//!
//! These are the validated, unit-converted structs used by `ArmController` and
//! the session loops. They are separate from the TOML-deserialized config in
//! `rexarm_config`; see `conversions` for the mapping.

use std::time::Duration;

use crate::error::BuildError;

/// Per-joint `(min, max)` bounds in radians.
///
/// Immutable after construction; `min < max` holds for every joint.
#[derive(Debug, Clone, PartialEq)]
pub struct AngleLimits {
    bounds: Vec<(f64, f64)>,
}

impl AngleLimits {
    pub fn new(bounds: Vec<(f64, f64)>) -> Result<Self, BuildError> {
        if bounds.is_empty() {
            return Err(BuildError::InvalidConfig("angle limits must cover at least one joint"));
        }
        if bounds
            .iter()
            .any(|(lo, hi)| !lo.is_finite() || !hi.is_finite() || lo >= hi)
        {
            return Err(BuildError::InvalidConfig("angle limits require finite min < max"));
        }
        Ok(Self { bounds })
    }

    /// Build from degree pairs.
    pub fn from_degrees(bounds: &[(f64, f64)]) -> Result<Self, BuildError> {
        Self::new(
            bounds
                .iter()
                .map(|(lo, hi)| (lo.to_radians(), hi.to_radians()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    /// Clip one joint's angle into its range. Silent by policy.
    ///
    /// NaN has no nearest bound, so it maps to the in-range value closest to
    /// home (0 rad). Infinities clip like any other out-of-range value.
    #[inline]
    pub fn clamp_one(&self, joint: usize, angle: f64) -> f64 {
        match self.bounds.get(joint) {
            Some(&(lo, hi)) => {
                if angle.is_nan() {
                    0.0f64.clamp(lo, hi)
                } else if angle > hi {
                    hi
                } else if angle < lo {
                    lo
                } else {
                    angle
                }
            }
            None => angle,
        }
    }

    /// Element-wise clamp; `angles` is expected to hold one entry per joint.
    pub fn clamp(&self, angles: &[f64]) -> Vec<f64> {
        angles
            .iter()
            .enumerate()
            .map(|(i, &a)| self.clamp_one(i, a))
            .collect()
    }
}

/// Controller defaults and I/O policy.
#[derive(Debug, Clone)]
pub struct ArmSettings {
    /// Torque limit applied by `initialize` (0..=1).
    pub default_torque: f64,
    /// Speed applied by `initialize` (0..=1).
    pub default_speed: f64,
    /// Feedback poll interval inside `pause`.
    pub pause_poll: Duration,
    /// Extra attempts for a capability call that timed out.
    pub io_retries: u32,
}

impl Default for ArmSettings {
    fn default() -> Self {
        Self {
            default_torque: 0.5,
            default_speed: 0.25,
            pause_poll: Duration::from_millis(50),
            io_retries: 2,
        }
    }
}

/// Gripper setpoints (radians) and defaults.
#[derive(Debug, Clone)]
pub struct GripperSettings {
    pub open: f64,
    pub closed: f64,
    pub torque: f64,
    pub speed: f64,
    pub toggle_pause: Duration,
}

impl Default for GripperSettings {
    fn default() -> Self {
        Self {
            open: (-90.0f64).to_radians(),
            closed: 75.0f64.to_radians(),
            torque: 1.0,
            speed: 0.8,
            toggle_pause: Duration::from_secs(1),
        }
    }
}

/// Periods of the four session workers.
#[derive(Debug, Clone, Copy)]
pub struct LoopPeriods {
    pub acquisition: Duration,
    pub control: Duration,
    pub status: Duration,
    pub pointer: Duration,
}

impl Default for LoopPeriods {
    fn default() -> Self {
        Self {
            acquisition: Duration::from_millis(30),
            control: Duration::from_millis(50),
            status: Duration::from_millis(100),
            pointer: Duration::from_millis(50),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_bounds() {
        assert!(AngleLimits::new(vec![(0.5, -0.5)]).is_err());
        assert!(AngleLimits::new(vec![(0.0, 0.0)]).is_err());
        assert!(AngleLimits::new(vec![]).is_err());
        assert!(AngleLimits::new(vec![(f64::NAN, 1.0)]).is_err());
    }

    #[test]
    fn clamp_is_identity_in_range() {
        let l = AngleLimits::new(vec![(-1.0, 1.0), (0.0, 2.0)]).unwrap();
        assert_eq!(l.clamp(&[0.25, 1.5]), vec![0.25, 1.5]);
        assert_eq!(l.clamp(&[-3.0, 9.0]), vec![-1.0, 2.0]);
    }

    #[test]
    fn non_finite_targets_land_in_range() {
        let l = AngleLimits::new(vec![(-1.0, 1.0), (0.5, 2.0), (-2.0, -0.5)]).unwrap();
        assert_eq!(l.clamp(&[f64::NAN; 3]), vec![0.0, 0.5, -0.5]);
        assert_eq!(
            l.clamp(&[f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY]),
            vec![1.0, 0.5, -0.5]
        );
    }
}
