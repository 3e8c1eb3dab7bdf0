//! `From` implementations bridging `rexarm_config` types to `rexarm_core` types.
//!
//! Degrees in the file become radians here; millisecond periods become `Duration`s.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{AngleLimits, ArmSettings, GripperSettings, LoopPeriods};
use crate::error::BuildError;
use crate::kinematics::{DhChain, DhLink};
use crate::pointer::{CalibrationContext, DepthModel, DisplayRect};
use crate::session::SessionConfig;

// ── AngleLimits ──────────────────────────────────────────────────────────────

impl TryFrom<&rexarm_config::ArmCfg> for AngleLimits {
    type Error = BuildError;

    fn try_from(c: &rexarm_config::ArmCfg) -> Result<Self, Self::Error> {
        Self::from_degrees(&c.limits_deg)
    }
}

// ── ArmSettings ──────────────────────────────────────────────────────────────

impl From<&rexarm_config::Config> for ArmSettings {
    fn from(c: &rexarm_config::Config) -> Self {
        Self {
            default_torque: c.arm.default_torque,
            default_speed: c.arm.default_speed,
            pause_poll: Duration::from_millis(c.arm.pause_poll_ms),
            io_retries: c.hardware.io_retries,
        }
    }
}

// ── GripperSettings ──────────────────────────────────────────────────────────

impl From<&rexarm_config::GripperCfg> for GripperSettings {
    fn from(c: &rexarm_config::GripperCfg) -> Self {
        Self {
            open: c.open_deg.to_radians(),
            closed: c.closed_deg.to_radians(),
            torque: c.torque,
            speed: c.speed,
            toggle_pause: Duration::from_millis(c.toggle_pause_ms),
        }
    }
}

// ── LoopPeriods ──────────────────────────────────────────────────────────────

impl From<&rexarm_config::LoopsCfg> for LoopPeriods {
    fn from(c: &rexarm_config::LoopsCfg) -> Self {
        Self {
            acquisition: Duration::from_millis(c.acquisition_ms),
            control: Duration::from_millis(c.control_ms),
            status: Duration::from_millis(c.status_ms),
            pointer: Duration::from_millis(c.pointer_ms),
        }
    }
}

// ── Kinematics ───────────────────────────────────────────────────────────────

impl From<&rexarm_config::DhLinkCfg> for DhLink {
    fn from(c: &rexarm_config::DhLinkCfg) -> Self {
        Self {
            a: c.a,
            alpha: c.alpha_deg.to_radians(),
            d: c.d,
            theta_offset: c.theta_offset_deg.to_radians(),
        }
    }
}

impl From<&rexarm_config::KinematicsCfg> for DhChain {
    fn from(c: &rexarm_config::KinematicsCfg) -> Self {
        Self::new(c.links.iter().map(DhLink::from).collect())
    }
}

// ── Pointer pipeline ─────────────────────────────────────────────────────────

impl From<&rexarm_config::DisplayCfg> for DisplayRect {
    fn from(c: &rexarm_config::DisplayCfg) -> Self {
        Self {
            min_x: c.min_x,
            max_x: c.max_x,
            min_y: c.min_y,
            max_y: c.max_y,
        }
    }
}

impl From<&rexarm_config::DepthCfg> for DepthModel {
    fn from(c: &rexarm_config::DepthCfg) -> Self {
        Self {
            scale: c.scale,
            divisor: c.divisor,
            phase: c.phase,
            plane_offset: c.plane_offset,
        }
    }
}

impl From<&rexarm_config::PersistedCameraCalibration> for CalibrationContext {
    fn from(c: &rexarm_config::PersistedCameraCalibration) -> Self {
        Self::new(c.pixel_origin[0], c.pixel_origin[1], c.affine)
    }
}

// ── SessionConfig ────────────────────────────────────────────────────────────

impl From<&rexarm_config::Config> for SessionConfig {
    fn from(c: &rexarm_config::Config) -> Self {
        Self {
            periods: LoopPeriods::from(&c.loops),
            display: DisplayRect::from(&c.display),
            depth: DepthModel::from(&c.depth),
            record_path: PathBuf::from(&c.record.path),
            world_targets: c.calibration_targets.world_points.clone(),
            calibration: c.camera_calibration.as_ref().map(CalibrationContext::from),
        }
    }
}
