//! State machine contract driven by the control loop, plus a basic implementation.
//!
//! The control loop calls `run()` once per tick. Everything else on the trait
//! takes `&self` and only touches short-lived locks, so an estop request from
//! another thread never waits behind a step that is blocked on actuator I/O.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use nalgebra::{Matrix3, Vector2};
use parking_lot::Mutex;
use rexarm_traits::Joint;

use crate::arm::{Apply, ArmController};
use crate::calibration::{CalibrationCapture, CaptureStep};
use crate::error::{ArmError, Result};
use crate::pointer::{CalibrationContext, Pointer};

pub trait StateMachine: Send + Sync {
    /// Advance one step.
    fn run(&self) -> Result<()>;
    /// Request a transition, applied at the start of the next step.
    fn set_next_state(&self, name: &str);
    fn current_state(&self) -> String;
    fn status_message(&self) -> String;
    /// State name and status message as one consistent pair.
    fn status_pair(&self) -> (String, String) {
        (self.current_state(), self.status_message())
    }
    fn is_calibrated(&self) -> bool;
    fn pixel_origin(&self) -> Vector2<f64>;
    fn affine(&self) -> Matrix3<f64>;

    /// Calibration context, present only once calibration is complete.
    fn calibration_context(&self) -> Option<CalibrationContext> {
        if self.is_calibrated() {
            Some(CalibrationContext {
                pixel_origin: self.pixel_origin(),
                affine: self.affine(),
            })
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmState {
    Idle,
    Manual,
    Estop,
    Teach,
    Calibrate,
}

impl ArmState {
    pub const ALL: [Self; 5] = [
        Self::Idle,
        Self::Manual,
        Self::Estop,
        Self::Teach,
        Self::Calibrate,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Manual => "manual",
            Self::Estop => "estop",
            Self::Teach => "teach",
            Self::Calibrate => "calibrate",
        }
    }
}

impl fmt::Display for ArmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArmState {
    type Err = ArmError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ArmError::State(format!("unknown state '{s}'")))
    }
}

/// Reference state machine: idle, manual, estop, teach and calibrate.
pub struct BasicStateMachine<J: Joint> {
    arm: Arc<ArmController<J>>,
    pointer: Arc<Pointer>,
    world_targets: Vec<[f64; 2]>,
    /// Serializes steps.
    step: Mutex<()>,
    next: Mutex<Option<ArmState>>,
    current: Mutex<ArmState>,
    /// Message together with the state it describes.
    status: ArcSwap<(ArmState, String)>,
    capture: Mutex<CalibrationCapture>,
    calibration: Mutex<Option<CalibrationContext>>,
}

impl<J: Joint> fmt::Debug for BasicStateMachine<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicStateMachine")
            .field("current", &*self.current.lock())
            .field("calibrated", &self.calibration.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl<J: Joint + Send> BasicStateMachine<J> {
    pub fn new(arm: Arc<ArmController<J>>, pointer: Arc<Pointer>, world_targets: Vec<[f64; 2]>) -> Self {
        Self {
            arm,
            pointer,
            world_targets,
            step: Mutex::new(()),
            next: Mutex::new(None),
            current: Mutex::new(ArmState::Idle),
            status: ArcSwap::from_pointee((ArmState::Idle, "Waiting for input".to_string())),
            capture: Mutex::new(CalibrationCapture::new()),
            calibration: Mutex::new(None),
        }
    }

    /// Start out calibrated, e.g. from a persisted calibration.
    pub fn with_calibration(self, ctx: Option<CalibrationContext>) -> Self {
        *self.calibration.lock() = ctx;
        self
    }

    pub fn state(&self) -> ArmState {
        *self.current.lock()
    }

    /// Typed variant of `set_next_state`. A pending estop request is never
    /// replaced by a different state.
    pub fn request(&self, state: ArmState) {
        let mut next = self.next.lock();
        if *next == Some(ArmState::Estop) && state != ArmState::Estop {
            tracing::warn!(requested = %state, "estop pending, request dropped");
            return;
        }
        *next = Some(state);
    }

    fn set_status(&self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::debug!(status = %msg, "status message");
        self.status.store(Arc::new((self.state(), msg)));
    }

    fn transition(&self, from: ArmState, to: ArmState) -> Result<()> {
        tracing::info!(%from, %to, "state transition");
        if from == ArmState::Estop {
            self.arm.clear_estop();
        }
        if to == ArmState::Estop {
            self.arm.estop();
        }
        *self.current.lock() = to;
        self.set_status(match to {
            ArmState::Idle => "Waiting for input",
            ArmState::Estop => "EMERGENCY STOP: torque disabled",
            ArmState::Manual => "Manual mode: commands are flushed every step",
            ArmState::Teach => "Teach mode: move the arm by hand and record positions",
            ArmState::Calibrate => "Calibration: click the arm base",
        });
        match to {
            ArmState::Idle => {}
            ArmState::Estop | ArmState::Teach => self.arm.disable_torque()?,
            ArmState::Manual => {
                // Hold the current pose so enabling torque does not jump to stale targets.
                let here = self.arm.get_positions()?;
                self.arm.set_positions(&here, Apply::Defer)?;
                self.arm.enable_torque()?;
            }
            ArmState::Calibrate => {
                *self.capture.lock() = CalibrationCapture::new();
                self.pointer.take_click();
            }
        }
        Ok(())
    }

    fn calibrate_step(&self) -> Result<()> {
        let Some((x, y)) = self.pointer.take_click() else {
            return Ok(());
        };
        let step = self.capture.lock().click(x, y, &self.world_targets);
        match step {
            Ok(CaptureStep::OriginSet) => {
                self.set_status(format!(
                    "Calibration: click reference point 1 of {}",
                    self.world_targets.len()
                ));
            }
            Ok(CaptureStep::PointRecorded { index, .. }) => {
                self.set_status(format!(
                    "Calibration: click reference point {} of {}",
                    index + 2,
                    self.world_targets.len()
                ));
            }
            Ok(CaptureStep::Complete(ctx)) => {
                tracing::info!(origin = ?ctx.pixel_origin, map = ?ctx.map(), "camera calibrated");
                *self.calibration.lock() = Some(ctx);
                self.set_status("Calibration complete");
                self.request(ArmState::Idle);
            }
            Err(e) => {
                *self.capture.lock() = CalibrationCapture::new();
                self.set_status("Calibration failed: click the arm base to restart");
                return Err(e.wrap_err(ArmError::Calibration("reference fit failed".into())));
            }
        }
        Ok(())
    }
}

impl<J: Joint + Send> StateMachine for BasicStateMachine<J> {
    fn run(&self) -> Result<()> {
        let _step = self.step.lock();
        let requested = self.next.lock().take();
        let current = self.state();
        if let Some(next) = requested
            && next != current
        {
            self.transition(current, next)?;
        }

        self.arm.get_feedback()?;

        match self.state() {
            ArmState::Idle | ArmState::Estop | ArmState::Teach => Ok(()),
            ArmState::Manual => self.arm.send_commands(),
            ArmState::Calibrate => self.calibrate_step(),
        }
    }

    fn set_next_state(&self, name: &str) {
        match name.parse::<ArmState>() {
            Ok(state) => self.request(state),
            Err(e) => tracing::warn!(requested = name, error = %e, "state request rejected"),
        }
    }

    fn current_state(&self) -> String {
        self.state().as_str().to_string()
    }

    fn status_message(&self) -> String {
        self.status.load().1.clone()
    }

    fn status_pair(&self) -> (String, String) {
        let pair = self.status.load();
        (pair.0.as_str().to_string(), pair.1.clone())
    }

    fn is_calibrated(&self) -> bool {
        self.calibration.lock().is_some()
    }

    fn pixel_origin(&self) -> Vector2<f64> {
        self.calibration
            .lock()
            .map_or_else(Vector2::zeros, |c| c.pixel_origin)
    }

    fn affine(&self) -> Matrix3<f64> {
        self.calibration
            .lock()
            .map_or_else(Matrix3::identity, |c| c.affine)
    }
}
