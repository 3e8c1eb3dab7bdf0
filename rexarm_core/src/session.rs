//! Session wiring: one arm, one state machine, shared buffers and four loops.
//!
//! - Acquisition: vision provider → `FrameStore`
//! - Control: one `StateMachine::run()` per tick
//! - Status: state, status text, joints and pose → `Readouts`
//! - Pointer: cursor → `resolve` → `Readouts`
//!
//! The loops share state only through `Arc`s of the controller, the state
//! machine and the buffers. A blocked control step does not stall the others.

use std::path::PathBuf;
use std::sync::Arc;

use rexarm_traits::{Joint, VisionProvider};

use crate::arm::{Apply, ArmController};
use crate::config::LoopPeriods;
use crate::error::{ArmError, Result};
use crate::frames::FrameStore;
use crate::loops::{acquisition_tick, control_tick, pointer_tick, status_tick};
use crate::observe::Readouts;
use crate::pointer::{CalibrationContext, DepthModel, DisplayRect, Pointer};
use crate::record::JointRecorder;
use crate::state_machine::{ArmState, BasicStateMachine, StateMachine};
use crate::worker::{TickFlow, Worker};

/// Everything a session needs besides the arm and the vision provider.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub periods: LoopPeriods,
    pub display: DisplayRect,
    pub depth: DepthModel,
    pub record_path: PathBuf,
    pub world_targets: Vec<[f64; 2]>,
    pub calibration: Option<CalibrationContext>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            periods: LoopPeriods::default(),
            display: DisplayRect::default(),
            depth: DepthModel::default(),
            record_path: PathBuf::from("op_joints.csv"),
            world_targets: vec![[-30.0, 30.0], [30.0, 30.0], [30.0, -30.0], [-30.0, -30.0]],
            calibration: None,
        }
    }
}

/// Slider-style manual input, staged together without touching hardware.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualInput {
    /// Joint targets in radians.
    pub positions: Vec<f64>,
    /// Normalized speed for every joint.
    pub speed: f64,
    /// Normalized torque limit for every joint.
    pub torque: f64,
    /// Gripper angle in radians. Unlike the joints it is written immediately.
    pub gripper: Option<f64>,
}

pub struct Session<J: Joint + Send + 'static> {
    arm: Arc<ArmController<J>>,
    sm: Arc<dyn StateMachine>,
    frames: Arc<FrameStore>,
    readouts: Arc<Readouts>,
    pointer: Arc<Pointer>,
    recorder: JointRecorder,
    cfg: SessionConfig,
    workers: Vec<Worker>,
}

impl<J: Joint + Send + 'static> std::fmt::Debug for Session<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.sm.current_state())
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl<J: Joint + Send + 'static> Session<J> {
    /// Session driven by `BasicStateMachine`.
    pub fn new(arm: ArmController<J>, cfg: SessionConfig) -> Self {
        let arm = Arc::new(arm);
        let pointer = Arc::new(Pointer::new());
        let sm = BasicStateMachine::new(arm.clone(), pointer.clone(), cfg.world_targets.clone())
            .with_calibration(cfg.calibration);
        Self::with_state_machine(arm, Arc::new(sm), pointer, cfg)
    }

    /// Session driven by a caller-supplied state machine.
    pub fn with_state_machine(
        arm: Arc<ArmController<J>>,
        sm: Arc<dyn StateMachine>,
        pointer: Arc<Pointer>,
        cfg: SessionConfig,
    ) -> Self {
        let frames = Arc::new(FrameStore::new(cfg.display.width(), cfg.display.height()));
        Self {
            arm,
            sm,
            frames,
            readouts: Arc::new(Readouts::new()),
            pointer,
            recorder: JointRecorder::new(cfg.record_path.clone()),
            cfg,
            workers: Vec::new(),
        }
    }

    pub fn arm(&self) -> &Arc<ArmController<J>> {
        &self.arm
    }

    pub fn state_machine(&self) -> &Arc<dyn StateMachine> {
        &self.sm
    }

    pub fn frames(&self) -> &Arc<FrameStore> {
        &self.frames
    }

    pub fn readouts(&self) -> &Arc<Readouts> {
        &self.readouts
    }

    pub fn pointer(&self) -> &Arc<Pointer> {
        &self.pointer
    }

    pub fn recorder(&self) -> &JointRecorder {
        &self.recorder
    }

    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    /// Worker names and tick counts.
    pub fn worker_ticks(&self) -> Vec<(String, u64)> {
        self.workers
            .iter()
            .map(|w| (w.name().to_string(), w.ticks()))
            .collect()
    }

    /// Spawn the four loops.
    pub fn start<V: VisionProvider + Send + 'static>(&mut self, vision: V) -> Result<()> {
        if self.is_running() {
            return Err(ArmError::State("session already started".into()).into());
        }
        let p = self.cfg.periods;

        let frames = self.frames.clone();
        let mut vision = vision;
        let acquisition = Worker::spawn("rexarm-acquisition", p.acquisition, move || {
            if let Err(e) = acquisition_tick(&mut vision, &frames) {
                tracing::warn!(error = %e, "acquisition failed; previous frame kept");
            }
            TickFlow::Continue
        })?;

        let sm = self.sm.clone();
        let control = Worker::spawn("rexarm-control", p.control, move || {
            control_tick(sm.as_ref());
            TickFlow::Continue
        })?;

        let (sm, arm, readouts) = (self.sm.clone(), self.arm.clone(), self.readouts.clone());
        let status = Worker::spawn("rexarm-status", p.status, move || {
            status_tick(sm.as_ref(), &arm, &readouts);
            TickFlow::Continue
        })?;

        let (sm, frames, readouts, pointer) = (
            self.sm.clone(),
            self.frames.clone(),
            self.readouts.clone(),
            self.pointer.clone(),
        );
        let (rect, model) = (self.cfg.display, self.cfg.depth);
        let pointer_worker = Worker::spawn("rexarm-pointer", p.pointer, move || {
            pointer_tick(&pointer, &rect, &frames, sm.as_ref(), &model, &readouts);
            TickFlow::Continue
        })?;

        self.workers = vec![acquisition, control, status, pointer_worker];
        tracing::info!(
            acquisition = ?p.acquisition,
            control = ?p.control,
            status = ?p.status,
            pointer = ?p.pointer,
            "session started"
        );
        Ok(())
    }

    /// Set the arm's estop flag, then ask the state machine for `estop`.
    pub fn trigger_estop(&self) {
        self.arm.estop();
        self.sm.set_next_state(ArmState::Estop.as_str());
        tracing::warn!("estop requested");
    }

    /// Leave estop by transitioning to `idle`; the flag clears on that transition.
    pub fn clear_estop(&self) {
        self.sm.set_next_state(ArmState::Idle.as_str());
    }

    pub fn request_state(&self, name: &str) {
        self.sm.set_next_state(name);
    }

    /// Clear the record file and enter teach.
    pub fn begin_teach(&self) -> Result<()> {
        self.recorder.reset()?;
        self.sm.set_next_state(ArmState::Teach.as_str());
        Ok(())
    }

    /// Append the current feedback positions to the record file. Teach only.
    pub fn record_joints(&self) -> Result<Vec<f64>> {
        let state = self.sm.current_state();
        if state != ArmState::Teach.as_str() {
            return Err(ArmError::State(format!("recording requires teach, current state is {state}")).into());
        }
        let positions = self.arm.feedback().positions.clone();
        self.recorder.append(&positions)?;
        Ok(positions)
    }

    /// Stage torque, speed and positions together, then move the gripper if
    /// one is requested. Returns the clamped joint targets.
    pub fn stage_manual(&self, input: &ManualInput) -> Result<Vec<f64>> {
        let n = self.arm.joint_count();
        self.arm.set_torque_limits(&vec![input.torque; n], Apply::Defer)?;
        self.arm.set_speeds_normalized_global(input.speed, Apply::Defer)?;
        let staged = self.arm.set_positions(&input.positions, Apply::Defer)?;
        if let Some(rad) = input.gripper {
            self.arm.set_gripper_position(rad)?;
        }
        Ok(staged)
    }

    pub fn move_pointer(&self, x: i32, y: i32) {
        self.pointer.move_to(x, y);
    }

    /// Returns whether the click landed inside the video area.
    pub fn click(&self, x: i32, y: i32) -> bool {
        self.pointer.click(x, y, &self.cfg.display)
    }

    /// Stop and join every loop. Idempotent.
    pub fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        while let Some(mut w) = self.workers.pop() {
            w.stop();
        }
        tracing::info!("session stopped");
    }
}

impl<J: Joint + Send + 'static> Drop for Session<J> {
    fn drop(&mut self) {
        self.stop();
    }
}
