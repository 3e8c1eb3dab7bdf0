//! Arm controller: the single owner of the joint bus.
//!
//! - Commanded state is intent; feedback state is the last observed hardware truth.
//! - Feedback is published through an `ArcSwap`, so readers always get a whole snapshot.
//! - The estop flag is a shared atomic; it is checked by `pause` and before
//!   every joint write of a command that would move hardware, so a batch stops
//!   at the next joint once estop is set.
//!
//! Concurrency: all actuator I/O runs under one bus mutex. Partial feedback polls
//! publish while holding it, so two polls never lose each other's arrays.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use rexarm_traits::clock::{Clock, MonotonicClock};
use rexarm_traits::{CapError, Joint};

use crate::config::{AngleLimits, ArmSettings, GripperSettings};
use crate::error::{ActuatorFault, ArmError, BuildError, JointId, Result};
use crate::hw_error::map_hw_error;
use crate::kinematics::{DhChain, Pose};

/// Smallest normalized speed sent for an engineering speed (one register step above stall).
pub const MIN_SPEED_NORMALIZED: f64 = 3.0 / 1023.0;

/// Whether a setter writes hardware now or only stages the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Apply {
    /// Stage into commanded state and issue the hardware command.
    Now,
    /// Stage only; flush later with `send_commands`.
    Defer,
}

/// Cloneable trigger for the controller's estop flag, usable from signal
/// handlers and other threads without holding the controller.
#[derive(Debug, Clone)]
pub struct EstopHandle {
    flag: Arc<AtomicBool>,
}

impl EstopHandle {
    pub fn trigger(&self) {
        if !self.flag.swap(true, Ordering::SeqCst) {
            tracing::warn!("emergency stop set");
        }
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// How a `pause` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseOutcome {
    Elapsed,
    Estopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandedState {
    /// Radians, clamped into the angle limits.
    pub positions: Vec<f64>,
    /// Normalized 0..=1.
    pub speeds: Vec<f64>,
    /// Normalized 0..=1.
    pub torque_limits: Vec<f64>,
}

impl CommandedState {
    fn new(n: usize) -> Self {
        Self {
            positions: vec![0.0; n],
            speeds: vec![1.0; n],
            torque_limits: vec![1.0; n],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedbackState {
    pub positions: Vec<f64>,
    pub speeds: Vec<f64>,
    pub loads: Vec<f64>,
    pub temps: Vec<f64>,
    pub moving: Vec<bool>,
}

impl FeedbackState {
    fn new(n: usize) -> Self {
        Self {
            positions: vec![0.0; n],
            speeds: vec![0.0; n],
            loads: vec![0.0; n],
            temps: vec![0.0; n],
            moving: vec![false; n],
        }
    }
}

struct Bus<J> {
    joints: Vec<J>,
    gripper: Option<J>,
    gripper_closed: bool,
}

pub struct ArmController<J: Joint> {
    bus: Mutex<Bus<J>>,
    limits: AngleLimits,
    chain: DhChain,
    settings: ArmSettings,
    gripper_settings: GripperSettings,
    commanded: Mutex<CommandedState>,
    feedback: ArcSwap<FeedbackState>,
    estop: EstopHandle,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl<J: Joint> std::fmt::Debug for ArmController<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmController")
            .field("joints", &self.limits.len())
            .field("has_gripper", &self.has_gripper())
            .field("estopped", &self.is_estopped())
            .finish_non_exhaustive()
    }
}

/// Builder for `ArmController`.
pub struct ArmBuilder<J: Joint> {
    joints: Vec<J>,
    gripper: Option<J>,
    limits: Option<AngleLimits>,
    chain: Option<DhChain>,
    settings: ArmSettings,
    gripper_settings: GripperSettings,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl<J: Joint> Default for ArmBuilder<J> {
    fn default() -> Self {
        Self {
            joints: Vec::new(),
            gripper: None,
            limits: None,
            chain: None,
            settings: ArmSettings::default(),
            gripper_settings: GripperSettings::default(),
            clock: None,
        }
    }
}

impl<J: Joint> ArmBuilder<J> {
    pub fn joints(mut self, joints: Vec<J>) -> Self {
        self.joints = joints;
        self
    }

    pub fn gripper(mut self, gripper: Option<J>) -> Self {
        self.gripper = gripper;
        self
    }

    pub fn limits(mut self, limits: AngleLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    pub fn kinematics(mut self, chain: DhChain) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn settings(mut self, settings: ArmSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn gripper_settings(mut self, settings: GripperSettings) -> Self {
        self.gripper_settings = settings;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Apply limits, kinematics and defaults from a validated config.
    pub fn apply_config(mut self, cfg: &rexarm_config::Config) -> Result<Self> {
        let limits = AngleLimits::try_from(&cfg.arm).map_err(eyre::Report::new)?;
        self.limits = Some(limits);
        self.chain = Some(DhChain::from(&cfg.kinematics));
        self.settings = ArmSettings::from(cfg);
        self.gripper_settings = GripperSettings::from(&cfg.gripper);
        Ok(self)
    }

    pub fn try_build(self) -> Result<ArmController<J>> {
        if self.joints.is_empty() {
            return Err(eyre::Report::new(BuildError::MissingJoints));
        }
        let limits = self
            .limits
            .ok_or_else(|| eyre::Report::new(BuildError::MissingLimits))?;
        let chain = self
            .chain
            .ok_or_else(|| eyre::Report::new(BuildError::MissingKinematics))?;
        let n = self.joints.len();
        if limits.len() != n || chain.len() != n {
            return Err(eyre::Report::new(BuildError::JointCount {
                joints: n,
                limits: limits.len(),
                links: chain.len(),
            }));
        }
        for (name, v) in [
            ("default_torque", self.settings.default_torque),
            ("default_speed", self.settings.default_speed),
        ] {
            if !(0.0..=1.0).contains(&v) {
                tracing::error!(field = name, value = v, "arm default out of range");
                return Err(eyre::Report::new(BuildError::InvalidConfig(
                    "arm defaults must be in [0.0, 1.0]",
                )));
            }
        }
        if self.settings.pause_poll.is_zero() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "pause poll interval must be > 0",
            )));
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        Ok(ArmController {
            bus: Mutex::new(Bus {
                joints: self.joints,
                gripper: self.gripper,
                gripper_closed: true,
            }),
            limits,
            chain,
            settings: self.settings,
            gripper_settings: self.gripper_settings,
            commanded: Mutex::new(CommandedState::new(n)),
            feedback: ArcSwap::from_pointee(FeedbackState::new(n)),
            estop: EstopHandle {
                flag: Arc::new(AtomicBool::new(false)),
            },
            clock,
        })
    }
}

/// Map NaN to 0 and clip into 0..=1.
#[inline]
fn unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

impl<J: Joint> ArmController<J> {
    pub fn builder() -> ArmBuilder<J> {
        ArmBuilder::default()
    }

    pub fn joint_count(&self) -> usize {
        self.limits.len()
    }

    pub fn limits(&self) -> &AngleLimits {
        &self.limits
    }

    pub fn kinematics(&self) -> &DhChain {
        &self.chain
    }

    pub fn has_gripper(&self) -> bool {
        self.bus.lock().gripper.is_some()
    }

    pub fn gripper_closed(&self) -> bool {
        self.bus.lock().gripper_closed
    }

    // ── estop ────────────────────────────────────────────────────────────────

    pub fn estop(&self) {
        self.estop.trigger();
    }

    pub fn estop_handle(&self) -> EstopHandle {
        self.estop.clone()
    }

    pub fn clear_estop(&self) {
        if self.estop.flag.swap(false, Ordering::SeqCst) {
            tracing::info!("emergency stop cleared");
        }
    }

    pub fn is_estopped(&self) -> bool {
        self.estop.is_set()
    }

    fn ensure_not_estopped(&self) -> std::result::Result<(), ArmError> {
        if self.is_estopped() {
            Err(ArmError::Estopped)
        } else {
            Ok(())
        }
    }

    fn check_len(&self, got: usize) -> std::result::Result<(), ArmError> {
        let expected = self.joint_count();
        if got == expected {
            Ok(())
        } else {
            Err(ArmError::JointCountMismatch { expected, got })
        }
    }

    /// Run one capability call, retrying timeouts up to `io_retries` extra times.
    fn io<T>(
        &self,
        joint: JointId,
        op: &'static str,
        mut call: impl FnMut() -> std::result::Result<T, CapError>,
    ) -> std::result::Result<T, ArmError> {
        let mut attempt: u32 = 0;
        loop {
            match call() {
                Ok(v) => return Ok(v),
                Err(e) => {
                    let cause = map_hw_error(&*e);
                    if cause == ActuatorFault::Timeout && attempt < self.settings.io_retries {
                        attempt += 1;
                        tracing::warn!(%joint, op, attempt, "actuator timeout, retrying");
                        continue;
                    }
                    tracing::error!(%joint, op, %cause, "actuator call failed");
                    return Err(ArmError::Actuator { joint, op, cause });
                }
            }
        }
    }

    // ── lifecycle ────────────────────────────────────────────────────────────

    /// Torque on, home every joint, apply default torque/speed; close the gripper.
    pub fn initialize(&self) -> Result<()> {
        self.ensure_not_estopped()?;
        let n = self.joint_count();
        let mut bus = self.bus.lock();
        let s = &self.settings;
        for (i, j) in bus.joints.iter_mut().enumerate() {
            self.ensure_not_estopped()?;
            let id = JointId::Arm(i);
            self.io(id, "enable_torque", || j.enable_torque())?;
            self.io(id, "set_position", || j.set_position(0.0))?;
            self.io(id, "set_torque_limit", || j.set_torque_limit(s.default_torque))?;
            self.io(id, "set_speed", || j.set_speed(s.default_speed))?;
        }
        {
            let mut cmd = self.commanded.lock();
            cmd.positions = vec![0.0; n];
            cmd.speeds = vec![s.default_speed; n];
            cmd.torque_limits = vec![s.default_torque; n];
        }
        let g = &self.gripper_settings;
        let bus = &mut *bus;
        let has_gripper = if let Some(grip) = bus.gripper.as_mut() {
            self.ensure_not_estopped()?;
            self.io(JointId::Gripper, "set_torque_limit", || {
                grip.set_torque_limit(g.torque)
            })?;
            self.io(JointId::Gripper, "set_speed", || grip.set_speed(g.speed))?;
            self.io(JointId::Gripper, "set_position", || {
                grip.set_position(g.closed)
            })?;
            bus.gripper_closed = true;
            true
        } else {
            false
        };
        tracing::info!(joints = n, gripper = has_gripper, "arm initialized");
        Ok(())
    }

    // ── setters ──────────────────────────────────────────────────────────────

    /// Clamp, stage and optionally issue joint targets. Returns the clamped targets.
    pub fn set_positions(&self, targets: &[f64], apply: Apply) -> Result<Vec<f64>> {
        self.check_len(targets.len())?;
        if apply == Apply::Now {
            self.ensure_not_estopped()?;
        }
        let clamped = self.limits.clamp(targets);
        self.commanded.lock().positions.clone_from(&clamped);
        if apply == Apply::Now {
            let mut bus = self.bus.lock();
            for (i, (j, &p)) in bus.joints.iter_mut().zip(&clamped).enumerate() {
                self.ensure_not_estopped()?;
                self.io(JointId::Arm(i), "set_position", || j.set_position(p))?;
            }
        }
        tracing::trace!(?clamped, ?apply, "positions staged");
        Ok(clamped)
    }

    pub fn set_speeds_normalized(&self, values: &[f64], apply: Apply) -> Result<()> {
        self.check_len(values.len())?;
        if apply == Apply::Now {
            self.ensure_not_estopped()?;
        }
        let speeds: Vec<f64> = values.iter().copied().map(unit).collect();
        self.commanded.lock().speeds.clone_from(&speeds);
        if apply == Apply::Now {
            self.write_speeds(&speeds)?;
        }
        Ok(())
    }

    /// Broadcast one normalized speed to every joint.
    pub fn set_speeds_normalized_global(&self, value: f64, apply: Apply) -> Result<()> {
        self.set_speeds_normalized(&vec![value; self.joint_count()], apply)
    }

    /// Engineering speeds (rad/s) → normalized `|v / max_speed|`, floored at
    /// `MIN_SPEED_NORMALIZED`. Returns the normalized values.
    pub fn set_speeds(&self, rad_per_s: &[f64], apply: Apply) -> Result<Vec<f64>> {
        self.check_len(rad_per_s.len())?;
        let normalized: Vec<f64> = {
            let bus = self.bus.lock();
            bus.joints
                .iter()
                .zip(rad_per_s)
                .map(|(j, &v)| {
                    let max = j.max_speed();
                    let n = if max > 0.0 { (v / max).abs() } else { 1.0 };
                    unit(n).max(MIN_SPEED_NORMALIZED)
                })
                .collect()
        };
        self.set_speeds_normalized(&normalized, apply)?;
        Ok(normalized)
    }

    pub fn set_torque_limits(&self, values: &[f64], apply: Apply) -> Result<()> {
        self.check_len(values.len())?;
        if apply == Apply::Now {
            self.ensure_not_estopped()?;
        }
        let torques: Vec<f64> = values.iter().copied().map(unit).collect();
        self.commanded.lock().torque_limits.clone_from(&torques);
        if apply == Apply::Now {
            let mut bus = self.bus.lock();
            for (i, (j, &t)) in bus.joints.iter_mut().zip(&torques).enumerate() {
                self.ensure_not_estopped()?;
                self.io(JointId::Arm(i), "set_torque_limit", || j.set_torque_limit(t))?;
            }
        }
        Ok(())
    }

    fn write_speeds(&self, speeds: &[f64]) -> std::result::Result<(), ArmError> {
        let mut bus = self.bus.lock();
        for (i, (j, &s)) in bus.joints.iter_mut().zip(speeds).enumerate() {
            self.ensure_not_estopped()?;
            self.io(JointId::Arm(i), "set_speed", || j.set_speed(s))?;
        }
        Ok(())
    }

    /// Re-issue the whole commanded state: one position, speed and torque
    /// command per joint.
    pub fn send_commands(&self) -> Result<()> {
        self.ensure_not_estopped()?;
        let cmd = self.commanded();
        let mut bus = self.bus.lock();
        for (i, j) in bus.joints.iter_mut().enumerate() {
            self.ensure_not_estopped()?;
            let id = JointId::Arm(i);
            self.io(id, "set_position", || j.set_position(cmd.positions[i]))?;
            self.io(id, "set_speed", || j.set_speed(cmd.speeds[i]))?;
            self.io(id, "set_torque_limit", || {
                j.set_torque_limit(cmd.torque_limits[i])
            })?;
        }
        tracing::trace!("commanded state flushed");
        Ok(())
    }

    pub fn commanded(&self) -> CommandedState {
        self.commanded.lock().clone()
    }

    pub fn enable_torque(&self) -> Result<()> {
        self.ensure_not_estopped()?;
        let mut bus = self.bus.lock();
        for (i, j) in bus.joints.iter_mut().enumerate() {
            self.ensure_not_estopped()?;
            self.io(JointId::Arm(i), "enable_torque", || j.enable_torque())?;
        }
        Ok(())
    }

    /// Allowed while estopped.
    pub fn disable_torque(&self) -> Result<()> {
        let mut bus = self.bus.lock();
        for (i, j) in bus.joints.iter_mut().enumerate() {
            self.io(JointId::Arm(i), "disable_torque", || j.disable_torque())?;
        }
        Ok(())
    }

    // ── feedback ─────────────────────────────────────────────────────────────

    fn poll_all<T>(
        &self,
        bus: &mut Bus<J>,
        op: &'static str,
        mut f: impl FnMut(&mut J) -> std::result::Result<T, CapError>,
    ) -> std::result::Result<Vec<T>, ArmError> {
        let mut out = Vec::with_capacity(bus.joints.len());
        for (i, j) in bus.joints.iter_mut().enumerate() {
            out.push(self.io(JointId::Arm(i), op, || f(j))?);
        }
        Ok(out)
    }

    /// Copy-modify-publish. Call with the bus lock held.
    fn publish(&self, update: impl FnOnce(&mut FeedbackState)) -> Arc<FeedbackState> {
        let mut next = FeedbackState::clone(&self.feedback.load());
        update(&mut next);
        let next = Arc::new(next);
        self.feedback.store(next.clone());
        next
    }

    pub fn get_positions(&self) -> Result<Vec<f64>> {
        let mut bus = self.bus.lock();
        let v = self.poll_all(&mut bus, "get_position", J::get_position)?;
        Ok(self.publish(|fb| fb.positions = v).positions.clone())
    }

    pub fn get_speeds(&self) -> Result<Vec<f64>> {
        let mut bus = self.bus.lock();
        let v = self.poll_all(&mut bus, "get_speed", J::get_speed)?;
        Ok(self.publish(|fb| fb.speeds = v).speeds.clone())
    }

    pub fn get_loads(&self) -> Result<Vec<f64>> {
        let mut bus = self.bus.lock();
        let v = self.poll_all(&mut bus, "get_load", J::get_load)?;
        Ok(self.publish(|fb| fb.loads = v).loads.clone())
    }

    pub fn get_temps(&self) -> Result<Vec<f64>> {
        let mut bus = self.bus.lock();
        let v = self.poll_all(&mut bus, "get_temp", J::get_temp)?;
        Ok(self.publish(|fb| fb.temps = v).temps.clone())
    }

    pub fn get_moving_status(&self) -> Result<Vec<bool>> {
        let mut bus = self.bus.lock();
        let v = self.poll_all(&mut bus, "is_moving", J::is_moving)?;
        Ok(self.publish(|fb| fb.moving = v).moving.clone())
    }

    /// All five polls in one bus transaction, published once.
    pub fn get_feedback(&self) -> Result<Arc<FeedbackState>> {
        let mut bus = self.bus.lock();
        let positions = self.poll_all(&mut bus, "get_position", J::get_position)?;
        let speeds = self.poll_all(&mut bus, "get_speed", J::get_speed)?;
        let loads = self.poll_all(&mut bus, "get_load", J::get_load)?;
        let temps = self.poll_all(&mut bus, "get_temp", J::get_temp)?;
        let moving = self.poll_all(&mut bus, "is_moving", J::is_moving)?;
        Ok(self.publish(|fb| {
            *fb = FeedbackState {
                positions,
                speeds,
                loads,
                temps,
                moving,
            };
        }))
    }

    /// Last published feedback, no I/O.
    pub fn feedback(&self) -> Arc<FeedbackState> {
        self.feedback.load_full()
    }

    /// Keep feedback warm for `duration`, returning early on estop.
    pub fn pause(&self, duration: Duration) -> Result<PauseOutcome> {
        let start = self.clock.now();
        loop {
            if self.is_estopped() {
                tracing::debug!(?duration, "pause interrupted by estop");
                return Ok(PauseOutcome::Estopped);
            }
            let elapsed = self.clock.elapsed_since(start);
            if elapsed >= duration {
                return Ok(PauseOutcome::Elapsed);
            }
            self.get_feedback()?;
            self.clock
                .sleep(self.settings.pause_poll.min(duration.saturating_sub(elapsed)));
        }
    }

    // ── gripper ──────────────────────────────────────────────────────────────

    fn move_gripper(&self, close: bool) -> Result<()> {
        let mut bus = self.bus.lock();
        self.ensure_not_estopped()?;
        let target = if close {
            self.gripper_settings.closed
        } else {
            self.gripper_settings.open
        };
        let grip = bus.gripper.as_mut().ok_or(ArmError::NoGripper)?;
        self.io(JointId::Gripper, "set_position", || grip.set_position(target))?;
        bus.gripper_closed = close;
        tracing::debug!(closed = close, "gripper moved");
        Ok(())
    }

    pub fn open_gripper(&self) -> Result<()> {
        self.move_gripper(false)
    }

    pub fn close_gripper(&self) -> Result<()> {
        self.move_gripper(true)
    }

    /// Drive the gripper to `rad`, clipped to the span between its open and
    /// closed positions, and write it now. NaN keeps the current open/closed
    /// target. Returns the angle sent.
    pub fn set_gripper_position(&self, rad: f64) -> Result<f64> {
        let mut bus = self.bus.lock();
        self.ensure_not_estopped()?;
        let g = &self.gripper_settings;
        let (lo, hi) = (g.open.min(g.closed), g.open.max(g.closed));
        let target = if rad.is_nan() {
            if bus.gripper_closed { g.closed } else { g.open }
        } else {
            rad.max(lo).min(hi)
        };
        let grip = bus.gripper.as_mut().ok_or(ArmError::NoGripper)?;
        self.io(JointId::Gripper, "set_position", || grip.set_position(target))?;
        bus.gripper_closed = (target - g.closed).abs() <= (target - g.open).abs();
        tracing::debug!(target, closed = bus.gripper_closed, "gripper positioned");
        Ok(target)
    }

    /// Flip the gripper and dwell for the configured toggle pause.
    pub fn toggle_gripper(&self) -> Result<PauseOutcome> {
        self.move_gripper(!self.gripper_closed())?;
        self.pause(self.gripper_settings.toggle_pause)
    }

    // ── kinematics ───────────────────────────────────────────────────────────

    /// Forward kinematics of the last published feedback positions.
    pub fn wrist_pose(&self) -> Pose {
        self.chain.forward(&self.feedback.load().positions)
    }

    /// Flattened `[x, y, z, roll, pitch, yaw]`, recomputed every call.
    pub fn get_wrist_pose(&self) -> Vec<f64> {
        self.wrist_pose().to_vec()
    }
}
