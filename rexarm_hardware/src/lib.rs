pub mod camera;
pub mod error;

pub use camera::SimulatedCamera;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use rexarm_traits::{CapError, Joint};

use crate::error::HwError;

/// Fault injected into the next call of a simulated joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Timeout,
    NoResponse,
}

#[derive(Debug)]
struct JointModel {
    position: f64,
    target: f64,
    speed: f64,
    torque_limit: f64,
    torque_on: bool,
    temp_c: f64,
    updated_at: Instant,
    faults: VecDeque<Fault>,
    position_cmds: u64,
    polls: u64,
}

impl JointModel {
    fn new() -> Self {
        Self {
            position: 0.0,
            target: 0.0,
            speed: 1.0,
            torque_limit: 1.0,
            torque_on: false,
            temp_c: 25.0,
            updated_at: Instant::now(),
            faults: VecDeque::new(),
            position_cmds: 0,
            polls: 0,
        }
    }

    /// Integrate motion toward the target at the commanded speed.
    fn advance(&mut self, max_speed: f64) {
        let now = Instant::now();
        let dt = now.saturating_duration_since(self.updated_at).as_secs_f64();
        self.updated_at = now;
        if !self.torque_on {
            return;
        }
        // Dynamixel convention: a zero speed register means "no limit".
        let frac = if self.speed <= 0.0 { 1.0 } else { self.speed };
        let step = frac * max_speed * dt;
        let err = self.target - self.position;
        if err.abs() <= step {
            self.position = self.target;
        } else {
            self.position += step.copysign(err);
        }
    }
}

/// Simulated servo joint.
///
/// Moves toward its commanded position at `speed * max_speed` rad/s while torque
/// is enabled. Faults can be queued through a `SimJointHandle`.
pub struct SimulatedJoint {
    id: u8,
    max_speed: f64,
    model: Arc<Mutex<JointModel>>,
}

/// Shared view onto a simulated joint for inspection and fault injection.
#[derive(Clone)]
pub struct SimJointHandle {
    model: Arc<Mutex<JointModel>>,
}

impl SimulatedJoint {
    pub fn new(id: u8, max_speed: f64) -> Self {
        SimulatedJoint {
            id,
            max_speed,
            model: Arc::new(Mutex::new(JointModel::new())),
        }
    }

    pub fn handle(&self) -> SimJointHandle {
        SimJointHandle {
            model: self.model.clone(),
        }
    }

    fn with_model<T>(&self, f: impl FnOnce(&mut JointModel) -> T) -> Result<T, CapError> {
        let mut m = self
            .model
            .lock()
            .map_err(|_| HwError::Bus(format!("joint {} state poisoned", self.id)))?;
        if let Some(fault) = m.faults.pop_front() {
            tracing::trace!(id = self.id, ?fault, "injected fault");
            return Err(Box::new(match fault {
                Fault::Timeout => HwError::Timeout,
                Fault::NoResponse => HwError::NoResponse { id: self.id },
            }));
        }
        m.advance(self.max_speed);
        Ok(f(&mut m))
    }
}

impl SimJointHandle {
    /// Queue a fault for the next call on this joint.
    pub fn inject(&self, fault: Fault) {
        if let Ok(mut m) = self.model.lock() {
            m.faults.push_back(fault);
        }
    }

    pub fn position(&self) -> f64 {
        self.model.lock().map(|m| m.position).unwrap_or(f64::NAN)
    }

    pub fn target(&self) -> f64 {
        self.model.lock().map(|m| m.target).unwrap_or(f64::NAN)
    }

    pub fn torque_enabled(&self) -> bool {
        self.model.lock().map(|m| m.torque_on).unwrap_or(false)
    }

    /// Number of position commands received.
    pub fn position_commands(&self) -> u64 {
        self.model.lock().map(|m| m.position_cmds).unwrap_or(0)
    }

    /// Number of position polls served.
    pub fn polls(&self) -> u64 {
        self.model.lock().map(|m| m.polls).unwrap_or(0)
    }
}

impl Joint for SimulatedJoint {
    fn set_position(&mut self, rad: f64) -> Result<(), CapError> {
        self.with_model(|m| {
            m.target = rad;
            m.position_cmds += 1;
        })
    }
    fn get_position(&mut self) -> Result<f64, CapError> {
        self.with_model(|m| {
            m.polls += 1;
            m.position
        })
    }
    fn set_speed(&mut self, normalized: f64) -> Result<(), CapError> {
        self.with_model(|m| m.speed = normalized.clamp(0.0, 1.0))
    }
    fn get_speed(&mut self) -> Result<f64, CapError> {
        let max_speed = self.max_speed;
        self.with_model(|m| {
            if m.torque_on && (m.target - m.position).abs() > f64::EPSILON {
                m.speed * max_speed
            } else {
                0.0
            }
        })
    }
    fn set_torque_limit(&mut self, normalized: f64) -> Result<(), CapError> {
        self.with_model(|m| m.torque_limit = normalized.clamp(0.0, 1.0))
    }
    fn enable_torque(&mut self) -> Result<(), CapError> {
        self.with_model(|m| m.torque_on = true)
    }
    fn disable_torque(&mut self) -> Result<(), CapError> {
        self.with_model(|m| {
            m.torque_on = false;
            m.target = m.position;
        })
    }
    fn get_load(&mut self) -> Result<f64, CapError> {
        self.with_model(|m| {
            if m.torque_on {
                ((m.target - m.position) * 0.5).clamp(-m.torque_limit, m.torque_limit)
            } else {
                0.0
            }
        })
    }
    fn get_temp(&mut self) -> Result<f64, CapError> {
        self.with_model(|m| {
            if m.torque_on {
                m.temp_c = (m.temp_c + 0.01).min(45.0);
            }
            m.temp_c
        })
    }
    fn is_moving(&mut self) -> Result<bool, CapError> {
        self.with_model(|m| m.torque_on && (m.target - m.position).abs() > 1e-6)
    }
    fn max_speed(&self) -> f64 {
        self.max_speed
    }
}
