use std::fmt;

use thiserror::Error;

/// Which actuator a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointId {
    Arm(usize),
    Gripper,
}

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arm(i) => write!(f, "{i}"),
            Self::Gripper => f.write_str("gripper"),
        }
    }
}

/// Classified cause of a failed capability call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActuatorFault {
    #[error("timeout")]
    Timeout,
    #[error("hardware fault: {0}")]
    Fault(String),
    #[error("hardware error: {0}")]
    Other(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ArmError {
    #[error("emergency stop is active")]
    Estopped,
    #[error("expected {expected} joint values, got {got}")]
    JointCountMismatch { expected: usize, got: usize },
    #[error("no gripper fitted")]
    NoGripper,
    #[error("joint {joint} {op} failed: {cause}")]
    Actuator {
        joint: JointId,
        op: &'static str,
        cause: ActuatorFault,
    },
    #[error("invalid state: {0}")]
    State(String),
    #[error("calibration error: {0}")]
    Calibration(String),
    #[error("io error: {0}")]
    Io(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("missing joints")]
    MissingJoints,
    #[error("missing angle limits")]
    MissingLimits,
    #[error("missing kinematic chain")]
    MissingKinematics,
    #[error("joint count mismatch: {joints} joints, {limits} limits, {links} links")]
    JointCount {
        joints: usize,
        limits: usize,
        links: usize,
    },
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
