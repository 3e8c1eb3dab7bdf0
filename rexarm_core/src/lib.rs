#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Control core of a multi-joint robotic arm (hardware-agnostic).
//!
//! All hardware goes through `rexarm_traits::Joint` and
//! `rexarm_traits::VisionProvider`.
//!
//! ## Architecture
//!
//! - **Arm controller**: limits, commanded/feedback state, estop (`arm`)
//! - **Kinematics**: DH forward kinematics from configured links (`kinematics`)
//! - **Pointer resolver**: cursor + depth + calibration → world point (`pointer`)
//! - **Calibration**: click capture and least-squares pixel→world fit (`calibration`)
//! - **State machine**: contract driven by the control loop (`state_machine`)
//! - **Session**: four periodic workers over shared buffers (`session`, `worker`, `loops`)
//! - **Recording**: append-only joint CSV (`record`)
//!
//! ## Units
//!
//! Angles are radians everywhere in this crate; speeds and torque limits are
//! normalized to `0..=1`. Degree values only exist in the TOML config.

pub mod arm;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod error;
pub mod frames;
pub mod hw_error;
pub mod kinematics;
pub mod loops;
pub mod mocks;
pub mod observe;
pub mod pointer;
pub mod record;
pub mod session;
pub mod state_machine;
pub mod worker;

pub use arm::{
    Apply, ArmBuilder, ArmController, CommandedState, EstopHandle, FeedbackState, PauseOutcome,
};
pub use config::{AngleLimits, ArmSettings, GripperSettings, LoopPeriods};
pub use error::{ActuatorFault, ArmError, BuildError, JointId, Result};
pub use frames::{FrameStore, Frames};
pub use kinematics::{DhChain, DhLink, Pose};
pub use observe::{ReadoutSnapshot, Readouts, StatusReadout};
pub use pointer::{CalibrationContext, DepthModel, DisplayRect, Pointer, PointerReadout, resolve};
pub use session::{ManualInput, Session, SessionConfig};
pub use state_machine::{ArmState, BasicStateMachine, StateMachine};
pub use worker::{TickFlow, Worker};
