//! One iteration of each session loop.
//!
//! The session wraps these in `Worker`s; tests call them directly.

use rexarm_traits::{Joint, VisionProvider};

use crate::arm::ArmController;
use crate::error::{ArmError, Result};
use crate::frames::FrameStore;
use crate::observe::{Readouts, StatusReadout};
use crate::pointer::{DepthModel, DisplayRect, Pointer, PointerReadout, resolve};
use crate::state_machine::StateMachine;

/// Capture and convert one RGB + depth pair, then publish it. Returns the
/// sequence number. On error nothing is published and the previous frames stay.
pub fn acquisition_tick<V: VisionProvider + ?Sized>(vision: &mut V, frames: &FrameStore) -> Result<u64> {
    let cap = |e| eyre::eyre!("vision provider: {e}");
    vision.capture_video_frame().map_err(cap)?;
    vision.capture_depth_frame().map_err(cap)?;
    let rgb = vision.convert_frame().map_err(cap)?;
    let depth_display = vision.convert_depth_frame().map_err(cap)?;
    let depth_raw = vision.current_depth_frame();
    Ok(frames.publish(rgb, depth_display, depth_raw))
}

/// One state machine step. Errors are logged, never propagated, so the loop
/// keeps its cadence.
pub fn control_tick(sm: &dyn StateMachine) {
    if let Err(e) = sm.run() {
        if matches!(e.downcast_ref::<ArmError>(), Some(ArmError::Estopped)) {
            tracing::debug!(state = %sm.current_state(), "step skipped: estop active");
        } else {
            tracing::error!(state = %sm.current_state(), error = %format!("{e:#}"), "state machine step failed");
        }
    }
}

/// Publish status text, feedback positions and wrist pose as one readout.
/// Read-only; the pose is computed from the same feedback sample as the joints.
pub fn status_tick<J: Joint>(sm: &dyn StateMachine, arm: &ArmController<J>, readouts: &Readouts) {
    let (state, status) = sm.status_pair();
    let joints = arm.feedback().positions.clone();
    let pose = arm.kinematics().forward(&joints);
    readouts.publish_status(StatusReadout {
        state,
        status,
        joints,
        pose: Some(pose),
    });
}

/// Resolve the current cursor and publish the readout.
pub fn pointer_tick(
    pointer: &Pointer,
    rect: &DisplayRect,
    frames: &FrameStore,
    sm: &dyn StateMachine,
    model: &DepthModel,
    readouts: &Readouts,
) -> PointerReadout {
    let readout = match pointer.cursor() {
        None => PointerReadout::NoPosition,
        Some(cursor) => {
            let latest = frames.latest();
            resolve(
                cursor,
                rect,
                &latest.depth_raw,
                sm.calibration_context().as_ref(),
                model,
            )
        }
    };
    readouts.publish_pointer(readout);
    readout
}
