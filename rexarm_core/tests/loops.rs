mod common;

use std::sync::Arc;

use common::{deg, rig};
use rexarm_core::loops::{acquisition_tick, pointer_tick, status_tick};
use rexarm_core::mocks::StaticVision;
use rexarm_core::{
    BasicStateMachine, DepthModel, DisplayRect, FrameStore, Pointer, PointerReadout, Readouts,
};
use rexarm_traits::DepthImage;

fn depth(width: usize, height: usize, raw: u16) -> DepthImage {
    let mut img = DepthImage::zeros(width, height);
    for row in 0..height {
        for col in 0..width {
            img.set(row, col, raw);
        }
    }
    img
}

#[test]
fn acquisition_publishes_and_keeps_frame_on_failure() {
    let rect = DisplayRect::default();
    let frames = FrameStore::new(rect.width(), rect.height());
    let mut ok = StaticVision::new(depth(rect.width(), rect.height(), 400));
    assert_eq!(acquisition_tick(&mut ok, &frames).unwrap(), 1);
    assert_eq!(frames.latest().depth_raw.sample(10, 10), Some(400));

    let mut broken = StaticVision::failing(depth(rect.width(), rect.height(), 700));
    assert!(acquisition_tick(&mut broken, &frames).is_err());
    assert_eq!(frames.seq(), 1);
    assert_eq!(frames.latest().depth_raw.sample(10, 10), Some(400));
}

#[test]
fn pointer_tick_resolves_latest_frame() {
    let r = rig();
    let arm = Arc::new(r.arm);
    let pointer = Arc::new(Pointer::new());
    let sm = BasicStateMachine::new(arm, pointer.clone(), vec![[10.0, 0.0], [0.0, 10.0]]);
    let rect = DisplayRect::default();
    let frames = FrameStore::new(rect.width(), rect.height());
    let readouts = Readouts::new();
    let model = DepthModel::default();

    // no cursor yet
    let out = pointer_tick(&pointer, &rect, &frames, &sm, &model, &readouts);
    assert_eq!(out, PointerReadout::NoPosition);

    // cursor inside, but nothing captured
    pointer.move_to(300, 100);
    let out = pointer_tick(&pointer, &rect, &frames, &sm, &model, &readouts);
    assert_eq!(out, PointerReadout::NoPosition);

    let mut vision = StaticVision::new(depth(rect.width(), rect.height(), 400));
    acquisition_tick(&mut vision, &frames).unwrap();
    let out = pointer_tick(&pointer, &rect, &frames, &sm, &model, &readouts);
    assert_eq!(out, PointerReadout::Pixel { x: 60, y: 60, raw: 400 });
    assert_eq!(readouts.pointer(), out);
}

#[test]
fn status_tick_publishes_state_and_pose() {
    let r = rig();
    let arm = Arc::new(r.arm);
    let pointer = Arc::new(Pointer::new());
    let sm = BasicStateMachine::new(arm.clone(), pointer, Vec::new());
    let readouts = Readouts::new();
    arm.get_feedback().unwrap();
    status_tick(&sm, &arm, &readouts);
    let snap = readouts.snapshot();
    assert_eq!(snap.state, "idle");
    assert_eq!(snap.status, "Waiting for input");
    assert_eq!(snap.joints.len(), 3);
    assert!(snap.pose.is_some());
}

#[test]
fn status_pose_matches_published_joints() {
    let r = rig();
    for (h, a) in r.joints.iter().zip([20.0, -35.0, 50.0]) {
        h.set_feedback_position(deg(a));
    }
    let arm = Arc::new(r.arm);
    let sm = BasicStateMachine::new(arm.clone(), Arc::new(Pointer::new()), Vec::new());
    let readouts = Readouts::new();
    arm.get_feedback().unwrap();
    status_tick(&sm, &arm, &readouts);

    let status = readouts.status_readout();
    assert_eq!(status.joints, vec![deg(20.0), deg(-35.0), deg(50.0)]);
    assert_eq!(status.pose, Some(arm.kinematics().forward(&status.joints)));
    assert_eq!((status.state.as_str(), status.status.as_str()), ("idle", "Waiting for input"));
}
