mod common;

use common::{deg, rig, rig_with};
use rexarm_core::{ActuatorFault, Apply, ArmError, ArmSettings, JointId};
use rstest::rstest;

fn arm_err(e: &eyre::Report) -> &ArmError {
    e.downcast_ref::<ArmError>().expect("typed ArmError")
}

#[test]
fn clamps_three_joint_command_into_limits() {
    let r = rig();
    let stored = r
        .arm
        .set_positions(&[deg(120.0), deg(-120.0), deg(45.0)], Apply::Defer)
        .unwrap();
    let expected = [deg(90.0), deg(-90.0), deg(45.0)];
    assert_eq!(stored, expected);
    assert_eq!(r.arm.commanded().positions, expected);
}

#[test]
fn deferred_positions_touch_no_hardware() {
    let r = rig();
    r.arm
        .set_positions(&[0.1, 0.2, 0.3], Apply::Defer)
        .unwrap();
    r.arm.set_speeds_normalized_global(0.4, Apply::Defer).unwrap();
    r.arm.set_torque_limits(&[0.7; 3], Apply::Defer).unwrap();
    for h in &r.joints {
        assert_eq!(h.counts().commands(), 0);
        assert_eq!(h.counts().polls(), 0);
    }
    let cmd = r.arm.commanded();
    assert_eq!(cmd.speeds, vec![0.4; 3]);
    assert_eq!(cmd.torque_limits, vec![0.7; 3]);
}

#[test]
fn send_commands_issues_one_of_each_per_joint() {
    let r = rig();
    r.arm
        .set_positions(&[0.1, -0.2, 0.3], Apply::Defer)
        .unwrap();
    r.arm.send_commands().unwrap();
    for (h, want) in r.joints.iter().zip([0.1, -0.2, 0.3]) {
        let c = h.counts();
        assert_eq!(c.set_position, 1);
        assert_eq!(c.set_speed, 1);
        assert_eq!(c.set_torque_limit, 1);
        assert_eq!(h.last_position(), Some(want));
    }
}

#[test]
fn apply_now_writes_immediately() {
    let r = rig();
    r.arm.set_positions(&[0.0, 0.5, 9.0], Apply::Now).unwrap();
    assert_eq!(r.joints[1].last_position(), Some(0.5));
    assert_eq!(r.joints[2].last_position(), Some(deg(90.0)));
    assert_eq!(r.joints[0].counts().set_position, 1);
}

#[rstest]
#[case(2)]
#[case(4)]
fn wrong_length_is_rejected(#[case] len: usize) {
    let r = rig();
    let err = r
        .arm
        .set_positions(&vec![0.0; len], Apply::Defer)
        .unwrap_err();
    assert_eq!(
        arm_err(&err),
        &ArmError::JointCountMismatch {
            expected: 3,
            got: len
        }
    );
    assert_eq!(r.arm.commanded().positions, vec![0.0; 3]);
}

#[test]
fn initialize_homes_and_closes_gripper() {
    let r = rig();
    r.arm.initialize().unwrap();
    for h in &r.joints {
        assert!(h.torque_on());
        assert_eq!(h.last_position(), Some(0.0));
        assert_eq!(h.last_torque(), Some(0.5));
        assert_eq!(h.last_speed(), Some(0.25));
    }
    let g = r.gripper.as_ref().unwrap();
    assert_eq!(g.last_torque(), Some(1.0));
    assert_eq!(g.last_speed(), Some(0.8));
    assert_eq!(g.last_position(), Some(deg(75.0)));
    assert!(r.arm.gripper_closed());
    let cmd = r.arm.commanded();
    assert_eq!(cmd.speeds, vec![0.25; 3]);
    assert_eq!(cmd.torque_limits, vec![0.5; 3]);
}

#[test]
fn gripper_open_close_and_missing_gripper() {
    let r = rig();
    r.arm.open_gripper().unwrap();
    assert!(!r.arm.gripper_closed());
    assert_eq!(r.gripper.as_ref().unwrap().last_position(), Some(deg(-90.0)));
    r.arm.close_gripper().unwrap();
    assert!(r.arm.gripper_closed());

    let bare = rig_with(2, 90.0, false, ArmSettings::default(), None);
    let err = bare.arm.open_gripper().unwrap_err();
    assert_eq!(arm_err(&err), &ArmError::NoGripper);
}

#[test]
fn engineering_speeds_are_normalized_with_floor() {
    let r = rig();
    let n = r.arm.set_speeds(&[3.0, -6.0, 0.0], Apply::Now).unwrap();
    assert!((n[0] - 0.5).abs() < 1e-12);
    assert!((n[1] - 1.0).abs() < 1e-12);
    assert!((n[2] - 3.0 / 1023.0).abs() < 1e-12);
    assert_eq!(r.joints[2].last_speed(), Some(3.0 / 1023.0));
}

#[test]
fn feedback_polls_publish_snapshots() {
    let r = rig();
    r.joints[0].set_feedback_position(0.3);
    let p = r.arm.get_positions().unwrap();
    assert_eq!(p, vec![0.3, 0.0, 0.0]);
    assert_eq!(r.arm.feedback().positions, p);

    let fb = r.arm.get_feedback().unwrap();
    assert_eq!(fb.temps, vec![30.0; 3]);
    assert_eq!(fb.moving, vec![false; 3]);
    for h in &r.joints {
        let c = h.counts();
        assert_eq!((c.get_speed, c.get_load, c.get_temp, c.is_moving), (1, 1, 1, 1));
    }
}

#[test]
fn estop_blocks_motion_but_not_staging_or_feedback() {
    let r = rig();
    r.arm.estop();
    assert!(r.arm.is_estopped());

    for err in [
        r.arm.set_positions(&[0.1; 3], Apply::Now).unwrap_err(),
        r.arm.send_commands().unwrap_err(),
        r.arm.initialize().unwrap_err(),
        r.arm.open_gripper().unwrap_err(),
        r.arm.enable_torque().unwrap_err(),
    ] {
        assert_eq!(arm_err(&err), &ArmError::Estopped);
    }
    for h in &r.joints {
        assert_eq!(h.counts().commands(), 0);
    }

    r.arm.set_positions(&[0.1; 3], Apply::Defer).unwrap();
    r.arm.get_feedback().unwrap();
    r.arm.disable_torque().unwrap();
    assert_eq!(r.joints[0].counts().disable_torque, 1);

    r.arm.clear_estop();
    r.arm.send_commands().unwrap();
    assert_eq!(r.joints[0].last_position(), Some(0.1));
}

#[test]
fn timeouts_are_retried_within_budget() {
    let r = rig();
    r.joints[1].fail_with_timeouts(2);
    let p = r.arm.get_positions().unwrap();
    assert_eq!(p.len(), 3);
    assert_eq!(r.joints[1].counts().get_position, 3);
}

#[test]
fn timeouts_beyond_budget_fail_the_command() {
    let r = rig();
    r.joints[2].fail_with_timeouts(3);
    let err = r.arm.set_positions(&[0.0; 3], Apply::Now).unwrap_err();
    assert_eq!(
        arm_err(&err),
        &ArmError::Actuator {
            joint: JointId::Arm(2),
            op: "set_position",
            cause: ActuatorFault::Timeout
        }
    );
    // Staged state still holds the clamped request.
    assert_eq!(r.arm.commanded().positions, vec![0.0; 3]);
}

#[test]
fn non_timeout_faults_fail_fast() {
    let r = rig();
    r.joints[0].fail_with_fault("overload");
    let err = r.arm.enable_torque().unwrap_err();
    match arm_err(&err) {
        ArmError::Actuator { joint, cause, .. } => {
            assert_eq!(*joint, JointId::Arm(0));
            assert!(matches!(cause, ActuatorFault::Other(m) if m == "overload"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(r.joints[0].counts().enable_torque, 1);
}

#[test]
fn zero_retries_fail_on_first_timeout() {
    let r = rig_with(
        1,
        90.0,
        false,
        ArmSettings {
            io_retries: 0,
            ..ArmSettings::default()
        },
        None,
    );
    r.joints[0].fail_with_timeouts(1);
    assert!(r.arm.get_temps().is_err());
    assert_eq!(r.joints[0].counts().get_temp, 1);
}

#[test]
fn nan_target_is_sent_as_an_in_range_angle() {
    let r = rig();
    let stored = r
        .arm
        .set_positions(&[f64::NAN, deg(30.0), f64::INFINITY], Apply::Now)
        .unwrap();
    assert_eq!(stored, vec![0.0, deg(30.0), deg(90.0)]);
    assert_eq!(r.arm.commanded().positions, stored);
    assert_eq!(r.joints[0].last_position(), Some(0.0));
    assert_eq!(r.joints[2].last_position(), Some(deg(90.0)));
}

#[test]
fn estop_mid_batch_stops_at_the_next_joint() {
    let r = rig();
    let estop = r.arm.estop_handle();
    r.joints[0].on_set_position(move |_| estop.trigger());

    r.arm.set_positions(&[0.1, 0.2, 0.3], Apply::Defer).unwrap();
    let err = r.arm.send_commands().unwrap_err();
    assert_eq!(arm_err(&err), &ArmError::Estopped);
    assert_eq!(r.joints[0].counts().set_position, 1);
    for h in &r.joints[1..] {
        assert_eq!(h.counts().commands(), 0);
    }

    r.arm.clear_estop();
    let err = r.arm.set_positions(&[0.0; 3], Apply::Now).unwrap_err();
    assert_eq!(arm_err(&err), &ArmError::Estopped);
    assert_eq!(r.joints[0].counts().set_position, 2);
    assert_eq!(r.joints[1].counts().set_position, 0);
}

#[test]
fn gripper_position_is_clipped_and_blocked_by_estop() {
    let r = rig();
    let grip = r.gripper.as_ref().unwrap();
    assert_eq!(r.arm.set_gripper_position(deg(-120.0)).unwrap(), deg(-90.0));
    assert_eq!(grip.last_position(), Some(deg(-90.0)));
    assert!(!r.arm.gripper_closed());
    // NaN keeps the current open target
    assert_eq!(r.arm.set_gripper_position(f64::NAN).unwrap(), deg(-90.0));

    r.arm.estop();
    let err = r.arm.set_gripper_position(0.0).unwrap_err();
    assert_eq!(arm_err(&err), &ArmError::Estopped);

    let bare = rig_with(2, 90.0, false, ArmSettings::default(), None);
    let err = bare.arm.set_gripper_position(0.0).unwrap_err();
    assert_eq!(arm_err(&err), &ArmError::NoGripper);
}
