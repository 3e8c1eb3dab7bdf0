mod common;

use common::rig;

#[test]
fn pose_is_stable_without_new_feedback() {
    let r = rig();
    r.joints[0].set_feedback_position(0.4);
    r.arm.get_positions().unwrap();
    let a = r.arm.get_wrist_pose();
    let b = r.arm.get_wrist_pose();
    assert_eq!(a, b);
    assert_eq!(a.len(), 6);
}

#[test]
fn pose_follows_feedback_not_commands() {
    let r = rig();
    let home = r.arm.get_wrist_pose();
    // Three unit links straight out.
    assert!((home[0] - 3.0).abs() < 1e-9);

    r.arm
        .set_positions(&[1.0, 1.0, 1.0], rexarm_core::Apply::Now)
        .unwrap();
    assert_eq!(r.arm.get_wrist_pose(), home);

    r.joints[0].set_feedback_position(std::f64::consts::FRAC_PI_2);
    r.arm.get_positions().unwrap();
    let turned = r.arm.get_wrist_pose();
    assert!(turned[0].abs() < 1e-9, "x = {}", turned[0]);
    assert!((turned[1] - 3.0).abs() < 1e-9, "y = {}", turned[1]);
    assert!((turned[5] - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
}
