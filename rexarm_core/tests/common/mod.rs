#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use rexarm_core::mocks::{SpyHandle, SpyJoint};
use rexarm_core::{AngleLimits, ArmController, ArmSettings, DhChain, DhLink};
use rexarm_traits::Clock;

pub fn deg(v: f64) -> f64 {
    v.to_radians()
}

/// Planar chain with unit-length links.
pub fn planar_chain(n: usize) -> DhChain {
    DhChain::new(
        (0..n)
            .map(|_| DhLink {
                a: 1.0,
                alpha: 0.0,
                d: 0.0,
                theta_offset: 0.0,
            })
            .collect(),
    )
}

pub struct Rig {
    pub arm: ArmController<SpyJoint>,
    pub joints: Vec<SpyHandle>,
    pub gripper: Option<SpyHandle>,
}

pub fn rig_with(
    n: usize,
    limit_deg: f64,
    gripper: bool,
    settings: ArmSettings,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Rig {
    let (joints, handles): (Vec<_>, Vec<_>) = (0..n).map(|_| SpyJoint::new(6.0)).unzip();
    let (grip, grip_handle) = if gripper {
        let (g, h) = SpyJoint::new(6.0);
        (Some(g), Some(h))
    } else {
        (None, None)
    };
    let limits = AngleLimits::from_degrees(&vec![(-limit_deg, limit_deg); n]).unwrap();
    let mut b = ArmController::builder()
        .joints(joints)
        .gripper(grip)
        .limits(limits)
        .kinematics(planar_chain(n))
        .settings(settings);
    if let Some(c) = clock {
        b = b.clock(c);
    }
    Rig {
        arm: b.try_build().expect("arm build"),
        joints: handles,
        gripper: grip_handle,
    }
}

/// Three joints limited to ±90°, with gripper, fast pause polling.
pub fn rig() -> Rig {
    rig_with(
        3,
        90.0,
        true,
        ArmSettings {
            pause_poll: Duration::from_millis(5),
            ..ArmSettings::default()
        },
        None,
    )
}
