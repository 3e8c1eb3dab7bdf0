//! Command implementations: config loading, simulated hardware assembly and
//! the session runner.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use eyre::WrapErr;
use rexarm_config::Config;
use rexarm_core::{
    ArmController, ArmError, ArmState, CalibrationContext, DepthModel, DhChain, DisplayRect,
    PointerReadout, Pose, ReadoutSnapshot, Session, SessionConfig, resolve,
};
use rexarm_hardware::camera::SimBlock;
use rexarm_hardware::{Fault, SimulatedCamera, SimulatedJoint};
use rexarm_traits::DepthImage;
use serde_json::json;

/// Test hook: queue this many timeouts on the first simulated joint.
const SIM_TIMEOUT_ENV: &str = "REXARM_TEST_SIM_TIMEOUT";

pub fn load_config(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = rexarm_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

fn sim_id(i: usize) -> u8 {
    u8::try_from(i + 1).unwrap_or(u8::MAX)
}

/// Simulated joints (plus gripper when enabled) wired into a controller.
pub fn build_sim_arm(cfg: &Config) -> eyre::Result<ArmController<SimulatedJoint>> {
    let n = cfg.joint_count();
    let speed = cfg.hardware.sim_max_speed;
    let joints: Vec<SimulatedJoint> = (0..n).map(|i| SimulatedJoint::new(sim_id(i), speed)).collect();
    let gripper = cfg
        .gripper
        .enabled
        .then(|| SimulatedJoint::new(sim_id(n), speed));

    if let Ok(v) = std::env::var(SIM_TIMEOUT_ENV)
        && let Ok(count) = v.parse::<usize>()
        && let Some(first) = joints.first()
    {
        let handle = first.handle();
        for _ in 0..count {
            handle.inject(Fault::Timeout);
        }
    }

    ArmController::builder()
        .joints(joints)
        .gripper(gripper)
        .apply_config(cfg)?
        .try_build()
}

fn sim_camera(cfg: &Config, rect: &DisplayRect) -> SimulatedCamera {
    let (w, h) = (rect.width(), rect.height());
    SimulatedCamera::new(w, h, cfg.hardware.sim_surface_distance)
        .with_warmup(cfg.hardware.sim_warmup_frames)
        .with_block(SimBlock {
            row: h / 2,
            col: w / 2,
            size: (w.min(h) / 8).max(1),
            height: 4.0,
        })
}

#[derive(Debug, Clone)]
pub struct RunOpts {
    pub duration: Option<Duration>,
    pub state: Option<ArmState>,
    pub cursor: Option<(i32, i32)>,
    pub record: bool,
    pub print_every: Duration,
    pub json: bool,
}

#[derive(Debug)]
pub struct RunSummary {
    pub state: String,
    pub estopped: bool,
    pub ticks: Vec<(String, u64)>,
    pub recorded: Option<Vec<f64>>,
}

fn wait_for_state(session: &Session<SimulatedJoint>, state: ArmState, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if session.state_machine().current_state() == state.as_str() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

pub fn snapshot_line(snap: &ReadoutSnapshot, json_mode: bool) -> String {
    let joints_deg: Vec<f64> = snap.joints.iter().map(|r| r.to_degrees()).collect();
    if json_mode {
        json!({
            "state": snap.state,
            "status": snap.status,
            "joints_deg": joints_deg,
            "pose": snap.pose.map(|p| p.to_vec()),
            "pointer_pixel": snap.pointer.pixel_text(),
            "pointer_world": snap.pointer.world_text(),
        })
        .to_string()
    } else {
        let joints = joints_deg
            .iter()
            .map(|d| format!("{d:.1}"))
            .collect::<Vec<_>>()
            .join(",");
        let pose = snap.pose.map_or_else(|| "-".to_string(), |p| pose_text(&p));
        format!(
            "state={} joints_deg=[{joints}] pose=[{pose}] pointer={} world={} status=\"{}\"",
            snap.state,
            snap.pointer.pixel_text(),
            snap.pointer.world_text(),
            snap.status
        )
    }
}

/// Run the four loops on simulated hardware until the duration elapses or
/// `shutdown` is raised. Ctrl-C sets the arm's estop flag immediately and the
/// session then walks through the estop state before stopping.
pub fn run_session(cfg: &Config, opts: &RunOpts, shutdown: Arc<AtomicBool>) -> eyre::Result<RunSummary> {
    let arm = build_sim_arm(cfg)?;
    arm.initialize().wrap_err("initialize arm")?;

    let scfg = SessionConfig::from(cfg);
    let camera = sim_camera(cfg, &scfg.display);
    let control_period = scfg.periods.control;
    let mut session = Session::new(arm, scfg);

    {
        let estop = session.arm().estop_handle();
        let flag = shutdown.clone();
        ctrlc::set_handler(move || {
            estop.trigger();
            flag.store(true, Ordering::SeqCst);
        })
        .wrap_err("install Ctrl-C handler")?;
    }

    session.start(camera)?;
    if let Some((x, y)) = opts.cursor {
        session.move_pointer(x, y);
    }
    if opts.record {
        session.begin_teach()?;
    } else if let Some(state) = opts.state {
        session.request_state(state.as_str());
    }

    let started = Instant::now();
    let mut last_print = started;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            tracing::warn!("interrupted; entering estop");
            session.trigger_estop();
            if !wait_for_state(&session, ArmState::Estop, control_period * 20) {
                tracing::error!("estop state not reached before shutdown");
            }
            break;
        }
        let elapsed = started.elapsed();
        if opts.duration.is_some_and(|d| elapsed >= d) {
            break;
        }
        if last_print.elapsed() >= opts.print_every {
            println!("{}", snapshot_line(&session.readouts().snapshot(), opts.json));
            last_print = Instant::now();
        }
        let nap = opts
            .duration
            .map_or(Duration::from_millis(20), |d| d.saturating_sub(elapsed))
            .min(Duration::from_millis(20));
        std::thread::sleep(nap);
    }

    let recorded = if opts.record && !session.arm().is_estopped() {
        if !wait_for_state(&session, ArmState::Teach, control_period * 20) {
            return Err(ArmError::State("teach state not reached".into()).into());
        }
        session.arm().get_feedback()?;
        let row = session.record_joints()?;
        tracing::info!(path = %session.recorder().path().display(), "joint positions recorded");
        Some(row)
    } else {
        None
    };

    let summary = RunSummary {
        state: session.state_machine().current_state(),
        estopped: session.arm().is_estopped(),
        ticks: session.worker_ticks(),
        recorded,
    };
    session.stop();
    session.arm().disable_torque().wrap_err("disable torque on exit")?;
    Ok(summary)
}

pub fn summary_line(s: &RunSummary, json_mode: bool) -> String {
    if json_mode {
        let ticks: serde_json::Map<String, serde_json::Value> = s
            .ticks
            .iter()
            .map(|(name, n)| (name.clone(), json!(n)))
            .collect();
        json!({
            "event": "summary",
            "state": s.state,
            "estopped": s.estopped,
            "ticks": ticks,
            "recorded": s.recorded,
        })
        .to_string()
    } else {
        let ticks = s
            .ticks
            .iter()
            .map(|(name, n)| format!("{name}={n}"))
            .collect::<Vec<_>>()
            .join(" ");
        let mut line = format!("run complete: state={} estopped={} {ticks}", s.state, s.estopped);
        if let Some(row) = &s.recorded {
            let row = row.iter().map(|r| format!("{r:.4}")).collect::<Vec<_>>().join(",");
            line.push_str(&format!(" recorded=[{row}]"));
        }
        line
    }
}

/// One-shot resolver against a frame where every sample equals `raw`.
pub fn resolve_once(cfg: &Config, x: i32, y: i32, raw: u16) -> PointerReadout {
    let rect = DisplayRect::from(&cfg.display);
    let mut depth = DepthImage::zeros(rect.width(), rect.height());
    depth.data.fill(raw);
    let calibration = cfg.camera_calibration.as_ref().map(CalibrationContext::from);
    resolve(
        (x, y),
        &rect,
        &depth,
        calibration.as_ref(),
        &DepthModel::from(&cfg.depth),
    )
}

pub fn readout_line(r: &PointerReadout, json_mode: bool) -> String {
    if json_mode {
        json!({
            "pixel": r.pixel_text(),
            "world": r.world_text(),
            "world_xyz": r.world(),
        })
        .to_string()
    } else {
        format!("pixel {} world {}", r.pixel_text(), r.world_text())
    }
}

pub fn pose_once(cfg: &Config, deg: &[f64]) -> eyre::Result<Pose> {
    let chain = DhChain::from(&cfg.kinematics);
    if deg.len() != chain.len() {
        return Err(ArmError::JointCountMismatch {
            expected: chain.len(),
            got: deg.len(),
        }
        .into());
    }
    let rad: Vec<f64> = deg.iter().map(|d| d.to_radians()).collect();
    Ok(chain.forward(&rad))
}

fn pose_text(p: &Pose) -> String {
    format!(
        "x={:.2} y={:.2} z={:.2} roll={:.3} pitch={:.3} yaw={:.3}",
        p.x, p.y, p.z, p.roll, p.pitch, p.yaw
    )
}

pub fn pose_line(p: &Pose, json_mode: bool) -> String {
    if json_mode {
        json!({
            "x": p.x, "y": p.y, "z": p.z,
            "roll": p.roll, "pitch": p.pitch, "yaw": p.yaw,
        })
        .to_string()
    } else {
        pose_text(p)
    }
}

#[derive(Debug)]
pub struct SelfCheck {
    pub joints: usize,
    pub gripper: bool,
    pub positions_deg: Vec<f64>,
    pub temps_c: Vec<f64>,
}

/// Initialize, poll feedback once, then release torque.
pub fn self_check(cfg: &Config) -> eyre::Result<SelfCheck> {
    let arm = build_sim_arm(cfg)?;
    arm.initialize().wrap_err("initialize arm")?;
    let fb = arm.get_feedback().wrap_err("poll feedback")?;
    arm.disable_torque()?;
    Ok(SelfCheck {
        joints: arm.joint_count(),
        gripper: arm.has_gripper(),
        positions_deg: fb.positions.iter().map(|r| r.to_degrees()).collect(),
        temps_c: fb.temps.clone(),
    })
}

pub fn self_check_line(s: &SelfCheck, json_mode: bool) -> String {
    if json_mode {
        json!({
            "ok": true,
            "joints": s.joints,
            "gripper": s.gripper,
            "positions_deg": s.positions_deg,
            "temps_c": s.temps_c,
        })
        .to_string()
    } else {
        let max_temp = s.temps_c.iter().copied().fold(f64::NAN, f64::max);
        format!(
            "self-check ok: {} joints, gripper {}, max temp {max_temp:.1} C",
            s.joints,
            if s.gripper { "fitted" } else { "absent" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pose_rejects_wrong_angle_count() {
        let cfg = rexarm_config::load_toml("").unwrap();
        let err = pose_once(&cfg, &[0.0, 0.0]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArmError>(),
            Some(ArmError::JointCountMismatch { expected: 6, got: 2 })
        ));
    }

    #[test]
    fn resolve_outside_video_area_has_no_position() {
        let cfg = rexarm_config::load_toml("").unwrap();
        assert_eq!(resolve_once(&cfg, 0, 0, 400), PointerReadout::NoPosition);
        assert_eq!(readout_line(&PointerReadout::NoPosition, false), "pixel (-,-,-) world (-,-,-)");
    }

    #[test]
    fn self_check_reports_every_joint() {
        let cfg = rexarm_config::load_toml("").unwrap();
        let s = self_check(&cfg).unwrap();
        assert_eq!(s.joints, 6);
        assert!(s.gripper);
        assert_eq!(s.positions_deg.len(), 6);
    }
}
