#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and joint-record parsing for the arm control station.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Angles are written in degrees in the file; the core converts to radians.
//! - The joint record file is a headerless CSV of radians, one row per record.
use serde::Deserialize;
use serde::de::Deserializer;

/// Physical limits of the Rexarm joints, in degrees (base, shoulder, elbow, wrist x3).
const REXARM_LIMITS_DEG: [(f64, f64); 6] = [
    (-180.0, 179.99),
    (-32.0, 212.0),
    (-115.0, 104.0),
    (-150.0, 150.0),
    (-128.0, 129.0),
    (-180.0, 180.0),
];

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ArmCfg {
    /// Per-joint limits. Accepts either:
    /// - array of pairs: [[-180.0, 180.0], ...]
    /// - array of tables: [{ min_deg = -180.0, max_deg = 180.0 }, ...]
    #[serde(deserialize_with = "de_limits")]
    pub limits_deg: Vec<(f64, f64)>,
    /// Torque limit applied by `initialize` (0..=1)
    pub default_torque: f64,
    /// Speed applied by `initialize` (0..=1)
    pub default_speed: f64,
    /// Feedback poll interval while pausing (ms)
    pub pause_poll_ms: u64,
}

impl Default for ArmCfg {
    fn default() -> Self {
        Self {
            limits_deg: REXARM_LIMITS_DEG.to_vec(),
            default_torque: 0.5,
            default_speed: 0.25,
            pause_poll_ms: 50,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GripperCfg {
    pub enabled: bool,
    pub open_deg: f64,
    pub closed_deg: f64,
    pub torque: f64,
    pub speed: f64,
    /// Dwell after a toggle (ms)
    pub toggle_pause_ms: u64,
}

impl Default for GripperCfg {
    fn default() -> Self {
        Self {
            enabled: true,
            open_deg: -90.0,
            closed_deg: 75.0,
            torque: 1.0,
            speed: 0.8,
            toggle_pause_ms: 1000,
        }
    }
}

/// One Denavit–Hartenberg link. Lengths share the unit of the depth plane (cm).
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct DhLinkCfg {
    pub a: f64,
    pub alpha_deg: f64,
    pub d: f64,
    #[serde(default)]
    pub theta_offset_deg: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct KinematicsCfg {
    pub links: Vec<DhLinkCfg>,
}

impl Default for KinematicsCfg {
    fn default() -> Self {
        let link = |a, alpha_deg, d, theta_offset_deg| DhLinkCfg {
            a,
            alpha_deg,
            d,
            theta_offset_deg,
        };
        Self {
            links: vec![
                link(0.0, 90.0, 11.8, 0.0),
                link(10.0, 0.0, 0.0, 90.0),
                link(0.0, 90.0, 0.0, 90.0),
                link(0.0, -90.0, 10.0, 0.0),
                link(0.0, 90.0, 0.0, 0.0),
                link(0.0, 0.0, 11.0, 0.0),
            ],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoopsCfg {
    pub acquisition_ms: u64,
    pub control_ms: u64,
    pub status_ms: u64,
    pub pointer_ms: u64,
}

impl Default for LoopsCfg {
    fn default() -> Self {
        Self {
            acquisition_ms: 30,
            control_ms: 50,
            status_ms: 100,
            pointer_ms: 50,
        }
    }
}

/// Where the video image sits in window pixels.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct DisplayCfg {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Default for DisplayCfg {
    fn default() -> Self {
        Self {
            min_x: 240,
            max_x: 880,
            min_y: 40,
            max_y: 520,
        }
    }
}

/// Depth decode: `Z = scale * tan(raw / divisor + phase)`, `Z_base = plane_offset - Z`.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct DepthCfg {
    pub scale: f64,
    pub divisor: f64,
    pub phase: f64,
    pub plane_offset: f64,
}

impl Default for DepthCfg {
    fn default() -> Self {
        Self {
            scale: 12.36,
            divisor: 2842.5,
            phase: 1.1863,
            plane_offset: 95.0,
        }
    }
}

/// Camera calibration saved from a previous calibrate run.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PersistedCameraCalibration {
    /// Image pixel of the arm base
    pub pixel_origin: [f64; 2],
    /// Row-major 2x2 pixel→world map
    pub affine: [[f64; 2]; 2],
}

/// World positions (relative to the arm base) clicked in order after the origin
/// during the calibrate state.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationTargets {
    pub world_points: Vec<[f64; 2]>,
}

impl Default for CalibrationTargets {
    fn default() -> Self {
        Self {
            world_points: vec![[-30.0, 30.0], [30.0, 30.0], [30.0, -30.0], [-30.0, -30.0]],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// Extra attempts for an actuator call that timed out (0 = fail fast)
    pub io_retries: u32,
    /// Simulated joint top speed (rad/s)
    pub sim_max_speed: f64,
    /// Simulated camera-to-table distance (cm)
    pub sim_surface_distance: f64,
    /// Empty depth frames produced before the simulated sensor is ready
    pub sim_warmup_frames: u32,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            io_retries: 2,
            sim_max_speed: 6.0,
            sim_surface_distance: 95.0,
            sim_warmup_frames: 5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RecordCfg {
    pub path: String,
}

impl Default for RecordCfg {
    fn default() -> Self {
        Self {
            path: "op_joints.csv".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub arm: ArmCfg,
    #[serde(default)]
    pub gripper: GripperCfg,
    #[serde(default)]
    pub kinematics: KinematicsCfg,
    #[serde(default)]
    pub loops: LoopsCfg,
    #[serde(default)]
    pub display: DisplayCfg,
    #[serde(default)]
    pub depth: DepthCfg,
    /// Optional persisted calibration; when present the station starts calibrated.
    #[serde(default)]
    pub camera_calibration: Option<PersistedCameraCalibration>,
    #[serde(default)]
    pub calibration_targets: CalibrationTargets,
    #[serde(default)]
    pub hardware: Hardware,
    #[serde(default)]
    pub record: RecordCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LimitToml {
    Pair((f64, f64)),
    Table { min_deg: f64, max_deg: f64 },
}

fn de_limits<'de, D>(deserializer: D) -> Result<Vec<(f64, f64)>, D::Error>
where
    D: Deserializer<'de>,
{
    let items: Vec<LimitToml> = Vec::deserialize(deserializer)?;
    Ok(items
        .into_iter()
        .map(|l| match l {
            LimitToml::Pair(p) => p,
            LimitToml::Table { min_deg, max_deg } => (min_deg, max_deg),
        })
        .collect())
}

fn check_unit(v: f64, key: &str) -> eyre::Result<()> {
    if !(0.0..=1.0).contains(&v) {
        eyre::bail!("{key} must be in [0.0, 1.0]");
    }
    Ok(())
}

fn check_period(ms: u64, key: &str) -> eyre::Result<()> {
    if ms == 0 {
        eyre::bail!("{key} must be >= 1");
    }
    if ms > 60_000 {
        eyre::bail!("{key} is unreasonably large (>60s)");
    }
    Ok(())
}

impl Config {
    /// Number of arm joints (gripper excluded).
    pub fn joint_count(&self) -> usize {
        self.arm.limits_deg.len()
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Arm
        if self.arm.limits_deg.is_empty() {
            eyre::bail!("arm.limits_deg must list at least one joint");
        }
        for (i, (min, max)) in self.arm.limits_deg.iter().enumerate() {
            if !min.is_finite() || !max.is_finite() {
                eyre::bail!("arm.limits_deg[{i}] must be finite");
            }
            if min >= max {
                eyre::bail!("arm.limits_deg[{i}] requires min < max, got [{min}, {max}]");
            }
        }
        check_unit(self.arm.default_torque, "arm.default_torque")?;
        check_unit(self.arm.default_speed, "arm.default_speed")?;
        check_period(self.arm.pause_poll_ms, "arm.pause_poll_ms")?;

        // Gripper
        if self.gripper.enabled {
            check_unit(self.gripper.torque, "gripper.torque")?;
            check_unit(self.gripper.speed, "gripper.speed")?;
            if !self.gripper.open_deg.is_finite() || !self.gripper.closed_deg.is_finite() {
                eyre::bail!("gripper.open_deg and gripper.closed_deg must be finite");
            }
        }

        // Kinematics
        if self.kinematics.links.len() != self.joint_count() {
            eyre::bail!(
                "kinematics.links has {} entries but arm.limits_deg defines {} joints",
                self.kinematics.links.len(),
                self.joint_count()
            );
        }
        for (i, l) in self.kinematics.links.iter().enumerate() {
            if ![l.a, l.alpha_deg, l.d, l.theta_offset_deg]
                .iter()
                .all(|v| v.is_finite())
            {
                eyre::bail!("kinematics.links[{i}] has a non-finite parameter");
            }
        }

        // Loops
        check_period(self.loops.acquisition_ms, "loops.acquisition_ms")?;
        check_period(self.loops.control_ms, "loops.control_ms")?;
        check_period(self.loops.status_ms, "loops.status_ms")?;
        check_period(self.loops.pointer_ms, "loops.pointer_ms")?;

        // Display
        if self.display.min_x >= self.display.max_x || self.display.min_y >= self.display.max_y {
            eyre::bail!("display rectangle must have min < max on both axes");
        }

        // Depth
        if self.depth.divisor == 0.0 || !self.depth.divisor.is_finite() {
            eyre::bail!("depth.divisor must be finite and non-zero");
        }
        if !self.depth.scale.is_finite()
            || !self.depth.phase.is_finite()
            || !self.depth.plane_offset.is_finite()
        {
            eyre::bail!("depth.scale, depth.phase and depth.plane_offset must be finite");
        }

        // Calibration
        if let Some(c) = &self.camera_calibration
            && !c
                .pixel_origin
                .iter()
                .chain(c.affine.iter().flatten())
                .all(|v| v.is_finite())
        {
            eyre::bail!("camera_calibration values must be finite");
        }
        if self.calibration_targets.world_points.len() < 2 {
            eyre::bail!("calibration_targets.world_points needs at least two points");
        }

        // Hardware
        if self.hardware.io_retries > 10 {
            eyre::bail!("hardware.io_retries must be <= 10");
        }
        if !(self.hardware.sim_max_speed > 0.0) {
            eyre::bail!("hardware.sim_max_speed must be > 0");
        }

        // Record
        if self.record.path.trim().is_empty() {
            eyre::bail!("record.path must not be empty");
        }

        Ok(())
    }
}

/// Read back the joint record file written by the station.
///
/// Rows are comma-separated radians with optional surrounding spaces; every row
/// must have the same number of columns.
pub fn load_joint_records(path: &std::path::Path) -> eyre::Result<Vec<Vec<f64>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open joint record {:?}: {}", path, e))?;

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<Vec<f64>>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid joint record row {}: {}", idx + 1, e);
            }
        }
    }
    Ok(rows)
}
