//! Human-readable error descriptions and structured JSON error formatting.

use rexarm_core::error::{ActuatorFault, ArmError, BuildError};

/// Typed error anywhere in the report, outermost first.
fn find<T>(err: &eyre::Report) -> Option<&T>
where
    T: std::error::Error + Send + Sync + 'static,
{
    err.downcast_ref::<T>()
        .or_else(|| err.chain().find_map(|e| e.downcast_ref::<T>()))
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = find::<BuildError>(err) {
        return match be {
            BuildError::MissingJoints => {
                "What happened: No joints were provided to the arm controller.\nLikely causes: The joint list was empty when the controller was built.\nHow to fix: Pass one joint per entry in arm.limits_deg.".to_string()
            }
            BuildError::MissingLimits => {
                "What happened: No angle limits were configured.\nLikely causes: The builder was not given limits or a config.\nHow to fix: Set arm.limits_deg in the config.".to_string()
            }
            BuildError::MissingKinematics => {
                "What happened: No kinematic chain was configured.\nLikely causes: The builder was not given DH links or a config.\nHow to fix: Add [[kinematics.links]] entries to the config.".to_string()
            }
            BuildError::JointCount { joints, limits, links } => format!(
                "What happened: Joint count mismatch ({joints} joints, {limits} limits, {links} DH links).\nLikely causes: arm.limits_deg and kinematics.links describe different arms.\nHow to fix: Give every joint exactly one limit pair and one DH link."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(ae) = find::<ArmError>(err) {
        return match ae {
            ArmError::Estopped => "What happened: Emergency stop is active.\nLikely causes: Ctrl-C or an estop request arrived before the command.\nHow to fix: Clear the estop by moving to idle, then retry.".to_string(),
            ArmError::Actuator { joint, op, cause: ActuatorFault::Timeout } => format!(
                "What happened: Joint {joint} timed out during {op}.\nLikely causes: Servo unpowered, loose bus cable, or wrong baud rate.\nHow to fix: Check power and wiring, or raise hardware.io_retries for a noisy bus."
            ),
            ArmError::Actuator { joint, op, cause } => format!(
                "What happened: Joint {joint} reported a fault during {op} ({cause}).\nLikely causes: Overload, overheating, or a servo ID conflict.\nHow to fix: Let the servo cool, clear the load, and power-cycle the bus."
            ),
            ArmError::JointCountMismatch { expected, got } => format!(
                "What happened: Expected {expected} joint values, got {got}.\nLikely causes: The command lists a different number of joints than the config.\nHow to fix: Pass one value per joint in arm.limits_deg."
            ),
            ArmError::NoGripper => "What happened: The command needs a gripper but none is fitted.\nLikely causes: gripper.enabled is false.\nHow to fix: Enable [gripper] in the config.".to_string(),
            ArmError::State(msg) => format!(
                "What happened: The state machine refused the request ({msg}).\nLikely causes: The arm was not in the state the command requires.\nHow to fix: Request the right state first (e.g. `--state teach`)."
            ),
            ArmError::Calibration(msg) => format!(
                "What happened: Camera calibration failed ({msg}).\nLikely causes: Reference points clicked on a line or in the wrong order.\nHow to fix: Re-enter calibrate and click the base, then each reference point in order."
            ),
            ArmError::Io(msg) => format!(
                "What happened: File I/O failed ({msg}).\nLikely causes: Missing directory or no write permission.\nHow to fix: Check record.path in the config."
            ),
        };
    }

    // String-based heuristics for errors coming from config loading
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.starts_with("read config") {
        return format!(
            "What happened: Could not read the config file.\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Point --config at an existing TOML file. Original: {msg}"
        );
    }

    if lower.starts_with("parse config") {
        return format!(
            "What happened: The config file is not valid TOML for this station.\nLikely causes: Typo in a key or a value of the wrong type.\nHow to fix: Compare with etc/rexarm_config.toml. Original: {msg}"
        );
    }

    if lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid.\nLikely causes: Out-of-range or inconsistent values.\nHow to fix: Edit the TOML config and try again. Original: {msg}"
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable name for the error kind, used as the JSON `reason`.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if find::<BuildError>(err).is_some() {
        return "Build";
    }
    match find::<ArmError>(err) {
        Some(ArmError::Estopped) => "Estopped",
        Some(ArmError::Actuator {
            cause: ActuatorFault::Timeout,
            ..
        }) => "ActuatorTimeout",
        Some(ArmError::Actuator { .. }) => "ActuatorFault",
        Some(ArmError::Calibration(_)) => "Calibration",
        Some(ArmError::State(_)) => "State",
        _ => "Error",
    }
}

/// Stable exit codes per error kind; anything unclassified returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match reason_name(err) {
        "Estopped" => 2,
        "ActuatorTimeout" => 3,
        "ActuatorFault" => 4,
        "Build" => 5,
        "Calibration" => 6,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let msg = humanize(err);
    let reason = reason_name(err);
    if let Some(ArmError::Actuator { joint, op, .. }) = find::<ArmError>(err) {
        return json!({
            "reason": reason,
            "details": { "joint": joint.to_string(), "op": op },
            "message": msg,
        })
        .to_string();
    }
    json!({ "reason": reason, "message": msg }).to_string()
}
