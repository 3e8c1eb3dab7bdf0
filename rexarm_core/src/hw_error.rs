//! Maps `Box<dyn Error>` from trait boundaries to a typed `ActuatorFault`.
//!
//! The traits in `rexarm_traits` use `Box<dyn Error + Send + Sync>`; this
//! module classifies those errors so the controller can decide whether a call
//! is worth retrying, with an optional feature-gated path for
//! `rexarm_hardware::HwError` downcasting.

use crate::error::ActuatorFault;

/// Classify a trait-boundary error.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ActuatorFault {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<rexarm_hardware::error::HwError>() {
            return match hw {
                rexarm_hardware::error::HwError::Timeout => ActuatorFault::Timeout,
                other => ActuatorFault::Fault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") || s.to_lowercase().contains("timed out") {
        ActuatorFault::Timeout
    } else {
        ActuatorFault::Other(s)
    }
}
