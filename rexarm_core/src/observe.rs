//! Observation sinks published by the session loops.
//!
//! Each slot is written by one loop and read by any presentation layer. Slots
//! hold the latest value only; nothing queues. Values published together are
//! swapped together, so a reader never mixes two updates of one slot.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::kinematics::Pose;
use crate::pointer::PointerReadout;

/// Everything the status loop publishes in one tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusReadout {
    pub state: String,
    pub status: String,
    /// Feedback positions, radians.
    pub joints: Vec<f64>,
    /// Wrist pose computed from `joints`.
    pub pose: Option<Pose>,
}

#[derive(Debug)]
pub struct Readouts {
    status: ArcSwap<StatusReadout>,
    pointer: ArcSwap<PointerReadout>,
}

impl Default for Readouts {
    fn default() -> Self {
        Self {
            status: ArcSwap::from_pointee(StatusReadout::default()),
            pointer: ArcSwap::from_pointee(PointerReadout::NoPosition),
        }
    }
}

/// Copy of both slots. Fields within one slot always belong to the same
/// publish; the pointer comes from its own loop and may be a tick apart.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadoutSnapshot {
    pub state: String,
    pub status: String,
    pub joints: Vec<f64>,
    pub pose: Option<Pose>,
    pub pointer: PointerReadout,
}

impl Readouts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_status(&self, readout: StatusReadout) {
        self.status.store(Arc::new(readout));
    }

    pub fn publish_pointer(&self, readout: PointerReadout) {
        self.pointer.store(Arc::new(readout));
    }

    pub fn status_readout(&self) -> Arc<StatusReadout> {
        self.status.load_full()
    }

    pub fn status(&self) -> String {
        self.status.load().status.clone()
    }

    pub fn state(&self) -> String {
        self.status.load().state.clone()
    }

    pub fn pointer(&self) -> PointerReadout {
        **self.pointer.load()
    }

    pub fn snapshot(&self) -> ReadoutSnapshot {
        let status = self.status_readout();
        ReadoutSnapshot {
            state: status.state.clone(),
            status: status.status.clone(),
            joints: status.joints.clone(),
            pose: status.pose,
            pointer: self.pointer(),
        }
    }
}
