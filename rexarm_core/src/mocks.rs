//! Test and helper mocks for rexarm_core

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rexarm_traits::{CapError, DepthImage, Joint, RgbImage, VisionProvider};

/// Per-method call counters of a `SpyJoint`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub set_position: u64,
    pub set_speed: u64,
    pub set_torque_limit: u64,
    pub enable_torque: u64,
    pub disable_torque: u64,
    pub get_position: u64,
    pub get_speed: u64,
    pub get_load: u64,
    pub get_temp: u64,
    pub is_moving: u64,
}

impl CallCounts {
    /// Calls that write to the actuator.
    pub fn commands(&self) -> u64 {
        self.set_position
            + self.set_speed
            + self.set_torque_limit
            + self.enable_torque
            + self.disable_torque
    }

    /// Feedback reads.
    pub fn polls(&self) -> u64 {
        self.get_position + self.get_speed + self.get_load + self.get_temp + self.is_moving
    }
}

#[derive(Debug, Clone)]
enum SpyFailure {
    Timeout,
    Fault(String),
}

/// Callback run after every successful `set_position`.
struct PositionHook(Box<dyn FnMut(f64) + Send>);

impl std::fmt::Debug for PositionHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PositionHook")
    }
}

#[derive(Debug, Default)]
struct SpyState {
    counts: CallCounts,
    feedback_position: f64,
    last_position: Option<f64>,
    last_speed: Option<f64>,
    last_torque: Option<f64>,
    torque_on: bool,
    failures: VecDeque<SpyFailure>,
    on_position: Option<PositionHook>,
}

/// Joint that records every call and reports a settable feedback position.
pub struct SpyJoint {
    max_speed: f64,
    state: Arc<Mutex<SpyState>>,
}

/// Inspection side of a `SpyJoint`.
#[derive(Clone)]
pub struct SpyHandle {
    state: Arc<Mutex<SpyState>>,
}

impl SpyJoint {
    pub fn new(max_speed: f64) -> (Self, SpyHandle) {
        let state = Arc::new(Mutex::new(SpyState::default()));
        (
            Self {
                max_speed,
                state: state.clone(),
            },
            SpyHandle { state },
        )
    }

    fn call<T>(
        &mut self,
        bump: impl FnOnce(&mut CallCounts),
        f: impl FnOnce(&mut SpyState) -> T,
    ) -> Result<T, CapError> {
        let mut s = self.state.lock();
        bump(&mut s.counts);
        match s.failures.pop_front() {
            Some(SpyFailure::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "spy timeout",
            ))),
            Some(SpyFailure::Fault(msg)) => Err(Box::new(std::io::Error::other(msg))),
            None => Ok(f(&mut *s)),
        }
    }
}

impl SpyHandle {
    pub fn counts(&self) -> CallCounts {
        self.state.lock().counts
    }

    pub fn reset_counts(&self) {
        self.state.lock().counts = CallCounts::default();
    }

    pub fn set_feedback_position(&self, rad: f64) {
        self.state.lock().feedback_position = rad;
    }

    pub fn last_position(&self) -> Option<f64> {
        self.state.lock().last_position
    }

    pub fn last_speed(&self) -> Option<f64> {
        self.state.lock().last_speed
    }

    pub fn last_torque(&self) -> Option<f64> {
        self.state.lock().last_torque
    }

    pub fn torque_on(&self) -> bool {
        self.state.lock().torque_on
    }

    /// The next `n` calls fail with a timeout.
    pub fn fail_with_timeouts(&self, n: usize) {
        let mut s = self.state.lock();
        s.failures.extend(std::iter::repeat_n(SpyFailure::Timeout, n));
    }

    /// Run `hook` with the target after each accepted position write.
    pub fn on_set_position(&self, hook: impl FnMut(f64) + Send + 'static) {
        self.state.lock().on_position = Some(PositionHook(Box::new(hook)));
    }

    /// The next call fails with a non-timeout error.
    pub fn fail_with_fault(&self, msg: &str) {
        self.state
            .lock()
            .failures
            .push_back(SpyFailure::Fault(msg.to_string()));
    }
}

impl Joint for SpyJoint {
    fn set_position(&mut self, rad: f64) -> Result<(), CapError> {
        self.call(
            |c| c.set_position += 1,
            |s| {
                s.last_position = Some(rad);
                if let Some(PositionHook(hook)) = s.on_position.as_mut() {
                    hook(rad);
                }
            },
        )
    }
    fn get_position(&mut self) -> Result<f64, CapError> {
        self.call(|c| c.get_position += 1, |s| s.feedback_position)
    }
    fn set_speed(&mut self, normalized: f64) -> Result<(), CapError> {
        self.call(|c| c.set_speed += 1, |s| s.last_speed = Some(normalized))
    }
    fn get_speed(&mut self) -> Result<f64, CapError> {
        self.call(|c| c.get_speed += 1, |_| 0.0)
    }
    fn set_torque_limit(&mut self, normalized: f64) -> Result<(), CapError> {
        self.call(|c| c.set_torque_limit += 1, |s| s.last_torque = Some(normalized))
    }
    fn enable_torque(&mut self) -> Result<(), CapError> {
        self.call(|c| c.enable_torque += 1, |s| s.torque_on = true)
    }
    fn disable_torque(&mut self) -> Result<(), CapError> {
        self.call(|c| c.disable_torque += 1, |s| s.torque_on = false)
    }
    fn get_load(&mut self) -> Result<f64, CapError> {
        self.call(|c| c.get_load += 1, |_| 0.0)
    }
    fn get_temp(&mut self) -> Result<f64, CapError> {
        self.call(|c| c.get_temp += 1, |_| 30.0)
    }
    fn is_moving(&mut self) -> Result<bool, CapError> {
        self.call(|c| c.is_moving += 1, |_| false)
    }
    fn max_speed(&self) -> f64 {
        self.max_speed
    }
}

/// Vision provider that serves one fixed depth frame; optionally fails every capture.
pub struct StaticVision {
    depth: DepthImage,
    fail: bool,
}

impl StaticVision {
    pub fn new(depth: DepthImage) -> Self {
        Self { depth, fail: false }
    }

    pub fn failing(depth: DepthImage) -> Self {
        Self { depth, fail: true }
    }

    fn check(&self) -> Result<(), CapError> {
        if self.fail {
            Err(Box::new(std::io::Error::other("camera unplugged")))
        } else {
            Ok(())
        }
    }
}

impl VisionProvider for StaticVision {
    fn capture_video_frame(&mut self) -> Result<(), CapError> {
        self.check()
    }
    fn capture_depth_frame(&mut self) -> Result<(), CapError> {
        self.check()
    }
    fn convert_frame(&mut self) -> Result<RgbImage, CapError> {
        Ok(RgbImage::blank(self.depth.width, self.depth.height))
    }
    fn convert_depth_frame(&mut self) -> Result<RgbImage, CapError> {
        Ok(RgbImage::blank(self.depth.width, self.depth.height))
    }
    fn current_depth_frame(&self) -> DepthImage {
        self.depth.clone()
    }
}
