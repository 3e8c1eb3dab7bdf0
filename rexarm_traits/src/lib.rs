pub mod clock;
pub mod frame;

pub use clock::{Clock, MonotonicClock};
pub use frame::{DepthImage, RgbImage};

/// Error type crossing the capability boundary.
pub type CapError = Box<dyn std::error::Error + Send + Sync>;

/// Command/feedback interface of one motorized joint.
///
/// Calls are blocking and synchronous; positions are radians, speed and
/// torque are normalized to 0..=1.
pub trait Joint {
    fn set_position(&mut self, rad: f64) -> Result<(), CapError>;
    fn get_position(&mut self) -> Result<f64, CapError>;
    fn set_speed(&mut self, normalized: f64) -> Result<(), CapError>;
    fn get_speed(&mut self) -> Result<f64, CapError>;
    fn set_torque_limit(&mut self, normalized: f64) -> Result<(), CapError>;
    fn enable_torque(&mut self) -> Result<(), CapError>;
    fn disable_torque(&mut self) -> Result<(), CapError>;
    /// Signed load, -1..=1.
    fn get_load(&mut self) -> Result<f64, CapError>;
    /// Degrees Celsius.
    fn get_temp(&mut self) -> Result<f64, CapError>;
    fn is_moving(&mut self) -> Result<bool, CapError>;
    /// Top speed in rad/s, used to normalize engineering speeds.
    fn max_speed(&self) -> f64;
}

impl<J: Joint + ?Sized> Joint for Box<J> {
    fn set_position(&mut self, rad: f64) -> Result<(), CapError> {
        (**self).set_position(rad)
    }
    fn get_position(&mut self) -> Result<f64, CapError> {
        (**self).get_position()
    }
    fn set_speed(&mut self, normalized: f64) -> Result<(), CapError> {
        (**self).set_speed(normalized)
    }
    fn get_speed(&mut self) -> Result<f64, CapError> {
        (**self).get_speed()
    }
    fn set_torque_limit(&mut self, normalized: f64) -> Result<(), CapError> {
        (**self).set_torque_limit(normalized)
    }
    fn enable_torque(&mut self) -> Result<(), CapError> {
        (**self).enable_torque()
    }
    fn disable_torque(&mut self) -> Result<(), CapError> {
        (**self).disable_torque()
    }
    fn get_load(&mut self) -> Result<f64, CapError> {
        (**self).get_load()
    }
    fn get_temp(&mut self) -> Result<f64, CapError> {
        (**self).get_temp()
    }
    fn is_moving(&mut self) -> Result<bool, CapError> {
        (**self).is_moving()
    }
    fn max_speed(&self) -> f64 {
        (**self).max_speed()
    }
}

/// RGB + depth camera.
///
/// `capture_*` grabs a new frame into the provider; `convert_*` renders the
/// captured frame for display; `current_depth_frame` exposes the raw samples.
pub trait VisionProvider {
    fn capture_video_frame(&mut self) -> Result<(), CapError>;
    fn capture_depth_frame(&mut self) -> Result<(), CapError>;
    fn convert_frame(&mut self) -> Result<RgbImage, CapError>;
    fn convert_depth_frame(&mut self) -> Result<RgbImage, CapError>;
    fn current_depth_frame(&self) -> DepthImage;
}
