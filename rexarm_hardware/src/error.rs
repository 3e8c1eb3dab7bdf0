use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("bus error: {0}")]
    Bus(String),
    #[error("actuator timeout")]
    Timeout,
    #[error("actuator {id} did not respond")]
    NoResponse { id: u8 },
    #[error("depth sensor not ready")]
    SensorNotReady,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
