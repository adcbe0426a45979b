use thiserror::Error;

#[derive(Error, Debug)]
pub enum AcceleratorError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("device resource error: {0}")]
    Resource(String),
    #[error("kernel launch failed: {0}")]
    Launch(String),
    #[error("kernel compilation failed: {0}")]
    Compilation(String),
    #[error("accelerator unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
}

impl AcceleratorError {
    /// True for errors raised before any device work was attempted.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AcceleratorError::Configuration(_) | AcceleratorError::ShapeMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AcceleratorError>;
