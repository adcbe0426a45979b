use thiserror::Error;
use tmm_kernel::AcceleratorError;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("accelerator error: {0}")]
    Accelerator(#[from] AcceleratorError),
    #[error("cannot encode report: {0}")]
    Json(#[from] serde_json::Error),
    #[error("verification failed: {0}")]
    Verification(String),
}

impl BenchError {
    /// True when the run was rejected before any device work started.
    pub fn is_configuration(&self) -> bool {
        match self {
            BenchError::InvalidArgument(_) | BenchError::Toml(_) => true,
            BenchError::Accelerator(e) => e.is_configuration(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;
