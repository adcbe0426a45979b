use tmm_bench::BenchError;
use tmm_kernel::AcceleratorError;

/// Status codes returned by all FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TmmStatus {
    Ok = 0,
    ErrorInvalidArgument = 1,
    ErrorResource = 2,
    ErrorLaunch = 3,
    ErrorInternal = 4,
}

impl From<&BenchError> for TmmStatus {
    fn from(err: &BenchError) -> Self {
        if err.is_configuration() {
            return TmmStatus::ErrorInvalidArgument;
        }
        match err {
            BenchError::Accelerator(AcceleratorError::Resource(_)) => TmmStatus::ErrorResource,
            BenchError::Accelerator(_) => TmmStatus::ErrorLaunch,
            _ => TmmStatus::ErrorInternal,
        }
    }
}
