//! C ABI for driving the tiled matmul benchmark from external harnesses.
//!
//! Every entry point returns a [`TmmStatus`]. On failure the message is kept
//! per thread and can be fetched once with [`tmm_last_error`].

mod error;
mod types;

pub use types::*;

use std::ffi::CString;
use std::os::raw::c_char;

use tmm_bench::{BenchConfig, BenchmarkRunner};
use tmm_kernel::{CpuDevice, DEFAULT_TILE};

/// Execute a closure that returns a `TmmStatus`, catching any panics
/// and converting them into `TmmStatus::ErrorInternal`.
fn catch_panic<F: FnOnce() -> TmmStatus + std::panic::UnwindSafe>(f: F) -> TmmStatus {
    match std::panic::catch_unwind(f) {
        Ok(status) => status,
        Err(_) => error::fail(TmmStatus::ErrorInternal, "internal panic"),
    }
}

/// Time one tiled matmul round trip on the simulated device.
///
/// The matrices are `tile * repeat_factor` square. A `tile` of 0 selects the
/// default edge of 32. On success the elapsed seconds are written to
/// `*out_seconds`; on failure it is left untouched.
///
/// # Safety
/// `out_seconds` must be null or point to writable memory for one `double`.
#[no_mangle]
pub unsafe extern "C" fn tmm_bench_run(
    repeat_factor: i64,
    tile: u32,
    out_seconds: *mut f64,
) -> TmmStatus {
    catch_panic(|| {
        error::clear();
        if out_seconds.is_null() {
            return error::fail(TmmStatus::ErrorInvalidArgument, "out_seconds is null");
        }
        let tile = if tile == 0 { DEFAULT_TILE } else { tile as usize };

        let result = BenchConfig::new(repeat_factor)
            .and_then(|config| config.with_tile(tile))
            .and_then(|config| BenchmarkRunner::new(CpuDevice::new(), config).run());

        match result {
            Ok(secs) => {
                unsafe {
                    *out_seconds = secs;
                }
                TmmStatus::Ok
            }
            Err(e) => {
                log::debug!("tmm_bench_run failed: {e}");
                error::fail(TmmStatus::from(&e), e.to_string())
            }
        }
    })
}

/// Retrieve the last error message on this thread.
///
/// Returns null if no error is pending. The caller owns the returned string
/// and must free it with `tmm_free_string`.
#[no_mangle]
pub extern "C" fn tmm_last_error() -> *const c_char {
    match error::take() {
        Some(e) => e.into_raw(),
        None => std::ptr::null(),
    }
}

/// Free a string previously returned by `tmm_last_error`.
///
/// # Safety
/// `s` must be null or a pointer obtained from `tmm_last_error` that has not
/// been freed yet.
#[no_mangle]
pub unsafe extern "C" fn tmm_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    fn last_error() -> Option<String> {
        let ptr = tmm_last_error();
        if ptr.is_null() {
            return None;
        }
        let msg = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
        unsafe { tmm_free_string(ptr as *mut c_char) };
        Some(msg)
    }

    #[test]
    fn test_run_writes_seconds() {
        let mut secs = -1.0;
        let status = unsafe { tmm_bench_run(1, 0, &mut secs) };
        assert_eq!(status, TmmStatus::Ok);
        assert!(secs >= 0.0);
        assert!(last_error().is_none());
    }

    #[test]
    fn test_run_with_custom_tile() {
        let mut secs = -1.0;
        let status = unsafe { tmm_bench_run(2, 8, &mut secs) };
        assert_eq!(status, TmmStatus::Ok);
        assert!(secs >= 0.0);
    }

    #[test]
    fn test_non_positive_repeat_factor() {
        let mut secs = -1.0;
        let status = unsafe { tmm_bench_run(0, 0, &mut secs) };
        assert_eq!(status, TmmStatus::ErrorInvalidArgument);
        assert_eq!(secs, -1.0);
        let msg = last_error().unwrap();
        assert!(msg.contains("repeat"), "{msg}");
        // Taken once.
        assert!(last_error().is_none());
    }

    #[test]
    fn test_oversized_tile() {
        let mut secs = 0.0;
        let status = unsafe { tmm_bench_run(1, 64, &mut secs) };
        assert_eq!(status, TmmStatus::ErrorInvalidArgument);
        assert!(last_error().is_some());
    }

    #[test]
    fn test_null_out_pointer() {
        let status = unsafe { tmm_bench_run(1, 0, std::ptr::null_mut()) };
        assert_eq!(status, TmmStatus::ErrorInvalidArgument);
        assert_eq!(last_error().as_deref(), Some("out_seconds is null"));
    }

    #[test]
    fn test_free_null_is_noop() {
        unsafe { tmm_free_string(std::ptr::null_mut()) };
    }

    #[test]
    fn test_status_mapping() {
        use tmm_bench::BenchError;
        use tmm_kernel::AcceleratorError;

        let resource = BenchError::Accelerator(AcceleratorError::Resource("oom".into()));
        let launch = BenchError::Accelerator(AcceleratorError::Launch("fault".into()));
        let verify = BenchError::Verification("mismatch".into());
        assert_eq!(TmmStatus::from(&resource), TmmStatus::ErrorResource);
        assert_eq!(TmmStatus::from(&launch), TmmStatus::ErrorLaunch);
        assert_eq!(TmmStatus::from(&verify), TmmStatus::ErrorInternal);
    }

    #[test]
    fn test_catch_panic() {
        let status = catch_panic(|| panic!("boom"));
        assert_eq!(status, TmmStatus::ErrorInternal);
        assert_eq!(last_error().as_deref(), Some("internal panic"));
    }
}
