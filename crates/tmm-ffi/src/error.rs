// Per-thread error slot read back through `tmm_last_error`.

use std::cell::RefCell;
use std::ffi::CString;

use crate::types::TmmStatus;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Record `msg` as this thread's pending error and hand back `status`, so a
/// failing entry point can `return fail(..)` in one step.
pub(crate) fn fail(status: TmmStatus, msg: impl Into<String>) -> TmmStatus {
    // A C string cannot carry interior NULs.
    let msg = msg.into().replace('\0', " ");
    LAST_ERROR.set(CString::new(msg).ok());
    status
}

/// Remove and return the pending error, if any.
pub(crate) fn take() -> Option<CString> {
    LAST_ERROR.take()
}

pub(crate) fn clear() {
    LAST_ERROR.set(None);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_returns_status_and_stores_message() {
        let status = fail(TmmStatus::ErrorLaunch, "bad\0launch");
        assert_eq!(status, TmmStatus::ErrorLaunch);
        assert_eq!(take().unwrap().to_str().unwrap(), "bad launch");
        assert!(take().is_none());
    }

    #[test]
    fn test_clear() {
        fail(TmmStatus::ErrorInternal, "stale");
        clear();
        assert!(take().is_none());
    }
}
