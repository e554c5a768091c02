use crate::types::{DeviceIndex, InitError, ScreenshotError};
use std::fmt;

/// Errors that can occur when talking to the tracking runtime.
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("Tracking runtime is not initialized")]
    NotReady,

    #[error("Runtime initialization failed: {0}")]
    Init(InitError),

    #[error("No tracking runtime or HMD available")]
    RuntimeUnavailable,

    #[error("Screenshot failed: {0}")]
    Screenshot(ScreenshotError),

    #[error("Device {0} is not connected or has no valid pose")]
    InvalidDevice(DeviceIndex),
}

/// Last-error storage for the C ABI.
#[cfg_attr(not(feature = "openvr"), allow(dead_code))]
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

#[cfg_attr(not(feature = "openvr"), allow(dead_code))]
impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &TrackingError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut msg) = self.message.lock() {
            msg.clear();
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_error_is_nul_terminated() {
        let last = LastError::new();
        assert!(last.as_ptr().is_null());

        last.set(&TrackingError::Init(InitError(108)));
        let msg = unsafe { std::ffi::CStr::from_ptr(last.as_ptr()) };
        assert_eq!(
            msg.to_str().unwrap(),
            "Runtime initialization failed: HMD not found (108)"
        );

        last.clear();
        assert!(last.as_ptr().is_null());
    }
}
