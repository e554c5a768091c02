//! C ABI for engine plugins.
//!
//! Provides an opaque handle-based API over the OpenVR tracker.
//! The generated C header is written to `include/ovr_tracking.h` by cbindgen.

use crate::error::LastError;
use crate::openvr::OpenVrConnector;
use crate::runtime::Connector;
use crate::tracker::Tracker;
use crate::transform::DeviceTransform;
use crate::types::{ApplicationType, DeviceIndex, INVALID_DEVICE_INDEX};
use crate::Result;
use std::ffi::{c_char, c_int, CStr};

static LAST_ERROR: LastError = LastError::new();

/// Opaque tracker handle for C consumers.
pub struct OvrTracker(Tracker<OpenVrConnector>);

/// Device transform in C-compatible layout, engine (left-handed) frame.
#[repr(C)]
pub struct OvrTransform {
    pub device: u32,
    /// Position [x, y, z] in meters.
    pub position: [f32; 3],
    /// Rotation quaternion [x, y, z, w].
    pub rotation: [f32; 4],
    pub velocity: [f32; 3],
    pub angular_velocity: [f32; 3],
}

impl From<&DeviceTransform> for OvrTransform {
    fn from(t: &DeviceTransform) -> Self {
        let q = t.rotation.quaternion();
        OvrTransform {
            device: t.device,
            position: [t.position.x, t.position.y, t.position.z],
            rotation: [q.i, q.j, q.k, q.w],
            velocity: [t.velocity.x, t.velocity.y, t.velocity.z],
            angular_velocity: [t.angular_velocity.x, t.angular_velocity.y, t.angular_velocity.z],
        }
    }
}

fn app_type_from_c(app_type: c_int) -> ApplicationType {
    match app_type {
        0 => ApplicationType::Other,
        2 => ApplicationType::Overlay,
        3 => ApplicationType::Background,
        4 => ApplicationType::Utility,
        _ => ApplicationType::Scene,
    }
}

/// Create a tracker, attaching to a runtime already running in this process.
/// Never returns NULL.
#[no_mangle]
pub extern "C" fn ovr_tracker_create() -> *mut OvrTracker {
    Box::into_raw(Box::new(OvrTracker(Tracker::new(OpenVrConnector::new()))))
}

/// Release a tracker. The runtime keeps running.
///
/// # Safety
/// `tracker` must be a pointer returned by `ovr_tracker_create`, or null.
#[no_mangle]
pub unsafe extern "C" fn ovr_tracker_destroy(tracker: *mut OvrTracker) {
    if !tracker.is_null() {
        drop(Box::from_raw(tracker));
    }
}

fn report<T>(result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => {
            LAST_ERROR.clear();
            Some(value)
        }
        Err(e) => {
            LAST_ERROR.set(&e);
            None
        }
    }
}

/// Attach to a running runtime or initialize one.
/// `app_type`: 0 = other, 1 = scene, 2 = overlay, 3 = background, 4 = utility.
/// On failure check `ovr_last_error()`.
///
/// # Safety
/// `tracker` must be a valid tracker pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn ovr_tracker_start(tracker: *mut OvrTracker, app_type: c_int) -> bool {
    if tracker.is_null() {
        return false;
    }
    let tracker = &mut *tracker;
    report(tracker.0.try_start(app_type_from_c(app_type))).is_some()
}

/// Initialize the runtime. Returns 0 on success, -1 on error
/// (check `ovr_last_error()`).
///
/// # Safety
/// `tracker` must be a valid tracker pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn ovr_tracker_setup(tracker: *mut OvrTracker, app_type: c_int) -> c_int {
    if tracker.is_null() {
        return -1;
    }
    let tracker = &mut *tracker;
    match report(tracker.0.setup(app_type_from_c(app_type))) {
        Some(()) => 0,
        None => -1,
    }
}

/// # Safety
/// `tracker` must be a valid tracker pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn ovr_tracker_is_ready(tracker: *const OvrTracker) -> bool {
    if tracker.is_null() {
        return false;
    }
    (*tracker).0.is_ready()
}

/// Advance to `frame`, rebuilding the pose snapshot if needed.
/// Returns whether a rebuild happened.
///
/// # Safety
/// `tracker` must be a valid tracker pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn ovr_tracker_refresh(tracker: *mut OvrTracker, frame: u64) -> bool {
    if tracker.is_null() {
        return false;
    }
    let tracker = &mut *tracker;
    tracker.0.refresh(frame)
}

/// # Safety
/// `tracker` must be a valid tracker pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn ovr_tracker_is_device_valid(
    tracker: *mut OvrTracker,
    index: DeviceIndex,
) -> bool {
    if tracker.is_null() {
        return false;
    }
    let tracker = &mut *tracker;
    tracker.0.is_device_valid(index)
}

fn write_transform<C: Connector>(
    tracker: &mut Tracker<C>,
    index: DeviceIndex,
    out: &mut OvrTransform,
) -> c_int {
    match report(tracker.try_transform(index)) {
        Some(t) => {
            *out = OvrTransform::from(&t);
            0
        }
        None => -1,
    }
}

/// Write the transform of a valid device into `out`.
/// Returns 0 on success, -1 when the device has no valid pose
/// (check `ovr_last_error()`).
///
/// # Safety
/// `tracker` and `out` must be valid pointers, or null.
#[no_mangle]
pub unsafe extern "C" fn ovr_tracker_transform(
    tracker: *mut OvrTracker,
    index: DeviceIndex,
    out: *mut OvrTransform,
) -> c_int {
    if tracker.is_null() || out.is_null() {
        return -1;
    }
    write_transform(&mut (*tracker).0, index, &mut *out)
}

/// Write the transform of the connected device with `serial` into `out`.
/// Returns 0 on success, -1 when no such device has a valid pose
/// (check `ovr_last_error()`).
///
/// # Safety
/// `tracker` and `out` must be valid pointers, `serial` a null-terminated
/// string; any may be null.
#[no_mangle]
pub unsafe extern "C" fn ovr_tracker_transform_by_serial(
    tracker: *mut OvrTracker,
    serial: *const c_char,
    out: *mut OvrTransform,
) -> c_int {
    if tracker.is_null() || serial.is_null() || out.is_null() {
        return -1;
    }
    let serial = CStr::from_ptr(serial).to_string_lossy();
    let tracker = &mut (*tracker).0;
    let index = tracker.device_index_by_serial(&serial);
    write_transform(tracker, index, &mut *out)
}

/// Find a connected device by serial number.
/// Returns the device index or `UINT32_MAX` when not found.
///
/// # Safety
/// `tracker` must be a valid tracker pointer, `serial` a null-terminated string;
/// either may be null.
#[no_mangle]
pub unsafe extern "C" fn ovr_tracker_device_by_serial(
    tracker: *const OvrTracker,
    serial: *const c_char,
) -> DeviceIndex {
    if tracker.is_null() || serial.is_null() {
        return INVALID_DEVICE_INDEX;
    }
    let serial = CStr::from_ptr(serial).to_string_lossy();
    (*tracker).0.device_index_by_serial(&serial)
}

/// Copy a device's serial number into `buf` as a null-terminated string,
/// truncating to `len - 1` bytes. Returns the number of bytes written
/// (without the terminator), or -1 when unavailable.
///
/// # Safety
/// `tracker` must be a valid tracker pointer, `buf` must point to `len`
/// writable bytes; either may be null.
#[no_mangle]
pub unsafe extern "C" fn ovr_tracker_serial_number(
    tracker: *const OvrTracker,
    index: DeviceIndex,
    buf: *mut c_char,
    len: usize,
) -> c_int {
    if tracker.is_null() || buf.is_null() || len == 0 {
        return -1;
    }
    let Some(serial) = (*tracker).0.serial_number(index) else {
        return -1;
    };
    let bytes = serial.as_bytes();
    let n = bytes.len().min(len - 1);
    std::ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, buf, n);
    buf.add(n).write(0);
    n as c_int
}

/// Get the last error message. Returns NULL if no error.
/// The returned pointer is valid until the next ovr_tracking API call.
#[no_mangle]
pub extern "C" fn ovr_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{UnitQuaternion, Vector3};

    #[test]
    fn test_transform_layout_is_xyzw() {
        let t = DeviceTransform {
            device: 3,
            position: Vector3::new(1.0, 2.0, 3.0),
            rotation: UnitQuaternion::identity(),
            ..Default::default()
        };
        let c = OvrTransform::from(&t);
        assert_eq!(c.device, 3);
        assert_eq!(c.position, [1.0, 2.0, 3.0]);
        assert_eq!(c.rotation, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_write_transform_sets_last_error() {
        use crate::mock::{MockConnector, MockDevice, MockRuntime};
        use crate::types::DeviceClass;

        let rt = MockRuntime::new();
        rt.add_device(
            2,
            MockDevice::new(DeviceClass::GenericTracker).at([0.0, 1.0, 2.0], [0.0; 3], [0.0; 3]),
        );
        rt.set_running(true);
        let mut tracker = Tracker::new(MockConnector::new(rt));
        let mut out = OvrTransform::from(&DeviceTransform::default());

        assert_eq!(write_transform(&mut tracker, 5, &mut out), -1);
        let msg = unsafe { CStr::from_ptr(ovr_last_error()) };
        assert_eq!(
            msg.to_str().unwrap(),
            "Device 5 is not connected or has no valid pose"
        );

        assert_eq!(write_transform(&mut tracker, 2, &mut out), 0);
        assert_eq!(out.device, 2);
        assert_eq!(out.position, [0.0, 1.0, -2.0]);
        assert!(ovr_last_error().is_null());
    }

    #[test]
    fn test_app_type_mapping() {
        assert_eq!(app_type_from_c(2), ApplicationType::Overlay);
        assert_eq!(app_type_from_c(42), ApplicationType::Scene);
    }
}
