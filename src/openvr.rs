//! OpenVR backend.
//!
//! Talks to the runtime through the C function tables returned by
//! `VR_GetGenericInterface("FnTable:<version>")`.

use crate::runtime::{Connector, Runtime};
use crate::types::{
    ApplicationType, Buttons, ControllerRole, ControllerState, DeviceClass, DeviceIndex,
    DeviceProperty, InitError, PropertyError, RawEvent, RawPose, ScreenshotError,
    ScreenshotHandle, TrackingOrigin, TrackingResult,
};
use openvr_sys as sys;
use std::ffi::{c_char, CString};
use std::path::Path;
use std::{mem, ptr};

const SCREENSHOT_REQUEST_FAILED: ScreenshotError = ScreenshotError(1);

// Function tables handed out by the runtime are fully populated, so a missing
// entry is a broken runtime rather than a recoverable error.
macro_rules! vr_call {
    ($table:expr, $name:ident ( $($arg:expr),* $(,)? )) => {
        ((*$table).$name.expect(concat!("OpenVR function table lacks ", stringify!($name))))($($arg),*)
    };
}

/// Load a function table for an interface version string such as
/// `sys::IVRSystem_Version`.
unsafe fn load_table<T>(version: &[u8]) -> Result<*const T, InitError> {
    let mut name = Vec::from(&b"FnTable:"[..]);
    name.extend_from_slice(version);
    if name.last() != Some(&0) {
        name.push(0);
    }

    let mut error = sys::EVRInitError_VRInitError_None;
    let table = sys::VR_GetGenericInterface(name.as_ptr() as *const c_char, &mut error);
    if error != sys::EVRInitError_VRInitError_None {
        return Err(InitError(error as u32));
    }
    if table == 0 {
        return Err(InitError::INIT_HMD_NOT_FOUND);
    }
    Ok(table as *const T)
}

/// The runtime's `IVRSystem` (plus `IVRScreenshots` when available).
pub struct OpenVrRuntime {
    system: *const sys::VR_IVRSystem_FnTable,
    screenshots: *const sys::VR_IVRScreenshots_FnTable,
}

impl OpenVrRuntime {
    unsafe fn load() -> Result<Self, InitError> {
        let system = load_table::<sys::VR_IVRSystem_FnTable>(sys::IVRSystem_Version)?;
        let screenshots = match load_table::<sys::VR_IVRScreenshots_FnTable>(
            sys::IVRScreenshots_Version,
        ) {
            Ok(table) => table,
            Err(e) => {
                log::warn!("IVRScreenshots unavailable: {}", e);
                ptr::null()
            }
        };
        Ok(Self {
            system,
            screenshots,
        })
    }
}

impl Runtime for OpenVrRuntime {
    fn time_since_last_vsync(&self) -> Option<(f32, u64)> {
        let mut seconds = 0f32;
        let mut frame = 0u64;
        let ok = unsafe { vr_call!(self.system, GetTimeSinceLastVsync(&mut seconds, &mut frame)) };
        ok.then_some((seconds, frame))
    }

    fn device_to_absolute_tracking_pose(
        &self,
        origin: TrackingOrigin,
        predicted_seconds: f32,
        poses: &mut [RawPose],
    ) {
        let mut raw: Vec<sys::TrackedDevicePose_t> =
            (0..poses.len()).map(|_| unsafe { mem::zeroed() }).collect();
        unsafe {
            vr_call!(
                self.system,
                GetDeviceToAbsoluteTrackingPose(
                    origin as sys::ETrackingUniverseOrigin,
                    predicted_seconds,
                    raw.as_mut_ptr(),
                    raw.len() as u32,
                )
            );
        }

        for (out, pose) in poses.iter_mut().zip(raw.iter()) {
            *out = RawPose {
                device_to_absolute: pose.mDeviceToAbsoluteTracking.m,
                velocity: pose.vVelocity.v,
                angular_velocity: pose.vAngularVelocity.v,
                tracking_result: TrackingResult::from_raw(pose.eTrackingResult as u32),
                pose_valid: pose.bPoseIsValid,
                connected: pose.bDeviceIsConnected,
            };
        }
    }

    fn string_property(
        &self,
        index: DeviceIndex,
        prop: DeviceProperty,
        buf: Option<&mut [u8]>,
    ) -> (u32, PropertyError) {
        let (ptr, len) = match buf {
            Some(buf) => (buf.as_mut_ptr() as *mut c_char, buf.len() as u32),
            None => (ptr::null_mut(), 0),
        };
        let mut error = sys::ETrackedPropertyError_TrackedProp_Success;
        let size = unsafe {
            vr_call!(
                self.system,
                GetStringTrackedDeviceProperty(
                    index,
                    prop as sys::ETrackedDeviceProperty,
                    ptr,
                    len,
                    &mut error,
                )
            )
        };
        (size, PropertyError::from_raw(error as u32))
    }

    fn float_property(&self, index: DeviceIndex, prop: DeviceProperty) -> (f32, PropertyError) {
        let mut error = sys::ETrackedPropertyError_TrackedProp_Success;
        let value = unsafe {
            vr_call!(
                self.system,
                GetFloatTrackedDeviceProperty(index, prop as sys::ETrackedDeviceProperty, &mut error)
            )
        };
        (value, PropertyError::from_raw(error as u32))
    }

    fn bool_property(&self, index: DeviceIndex, prop: DeviceProperty) -> (bool, PropertyError) {
        let mut error = sys::ETrackedPropertyError_TrackedProp_Success;
        let value = unsafe {
            vr_call!(
                self.system,
                GetBoolTrackedDeviceProperty(index, prop as sys::ETrackedDeviceProperty, &mut error)
            )
        };
        (value, PropertyError::from_raw(error as u32))
    }

    fn int32_property(&self, index: DeviceIndex, prop: DeviceProperty) -> (i32, PropertyError) {
        let mut error = sys::ETrackedPropertyError_TrackedProp_Success;
        let value = unsafe {
            vr_call!(
                self.system,
                GetInt32TrackedDeviceProperty(index, prop as sys::ETrackedDeviceProperty, &mut error)
            )
        };
        (value, PropertyError::from_raw(error as u32))
    }

    fn uint64_property(&self, index: DeviceIndex, prop: DeviceProperty) -> (u64, PropertyError) {
        let mut error = sys::ETrackedPropertyError_TrackedProp_Success;
        let value = unsafe {
            vr_call!(
                self.system,
                GetUint64TrackedDeviceProperty(index, prop as sys::ETrackedDeviceProperty, &mut error)
            )
        };
        (value, PropertyError::from_raw(error as u32))
    }

    fn tracked_device_class(&self, index: DeviceIndex) -> DeviceClass {
        let class = unsafe { vr_call!(self.system, GetTrackedDeviceClass(index)) };
        DeviceClass::from_raw(class as u32)
    }

    fn is_tracked_device_connected(&self, index: DeviceIndex) -> bool {
        unsafe { vr_call!(self.system, IsTrackedDeviceConnected(index)) }
    }

    fn device_index_for_controller_role(&self, role: ControllerRole) -> DeviceIndex {
        unsafe {
            vr_call!(
                self.system,
                GetTrackedDeviceIndexForControllerRole(role as sys::ETrackedControllerRole)
            )
        }
    }

    fn controller_state(&self, index: DeviceIndex) -> Option<ControllerState> {
        let mut state: sys::VRControllerState_t = unsafe { mem::zeroed() };
        let size = mem::size_of::<sys::VRControllerState_t>() as u32;
        let ok = unsafe { vr_call!(self.system, GetControllerState(index, &mut state, size)) };
        if !ok {
            return None;
        }

        let mut axes = [(0.0, 0.0); 5];
        for (out, axis) in axes.iter_mut().zip(state.rAxis.iter()) {
            *out = (axis.x, axis.y);
        }
        Some(ControllerState {
            packet_num: state.unPacketNum,
            pressed: Buttons::from_bits_retain(state.ulButtonPressed),
            touched: Buttons::from_bits_retain(state.ulButtonTouched),
            axes,
        })
    }

    fn trigger_haptic_pulse(&self, index: DeviceIndex, axis: u32, duration_us: u16) {
        unsafe { vr_call!(self.system, TriggerHapticPulse(index, axis, duration_us)) }
    }

    fn poll_next_event(&mut self) -> Option<RawEvent> {
        let mut event: sys::VREvent_t = unsafe { mem::zeroed() };
        let size = mem::size_of::<sys::VREvent_t>() as u32;
        let got = unsafe { vr_call!(self.system, PollNextEvent(&mut event, size)) };
        got.then(|| RawEvent {
            event_type: event.eventType,
            device: event.trackedDeviceIndex,
            age_seconds: event.eventAgeSeconds,
        })
    }

    fn take_stereo_screenshot(
        &self,
        preview_path: &Path,
        vr_path: &Path,
    ) -> Result<ScreenshotHandle, ScreenshotError> {
        if self.screenshots.is_null() {
            return Err(SCREENSHOT_REQUEST_FAILED);
        }
        let preview = path_to_cstring(preview_path).ok_or(SCREENSHOT_REQUEST_FAILED)?;
        let vr = path_to_cstring(vr_path).ok_or(SCREENSHOT_REQUEST_FAILED)?;

        let mut handle: sys::ScreenshotHandle_t = 0;
        let error = unsafe {
            vr_call!(
                self.screenshots,
                TakeStereoScreenshot(
                    &mut handle,
                    preview.as_ptr() as *mut c_char,
                    vr.as_ptr() as *mut c_char,
                )
            )
        };
        match error as u32 {
            0 => Ok(handle),
            code => Err(ScreenshotError(code)),
        }
    }
}

fn path_to_cstring(path: &Path) -> Option<CString> {
    CString::new(path.to_string_lossy().into_owned()).ok()
}

/// Connects to the OpenVR runtime of this machine.
#[derive(Debug, Default)]
pub struct OpenVrConnector;

impl OpenVrConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for OpenVrConnector {
    type Runtime = OpenVrRuntime;

    fn existing(&mut self) -> Option<OpenVrRuntime> {
        // The system table is only handed out once VR_Init ran in this process.
        unsafe { OpenVrRuntime::load() }.ok()
    }

    fn init(&mut self, app_type: ApplicationType) -> Result<OpenVrRuntime, InitError> {
        let mut error = sys::EVRInitError_VRInitError_None;
        unsafe {
            sys::VR_InitInternal(&mut error, app_type as sys::EVRApplicationType);
        }
        if error != sys::EVRInitError_VRInitError_None {
            return Err(InitError(error as u32));
        }
        unsafe { OpenVrRuntime::load() }
    }

    fn is_available(&self) -> bool {
        unsafe { sys::VR_IsRuntimeInstalled() && sys::VR_IsHmdPresent() }
    }
}
