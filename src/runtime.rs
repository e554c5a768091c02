//! The boundary between the tracker and a concrete VR runtime.
//!
//! Methods mirror the runtime's own calls closely (error codes as out values,
//! two-call string reads) so that backends stay thin and the policy lives in
//! [`Tracker`](crate::Tracker).

use crate::types::{
    ApplicationType, ControllerRole, ControllerState, DeviceClass, DeviceIndex, DeviceProperty,
    InitError, PropertyError, RawEvent, RawPose, ScreenshotError, ScreenshotHandle,
    TrackingOrigin,
};
use std::path::Path;

/// An initialized runtime's system interface.
pub trait Runtime {
    /// Seconds since the last vsync and the frame counter, if the runtime has
    /// vsync timing.
    fn time_since_last_vsync(&self) -> Option<(f32, u64)>;

    /// Fill `poses` with every device's pose, predicted `predicted_seconds`
    /// into the future.
    fn device_to_absolute_tracking_pose(
        &self,
        origin: TrackingOrigin,
        predicted_seconds: f32,
        poses: &mut [RawPose],
    );

    /// Read a string property. Returns the size (including the terminating
    /// NUL) the value needs and the error code. With `buf` set to `None` or
    /// too small, the runtime answers `BufferTooSmall` and the required size.
    fn string_property(
        &self,
        index: DeviceIndex,
        prop: DeviceProperty,
        buf: Option<&mut [u8]>,
    ) -> (u32, PropertyError);

    fn float_property(&self, index: DeviceIndex, prop: DeviceProperty) -> (f32, PropertyError);

    fn bool_property(&self, index: DeviceIndex, prop: DeviceProperty) -> (bool, PropertyError);

    fn int32_property(&self, index: DeviceIndex, prop: DeviceProperty) -> (i32, PropertyError);

    fn uint64_property(&self, index: DeviceIndex, prop: DeviceProperty) -> (u64, PropertyError);

    fn tracked_device_class(&self, index: DeviceIndex) -> DeviceClass;

    fn is_tracked_device_connected(&self, index: DeviceIndex) -> bool;

    fn device_index_for_controller_role(&self, role: ControllerRole) -> DeviceIndex;

    fn controller_state(&self, index: DeviceIndex) -> Option<ControllerState>;

    fn trigger_haptic_pulse(&self, index: DeviceIndex, axis: u32, duration_us: u16);

    /// Next pending event, if any.
    fn poll_next_event(&mut self) -> Option<RawEvent>;

    fn take_stereo_screenshot(
        &self,
        preview_path: &Path,
        vr_path: &Path,
    ) -> std::result::Result<ScreenshotHandle, ScreenshotError>;
}

/// Finds or starts a runtime.
pub trait Connector {
    type Runtime: Runtime;

    /// A runtime already initialized in this process, without initializing a
    /// new one.
    fn existing(&mut self) -> Option<Self::Runtime>;

    /// Initialize the runtime for the given application type.
    fn init(&mut self, app_type: ApplicationType) -> std::result::Result<Self::Runtime, InitError>;

    /// Whether a runtime could be used at all on this machine.
    fn is_available(&self) -> bool;
}
