//! In-process runtime for tests and demos.
//!
//! `MockRuntime` is a cheap handle onto shared state, so a test can keep one
//! clone to script devices and inspect calls while the tracker owns another.

use crate::runtime::{Connector, Runtime};
use crate::types::{
    ApplicationType, ControllerRole, ControllerState, DeviceClass, DeviceIndex, DeviceProperty,
    InitError, PropertyError, RawEvent, RawPose, ScreenshotError, ScreenshotHandle,
    TrackingOrigin, TrackingResult, INVALID_DEVICE_INDEX,
};
use std::cell::{Ref, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// A scripted tracked device.
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    pub class: DeviceClass,
    pub connected: bool,
    pub pose: RawPose,
    pub role: Option<ControllerRole>,
    pub controller: Option<ControllerState>,
    pub strings: HashMap<DeviceProperty, String>,
    pub floats: HashMap<DeviceProperty, f32>,
    pub bools: HashMap<DeviceProperty, bool>,
    pub int32s: HashMap<DeviceProperty, i32>,
    pub uint64s: HashMap<DeviceProperty, u64>,
}

impl MockDevice {
    /// A connected device of `class` tracking at the origin.
    pub fn new(class: DeviceClass) -> Self {
        let mut pose = RawPose {
            pose_valid: true,
            tracking_result: TrackingResult::RunningOk,
            ..Default::default()
        };
        for i in 0..3 {
            pose.device_to_absolute[i][i] = 1.0;
        }
        Self {
            class,
            connected: true,
            pose,
            ..Default::default()
        }
    }

    pub fn with_serial(self, serial: &str) -> Self {
        self.with_string(DeviceProperty::SerialNumber, serial)
    }

    pub fn with_render_model(self, model: &str) -> Self {
        self.with_string(DeviceProperty::RenderModelName, model)
    }

    pub fn with_registered_type(self, device_type: &str) -> Self {
        self.with_string(DeviceProperty::RegisteredDeviceType, device_type)
    }

    pub fn with_string(mut self, prop: DeviceProperty, value: &str) -> Self {
        self.strings.insert(prop, value.to_string());
        self
    }

    pub fn with_float(mut self, prop: DeviceProperty, value: f32) -> Self {
        self.floats.insert(prop, value);
        self
    }

    pub fn with_bool(mut self, prop: DeviceProperty, value: bool) -> Self {
        self.bools.insert(prop, value);
        self
    }

    pub fn with_int32(mut self, prop: DeviceProperty, value: i32) -> Self {
        self.int32s.insert(prop, value);
        self
    }

    pub fn with_uint64(mut self, prop: DeviceProperty, value: u64) -> Self {
        self.uint64s.insert(prop, value);
        self
    }

    pub fn with_role(mut self, role: ControllerRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_controller_state(mut self, state: ControllerState) -> Self {
        self.controller = Some(state);
        self
    }

    /// Place the device at `position` (runtime frame) with the given motion.
    pub fn at(mut self, position: [f32; 3], velocity: [f32; 3], angular_velocity: [f32; 3]) -> Self {
        for (row, p) in position.iter().enumerate() {
            self.pose.device_to_absolute[row][3] = *p;
        }
        self.pose.velocity = velocity;
        self.pose.angular_velocity = angular_velocity;
        self
    }

    pub fn with_pose_valid(mut self, valid: bool) -> Self {
        self.pose.pose_valid = valid;
        self
    }

    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }
}

/// A pose request as seen by the runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseRequest {
    pub origin: TrackingOrigin,
    pub predicted_seconds: f32,
}

#[derive(Debug)]
struct MockState {
    devices: BTreeMap<DeviceIndex, MockDevice>,
    vsync: Option<(f32, u64)>,
    events: VecDeque<RawEvent>,
    string_overrides: HashMap<(DeviceIndex, DeviceProperty), (u32, PropertyError)>,
    string_fill_errors: HashMap<(DeviceIndex, DeviceProperty), PropertyError>,
    pose_requests: Vec<PoseRequest>,
    haptic_pulses: Vec<(DeviceIndex, u32, u16)>,
    screenshot_result: Result<ScreenshotHandle, ScreenshotError>,
    screenshots: Vec<(PathBuf, PathBuf)>,
    running: bool,
    available: bool,
    init_error: Option<InitError>,
    init_calls: Vec<ApplicationType>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            devices: BTreeMap::new(),
            vsync: None,
            events: VecDeque::new(),
            string_overrides: HashMap::new(),
            string_fill_errors: HashMap::new(),
            pose_requests: Vec::new(),
            haptic_pulses: Vec::new(),
            screenshot_result: Ok(1),
            screenshots: Vec::new(),
            running: false,
            available: true,
            init_error: None,
            init_calls: Vec::new(),
        }
    }
}

/// Shared handle to a scripted runtime.
#[derive(Debug, Clone, Default)]
pub struct MockRuntime {
    state: Rc<RefCell<MockState>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&self, index: DeviceIndex, device: MockDevice) {
        self.state.borrow_mut().devices.insert(index, device);
    }

    pub fn remove_device(&self, index: DeviceIndex) {
        self.state.borrow_mut().devices.remove(&index);
    }

    pub fn set_connected(&self, index: DeviceIndex, connected: bool) {
        if let Some(device) = self.state.borrow_mut().devices.get_mut(&index) {
            device.connected = connected;
        }
    }

    pub fn set_vsync(&self, vsync: Option<(f32, u64)>) {
        self.state.borrow_mut().vsync = vsync;
    }

    pub fn push_event(&self, event: RawEvent) {
        self.state.borrow_mut().events.push_back(event);
    }

    /// Force the size-query answer for one string property.
    pub fn script_string_size(
        &self,
        index: DeviceIndex,
        prop: DeviceProperty,
        size: u32,
        error: PropertyError,
    ) {
        self.state
            .borrow_mut()
            .string_overrides
            .insert((index, prop), (size, error));
    }

    /// Force the error of the buffer-filling call for one string property.
    pub fn script_string_fill_error(
        &self,
        index: DeviceIndex,
        prop: DeviceProperty,
        error: PropertyError,
    ) {
        self.state
            .borrow_mut()
            .string_fill_errors
            .insert((index, prop), error);
    }

    pub fn set_screenshot_result(&self, result: Result<ScreenshotHandle, ScreenshotError>) {
        self.state.borrow_mut().screenshot_result = result;
    }

    /// Pretend the runtime was already initialized in this process.
    pub fn set_running(&self, running: bool) {
        self.state.borrow_mut().running = running;
    }

    pub fn set_available(&self, available: bool) {
        self.state.borrow_mut().available = available;
    }

    pub fn fail_init(&self, error: Option<InitError>) {
        self.state.borrow_mut().init_error = error;
    }

    pub fn pose_requests(&self) -> Ref<'_, [PoseRequest]> {
        Ref::map(self.state.borrow(), |s| s.pose_requests.as_slice())
    }

    pub fn haptic_pulses(&self) -> Vec<(DeviceIndex, u32, u16)> {
        self.state.borrow().haptic_pulses.clone()
    }

    pub fn screenshots(&self) -> Vec<(PathBuf, PathBuf)> {
        self.state.borrow().screenshots.clone()
    }

    pub fn init_calls(&self) -> Vec<ApplicationType> {
        self.state.borrow().init_calls.clone()
    }

    fn with_device<T>(&self, index: DeviceIndex, f: impl FnOnce(&MockDevice) -> T) -> Option<T> {
        self.state.borrow().devices.get(&index).map(f)
    }

    fn scalar<T: Copy + Default>(
        &self,
        index: DeviceIndex,
        pick: impl FnOnce(&MockDevice) -> Option<T>,
    ) -> (T, PropertyError) {
        match self.with_device(index, pick) {
            None => (T::default(), PropertyError::InvalidDevice),
            Some(None) => (T::default(), PropertyError::UnknownProperty),
            Some(Some(v)) => (v, PropertyError::Success),
        }
    }
}

impl Runtime for MockRuntime {
    fn time_since_last_vsync(&self) -> Option<(f32, u64)> {
        self.state.borrow().vsync
    }

    fn device_to_absolute_tracking_pose(
        &self,
        origin: TrackingOrigin,
        predicted_seconds: f32,
        poses: &mut [RawPose],
    ) {
        let mut state = self.state.borrow_mut();
        state.pose_requests.push(PoseRequest {
            origin,
            predicted_seconds,
        });
        for (i, slot) in poses.iter_mut().enumerate() {
            *slot = match state.devices.get(&(i as DeviceIndex)) {
                Some(device) => RawPose {
                    connected: device.connected,
                    ..device.pose
                },
                None => RawPose::default(),
            };
        }
    }

    fn string_property(
        &self,
        index: DeviceIndex,
        prop: DeviceProperty,
        buf: Option<&mut [u8]>,
    ) -> (u32, PropertyError) {
        let state = self.state.borrow();
        if buf.is_none() {
            if let Some(scripted) = state.string_overrides.get(&(index, prop)) {
                return *scripted;
            }
        } else if let Some(error) = state.string_fill_errors.get(&(index, prop)) {
            return (0, *error);
        }
        let Some(device) = state.devices.get(&index) else {
            return (0, PropertyError::InvalidDevice);
        };
        let Some(value) = device.strings.get(&prop) else {
            return (0, PropertyError::UnknownProperty);
        };

        let bytes = value.as_bytes();
        let size = bytes.len() as u32 + 1;
        match buf {
            Some(buf) if buf.len() >= bytes.len() + 1 => {
                buf[..bytes.len()].copy_from_slice(bytes);
                buf[bytes.len()] = 0;
                (size, PropertyError::Success)
            }
            _ => (size, PropertyError::BufferTooSmall),
        }
    }

    fn float_property(&self, index: DeviceIndex, prop: DeviceProperty) -> (f32, PropertyError) {
        self.scalar(index, |d| d.floats.get(&prop).copied())
    }

    fn bool_property(&self, index: DeviceIndex, prop: DeviceProperty) -> (bool, PropertyError) {
        self.scalar(index, |d| d.bools.get(&prop).copied())
    }

    fn int32_property(&self, index: DeviceIndex, prop: DeviceProperty) -> (i32, PropertyError) {
        self.scalar(index, |d| d.int32s.get(&prop).copied())
    }

    fn uint64_property(&self, index: DeviceIndex, prop: DeviceProperty) -> (u64, PropertyError) {
        self.scalar(index, |d| d.uint64s.get(&prop).copied())
    }

    fn tracked_device_class(&self, index: DeviceIndex) -> DeviceClass {
        self.with_device(index, |d| d.class).unwrap_or(DeviceClass::Invalid)
    }

    fn is_tracked_device_connected(&self, index: DeviceIndex) -> bool {
        self.with_device(index, |d| d.connected).unwrap_or(false)
    }

    fn device_index_for_controller_role(&self, role: ControllerRole) -> DeviceIndex {
        self.state
            .borrow()
            .devices
            .iter()
            .find(|(_, d)| d.role == Some(role))
            .map(|(i, _)| *i)
            .unwrap_or(INVALID_DEVICE_INDEX)
    }

    fn controller_state(&self, index: DeviceIndex) -> Option<ControllerState> {
        self.with_device(index, |d| d.controller).flatten()
    }

    fn trigger_haptic_pulse(&self, index: DeviceIndex, axis: u32, duration_us: u16) {
        self.state
            .borrow_mut()
            .haptic_pulses
            .push((index, axis, duration_us));
    }

    fn poll_next_event(&mut self) -> Option<RawEvent> {
        self.state.borrow_mut().events.pop_front()
    }

    fn take_stereo_screenshot(
        &self,
        preview_path: &Path,
        vr_path: &Path,
    ) -> Result<ScreenshotHandle, ScreenshotError> {
        let mut state = self.state.borrow_mut();
        state
            .screenshots
            .push((preview_path.to_path_buf(), vr_path.to_path_buf()));
        state.screenshot_result
    }
}

/// Connector handing out clones of one `MockRuntime`.
#[derive(Debug, Clone)]
pub struct MockConnector {
    runtime: MockRuntime,
}

impl MockConnector {
    pub fn new(runtime: MockRuntime) -> Self {
        Self { runtime }
    }
}

impl Connector for MockConnector {
    type Runtime = MockRuntime;

    fn existing(&mut self) -> Option<MockRuntime> {
        if self.runtime.state.borrow().running {
            Some(self.runtime.clone())
        } else {
            None
        }
    }

    fn init(&mut self, app_type: ApplicationType) -> Result<MockRuntime, InitError> {
        let mut state = self.runtime.state.borrow_mut();
        state.init_calls.push(app_type);
        if let Some(error) = state.init_error {
            return Err(error);
        }
        state.running = true;
        Ok(self.runtime.clone())
    }

    fn is_available(&self) -> bool {
        self.runtime.state.borrow().available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_property_two_calls() {
        let rt = MockRuntime::new();
        rt.add_device(3, MockDevice::new(DeviceClass::GenericTracker).with_serial("LHR-1"));

        let (size, err) = rt.string_property(3, DeviceProperty::SerialNumber, None);
        assert_eq!((size, err), (6, PropertyError::BufferTooSmall));

        let mut buf = vec![0u8; size as usize];
        let (_, err) = rt.string_property(3, DeviceProperty::SerialNumber, Some(&mut buf));
        assert_eq!(err, PropertyError::Success);
        assert_eq!(&buf, b"LHR-1\0");
    }

    #[test]
    fn test_pose_fill_reflects_connection() {
        let rt = MockRuntime::new();
        rt.add_device(1, MockDevice::new(DeviceClass::Controller).disconnected());

        let mut poses = vec![RawPose::default(); 4];
        rt.device_to_absolute_tracking_pose(TrackingOrigin::Seated, 0.01, &mut poses);
        assert!(!poses[1].connected);
        assert!(poses[1].pose_valid);
        assert_eq!(
            rt.pose_requests()[0],
            PoseRequest {
                origin: TrackingOrigin::Seated,
                predicted_seconds: 0.01
            }
        );
    }
}
