use crate::config::{EnumerationStrategy, TrackerConfig};
use crate::prediction;
use crate::runtime::{Connector, Runtime};
use crate::transform::{DeviceTransform, RigidTransform};
use crate::types::{
    ApplicationType, Buttons, ControllerRole, ControllerState, DeviceClass, DeviceIndex,
    DeviceProperty, PropertyError, RawPose, ScreenshotHandle, TrackingEvent, TrackingOrigin,
    TrackingResult, HMD_DEVICE_INDEX, INVALID_DEVICE_INDEX, MAX_TRACKED_DEVICE_COUNT,
};
use crate::{Result, TrackingError};
use nalgebra::{UnitQuaternion, Vector3};
use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::path::Path;

/// Registered device type of Vive trackers.
pub const VIVE_TRACKER_TYPE: &str = "htc/vive_tracker";
/// Registered device type of Vive wand controllers.
pub const VIVE_CONTROLLER_TYPE: &str = "htc/vive_controller";
/// Render model of first-generation base stations.
pub const BASE_STATION_MODEL: &str = "lh_basestation_vive";

/// A device found by [`Tracker::tracker_positions`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedPosition {
    pub device: DeviceIndex,
    pub transform: RigidTransform,
    pub serial: Option<String>,
}

/// Device-tracking façade over one runtime handle.
///
/// The caller drives the frame cadence with [`set_frame`](Self::set_frame) or
/// [`refresh`](Self::refresh); with auto-update enabled every pose accessor
/// rebuilds the snapshot at most once per frame value.
pub struct Tracker<C: Connector> {
    connector: C,
    runtime: Option<C::Runtime>,
    config: TrackerConfig,
    poses: Option<Vec<RawPose>>,
    predicted_seconds: f32,
    frame: u64,
    last_refreshed_frame: Option<u64>,
    serials: Vec<Option<String>>,
    pending: VecDeque<TrackingEvent>,
}

impl<C: Connector> Tracker<C> {
    /// Create a tracker with the default config and adopt a runtime that is
    /// already running, if any.
    pub fn new(connector: C) -> Self {
        Self::with_config(connector, TrackerConfig::default())
    }

    pub fn with_config(connector: C, config: TrackerConfig) -> Self {
        let mut tracker = Tracker {
            connector,
            runtime: None,
            config,
            poses: None,
            predicted_seconds: 0.0,
            frame: 0,
            last_refreshed_frame: None,
            serials: vec![None; MAX_TRACKED_DEVICE_COUNT],
            pending: VecDeque::new(),
        };
        tracker.acquire();
        tracker
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    // -- Lifecycle --

    /// Adopt a runtime already initialized in this process. Keeps the current
    /// handle if there is one.
    pub fn acquire(&mut self) -> bool {
        if self.runtime.is_none() {
            if let Some(runtime) = self.connector.existing() {
                log::info!("Attached to running tracking runtime");
                self.attach(runtime);
            }
        }
        self.is_ready()
    }

    /// Make sure a runtime is available, initializing one as `app_type` only
    /// when none is running yet.
    pub fn start(&mut self, app_type: ApplicationType) -> bool {
        self.try_start(app_type).is_ok()
    }

    /// [`start`](Self::start) reporting why no runtime could be obtained.
    pub fn try_start(&mut self, app_type: ApplicationType) -> Result<()> {
        if self.acquire() {
            return Ok(());
        }
        if !self.can_use() {
            log::warn!("No tracking runtime available on this machine");
            return Err(TrackingError::RuntimeUnavailable);
        }

        match self.connector.init(app_type) {
            Ok(runtime) => {
                log::info!("Initialized tracking runtime as {:?}", app_type);
                self.attach(runtime);
                Ok(())
            }
            Err(e) => {
                log::warn!("Tracking runtime init as {:?} failed: {}", app_type, e);
                Err(TrackingError::Init(e))
            }
        }
    }

    /// Initialize the runtime as `app_type`. On success a
    /// [`TrackingEvent::Connected`] is delivered by the next
    /// [`poll_events`](Self::poll_events).
    pub fn setup(&mut self, app_type: ApplicationType) -> Result<()> {
        match self.connector.init(app_type) {
            Ok(runtime) => {
                log::info!("Initialized tracking runtime as {:?}", app_type);
                self.attach(runtime);
                self.pending.push_back(TrackingEvent::Connected);
                Ok(())
            }
            Err(e) => {
                log::warn!("Tracking runtime setup as {:?} failed: {}", app_type, e);
                self.close();
                Err(TrackingError::Init(e))
            }
        }
    }

    /// [`setup`](Self::setup) with the configured application type.
    pub fn setup_default(&mut self) -> Result<()> {
        self.setup(self.config.app_type)
    }

    pub fn is_ready(&self) -> bool {
        self.runtime.is_some()
    }

    /// Whether a runtime could be used on this machine, regardless of this
    /// tracker's state.
    pub fn can_use(&self) -> bool {
        self.connector.is_available()
    }

    /// Release the handle and the snapshot. The runtime itself is left running
    /// for other consumers.
    pub fn close(&mut self) {
        if self.runtime.take().is_some() {
            log::info!("Released tracking runtime handle");
        }
        self.poses = None;
        self.last_refreshed_frame = None;
        self.serials.iter_mut().for_each(|s| *s = None);
    }

    // Placeholder poses from the not-ready state must not outlive the attach.
    fn attach(&mut self, runtime: C::Runtime) {
        self.runtime = Some(runtime);
        self.poses = None;
        self.last_refreshed_frame = None;
    }

    fn system(&self) -> Option<&C::Runtime> {
        self.runtime.as_ref()
    }

    // -- Snapshot --

    pub fn set_auto_update(&mut self, auto_update: bool) {
        self.config.auto_update = auto_update;
    }

    pub fn set_origin(&mut self, origin: TrackingOrigin) {
        self.config.origin = origin;
    }

    /// Record the caller's current frame counter.
    pub fn set_frame(&mut self, frame: u64) {
        self.frame = frame;
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Move to `frame` and rebuild the snapshot if the refresh policy asks for
    /// it. Returns whether poses were requested from the runtime.
    pub fn refresh(&mut self, frame: u64) -> bool {
        self.set_frame(frame);
        self.ensure_fresh()
    }

    fn ensure_fresh(&mut self) -> bool {
        if !self.is_ready() {
            // Without a runtime the snapshot is all-default; build it once.
            if self.poses.is_none() {
                self.update();
            }
            return false;
        }
        let mut rebuilt = false;
        if self.config.auto_update && self.last_refreshed_frame != Some(self.frame) {
            self.update_predicted_time();
            self.update();
            rebuilt = true;
        }
        if self.poses.is_none() {
            self.update();
            rebuilt = true;
        }
        rebuilt
    }

    /// Rebuild the snapshot for the configured origin.
    pub fn update(&mut self) {
        self.update_with_origin(self.config.origin);
    }

    /// Rebuild the snapshot for `origin` using the stored prediction.
    pub fn update_with_origin(&mut self, origin: TrackingOrigin) {
        let mut poses = vec![RawPose::default(); MAX_TRACKED_DEVICE_COUNT];
        if let Some(runtime) = self.runtime.as_ref() {
            runtime.device_to_absolute_tracking_pose(origin, self.predicted_seconds, &mut poses);
            self.last_refreshed_frame = Some(self.frame);
            log::trace!(
                "Pose snapshot for frame {} ({:?}, +{:.4}s)",
                self.frame,
                origin,
                self.predicted_seconds
            );
        }
        self.poses = Some(poses);
    }

    /// Connected and carrying a valid pose in the current snapshot.
    pub fn is_device_valid(&mut self, index: DeviceIndex) -> bool {
        self.ensure_fresh();
        if index == INVALID_DEVICE_INDEX {
            return false;
        }
        self.poses
            .as_ref()
            .and_then(|poses| poses.get(index as usize))
            .is_some_and(RawPose::is_valid)
    }

    pub fn all_device_poses(&mut self) -> &[RawPose] {
        self.ensure_fresh();
        self.poses.as_deref().unwrap_or(&[])
    }

    /// The raw snapshot entry, or a default pose for invalid devices.
    pub fn device_pose(&mut self, index: DeviceIndex) -> RawPose {
        if !self.is_device_valid(index) {
            return RawPose::default();
        }
        self.snapshot_entry(index).unwrap_or_default()
    }

    pub fn device_tracking_result(&mut self, index: DeviceIndex) -> TrackingResult {
        if !self.is_device_valid(index) {
            return TrackingResult::Uninitialized;
        }
        self.snapshot_entry(index)
            .map(|p| p.tracking_result)
            .unwrap_or_default()
    }

    fn snapshot_entry(&self, index: DeviceIndex) -> Option<RawPose> {
        self.poses.as_ref()?.get(index as usize).copied()
    }

    // -- Prediction --

    /// Seconds to predict ahead for the current frame, 0 when unknown.
    pub fn predicted_time(&self) -> f32 {
        let Some(runtime) = self.system() else {
            return 0.0;
        };
        let Some((since_vsync, _frame)) = runtime.time_since_last_vsync() else {
            return 0.0;
        };
        if since_vsync > prediction::MAX_SECONDS_SINCE_VSYNC {
            return 0.0;
        }
        let hmd = self.hmd_index();
        let Some(display_hz) = self.property_float(hmd, DeviceProperty::DisplayFrequency) else {
            return 0.0;
        };
        let Some(vsync_to_photons) =
            self.property_float(hmd, DeviceProperty::SecondsFromVsyncToPhotons)
        else {
            return 0.0;
        };
        prediction::seconds_to_photons(display_hz, since_vsync, vsync_to_photons)
    }

    pub fn update_predicted_time(&mut self) {
        self.predicted_seconds = self.predicted_time();
        log::debug!("Predicting {:.4}s ahead", self.predicted_seconds);
    }

    pub fn clear_predicted_time(&mut self) {
        self.predicted_seconds = 0.0;
    }

    /// The prediction used by the next snapshot rebuild.
    pub fn current_prediction(&self) -> f32 {
        self.predicted_seconds
    }

    // -- Transforms --

    pub fn hmd_index(&self) -> DeviceIndex {
        if !self.is_ready() {
            return INVALID_DEVICE_INDEX;
        }
        HMD_DEVICE_INDEX
    }

    pub fn left_controller_index(&self) -> DeviceIndex {
        self.controller_index(ControllerRole::LeftHand)
    }

    pub fn right_controller_index(&self) -> DeviceIndex {
        self.controller_index(ControllerRole::RightHand)
    }

    fn controller_index(&self, role: ControllerRole) -> DeviceIndex {
        match self.system() {
            Some(runtime) => runtime.device_index_for_controller_role(role),
            None => INVALID_DEVICE_INDEX,
        }
    }

    /// Engine-space transform of a valid device, `None` otherwise.
    pub fn transform(&mut self, index: DeviceIndex) -> Option<DeviceTransform> {
        if !self.is_device_valid(index) {
            return None;
        }
        let pose = self.snapshot_entry(index)?;
        Some(DeviceTransform::from_raw_pose(index, &pose))
    }

    /// [`transform`](Self::transform) reporting why no transform exists.
    pub fn try_transform(&mut self, index: DeviceIndex) -> Result<DeviceTransform> {
        if !self.is_ready() {
            return Err(TrackingError::NotReady);
        }
        self.transform(index)
            .ok_or(TrackingError::InvalidDevice(index))
    }

    pub fn hmd_transform(&mut self) -> Option<DeviceTransform> {
        let index = self.hmd_index();
        self.transform(index)
    }

    pub fn left_controller_transform(&mut self) -> Option<DeviceTransform> {
        let index = self.left_controller_index();
        self.transform(index)
    }

    pub fn right_controller_transform(&mut self) -> Option<DeviceTransform> {
        let index = self.right_controller_index();
        self.transform(index)
    }

    pub fn transform_by_serial(&mut self, serial: &str) -> Option<DeviceTransform> {
        let index = self.device_index_by_serial(serial);
        self.transform(index)
    }

    pub fn pose(&mut self, index: DeviceIndex) -> Option<(Vector3<f32>, UnitQuaternion<f32>)> {
        self.transform(index).map(|t| (t.position, t.rotation))
    }

    /// Linear and angular velocity of a valid device.
    pub fn velocity(&mut self, index: DeviceIndex) -> Option<(Vector3<f32>, Vector3<f32>)> {
        self.transform(index).map(|t| (t.velocity, t.angular_velocity))
    }

    // -- Properties --

    /// Read a string property with the runtime's size-then-fill protocol.
    pub fn property_string(&self, index: DeviceIndex, prop: DeviceProperty) -> Option<String> {
        let runtime = self.system()?;

        let (size, error) = runtime.string_property(index, prop, None);
        if size == 0 || error != PropertyError::BufferTooSmall {
            return None;
        }

        let mut buf = vec![0u8; size as usize];
        let (_, error) = runtime.string_property(index, prop, Some(&mut buf));
        if error != PropertyError::Success {
            return None;
        }
        Some(extract_string(&buf))
    }

    pub fn property_float(&self, index: DeviceIndex, prop: DeviceProperty) -> Option<f32> {
        success(self.system()?.float_property(index, prop))
    }

    pub fn property_bool(&self, index: DeviceIndex, prop: DeviceProperty) -> Option<bool> {
        success(self.system()?.bool_property(index, prop))
    }

    pub fn property_int32(&self, index: DeviceIndex, prop: DeviceProperty) -> Option<i32> {
        success(self.system()?.int32_property(index, prop))
    }

    pub fn property_uint64(&self, index: DeviceIndex, prop: DeviceProperty) -> Option<u64> {
        success(self.system()?.uint64_property(index, prop))
    }

    pub fn is_device_connected(&self, index: DeviceIndex) -> bool {
        self.system()
            .is_some_and(|runtime| runtime.is_tracked_device_connected(index))
    }

    pub fn tracked_device_class(&self, index: DeviceIndex) -> DeviceClass {
        self.system()
            .map(|runtime| runtime.tracked_device_class(index))
            .unwrap_or(DeviceClass::Invalid)
    }

    /// String property of a connected device; disconnected devices are not
    /// queried.
    pub fn property_string_when_connected(
        &self,
        index: DeviceIndex,
        prop: DeviceProperty,
    ) -> Option<String> {
        if !self.is_device_connected(index) {
            return None;
        }
        self.property_string(index, prop)
    }

    /// Float property of a connected device, NaN when unavailable.
    pub fn property_float_when_connected(&self, index: DeviceIndex, prop: DeviceProperty) -> f32 {
        if !self.is_device_connected(index) {
            return f32::NAN;
        }
        self.property_float(index, prop).unwrap_or(f32::NAN)
    }

    pub fn serial_number(&self, index: DeviceIndex) -> Option<String> {
        self.property_string_when_connected(index, DeviceProperty::SerialNumber)
    }

    pub fn render_model_name(&self, index: DeviceIndex) -> Option<String> {
        self.property_string_when_connected(index, DeviceProperty::RenderModelName)
    }

    pub fn registered_device_type(&self, index: DeviceIndex) -> Option<String> {
        self.property_string_when_connected(index, DeviceProperty::RegisteredDeviceType)
    }

    /// Battery level in percent, NaN when unavailable.
    pub fn battery_percentage(&self, index: DeviceIndex) -> f32 {
        self.property_float_when_connected(index, DeviceProperty::DeviceBatteryPercentage) * 100.0
    }

    pub fn is_charging(&self, index: DeviceIndex) -> Option<bool> {
        self.property_bool(index, DeviceProperty::DeviceIsCharging)
    }

    /// One-line summary of a device for logs.
    pub fn device_debug_info(&self, index: DeviceIndex) -> String {
        let mut s = format!("Device ID:{} ", index);
        if !self.is_device_connected(index) {
            s.push_str("is not connected.");
            return s;
        }

        if let Some(serial) = self.serial_number(index) {
            let _ = write!(s, "Serial:{} ", serial);
        }
        if let Some(model) = self.render_model_name(index) {
            let _ = write!(s, "Model:{} ", model);
        }
        if let Some(device_type) = self.registered_device_type(index) {
            let _ = write!(s, "DeviceType:{} ", device_type);
        }
        let battery = self.battery_percentage(index);
        if !battery.is_nan() {
            let _ = write!(s, "DeviceBattery:{}% ", battery);
        }
        if let Some(charging) = self.is_charging(index) {
            let _ = write!(s, "Charging:{} ", charging);
        }
        s
    }

    // -- Enumeration --

    pub fn connected_device_count(&self) -> usize {
        (0..MAX_TRACKED_DEVICE_COUNT as DeviceIndex)
            .filter(|&i| self.is_device_connected(i))
            .count()
    }

    /// Indices of connected devices in slot order.
    pub fn connected_devices(&self) -> Vec<DeviceIndex> {
        if !self.is_ready() {
            return Vec::new();
        }
        let limit = match self.config.enumeration {
            EnumerationStrategy::FullScan => usize::MAX,
            EnumerationStrategy::StopAtConnectedCount => self.connected_device_count(),
        };

        let mut found = Vec::new();
        for i in 0..MAX_TRACKED_DEVICE_COUNT as DeviceIndex {
            if found.len() >= limit {
                break;
            }
            if self.is_device_connected(i) {
                found.push(i);
            }
        }
        found
    }

    /// Debug info for every connected device, one per line.
    pub fn device_info_list(&self) -> String {
        self.device_info_list_for(&self.connected_devices())
    }

    /// Debug info for the connected devices among `devices`, one per line.
    pub fn device_info_list_for(&self, devices: &[DeviceIndex]) -> String {
        devices
            .iter()
            .filter(|&&i| self.is_device_connected(i))
            .map(|&i| self.device_debug_info(i) + "\n")
            .collect()
    }

    /// First connected device whose serial number equals `serial`.
    pub fn device_index_by_serial(&self, serial: &str) -> DeviceIndex {
        self.connected_devices()
            .into_iter()
            .find(|&i| self.serial_number(i).as_deref() == Some(serial))
            .unwrap_or(INVALID_DEVICE_INDEX)
    }

    /// Connected devices whose render model name contains `name`.
    pub fn device_indices_by_render_model(&self, name: &str) -> Vec<DeviceIndex> {
        self.filter_by(name, Self::render_model_name)
    }

    /// Connected devices whose registered device type contains `name`.
    pub fn device_indices_by_registered_type(&self, name: &str) -> Vec<DeviceIndex> {
        self.filter_by(name, Self::registered_device_type)
    }

    fn filter_by(
        &self,
        needle: &str,
        property: fn(&Self, DeviceIndex) -> Option<String>,
    ) -> Vec<DeviceIndex> {
        self.connected_devices()
            .into_iter()
            .filter(|&i| property(self, i).is_some_and(|value| value.contains(needle)))
            .collect()
    }

    pub fn vive_trackers(&self) -> Vec<DeviceIndex> {
        self.device_indices_by_registered_type(VIVE_TRACKER_TYPE)
    }

    pub fn vive_controllers(&self) -> Vec<DeviceIndex> {
        self.device_indices_by_registered_type(VIVE_CONTROLLER_TYPE)
    }

    pub fn base_stations(&self) -> Vec<DeviceIndex> {
        self.device_indices_by_render_model(BASE_STATION_MODEL)
    }

    /// Current standing-space positions of every connected HMD, controller,
    /// tracker and base station, grouped by class. Serial numbers are cached
    /// per slot until the handle is closed.
    pub fn tracker_positions(&mut self) -> HashMap<DeviceClass, Vec<TrackedPosition>> {
        let mut positions: HashMap<DeviceClass, Vec<TrackedPosition>> = [
            DeviceClass::Hmd,
            DeviceClass::Controller,
            DeviceClass::GenericTracker,
            DeviceClass::TrackingReference,
        ]
        .into_iter()
        .map(|class| (class, Vec::new()))
        .collect();

        let Some(runtime) = self.runtime.as_ref() else {
            return positions;
        };

        let mut poses = vec![RawPose::default(); MAX_TRACKED_DEVICE_COUNT];
        runtime.device_to_absolute_tracking_pose(TrackingOrigin::Standing, 0.0, &mut poses);

        for (i, pose) in poses.iter().enumerate() {
            if !pose.connected {
                continue;
            }
            let index = i as DeviceIndex;
            let Some(list) = positions.get_mut(&runtime.tracked_device_class(index)) else {
                continue;
            };
            if self.serials[i].is_none() {
                self.serials[i] = read_string(runtime, index, DeviceProperty::SerialNumber);
            }
            list.push(TrackedPosition {
                device: index,
                transform: RigidTransform::from_hmd_matrix(&pose.device_to_absolute),
                serial: self.serials[i].clone(),
            });
        }
        positions
    }

    // -- Input --

    pub fn controller_state(&mut self, index: DeviceIndex) -> Option<ControllerState> {
        if !self.is_device_valid(index) {
            return None;
        }
        self.system()?.controller_state(index)
    }

    pub fn controller_buttons_pressed(&mut self, index: DeviceIndex) -> Option<Buttons> {
        self.controller_state(index).map(|s| s.pressed)
    }

    /// Fire a haptic pulse on a valid device. `axis` selects the actuator.
    pub fn trigger_haptic_pulse(&mut self, index: DeviceIndex, axis: u32, duration_us: u16) -> bool {
        if !self.is_device_valid(index) {
            return false;
        }
        match self.system() {
            Some(runtime) => {
                runtime.trigger_haptic_pulse(index, axis, duration_us);
                true
            }
            None => false,
        }
    }

    // -- Events --

    /// Drain lifecycle events and every pending runtime event.
    ///
    /// A quit request yields [`TrackingEvent::Disconnected`] followed by its
    /// raw record.
    pub fn poll_events(&mut self) -> Vec<TrackingEvent> {
        let mut events: Vec<TrackingEvent> = self.pending.drain(..).collect();
        if let Some(runtime) = self.runtime.as_mut() {
            while let Some(event) = runtime.poll_next_event() {
                log::trace!(
                    "Runtime event {} for device {}",
                    event.event_type,
                    event.device
                );
                if event.is_quit() {
                    log::info!("Tracking runtime requested quit");
                    events.push(TrackingEvent::Disconnected);
                }
                events.push(TrackingEvent::Raw(event));
            }
        }
        events
    }

    /// Consume runtime events up to and including the first quit request.
    ///
    /// Events after the quit stay queued in the runtime, and lifecycle events
    /// are left for [`poll_events`](Self::poll_events).
    pub fn poll_quit(&mut self) -> bool {
        let Some(runtime) = self.runtime.as_mut() else {
            return false;
        };
        while let Some(event) = runtime.poll_next_event() {
            if event.is_quit() {
                log::info!("Tracking runtime requested quit");
                return true;
            }
            log::trace!(
                "Skipping runtime event {} for device {}",
                event.event_type,
                event.device
            );
        }
        false
    }

    // -- Screenshots --

    pub fn take_screenshot(
        &self,
        preview_path: impl AsRef<Path>,
        vr_path: impl AsRef<Path>,
    ) -> Result<ScreenshotHandle> {
        let runtime = self.system().ok_or(TrackingError::NotReady)?;
        runtime
            .take_stereo_screenshot(preview_path.as_ref(), vr_path.as_ref())
            .map_err(TrackingError::Screenshot)
    }
}

impl<C: Connector> Drop for Tracker<C> {
    fn drop(&mut self) {
        self.close();
    }
}

fn success<T>((value, error): (T, PropertyError)) -> Option<T> {
    (error == PropertyError::Success).then_some(value)
}

// Serial lookup for the position scan: any non-empty size is read.
fn read_string<R: Runtime>(runtime: &R, index: DeviceIndex, prop: DeviceProperty) -> Option<String> {
    let (size, _) = runtime.string_property(index, prop, None);
    if size == 0 {
        return None;
    }
    let mut buf = vec![0u8; size as usize];
    let (_, error) = runtime.string_property(index, prop, Some(&mut buf));
    if error != PropertyError::Success {
        return None;
    }
    Some(extract_string(&buf))
}

/// Extract a null-terminated string from a byte slice.
fn extract_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).to_string()
}
