use nalgebra::{UnitQuaternion, Vector3};
use ovr_tracking::mock::{MockConnector, MockDevice, MockRuntime};
use ovr_tracking::transform::{apply_local, apply_world_with_offset};
use ovr_tracking::{
    event_type, DeviceClass, EnumerationStrategy, RawEvent, SceneNode, ScreenshotError, Tracker,
    TrackerConfig, TrackingError, TrackingEvent, INVALID_DEVICE_INDEX,
};

fn rig() -> MockRuntime {
    let rt = MockRuntime::new();
    rt.add_device(
        0,
        MockDevice::new(DeviceClass::Hmd)
            .with_serial("LHR-HMD")
            .with_render_model("generic_hmd")
            .at([0.0, 1.7, 0.0], [0.0; 3], [0.0; 3]),
    );
    rt.add_device(
        3,
        MockDevice::new(DeviceClass::Controller)
            .with_serial("LHR-CTRL")
            .with_render_model("vr_controller_vive_1_5")
            .with_registered_type("htc/vive_controllerLHR-CTRL"),
    );
    rt.add_device(
        4,
        MockDevice::new(DeviceClass::TrackingReference)
            .with_serial("LHB-1")
            .with_render_model("lh_basestation_vive"),
    );
    rt.add_device(
        7,
        MockDevice::new(DeviceClass::GenericTracker)
            .with_serial("LHR-TRK")
            .with_registered_type("htc/vive_trackerLHR-TRK")
            .at([0.2, 1.0, -0.5], [0.0, 0.0, 1.0], [0.0; 3]),
    );
    rt.set_running(true);
    rt
}

fn tracker_with(rt: &MockRuntime, enumeration: EnumerationStrategy) -> Tracker<MockConnector> {
    let config = TrackerConfig {
        enumeration,
        ..Default::default()
    };
    Tracker::with_config(MockConnector::new(rt.clone()), config)
}

struct Node {
    position: Vector3<f32>,
    rotation: UnitQuaternion<f32>,
    local_position: Vector3<f32>,
    local_rotation: UnitQuaternion<f32>,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            local_position: Vector3::zeros(),
            local_rotation: UnitQuaternion::identity(),
        }
    }
}

impl SceneNode for Node {
    fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
    }
    fn set_rotation(&mut self, rotation: UnitQuaternion<f32>) {
        self.rotation = rotation;
    }
    fn set_local_position(&mut self, position: Vector3<f32>) {
        self.local_position = position;
    }
    fn set_local_rotation(&mut self, rotation: UnitQuaternion<f32>) {
        self.local_rotation = rotation;
    }
}

#[test]
fn enumeration_filters() {
    for strategy in [
        EnumerationStrategy::FullScan,
        EnumerationStrategy::StopAtConnectedCount,
    ] {
        let rt = rig();
        let tracker = tracker_with(&rt, strategy);

        assert_eq!(tracker.connected_device_count(), 4);
        assert_eq!(tracker.connected_devices(), vec![0, 3, 4, 7]);
        assert_eq!(tracker.device_index_by_serial("LHR-TRK"), 7);
        assert_eq!(tracker.device_index_by_serial("LHR"), INVALID_DEVICE_INDEX);
        assert_eq!(tracker.vive_trackers(), vec![7]);
        assert_eq!(tracker.vive_controllers(), vec![3]);
        assert_eq!(tracker.base_stations(), vec![4]);
        assert_eq!(tracker.device_indices_by_render_model("vive"), vec![3, 4]);
    }
}

#[test]
fn disconnected_devices_are_skipped() {
    let rt = rig();
    rt.set_connected(7, false);
    let tracker = tracker_with(&rt, EnumerationStrategy::FullScan);

    assert!(tracker.vive_trackers().is_empty());
    assert_eq!(tracker.device_index_by_serial("LHR-TRK"), INVALID_DEVICE_INDEX);

    let list = tracker.device_info_list();
    assert_eq!(list.lines().count(), 3);
    assert!(list.starts_with("Device ID:0 Serial:LHR-HMD Model:generic_hmd "));

    let partial = tracker.device_info_list_for(&[3, 7]);
    assert_eq!(partial.lines().count(), 1);
}

#[test]
fn transform_by_serial_converts_frame() {
    let rt = rig();
    let mut tracker = tracker_with(&rt, EnumerationStrategy::FullScan);
    tracker.refresh(1);

    let t = tracker.transform_by_serial("LHR-TRK").unwrap();
    assert_eq!(t.device, 7);
    assert_eq!(t.position, Vector3::new(0.2, 1.0, 0.5));
    assert_eq!(t.velocity, Vector3::new(0.0, 0.0, -1.0));
    assert!(tracker.transform_by_serial("missing").is_none());

    let (position, _rotation) = tracker.pose(0).unwrap();
    assert_eq!(position, Vector3::new(0.0, 1.7, 0.0));
    let (velocity, angular) = tracker.velocity(7).unwrap();
    assert_eq!(velocity.z, -1.0);
    assert_eq!(angular, Vector3::zeros());
}

#[test]
fn scene_nodes_follow_devices() {
    let rt = rig();
    let mut tracker = tracker_with(&rt, EnumerationStrategy::FullScan);
    tracker.refresh(1);

    let hmd = tracker.hmd_transform();
    let trk = tracker.transform(7);
    let mut node = Node::default();

    apply_world_with_offset(&mut node, trk.as_ref(), hmd.as_ref());
    assert!((node.position - Vector3::new(0.2, -0.7, 0.5)).norm() < 1e-6);
    assert!(node.rotation.angle() < 1e-6);

    apply_local(&mut node, hmd.as_ref());
    assert_eq!(node.local_position, Vector3::new(0.0, 1.7, 0.0));
    assert!(node.local_rotation.angle() < 1e-6);

    // Invalid devices leave the node untouched.
    apply_local(&mut node, tracker.transform(12).as_ref());
    assert_eq!(node.local_position, Vector3::new(0.0, 1.7, 0.0));
}

#[test]
fn tracker_positions_group_by_class_and_cache_serials() {
    let rt = rig();
    let mut tracker = tracker_with(&rt, EnumerationStrategy::FullScan);

    let positions = tracker.tracker_positions();
    assert_eq!(positions.len(), 4);
    assert_eq!(positions[&DeviceClass::Hmd].len(), 1);
    assert_eq!(positions[&DeviceClass::Controller][0].serial.as_deref(), Some("LHR-CTRL"));
    let tracked = &positions[&DeviceClass::GenericTracker][0];
    assert_eq!(tracked.device, 7);
    assert_eq!(tracked.transform.position, Vector3::new(0.2, 1.0, 0.5));

    let request = rt.pose_requests()[0];
    assert_eq!(request.predicted_seconds, 0.0);

    // Serial stays cached for the slot until the handle is closed.
    rt.add_device(3, MockDevice::new(DeviceClass::Controller).with_serial("SWAPPED"));
    let positions = tracker.tracker_positions();
    assert_eq!(positions[&DeviceClass::Controller][0].serial.as_deref(), Some("LHR-CTRL"));
}

#[test]
fn events_are_polled_in_order() {
    let rt = rig();
    let mut tracker = tracker_with(&rt, EnumerationStrategy::FullScan);

    let activated = RawEvent {
        event_type: event_type::TRACKED_DEVICE_ACTIVATED,
        device: 7,
        age_seconds: 0.0,
    };
    let quit = RawEvent {
        event_type: event_type::QUIT,
        device: INVALID_DEVICE_INDEX,
        age_seconds: 0.0,
    };
    rt.push_event(activated);
    rt.push_event(quit);

    assert_eq!(
        tracker.poll_events(),
        vec![
            TrackingEvent::Raw(activated),
            TrackingEvent::Disconnected,
            TrackingEvent::Raw(quit),
        ]
    );
    assert!(tracker.poll_events().is_empty());

    rt.push_event(quit);
    assert!(tracker.poll_quit());
    assert!(!tracker.poll_quit());
}

#[test]
fn screenshots_report_runtime_errors() {
    let rt = rig();
    let tracker = tracker_with(&rt, EnumerationStrategy::FullScan);

    assert_eq!(tracker.take_screenshot("preview.png", "vr.png").unwrap(), 1);
    assert_eq!(rt.screenshots().len(), 1);

    rt.set_screenshot_result(Err(ScreenshotError(108)));
    assert!(matches!(
        tracker.take_screenshot("preview.png", "vr.png"),
        Err(TrackingError::Screenshot(ScreenshotError(108)))
    ));
}
