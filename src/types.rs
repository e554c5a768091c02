use std::fmt;

/// Index of a tracked device slot in the runtime.
pub type DeviceIndex = u32;

/// Sentinel meaning "no device".
pub const INVALID_DEVICE_INDEX: DeviceIndex = u32::MAX;

/// The head-mounted display always occupies slot 0.
pub const HMD_DEVICE_INDEX: DeviceIndex = 0;

/// Number of device slots reported by every pose request.
pub const MAX_TRACKED_DEVICE_COUNT: usize = 64;

/// Handle returned by the runtime for a captured screenshot.
pub type ScreenshotHandle = u32;

/// Reference frame the runtime reports poses in.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingOrigin {
    Seated = 0,
    #[default]
    Standing = 1,
    RawAndUncalibrated = 2,
}

/// How this process registers itself with the runtime.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplicationType {
    Other = 0,
    #[default]
    Scene = 1,
    Overlay = 2,
    Background = 3,
    Utility = 4,
}

/// Per-device tracking quality.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingResult {
    #[default]
    Uninitialized = 1,
    CalibratingInProgress = 100,
    CalibratingOutOfRange = 101,
    RunningOk = 200,
    RunningOutOfRange = 201,
    FallbackRotationOnly = 300,
}

impl TrackingResult {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            100 => Self::CalibratingInProgress,
            101 => Self::CalibratingOutOfRange,
            200 => Self::RunningOk,
            201 => Self::RunningOutOfRange,
            300 => Self::FallbackRotationOnly,
            _ => Self::Uninitialized,
        }
    }
}

/// Category of tracked hardware.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceClass {
    #[default]
    Invalid = 0,
    Hmd = 1,
    Controller = 2,
    GenericTracker = 3,
    TrackingReference = 4,
    DisplayRedirect = 5,
}

impl DeviceClass {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Hmd,
            2 => Self::Controller,
            3 => Self::GenericTracker,
            4 => Self::TrackingReference,
            5 => Self::DisplayRedirect,
            _ => Self::Invalid,
        }
    }
}

/// Role a controller has been assigned by the user.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerRole {
    Invalid = 0,
    LeftHand = 1,
    RightHand = 2,
    OptOut = 3,
    Treadmill = 4,
    Stylus = 5,
}

/// Device properties queried by the tracker. Discriminants are the runtime's
/// property identifiers.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceProperty {
    TrackingSystemName = 1000,
    ModelNumber = 1001,
    SerialNumber = 1002,
    RenderModelName = 1003,
    ManufacturerName = 1005,
    TrackingFirmwareVersion = 1006,
    HardwareRevision = 1007,
    DeviceIsWireless = 1010,
    DeviceIsCharging = 1011,
    DeviceBatteryPercentage = 1012,
    FirmwareVersion = 1018,
    DeviceClass = 1029,
    RegisteredDeviceType = 1036,
    SecondsFromVsyncToPhotons = 2001,
    DisplayFrequency = 2002,
}

/// Error code reported alongside every property read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyError {
    Success,
    WrongDataType,
    WrongDeviceClass,
    BufferTooSmall,
    UnknownProperty,
    InvalidDevice,
    CouldNotContactServer,
    ValueNotProvidedByDevice,
    StringExceedsMaximumLength,
    NotYetAvailable,
    PermissionDenied,
    InvalidOperation,
    Other(u32),
}

impl PropertyError {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Success,
            1 => Self::WrongDataType,
            2 => Self::WrongDeviceClass,
            3 => Self::BufferTooSmall,
            4 => Self::UnknownProperty,
            5 => Self::InvalidDevice,
            6 => Self::CouldNotContactServer,
            7 => Self::ValueNotProvidedByDevice,
            8 => Self::StringExceedsMaximumLength,
            9 => Self::NotYetAvailable,
            10 => Self::PermissionDenied,
            11 => Self::InvalidOperation,
            other => Self::Other(other),
        }
    }
}

/// Runtime initialization error code. Zero is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitError(pub u32);

impl InitError {
    pub const NONE: InitError = InitError(0);
    pub const INIT_HMD_NOT_FOUND: InitError = InitError(108);
    pub const INIT_NO_SERVER_FOR_BACKGROUND_APP: InitError = InitError(121);
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NONE => write!(f, "none"),
            Self::INIT_HMD_NOT_FOUND => write!(f, "HMD not found (108)"),
            Self::INIT_NO_SERVER_FOR_BACKGROUND_APP => {
                write!(f, "no server for background app (121)")
            }
            InitError(code) => write!(f, "code {}", code),
        }
    }
}

/// Screenshot error code. Zero is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenshotError(pub u32);

impl fmt::Display for ScreenshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.0 {
            1 => "request failed",
            100 => "incompatible version",
            101 => "not found",
            102 => "buffer too small",
            108 => "screenshot already in progress",
            _ => "unknown",
        };
        write!(f, "{} ({})", name, self.0)
    }
}

/// One slot of the pose snapshot, in the runtime's right-handed frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawPose {
    /// 3x4 row-major device-to-absolute transform.
    pub device_to_absolute: [[f32; 4]; 3],
    /// Meters per second.
    pub velocity: [f32; 3],
    /// Radians per second.
    pub angular_velocity: [f32; 3],
    pub tracking_result: TrackingResult,
    pub pose_valid: bool,
    pub connected: bool,
}

impl RawPose {
    /// Both connected and carrying a usable pose.
    pub fn is_valid(&self) -> bool {
        self.connected && self.pose_valid
    }
}

bitflags::bitflags! {
    /// Controller button mask reported in `ControllerState`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[repr(C)]
    pub struct Buttons: u64 {
        const SYSTEM           = 1 << 0;
        const APPLICATION_MENU = 1 << 1;
        const GRIP             = 1 << 2;
        const DPAD_LEFT        = 1 << 3;
        const DPAD_UP          = 1 << 4;
        const DPAD_RIGHT       = 1 << 5;
        const DPAD_DOWN        = 1 << 6;
        const A                = 1 << 7;
        const PROXIMITY_SENSOR = 1 << 31;
        const TOUCHPAD         = 1 << 32;
        const TRIGGER          = 1 << 33;
        const AXIS2            = 1 << 34;
        const AXIS3            = 1 << 35;
        const AXIS4            = 1 << 36;
    }
}

/// Snapshot of a controller's buttons and analog axes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerState {
    pub packet_num: u32,
    pub pressed: Buttons,
    pub touched: Buttons,
    /// (x, y) per axis; trigger values live in x.
    pub axes: [(f32, f32); 5],
}

/// Runtime event identifiers the tracker reacts to.
pub mod event_type {
    pub const TRACKED_DEVICE_ACTIVATED: u32 = 100;
    pub const TRACKED_DEVICE_DEACTIVATED: u32 = 101;
    pub const TRACKED_DEVICE_UPDATED: u32 = 102;
    pub const QUIT: u32 = 700;
}

/// An event as delivered by the runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawEvent {
    pub event_type: u32,
    pub device: DeviceIndex,
    pub age_seconds: f32,
}

impl RawEvent {
    pub fn is_quit(&self) -> bool {
        self.event_type == event_type::QUIT
    }
}

/// Events returned from `Tracker::poll_events`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackingEvent {
    /// The runtime was initialized by this tracker.
    Connected,
    /// The runtime asked applications to quit.
    Disconnected,
    Raw(RawEvent),
}
