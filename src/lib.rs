//! # ovr-tracking - typed device tracking over OpenVR
//!
//! A thin façade over a VR runtime's tracking API. Provides:
//! - Runtime handle lifecycle without global state
//! - Per-frame cached pose snapshots with motion-to-photon prediction
//! - Poses converted to a left-handed (Z-forward) engine frame
//! - Device property queries, enumeration and class presets
//! - Polled runtime events, controller input, screenshots
//! - C ABI for engine plugins (feature `openvr`)
//!
//! ## Quick Start
//! ```no_run
//! # #[cfg(feature = "openvr")]
//! # fn main() {
//! use ovr_tracking::{openvr::OpenVrConnector, ApplicationType, Tracker};
//!
//! let mut tracker = Tracker::new(OpenVrConnector::new());
//! if !tracker.start(ApplicationType::Overlay) {
//!     return;
//! }
//! for frame in 0..100 {
//!     tracker.refresh(frame);
//!     for index in tracker.vive_trackers() {
//!         if let Some(t) = tracker.transform(index) {
//!             println!("{}: {:?}", index, t.position);
//!         }
//!     }
//! }
//! # }
//! # #[cfg(not(feature = "openvr"))]
//! # fn main() {}
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod runtime;
pub mod prediction;
pub mod transform;
pub mod tracker;
pub mod mock;
#[cfg(feature = "openvr")]
pub mod openvr;
#[cfg(feature = "openvr")]
pub mod ffi;

pub use config::{EnumerationStrategy, TrackerConfig};
pub use error::TrackingError;
pub use runtime::{Connector, Runtime};
pub use tracker::{TrackedPosition, Tracker};
pub use transform::{DeviceTransform, RigidTransform, SceneNode};
pub use types::*;

/// Result type alias for tracking operations.
pub type Result<T> = std::result::Result<T, TrackingError>;
