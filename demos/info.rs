//! Print the HMD's details and the current motion-to-photon prediction.

use ovr_tracking::openvr::OpenVrConnector;
use ovr_tracking::{ApplicationType, DeviceProperty, Tracker};

fn main() {
    env_logger::init();

    let mut tracker = Tracker::new(OpenVrConnector::new());
    if !tracker.can_use() {
        eprintln!("Error: OpenVR runtime not installed or no HMD present");
        std::process::exit(1);
    }
    if let Err(e) = tracker.setup(ApplicationType::Background) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let hmd = tracker.hmd_index();
    println!("{}", tracker.device_debug_info(hmd));
    println!(
        "Refresh:    {:?} Hz",
        tracker.property_float(hmd, DeviceProperty::DisplayFrequency)
    );
    println!(
        "Photons:    {:?} s",
        tracker.property_float(hmd, DeviceProperty::SecondsFromVsyncToPhotons)
    );
    println!("Prediction: {:.4} s", tracker.predicted_time());
}
