//! List all connected tracked devices.

use ovr_tracking::openvr::OpenVrConnector;
use ovr_tracking::{ApplicationType, Tracker, TrackerConfig};

fn main() {
    env_logger::init();

    let mut tracker = Tracker::with_config(OpenVrConnector::new(), TrackerConfig::from_env());
    if !tracker.start(ApplicationType::Utility) {
        eprintln!("Error: no OpenVR runtime available");
        std::process::exit(1);
    }

    let devices = tracker.connected_devices();
    println!("Found {} device(s):", devices.len());
    print!("{}", tracker.device_info_list_for(&devices));

    println!("Trackers:      {:?}", tracker.vive_trackers());
    println!("Controllers:   {:?}", tracker.vive_controllers());
    println!("Base stations: {:?}", tracker.base_stations());
}
