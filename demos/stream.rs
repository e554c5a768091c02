//! Stream HMD and tracker poses to stdout at roughly 90 Hz.
//!
//! Usage: cargo run --example stream --features openvr
//! Stops when the runtime quits, or press Ctrl+C.

use ovr_tracking::openvr::OpenVrConnector;
use ovr_tracking::{ApplicationType, Tracker, TrackerConfig};
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let mut tracker = Tracker::with_config(OpenVrConnector::new(), TrackerConfig::from_env());
    if !tracker.start(ApplicationType::Overlay) {
        eprintln!("Failed to start OpenVR");
        std::process::exit(1);
    }

    println!("Streaming poses (Ctrl+C to stop)...");

    let start = Instant::now();
    let frame_time = Duration::from_micros(11_111);
    let mut frame: u64 = 0;

    loop {
        if tracker.poll_quit() {
            println!("Runtime requested quit");
            break;
        }

        frame += 1;
        tracker.refresh(frame);

        // Print every ~90th frame to avoid flooding the terminal
        if frame % 90 == 1 {
            let mut devices = vec![tracker.hmd_index()];
            devices.extend(tracker.vive_trackers());
            for index in devices {
                if let Some(t) = tracker.transform(index) {
                    let q = t.rotation.quaternion();
                    println!(
                        "dev={:<2}  pos=[{:+.4}, {:+.4}, {:+.4}]  quat=[{:+.3}, {:+.3}, {:+.3}, {:+.3}]  vel=[{:+.3}, {:+.3}, {:+.3}]",
                        index,
                        t.position.x, t.position.y, t.position.z,
                        q.i, q.j, q.k, q.w,
                        t.velocity.x, t.velocity.y, t.velocity.z,
                    );
                }
            }
            println!(
                "--- frame {} at {:.1}s, prediction {:.4}s ---",
                frame,
                start.elapsed().as_secs_f64(),
                tracker.current_prediction()
            );
        }

        std::thread::sleep(frame_time);
    }

    tracker.close();
}
