//! Motion-to-photon prediction.
//!
//! Poses are requested for the moment the frame being prepared will light up
//! on the display: the rest of the current refresh cycle plus the panel's
//! vsync-to-photons delay.
//! See <https://github.com/ValveSoftware/openvr/wiki/IVRSystem::GetDeviceToAbsoluteTrackingPose>.

/// Readings above this are treated as bogus.
pub const MAX_SECONDS_SINCE_VSYNC: f32 = 1.0;

/// Seconds to predict ahead, or 0 when the inputs are unusable.
pub fn seconds_to_photons(display_hz: f32, seconds_since_vsync: f32, vsync_to_photons: f32) -> f32 {
    if seconds_since_vsync > MAX_SECONDS_SINCE_VSYNC {
        return 0.0;
    }
    if !(display_hz.is_finite() && display_hz > 0.0) {
        return 0.0;
    }

    let frame_duration = 1.0 / display_hz;
    let predicted = frame_duration - seconds_since_vsync + vsync_to_photons;
    if predicted < 0.0 || !predicted.is_finite() {
        return 0.0;
    }
    predicted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typical_90hz() {
        let t = seconds_to_photons(90.0, 0.005, 0.003);
        assert!((t - 0.009_111).abs() < 1e-5, "got {}", t);
    }

    #[test]
    fn test_bogus_vsync_reading() {
        assert_eq!(seconds_to_photons(90.0, 1.5, 0.003), 0.0);
    }

    #[test]
    fn test_negative_clamps_to_zero() {
        // Late in a long cycle: 1/90 - 0.02 + 0.001 < 0
        assert_eq!(seconds_to_photons(90.0, 0.02, 0.001), 0.0);
    }

    #[test]
    fn test_zero_refresh_rate() {
        assert_eq!(seconds_to_photons(0.0, 0.005, 0.003), 0.0);
        assert_eq!(seconds_to_photons(f32::NAN, 0.005, 0.003), 0.0);
    }
}
