use crate::types::{ApplicationType, TrackingOrigin};

/// How device scans decide when to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumerationStrategy {
    /// Visit every device slot.
    #[default]
    FullScan,
    /// Count connected devices first, then stop once that many were visited.
    /// Devices connecting between the count and the scan can be missed.
    StopAtConnectedCount,
}

/// Tracker settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Reference frame for pose requests.
    pub origin: TrackingOrigin,
    /// Rebuild the pose snapshot lazily whenever the frame counter changes.
    pub auto_update: bool,
    pub enumeration: EnumerationStrategy,
    /// Application type used by `Tracker::setup`.
    pub app_type: ApplicationType,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            origin: TrackingOrigin::Standing,
            auto_update: true,
            enumeration: EnumerationStrategy::FullScan,
            app_type: ApplicationType::Scene,
        }
    }
}

impl TrackerConfig {
    /// Build a config from `OVR_TRACKING_*` environment variables, falling back
    /// to the defaults for anything unset or unrecognized.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            origin: parse_origin(&read_env_string("OVR_TRACKING_ORIGIN", ""))
                .unwrap_or(defaults.origin),
            auto_update: read_env_bool("OVR_TRACKING_AUTO_UPDATE", defaults.auto_update),
            enumeration: parse_enumeration(&read_env_string("OVR_TRACKING_ENUMERATION", ""))
                .unwrap_or(defaults.enumeration),
            app_type: parse_app_type(&read_env_string("OVR_TRACKING_APP_TYPE", ""))
                .unwrap_or(defaults.app_type),
        }
    }
}

fn parse_origin(v: &str) -> Option<TrackingOrigin> {
    match v {
        "seated" => Some(TrackingOrigin::Seated),
        "standing" => Some(TrackingOrigin::Standing),
        "raw" | "raw-uncalibrated" => Some(TrackingOrigin::RawAndUncalibrated),
        "" => None,
        other => {
            log::warn!("Unknown OVR_TRACKING_ORIGIN='{}' (supported: seated|standing|raw)", other);
            None
        }
    }
}

fn parse_enumeration(v: &str) -> Option<EnumerationStrategy> {
    match v {
        "full" => Some(EnumerationStrategy::FullScan),
        "stop-at-count" => Some(EnumerationStrategy::StopAtConnectedCount),
        "" => None,
        other => {
            log::warn!(
                "Unknown OVR_TRACKING_ENUMERATION='{}' (supported: full|stop-at-count)",
                other
            );
            None
        }
    }
}

fn parse_app_type(v: &str) -> Option<ApplicationType> {
    match v {
        "scene" => Some(ApplicationType::Scene),
        "overlay" => Some(ApplicationType::Overlay),
        "background" => Some(ApplicationType::Background),
        "utility" => Some(ApplicationType::Utility),
        "other" => Some(ApplicationType::Other),
        "" => None,
        other => {
            log::warn!("Unknown OVR_TRACKING_APP_TYPE='{}'", other);
            None
        }
    }
}

fn read_env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

fn parse_bool(v: &str) -> Option<bool> {
    let v = v.trim().to_ascii_lowercase();
    match v.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = TrackerConfig::default();
        assert_eq!(cfg.origin, TrackingOrigin::Standing);
        assert!(cfg.auto_update);
        assert_eq!(cfg.enumeration, EnumerationStrategy::FullScan);
        assert_eq!(cfg.app_type, ApplicationType::Scene);
    }

    #[test]
    fn test_parse_words() {
        assert_eq!(parse_bool(" Yes "), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_origin("seated"), Some(TrackingOrigin::Seated));
        assert_eq!(parse_origin("sideways"), None);
        assert_eq!(
            parse_enumeration("stop-at-count"),
            Some(EnumerationStrategy::StopAtConnectedCount)
        );
        assert_eq!(parse_app_type("overlay"), Some(ApplicationType::Overlay));
    }
}
