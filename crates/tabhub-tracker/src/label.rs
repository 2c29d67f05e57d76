//! Pure label formatting for presentation layers.

use tabhub_core::types::DeviceId;

/// Map a user-agent string to a short browser name.
///
/// Chromium-based Edge also advertises "Chrome", so the "Edg" token must
/// win before the Chrome check.
pub fn browser_name(user_agent: &str) -> &'static str {
    if user_agent.contains("Edg") {
        "Edge"
    } else if user_agent.contains("Chrome") {
        "Chrome"
    } else if user_agent.contains("Firefox") {
        "Firefox"
    } else if user_agent.contains("Safari") {
        "Safari"
    } else {
        "Unknown Browser"
    }
}

/// Human-facing label for a device group.
///
/// The device this process runs on is "This Device"; others are numbered
/// by their position in the presented list.
pub fn device_label(device_id: DeviceId, own_device_id: DeviceId, index: usize) -> String {
    if device_id == own_device_id {
        "This Device".to_string()
    } else {
        format!("Device {}", index + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_name_mapping() {
        assert_eq!(browser_name("Mozilla/5.0 ... Chrome/120 Safari/537"), "Chrome");
        assert_eq!(browser_name("Mozilla/5.0 ... Firefox/121"), "Firefox");
        assert_eq!(browser_name("Mozilla/5.0 ... Version/17 Safari/605"), "Safari");
        assert_eq!(browser_name("curl/8.5"), "Unknown Browser");
    }

    #[test]
    fn test_edge_wins_over_chrome() {
        assert_eq!(
            browser_name("Mozilla/5.0 ... Chrome/120 Safari/537 Edg/120"),
            "Edge"
        );
    }

    #[test]
    fn test_device_label() {
        let own = DeviceId::new();
        let other = DeviceId::new();
        assert_eq!(device_label(own, own, 3), "This Device");
        assert_eq!(device_label(other, own, 0), "Device 1");
        assert_eq!(device_label(other, own, 2), "Device 3");
    }
}
