//! Tests for `strokestr::config` - TOML parsing, threshold merging,
//! gesture inheritance, device filtering, and error handling.

use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

use strokestr::config::{AppConfig, SessionKind, parse_config_file};
use strokestr::dispatch::StartMode;

// ── Helpers ──────────────────────────────────────────────────

/// All required thresholds as a TOML snippet for embedding in test configs.
const ALL_THRESHOLDS: &str = r#"
[global.thresholds]
touch_slop = 8.0
hold_timeout_ms = 500
turn_angle_deg = 90.0
direction_angle_deg = 60.0
o_distance_threshold = 20.0
mode_decision_interval_ms = 150
rotate_resolution = 24
"#;

/// Write TOML to a temp file and parse it. Optionally prepends global thresholds.
fn load(toml_content: &str, with_thresholds: bool) -> AppConfig {
    let full = if with_thresholds {
        format!("{ALL_THRESHOLDS}\n{toml_content}")
    } else {
        toml_content.to_string()
    };
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(full.as_bytes()).unwrap();
    f.flush().unwrap();
    parse_config_file(f.path()).unwrap()
}

/// Parse raw TOML that is expected to fail.
fn load_err(toml_content: &str) -> String {
    let mut f = NamedTempFile::new().unwrap();
    f.write_all(toml_content.as_bytes()).unwrap();
    f.flush().unwrap();
    parse_config_file(f.path()).unwrap_err().to_string()
}

const DEVICE: &str = r#"
[device.pad]
device_usb_id = "1234:5678"
enabled = true
"#;

// ── Error handling ───────────────────────────────────────────

#[test]
fn test_file_not_found() {
    let msg = parse_config_file(std::path::Path::new("/no/such/file.toml"))
        .unwrap_err()
        .to_string();
    assert!(msg.contains("Failed to read config file"));
    assert!(msg.contains("/no/such/file.toml"));
}

#[test]
fn test_invalid_toml() {
    let msg = load_err("this is not valid toml [[[");
    assert!(msg.contains("Failed to parse config file"));
}

#[test]
fn test_missing_thresholds_lists_fields() {
    let msg = load_err(
        r#"
[global.thresholds]
touch_slop = 8.0

[device.pad]
device_usb_id = "1234:5678"
enabled = true
"#,
    );
    assert!(msg.contains("missing threshold(s)"));
    assert!(msg.contains("hold_timeout_ms"));
    assert!(msg.contains("turn_angle_deg"));
    assert!(!msg.contains("touch_slop,"));
}

#[test]
fn test_invalid_session_kind() {
    let msg = load_err(&format!(
        "{ALL_THRESHOLDS}\n{DEVICE}\nsession = \"spiral\"\n"
    ));
    assert!(msg.contains("invalid session 'spiral'"));
    assert!(msg.contains("'pad'"));
}

#[test]
fn test_invalid_start_mode() {
    let msg = load_err(&format!("{ALL_THRESHOLDS}\n{DEVICE}\nmode = \"zz\"\n"));
    assert!(msg.contains("invalid mode 'zz'"));
}

#[test]
fn test_zero_rotate_resolution_is_rejected() {
    let msg = load_err(&format!(
        "{ALL_THRESHOLDS}\n{DEVICE}\n[device.pad.thresholds]\nrotate_resolution = 0\n"
    ));
    assert!(msg.contains("invalid rotate_resolution '0'"));
}

// ── Device filtering ─────────────────────────────────────────

#[test]
fn test_disabled_device_is_skipped() {
    let config = load(
        r#"
[device.pad]
device_usb_id = "1234:5678"
enabled = false
"#,
        true,
    );
    assert!(config.devices.is_empty());
}

#[test]
fn test_device_without_usb_id_is_skipped() {
    let config = load(
        r#"
[device.pad]
enabled = true

[device.other]
device_usb_id = ""
enabled = true
"#,
        true,
    );
    assert!(config.devices.is_empty());
}

#[test]
fn test_enabled_device_is_kept() {
    let config = load(DEVICE, true);
    assert_eq!(config.devices.len(), 1);
    assert_eq!(config.devices["pad"].device_usb_id, "1234:5678");
}

// ── Defaults ─────────────────────────────────────────────────

#[test]
fn test_session_and_mode_defaults() {
    let config = load(DEVICE, true);
    let device = &config.devices["pad"];
    assert_eq!(device.session, SessionKind::Zo);
    assert_eq!(device.start_mode, StartMode::Auto);
}

#[test]
fn test_log_level_defaults_to_info() {
    let config = load(DEVICE, true);
    assert_eq!(config.log_level, "info");
    assert_eq!(config.log_file, None);
}

#[test]
fn test_global_section_is_read() {
    let config = load(
        &format!("[global]\nlog_level = \"debug\"\nlog_file = \"/tmp/strokestr.log\"\n{DEVICE}"),
        true,
    );
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.log_file.as_deref(), Some("/tmp/strokestr.log"));
}

// ── Session kinds and start modes ────────────────────────────

#[test]
fn test_session_kinds_parse() {
    for (raw, expected) in [
        ("zo", SessionKind::Zo),
        ("direction", SessionKind::Direction),
        ("rotate", SessionKind::Rotate),
    ] {
        let config = load(&format!("{DEVICE}\nsession = \"{raw}\"\n"), true);
        assert_eq!(config.devices["pad"].session, expected);
    }
}

#[test]
fn test_start_modes_parse() {
    for (raw, expected) in [
        ("auto", StartMode::Auto),
        ("z", StartMode::Z),
        ("o", StartMode::O),
    ] {
        let config = load(&format!("{DEVICE}\nmode = \"{raw}\"\n"), true);
        assert_eq!(config.devices["pad"].start_mode, expected);
    }
}

// ── Threshold merging ────────────────────────────────────────

#[test]
fn test_global_thresholds_apply() {
    let config = load(DEVICE, true);
    let th = &config.devices["pad"].thresholds;
    assert_eq!(th.touch_slop, 8.0);
    assert_eq!(th.hold_timeout_ms, 500);
    assert_eq!(th.turn_angle_deg, 90.0);
    assert_eq!(th.direction_angle_deg, 60.0);
    assert_eq!(th.o_distance_threshold, 20.0);
    assert_eq!(th.mode_decision_interval_ms, 150);
    assert_eq!(th.rotate_resolution, 24);
}

#[test]
fn test_device_thresholds_override_global() {
    let config = load(
        &format!(
            "{DEVICE}\n[device.pad.thresholds]\no_distance_threshold = 35.0\nturn_angle_deg = 60.0\n"
        ),
        true,
    );
    let th = &config.devices["pad"].thresholds;
    assert_eq!(th.o_distance_threshold, 35.0);
    assert_eq!(th.turn_angle_deg, 60.0);
    // untouched fields still come from the global section
    assert_eq!(th.touch_slop, 8.0);
}

#[test]
fn test_device_only_thresholds_suffice() {
    let config = load(
        r#"
[device.pad]
device_usb_id = "1234:5678"
enabled = true

[device.pad.thresholds]
touch_slop = 12.0
hold_timeout_ms = 700
turn_angle_deg = 60.0
direction_angle_deg = 45.0
o_distance_threshold = 25.0
mode_decision_interval_ms = 200
rotate_resolution = 12
"#,
        false,
    );
    let th = &config.devices["pad"].thresholds;
    assert_eq!(th.touch_slop, 12.0);
    assert_eq!(th.rotate_resolution, 12);
}

#[test]
fn test_duration_helpers() {
    let config = load(DEVICE, true);
    let th = &config.devices["pad"].thresholds;
    assert_eq!(th.hold_timeout(), Duration::from_millis(500));
    assert_eq!(th.mode_decision_interval(), Duration::from_millis(150));
}

// ── Gesture merging ──────────────────────────────────────────

#[test]
fn test_global_gestures_are_inherited() {
    let config = load(
        &format!("[global.gestures.click]\naction = \"xdotool click 1\"\nenabled = true\n{DEVICE}"),
        true,
    );
    let gesture = &config.devices["pad"].gestures["click"];
    assert_eq!(gesture.action.as_deref(), Some("xdotool click 1"));
    assert!(gesture.enabled);
}

#[test]
fn test_device_gestures_override_global() {
    let config = load(
        &format!(
            "[global.gestures.increment]\naction = \"globally\"\nenabled = true\n\
             {DEVICE}\n\
             [device.pad.gestures.increment]\naction = \"locally\"\n"
        ),
        true,
    );
    let gesture = &config.devices["pad"].gestures["increment"];
    assert_eq!(gesture.action.as_deref(), Some("locally"));
    // enabled not restated by the device: the global value survives
    assert!(gesture.enabled);
}

#[test]
fn test_device_can_disable_global_gesture() {
    let config = load(
        &format!(
            "[global.gestures.turn]\naction = \"beep\"\nenabled = true\n\
             {DEVICE}\n\
             [device.pad.gestures.turn]\nenabled = false\n"
        ),
        true,
    );
    let gesture = &config.devices["pad"].gestures["turn"];
    assert!(!gesture.enabled);
    assert_eq!(gesture.action.as_deref(), Some("beep"));
}

#[test]
fn test_device_only_gesture() {
    let config = load(
        &format!("{DEVICE}\n[device.pad.gestures.decrement]\naction = \"down\"\nenabled = true\n"),
        true,
    );
    let gesture = &config.devices["pad"].gestures["decrement"];
    assert_eq!(gesture.action.as_deref(), Some("down"));
    assert!(gesture.enabled);
}

#[test]
fn test_gesture_defaults_to_disabled() {
    let config = load(
        &format!("{DEVICE}\n[device.pad.gestures.increment]\naction = \"up\"\n"),
        true,
    );
    assert!(!config.devices["pad"].gestures["increment"].enabled);
}

// ── Multiple devices ─────────────────────────────────────────

#[test]
fn test_multiple_devices_with_distinct_sessions() {
    let config = load(
        r#"
[device.volume]
device_usb_id = "1111:2222"
enabled = true
session = "zo"
mode = "z"

[device.jog]
device_usb_id = "3333:4444"
enabled = true
session = "rotate"

[device.sketch]
device_usb_id = "5555:6666"
enabled = true
session = "direction"

[device.jog.thresholds]
rotate_resolution = 48
"#,
        true,
    );
    assert_eq!(config.devices.len(), 3);
    assert_eq!(config.devices["volume"].session, SessionKind::Zo);
    assert_eq!(config.devices["volume"].start_mode, StartMode::Z);
    assert_eq!(config.devices["jog"].session, SessionKind::Rotate);
    assert_eq!(config.devices["jog"].thresholds.rotate_resolution, 48);
    assert_eq!(config.devices["sketch"].session, SessionKind::Direction);
    // other devices keep the global resolution
    assert_eq!(config.devices["volume"].thresholds.rotate_resolution, 24);
}
