//! Configuration data structures and TOML parsing.
//!
//! The config file uses TOML format. Example:
//!
//! ```toml
//! [global]
//! log_level = "info"
//!
//! [global.thresholds]
//! touch_slop = 8.0
//! hold_timeout_ms = 500
//! turn_angle_deg = 90.0
//! direction_angle_deg = 60.0
//! o_distance_threshold = 20.0
//! mode_decision_interval_ms = 150
//! rotate_resolution = 24
//!
//! [global.gestures.click]
//! action = "xdotool click 1"
//! enabled = true
//!
//! [device.volume]
//! device_usb_id = "1234:5678"
//! enabled = true
//! session = "zo"
//! mode = "auto"
//!
//! [device.volume.gestures.increment]
//! action = "xdotool key XF86AudioRaiseVolume"
//! enabled = true
//!
//! [device.volume.gestures.decrement]
//! action = "xdotool key XF86AudioLowerVolume"
//! enabled = true
//!
//! [device.volume.thresholds]
//! o_distance_threshold = 30.0
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::dispatch::StartMode;

/// Top-level error type used throughout the crate.
#[derive(Debug, Error)]
pub enum StrokestrError {
    #[error("Failed to read config file {path}: {source}")]
    ConfigReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    #[error("Config validation error for device '{device}': missing threshold(s): {missing}")]
    MissingThresholds { device: String, missing: String },

    #[error("Config validation error for device '{device}': invalid {field} '{value}'")]
    InvalidValue {
        device: String,
        field: &'static str,
        value: String,
    },
}

/// Which gesture pipeline a device runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, IntoStaticStr)]
pub enum SessionKind {
    /// Turn-back strokes dispatched as Z/O increments.
    #[default]
    #[strum(serialize = "zo")]
    Zo,
    /// Bare direction-change events.
    #[strum(serialize = "direction")]
    Direction,
    /// Quantized rotation around the first touch point.
    #[strum(serialize = "rotate")]
    Rotate,
}

/// Root of the TOML config file.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    global: RawGlobal,
    #[serde(default)]
    device: HashMap<String, RawDevice>,
}

/// The `[global]` section.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawGlobal {
    log_level: Option<String>,
    log_file: Option<String>,
    #[serde(default)]
    thresholds: RawThresholds,
    #[serde(default)]
    gestures: HashMap<String, RawGestureConfig>,
}

/// Threshold values - all optional so device sections can partially override.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
struct RawThresholds {
    touch_slop: Option<f64>,
    hold_timeout_ms: Option<u64>,
    turn_angle_deg: Option<f64>,
    direction_angle_deg: Option<f64>,
    o_distance_threshold: Option<f64>,
    mode_decision_interval_ms: Option<u64>,
    rotate_resolution: Option<u32>,
}

/// A gesture entry (action + enabled).
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
struct RawGestureConfig {
    action: Option<String>,
    enabled: Option<bool>,
}

/// A `[device.<id>]` section.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawDevice {
    device_usb_id: Option<String>,
    enabled: Option<bool>,
    session: Option<String>,
    mode: Option<String>,
    #[serde(default)]
    thresholds: RawThresholds,
    #[serde(default)]
    gestures: HashMap<String, RawGestureConfig>,
}

/// Fully validated thresholds - all values guaranteed to be present.
///
/// Created via threshold merging during config parsing.
#[derive(Debug, Clone, Default)]
pub struct ValidatedThresholds {
    /// Minimum pixels distinguishing a deliberate drag from noise.
    pub touch_slop: f64,
    pub hold_timeout_ms: u64,
    /// Direction change (degrees) ending one stroke and starting the next.
    pub turn_angle_deg: f64,
    /// Reversal threshold (degrees) for direction sessions.
    pub direction_angle_deg: f64,
    /// O-mode pixels of stroke length per dispatched unit.
    pub o_distance_threshold: f64,
    /// Auto-mode window after down within which a first stroke selects Z.
    pub mode_decision_interval_ms: u64,
    /// Steps per full turn for rotate sessions.
    pub rotate_resolution: u32,
}

impl ValidatedThresholds {
    pub fn hold_timeout(&self) -> Duration {
        Duration::from_millis(self.hold_timeout_ms)
    }

    pub fn mode_decision_interval(&self) -> Duration {
        Duration::from_millis(self.mode_decision_interval_ms)
    }
}

/// Gesture configuration (action + enabled).
#[derive(Debug, Clone)]
pub struct GestureConfig {
    pub action: Option<String>,
    pub enabled: bool,
}

/// Configuration for a single touch device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub device_usb_id: String,
    pub session: SessionKind,
    pub start_mode: StartMode,
    pub gestures: HashMap<String, GestureConfig>,
    pub thresholds: ValidatedThresholds,
}

/// Top-level parsed configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub log_level: String,
    pub log_file: Option<String>,
    pub devices: HashMap<String, DeviceConfig>,
}

/// Generate merge, validate, and into_validated for threshold fields.
macro_rules! threshold_fields {
    ($($field:ident),+ $(,)?) => {
        impl RawThresholds {
            fn merge_with_fallback(&self, fallback: &RawThresholds) -> RawThresholds {
                RawThresholds {
                    $($field: self.$field.or(fallback.$field),)+
                }
            }

            fn into_validated(self) -> Result<ValidatedThresholds, Vec<&'static str>> {
                let missing: Vec<&str> = [$(
                    if self.$field.is_none() { Some(stringify!($field)) } else { None },
                )+].into_iter().flatten().collect();

                if !missing.is_empty() {
                    return Err(missing);
                }

                Ok(ValidatedThresholds {
                    $($field: self.$field.unwrap(),)+
                })
            }
        }
    };
}

threshold_fields!(
    touch_slop,
    hold_timeout_ms,
    turn_angle_deg,
    direction_angle_deg,
    o_distance_threshold,
    mode_decision_interval_ms,
    rotate_resolution,
);

/// Merge gesture maps: global first, then device-specific overrides.
fn merge_gestures(
    global: &HashMap<String, RawGestureConfig>,
    device: &HashMap<String, RawGestureConfig>,
) -> HashMap<String, GestureConfig> {
    let mut merged = HashMap::new();

    // Insert all global + device gesture names, device values override.
    for (name, gc) in global.iter().chain(device.iter()) {
        let entry = merged.entry(name.clone()).or_insert(GestureConfig {
            action: None,
            enabled: false,
        });
        if gc.action.is_some() {
            entry.action.clone_from(&gc.action);
        }
        if let Some(enabled) = gc.enabled {
            entry.enabled = enabled;
        }
    }

    merged
}

/// Parse an enum-like string field, reporting the device and field on error.
fn parse_field<T: FromStr + Default>(
    device: &str,
    field: &'static str,
    raw: Option<&str>,
) -> Result<T, StrokestrError> {
    match raw {
        None => Ok(T::default()),
        Some(value) => value.parse().map_err(|_| StrokestrError::InvalidValue {
            device: device.to_string(),
            field,
            value: value.to_string(),
        }),
    }
}

/// Parse a TOML config file and return the fully resolved `AppConfig`.
pub fn parse_config_file(path: &Path) -> Result<AppConfig, StrokestrError> {
    let raw: RawConfig =
        toml::from_str(
            &fs::read_to_string(path).map_err(|e| StrokestrError::ConfigReadError {
                path: path.to_path_buf(),
                source: e,
            })?,
        )
        .map_err(|e| StrokestrError::ConfigParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut devices = HashMap::new();

    for (device_id, raw_dev) in &raw.device {
        if !raw_dev.enabled.unwrap_or(false) {
            debug!("Device '{device_id}' is not enabled – skipping.");
            continue;
        }

        let Some(usb_id) = raw_dev.device_usb_id.as_deref().filter(|s| !s.is_empty()) else {
            warn!(
                "Device '{device_id}' is enabled but has no device_usb_id – skipping. \
                 Run 'strokestr --list-devices' to find your USB ID.",
            );
            continue;
        };

        let thresholds = raw_dev
            .thresholds
            .merge_with_fallback(&raw.global.thresholds)
            .into_validated()
            .map_err(|missing| StrokestrError::MissingThresholds {
                device: device_id.to_string(),
                missing: missing.join(", "),
            })?;

        if thresholds.rotate_resolution == 0 {
            return Err(StrokestrError::InvalidValue {
                device: device_id.to_string(),
                field: "rotate_resolution",
                value: "0".to_string(),
            });
        }

        devices.insert(
            device_id.clone(),
            DeviceConfig {
                device_usb_id: usb_id.to_string(),
                session: parse_field(device_id, "session", raw_dev.session.as_deref())?,
                start_mode: parse_field(device_id, "mode", raw_dev.mode.as_deref())?,
                gestures: merge_gestures(&raw.global.gestures, &raw_dev.gestures),
                thresholds,
            },
        );
    }

    Ok(AppConfig {
        log_level: raw.global.log_level.unwrap_or_else(|| "info".to_string()),
        log_file: raw.global.log_file,
        devices,
    })
}
