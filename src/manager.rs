//! Multi-device gesture manager and device discovery (I/O layer).
//!
//! Pure event processing lives in [`crate::event`] and the detectors; this
//! module owns the evdev devices, the per-device threads, and the shell
//! actions spawned for dispatched gestures.

use std::collections::HashMap;
use std::process::{Command, ExitCode};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use evdev::{AbsoluteAxisType, Device};
use log::{debug, error, info, warn};

use crate::config::{
    AppConfig, DeviceConfig, GestureConfig, SessionKind, StrokestrError, parse_config_file,
};
use crate::detector::{
    DetectorConfig, GestureMode, PointerEvent, StrokeGestureDetector, StrokeGestureListener,
};
use crate::direction::{DirectionChangeDetector, DirectionChangeListener};
use crate::dispatch::{DispatchAction, DispatchMode, Dispatcher, ZoConfig, ZoController};
use crate::event::{FrameAssembler, classify_event, parse_usb_id, resolve_action};

/// Wakeup interval of a session thread when no hold deadline is pending.
const IDLE_POLL: Duration = Duration::from_millis(500);

// -- GestureManager (top-level orchestrator) ------------------

/// Manages gesture sessions across multiple touch devices.
pub struct GestureManager {
    config: AppConfig,
    running: Arc<AtomicBool>,
}

impl GestureManager {
    pub fn new(config_path: impl AsRef<std::path::Path>) -> Result<Self, StrokestrError> {
        Ok(Self {
            config: parse_config_file(config_path.as_ref())?,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Start listening to all configured devices.
    pub fn start(&mut self) {
        if self.config.devices.is_empty() {
            error!("No devices configured");
            return;
        }

        self.running.store(true, Ordering::Relaxed);
        info!("Starting gesture manager");

        let mut handles = Vec::new();

        for (device_id, device_config) in &self.config.devices {
            if let Some(device) = find_device(device_id, device_config) {
                let device_id = device_id.clone();
                let config = device_config.clone();
                let running = Arc::clone(&self.running);

                handles.push(
                    thread::Builder::new()
                        .name(format!("gesture-{device_id}"))
                        .spawn(move || {
                            run_device_loop(&device_id, device, &config, &running);
                        })
                        .expect("Failed to spawn device thread"),
                );
            } else {
                warn!("Device not found: {device_id}");
            }
        }

        if handles.is_empty() {
            error!("No devices found, exiting");
            return;
        }

        for handle in handles {
            let _ = handle.join();
        }
    }

    /// Stop listening to devices.
    #[allow(dead_code)]
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        info!("Gesture manager stopped");
    }

    /// Get a reference to the running flag for signal handling.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Get the log level from the parsed configuration.
    pub fn config_log_level(&self) -> &str {
        &self.config.log_level
    }

    /// Get the optional log file path from the parsed configuration.
    pub fn config_log_file(&self) -> Option<&str> {
        self.config.log_file.as_deref()
    }
}

// -- Device I/O -----------------------------------------------

/// Check if a device has multi-touch capabilities.
fn is_touch_device(device: &Device) -> bool {
    let Some(abs_axes) = device.supported_absolute_axes() else {
        return false;
    };
    abs_axes.contains(AbsoluteAxisType::ABS_MT_POSITION_X)
        && abs_axes.contains(AbsoluteAxisType::ABS_MT_POSITION_Y)
}

/// Find a touchscreen device by USB vendor:product ID.
fn find_device(device_id: &str, config: &DeviceConfig) -> Option<Device> {
    let Some((vendor, product)) = parse_usb_id(&config.device_usb_id) else {
        warn!(
            "Device {device_id}: invalid USB ID format '{}' (expected vendor:product)",
            config.device_usb_id
        );
        return None;
    };

    for (path, device) in evdev::enumerate() {
        if !is_touch_device(&device) {
            continue;
        }
        let id = device.input_id();
        if id.vendor() == vendor && id.product() == product {
            info!(
                "Found device for {} by USB ID {}: {} ({})",
                device_id,
                config.device_usb_id,
                device.name().unwrap_or("unknown"),
                path.display()
            );
            return Some(device);
        }
    }

    warn!(
        "Device {}: no touch device with USB ID {} found",
        device_id, config.device_usb_id
    );
    None
}

/// Pair a blocking reader thread with the session loop for one device.
///
/// The reader blocks on evdev and forwards assembled pointer frames over a
/// channel; the session loop drives the detector and doubles as the hold
/// timer by bounding its receive timeout with the pending hold deadline.
fn run_device_loop(
    device_id: &str,
    device: Device,
    config: &DeviceConfig,
    running: &Arc<AtomicBool>,
) {
    let epoch = Instant::now();
    let (tx, rx) = mpsc::channel();

    let reader = {
        let device_id = device_id.to_string();
        let config = config.clone();
        let running = Arc::clone(running);
        thread::Builder::new()
            .name(format!("reader-{device_id}"))
            .spawn(move || {
                read_device_events(&device_id, device, &config, &tx, &running, epoch);
            })
            .expect("Failed to spawn reader thread")
    };

    info!(
        "Started {} session for device: {device_id} (USB {})",
        config.session, config.device_usb_id
    );

    let mut session = DeviceSession::new(device_id, config);
    session_loop(&rx, &mut session, epoch, running);

    let _ = reader.join();
}

/// Blocking evdev read loop feeding the session channel.
fn read_device_events(
    device_id: &str,
    mut device: Device,
    config: &DeviceConfig,
    tx: &Sender<PointerEvent>,
    running: &Arc<AtomicBool>,
    epoch: Instant,
) {
    let mut assembler = FrameAssembler::new();
    let mut frames = Vec::new();

    while running.load(Ordering::Relaxed) {
        match device.fetch_events().map(|iter| iter.collect::<Vec<_>>()) {
            Ok(events) => {
                let time = epoch.elapsed();
                for event in &events {
                    if let Some(touch_event) = classify_event(event) {
                        assembler.push(&touch_event, time, &mut frames);
                    }
                }
                for frame in frames.drain(..) {
                    if tx.send(frame).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                if !running.load(Ordering::Relaxed) {
                    return;
                }
                warn!("Device {device_id} disconnected: {e}");
                match reattach_device(device_id, config, running) {
                    Some(new_device) => {
                        device = new_device;
                        assembler.reset();
                    }
                    None => return,
                }
            }
        }
    }
}

/// Attempt to reconnect to a device after it disconnects.
fn reattach_device(
    device_id: &str,
    config: &DeviceConfig,
    running: &Arc<AtomicBool>,
) -> Option<Device> {
    const MAX_RETRIES: usize = 10;
    const RETRY_INTERVAL: Duration = Duration::from_secs(5);

    for attempt in 1..=MAX_RETRIES {
        if !running.load(Ordering::Relaxed) {
            return None;
        }
        info!("Reconnect attempt {attempt}/{MAX_RETRIES} for {device_id}...");
        thread::sleep(RETRY_INTERVAL);

        if let Some(device) = find_device(device_id, config) {
            info!("Reconnected to {device_id}");
            return Some(device);
        }
    }
    error!("Failed to reconnect to {device_id} after {MAX_RETRIES} attempts");
    None
}

/// Detector loop: drains pointer frames and fires due hold deadlines.
fn session_loop(
    rx: &Receiver<PointerEvent>,
    session: &mut DeviceSession,
    epoch: Instant,
    running: &Arc<AtomicBool>,
) {
    while running.load(Ordering::Relaxed) {
        let timeout = match session.pending_hold() {
            Some((_, deadline)) => deadline.saturating_sub(epoch.elapsed()),
            None => IDLE_POLL,
        };

        match rx.recv_timeout(timeout) {
            Ok(frame) => session.handle(&frame),
            Err(RecvTimeoutError::Timeout) => {
                if let Some((generation, deadline)) = session.pending_hold() {
                    if epoch.elapsed() >= deadline {
                        session.fire_hold(generation);
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

// -- Sessions -------------------------------------------------

/// One configured gesture pipeline bound to one device.
enum DeviceSession {
    Zo(StrokeGestureDetector<ZoController<ActionSink>>),
    Direction(DirectionChangeDetector<DirectionSink>),
    Rotate(StrokeGestureDetector<RotateSink>),
}

impl DeviceSession {
    fn new(device_id: &str, config: &DeviceConfig) -> Self {
        let th = &config.thresholds;
        let detector_config = DetectorConfig {
            touch_slop: th.touch_slop,
            hold_timeout: th.hold_timeout(),
            turn_angle_deg: th.turn_angle_deg,
            rotate_resolution: th.rotate_resolution,
            ..DetectorConfig::default()
        };

        match config.session {
            SessionKind::Zo => {
                let controller = ZoController::new(
                    ActionSink::new(device_id, config),
                    ZoConfig {
                        start_mode: config.start_mode,
                        distance_threshold: th.o_distance_threshold,
                        mode_decision_interval: th.mode_decision_interval(),
                    },
                );
                DeviceSession::Zo(StrokeGestureDetector::new(detector_config, controller))
            }
            SessionKind::Direction => DeviceSession::Direction(DirectionChangeDetector::new(
                DirectionSink::new(device_id, config),
                th.direction_angle_deg,
                th.touch_slop,
            )),
            SessionKind::Rotate => {
                let detector_config = DetectorConfig {
                    initial_mode: GestureMode::Rotate,
                    ..detector_config
                };
                DeviceSession::Rotate(StrokeGestureDetector::new(
                    detector_config,
                    RotateSink::new(device_id, config),
                ))
            }
        }
    }

    fn handle(&mut self, frame: &PointerEvent) {
        match self {
            DeviceSession::Zo(detector) => {
                detector.on_event(frame);
            }
            DeviceSession::Direction(detector) => {
                detector.on_event(frame);
            }
            DeviceSession::Rotate(detector) => {
                detector.on_event(frame);
            }
        }
    }

    fn pending_hold(&self) -> Option<(u64, Duration)> {
        match self {
            DeviceSession::Zo(detector) => detector.pending_hold(),
            DeviceSession::Rotate(detector) => detector.pending_hold(),
            DeviceSession::Direction(_) => None,
        }
    }

    fn fire_hold(&mut self, generation: u64) {
        match self {
            DeviceSession::Zo(detector) => {
                detector.fire_hold(generation);
            }
            DeviceSession::Rotate(detector) => {
                detector.fire_hold(generation);
            }
            DeviceSession::Direction(_) => {}
        }
    }
}

// -- Action sinks ---------------------------------------------

/// Spawns configured shell actions for Z/O dispatch values.
struct ActionSink {
    device_id: String,
    gestures: HashMap<String, GestureConfig>,
}

impl ActionSink {
    fn new(device_id: &str, config: &DeviceConfig) -> Self {
        Self {
            device_id: device_id.to_string(),
            gestures: config.gestures.clone(),
        }
    }
}

impl Dispatcher for ActionSink {
    fn on_move(&mut self, mode: DispatchMode, value: i32) {
        if value == 0 {
            return;
        }
        debug!("{}: {mode} dispatch {value:+}", self.device_id);
        let action = if value > 0 {
            DispatchAction::Increment
        } else {
            DispatchAction::Decrement
        };
        for _ in 0..value.unsigned_abs() {
            execute_action(&self.device_id, action, &self.gestures);
        }
    }

    fn on_click(&mut self) {
        execute_action(&self.device_id, DispatchAction::Click, &self.gestures);
    }
}

/// Runs the `turn` action on every direction reversal.
struct DirectionSink {
    device_id: String,
    gestures: HashMap<String, GestureConfig>,
}

impl DirectionSink {
    fn new(device_id: &str, config: &DeviceConfig) -> Self {
        Self {
            device_id: device_id.to_string(),
            gestures: config.gestures.clone(),
        }
    }
}

impl DirectionChangeListener for DirectionSink {
    fn on_direction_changed(&mut self, count: usize, angle_degrees: f64) {
        debug!(
            "{}: direction change #{count} heading {angle_degrees:.0}",
            self.device_id
        );
        // count 0 is the synthetic event fired at touch-down
        if count > 0 {
            execute_action(&self.device_id, DispatchAction::Turn, &self.gestures);
        }
    }
}

/// Converts quantized rotation steps into increment/decrement actions.
struct RotateSink {
    device_id: String,
    gestures: HashMap<String, GestureConfig>,
}

impl RotateSink {
    fn new(device_id: &str, config: &DeviceConfig) -> Self {
        Self {
            device_id: device_id.to_string(),
            gestures: config.gestures.clone(),
        }
    }
}

impl StrokeGestureListener for RotateSink {
    fn on_rotate_move(&mut self, _ev: &PointerEvent, _angle_radians: f64, diff: i32) -> bool {
        if diff != 0 {
            let action = if diff > 0 {
                DispatchAction::Increment
            } else {
                DispatchAction::Decrement
            };
            for _ in 0..diff.unsigned_abs() {
                execute_action(&self.device_id, action, &self.gestures);
            }
        }
        true
    }

    fn on_single_tap_up(&mut self, _ev: &PointerEvent) -> bool {
        execute_action(&self.device_id, DispatchAction::Click, &self.gestures);
        false
    }
}

/// Spawn the shell command configured for a dispatch action.
fn execute_action(device_id: &str, action: DispatchAction, gestures: &HashMap<String, GestureConfig>) {
    let action_name: &str = action.into();
    if let Some(command) = resolve_action(action, gestures) {
        match Command::new("sh").arg("-c").arg(command).spawn() {
            Ok(_) => debug!("Spawned action: {command}"),
            Err(e) => error!("Failed to execute action '{command}': {e}"),
        }
        info!("{device_id}: {action_name}");
    }
}

/// List all multi-touch capable devices.
pub fn list_touch_devices() -> ExitCode {
    println!("\n=== strokestr: Available Touchscreen Devices ===\n");
    let mut touch_count = 0;

    for (path, device) in evdev::enumerate() {
        if !is_touch_device(&device) {
            continue;
        }

        touch_count += 1;
        println!(
            "Device {touch_count}:\n\
             \x20 Path:      {}\n\
             \x20 Name:      {}\n\
             \x20 USB ID:    {:04x}:{:04x}\n\
             \x20 Phys:      {}\n",
            path.display(),
            device.name().unwrap_or("unknown"),
            device.input_id().vendor(),
            device.input_id().product(),
            device.physical_path().unwrap_or("N/A"),
        );
    }

    if touch_count == 0 {
        println!(
            "No multi-touch devices found.\n\n\
             Troubleshooting:\n\
             \x20 - Check if touchscreen is connected\n\
             \x20 - Run 'libinput list-devices' to see all devices\n\
             \x20 - Run as root if devices are not visible"
        );
        return ExitCode::FAILURE;
    }

    println!(
        "Found {touch_count} touch device(s).\n\n\
         Add the USB ID to your gestures.toml:\n\
         \x20 [device.<name>]\n\
         \x20 device_usb_id = \"<USB ID>\"\n\
         \x20 enabled = true"
    );
    ExitCode::SUCCESS
}
