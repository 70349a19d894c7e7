//! Z/O mode classification and signed increment dispatch.
//!
//! Sits on top of the stroke callbacks and decides, per touch session,
//! whether the user meant a discrete "Z" zig-zag (one increment per
//! stroke) or a continuous "O" drag (distance accumulates into
//! increments), then forwards signed values to a [`Dispatcher`] sink.

use std::time::Duration;

use log::debug;
use strum::{Display, EnumString, IntoStaticStr};

use crate::detector::{PointerEvent, StrokeGestureListener};

/// How increments are produced within a touch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum DispatchMode {
    /// Discrete: each stroke is one increment.
    #[strum(serialize = "z")]
    Z,
    /// Continuous: dragged distance accumulates into increments.
    #[strum(serialize = "o")]
    O,
}

/// Session start mode: forced Z or O, or inferred from timing.
///
/// With `Auto`, a first stroke confirmed within the mode-decision interval
/// of touch-down reads as a deliberate flick (Z); a slower start reads as
/// the beginning of a circular drag (O).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, IntoStaticStr)]
pub enum StartMode {
    #[default]
    #[strum(serialize = "auto")]
    Auto,
    #[strum(serialize = "z")]
    Z,
    #[strum(serialize = "o")]
    O,
}

/// Sink-level actions a gesture session can trigger, keyed in the config
/// `gestures` tables by their serialized names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum DispatchAction {
    #[strum(serialize = "increment")]
    Increment,
    #[strum(serialize = "decrement")]
    Decrement,
    #[strum(serialize = "click")]
    Click,
    #[strum(serialize = "turn")]
    Turn,
}

/// UI sink for classified gesture values. Values carry their sign; `0`
/// values occur on sub-threshold O-mode moves and may be ignored.
pub trait Dispatcher {
    fn on_down(&mut self) {}
    fn on_move(&mut self, mode: DispatchMode, value: i32);
    fn on_up(&mut self) {}
    fn on_click(&mut self) {}
}

/// Tunables for [`ZoController`].
#[derive(Debug, Clone)]
pub struct ZoConfig {
    pub start_mode: StartMode,
    /// O-mode pixels of stroke length per dispatched unit. Default 20.
    pub distance_threshold: f64,
    /// Auto-mode window after touch-down within which a first stroke
    /// selects Z. Default 150 ms.
    pub mode_decision_interval: Duration,
}

impl Default for ZoConfig {
    fn default() -> Self {
        Self {
            start_mode: StartMode::Auto,
            distance_threshold: 20.0,
            mode_decision_interval: Duration::from_millis(150),
        }
    }
}

/// Maps stroke callbacks to signed Z/O increments on a [`Dispatcher`].
///
/// Z mode: stroke 0's vertical direction fixes the sign, then every stroke
/// start dispatches one unit. O mode: stroke length accumulates and every
/// whole `distance_threshold` dispatches one unit, sign flipping at each
/// turn-back; the sub-threshold remainder carries over to the next move.
/// A hold mid-stroke flips the Z direction; a hold while resting switches
/// the session to O mode.
pub struct ZoController<D> {
    dispatcher: D,
    start_mode: StartMode,
    distance_threshold: f64,
    mode_decision_interval: Duration,

    mode: DispatchMode,
    direction: i32,
    distance_sum: f64,
    down_time: Option<Duration>,
    stroking: bool,
}

impl<D: Dispatcher> ZoController<D> {
    pub fn new(dispatcher: D, config: ZoConfig) -> Self {
        Self {
            dispatcher,
            start_mode: config.start_mode,
            distance_threshold: config.distance_threshold,
            mode_decision_interval: config.mode_decision_interval,
            mode: initial_dispatch_mode(config.start_mode),
            direction: 1,
            distance_sum: 0.0,
            down_time: None,
            stroking: false,
        }
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    /// Mode the current (or last) session resolved to.
    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Current increment sign, `1` or `-1`.
    pub fn direction(&self) -> i32 {
        self.direction
    }
}

fn initial_dispatch_mode(start_mode: StartMode) -> DispatchMode {
    match start_mode {
        // Auto stays Z until the first stroke (or a hold) proves otherwise.
        StartMode::Auto | StartMode::Z => DispatchMode::Z,
        StartMode::O => DispatchMode::O,
    }
}

impl<D: Dispatcher> StrokeGestureListener for ZoController<D> {
    fn on_down(&mut self, ev: &PointerEvent) {
        self.down_time = match self.start_mode {
            StartMode::Auto => Some(ev.time),
            _ => None,
        };
        self.mode = initial_dispatch_mode(self.start_mode);
        self.direction = 1;
        self.distance_sum = 0.0;
        self.stroking = false;
        self.dispatcher.on_down();
    }

    fn on_stroke_start(
        &mut self,
        ev: &PointerEvent,
        index: usize,
        _direction_x: f64,
        direction_y: f64,
    ) -> bool {
        if index == 0 {
            if let Some(down_time) = self.down_time.take() {
                self.mode = if ev.time.saturating_sub(down_time) < self.mode_decision_interval {
                    DispatchMode::Z
                } else {
                    DispatchMode::O
                };
                debug!("session resolved to {} mode", self.mode);
            }
        }
        self.stroking = true;

        match self.mode {
            DispatchMode::Z => {
                if index == 0 {
                    self.direction = if direction_y > 0.0 { 1 } else { -1 };
                }
                self.dispatcher.on_move(DispatchMode::Z, self.direction);
            }
            DispatchMode::O => {
                self.distance_sum = 0.0;
                if index > 0 {
                    self.direction = -self.direction;
                }
            }
        }
        false
    }

    fn on_stroke_move(
        &mut self,
        _start: &PointerEvent,
        _ev: &PointerEvent,
        distance_x: f64,
        distance_y: f64,
    ) -> bool {
        if self.mode == DispatchMode::O {
            self.distance_sum += distance_x.hypot(distance_y);
            let diff = (self.distance_sum / self.distance_threshold) as i32;
            self.distance_sum %= self.distance_threshold;
            self.dispatcher.on_move(DispatchMode::O, self.direction * diff);
        }
        false
    }

    fn on_stroke_end(&mut self, _start: &PointerEvent, _ev: &PointerEvent) -> bool {
        self.stroking = false;
        false
    }

    fn on_hold(&mut self, _x: f64, _y: f64) -> bool {
        match self.mode {
            DispatchMode::Z => {
                if self.stroking {
                    // mid-stroke hold flips the sign and the stroke restarts
                    self.direction = -self.direction;
                    self.stroking = false;
                } else {
                    self.mode = DispatchMode::O;
                    self.down_time = None;
                    debug!("hold switched session to o mode");
                }
                true
            }
            DispatchMode::O => false,
        }
    }

    fn on_up(&mut self, _ev: &PointerEvent) {
        self.stroking = false;
        self.dispatcher.on_up();
    }

    fn on_single_tap_up(&mut self, _ev: &PointerEvent) -> bool {
        self.dispatcher.on_click();
        false
    }
}
