//! Pointer-event state machine turning a raw touch stream into stroke,
//! hold, rotation and curve gesture callbacks.
//!
//! One detector instance is bound to one input source. All processing is
//! synchronous; the only deferred element is the hold timeout, modeled as
//! a deadline plus generation counter that the driving loop schedules (see
//! [`pending_hold`](StrokeGestureDetector::pending_hold)).

use std::f64::consts::PI;
use std::time::Duration;

use log::debug;
use strum::Display;

use crate::geometry::magnitude_squared;
use crate::tracker::{StrokeTracker, TrackerState};

/// Incremental movement below `touch_slop^2 / 32` counts as "holding still".
const HOLD_SLOP_DIVISOR: f64 = 32.0;

/// Pointer action kinds, following the usual touch-input vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    /// First pointer went down; starts a session.
    Down,
    Move,
    /// Last pointer lifted; ends the session.
    Up,
    /// Session aborted by the input source.
    Cancel,
    /// An additional pointer went down.
    PointerDown,
    /// A secondary pointer lifted; `x`/`y` carry the surviving pointer.
    PointerUp,
}

/// One pointer sample in view-local coordinates with a monotonic timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub action: PointerAction,
    pub x: f64,
    pub y: f64,
    /// Monotonic time of the sample; the origin is arbitrary but must be
    /// shared with the loop that schedules hold wakeups.
    pub time: Duration,
    /// Pointers down after this event (before it, for [`PointerAction::PointerUp`]).
    pub pointer_count: usize,
}

impl PointerEvent {
    pub fn new(action: PointerAction, x: f64, y: f64, time: Duration) -> Self {
        Self {
            action,
            x,
            y,
            time,
            pointer_count: 1,
        }
    }

    pub fn with_pointer_count(mut self, pointer_count: usize) -> Self {
        self.pointer_count = pointer_count;
        self
    }
}

/// Gesture callbacks. Every method has a no-op default so implementors
/// override only what they need. Boolean returns follow the platform
/// convention: `true` means the event was consumed.
pub trait StrokeGestureListener {
    /// Fired immediately for every down event; precedes everything else.
    fn on_down(&mut self, _ev: &PointerEvent) {}

    /// A stroke was confirmed. `index` counts strokes within the session;
    /// `(direction_x, direction_y)` is the pivot-to-point vector at the
    /// moment of confirmation.
    fn on_stroke_start(
        &mut self,
        _ev: &PointerEvent,
        _index: usize,
        _direction_x: f64,
        _direction_y: f64,
    ) -> bool {
        false
    }

    /// A qualifying move inside a confirmed stroke. `distance_x`/`_y` are
    /// the deltas since the previous sample, not since `start`.
    fn on_stroke_move(
        &mut self,
        _start: &PointerEvent,
        _ev: &PointerEvent,
        _distance_x: f64,
        _distance_y: f64,
    ) -> bool {
        false
    }

    /// The stroke that began at `start` ended, either by a direction turn
    /// or by the pointer lifting.
    fn on_stroke_end(&mut self, _start: &PointerEvent, _ev: &PointerEvent) -> bool {
        false
    }

    /// The pointer stayed nearly still for longer than the hold timeout.
    /// Returning `true` resets the detector to its initial state, which
    /// lets a hold toggle modes without aborting the session.
    fn on_hold(&mut self, _x: f64, _y: f64) -> bool {
        false
    }

    /// Fired for every up event unless a consumed single tap preceded it.
    fn on_up(&mut self, _ev: &PointerEvent) {}

    /// The session ended without any stroke or hold ever triggering.
    /// Returning `true` suppresses the trailing [`on_up`](Self::on_up).
    fn on_single_tap_up(&mut self, _ev: &PointerEvent) -> bool {
        false
    }

    fn on_rotate_start(&mut self, _ev: &PointerEvent) -> bool {
        false
    }

    /// `angle_radians` is the absolute pointer angle around the captured
    /// center; `diff` is the wraparound-corrected quantized step delta.
    fn on_rotate_move(&mut self, _ev: &PointerEvent, _angle_radians: f64, _diff: i32) -> bool {
        false
    }

    fn on_rotate_end(&mut self, _ev: &PointerEvent) -> bool {
        false
    }

    /// Consecutive displacement vectors still agree in direction.
    fn on_curve_smooth(&mut self, _ev: &PointerEvent) -> bool {
        false
    }

    /// The displacement vector flipped to oppose the previous one. Since
    /// post-reversal deltas agree with each other again, this fires once
    /// per reversal.
    fn on_curve_broken(&mut self, _ev: &PointerEvent) -> bool {
        false
    }
}

/// Gesture model a session starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum GestureMode {
    /// Turn-back strokes with the hold sub-state. The default.
    #[default]
    #[strum(serialize = "stroke")]
    Stroke,
    /// Quantized rotation around a center captured on the first move.
    #[strum(serialize = "rotate")]
    Rotate,
    /// Smooth/broken curve classification of consecutive displacements.
    #[strum(serialize = "curve")]
    Curve,
}

/// Tunables for [`StrokeGestureDetector`], with platform-flavored defaults.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Minimum displacement in pixels distinguishing a drag from noise.
    /// Default 8, the classic platform touch slop.
    pub touch_slop: f64,
    /// How long the pointer must stay nearly still before a hold fires.
    /// Default 500 ms, the classic long-press timeout.
    pub hold_timeout: Duration,
    pub hold_enabled: bool,
    /// Direction change in degrees that ends one stroke and starts the
    /// next. 90 by default; 60 makes turn detection more eager.
    pub turn_angle_deg: f64,
    /// Steps per full turn in rotation mode. Default 24.
    pub rotate_resolution: u32,
    pub initial_mode: GestureMode,
    /// Drop events while more than one pointer is down.
    pub ignore_multitouch: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            touch_slop: 8.0,
            hold_timeout: Duration::from_millis(500),
            hold_enabled: true,
            turn_angle_deg: 90.0,
            rotate_resolution: 24,
            initial_mode: GestureMode::Stroke,
            ignore_multitouch: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Turn,
    Stroke,
    RotateCenter,
    Rotate,
    CurveSmooth,
    CurveBroken,
}

/// The touch-event state machine.
///
/// Feed it every [`PointerEvent`] of a session through
/// [`on_event`](Self::on_event); callbacks arrive on the supplied listener.
pub struct StrokeGestureDetector<L> {
    listener: L,

    hold_slop_square: f64,
    hold_timeout: Duration,
    hold_enabled: bool,
    ignore_multitouch: bool,
    initial_mode: GestureMode,

    tracker: StrokeTracker,
    state: State,

    last_x: f64,
    last_y: f64,

    // hold sub-state
    waiting_for_hold: bool,
    hold_generation: u64,
    hold_deadline: Option<Duration>,

    // single tap
    is_single_tap: bool,

    // stroke
    stroke_start_event: Option<PointerEvent>,
    stroke_open: bool,
    stroke_index: usize,

    // rotation
    center_x: f64,
    center_y: f64,
    rotate_prev_value: i32,
    rotate_resolution: i32,
    rotate_scale: f64,

    // curve
    last_delta: Option<(f64, f64)>,
    min_length_for_curve: f64,
}

impl<L: StrokeGestureListener> StrokeGestureDetector<L> {
    pub fn new(config: DetectorConfig, listener: L) -> Self {
        assert!(
            config.rotate_resolution > 0,
            "rotation resolution must be positive"
        );
        let touch_slop_square = config.touch_slop * config.touch_slop;
        Self {
            listener,
            hold_slop_square: touch_slop_square / HOLD_SLOP_DIVISOR,
            hold_timeout: config.hold_timeout,
            hold_enabled: config.hold_enabled,
            ignore_multitouch: config.ignore_multitouch,
            initial_mode: config.initial_mode,
            tracker: StrokeTracker::new(config.touch_slop, config.turn_angle_deg),
            state: initial_state(config.initial_mode),
            last_x: 0.0,
            last_y: 0.0,
            waiting_for_hold: false,
            hold_generation: 0,
            hold_deadline: None,
            is_single_tap: false,
            stroke_start_event: None,
            stroke_open: false,
            stroke_index: 0,
            center_x: 0.0,
            center_y: 0.0,
            rotate_prev_value: 0,
            rotate_resolution: config.rotate_resolution as i32,
            rotate_scale: f64::from(config.rotate_resolution) / (2.0 * PI),
            last_delta: None,
            min_length_for_curve: touch_slop_square / 16.0,
        }
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    /// Consume the detector and hand back its listener.
    pub fn into_listener(self) -> L {
        self.listener
    }

    /// True while a confirmed stroke is open.
    pub fn is_stroking(&self) -> bool {
        self.stroke_open
    }

    /// Switch (back) to the stroke model, dropping any open stroke.
    pub fn stroke(&mut self) {
        self.stroke_open = false;
        self.stroke_start_event = None;
        self.tracker.touch_down(self.last_x, self.last_y);
        self.state = State::Turn;
    }

    /// Enter rotation mode with `resolution` steps per full turn. The next
    /// move captures the rotation center.
    ///
    /// Panics if `resolution` is zero.
    pub fn rotate(&mut self, resolution: u32) {
        assert!(resolution > 0, "rotation resolution must be positive");
        self.disarm_hold();
        self.stroke_open = false;
        self.stroke_start_event = None;
        self.rotate_resolution = resolution as i32;
        self.rotate_scale = f64::from(resolution) / (2.0 * PI);
        self.state = State::RotateCenter;
    }

    /// Enter curve mode: each subsequent move is classified as smooth or
    /// broken against the previous displacement.
    pub fn curve(&mut self) {
        self.disarm_hold();
        self.stroke_open = false;
        self.stroke_start_event = None;
        self.last_delta = None;
        self.state = State::CurveSmooth;
    }

    pub fn set_hold_enabled(&mut self, enabled: bool) {
        self.hold_enabled = enabled;
        if !enabled {
            self.disarm_hold();
        }
    }

    pub fn is_hold_enabled(&self) -> bool {
        self.hold_enabled
    }

    /// Pending hold wakeup as `(generation, deadline)`, if armed.
    ///
    /// The driving loop sleeps until `deadline` and then calls
    /// [`fire_hold`](Self::fire_hold) with the matching generation; any
    /// event processed in between re-keys the generation, so a stale
    /// wakeup is ignored.
    pub fn pending_hold(&self) -> Option<(u64, Duration)> {
        self.hold_deadline.map(|d| (self.hold_generation, d))
    }

    /// Fire the hold timer for `generation`. Returns `false` when the
    /// timer was disarmed or re-armed since the wakeup was scheduled.
    pub fn fire_hold(&mut self, generation: u64) -> bool {
        if !self.waiting_for_hold || generation != self.hold_generation {
            return false;
        }
        self.disarm_hold();
        self.is_single_tap = false;
        debug!("hold fired at {},{}", self.last_x, self.last_y);
        if self.listener.on_hold(self.last_x, self.last_y) {
            self.reset_session();
        }
        true
    }

    /// Analyze one pointer event and trigger the applicable callbacks.
    /// Returns whether the listener consumed the event; down events are
    /// always consumed so the move stream keeps flowing.
    pub fn on_event(&mut self, ev: &PointerEvent) -> bool {
        let x = ev.x;
        let y = ev.y;
        let mut handled = false;

        match ev.action {
            PointerAction::Down => {
                self.last_x = x;
                self.last_y = y;
                self.is_single_tap = true;
                self.stroke_index = 0;
                self.reset_session();
                if self.initial_mode == GestureMode::Stroke {
                    self.arm_hold(ev.time);
                }
                self.listener.on_down(ev);
                handled = true;
            }

            PointerAction::Move => {
                if self.ignore_multitouch && ev.pointer_count > 1 {
                    return false;
                }
                let dx = x - self.last_x;
                let dy = y - self.last_y;
                handled = match self.state {
                    State::Turn | State::Stroke => self.handle_stroke_move(ev, dx, dy),
                    State::RotateCenter => self.handle_rotate_center(ev),
                    State::Rotate => self.handle_rotate_move(ev),
                    State::CurveSmooth | State::CurveBroken => self.handle_curve_move(ev, dx, dy),
                };
                self.last_x = x;
                self.last_y = y;
            }

            PointerAction::Up => {
                self.disarm_hold();
                if self.is_single_tap {
                    handled = self.listener.on_single_tap_up(ev);
                    if !handled {
                        self.listener.on_up(ev);
                    }
                } else {
                    if self.stroke_open {
                        self.stroke_open = false;
                        if let Some(start) = self.stroke_start_event {
                            handled = self.listener.on_stroke_end(&start, ev);
                        }
                    } else if self.state == State::Rotate {
                        handled = self.listener.on_rotate_end(ev);
                    }
                    self.listener.on_up(ev);
                }
            }

            PointerAction::Cancel => {
                self.disarm_hold();
                self.is_single_tap = false;
                self.reset_session();
            }

            PointerAction::PointerDown => {
                if self.ignore_multitouch {
                    // multitouch began; freeze until we are back to one pointer
                    self.disarm_hold();
                }
            }

            PointerAction::PointerUp => {
                if self.ignore_multitouch && ev.pointer_count == 2 {
                    // back to a single pointer: keep continuity from the survivor
                    self.last_x = x;
                    self.last_y = y;
                }
            }
        }

        handled
    }

    fn handle_stroke_move(&mut self, ev: &PointerEvent, dx: f64, dy: f64) -> bool {
        let mut handled = false;
        match self.tracker.touch_move(ev.x, ev.y) {
            TrackerState::Turning => {
                if self.stroke_open {
                    self.stroke_open = false;
                    self.state = State::Turn;
                    debug!("stroke {} turned back", self.stroke_index);
                    if let Some(start) = self.stroke_start_event {
                        handled = self.listener.on_stroke_end(&start, ev);
                    }
                }
            }
            TrackerState::StrokeStart => {
                // a turn and the next stroke can land on the same sample
                if self.stroke_open {
                    if let Some(start) = self.stroke_start_event {
                        handled = self.listener.on_stroke_end(&start, ev);
                    }
                }
                self.stroke_open = true;
                self.state = State::Stroke;
                self.is_single_tap = false;
                self.stroke_start_event = Some(*ev);
                let (direction_x, direction_y) = self.tracker.stroke_start_direction();
                handled |=
                    self.listener
                        .on_stroke_start(ev, self.stroke_index, direction_x, direction_y);
                self.stroke_index += 1;
                self.arm_hold(ev.time);
            }
            TrackerState::StrokeMove => {
                if let Some(start) = self.stroke_start_event {
                    handled = self.listener.on_stroke_move(&start, ev, dx, dy);
                }
                // a settling pointer arms the hold timer, movement past the
                // (much smaller) hold slop cancels it again
                if self.hold_enabled {
                    if magnitude_squared(dx, dy) > self.hold_slop_square {
                        if self.waiting_for_hold {
                            self.disarm_hold();
                        }
                    } else if !self.waiting_for_hold {
                        self.arm_hold(ev.time);
                    }
                }
            }
        }

        handled
    }

    fn handle_rotate_center(&mut self, ev: &PointerEvent) -> bool {
        self.center_x = ev.x;
        self.center_y = ev.y;
        self.rotate_prev_value = 0;
        self.is_single_tap = false;
        self.state = State::Rotate;
        self.listener.on_rotate_start(ev)
    }

    fn handle_rotate_move(&mut self, ev: &PointerEvent) -> bool {
        let angle = (ev.y - self.center_y).atan2(ev.x - self.center_x);
        let value = (angle * self.rotate_scale) as i32;
        let mut diff = value - self.rotate_prev_value;
        let half = self.rotate_resolution / 2;
        if diff < -half {
            diff += self.rotate_resolution;
        } else if diff > half {
            diff -= self.rotate_resolution;
        }
        self.rotate_prev_value = value;
        self.listener.on_rotate_move(ev, angle, diff)
    }

    fn handle_curve_move(&mut self, ev: &PointerEvent, dx: f64, dy: f64) -> bool {
        // gate on the same jitter floor the stroke window uses
        if magnitude_squared(dx, dy) <= self.min_length_for_curve {
            return false;
        }
        let mut handled = false;
        if let Some((prev_dx, prev_dy)) = self.last_delta {
            self.is_single_tap = false;
            if prev_dx * dx + prev_dy * dy < 0.0 {
                // after a reversal the following deltas agree again, so
                // each flip reports broken exactly once
                self.state = State::CurveBroken;
                handled = self.listener.on_curve_broken(ev);
            } else {
                self.state = State::CurveSmooth;
                handled = self.listener.on_curve_smooth(ev);
            }
        }
        self.last_delta = Some((dx, dy));
        handled
    }

    /// Reset to the initial state of the configured mode, dropping any
    /// open stroke without an end callback.
    fn reset_session(&mut self) {
        self.stroke_open = false;
        self.stroke_start_event = None;
        self.last_delta = None;
        match self.initial_mode {
            GestureMode::Stroke => {
                self.tracker.touch_down(self.last_x, self.last_y);
                self.state = State::Turn;
            }
            GestureMode::Rotate => self.state = State::RotateCenter,
            GestureMode::Curve => self.state = State::CurveSmooth,
        }
    }

    fn arm_hold(&mut self, now: Duration) {
        if !self.hold_enabled {
            return;
        }
        self.waiting_for_hold = true;
        self.hold_generation += 1;
        self.hold_deadline = Some(now + self.hold_timeout);
    }

    fn disarm_hold(&mut self) {
        self.waiting_for_hold = false;
        self.hold_generation += 1;
        self.hold_deadline = None;
    }
}

fn initial_state(mode: GestureMode) -> State {
    match mode {
        GestureMode::Stroke => State::Turn,
        GestureMode::Rotate => State::RotateCenter,
        GestureMode::Curve => State::CurveSmooth,
    }
}
