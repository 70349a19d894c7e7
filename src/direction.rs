//! Standalone cumulative-direction reversal detection.
//!
//! Lighter than the stroke machinery: no hold, no stroke lifecycle, just a
//! callback whenever the drag direction reverses past a threshold angle.

use log::debug;

use crate::detector::{PointerAction, PointerEvent};
use crate::geometry::{magnitude_squared, signed_cosine_square, signed_cosine_square_of_degrees};

/// A new segment must not be shorter than a fifth (squared) of the
/// previous one, or the reversal is dismissed as jitter.
const LENGTH_THRESHOLD_FACTOR: f64 = 5.0;

/// Receiver for direction-change events.
///
/// `count` is 0 for the initial event fired at touch-down and increments
/// with every subsequent change; `angle_degrees` is the heading of the
/// completed segment.
pub trait DirectionChangeListener {
    fn on_direction_changed(&mut self, count: usize, angle_degrees: f64);
}

/// Closures work as listeners directly.
impl<F: FnMut(usize, f64)> DirectionChangeListener for F {
    fn on_direction_changed(&mut self, count: usize, angle_degrees: f64) {
        self(count, angle_degrees)
    }
}

/// Fires [`DirectionChangeListener::on_direction_changed`] each time the
/// cumulative drag direction reverses by more than the threshold angle.
///
/// Wraps a minimal tap/scroll recognizer: a drag begins once displacement
/// from the down point exceeds the touch slop; each scroll delta is then
/// compared against the anchored segment vector. On a reversal the anchor
/// moves to the current point. A drag flushes one final direction event on
/// up; a plain tap does not.
pub struct DirectionChangeDetector<L> {
    listener: L,
    threshold_cosine_square: f64,
    touch_slop_square: f64,

    start_x: f64,
    start_y: f64,
    last_x: f64,
    last_y: f64,
    turning_count: usize,
    last_length: f64,
    scrolling: bool,
    down: bool,
}

impl<L: DirectionChangeListener> DirectionChangeDetector<L> {
    /// `min_angle_degrees` is the reversal threshold (60 is the classic
    /// value); `touch_slop` gates the initial drag recognition.
    pub fn new(listener: L, min_angle_degrees: f64, touch_slop: f64) -> Self {
        Self {
            listener,
            threshold_cosine_square: signed_cosine_square_of_degrees(min_angle_degrees),
            touch_slop_square: touch_slop * touch_slop,
            start_x: 0.0,
            start_y: 0.0,
            last_x: 0.0,
            last_y: 0.0,
            turning_count: 0,
            last_length: 0.0,
            scrolling: false,
            down: false,
        }
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    /// Analyze one pointer event. Returns whether it was consumed.
    pub fn on_event(&mut self, ev: &PointerEvent) -> bool {
        match ev.action {
            PointerAction::Down => {
                self.down = true;
                self.scrolling = false;
                self.turning_count = 0;
                self.last_length = -1.0;
                self.start_x = ev.x;
                self.start_y = ev.y;
                self.last_x = ev.x;
                self.last_y = ev.y;
                self.fire(ev.x, ev.y);
                true
            }

            PointerAction::Move => {
                if !self.down {
                    return false;
                }
                if !self.scrolling {
                    let from_down =
                        magnitude_squared(ev.x - self.start_x, ev.y - self.start_y);
                    if from_down <= self.touch_slop_square {
                        self.last_x = ev.x;
                        self.last_y = ev.y;
                        return true;
                    }
                    self.scrolling = true;
                }
                let dx = ev.x - self.last_x;
                let dy = ev.y - self.last_y;
                let result =
                    signed_cosine_square(ev.x - self.start_x, ev.y - self.start_y, dx, dy);
                if result < self.threshold_cosine_square {
                    debug!("direction reversed at {},{}", ev.x, ev.y);
                    self.fire(ev.x, ev.y);
                    self.start_x = ev.x;
                    self.start_y = ev.y;
                }
                self.last_x = ev.x;
                self.last_y = ev.y;
                true
            }

            PointerAction::Up => {
                if !self.down {
                    return false;
                }
                self.down = false;
                if self.scrolling {
                    // flush the final segment
                    self.fire(ev.x, ev.y);
                }
                true
            }

            PointerAction::Cancel => {
                self.down = false;
                self.scrolling = false;
                true
            }

            PointerAction::PointerDown | PointerAction::PointerUp => false,
        }
    }

    fn fire(&mut self, x: f64, y: f64) {
        let vx = x - self.start_x;
        let vy = y - self.start_y;
        let length = magnitude_squared(vx, vy);
        if length * LENGTH_THRESHOLD_FACTOR > self.last_length {
            self.listener
                .on_direction_changed(self.turning_count, vy.atan2(vx).to_degrees());
            self.turning_count += 1;
            self.last_length = length;
        }
    }
}
