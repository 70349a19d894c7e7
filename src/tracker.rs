//! Sliding-window stroke classification over a live touch-point stream.

use strum::{Display, IntoStaticStr};

use crate::buffer::RecentBuffer;
use crate::geometry::{NEUTRAL_COSINE, Point, Vector, signed_cosine_square_of_degrees};

/// Number of window points used for the turn test. The window spans
/// `(MIN_POINTS_FOR_VECTOR - 1) * 2` buffered samples, so the two compared
/// segments are each two samples long.
const MIN_POINTS_FOR_VECTOR: usize = 3;

/// Classification of the latest touch point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum TrackerState {
    /// Direction just changed (or the drag just began); waiting for enough
    /// displacement from the pivot to call it a stroke.
    #[strum(serialize = "turning")]
    Turning,
    /// The displacement from the pivot crossed the stroke threshold with
    /// this point. Reported exactly once per stroke.
    #[strum(serialize = "stroke_start")]
    StrokeStart,
    /// Inside a confirmed stroke.
    #[strum(serialize = "stroke_move")]
    StrokeMove,
}

/// Classifies a stream of touch points into stroke segments, detecting when
/// the drag direction reverses sharply enough to start a new stroke.
///
/// Feed it [`touch_down`](StrokeTracker::touch_down) once per session and
/// [`touch_move`](StrokeTracker::touch_move) for every subsequent sample.
#[derive(Debug)]
pub struct StrokeTracker {
    /// Segments shorter (squared) than this are too noisy for angle tests.
    min_length_for_vector: f64,
    /// Squared displacement from the pivot that confirms a stroke.
    min_length_for_stroke: f64,
    /// Signed cosine-square below which a turn is declared.
    new_stroke_threshold: f64,

    points: RecentBuffer<Point>,
    v1: Vector,
    v2: Vector,

    turning_point: Point,
    stroke_start: Vector,

    state: TrackerState,
    cosine_square_angle: f64,
}

impl StrokeTracker {
    /// `touch_slop` is the platform slop distance in pixels; stroke
    /// confirmation requires `touch_slop^2` of displacement while the angle
    /// test stays sensitive down to a sixteenth of that. `turn_angle_deg`
    /// is the direction change that splits two strokes (90 is the classic
    /// value; 60 turns earlier).
    pub fn new(touch_slop: f64, turn_angle_deg: f64) -> Self {
        let min_length_for_stroke = touch_slop * touch_slop;
        Self {
            min_length_for_vector: min_length_for_stroke / 16.0,
            min_length_for_stroke,
            new_stroke_threshold: signed_cosine_square_of_degrees(turn_angle_deg),
            points: RecentBuffer::new(MIN_POINTS_FOR_VECTOR * 2 - 1),
            v1: Vector::default(),
            v2: Vector::default(),
            turning_point: Point::default(),
            stroke_start: Vector::default(),
            state: TrackerState::Turning,
            cosine_square_angle: NEUTRAL_COSINE,
        }
    }

    /// Start a new session at `(x, y)`: history is cleared, the pivot is
    /// seeded and the state returns to [`TrackerState::Turning`].
    pub fn touch_down(&mut self, x: f64, y: f64) {
        self.v1.clear();
        self.v2.clear();
        self.stroke_start.clear();

        self.points.clear();
        self.points.obtain().set(x, y);

        self.turning_point.set(x, y);
        self.cosine_square_angle = NEUTRAL_COSINE;
        self.state = TrackerState::Turning;
    }

    /// Record one move sample and classify it.
    ///
    /// A turn is declared when the two window segments disagree by more
    /// than the configured angle; the pivot then moves to the window
    /// midpoint and the pre-turn samples are dropped, so the same point
    /// can immediately confirm the next stroke.
    pub fn touch_move(&mut self, x: f64, y: f64) -> TrackerState {
        self.points.obtain().set(x, y);

        let newest = self.points.get(0).copied();
        let mid = self.points.get(MIN_POINTS_FOR_VECTOR - 1).copied();
        let oldest = self.points.get((MIN_POINTS_FOR_VECTOR - 1) * 2).copied();

        let mut cosine_square = NEUTRAL_COSINE;
        self.v1.check_and_set(oldest, mid, self.min_length_for_vector);
        if self.v2.check_and_set(mid, newest, self.min_length_for_vector) {
            cosine_square = self.v1.cosine_square(&self.v2);
            if cosine_square < self.new_stroke_threshold {
                if let Some(pivot) = mid {
                    self.turning_point = pivot;
                }
                // drop the pre-turn samples, keep pivot..newest
                self.points.remove_since(MIN_POINTS_FOR_VECTOR);
                self.v1.clear();
                self.state = TrackerState::Turning;
            }
        }
        self.cosine_square_angle = cosine_square;

        match self.state {
            TrackerState::Turning => {
                let confirmed = self.stroke_start.check_and_set(
                    Some(self.turning_point),
                    newest,
                    self.min_length_for_stroke,
                );
                if confirmed {
                    self.state = TrackerState::StrokeStart;
                }
            }
            TrackerState::StrokeStart => self.state = TrackerState::StrokeMove,
            TrackerState::StrokeMove => {}
        }
        self.state
    }

    /// Classification of the latest sample.
    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Signed cosine-square between the latest window segments, for
    /// diagnostics and visualization. [`NEUTRAL_COSINE`] when the latest
    /// sample produced no valid segment pair.
    pub fn cosine_square_angle(&self) -> f64 {
        self.cosine_square_angle
    }

    /// Direction of the current stroke, as the pivot-to-point vector
    /// captured at the moment the stroke was confirmed.
    pub fn stroke_start_direction(&self) -> (f64, f64) {
        (self.stroke_start.x, self.stroke_start.y)
    }
}
