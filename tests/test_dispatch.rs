//! Tests for `strokestr::dispatch` - Z/O mode resolution and increment
//! dispatch. The controller is driven directly through its listener
//! methods with synthetic stroke callbacks.

use std::time::Duration;

use strokestr::detector::{PointerAction, PointerEvent, StrokeGestureListener};
use strokestr::dispatch::{
    DispatchAction, DispatchMode, Dispatcher, StartMode, ZoConfig, ZoController,
};

// -- Recording sink -------------------------------------------

#[derive(Debug, Default)]
struct Sink {
    downs: usize,
    ups: usize,
    clicks: usize,
    moves: Vec<(DispatchMode, i32)>,
}

impl Dispatcher for Sink {
    fn on_down(&mut self) {
        self.downs += 1;
    }

    fn on_move(&mut self, mode: DispatchMode, value: i32) {
        self.moves.push((mode, value));
    }

    fn on_up(&mut self) {
        self.ups += 1;
    }

    fn on_click(&mut self) {
        self.clicks += 1;
    }
}

// -- Helpers --------------------------------------------------

fn controller(start_mode: StartMode) -> ZoController<Sink> {
    ZoController::new(
        Sink::default(),
        ZoConfig {
            start_mode,
            distance_threshold: 20.0,
            mode_decision_interval: Duration::from_millis(150),
        },
    )
}

fn ev(ms: u64) -> PointerEvent {
    PointerEvent::new(PointerAction::Move, 0.0, 0.0, Duration::from_millis(ms))
}

/// Shorthand: session down at t=0.
fn begin(c: &mut ZoController<Sink>) {
    let down = PointerEvent::new(PointerAction::Down, 0.0, 0.0, Duration::ZERO);
    c.on_down(&down);
}

fn values(c: &ZoController<Sink>) -> Vec<i32> {
    c.dispatcher().moves.iter().map(|&(_, v)| v).collect()
}

// -- Mode resolution ------------------------------------------

#[test]
fn test_fast_first_stroke_selects_z() {
    let mut c = controller(StartMode::Auto);
    begin(&mut c);
    c.on_stroke_start(&ev(100), 0, 0.0, 30.0);
    assert_eq!(c.mode(), DispatchMode::Z);
}

#[test]
fn test_slow_first_stroke_selects_o() {
    let mut c = controller(StartMode::Auto);
    begin(&mut c);
    c.on_stroke_start(&ev(400), 0, 0.0, 30.0);
    assert_eq!(c.mode(), DispatchMode::O);
}

#[test]
fn test_forced_z_ignores_timing() {
    let mut c = controller(StartMode::Z);
    begin(&mut c);
    c.on_stroke_start(&ev(2000), 0, 0.0, 30.0);
    assert_eq!(c.mode(), DispatchMode::Z);
}

#[test]
fn test_forced_o_ignores_timing() {
    let mut c = controller(StartMode::O);
    begin(&mut c);
    c.on_stroke_start(&ev(10), 0, 0.0, 30.0);
    assert_eq!(c.mode(), DispatchMode::O);
}

#[test]
fn test_down_resets_the_session() {
    let mut c = controller(StartMode::Auto);
    begin(&mut c);
    c.on_stroke_start(&ev(400), 0, 0.0, -30.0);
    assert_eq!(c.mode(), DispatchMode::O);
    // a new touch re-opens the decision window
    begin(&mut c);
    assert_eq!(c.direction(), 1);
    c.on_stroke_start(&ev(50), 0, 0.0, 30.0);
    assert_eq!(c.mode(), DispatchMode::Z);
    assert_eq!(c.dispatcher().downs, 2);
}

// -- Z mode ---------------------------------------------------

#[test]
fn test_z_sign_follows_first_vertical_direction() {
    let mut c = controller(StartMode::Z);
    begin(&mut c);
    c.on_stroke_start(&ev(10), 0, 5.0, -30.0);
    assert_eq!(c.direction(), -1);
    assert_eq!(values(&c), vec![-1]);
}

#[test]
fn test_z_dispatches_one_unit_per_stroke() {
    let mut c = controller(StartMode::Z);
    begin(&mut c);
    c.on_stroke_start(&ev(10), 0, 0.0, 30.0);
    c.on_stroke_end(&ev(10), &ev(60));
    // later strokes keep the sign the first one established
    c.on_stroke_start(&ev(80), 1, 0.0, -30.0);
    c.on_stroke_end(&ev(80), &ev(120));
    c.on_stroke_start(&ev(140), 2, 0.0, 30.0);
    assert_eq!(values(&c), vec![1, 1, 1]);
}

#[test]
fn test_z_ignores_stroke_moves() {
    let mut c = controller(StartMode::Z);
    begin(&mut c);
    c.on_stroke_start(&ev(10), 0, 0.0, 30.0);
    c.on_stroke_move(&ev(10), &ev(20), 15.0, 0.0);
    c.on_stroke_move(&ev(10), &ev(30), 15.0, 0.0);
    assert_eq!(values(&c), vec![1]);
}

// -- O mode ---------------------------------------------------

#[test]
fn test_o_accumulates_distance_with_carry() {
    // threshold 20: moves of 15+15+15 = 45 yield two units, remainder 5
    let mut c = controller(StartMode::O);
    begin(&mut c);
    c.on_stroke_start(&ev(10), 0, 30.0, 0.0);
    c.on_stroke_move(&ev(10), &ev(20), 15.0, 0.0);
    c.on_stroke_move(&ev(10), &ev(30), 15.0, 0.0);
    c.on_stroke_move(&ev(10), &ev(40), 15.0, 0.0);
    assert_eq!(values(&c), vec![0, 1, 1]);
    // the 5px remainder carries: one more 15px move crosses 20 again
    c.on_stroke_move(&ev(10), &ev(50), 15.0, 0.0);
    assert_eq!(values(&c), vec![0, 1, 1, 1]);
}

#[test]
fn test_o_uses_euclidean_length() {
    let mut c = controller(StartMode::O);
    begin(&mut c);
    c.on_stroke_start(&ev(10), 0, 30.0, 0.0);
    // 3-4-5 triangle: |(12, 16)| = 20 exactly
    c.on_stroke_move(&ev(10), &ev(20), 12.0, 16.0);
    assert_eq!(values(&c), vec![1]);
}

#[test]
fn test_o_flips_sign_on_each_turn_back() {
    let mut c = controller(StartMode::O);
    begin(&mut c);
    c.on_stroke_start(&ev(10), 0, 30.0, 0.0);
    c.on_stroke_move(&ev(10), &ev(20), 20.0, 0.0);
    c.on_stroke_end(&ev(10), &ev(30));
    c.on_stroke_start(&ev(30), 1, -30.0, 0.0);
    c.on_stroke_move(&ev(30), &ev(40), 20.0, 0.0);
    assert_eq!(values(&c), vec![1, -1]);
    assert_eq!(c.direction(), -1);
}

#[test]
fn test_o_resets_accumulator_at_stroke_start() {
    let mut c = controller(StartMode::O);
    begin(&mut c);
    c.on_stroke_start(&ev(10), 0, 30.0, 0.0);
    c.on_stroke_move(&ev(10), &ev(20), 15.0, 0.0);
    c.on_stroke_start(&ev(30), 1, -30.0, 0.0);
    // the 15px from the previous stroke must not leak into this one
    c.on_stroke_move(&ev(30), &ev(40), 15.0, 0.0);
    assert_eq!(values(&c), vec![0, 0]);
}

// -- Hold -----------------------------------------------------

#[test]
fn test_hold_mid_stroke_flips_z_direction() {
    let mut c = controller(StartMode::Z);
    begin(&mut c);
    c.on_stroke_start(&ev(10), 0, 0.0, 30.0);
    assert!(c.on_hold(5.0, 5.0));
    assert_eq!(c.direction(), -1);
    c.on_stroke_start(&ev(700), 1, 0.0, 30.0);
    assert_eq!(values(&c), vec![1, -1]);
}

#[test]
fn test_hold_at_rest_switches_to_o() {
    let mut c = controller(StartMode::Z);
    begin(&mut c);
    assert!(c.on_hold(0.0, 0.0));
    assert_eq!(c.mode(), DispatchMode::O);
}

#[test]
fn test_hold_in_o_mode_is_not_handled() {
    let mut c = controller(StartMode::O);
    begin(&mut c);
    assert!(!c.on_hold(0.0, 0.0));
    assert_eq!(c.mode(), DispatchMode::O);
}

#[test]
fn test_hold_preempts_auto_decision() {
    let mut c = controller(StartMode::Auto);
    begin(&mut c);
    assert!(c.on_hold(0.0, 0.0));
    assert_eq!(c.mode(), DispatchMode::O);
    // a fast stroke afterwards must not flip the session back to Z
    c.on_stroke_start(&ev(100), 0, 0.0, 30.0);
    assert_eq!(c.mode(), DispatchMode::O);
}

// -- Taps and ups ---------------------------------------------

#[test]
fn test_single_tap_clicks() {
    let mut c = controller(StartMode::Auto);
    begin(&mut c);
    c.on_single_tap_up(&ev(50));
    assert_eq!(c.dispatcher().clicks, 1);
    assert!(c.dispatcher().moves.is_empty());
}

#[test]
fn test_up_reaches_the_sink() {
    let mut c = controller(StartMode::Auto);
    begin(&mut c);
    c.on_up(&ev(80));
    assert_eq!(c.dispatcher().ups, 1);
}

// -- Enum names -----------------------------------------------

#[test]
fn test_mode_names() {
    assert_eq!(DispatchMode::Z.to_string(), "z");
    assert_eq!(DispatchMode::O.to_string(), "o");
    assert_eq!("auto".parse::<StartMode>(), Ok(StartMode::Auto));
    assert_eq!("o".parse::<StartMode>(), Ok(StartMode::O));
    assert!("zo".parse::<StartMode>().is_err());
}

#[test]
fn test_dispatch_action_names() {
    let expected = [
        (DispatchAction::Increment, "increment"),
        (DispatchAction::Decrement, "decrement"),
        (DispatchAction::Click, "click"),
        (DispatchAction::Turn, "turn"),
    ];
    for (action, name) in expected {
        let s: &str = action.into();
        assert_eq!(s, name);
        assert_eq!(name.parse::<DispatchAction>(), Ok(action));
    }
}
