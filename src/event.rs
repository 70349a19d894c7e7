//! Touch event classification and frame assembly - no I/O, no hardware,
//! fully testable.
//!
//! This module turns the raw evdev multi-touch protocol into the
//! [`PointerEvent`]s the detectors consume: classification of relevant
//! `evdev::InputEvent`s into a device-independent [`TouchEvent`] IR, and a
//! [`FrameAssembler`] that folds the IR into one pointer action per
//! `SYN_REPORT` frame. Everything here is deterministic and side-effect
//! free.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::GestureConfig;
use crate::detector::{PointerAction, PointerEvent};
use crate::dispatch::DispatchAction;

/// Highest multi-touch slot tracked; events for slots beyond this are
/// folded into the last one.
const MAX_SLOTS: usize = 10;

// -- TouchEvent -----------------------------------------------

/// Intermediate representation of a relevant touch event,
/// decoupled from `evdev` types for testability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TouchEvent {
    Slot(usize),
    PositionX(f64),
    PositionY(f64),
    TrackingId(i32),
    FingerUp,
    SynReport,
}

/// Classify a single `evdev::InputEvent` into one of the touch-relevant
/// categories the assembler cares about. Returns `None` for irrelevant
/// events.
pub fn classify_event(event: &evdev::InputEvent) -> Option<TouchEvent> {
    use evdev::{AbsoluteAxisType, InputEventKind};

    match event.kind() {
        InputEventKind::AbsAxis(axis) => match axis {
            AbsoluteAxisType::ABS_MT_SLOT => {
                Some(TouchEvent::Slot(event.value().max(0) as usize))
            }
            AbsoluteAxisType::ABS_MT_POSITION_X => {
                Some(TouchEvent::PositionX(event.value() as f64))
            }
            AbsoluteAxisType::ABS_MT_POSITION_Y => {
                Some(TouchEvent::PositionY(event.value() as f64))
            }
            AbsoluteAxisType::ABS_MT_TRACKING_ID => {
                if event.value() == -1 {
                    Some(TouchEvent::FingerUp)
                } else {
                    Some(TouchEvent::TrackingId(event.value()))
                }
            }
            _ => None,
        },
        InputEventKind::Synchronization(evdev::Synchronization::SYN_REPORT) => {
            Some(TouchEvent::SynReport)
        }
        _ => None,
    }
}

// -- FrameAssembler -------------------------------------------

#[derive(Debug, Clone, Copy)]
struct SlotState {
    tracking_id: i32, // -1 = inactive
    x: f64,
    y: f64,
}

impl Default for SlotState {
    fn default() -> Self {
        Self {
            tracking_id: -1,
            x: 0.0,
            y: 0.0,
        }
    }
}

/// Folds a [`TouchEvent`] stream into [`PointerEvent`] frames.
///
/// Per-slot positions and tracking ids accumulate until a
/// [`TouchEvent::SynReport`], which emits at most one pointer action: the
/// first contact is a down, additional contacts pointer-downs, losing a
/// secondary contact a pointer-up (carrying the surviving pointer for
/// continuity), losing the last an up, and a primary position change a
/// move. Frames where nothing relevant changed emit nothing.
#[derive(Debug)]
pub struct FrameAssembler {
    slots: [SlotState; MAX_SLOTS],
    current_slot: usize,
    last_count: usize,
    primary: Option<usize>,
    primary_pos: (f64, f64),
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            slots: [SlotState::default(); MAX_SLOTS],
            current_slot: 0,
            last_count: 0,
            primary: None,
            primary_pos: (0.0, 0.0),
        }
    }

    /// Forget all contact state, e.g. after a device reconnect.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Feed one classified event stamped with `time`; any completed frame
    /// is appended to `out`.
    pub fn push(&mut self, event: &TouchEvent, time: Duration, out: &mut Vec<PointerEvent>) {
        match *event {
            TouchEvent::Slot(slot) => self.current_slot = slot.min(MAX_SLOTS - 1),
            TouchEvent::TrackingId(id) => self.slots[self.current_slot].tracking_id = id,
            TouchEvent::FingerUp => self.slots[self.current_slot].tracking_id = -1,
            TouchEvent::PositionX(x) => self.slots[self.current_slot].x = x,
            TouchEvent::PositionY(y) => self.slots[self.current_slot].y = y,
            TouchEvent::SynReport => self.sync(time, out),
        }
    }

    fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.tracking_id != -1).count()
    }

    fn lowest_active(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.tracking_id != -1)
    }

    fn sync(&mut self, time: Duration, out: &mut Vec<PointerEvent>) {
        let count = self.active_count();
        let last = self.last_count;

        if last == 0 && count > 0 {
            if let Some(slot) = self.lowest_active() {
                let s = self.slots[slot];
                self.primary = Some(slot);
                self.primary_pos = (s.x, s.y);
                out.push(
                    PointerEvent::new(PointerAction::Down, s.x, s.y, time)
                        .with_pointer_count(count),
                );
            }
        } else if last > 0 && count == 0 {
            self.primary = None;
            out.push(PointerEvent::new(
                PointerAction::Up,
                self.primary_pos.0,
                self.primary_pos.1,
                time,
            ));
        } else if count > last {
            if let Some(slot) = self.primary {
                let s = self.slots[slot];
                self.primary_pos = (s.x, s.y);
                out.push(
                    PointerEvent::new(PointerAction::PointerDown, s.x, s.y, time)
                        .with_pointer_count(count),
                );
            }
        } else if count < last {
            // a secondary contact lifted; the primary may need re-resolving
            if self
                .primary
                .is_none_or(|slot| self.slots[slot].tracking_id == -1)
            {
                self.primary = self.lowest_active();
            }
            if let Some(slot) = self.primary {
                let s = self.slots[slot];
                self.primary_pos = (s.x, s.y);
                // pointer_count carries the population before the lift
                out.push(
                    PointerEvent::new(PointerAction::PointerUp, s.x, s.y, time)
                        .with_pointer_count(last),
                );
            }
        } else if count > 0 {
            if let Some(slot) = self.primary {
                let s = self.slots[slot];
                if (s.x, s.y) != self.primary_pos {
                    self.primary_pos = (s.x, s.y);
                    out.push(
                        PointerEvent::new(PointerAction::Move, s.x, s.y, time)
                            .with_pointer_count(count),
                    );
                }
            }
        }

        self.last_count = count;
    }
}

/// Feed a sequence of [`TouchEvent`]s stamped with one time into an
/// assembler and collect the pointer frames that complete. Batched
/// sub-samples come out in order, one frame per `SynReport`.
pub fn assemble_touch_events(
    assembler: &mut FrameAssembler,
    events: &[TouchEvent],
    time: Duration,
) -> Vec<PointerEvent> {
    let mut out = Vec::new();
    for event in events {
        assembler.push(event, time, &mut out);
    }
    out
}

// -- Helpers --------------------------------------------------

/// Parse a USB vendor:product ID string into `(vendor, product)`.
///
/// Accepts formats like `"1234:5678"` or `"USB:1234:5678"` (case-insensitive).
/// Returns `None` if the format is invalid or the hex values cannot be parsed.
pub fn parse_usb_id(raw: &str) -> Option<(u16, u16)> {
    let cleaned = raw.to_lowercase().replace("usb:", "");
    let (vendor_str, product_str) = cleaned.split_once(':')?;
    let vendor = u16::from_str_radix(vendor_str, 16).ok()?;
    let product = u16::from_str_radix(product_str, 16).ok()?;
    Some((vendor, product))
}

/// Look up the action string for a dispatch action in the device config.
///
/// Returns `Some(action)` if the gesture is configured, enabled, and has an action.
pub fn resolve_action(
    action: DispatchAction,
    gestures: &HashMap<String, GestureConfig>,
) -> Option<&str> {
    let gesture_name: &str = action.into();
    gestures
        .get(gesture_name)
        .filter(|gc| gc.enabled)
        .and_then(|gc| gc.action.as_deref())
}
