//! Input model: pointer buttons, wheel deltas, and the gesture state machine.
//!
//! The controller consumes raw pointer/wheel events and emits [`Gesture`]s.
//! It never touches the viewport directly; the engine applies gestures to
//! [`crate::viewport::ViewportState`] and maps clicks through
//! [`crate::coords`]. Zoom gestures are honoured in every state, so a wheel
//! notch during a drag zooms without ending the drag.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use serde::{Deserialize, Serialize};

use crate::coords::Point;

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    /// Left mouse button (or single-finger touch).
    Primary,
    /// Middle mouse button (scroll wheel click).
    Middle,
    /// Right mouse button (or two-finger tap).
    Secondary,
}

impl Button {
    /// Buttons that start a pan drag.
    #[must_use]
    pub fn drags(self) -> bool {
        matches!(self, Self::Primary | Self::Middle)
    }
}

/// Wheel / trackpad scroll delta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelDelta {
    /// Horizontal scroll amount in pixels.
    pub dx: f64,
    /// Vertical scroll amount in pixels (positive = down = zoom out).
    pub dy: f64,
}

/// Gesture state between pointer-down and pointer-up.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// The user is panning by dragging.
    Dragging {
        /// Screen-space pointer position at pointer-down.
        origin: Point,
        /// Viewport translation at pointer-down.
        origin_translate: Point,
        /// Screen-space position of the most recent pointer event.
        last: Point,
    },
}

/// What the engine should do in response to an input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// Nothing to apply.
    None,
    /// Set translation to `origin_translate + offset`.
    DragTo { origin_translate: Point, offset: Point },
    /// Anchor-preserving zoom.
    Zoom { factor: f64, anchor: Point },
    /// A press/release with travel below the click threshold.
    Click(Point),
    /// The drag began (cursor feedback only).
    DragStarted,
    /// The drag ended without producing a click.
    DragEnded,
}

/// Tunables for [`InputController`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSettings {
    /// Fractional scale change per wheel notch.
    pub wheel_step: f64,
    /// Travel below which a press/release is a click, in screen pixels.
    pub click_threshold_px: f64,
    /// Whether double-click zooms; off where it would clash with zoom gestures.
    pub double_click_zoom: bool,
    /// Multiplier applied by a double-click zoom.
    pub double_click_factor: f64,
}

/// Pointer/wheel state machine. One per session display context.
#[derive(Debug, Clone)]
pub struct InputController {
    state: InputState,
    settings: InputSettings,
}

impl InputController {
    #[must_use]
    pub fn new(settings: InputSettings) -> Self {
        Self { state: InputState::Idle, settings }
    }

    #[must_use]
    pub fn state(&self) -> InputState {
        self.state
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, InputState::Dragging { .. })
    }

    /// `translate` is the viewport translation at the moment of the press.
    pub fn pointer_down(&mut self, at: Point, button: Button, translate: Point) -> Gesture {
        if !button.drags() || self.is_dragging() {
            return Gesture::None;
        }
        self.state = InputState::Dragging { origin: at, origin_translate: translate, last: at };
        Gesture::DragStarted
    }

    pub fn pointer_move(&mut self, at: Point) -> Gesture {
        match &mut self.state {
            InputState::Idle => Gesture::None,
            InputState::Dragging { origin, origin_translate, last } => {
                if *last == at {
                    return Gesture::None;
                }
                *last = at;
                Gesture::DragTo { origin_translate: *origin_translate, offset: at.offset_from(*origin) }
            }
        }
    }

    /// Re-anchor an active drag on `translate`, the viewport translation after
    /// a zoom or programmatic move committed mid-drag. The press position is
    /// kept so click detection still measures total travel.
    pub fn rebase(&mut self, translate: Point) {
        if let InputState::Dragging { origin, origin_translate, last } = &mut self.state {
            *origin_translate = Point::new(translate.x - (last.x - origin.x), translate.y - (last.y - origin.y));
        }
    }

    /// Release inside the viewer. Promotes to a click when travel is small.
    pub fn pointer_up(&mut self, at: Point) -> Gesture {
        let InputState::Dragging { origin, .. } = std::mem::take(&mut self.state) else {
            return Gesture::None;
        };
        if origin.distance_to(at) < self.settings.click_threshold_px {
            Gesture::Click(at)
        } else {
            Gesture::DragEnded
        }
    }

    /// Release outside the viewer, pointer cancel, or lost capture. Never a click.
    pub fn pointer_cancel(&mut self) -> Gesture {
        match std::mem::take(&mut self.state) {
            InputState::Idle => Gesture::None,
            InputState::Dragging { .. } => Gesture::DragEnded,
        }
    }

    /// Wheel up zooms in by one step, wheel down zooms out by its inverse.
    pub fn wheel(&self, at: Point, delta: WheelDelta) -> Gesture {
        if delta.dy == 0.0 || !delta.dy.is_finite() {
            return Gesture::None;
        }
        let step = 1.0 + self.settings.wheel_step;
        let factor = if delta.dy < 0.0 { step } else { 1.0 / step };
        Gesture::Zoom { factor, anchor: at }
    }

    /// Two-finger pinch; `ratio` is the change in finger spread since the last event.
    pub fn pinch(&self, center: Point, ratio: f64) -> Gesture {
        if !ratio.is_finite() || ratio <= 0.0 || ratio == 1.0 {
            return Gesture::None;
        }
        Gesture::Zoom { factor: ratio, anchor: center }
    }

    pub fn double_click(&self, at: Point) -> Gesture {
        if !self.settings.double_click_zoom {
            return Gesture::None;
        }
        Gesture::Zoom { factor: self.settings.double_click_factor, anchor: at }
    }
}
