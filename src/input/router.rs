//! Device input to logical coordinates and puppet actions.

use smallvec::SmallVec;

use crate::foundation::core::Point;
use crate::transform::view::ViewTransform;

/// Wheel zoom step.
pub const WHEEL_ZOOM_STEP: f64 = 0.10;
/// Pinch zoom step per move event.
pub const PINCH_ZOOM_STEP: f64 = 0.025;

/// Host input event in device pixels relative to the drawing surface.
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    PointerLeave,
    /// Positive `delta_y` scrolls down (zoom out).
    Wheel { x: f64, y: f64, delta_y: f64 },
    TouchStart { points: SmallVec<[Point; 2]> },
    TouchMove { points: SmallVec<[Point; 2]> },
    TouchEnd { points: SmallVec<[Point; 2]> },
}

/// What the stage should do in response to an event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputAction {
    /// Tap at a logical point; the stage hit-tests the puppet.
    Tap { x: f64, y: f64 },
    /// New gaze target in `[-1, 1]` on both axes. `(0, 0)` looks to the front.
    Gaze { x: f64, y: f64 },
    /// A zoom gesture just reached the min or max view scale.
    ScaleLimitReached,
}

pub type InputActions = SmallVec<[InputAction; 2]>;

/// Stateful pointer/touch interpreter.
#[derive(Clone, Debug, Default)]
pub struct InputRouter {
    pressed: bool,
    pinch_distance: Option<f64>,
    detached: bool,
}

impl InputRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop reacting to events. Permanent.
    pub fn detach(&mut self) {
        self.detached = true;
        self.pressed = false;
        self.pinch_distance = None;
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Interpret `event`, zooming `view` when the event is a zoom gesture.
    pub fn handle(&mut self, event: &InputEvent, view: &mut ViewTransform) -> InputActions {
        let mut out = InputActions::new();
        if self.detached {
            return out;
        }
        match event {
            InputEvent::PointerDown { x, y } => {
                self.pressed = true;
                let (lx, ly) = to_logical(view, *x, *y);
                out.push(InputAction::Tap { x: lx, y: ly });
            }
            InputEvent::PointerMove { x, y } => {
                if self.pressed {
                    out.push(gaze_at(view, *x, *y));
                }
            }
            InputEvent::PointerUp { .. } | InputEvent::PointerLeave => {
                self.pressed = false;
                out.push(InputAction::Gaze { x: 0.0, y: 0.0 });
            }
            InputEvent::Wheel { x, y, delta_y } => {
                if *delta_y == 0.0 || !delta_y.is_finite() {
                    return out;
                }
                let factor = if *delta_y < 0.0 {
                    1.0 + WHEEL_ZOOM_STEP
                } else {
                    1.0 - WHEEL_ZOOM_STEP
                };
                zoom(view, *x, *y, factor, &mut out);
            }
            InputEvent::TouchStart { points } => match points.as_slice() {
                [p] => {
                    self.pressed = true;
                    self.pinch_distance = None;
                    let (lx, ly) = to_logical(view, p.x, p.y);
                    out.push(InputAction::Tap { x: lx, y: ly });
                }
                [a, b, ..] => {
                    self.pressed = false;
                    self.pinch_distance = Some(a.distance(*b));
                }
                [] => {}
            },
            InputEvent::TouchMove { points } => match points.as_slice() {
                [p] => {
                    if self.pressed {
                        out.push(gaze_at(view, p.x, p.y));
                    }
                }
                [a, b, ..] => {
                    let d = a.distance(*b);
                    if let Some(prev) = self.pinch_distance
                        && d != prev
                    {
                        let factor = if d > prev {
                            1.0 + PINCH_ZOOM_STEP
                        } else {
                            1.0 - PINCH_ZOOM_STEP
                        };
                        let mid = a.midpoint(*b);
                        zoom(view, mid.x, mid.y, factor, &mut out);
                    }
                    self.pinch_distance = Some(d);
                }
                [] => {}
            },
            InputEvent::TouchEnd { points } => {
                if points.len() < 2 {
                    self.pinch_distance = None;
                }
                if points.is_empty() {
                    self.pressed = false;
                    out.push(InputAction::Gaze { x: 0.0, y: 0.0 });
                }
            }
        }
        out
    }
}

fn to_logical(view: &ViewTransform, x: f64, y: f64) -> (f64, f64) {
    (view.invert_transform_x(x), view.invert_transform_y(y))
}

fn gaze_at(view: &ViewTransform, x: f64, y: f64) -> InputAction {
    let (lx, ly) = to_logical(view, x, y);
    InputAction::Gaze {
        x: lx.clamp(-1.0, 1.0),
        y: ly.clamp(-1.0, 1.0),
    }
}

fn zoom(view: &mut ViewTransform, x: f64, y: f64, factor: f64, out: &mut InputActions) {
    // Anchor in view space: logical point after the current scale/translation.
    let (lx, ly) = to_logical(view, x, y);
    let (tx, ty) = view.translation();
    let (cx, cy) = (lx * view.scale() + tx, ly * view.scale() + ty);
    let at_limit = |v: &ViewTransform| {
        if factor > 1.0 {
            v.is_max_scale()
        } else {
            v.is_min_scale()
        }
    };
    let was_at_limit = at_limit(view);
    view.adjust_scale(cx, cy, factor);
    // Only the event that reaches the limit reports it.
    if !was_at_limit && at_limit(view) {
        out.push(InputAction::ScaleLimitReached);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/input/router.rs"]
mod tests;
