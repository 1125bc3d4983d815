//! Viewport state: scale, translation, and the zoom/pan/fit operations.
//!
//! Every operation is a pure function of the prior transform plus its input.
//! Invalid input (non-finite factors, empty viewports) leaves the state
//! untouched.

#[cfg(test)]
#[path = "viewport_test.rs"]
mod viewport_test;

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_SCALE, MIN_SCALE};
use crate::coords::{ContentSpace, Point, Size, ViewportTransform};

/// Inclusive bounds on `ViewportTransform::scale`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleLimits {
    pub min: f64,
    pub max: f64,
}

impl Default for ScaleLimits {
    fn default() -> Self {
        Self { min: MIN_SCALE, max: MAX_SCALE }
    }
}

impl ScaleLimits {
    #[must_use]
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn clamp(&self, scale: f64) -> f64 {
        scale.clamp(self.min, self.max)
    }

    #[must_use]
    pub fn contains(&self, scale: f64) -> bool {
        scale >= self.min && scale <= self.max
    }
}

/// Anchor-preserving zoom.
///
/// The content point under `anchor` before the change stays under it after.
/// Non-finite or non-positive factors, and zooming further at a limit,
/// return `transform` unchanged.
#[must_use]
pub fn zoomed(transform: ViewportTransform, limits: ScaleLimits, factor: f64, anchor: Point) -> ViewportTransform {
    if !factor.is_finite() || factor <= 0.0 {
        return transform;
    }
    let new_scale = limits.clamp(transform.scale * factor);
    if (new_scale - transform.scale).abs() <= f64::EPSILON * transform.scale {
        return transform;
    }
    let world = transform.screen_to_content(anchor);
    ViewportTransform {
        scale: new_scale,
        translate_x: anchor.x - world.x * new_scale,
        translate_y: anchor.y - world.y * new_scale,
    }
}

/// Translate by a screen-space delta. No clamping to content bounds.
#[must_use]
pub fn panned(transform: ViewportTransform, delta: Point) -> ViewportTransform {
    if !delta.x.is_finite() || !delta.y.is_finite() {
        return transform;
    }
    ViewportTransform {
        translate_x: transform.translate_x + delta.x,
        translate_y: transform.translate_y + delta.y,
        ..transform
    }
}

/// Scale the content to fit `viewport` times `margin`, centered.
///
/// Returns `None` when either size is empty.
#[must_use]
pub fn fitted(content: Size, viewport: Size, limits: ScaleLimits, margin: f64) -> Option<ViewportTransform> {
    if !content.is_positive() || !viewport.is_positive() {
        return None;
    }
    let raw = (viewport.width / content.width).min(viewport.height / content.height) * margin;
    let scale = limits.clamp(raw);
    Some(ViewportTransform {
        scale,
        translate_x: (viewport.width - content.width * scale) * 0.5,
        translate_y: (viewport.height - content.height * scale) * 0.5,
    })
}

/// Camera state for one session's display context.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportState {
    transform: ViewportTransform,
    limits: ScaleLimits,
    viewport: Size,
}

impl ViewportState {
    #[must_use]
    pub fn new(limits: ScaleLimits, viewport: Size) -> Self {
        Self { transform: ViewportTransform { scale: limits.clamp(1.0), ..ViewportTransform::default() }, limits, viewport }
    }

    #[must_use]
    pub fn transform(&self) -> ViewportTransform {
        self.transform
    }

    #[must_use]
    pub fn limits(&self) -> ScaleLimits {
        self.limits
    }

    #[must_use]
    pub fn viewport_size(&self) -> Size {
        self.viewport
    }

    pub fn set_viewport_size(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    /// Returns `true` if the transform changed.
    pub fn zoom(&mut self, factor: f64, anchor: Point) -> bool {
        self.commit(zoomed(self.transform, self.limits, factor, anchor))
    }

    /// Returns `true` if the transform changed.
    pub fn pan(&mut self, delta: Point) -> bool {
        self.commit(panned(self.transform, delta))
    }

    /// Pan relative to a translation captured at drag start.
    ///
    /// Avoids the drift that accumulating incremental deltas picks up when
    /// pointer events are coalesced.
    pub fn pan_from(&mut self, origin_translate: Point, offset: Point) -> bool {
        let base = ViewportTransform {
            translate_x: origin_translate.x,
            translate_y: origin_translate.y,
            ..self.transform
        };
        self.commit(panned(base, offset))
    }

    /// Returns `true` if the transform changed.
    pub fn fit_to_screen(&mut self, content: &ContentSpace, margin: f64) -> bool {
        match fitted(content.size(), self.viewport, self.limits, margin) {
            Some(t) => self.commit(t),
            None => false,
        }
    }

    /// Move the view so `content_point` sits at the viewport center, keeping scale.
    pub fn center_on(&mut self, content_point: Point) -> bool {
        let center = self.viewport.center();
        let t = ViewportTransform {
            translate_x: center.x - content_point.x * self.transform.scale,
            translate_y: center.y - content_point.y * self.transform.scale,
            ..self.transform
        };
        self.commit(t)
    }

    fn commit(&mut self, next: ViewportTransform) -> bool {
        if next == self.transform {
            return false;
        }
        self.transform = next;
        true
    }
}
