//! Overview minimap: the normalized rectangle of content currently in view,
//! and the inverse mapping from minimap clicks back to content points.

#[cfg(test)]
#[path = "minimap_test.rs"]
mod minimap_test;

use serde::{Deserialize, Serialize};

use crate::coords::{ContentSpace, Point, Size, ViewportTransform};

/// Visible region in normalized `[0,1]` content space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverviewRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Compute the overview indicator for the current view.
///
/// Extents are clamped to `[min_extent, 1]` so the indicator stays visible at
/// maximum zoom; origins are clamped to `[0, 1 - extent]` so it never leaves
/// the minimap.
#[must_use]
pub fn compute_overview_rect(
    transform: &ViewportTransform,
    content: &ContentSpace,
    viewport: Size,
    min_extent: f64,
) -> OverviewRect {
    let origin = transform.screen_to_content(Point::new(0.0, 0.0));
    let width = normalized_extent(viewport.width / transform.scale / content.width, min_extent);
    let height = normalized_extent(viewport.height / transform.scale / content.height, min_extent);
    OverviewRect {
        x: clamp_origin(origin.x / content.width, width),
        y: clamp_origin(origin.y / content.height, height),
        width,
        height,
    }
}

fn normalized_extent(raw: f64, min_extent: f64) -> f64 {
    let min_extent = min_extent.clamp(0.0, 1.0);
    if raw.is_finite() { raw.clamp(min_extent, 1.0) } else { 1.0 }
}

fn clamp_origin(raw: f64, extent: f64) -> f64 {
    if raw.is_finite() { raw.clamp(0.0, 1.0 - extent) } else { 0.0 }
}

/// Content-space point for a normalized minimap position.
#[must_use]
pub fn normalized_to_content(normalized: Point, content: &ContentSpace) -> Point {
    Point::new(normalized.x.clamp(0.0, 1.0) * content.width, normalized.y.clamp(0.0, 1.0) * content.height)
}

/// Frame-throttled overview recomputation.
///
/// Transform commits only mark the rectangle dirty; [`MinimapSync::sync`]
/// recomputes at most once per rendered frame.
#[derive(Debug, Clone)]
pub struct MinimapSync {
    min_extent: f64,
    dirty: bool,
    rect: Option<OverviewRect>,
}

impl MinimapSync {
    #[must_use]
    pub fn new(min_extent: f64) -> Self {
        Self { min_extent, dirty: true, rect: None }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn rect(&self) -> Option<OverviewRect> {
        self.rect
    }

    /// Recompute if dirty. Returns the new rectangle only when it changed.
    pub fn sync(
        &mut self,
        transform: &ViewportTransform,
        content: &ContentSpace,
        viewport: Size,
    ) -> Option<OverviewRect> {
        if !self.dirty || !viewport.is_positive() {
            return None;
        }
        self.dirty = false;
        let next = compute_overview_rect(transform, content, viewport, self.min_extent);
        if self.rect == Some(next) {
            return None;
        }
        self.rect = Some(next);
        Some(next)
    }
}
