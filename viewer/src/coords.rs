//! Coordinate mapping between screen, content, and source-document space.
//!
//! Screen space is CSS pixels on the viewer surface. Content space is the
//! pixel grid of the fully rendered base image. Source-document space is the
//! original page's units, recovered through [`ContentSpace::scaling_factor`].
//! Nothing here depends on which render backend is active.

#[cfg(test)]
#[path = "coords_test.rs"]
mod coords_test;

use serde::{Deserialize, Serialize};

use crate::error::ViewerError;

/// A point in screen, content, or normalized space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    #[must_use]
    pub fn offset_from(self, origin: Point) -> Point {
        Point::new(self.x - origin.x, self.y - origin.y)
    }
}

/// Width and height in some space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Both dimensions are finite and strictly positive.
    #[must_use]
    pub fn is_positive(self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    #[must_use]
    pub fn center(self) -> Point {
        Point::new(self.width * 0.5, self.height * 0.5)
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Overlap test with positive area; touching edges do not intersect.
    #[must_use]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }
}

/// Current camera state: `screen = content * scale + translate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportTransform {
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl Default for ViewportTransform {
    fn default() -> Self {
        Self { scale: 1.0, translate_x: 0.0, translate_y: 0.0 }
    }
}

impl ViewportTransform {
    #[must_use]
    pub fn new(scale: f64, translate_x: f64, translate_y: f64) -> Self {
        Self { scale, translate_x, translate_y }
    }

    #[must_use]
    pub fn translation(&self) -> Point {
        Point::new(self.translate_x, self.translate_y)
    }

    /// Convert a screen-space point to content coordinates.
    #[must_use]
    pub fn screen_to_content(&self, screen: Point) -> Point {
        Point {
            x: (screen.x - self.translate_x) / self.scale,
            y: (screen.y - self.translate_y) / self.scale,
        }
    }

    /// Convert a content-space point to screen coordinates.
    #[must_use]
    pub fn content_to_screen(&self, content: Point) -> Point {
        Point {
            x: content.x * self.scale + self.translate_x,
            y: content.y * self.scale + self.translate_y,
        }
    }

    /// The content-space rectangle visible through a viewport of `viewport` size.
    #[must_use]
    pub fn visible_content_rect(&self, viewport: Size) -> Rect {
        let origin = self.screen_to_content(Point::new(0.0, 0.0));
        Rect::new(origin.x, origin.y, viewport.width / self.scale, viewport.height / self.scale)
    }
}

/// Pixel extent of the rendered content and its conversion to document units.
///
/// Fixed for the lifetime of a session once known.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContentSpace {
    pub width: f64,
    pub height: f64,
    /// Content pixels per source-document unit.
    pub scaling_factor: f64,
}

impl ContentSpace {
    /// # Errors
    ///
    /// Returns `InvalidSessionData` if any dimension or the scaling factor is
    /// not finite and strictly positive.
    pub fn new(width: f64, height: f64, scaling_factor: f64) -> Result<Self, ViewerError> {
        if !Size::new(width, height).is_positive() {
            return Err(ViewerError::InvalidSessionData(format!("content size {width}x{height} is not positive")));
        }
        if !scaling_factor.is_finite() || scaling_factor <= 0.0 {
            return Err(ViewerError::InvalidSessionData(format!(
                "scaling factor {scaling_factor} is not positive"
            )));
        }
        Ok(Self { width, height, scaling_factor })
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= 0.0 && p.y >= 0.0 && p.x <= self.width && p.y <= self.height
    }

    /// Convert content pixels to source-document units, unrounded.
    #[must_use]
    pub fn content_to_original(&self, content: Point) -> Point {
        Point::new(content.x / self.scaling_factor, content.y / self.scaling_factor)
    }

    /// Convert source-document units back to content pixels.
    #[must_use]
    pub fn original_to_content(&self, original: Point) -> Point {
        Point::new(original.x * self.scaling_factor, original.y * self.scaling_factor)
    }

    /// Source-document position rounded to the nearest unit for display.
    #[must_use]
    pub fn original_point(&self, content: Point) -> OriginalPoint {
        let p = self.content_to_original(content);
        OriginalPoint { x: round_to_i64(p.x), y: round_to_i64(p.y) }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn round_to_i64(v: f64) -> i64 {
    v.round() as i64
}

/// Integer source-document coordinates as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalPoint {
    pub x: i64,
    pub y: i64,
}

/// The result of a qualifying click: one point in all three spaces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClickMeasurement {
    pub screen_point: Point,
    pub content_point: Point,
    pub original_point: OriginalPoint,
}

/// Map a screen click through the current transform into every space.
#[must_use]
pub fn measure(screen: Point, transform: &ViewportTransform, content: &ContentSpace) -> ClickMeasurement {
    let content_point = transform.screen_to_content(screen);
    ClickMeasurement { screen_point: screen, content_point, original_point: content.original_point(content_point) }
}
