//! Rendering: paints a [`Frame`] to a 2D context.
//!
//! Used by the direct and tiled strategies; GPU frames go to [`crate::gl`].
//! This module is the only place that issues `Canvas2D` calls. It receives a
//! finished draw list and the decoded images keyed by asset and produces
//! pixels; it does not mutate any engine state. Items whose image
//! has not arrived yet are skipped.
//!
//! All fallible `Canvas2D` calls propagate errors via `Result<(), JsValue>`.
//! The top-level caller ([`crate::engine::Engine::render`]) handles the result.

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

use std::collections::HashMap;

use wasm_bindgen::JsValue;
use web_sys::{CanvasRenderingContext2d, HtmlImageElement};

use crate::backend::{AssetKey, Frame};
use crate::coords::{Point, Size, ViewportTransform};
use crate::engine::DisplayStatus;

const BACKGROUND: &str = "#2b2b2b";
const PLACEHOLDER_TEXT: &str = "#d0d0d0";
const PLACEHOLDER_FONT: &str = "14px sans-serif";

/// Measurement marker radius in screen pixels.
const MARKER_RADIUS_PX: f64 = 6.0;
const MARKER_DASH_PX: f64 = 3.0;
const MARKER_STROKE: &str = "#ffcc00";

/// Draw a frame: clear, apply the viewport transform, then every item
/// bottom-first, then the measurement marker if any.
///
/// `marker` is in content coordinates. `viewport` is in CSS pixels. `dpr` is
/// the device pixel ratio.
///
/// # Errors
///
/// Returns `Err` if any `Canvas2D` call fails (e.g. invalid context state).
pub fn draw(
    ctx: &CanvasRenderingContext2d,
    frame: &Frame,
    images: &HashMap<AssetKey, HtmlImageElement>,
    marker: Option<Point>,
    viewport: Size,
    dpr: f64,
) -> Result<(), JsValue> {
    clear(ctx, viewport, dpr)?;

    let [a, b, c, d, e, f] = device_matrix(&frame.transform, dpr);
    ctx.set_transform(a, b, c, d, e, f)?;
    ctx.set_image_smoothing_enabled(frame.transform.scale < 1.0);

    for item in &frame.items {
        let Some(image) = images.get(&item.asset) else {
            continue;
        };
        ctx.set_global_alpha(item.alpha.clamp(0.0, 1.0));
        ctx.draw_image_with_html_image_element_and_dw_and_dh(
            image,
            item.dest.x,
            item.dest.y,
            item.dest.width,
            item.dest.height,
        )?;
    }
    ctx.set_global_alpha(1.0);

    if let Some(content_point) = marker {
        ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0)?;
        draw_marker(ctx, frame.transform.content_to_screen(content_point))?;
    }
    Ok(())
}

/// Dashed ring with a center dot, in screen space.
fn draw_marker(ctx: &CanvasRenderingContext2d, at: Point) -> Result<(), JsValue> {
    let dash_array = js_sys::Array::new();
    dash_array.push(&JsValue::from_f64(MARKER_DASH_PX));
    dash_array.push(&JsValue::from_f64(MARKER_DASH_PX));
    ctx.set_line_dash(&dash_array)?;
    ctx.set_stroke_style_str(MARKER_STROKE);
    ctx.set_line_width(1.5);
    ctx.begin_path();
    ctx.arc(at.x, at.y, MARKER_RADIUS_PX, 0.0, std::f64::consts::TAU)?;
    ctx.stroke();
    ctx.set_line_dash(&js_sys::Array::new())?;

    ctx.set_fill_style_str(MARKER_STROKE);
    ctx.begin_path();
    ctx.arc(at.x, at.y, 1.5, 0.0, std::f64::consts::TAU)?;
    ctx.fill();
    Ok(())
}

/// Draw the surface shown when no frame is available.
///
/// # Errors
///
/// Returns `Err` if any `Canvas2D` call fails.
pub fn draw_placeholder(
    ctx: &CanvasRenderingContext2d,
    status: &DisplayStatus,
    viewport: Size,
    dpr: f64,
) -> Result<(), JsValue> {
    clear(ctx, viewport, dpr)?;
    let Some(message) = placeholder_message(status) else {
        return Ok(());
    };
    let center = viewport.center();
    ctx.set_fill_style_str(PLACEHOLDER_TEXT);
    ctx.set_font(PLACEHOLDER_FONT);
    ctx.set_text_align("center");
    ctx.set_text_baseline("middle");
    ctx.fill_text(message, center.x, center.y)
}

fn clear(ctx: &CanvasRenderingContext2d, viewport: Size, dpr: f64) -> Result<(), JsValue> {
    ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0)?;
    ctx.set_global_alpha(1.0);
    ctx.set_fill_style_str(BACKGROUND);
    ctx.fill_rect(0.0, 0.0, viewport.width, viewport.height);
    Ok(())
}

/// Content-to-device-pixel matrix `[a, b, c, d, e, f]` for `setTransform`.
fn device_matrix(t: &ViewportTransform, dpr: f64) -> [f64; 6] {
    let s = t.scale * dpr;
    [s, 0.0, 0.0, s, t.translate_x * dpr, t.translate_y * dpr]
}

fn placeholder_message(status: &DisplayStatus) -> Option<&'static str> {
    match status {
        DisplayStatus::Empty => None,
        DisplayStatus::Loading => Some("Loading…"),
        DisplayStatus::Ready => Some("Nothing to display"),
        DisplayStatus::Unavailable(_) => Some("Unable to display this page"),
    }
}
