#![allow(clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-9;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn state(viewport_w: f64, viewport_h: f64) -> ViewportState {
    ViewportState::new(ScaleLimits::default(), Size::new(viewport_w, viewport_h))
}

// =============================================================
// ScaleLimits
// =============================================================

#[test]
fn limits_default_range() {
    let l = ScaleLimits::default();
    assert_eq!(l.min, 0.1);
    assert_eq!(l.max, 10.0);
}

#[test]
fn limits_clamp() {
    let l = ScaleLimits::new(0.5, 10.0);
    assert_eq!(l.clamp(0.1), 0.5);
    assert_eq!(l.clamp(20.0), 10.0);
    assert_eq!(l.clamp(3.0), 3.0);
}

// =============================================================
// zoom
// =============================================================

#[test]
fn zoom_worked_example() {
    let t = zoomed(ViewportTransform::default(), ScaleLimits::default(), 1.1, Point::new(50.0, 50.0));
    assert!(approx_eq(t.scale, 1.1));
    assert!(approx_eq(t.translate_x, -5.0));
    assert!(approx_eq(t.translate_y, -5.0));
}

#[test]
fn zoom_keeps_anchor_fixed() {
    let t0 = ViewportTransform::new(1.7, 33.0, -12.0);
    let anchor = Point::new(240.0, 180.0);
    let before = t0.screen_to_content(anchor);
    let after = zoomed(t0, ScaleLimits::default(), 0.8, anchor).screen_to_content(anchor);
    assert!(approx_eq(before.x, after.x));
    assert!(approx_eq(before.y, after.y));
}

#[test]
fn zoom_clamps_at_max_and_still_keeps_anchor() {
    let t0 = ViewportTransform::new(9.0, 0.0, 0.0);
    let anchor = Point::new(100.0, 100.0);
    let t = zoomed(t0, ScaleLimits::default(), 5.0, anchor);
    assert_eq!(t.scale, 10.0);
    let before = t0.screen_to_content(anchor);
    let after = t.screen_to_content(anchor);
    assert!(approx_eq(before.x, after.x));
}

#[test]
fn zoom_clamps_at_min() {
    let t = zoomed(ViewportTransform::default(), ScaleLimits::default(), 0.001, Point::new(0.0, 0.0));
    assert_eq!(t.scale, 0.1);
}

#[test]
fn zoom_rejects_invalid_factors() {
    let t0 = ViewportTransform::new(2.0, 3.0, 4.0);
    for f in [0.0, -1.0, f64::NAN, f64::INFINITY] {
        assert_eq!(zoomed(t0, ScaleLimits::default(), f, Point::new(1.0, 1.0)), t0);
    }
}

#[test]
fn state_zoom_reports_change() {
    let mut s = state(800.0, 600.0);
    assert!(s.zoom(2.0, Point::new(0.0, 0.0)));
    assert_eq!(s.transform().scale, 2.0);
}

#[test]
fn state_zoom_at_limit_reports_no_change() {
    let mut s = state(800.0, 600.0);
    s.zoom(10.0, Point::new(0.0, 0.0));
    assert!(!s.zoom(1.5, Point::new(0.0, 0.0)));
}

// =============================================================
// pan
// =============================================================

#[test]
fn pan_adds_delta_without_clamping() {
    let mut s = state(800.0, 600.0);
    assert!(s.pan(Point::new(-5000.0, 20.0)));
    assert_eq!(s.transform().translate_x, -5000.0);
    assert_eq!(s.transform().translate_y, 20.0);
}

#[test]
fn pan_zero_is_noop() {
    let mut s = state(800.0, 600.0);
    assert!(!s.pan(Point::new(0.0, 0.0)));
}

#[test]
fn pan_from_is_relative_to_origin() {
    let mut s = state(800.0, 600.0);
    s.pan(Point::new(10.0, 10.0));
    s.pan_from(Point::new(10.0, 10.0), Point::new(5.0, 0.0));
    s.pan_from(Point::new(10.0, 10.0), Point::new(8.0, 2.0));
    assert_eq!(s.transform().translation(), Point::new(18.0, 12.0));
}

// =============================================================
// fit_to_screen
// =============================================================

#[test]
fn fit_uses_smaller_ratio_and_centers() {
    let mut s = state(800.0, 600.0);
    let content = ContentSpace::new(1000.0, 800.0, 1.0).unwrap();
    assert!(s.fit_to_screen(&content, 0.9));
    let t = s.transform();
    // min(0.8, 0.75) * 0.9 = 0.675
    assert!(approx_eq(t.scale, 0.675));
    assert!(approx_eq(t.translate_x, (800.0 - 675.0) / 2.0));
    assert!(approx_eq(t.translate_y, (600.0 - 540.0) / 2.0));
}

#[test]
fn fit_with_empty_viewport_is_noop() {
    let mut s = state(0.0, 0.0);
    let content = ContentSpace::new(1000.0, 800.0, 1.0).unwrap();
    let before = s.transform();
    assert!(!s.fit_to_screen(&content, 0.9));
    assert_eq!(s.transform(), before);
}

#[test]
fn fit_respects_scale_limits() {
    let mut s = ViewportState::new(ScaleLimits::new(0.5, 10.0), Size::new(100.0, 100.0));
    let content = ContentSpace::new(10_000.0, 10_000.0, 1.0).unwrap();
    s.fit_to_screen(&content, 0.9);
    assert_eq!(s.transform().scale, 0.5);
}

// =============================================================
// center_on
// =============================================================

#[test]
fn center_on_places_point_at_viewport_center() {
    let mut s = state(800.0, 600.0);
    s.zoom(2.0, Point::new(0.0, 0.0));
    s.center_on(Point::new(500.0, 400.0));
    let screen = s.transform().content_to_screen(Point::new(500.0, 400.0));
    assert!(approx_eq(screen.x, 400.0));
    assert!(approx_eq(screen.y, 300.0));
    assert_eq!(s.transform().scale, 2.0);
}

#[test]
fn new_state_clamps_initial_scale() {
    let s = ViewportState::new(ScaleLimits::new(2.0, 10.0), Size::new(1.0, 1.0));
    assert_eq!(s.transform().scale, 2.0);
}
