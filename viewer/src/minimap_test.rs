#![allow(clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-9;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn content() -> ContentSpace {
    ContentSpace::new(1000.0, 800.0, 2.0).unwrap()
}

#[test]
fn worked_example() {
    let t = ViewportTransform::new(2.0, -200.0, -100.0);
    let r = compute_overview_rect(&t, &content(), Size::new(800.0, 600.0), 0.05);
    assert!(approx_eq(r.x, 0.1));
    assert!(approx_eq(r.y, 0.0625));
    assert!(approx_eq(r.width, 0.4));
    assert!(approx_eq(r.height, 0.375));
}

#[test]
fn zoomed_out_extent_clamps_to_one() {
    let t = ViewportTransform::new(0.1, 300.0, 200.0);
    let r = compute_overview_rect(&t, &content(), Size::new(800.0, 600.0), 0.05);
    assert_eq!(r.width, 1.0);
    assert_eq!(r.height, 1.0);
    assert_eq!(r.x, 0.0);
    assert_eq!(r.y, 0.0);
}

#[test]
fn max_zoom_enforces_minimum_extent() {
    let t = ViewportTransform::new(10.0, -5000.0, -4000.0);
    let r = compute_overview_rect(&t, &content(), Size::new(20.0, 20.0), 0.05);
    assert_eq!(r.width, 0.05);
    assert_eq!(r.height, 0.05);
}

#[test]
fn origin_clamped_when_panned_past_content() {
    let t = ViewportTransform::new(2.0, -100_000.0, 100_000.0);
    let r = compute_overview_rect(&t, &content(), Size::new(800.0, 600.0), 0.05);
    assert!(approx_eq(r.x, 1.0 - r.width));
    assert_eq!(r.y, 0.0);
}

#[test]
fn normalized_click_is_clamped_to_content() {
    let p = normalized_to_content(Point::new(1.5, -0.2), &content());
    assert_eq!(p, Point::new(1000.0, 0.0));
}

#[test]
fn normalized_click_maps_proportionally() {
    let p = normalized_to_content(Point::new(0.5, 0.25), &content());
    assert_eq!(p, Point::new(500.0, 200.0));
}

#[test]
fn sync_recomputes_once_per_dirty_mark() {
    let mut m = MinimapSync::new(0.05);
    let t = ViewportTransform::new(2.0, -200.0, -100.0);
    let viewport = Size::new(800.0, 600.0);
    assert!(m.sync(&t, &content(), viewport).is_some());
    assert!(!m.is_dirty());
    assert!(m.sync(&t, &content(), viewport).is_none());
}

#[test]
fn sync_skips_unchanged_rect() {
    let mut m = MinimapSync::new(0.05);
    let t = ViewportTransform::new(2.0, -200.0, -100.0);
    let viewport = Size::new(800.0, 600.0);
    m.sync(&t, &content(), viewport);
    m.mark_dirty();
    assert!(m.sync(&t, &content(), viewport).is_none());
    assert!(m.rect().is_some());
}

#[test]
fn sync_waits_for_a_real_viewport() {
    let mut m = MinimapSync::new(0.05);
    let t = ViewportTransform::default();
    assert!(m.sync(&t, &content(), Size::new(0.0, 0.0)).is_none());
    assert!(m.is_dirty());
}
