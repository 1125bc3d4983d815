#![allow(clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-10;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn point_approx_eq(a: Point, b: Point) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}

// --- Point / Rect ---

#[test]
fn point_distance() {
    let a = Point::new(100.0, 100.0);
    let b = Point::new(103.0, 104.0);
    assert!(approx_eq(a.distance_to(b), 5.0));
}

#[test]
fn point_offset_from() {
    let p = Point::new(10.0, 4.0).offset_from(Point::new(3.0, 6.0));
    assert_eq!(p, Point::new(7.0, -2.0));
}

#[test]
fn rect_intersects_overlap_and_touching() {
    let a = Rect::new(0.0, 0.0, 10.0, 10.0);
    assert!(a.intersects(&Rect::new(5.0, 5.0, 10.0, 10.0)));
    assert!(!a.intersects(&Rect::new(10.0, 0.0, 5.0, 5.0)));
    assert!(!a.intersects(&Rect::new(-20.0, -20.0, 5.0, 5.0)));
}

#[test]
fn size_is_positive() {
    assert!(Size::new(1.0, 1.0).is_positive());
    assert!(!Size::new(0.0, 1.0).is_positive());
    assert!(!Size::new(f64::NAN, 1.0).is_positive());
}

// --- ViewportTransform ---

#[test]
fn transform_default_is_identity() {
    let t = ViewportTransform::default();
    assert_eq!(t.scale, 1.0);
    assert_eq!(t.translation(), Point::new(0.0, 0.0));
}

#[test]
fn screen_to_content_identity() {
    let t = ViewportTransform::default();
    assert!(point_approx_eq(t.screen_to_content(Point::new(50.0, 75.0)), Point::new(50.0, 75.0)));
}

#[test]
fn screen_to_content_with_scale_and_translate() {
    let t = ViewportTransform::new(2.0, -200.0, -100.0);
    let c = t.screen_to_content(Point::new(0.0, 0.0));
    assert!(point_approx_eq(c, Point::new(100.0, 50.0)));
}

#[test]
fn content_to_screen_inverts_screen_to_content() {
    let t = ViewportTransform::new(2.75, 120.0, -48.0);
    for (x, y) in [(-250.0, -100.0), (0.0, 0.0), (13.5, 92.25), (800.0, -64.0)] {
        let s = Point::new(x, y);
        let back = t.content_to_screen(t.screen_to_content(s));
        assert!(point_approx_eq(s, back));
    }
}

#[test]
fn visible_content_rect_matches_viewport() {
    let t = ViewportTransform::new(2.0, -200.0, -100.0);
    let r = t.visible_content_rect(Size::new(800.0, 600.0));
    assert!(approx_eq(r.x, 100.0));
    assert!(approx_eq(r.y, 50.0));
    assert!(approx_eq(r.width, 400.0));
    assert!(approx_eq(r.height, 300.0));
}

// --- ContentSpace ---

#[test]
fn content_space_rejects_bad_dimensions() {
    assert!(ContentSpace::new(0.0, 800.0, 2.0).is_err());
    assert!(ContentSpace::new(1000.0, -1.0, 2.0).is_err());
    assert!(ContentSpace::new(1000.0, 800.0, 0.0).is_err());
    assert!(ContentSpace::new(1000.0, 800.0, f64::INFINITY).is_err());
}

#[test]
fn content_to_original_divides_by_scaling_factor() {
    let cs = ContentSpace::new(1000.0, 800.0, 2.0).unwrap();
    let p = cs.original_point(Point::new(400.0, 300.0));
    assert_eq!(p, OriginalPoint { x: 200, y: 150 });
}

#[test]
fn original_point_rounds_to_nearest() {
    let cs = ContentSpace::new(1000.0, 800.0, 300.0 / 72.0).unwrap();
    let p = cs.original_point(Point::new(100.0, 10.0));
    // 100 / 4.1666 = 24.0, 10 / 4.1666 = 2.4
    assert_eq!(p, OriginalPoint { x: 24, y: 2 });
}

#[test]
fn original_to_content_inverts_content_to_original() {
    let cs = ContentSpace::new(1000.0, 800.0, 4.25).unwrap();
    let c = Point::new(333.3, 17.0);
    assert!(point_approx_eq(cs.original_to_content(cs.content_to_original(c)), c));
}

#[test]
fn contains_is_inclusive() {
    let cs = ContentSpace::new(100.0, 50.0, 1.0).unwrap();
    assert!(cs.contains(Point::new(0.0, 0.0)));
    assert!(cs.contains(Point::new(100.0, 50.0)));
    assert!(!cs.contains(Point::new(100.1, 10.0)));
}

// --- measure ---

#[test]
fn measure_maps_all_three_spaces() {
    let cs = ContentSpace::new(1000.0, 800.0, 2.0).unwrap();
    let t = ViewportTransform::new(0.5, 10.0, 20.0);
    let m = measure(Point::new(210.0, 170.0), &t, &cs);
    assert_eq!(m.screen_point, Point::new(210.0, 170.0));
    assert!(point_approx_eq(m.content_point, Point::new(400.0, 300.0)));
    assert_eq!(m.original_point, OriginalPoint { x: 200, y: 150 });
}
