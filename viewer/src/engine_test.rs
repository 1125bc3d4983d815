#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;
use crate::coords::OriginalPoint;
use crate::pyramid::TileCoord;

const BASE: &str = "/images/s1/page_0/reference.png";
const GRAY: &str = "/images/s1/page_0/reference_gray.png";
const RED: &str = "/images/s1/page_0/mask_red.png";
const DZI: &str = "/images/s1/page_0/image.dzi";
const DZI_XML: &str = r#"<Image TileSize="256" Overlap="1" Format="png"><Size Width="1600" Height="1200"/></Image>"#;

fn session_json(page: u32, total: u32) -> serde_json::Value {
    json!({
        "session_id": "s1",
        "current_page": page,
        "total_pages": total,
        "scaling_factor": 300.0 / 72.0,
        "images": {
            "base": BASE,
            "base_grayscale": GRAY,
            "mask_red": RED,
            "mask_green": "/images/s1/page_0/mask_green.png",
            "mask_blue": "/images/s1/page_0/mask_blue.png"
        },
        "tiles": { "dzi_url": DZI, "width": 1600, "height": 1200 },
        "stats": {
            "total_matches": 10, "inliers": 9, "inlier_ratio": 0.9, "method": "ORB",
            "missing_regions": 1, "added_regions": 0, "modified_regions": 2,
            "missing_pixels": 5, "added_pixels": 0, "modified_pixels": 7
        }
    })
}

fn session(page: u32, total: u32) -> SessionResult {
    SessionResult::from_json(&session_json(page, total).to_string()).unwrap()
}

fn core(backend: BackendKind) -> EngineCore {
    let mut core = EngineCore::new(ViewerConfig { backend, ..ViewerConfig::default() });
    core.set_viewport_size(800.0, 600.0, 1.0);
    core
}

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn loads(actions: &[Action]) -> Vec<AssetRequest> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::Load(r) => Some(r.clone()),
            _ => None,
        })
        .collect()
}

fn has_action<F>(actions: &[Action], pred: F) -> bool
where
    F: Fn(&Action) -> bool,
{
    actions.iter().any(pred)
}

fn has_render_needed(actions: &[Action]) -> bool {
    has_action(actions, |a| matches!(a, Action::RenderNeeded))
}

fn image(width: u32, height: u32) -> AssetOutcome {
    AssetOutcome::Image { width, height }
}

/// Complete every image load in `requests` at 1600x1200.
fn complete_all(core: &mut EngineCore, requests: &[AssetRequest]) -> Vec<Action> {
    let mut out = Vec::new();
    for r in requests {
        out.extend(core.on_asset_loaded(r.generation, &r.key, image(1600, 1200)));
    }
    out
}

/// Direct strategy with every layer loaded.
fn ready_direct() -> EngineCore {
    let mut core = core(BackendKind::Direct);
    let actions = core.load_session(&session(0, 3));
    complete_all(&mut core, &loads(&actions));
    core
}

fn visible_layers(core: &EngineCore) -> Vec<LayerId> {
    core.frame().map(|f| f.items.iter().map(|i| i.layer).collect()).unwrap_or_default()
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{a} != {b}");
}

// =============================================================
// Construction
// =============================================================

#[test]
fn new_core_is_empty() {
    let core = EngineCore::default();
    assert_eq!(core.status(), &DisplayStatus::Empty);
    assert!(core.frame().is_none());
    assert_eq!(core.transform(), ViewportTransform::default());
    assert_eq!(core.generation(), Generation(0));
    assert!(core.measurement().is_none());
}

// =============================================================
// Session lifecycle
// =============================================================

#[test]
fn load_session_requests_every_layer() {
    let mut core = core(BackendKind::Direct);
    let actions = core.load_session(&session(0, 3));
    assert!(actions.contains(&Action::StatusChanged(DisplayStatus::Loading)));
    let requests = loads(&actions);
    assert_eq!(requests.len(), 4);
    assert!(requests.iter().all(|r| r.generation == Generation(1)));
    assert_eq!(requests[0].url, BASE);
    assert_eq!(core.session_id(), Some("s1"));
    assert_eq!(core.stats().map(|s| s.method.as_str()), Some("ORB"));
}

#[test]
fn invalid_session_shows_loading_placeholder() {
    let mut core = core(BackendKind::Direct);
    let mut raw = session_json(0, 3);
    raw["images"]["base"] = json!("");
    let actions = core.load_session(&SessionResult::from_json(&raw.to_string()).unwrap());
    assert!(loads(&actions).is_empty());
    assert_eq!(core.status(), &DisplayStatus::Loading);
    assert!(core.frame().is_none());
}

#[test]
fn base_load_makes_session_ready_and_fits() {
    let mut core = core(BackendKind::Direct);
    let actions = core.load_session(&session(0, 3));
    let requests = loads(&actions);
    let after = core.on_asset_loaded(requests[0].generation, &requests[0].key, image(1600, 1200));
    assert!(after.contains(&Action::StatusChanged(DisplayStatus::Ready)));
    assert!(has_action(&after, |a| matches!(a, Action::OverviewChanged(_))));
    let content = core.content().unwrap();
    assert_eq!((content.width, content.height), (1600.0, 1200.0));
    let t = core.transform();
    assert_close(t.scale, 0.45);
    assert_close(t.translate_x, 40.0);
    assert_close(t.translate_y, 30.0);
}

#[test]
fn fit_waits_for_viewport_size() {
    let mut core = EngineCore::new(ViewerConfig::default());
    let actions = core.load_session(&session(0, 1));
    complete_all(&mut core, &loads(&actions));
    assert_eq!(core.transform().scale, 1.0);
    core.set_viewport_size(800.0, 600.0, 2.0);
    assert_close(core.transform().scale, 0.45);
}

#[test]
fn stale_completion_is_discarded_and_released() {
    let mut core = core(BackendKind::Direct);
    let first = loads(&core.load_session(&session(0, 3)));
    core.load_session(&session(1, 3));
    let stale = &first[0];
    let actions = core.on_asset_loaded(stale.generation, &stale.key, image(10, 10));
    assert_eq!(actions, vec![Action::Release { generation: Generation(1), key: stale.key.clone() }]);
    assert!(core.content().is_none());
    assert_eq!(core.status(), &DisplayStatus::Loading);
}

#[test]
fn page_change_releases_old_assets_and_resets_view() {
    let mut core = ready_direct();
    core.on_pointer_down(pt(440.0, 330.0), Button::Primary);
    core.on_pointer_up(pt(440.0, 330.0));
    core.on_wheel(pt(100.0, 100.0), WheelDelta { dx: 0.0, dy: -1.0 });
    assert!(core.measurement().is_some());

    let actions = core.load_session(&session(1, 3));
    let released = actions.iter().filter(|a| matches!(a, Action::Release { generation: Generation(1), .. })).count();
    assert_eq!(released, 4);
    assert!(core.measurement().is_none());
    assert_eq!(core.generation(), Generation(2));
    assert_eq!(core.current_page(), Some(1));

    complete_all(&mut core, &loads(&actions));
    let t = core.transform();
    assert_close(t.scale, 0.45);
    assert_close(t.translate_x, 40.0);
}

// =============================================================
// Failures
// =============================================================

#[test]
fn overlay_failure_drops_only_that_layer() {
    let mut core = core(BackendKind::Direct);
    let requests = loads(&core.load_session(&session(0, 3)));
    for r in &requests {
        let outcome = if r.url == RED { AssetOutcome::Failed("404".into()) } else { image(1600, 1200) };
        core.on_asset_loaded(r.generation, &r.key, outcome);
    }
    assert_eq!(core.status(), &DisplayStatus::Ready);
    assert_eq!(visible_layers(&core), vec![LayerId::Base, LayerId::Added, LayerId::Modified]);
}

#[test]
fn base_failure_makes_session_unavailable() {
    let mut core = core(BackendKind::Direct);
    let requests = loads(&core.load_session(&session(0, 3)));
    core.on_asset_loaded(requests[1].generation, &requests[1].key, image(1600, 1200));
    let actions = core.on_asset_loaded(requests[0].generation, &requests[0].key, AssetOutcome::Failed("decode".into()));
    assert!(matches!(core.status(), DisplayStatus::Unavailable(reason) if reason.contains("decode")));
    assert!(core.frame().is_none());
    assert!(has_action(&actions, |a| matches!(a, Action::Release { .. })));
    // Input keeps working without a session.
    assert!(core.on_wheel(pt(1.0, 1.0), WheelDelta { dx: 0.0, dy: 1.0 }).is_empty());
}

#[test]
fn base_failure_mid_drag_restores_idle_cursor() {
    let mut core = core(BackendKind::Direct);
    let requests = loads(&core.load_session(&session(0, 3)));
    core.on_pointer_down(pt(50.0, 50.0), Button::Primary);
    core.on_pointer_move(pt(80.0, 60.0));
    let actions = core.on_asset_loaded(requests[0].generation, &requests[0].key, AssetOutcome::Failed("gone".into()));
    assert!(actions.contains(&Action::SetCursor("grab".into())));
    assert!(matches!(core.status(), DisplayStatus::Unavailable(_)));
    // The drag is over: further moves and the release do nothing.
    assert!(core.on_pointer_move(pt(90.0, 70.0)).is_empty());
    assert!(core.on_pointer_up(pt(90.0, 70.0)).is_empty());
}

#[test]
fn gpu_without_context_is_unavailable() {
    let mut core = core(BackendKind::Gpu);
    core.set_gpu_caps(GpuCaps { available: false, max_texture_size: 0 });
    let actions = core.load_session(&session(0, 3));
    assert!(loads(&actions).is_empty());
    assert_eq!(core.status(), &DisplayStatus::Unavailable("backend initialization failed: GPU context unavailable".into()));
    assert_eq!(core.next_page(), vec![Action::PageRequested(1)]);
}

// =============================================================
// Pointer input
// =============================================================

#[test]
fn click_produces_measurement() {
    let mut core = ready_direct();
    assert_eq!(core.on_pointer_down(pt(440.0, 330.0), Button::Primary), vec![Action::SetCursor("grabbing".into())]);
    let actions = core.on_pointer_up(pt(440.0, 330.0));
    let m = core.measurement().unwrap();
    assert!(actions.contains(&Action::Measured(m)));
    assert!(actions.contains(&Action::SetCursor("grab".into())));
    assert_eq!(m.screen_point, pt(440.0, 330.0));
    assert_eq!(m.original_point, OriginalPoint { x: 213, y: 160 });
}

#[test]
fn drag_pans_without_measuring() {
    let mut core = ready_direct();
    let before = core.transform();
    core.on_pointer_down(pt(100.0, 100.0), Button::Primary);
    core.on_pointer_move(pt(120.0, 90.0));
    let actions = core.on_pointer_move(pt(150.0, 80.0));
    assert!(has_render_needed(&actions));
    let actions = core.on_pointer_up(pt(150.0, 80.0));
    assert!(!has_action(&actions, |a| matches!(a, Action::Measured(_))));
    assert!(core.measurement().is_none());
    let after = core.transform();
    assert_close(after.translate_x, before.translate_x + 50.0);
    assert_close(after.translate_y, before.translate_y - 20.0);
    assert_eq!(after.scale, before.scale);
}

#[test]
fn wheel_during_drag_keeps_grabbed_point_under_pointer() {
    let mut core = ready_direct();
    core.on_pointer_down(pt(400.0, 300.0), Button::Primary);
    core.on_pointer_move(pt(420.0, 300.0));
    core.on_wheel(pt(420.0, 300.0), WheelDelta { dx: 0.0, dy: -1.0 });
    let grabbed = core.transform().screen_to_content(pt(420.0, 300.0));

    core.on_pointer_move(pt(421.0, 300.0));
    let after = core.transform();
    assert_close(after.scale, 0.45 * 1.1);
    let under = after.screen_to_content(pt(421.0, 300.0));
    assert_close(under.x, grabbed.x);
    assert_close(under.y, grabbed.y);
}

#[test]
fn toolbar_zoom_during_drag_rebases_the_drag() {
    let mut core = ready_direct();
    core.on_pointer_down(pt(100.0, 100.0), Button::Primary);
    core.on_pointer_move(pt(130.0, 100.0));
    core.zoom_in();
    let zoomed = core.transform();

    core.on_pointer_move(pt(140.0, 110.0));
    let after = core.transform();
    assert_close(after.translate_x, zoomed.translate_x + 10.0);
    assert_close(after.translate_y, zoomed.translate_y + 10.0);
    // Total travel still rules out a click.
    let actions = core.on_pointer_up(pt(140.0, 110.0));
    assert!(!has_action(&actions, |a| matches!(a, Action::Measured(_))));
}

#[test]
fn click_before_content_is_known_is_ignored() {
    let mut core = core(BackendKind::Direct);
    core.load_session(&session(0, 3));
    core.on_pointer_down(pt(10.0, 10.0), Button::Primary);
    let actions = core.on_pointer_up(pt(10.0, 10.0));
    assert_eq!(actions, vec![Action::SetCursor("grab".into())]);
    assert!(core.measurement().is_none());
}

#[test]
fn cancel_ends_drag_without_measuring() {
    let mut core = ready_direct();
    core.on_pointer_down(pt(10.0, 10.0), Button::Primary);
    assert_eq!(core.on_pointer_cancel(), vec![Action::SetCursor("grab".into())]);
    assert!(core.on_pointer_up(pt(10.0, 10.0)).is_empty());
    assert!(core.measurement().is_none());
}

// =============================================================
// Zoom
// =============================================================

#[test]
fn wheel_zoom_keeps_point_under_cursor() {
    let mut core = ready_direct();
    let anchor = pt(200.0, 150.0);
    let before = core.transform().screen_to_content(anchor);
    core.on_wheel(anchor, WheelDelta { dx: 0.0, dy: -120.0 });
    let after = core.transform();
    assert_close(after.scale, 0.45 * 1.1);
    let p = after.screen_to_content(anchor);
    assert_close(p.x, before.x);
    assert_close(p.y, before.y);
}

#[test]
fn zoom_in_then_out_returns_to_start() {
    let mut core = ready_direct();
    let start = core.transform();
    core.zoom_in();
    assert!(core.transform().scale > start.scale);
    core.zoom_out();
    let t = core.transform();
    assert_close(t.scale, start.scale);
    assert_close(t.translate_x, start.translate_x);
}

#[test]
fn zoom_is_clamped() {
    let mut core = ready_direct();
    for _ in 0..100 {
        core.zoom_out();
    }
    assert_close(core.transform().scale, 0.1);
    assert!(core.zoom_out().is_empty());
}

#[test]
fn pinch_zooms_at_center() {
    let mut core = ready_direct();
    core.on_pinch(pt(400.0, 300.0), 2.0);
    assert_close(core.transform().scale, 0.9);
}

#[test]
fn double_click_zoom_only_for_direct() {
    let mut direct = ready_direct();
    direct.on_double_click(pt(400.0, 300.0));
    assert_close(direct.transform().scale, 0.9);

    let mut gpu = core(BackendKind::Gpu);
    let actions = gpu.load_session(&session(0, 3));
    complete_all(&mut gpu, &loads(&actions));
    let before = gpu.transform();
    assert!(gpu.on_double_click(pt(400.0, 300.0)).is_empty());
    assert_eq!(gpu.transform(), before);
}

#[test]
fn fit_to_screen_restores_after_pan() {
    let mut core = ready_direct();
    let fitted = core.transform();
    core.on_pointer_down(pt(0.0, 0.0), Button::Primary);
    core.on_pointer_move(pt(300.0, 0.0));
    core.on_pointer_up(pt(300.0, 0.0));
    core.fit_to_screen();
    assert_eq!(core.transform(), fitted);
}

// =============================================================
// Minimap
// =============================================================

#[test]
fn minimap_click_recenters_keeping_scale() {
    let mut core = ready_direct();
    core.zoom_in();
    let scale = core.transform().scale;
    core.on_minimap_click(pt(0.25, 0.75));
    let t = core.transform();
    assert_eq!(t.scale, scale);
    let center = t.screen_to_content(pt(400.0, 300.0));
    assert_close(center.x, 400.0);
    assert_close(center.y, 900.0);
}

#[test]
fn overview_rect_tracks_view() {
    let core = ready_direct();
    let rect = core.overview().unwrap();
    assert_close(rect.x, 0.0);
    assert_close(rect.width, 1.0);
}

// =============================================================
// Layers
// =============================================================

#[test]
fn layer_toggle_round_trip_restores_frame() {
    let mut core = ready_direct();
    let before = core.frame();
    let actions = core.set_layer_visible(LayerId::Added, false);
    assert!(has_render_needed(&actions));
    assert!(!visible_layers(&core).contains(&LayerId::Added));
    core.set_layer_visible(LayerId::Added, true);
    assert_eq!(core.frame(), before);
}

#[test]
fn toggling_never_requests_reload() {
    let mut core = ready_direct();
    let off = core.set_layer_visible(LayerId::Missing, false);
    let on = core.set_layer_visible(LayerId::Missing, true);
    assert!(loads(&off).is_empty() && loads(&on).is_empty());
    assert!(core.set_layer_visible(LayerId::Missing, true).is_empty());
}

#[test]
fn opacity_applies_to_every_overlay() {
    let mut core = ready_direct();
    core.set_opacity(25);
    let frame = core.frame().unwrap();
    assert_eq!(frame.items[0].alpha, 1.0);
    assert!(frame.items[1..].iter().all(|i| i.alpha == 0.25));
    assert!(core.set_opacity(25).is_empty());
}

#[test]
fn grayscale_swap_commits_on_load() {
    let mut core = ready_direct();
    let actions = core.set_base_grayscale(true);
    let requests = loads(&actions);
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, GRAY);
    // The color base keeps displaying meanwhile.
    assert_eq!(core.layers().unwrap().get(LayerId::Base).unwrap().source, BASE);

    let done = core.on_asset_loaded(requests[0].generation, &requests[0].key, image(1600, 1200));
    assert_eq!(core.layers().unwrap().get(LayerId::Base).unwrap().source, GRAY);
    let old = AssetKey::Layer { layer: LayerId::Base, source: BASE.into() };
    assert!(done.contains(&Action::Release { generation: Generation(1), key: old }));
    assert_eq!(core.frame().unwrap().items[0].asset, requests[0].key);
}

#[test]
fn failed_grayscale_swap_keeps_color() {
    let mut core = ready_direct();
    let requests = loads(&core.set_base_grayscale(true));
    core.on_asset_loaded(requests[0].generation, &requests[0].key, AssetOutcome::Failed("404".into()));
    assert_eq!(core.status(), &DisplayStatus::Ready);
    assert_eq!(core.layers().unwrap().get(LayerId::Base).unwrap().source, BASE);
    assert_eq!(visible_layers(&core)[0], LayerId::Base);
}

#[test]
fn grayscale_without_gray_source_is_ignored() {
    let mut raw = session_json(0, 3);
    raw["images"].as_object_mut().unwrap().remove("base_grayscale");
    let mut core = core(BackendKind::Direct);
    let requests = loads(&core.load_session(&SessionResult::from_json(&raw.to_string()).unwrap()));
    complete_all(&mut core, &requests);
    assert!(core.set_base_grayscale(true).is_empty());
    assert_eq!(core.layers().unwrap().get(LayerId::Base).unwrap().source, BASE);
}

// =============================================================
// Pages
// =============================================================

#[test]
fn page_navigation_is_bounded() {
    let mut core = core(BackendKind::Direct);
    core.load_session(&session(0, 2));
    assert!(core.prev_page().is_empty());
    assert_eq!(core.next_page(), vec![Action::PageRequested(1)]);
    core.load_session(&session(1, 2));
    assert!(core.next_page().is_empty());
    assert_eq!(core.prev_page(), vec![Action::PageRequested(0)]);
}

// =============================================================
// Tiled strategy
// =============================================================

#[test]
fn tiled_session_streams_tiles_after_descriptor() {
    let mut core = core(BackendKind::Tiled);
    let actions = core.load_session(&session(0, 3));
    let requests = loads(&actions);
    assert_eq!(requests[0].key, AssetKey::Descriptor { url: DZI.into() });
    // Content size is known from the session; the view is fitted up front.
    assert_close(core.transform().scale, 0.5);

    let after = core.on_asset_loaded(requests[0].generation, &requests[0].key, AssetOutcome::Text(DZI_XML.into()));
    assert_eq!(core.status(), &DisplayStatus::Ready);
    let tiles: Vec<TileCoord> = loads(&after)
        .into_iter()
        .filter_map(|r| match r.key {
            AssetKey::Tile { coord } => Some(coord),
            _ => None,
        })
        .collect();
    assert!(!tiles.is_empty());
    assert!(tiles.iter().all(|c| c.level == 10));
}

#[test]
fn tiled_malformed_descriptor_is_unavailable() {
    let mut core = core(BackendKind::Tiled);
    let requests = loads(&core.load_session(&session(0, 3)));
    core.on_asset_loaded(requests[0].generation, &requests[0].key, AssetOutcome::Text("<nope/>".into()));
    assert!(matches!(core.status(), DisplayStatus::Unavailable(_)));
    assert!(core.frame().is_none());
}

#[test]
fn tiled_ignores_grayscale() {
    let mut core = core(BackendKind::Tiled);
    core.load_session(&session(0, 3));
    assert!(core.set_base_grayscale(true).is_empty());
}

// =============================================================
// Actions
// =============================================================

#[test]
fn render_needed_is_emitted_once_and_last() {
    let mut core = ready_direct();
    let actions = core.zoom_in();
    assert_eq!(actions.iter().filter(|a| **a == Action::RenderNeeded).count(), 1);
    assert_eq!(actions.last(), Some(&Action::RenderNeeded));
}

#[test]
fn actions_serialize_tagged() {
    let v = serde_json::to_value(Action::PageRequested(2)).unwrap();
    assert_eq!(v, json!({ "action": "page_requested", "data": 2 }));
    let v = serde_json::to_value(Action::StatusChanged(DisplayStatus::Unavailable("x".into()))).unwrap();
    assert_eq!(v["data"], json!({ "state": "unavailable", "reason": "x" }));
}
