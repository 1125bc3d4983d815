//! Engine: ties the viewport, input, layers, and the active render backend
//! into one display context per session.
//!
//! [`EngineCore`] holds all logic and has no browser dependencies, so it runs
//! natively in tests and in the `drawcmp` harness. [`Engine`] wraps it with a
//! canvas element and the decoded images the host hands over.
//!
//! Every entry point returns a list of [`Action`]s for the host: assets to
//! load or release, redraw requests, measurements, and status changes.

use std::collections::HashMap;

use serde::Serialize;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlImageElement};

use crate::backend::{
    self, AssetKey, AssetOutcome, AssetRequest, BackendInit, Effect, Frame, GpuCaps, Generation, RenderBackend,
    ViewContext,
};
use crate::config::{BackendKind, ViewerConfig};
use crate::coords::{self, ClickMeasurement, ContentSpace, Point, Size, ViewportTransform};
use crate::error::{ErrorCode, ViewerError};
use crate::gl::GlRenderer;
use crate::input::{Button, Gesture, InputController, WheelDelta};
use crate::layers::{LayerId, LayerStack};
use crate::minimap::{self, MinimapSync, OverviewRect};
use crate::render;
use crate::session::{DiffStats, SessionResult};
use crate::viewport::ViewportState;

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

const CURSOR_IDLE: &str = "grab";
const CURSOR_DRAGGING: &str = "grabbing";

/// Actions returned from engine entry points for the host to process.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum Action {
    /// Fetch and decode an asset, then report it via `on_asset_loaded`.
    Load(AssetRequest),
    /// Drop host-side decoded data for an asset.
    Release { generation: Generation, key: AssetKey },
    RenderNeeded,
    Measured(ClickMeasurement),
    OverviewChanged(OverviewRect),
    /// Ask the host to fetch the processing result for another page.
    PageRequested(u32),
    SetCursor(String),
    StatusChanged(DisplayStatus),
}

/// What the viewer surface is currently showing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum DisplayStatus {
    /// No session has been loaded.
    #[default]
    Empty,
    /// Waiting for the base layer, or the session data was incomplete.
    Loading,
    Ready,
    /// The session cannot be displayed. A fresh session is required.
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageInfo {
    current: u32,
    total: u32,
}

/// Everything tied to one session. Replaced wholesale on page change.
struct DisplayContext {
    session_id: String,
    scaling_factor: f64,
    layers: LayerStack,
    backend: Box<dyn RenderBackend>,
    content: Option<ContentSpace>,
    base_color: String,
    base_grayscale: Option<String>,
    stats: DiffStats,
}

/// Core engine state. All logic that doesn't depend on the canvas element.
pub struct EngineCore {
    config: ViewerConfig,
    gpu: GpuCaps,
    generation: Generation,
    viewport: ViewportState,
    input: InputController,
    minimap: MinimapSync,
    display: Option<DisplayContext>,
    page: Option<PageInfo>,
    status: DisplayStatus,
    measurement: Option<ClickMeasurement>,
    dpr: f64,
    needs_fit: bool,
}

impl Default for EngineCore {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}

impl EngineCore {
    #[must_use]
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            viewport: ViewportState::new(config.scale_limits(), Size::default()),
            input: InputController::new(config.input_settings()),
            minimap: MinimapSync::new(config.minimap_min_extent),
            gpu: GpuCaps::default(),
            generation: Generation::default(),
            display: None,
            page: None,
            status: DisplayStatus::Empty,
            measurement: None,
            dpr: 1.0,
            needs_fit: false,
            config,
        }
    }

    /// Capabilities the GPU strategy checks at initialization.
    pub fn set_gpu_caps(&mut self, caps: GpuCaps) {
        self.gpu = caps;
    }

    // --- Session ---

    /// Install a new processing result, replacing the current session.
    ///
    /// Loads still in flight for the previous session are invalidated: their
    /// completions carry an old generation and are discarded.
    pub fn load_session(&mut self, session: &SessionResult) -> Vec<Action> {
        let mut actions = self.teardown();
        self.generation = self.generation.next();
        self.viewport = ViewportState::new(self.config.scale_limits(), self.viewport.viewport_size());
        self.input = InputController::new(self.config.input_settings());
        self.minimap = MinimapSync::new(self.config.minimap_min_extent);
        self.measurement = None;
        self.needs_fit = true;
        self.page = None;

        let layout = match session.layout(self.config.backend, self.config.default_opacity) {
            Ok(layout) => layout,
            Err(e) => {
                tracing::warn!(session_id = %session.session_id, error = %e, code = e.error_code(), "session data rejected");
                self.set_status(DisplayStatus::Loading, &mut actions);
                actions.push(Action::RenderNeeded);
                return actions;
            }
        };
        self.page = Some(PageInfo { current: session.current_page, total: session.total_pages });

        let init = BackendInit {
            generation: self.generation,
            layers: &layout.layers,
            tiles: layout.tiles.as_ref(),
            tile_cache_budget: self.config.tile_cache_budget,
            gpu: self.gpu,
        };
        let (backend, effects) = match backend::initialize(self.config.backend, init) {
            Ok(ok) => ok,
            Err(e) => {
                tracing::error!(session_id = %session.session_id, backend = %self.config.backend, error = %e, "backend initialization failed");
                self.set_status(DisplayStatus::Unavailable(e.to_string()), &mut actions);
                actions.push(Action::RenderNeeded);
                return actions;
            }
        };

        tracing::info!(
            session_id = %session.session_id,
            generation = %self.generation,
            backend = %self.config.backend,
            page = session.current_page,
            total_pages = session.total_pages,
            "session installed"
        );
        self.display = Some(DisplayContext {
            session_id: session.session_id.clone(),
            scaling_factor: layout.scaling_factor,
            layers: layout.layers,
            backend,
            content: layout.content,
            base_color: layout.base_color,
            base_grayscale: layout.base_grayscale,
            stats: session.stats.clone(),
        });
        self.set_status(DisplayStatus::Loading, &mut actions);
        self.apply_effects(effects, &mut actions);
        self.fit_if_pending();
        self.sync_view(&mut actions);
        finish(actions)
    }

    /// Destroy the current display context, returning releases for everything it held.
    fn teardown(&mut self) -> Vec<Action> {
        let Some(ctx) = self.display.take() else {
            return Vec::new();
        };
        let generation = ctx.backend.generation();
        tracing::debug!(session_id = %ctx.session_id, %generation, "tearing down display");
        ctx.backend
            .destroy()
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::Release(key) => Some(Action::Release { generation, key }),
                _ => None,
            })
            .collect()
    }

    /// End the current session's display after a session-fatal error.
    fn fail_session(&mut self, error: &ViewerError, actions: &mut Vec<Action>) {
        tracing::error!(error = %error, code = error.error_code(), generation = %self.generation, "session cannot be displayed");
        actions.extend(self.teardown());
        if self.input.pointer_cancel() == Gesture::DragEnded {
            actions.push(Action::SetCursor(CURSOR_IDLE.into()));
        }
        let status = match error {
            ViewerError::InvalidSessionData(_) => DisplayStatus::Loading,
            _ => DisplayStatus::Unavailable(error.to_string()),
        };
        self.set_status(status, actions);
        actions.push(Action::RenderNeeded);
    }

    fn set_status(&mut self, status: DisplayStatus, actions: &mut Vec<Action>) {
        if self.status != status {
            self.status = status.clone();
            actions.push(Action::StatusChanged(status));
        }
    }

    // --- Assets ---

    /// The host finished a load requested by an [`Action::Load`].
    pub fn on_asset_loaded(&mut self, generation: Generation, key: &AssetKey, outcome: AssetOutcome) -> Vec<Action> {
        let Some(ctx) = self.display.as_mut().filter(|_| generation == self.generation) else {
            tracing::debug!(%generation, current = %self.generation, %key, "discarding stale completion");
            return match outcome {
                AssetOutcome::Image { .. } => vec![Action::Release { generation, key: key.clone() }],
                _ => Vec::new(),
            };
        };
        let mut actions = Vec::new();
        match ctx.backend.on_asset(key, outcome) {
            Ok(effects) => self.apply_effects(effects, &mut actions),
            Err(e) => self.fail_session(&e, &mut actions),
        }
        finish(actions)
    }

    fn apply_effects(&mut self, effects: Vec<Effect>, actions: &mut Vec<Action>) {
        for effect in effects {
            match effect {
                Effect::Load(request) => actions.push(Action::Load(request)),
                Effect::Release(key) => actions.push(Action::Release { generation: self.generation, key }),
                Effect::Redraw => actions.push(Action::RenderNeeded),
                Effect::LayerLoaded { layer, source, width, height } => {
                    self.layer_loaded(layer, &source, width, height, actions);
                }
                Effect::LayerFailed { layer, source, reason } => self.layer_failed(layer, &source, reason, actions),
            }
        }
    }

    fn layer_loaded(&mut self, layer: LayerId, source: &str, width: u32, height: u32, actions: &mut Vec<Action>) {
        let Some(ctx) = self.display.as_mut() else {
            return;
        };
        let previous = ctx.layers.get(layer).map(|l| l.source.clone());
        let committed = ctx.layers.mark_loaded(layer, source);
        let current = ctx.layers.get(layer).map(|l| l.source.clone());

        // A swap committed: the old source is no longer needed. A swap that was
        // cancelled before landing: the new one is not needed.
        let unneeded = match (&previous, &current) {
            (Some(prev), Some(cur)) if committed && prev != cur => Some(prev.clone()),
            (_, Some(cur)) if !committed && cur != source => Some(source.to_string()),
            _ => None,
        };
        if let Some(unneeded) = unneeded {
            let key = AssetKey::Layer { layer, source: unneeded };
            if ctx.backend.release(&key) {
                actions.push(Action::Release { generation: self.generation, key });
            }
        }
        if !committed {
            return;
        }
        tracing::debug!(%layer, source, width, height, "layer loaded");

        if layer == LayerId::Base {
            let discovered = ContentSpace::new(f64::from(width), f64::from(height), ctx.scaling_factor);
            match (ctx.content, discovered) {
                (_, Err(e)) => {
                    self.fail_session(&e, actions);
                    return;
                }
                (None, Ok(content)) => {
                    ctx.content = Some(content);
                    self.needs_fit = true;
                }
                (Some(known), Ok(content)) if known.size() != content.size() => {
                    if ctx.backend.kind() == BackendKind::Tiled {
                        tracing::warn!(
                            known = %format!("{}x{}", known.width, known.height),
                            decoded = %format!("{}x{}", content.width, content.height),
                            "content size corrected from pyramid"
                        );
                        ctx.content = Some(content);
                        self.needs_fit = true;
                    }
                }
                (Some(_), Ok(_)) => {}
            }
            if self.status != DisplayStatus::Ready {
                tracing::info!(generation = %self.generation, "base layer ready");
                self.set_status(DisplayStatus::Ready, actions);
            }
            self.fit_if_pending();
            self.sync_view(actions);
        }
        actions.push(Action::RenderNeeded);
    }

    fn layer_failed(&mut self, layer: LayerId, source: &str, reason: String, actions: &mut Vec<Action>) {
        let Some(ctx) = self.display.as_mut() else {
            return;
        };
        let was_initial = ctx.layers.get(layer).is_some_and(|l| l.source == source);
        ctx.layers.mark_failed(layer, source);
        let error = ViewerError::AssetLoad { key: format!("{layer}:{source}"), reason };
        if layer == LayerId::Base && was_initial {
            let fatal = ViewerError::BackendInit(format!("base layer unavailable: {error}"));
            self.fail_session(&fatal, actions);
            return;
        }
        if was_initial {
            tracing::warn!(%layer, error = %error, retryable = error.retryable(), "overlay dropped");
        } else {
            tracing::warn!(%layer, error = %error, "source swap failed; keeping previous source");
        }
        actions.push(Action::RenderNeeded);
    }

    // --- Viewport ---

    /// Update viewport dimensions (CSS pixels) and device pixel ratio.
    pub fn set_viewport_size(&mut self, width: f64, height: f64, dpr: f64) -> Vec<Action> {
        self.viewport.set_viewport_size(Size::new(width.max(0.0), height.max(0.0)));
        self.dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
        let mut actions = Vec::new();
        self.fit_if_pending();
        self.sync_view(&mut actions);
        finish(actions)
    }

    fn fit_if_pending(&mut self) {
        if !self.needs_fit {
            return;
        }
        let Some(content) = self.content() else {
            return;
        };
        if self.viewport.viewport_size().is_positive() {
            self.viewport.fit_to_screen(&content, self.config.fit_margin);
            self.needs_fit = false;
        }
    }

    /// Push the committed transform to the backend and minimap.
    fn sync_view(&mut self, actions: &mut Vec<Action>) {
        self.input.rebase(self.viewport.transform().translation());
        let Some(ctx) = self.display.as_mut() else {
            return;
        };
        let view = ViewContext {
            transform: self.viewport.transform(),
            viewport: self.viewport.viewport_size(),
            dpr: self.dpr,
            content: ctx.content,
        };
        let effects = ctx.backend.update(&view);
        let content = ctx.content;
        self.apply_effects(effects, actions);
        if let Some(content) = content {
            self.minimap.mark_dirty();
            if let Some(rect) = self.minimap.sync(&view.transform, &content, view.viewport) {
                actions.push(Action::OverviewChanged(rect));
            }
        }
        actions.push(Action::RenderNeeded);
    }

    fn commit_if(&mut self, changed: bool) -> Vec<Action> {
        let mut actions = Vec::new();
        if changed {
            self.sync_view(&mut actions);
        }
        finish(actions)
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, at: Point, button: Button) -> Vec<Action> {
        match self.input.pointer_down(at, button, self.viewport.transform().translation()) {
            Gesture::DragStarted => vec![Action::SetCursor(CURSOR_DRAGGING.into())],
            _ => Vec::new(),
        }
    }

    pub fn on_pointer_move(&mut self, at: Point) -> Vec<Action> {
        match self.input.pointer_move(at) {
            Gesture::DragTo { origin_translate, offset } => {
                let changed = self.viewport.pan_from(origin_translate, offset);
                self.commit_if(changed)
            }
            _ => Vec::new(),
        }
    }

    /// Release. A short press becomes a measurement; anything longer was a drag.
    pub fn on_pointer_up(&mut self, at: Point) -> Vec<Action> {
        match self.input.pointer_up(at) {
            Gesture::Click(point) => {
                let mut actions = vec![Action::SetCursor(CURSOR_IDLE.into())];
                if let Some(content) = self.content() {
                    let m = coords::measure(point, &self.viewport.transform(), &content);
                    tracing::debug!(x = m.original_point.x, y = m.original_point.y, "click measured");
                    self.measurement = Some(m);
                    actions.push(Action::Measured(m));
                    actions.push(Action::RenderNeeded);
                }
                actions
            }
            Gesture::DragEnded => vec![Action::SetCursor(CURSOR_IDLE.into())],
            _ => Vec::new(),
        }
    }

    /// Pointer left the surface or the gesture was interrupted. Never measures.
    pub fn on_pointer_cancel(&mut self) -> Vec<Action> {
        match self.input.pointer_cancel() {
            Gesture::DragEnded => vec![Action::SetCursor(CURSOR_IDLE.into())],
            _ => Vec::new(),
        }
    }

    pub fn on_wheel(&mut self, at: Point, delta: WheelDelta) -> Vec<Action> {
        let gesture = self.input.wheel(at, delta);
        self.apply_zoom(gesture)
    }

    pub fn on_pinch(&mut self, center: Point, ratio: f64) -> Vec<Action> {
        let gesture = self.input.pinch(center, ratio);
        self.apply_zoom(gesture)
    }

    pub fn on_double_click(&mut self, at: Point) -> Vec<Action> {
        let gesture = self.input.double_click(at);
        self.apply_zoom(gesture)
    }

    fn apply_zoom(&mut self, gesture: Gesture) -> Vec<Action> {
        let Gesture::Zoom { factor, anchor } = gesture else {
            return Vec::new();
        };
        let changed = self.viewport.zoom(factor, anchor);
        self.commit_if(changed)
    }

    // --- Toolbar ---

    pub fn zoom_in(&mut self) -> Vec<Action> {
        let center = self.viewport.viewport_size().center();
        let changed = self.viewport.zoom(1.0 + self.config.wheel_step, center);
        self.commit_if(changed)
    }

    pub fn zoom_out(&mut self) -> Vec<Action> {
        let center = self.viewport.viewport_size().center();
        let changed = self.viewport.zoom(1.0 / (1.0 + self.config.wheel_step), center);
        self.commit_if(changed)
    }

    pub fn fit_to_screen(&mut self) -> Vec<Action> {
        let Some(content) = self.content() else {
            return Vec::new();
        };
        let changed = self.viewport.fit_to_screen(&content, self.config.fit_margin);
        self.commit_if(changed)
    }

    /// Recentre the view on a normalized minimap position, keeping scale.
    pub fn on_minimap_click(&mut self, normalized: Point) -> Vec<Action> {
        let Some(content) = self.content() else {
            return Vec::new();
        };
        let changed = self.viewport.center_on(minimap::normalized_to_content(normalized, &content));
        self.commit_if(changed)
    }

    pub fn next_page(&mut self) -> Vec<Action> {
        match self.page {
            Some(p) if p.current + 1 < p.total => vec![Action::PageRequested(p.current + 1)],
            _ => Vec::new(),
        }
    }

    pub fn prev_page(&mut self) -> Vec<Action> {
        match self.page {
            Some(p) if p.current > 0 => vec![Action::PageRequested(p.current - 1)],
            _ => Vec::new(),
        }
    }

    // --- Layers ---

    pub fn set_layer_visible(&mut self, layer: LayerId, visible: bool) -> Vec<Action> {
        let Some(ctx) = self.display.as_mut() else {
            return Vec::new();
        };
        let Some(patch) = ctx.layers.set_visible(layer, visible) else {
            return Vec::new();
        };
        let effects = ctx.backend.apply_layer_change(layer, &patch);
        let mut actions = Vec::new();
        self.apply_effects(effects, &mut actions);
        finish(actions)
    }

    /// Shared overlay opacity, 0–100.
    pub fn set_opacity(&mut self, value: u8) -> Vec<Action> {
        let Some(ctx) = self.display.as_mut() else {
            return Vec::new();
        };
        let Some(patch) = ctx.layers.set_opacity(value) else {
            return Vec::new();
        };
        let mut effects = Vec::new();
        for layer in LayerId::OVERLAYS {
            effects.extend(ctx.backend.apply_layer_change(layer, &patch));
        }
        let mut actions = Vec::new();
        self.apply_effects(effects, &mut actions);
        finish(actions)
    }

    /// Switch the base layer between its color and grayscale renderings.
    pub fn set_base_grayscale(&mut self, grayscale: bool) -> Vec<Action> {
        let Some(ctx) = self.display.as_mut() else {
            return Vec::new();
        };
        if ctx.backend.kind() == BackendKind::Tiled {
            tracing::warn!("grayscale base is not available for tiled pyramids");
            return Vec::new();
        }
        let target = if grayscale {
            let Some(gray) = ctx.base_grayscale.clone() else {
                tracing::warn!(session_id = %ctx.session_id, "session has no grayscale base");
                return Vec::new();
            };
            gray
        } else {
            ctx.base_color.clone()
        };
        let Some(patch) = ctx.layers.swap_source(LayerId::Base, target) else {
            return Vec::new();
        };
        let effects = ctx.backend.apply_layer_change(LayerId::Base, &patch);
        let mut actions = Vec::new();
        self.apply_effects(effects, &mut actions);
        finish(actions)
    }

    // --- Queries ---

    /// Draw list for the current state, if a session is displayed.
    #[must_use]
    pub fn frame(&self) -> Option<Frame> {
        self.display.as_ref().map(|d| d.backend.frame(&d.layers))
    }

    #[must_use]
    pub fn status(&self) -> &DisplayStatus {
        &self.status
    }

    #[must_use]
    pub fn transform(&self) -> ViewportTransform {
        self.viewport.transform()
    }

    #[must_use]
    pub fn viewport_size(&self) -> Size {
        self.viewport.viewport_size()
    }

    #[must_use]
    pub fn dpr(&self) -> f64 {
        self.dpr
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[must_use]
    pub fn measurement(&self) -> Option<ClickMeasurement> {
        self.measurement
    }

    #[must_use]
    pub fn overview(&self) -> Option<OverviewRect> {
        self.minimap.rect()
    }

    #[must_use]
    pub fn content(&self) -> Option<ContentSpace> {
        self.display.as_ref().and_then(|d| d.content)
    }

    #[must_use]
    pub fn layers(&self) -> Option<&LayerStack> {
        self.display.as_ref().map(|d| &d.layers)
    }

    #[must_use]
    pub fn stats(&self) -> Option<&DiffStats> {
        self.display.as_ref().map(|d| &d.stats)
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.display.as_ref().map(|d| d.session_id.as_str())
    }

    #[must_use]
    pub fn current_page(&self) -> Option<u32> {
        self.page.map(|p| p.current)
    }

    #[must_use]
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }
}

/// Collapse repeated redraw requests into one, at the end.
fn finish(mut actions: Vec<Action>) -> Vec<Action> {
    let before = actions.len();
    actions.retain(|a| *a != Action::RenderNeeded);
    if actions.len() != before {
        actions.push(Action::RenderNeeded);
    }
    actions
}

/// The browser engine. Wraps `EngineCore` and owns the canvas, the decoded
/// images, and for the GPU strategy the `WebGL2` renderer.
pub struct Engine {
    canvas: HtmlCanvasElement,
    images: HashMap<AssetKey, HtmlImageElement>,
    gl: Option<GlRenderer>,
    pub core: EngineCore,
}

impl Engine {
    /// Create an engine bound to the given canvas element.
    ///
    /// With the GPU strategy configured this acquires the `webgl2` context up
    /// front and reports its limits to the core. Without one, sessions become
    /// unavailable instead of falling back.
    #[must_use]
    pub fn new(canvas: HtmlCanvasElement, config: ViewerConfig) -> Self {
        let backend = config.backend;
        let mut core = EngineCore::new(config);
        let gl = match backend {
            BackendKind::Gpu => match GlRenderer::new(&canvas) {
                Ok(renderer) => {
                    core.set_gpu_caps(renderer.caps());
                    Some(renderer)
                }
                Err(e) => {
                    tracing::warn!(error = ?e, "webgl2 unavailable");
                    core.set_gpu_caps(GpuCaps { available: false, max_texture_size: 0 });
                    None
                }
            },
            BackendKind::Direct | BackendKind::Tiled => None,
        };
        Self { canvas, images: HashMap::new(), gl, core }
    }

    /// Drop images and textures the core no longer references.
    fn track(&mut self, actions: Vec<Action>) -> Vec<Action> {
        for action in &actions {
            if let Action::Release { key, .. } = action {
                self.images.remove(key);
                if let Some(gl) = self.gl.as_mut() {
                    gl.release(key);
                }
            }
        }
        actions
    }

    pub fn load_session(&mut self, session: &SessionResult) -> Vec<Action> {
        let actions = self.core.load_session(session);
        self.track(actions)
    }

    /// Hand over a decoded image for a previous [`Action::Load`].
    pub fn on_image_loaded(&mut self, generation: Generation, key: AssetKey, image: HtmlImageElement) -> Vec<Action> {
        let outcome = AssetOutcome::Image { width: image.natural_width(), height: image.natural_height() };
        self.images.insert(key.clone(), image);
        let actions = self.core.on_asset_loaded(generation, &key, outcome);
        self.track(actions)
    }

    /// Report a text payload (pyramid descriptor) or a failure.
    pub fn on_asset_loaded(&mut self, generation: Generation, key: &AssetKey, outcome: AssetOutcome) -> Vec<Action> {
        let actions = self.core.on_asset_loaded(generation, key, outcome);
        self.track(actions)
    }

    pub fn set_viewport_size(&mut self, width: f64, height: f64, dpr: f64) -> Vec<Action> {
        let actions = self.core.set_viewport_size(width, height, dpr);
        self.track(actions)
    }

    pub fn zoom_in(&mut self) -> Vec<Action> {
        let actions = self.core.zoom_in();
        self.track(actions)
    }

    pub fn zoom_out(&mut self) -> Vec<Action> {
        let actions = self.core.zoom_out();
        self.track(actions)
    }

    pub fn fit_to_screen(&mut self) -> Vec<Action> {
        let actions = self.core.fit_to_screen();
        self.track(actions)
    }

    pub fn on_pointer_down(&mut self, at: Point, button: Button) -> Vec<Action> {
        self.core.on_pointer_down(at, button)
    }

    pub fn on_pointer_move(&mut self, at: Point) -> Vec<Action> {
        let actions = self.core.on_pointer_move(at);
        self.track(actions)
    }

    pub fn on_pointer_up(&mut self, at: Point) -> Vec<Action> {
        self.core.on_pointer_up(at)
    }

    pub fn on_pointer_cancel(&mut self) -> Vec<Action> {
        self.core.on_pointer_cancel()
    }

    pub fn on_wheel(&mut self, at: Point, delta: WheelDelta) -> Vec<Action> {
        let actions = self.core.on_wheel(at, delta);
        self.track(actions)
    }

    pub fn on_pinch(&mut self, center: Point, ratio: f64) -> Vec<Action> {
        let actions = self.core.on_pinch(center, ratio);
        self.track(actions)
    }

    pub fn on_double_click(&mut self, at: Point) -> Vec<Action> {
        let actions = self.core.on_double_click(at);
        self.track(actions)
    }

    pub fn on_minimap_click(&mut self, normalized: Point) -> Vec<Action> {
        let actions = self.core.on_minimap_click(normalized);
        self.track(actions)
    }

    pub fn set_layer_visible(&mut self, layer: LayerId, visible: bool) -> Vec<Action> {
        self.core.set_layer_visible(layer, visible)
    }

    pub fn set_opacity(&mut self, value: u8) -> Vec<Action> {
        self.core.set_opacity(value)
    }

    pub fn set_base_grayscale(&mut self, grayscale: bool) -> Vec<Action> {
        let actions = self.core.set_base_grayscale(grayscale);
        self.track(actions)
    }

    // --- Render ---

    /// Draw the current frame to the canvas.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the drawing context is unavailable or a draw call fails.
    pub fn render(&mut self) -> Result<(), JsValue> {
        let viewport = self.core.viewport_size();
        let marker = self.core.measurement().map(|m| m.content_point);
        if let Some(gl) = self.gl.as_mut() {
            match self.core.frame() {
                Some(frame) => gl.draw(&frame, &self.images, marker, viewport)?,
                None => gl.draw_placeholder(),
            }
            return Ok(());
        }
        let ctx = self
            .canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
            .dyn_into::<CanvasRenderingContext2d>()?;
        match self.core.frame() {
            Some(frame) => render::draw(&ctx, &frame, &self.images, marker, viewport, self.core.dpr()),
            None => render::draw_placeholder(&ctx, self.core.status(), viewport, self.core.dpr()),
        }
    }
}
