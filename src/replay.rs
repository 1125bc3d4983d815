//! Scripted replay: drive an [`EngineCore`] with recorded input, acting as the
//! host for every asset request.
//!
//! A script is JSON with two parts: `fixtures` describe what each load
//! resolves to, `events` are fed to the engine in order. Loads are satisfied
//! synchronously after each event, so a script observes the same state the
//! browser would once every pending fetch has landed.

#[cfg(test)]
#[path = "replay_test.rs"]
mod replay_test;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use viewer::backend::{AssetKey, AssetOutcome, AssetRequest, GpuCaps};
use viewer::config::ViewerConfig;
use viewer::coords::{ClickMeasurement, Point, ViewportTransform};
use viewer::engine::{Action, DisplayStatus, EngineCore};
use viewer::input::{Button, WheelDelta};
use viewer::layers::{CompositeEntry, LayerId, LayerStack};
use viewer::minimap::OverviewRect;
use viewer::session::SessionResult;

use crate::CliError;

const DEFAULT_TILE_PIXELS: u32 = 256;

/// Decoded size reported for layer images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

/// How the simulated host answers loads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Fixtures {
    /// Natural size of every layer image. Layer loads fail without it.
    pub base_size: Option<PixelSize>,
    /// Body of the pyramid descriptor document.
    pub descriptor: Option<String>,
    /// URLs whose loads fail.
    pub fail: Vec<String>,
    /// Edge length reported for decoded tiles.
    pub tile_pixels: Option<u32>,
}

impl Fixtures {
    fn outcome(&self, request: &AssetRequest) -> AssetOutcome {
        if self.fail.iter().any(|url| url == &request.url) {
            return AssetOutcome::Failed(format!("{} marked as failing", request.url));
        }
        match &request.key {
            AssetKey::Layer { .. } => match self.base_size {
                Some(size) => AssetOutcome::Image { width: size.width, height: size.height },
                None => AssetOutcome::Failed("no base_size fixture".into()),
            },
            AssetKey::Descriptor { .. } => match &self.descriptor {
                Some(xml) => AssetOutcome::Text(xml.clone()),
                None => AssetOutcome::Failed("no descriptor fixture".into()),
            },
            AssetKey::Tile { .. } => {
                let edge = self.tile_pixels.unwrap_or(DEFAULT_TILE_PIXELS);
                AssetOutcome::Image { width: edge, height: edge }
            }
        }
    }
}

fn primary() -> Button {
    Button::Primary
}

fn unit_dpr() -> f64 {
    1.0
}

/// One recorded input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    Resize {
        width: f64,
        height: f64,
        #[serde(default = "unit_dpr")]
        dpr: f64,
    },
    PointerDown {
        x: f64,
        y: f64,
        #[serde(default = "primary")]
        button: Button,
    },
    PointerMove { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    PointerCancel,
    Wheel {
        x: f64,
        y: f64,
        #[serde(default)]
        dx: f64,
        dy: f64,
    },
    Pinch { x: f64, y: f64, ratio: f64 },
    DoubleClick { x: f64, y: f64 },
    /// Normalized `[0, 1]` minimap position.
    MinimapClick { x: f64, y: f64 },
    ToggleLayer { layer: LayerId, visible: bool },
    Opacity { value: u8 },
    Grayscale { enabled: bool },
    Fit,
    ZoomIn,
    ZoomOut,
    NextPage,
    PrevPage,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Script {
    pub fixtures: Fixtures,
    pub events: Vec<ScriptEvent>,
}

impl Script {
    /// # Errors
    ///
    /// Returns `InvalidJson` for malformed scripts or unknown events.
    pub fn from_json(raw: &str) -> Result<Self, CliError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// End state after the last event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub session_id: Option<String>,
    pub status: DisplayStatus,
    pub transform: ViewportTransform,
    pub overview: Option<OverviewRect>,
    pub visible_layers: Vec<CompositeEntry>,
    pub frame_items: usize,
    pub page_requests: Vec<u32>,
    pub cursor: Option<String>,
    pub loads: usize,
    pub releases: usize,
}

/// A line of replay output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportLine<'a> {
    Measurement(&'a ClickMeasurement),
    Summary(&'a Summary),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub measurements: Vec<ClickMeasurement>,
    pub summary: Summary,
}

impl ReplayReport {
    /// Measurements in order, then the summary.
    pub fn lines(&self) -> impl Iterator<Item = ReportLine<'_>> {
        self.measurements
            .iter()
            .map(ReportLine::Measurement)
            .chain(std::iter::once(ReportLine::Summary(&self.summary)))
    }
}

/// Simulated host around one engine.
struct Host<'a> {
    core: EngineCore,
    fixtures: &'a Fixtures,
    queue: VecDeque<AssetRequest>,
    measurements: Vec<ClickMeasurement>,
    page_requests: Vec<u32>,
    cursor: Option<String>,
    loads: usize,
    releases: usize,
}

impl Host<'_> {
    fn absorb(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Load(request) => {
                    self.loads += 1;
                    self.queue.push_back(request);
                }
                Action::Release { .. } => self.releases += 1,
                Action::Measured(m) => self.measurements.push(m),
                Action::PageRequested(page) => self.page_requests.push(page),
                Action::SetCursor(cursor) => self.cursor = Some(cursor),
                Action::StatusChanged(status) => tracing::debug!(?status, "status changed"),
                Action::RenderNeeded | Action::OverviewChanged(_) => {}
            }
        }
    }

    /// Answer every queued load, including loads those answers trigger.
    fn settle(&mut self) {
        while let Some(request) = self.queue.pop_front() {
            let outcome = self.fixtures.outcome(&request);
            tracing::trace!(key = %request.key, url = %request.url, "resolving load");
            let actions = self.core.on_asset_loaded(request.generation, &request.key, outcome);
            self.absorb(actions);
        }
    }

    fn dispatch(&mut self, event: &ScriptEvent) -> Vec<Action> {
        let core = &mut self.core;
        match *event {
            ScriptEvent::Resize { width, height, dpr } => core.set_viewport_size(width, height, dpr),
            ScriptEvent::PointerDown { x, y, button } => core.on_pointer_down(Point::new(x, y), button),
            ScriptEvent::PointerMove { x, y } => core.on_pointer_move(Point::new(x, y)),
            ScriptEvent::PointerUp { x, y } => core.on_pointer_up(Point::new(x, y)),
            ScriptEvent::PointerCancel => core.on_pointer_cancel(),
            ScriptEvent::Wheel { x, y, dx, dy } => core.on_wheel(Point::new(x, y), WheelDelta { dx, dy }),
            ScriptEvent::Pinch { x, y, ratio } => core.on_pinch(Point::new(x, y), ratio),
            ScriptEvent::DoubleClick { x, y } => core.on_double_click(Point::new(x, y)),
            ScriptEvent::MinimapClick { x, y } => core.on_minimap_click(Point::new(x, y)),
            ScriptEvent::ToggleLayer { layer, visible } => core.set_layer_visible(layer, visible),
            ScriptEvent::Opacity { value } => core.set_opacity(value),
            ScriptEvent::Grayscale { enabled } => core.set_base_grayscale(enabled),
            ScriptEvent::Fit => core.fit_to_screen(),
            ScriptEvent::ZoomIn => core.zoom_in(),
            ScriptEvent::ZoomOut => core.zoom_out(),
            ScriptEvent::NextPage => core.next_page(),
            ScriptEvent::PrevPage => core.prev_page(),
        }
    }

    fn summary(self) -> Summary {
        let core = self.core;
        Summary {
            session_id: core.session_id().map(str::to_string),
            status: core.status().clone(),
            transform: core.transform(),
            overview: core.overview(),
            visible_layers: core.layers().map(LayerStack::composition).unwrap_or_default(),
            frame_items: core.frame().map_or(0, |f| f.items.len()),
            page_requests: self.page_requests,
            cursor: self.cursor,
            loads: self.loads,
            releases: self.releases,
        }
    }
}

/// Install `session`, settle its initial loads, then play `script`.
pub fn run(config: ViewerConfig, gpu: GpuCaps, session: &SessionResult, script: &Script) -> ReplayReport {
    let mut core = EngineCore::new(config);
    core.set_gpu_caps(gpu);
    let mut host = Host {
        core,
        fixtures: &script.fixtures,
        queue: VecDeque::new(),
        measurements: Vec::new(),
        page_requests: Vec::new(),
        cursor: None,
        loads: 0,
        releases: 0,
    };

    let actions = host.core.load_session(session);
    host.absorb(actions);
    host.settle();

    for (index, event) in script.events.iter().enumerate() {
        tracing::debug!(index, ?event, "replaying event");
        let actions = host.dispatch(event);
        host.absorb(actions);
        host.settle();
    }

    let measurements = std::mem::take(&mut host.measurements);
    ReplayReport { measurements, summary: host.summary() }
}
