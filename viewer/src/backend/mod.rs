//! Render backends: three interchangeable compositing strategies behind one
//! contract.
//!
//! [`initialize`] returns the backend as an owned resource object; every
//! later call goes through that object and [`RenderBackend::destroy`] hands
//! back a release for everything it acquired. Backends never fetch anything
//! themselves. They emit [`Effect::Load`] requests tagged with the session
//! [`Generation`] and the engine reports completions through
//! [`RenderBackend::on_asset`].
//!
//! | Strategy | Base layer | Overlays |
//! |----------|------------|----------|
//! | [`direct`] | one decoded image | decoded images |
//! | [`tiled`] | tile pyramid, visible tiles only | decoded images in normalized coordinates |
//! | [`gpu`] | texture | textures, depth-sorted sprites |

pub mod direct;
pub mod gpu;
mod raster;
pub mod tiled;

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;

use std::fmt;

use serde::Serialize;

use crate::config::BackendKind;
use crate::coords::{ContentSpace, Rect, Size, ViewportTransform};
use crate::error::ViewerError;
use crate::layers::{LayerId, LayerPatch, LayerStack};
use crate::pyramid::TileCoord;
use crate::session::TileSource;

/// Identifies which session a load belongs to. Bumped on every page change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct Generation(pub u64);

impl Generation {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// A fetchable resource owned by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetKey {
    /// A full layer raster at a specific source URL.
    Layer { layer: LayerId, source: String },
    /// The pyramid descriptor document.
    Descriptor { url: String },
    /// One pyramid tile.
    Tile { coord: TileCoord },
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Layer { layer, source } => write!(f, "{layer}:{source}"),
            Self::Descriptor { url } => write!(f, "descriptor:{url}"),
            Self::Tile { coord } => write!(f, "tile:{coord}"),
        }
    }
}

/// A load the host should perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetRequest {
    pub generation: Generation,
    pub key: AssetKey,
    pub url: String,
}

/// What the host reports back for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetOutcome {
    /// An image decoded with its natural size.
    Image { width: u32, height: u32 },
    /// A text document (the pyramid descriptor).
    Text(String),
    /// Fetch or decode failed.
    Failed(String),
}

/// Work a backend asks the engine to carry out.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Load(AssetRequest),
    /// Drop the host-side decoded data for this key.
    Release(AssetKey),
    /// A layer source finished loading. For the base layer this carries the
    /// content size.
    LayerLoaded { layer: LayerId, source: String, width: u32, height: u32 },
    /// A layer source could not be loaded.
    LayerFailed { layer: LayerId, source: String, reason: String },
    Redraw,
}

/// Host capabilities the GPU strategy depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuCaps {
    pub available: bool,
    pub max_texture_size: u32,
}

impl Default for GpuCaps {
    fn default() -> Self {
        Self { available: true, max_texture_size: 16_384 }
    }
}

/// Inputs to [`initialize`].
#[derive(Debug, Clone, Copy)]
pub struct BackendInit<'a> {
    pub generation: Generation,
    pub layers: &'a LayerStack,
    pub tiles: Option<&'a TileSource>,
    pub tile_cache_budget: usize,
    pub gpu: GpuCaps,
}

/// Everything a backend needs to know about the current view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewContext {
    pub transform: ViewportTransform,
    pub viewport: Size,
    pub dpr: f64,
    pub content: Option<ContentSpace>,
}

/// One positioned raster in a frame, in content coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawItem {
    pub layer: LayerId,
    pub z_index: u8,
    pub asset: AssetKey,
    pub dest: Rect,
    /// 0.0–1.0.
    pub alpha: f64,
}

/// A complete, ordered draw list. Items paint bottom-first under `transform`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub backend: BackendKind,
    pub transform: ViewportTransform,
    pub items: Vec<DrawItem>,
}

/// The contract every compositing strategy implements.
pub trait RenderBackend {
    fn kind(&self) -> BackendKind;

    fn generation(&self) -> Generation;

    /// Called on every committed transform change. Must stay cheap.
    fn update(&mut self, view: &ViewContext) -> Vec<Effect>;

    /// React to a layer change already applied to the [`LayerStack`].
    fn apply_layer_change(&mut self, layer: LayerId, patch: &LayerPatch) -> Vec<Effect>;

    /// A load for `key` completed.
    ///
    /// # Errors
    ///
    /// Returns `BackendInit` when the completion makes the backend unusable
    /// (e.g. an unparsable pyramid descriptor).
    fn on_asset(&mut self, key: &AssetKey, outcome: AssetOutcome) -> Result<Vec<Effect>, ViewerError>;

    /// Drop a resource the engine no longer needs. Returns `true` if it was held.
    fn release(&mut self, key: &AssetKey) -> bool;

    /// Build the draw list for the current state.
    fn frame(&self, layers: &LayerStack) -> Frame;

    /// Release everything acquired since [`initialize`].
    fn destroy(self: Box<Self>) -> Vec<Effect>;
}

/// Bring up the backend for `kind`.
///
/// # Errors
///
/// Returns `BackendInit` if the strategy cannot run with these inputs (no
/// pyramid for the tiled strategy, no GPU context, a zero tile budget).
pub fn initialize(kind: BackendKind, init: BackendInit<'_>) -> Result<(Box<dyn RenderBackend>, Vec<Effect>), ViewerError> {
    match kind {
        BackendKind::Direct => {
            let (backend, effects) = direct::DirectBackend::initialize(init);
            Ok((Box::new(backend), effects))
        }
        BackendKind::Tiled => {
            let (backend, effects) = tiled::TiledBackend::initialize(init)?;
            Ok((Box::new(backend), effects))
        }
        BackendKind::Gpu => {
            let (backend, effects) = gpu::GpuBackend::initialize(init)?;
            Ok((Box::new(backend), effects))
        }
    }
}
