//! Tiled strategy: the base layer is streamed from a deep-zoom pyramid and
//! overlays are whole rasters placed in normalized coordinates.
//!
//! Only tiles intersecting the visible content rect are requested. Cached
//! tiles that leave the view are evicted immediately; the rest are held in
//! an LRU bounded by the tile budget. Coarser cached tiles keep painting
//! underneath while finer ones stream in, and are the first to go when the
//! cache is full. Tiles at the level the view needs are never evicted: the
//! cache grows past the budget to hold them all.

#[cfg(test)]
#[path = "tiled_test.rs"]
mod tiled_test;

use std::collections::HashSet;
use std::num::NonZeroUsize;

use lru::LruCache;

use super::raster::RasterSet;
use super::{AssetKey, AssetOutcome, AssetRequest, BackendInit, DrawItem, Effect, Frame, Generation, RenderBackend, ViewContext};
use crate::config::BackendKind;
use crate::coords::{Rect, ViewportTransform};
use crate::error::ViewerError;
use crate::layers::{LayerId, LayerPatch, LayerStack};
use crate::pyramid::{DziDescriptor, Pyramid, TileCoord};
use crate::session::TileSource;

pub struct TiledBackend {
    generation: Generation,
    source: TileSource,
    pyramid: Option<Pyramid>,
    transform: ViewportTransform,
    /// Visible content rect from the last update.
    visible: Option<Rect>,
    tiles: LruCache<TileCoord, ()>,
    budget: NonZeroUsize,
    /// Tiles at the current level intersecting the view.
    wanted: HashSet<TileCoord>,
    pending_tiles: HashSet<TileCoord>,
    failed_tiles: HashSet<TileCoord>,
    overlays: RasterSet,
}

impl TiledBackend {
    /// Requests the descriptor and every overlay.
    ///
    /// # Errors
    ///
    /// Returns `BackendInit` if there is no pyramid or the tile budget is zero.
    pub fn initialize(init: BackendInit<'_>) -> Result<(Self, Vec<Effect>), ViewerError> {
        let source = init
            .tiles
            .cloned()
            .ok_or_else(|| ViewerError::BackendInit("tiled backend requires a tile pyramid".into()))?;
        let budget = NonZeroUsize::new(init.tile_cache_budget)
            .ok_or_else(|| ViewerError::BackendInit("tile cache budget must be positive".into()))?;

        let mut effects = vec![Effect::Load(AssetRequest {
            generation: init.generation,
            key: AssetKey::Descriptor { url: source.dzi_url.clone() },
            url: source.dzi_url.clone(),
        })];
        let mut overlays = RasterSet::default();
        effects.extend(overlays.request_all(init.generation, init.layers, true));
        tracing::debug!(generation = %init.generation, dzi = %source.dzi_url, budget = budget.get(), "tiled backend initialized");

        let backend = Self {
            generation: init.generation,
            source,
            pyramid: None,
            transform: ViewportTransform::default(),
            visible: None,
            tiles: LruCache::new(budget),
            budget,
            wanted: HashSet::new(),
            pending_tiles: HashSet::new(),
            failed_tiles: HashSet::new(),
            overlays,
        };
        Ok((backend, effects))
    }

    #[must_use]
    pub fn pyramid(&self) -> Option<&Pyramid> {
        self.pyramid.as_ref()
    }

    /// Cached tiles, least recently used first.
    #[must_use]
    pub fn cached_tiles(&self) -> Vec<TileCoord> {
        self.tiles.iter().rev().map(|(c, ())| *c).collect()
    }

    fn on_descriptor(&mut self, url: &str, outcome: AssetOutcome) -> Result<Vec<Effect>, ViewerError> {
        if url != self.source.dzi_url || self.pyramid.is_some() {
            tracing::debug!(url, "ignoring unexpected descriptor completion");
            return Ok(Vec::new());
        }
        let xml = match outcome {
            AssetOutcome::Text(xml) => xml,
            AssetOutcome::Image { .. } => {
                return Err(ViewerError::BackendInit("pyramid descriptor is not a text document".into()));
            }
            AssetOutcome::Failed(reason) => {
                return Err(ViewerError::BackendInit(format!("pyramid descriptor unavailable: {reason}")));
            }
        };
        let descriptor = DziDescriptor::parse(&xml)?;
        if descriptor.width != self.source.width || descriptor.height != self.source.height {
            tracing::warn!(
                session = %format!("{}x{}", self.source.width, self.source.height),
                descriptor = %format!("{}x{}", descriptor.width, descriptor.height),
                "pyramid size disagrees with session; using descriptor"
            );
        }
        let (width, height) = (descriptor.width, descriptor.height);
        let pyramid = Pyramid::new(descriptor, url, self.source.max_level);
        tracing::info!(width, height, levels = pyramid.max_level() + 1, "pyramid ready");
        self.pyramid = Some(pyramid);
        Ok(vec![Effect::LayerLoaded { layer: LayerId::Base, source: url.to_string(), width, height }])
    }

    fn on_tile(&mut self, coord: TileCoord, outcome: AssetOutcome) -> Vec<Effect> {
        let key = AssetKey::Tile { coord };
        let requested = self.pending_tiles.remove(&coord);
        match outcome {
            AssetOutcome::Image { .. } if requested && self.in_view(coord) => {
                let mut effects = vec![Effect::Redraw];
                if self.tiles.len() >= self.tiles.cap().get() && !self.tiles.contains(&coord) {
                    let Some(evicted) = self.evictable() else {
                        tracing::debug!(%coord, "tile cache holds only needed tiles; dropping underlay");
                        return vec![Effect::Release(key)];
                    };
                    self.tiles.pop(&evicted);
                    effects.push(Effect::Release(AssetKey::Tile { coord: evicted }));
                }
                self.tiles.put(coord, ());
                effects
            }
            AssetOutcome::Image { .. } => {
                tracing::debug!(%coord, requested, "dropping tile outside the current view");
                vec![Effect::Release(key)]
            }
            AssetOutcome::Text(_) | AssetOutcome::Failed(_) if !requested => Vec::new(),
            AssetOutcome::Text(_) => {
                tracing::warn!(%coord, "tile completed with text payload");
                self.failed_tiles.insert(coord);
                Vec::new()
            }
            AssetOutcome::Failed(reason) => {
                tracing::warn!(%coord, reason = %reason, "tile load failed");
                self.failed_tiles.insert(coord);
                Vec::new()
            }
        }
    }

    /// Least recently used tile the current view can do without.
    fn evictable(&self) -> Option<TileCoord> {
        self.tiles.iter().rev().map(|(c, ())| *c).find(|c| !self.wanted.contains(c))
    }

    /// Size the cache to the larger of the budget and the needed tile count,
    /// evicting underlay tiles when it shrinks.
    fn fit_capacity(&mut self, effects: &mut Vec<Effect>) {
        let capacity = NonZeroUsize::new(self.wanted.len()).map_or(self.budget, |n| n.max(self.budget));
        while self.tiles.len() > capacity.get() {
            let Some(coord) = self.evictable() else {
                break;
            };
            self.tiles.pop(&coord);
            effects.push(Effect::Release(AssetKey::Tile { coord }));
        }
        if self.tiles.cap() != capacity {
            tracing::debug!(capacity = capacity.get(), budget = self.budget.get(), "resizing tile cache");
            self.tiles.resize(capacity);
        }
    }

    fn in_view(&self, coord: TileCoord) -> bool {
        match (&self.pyramid, &self.visible) {
            (Some(p), Some(v)) => p.tile_content_rect(coord).intersects(v),
            _ => false,
        }
    }

    /// Full-content rect for an overlay: the unit-width normalized rect
    /// `(0, 0, 1, aspect)` scaled to content pixels.
    fn overlay_dest(pyramid: &Pyramid) -> Rect {
        let width = f64::from(pyramid.descriptor().width);
        Rect::new(0.0, 0.0, width, pyramid.aspect_ratio() * width)
    }
}

impl RenderBackend for TiledBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Tiled
    }

    fn generation(&self) -> Generation {
        self.generation
    }

    fn update(&mut self, view: &ViewContext) -> Vec<Effect> {
        self.transform = view.transform;
        let Some(pyramid) = &self.pyramid else {
            return Vec::new();
        };
        if !view.viewport.is_positive() {
            return Vec::new();
        }
        let visible = view.transform.visible_content_rect(view.viewport);
        self.visible = Some(visible);

        let mut effects = Vec::new();
        let stale: Vec<TileCoord> = self
            .tiles
            .iter()
            .map(|(c, ())| *c)
            .filter(|c| !pyramid.tile_content_rect(*c).intersects(&visible))
            .collect();
        for coord in stale {
            self.tiles.pop(&coord);
            effects.push(Effect::Release(AssetKey::Tile { coord }));
        }
        self.pending_tiles.retain(|c| pyramid.tile_content_rect(*c).intersects(&visible));

        let level = pyramid.level_for_scale(view.transform.scale * view.dpr.max(1.0));
        let wanted = pyramid.visible_tiles(level, &visible);
        for coord in &wanted {
            if self.tiles.get(coord).is_some() || self.failed_tiles.contains(coord) {
                continue;
            }
            if self.pending_tiles.insert(*coord) {
                effects.push(Effect::Load(AssetRequest {
                    generation: self.generation,
                    key: AssetKey::Tile { coord: *coord },
                    url: pyramid.tile_url(*coord),
                }));
            }
        }
        self.wanted = wanted.into_iter().collect();
        self.fit_capacity(&mut effects);
        effects
    }

    fn apply_layer_change(&mut self, layer: LayerId, patch: &LayerPatch) -> Vec<Effect> {
        match patch {
            LayerPatch::Source(_) if layer == LayerId::Base => {
                tracing::warn!("tiled base layer cannot change source");
                Vec::new()
            }
            LayerPatch::Source(source) => self.overlays.request(self.generation, layer, source).into_iter().collect(),
            LayerPatch::Visible(_) | LayerPatch::Opacity(_) => vec![Effect::Redraw],
        }
    }

    fn on_asset(&mut self, key: &AssetKey, outcome: AssetOutcome) -> Result<Vec<Effect>, ViewerError> {
        match key {
            AssetKey::Descriptor { url } => self.on_descriptor(url, outcome),
            AssetKey::Tile { coord } => Ok(self.on_tile(*coord, outcome)),
            AssetKey::Layer { .. } => Ok(self.overlays.complete(key, outcome)),
        }
    }

    fn release(&mut self, key: &AssetKey) -> bool {
        match key {
            AssetKey::Tile { coord } => self.tiles.pop(coord).is_some() || self.pending_tiles.remove(coord),
            AssetKey::Layer { .. } => self.overlays.release(key),
            AssetKey::Descriptor { .. } => false,
        }
    }

    fn frame(&self, layers: &LayerStack) -> Frame {
        let mut items = Vec::new();
        if let Some(pyramid) = &self.pyramid {
            for entry in layers.composition() {
                if entry.id == LayerId::Base {
                    let mut coords: Vec<TileCoord> = self.tiles.iter().map(|(c, ())| *c).collect();
                    // Coarse first so finer tiles paint over them.
                    coords.sort_by_key(|c| (c.level, c.row, c.col));
                    items.extend(coords.into_iter().map(|coord| DrawItem {
                        layer: LayerId::Base,
                        z_index: entry.z_index,
                        asset: AssetKey::Tile { coord },
                        dest: pyramid.tile_content_rect(coord),
                        alpha: entry.alpha,
                    }));
                    continue;
                }
                let asset = AssetKey::Layer { layer: entry.id, source: entry.source };
                if self.overlays.get(&asset).is_some() {
                    items.push(DrawItem {
                        layer: entry.id,
                        z_index: entry.z_index,
                        asset,
                        dest: Self::overlay_dest(pyramid),
                        alpha: entry.alpha,
                    });
                }
            }
        }
        Frame { backend: BackendKind::Tiled, transform: self.transform, items }
    }

    fn destroy(mut self: Box<Self>) -> Vec<Effect> {
        let mut tiles: Vec<TileCoord> = self.tiles.iter().map(|(c, ())| *c).collect();
        tiles.sort();
        self.tiles.clear();
        self.pending_tiles.clear();
        tiles
            .into_iter()
            .map(|coord| AssetKey::Tile { coord })
            .chain(self.overlays.drain())
            .map(Effect::Release)
            .collect()
    }
}
