//! Direct strategy: each layer is one full raster drawn under a single
//! container transform.

#[cfg(test)]
#[path = "direct_test.rs"]
mod direct_test;

use super::raster::{Raster, RasterSet};
use super::{AssetKey, AssetOutcome, BackendInit, DrawItem, Effect, Frame, Generation, RenderBackend, ViewContext};
use crate::config::BackendKind;
use crate::coords::ViewportTransform;
use crate::error::ViewerError;
use crate::layers::{LayerId, LayerPatch, LayerStack};

pub struct DirectBackend {
    generation: Generation,
    transform: ViewportTransform,
    rasters: RasterSet,
}

impl DirectBackend {
    /// Requests every layer's source up front.
    #[must_use]
    pub fn initialize(init: BackendInit<'_>) -> (Self, Vec<Effect>) {
        let mut rasters = RasterSet::default();
        let effects = rasters.request_all(init.generation, init.layers, false);
        tracing::debug!(generation = %init.generation, loads = effects.len(), "direct backend initialized");
        (Self { generation: init.generation, transform: ViewportTransform::default(), rasters }, effects)
    }
}

/// The raster for `layer`'s current source, if decoded.
pub(super) fn current_raster(rasters: &RasterSet, layers: &LayerStack, layer: LayerId) -> Option<Raster> {
    let source = layers.get(layer)?.source.clone();
    rasters.get(&AssetKey::Layer { layer, source })
}

impl RenderBackend for DirectBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Direct
    }

    fn generation(&self) -> Generation {
        self.generation
    }

    fn update(&mut self, view: &ViewContext) -> Vec<Effect> {
        self.transform = view.transform;
        Vec::new()
    }

    fn apply_layer_change(&mut self, layer: LayerId, patch: &LayerPatch) -> Vec<Effect> {
        match patch {
            LayerPatch::Source(source) => self.rasters.request(self.generation, layer, source).into_iter().collect(),
            LayerPatch::Visible(_) | LayerPatch::Opacity(_) => vec![Effect::Redraw],
        }
    }

    fn on_asset(&mut self, key: &AssetKey, outcome: AssetOutcome) -> Result<Vec<Effect>, ViewerError> {
        match key {
            AssetKey::Layer { .. } => Ok(self.rasters.complete(key, outcome)),
            AssetKey::Descriptor { .. } | AssetKey::Tile { .. } => {
                tracing::debug!(%key, "direct backend ignores non-layer asset");
                Ok(Vec::new())
            }
        }
    }

    fn release(&mut self, key: &AssetKey) -> bool {
        self.rasters.release(key)
    }

    fn frame(&self, layers: &LayerStack) -> Frame {
        let base = current_raster(&self.rasters, layers, LayerId::Base);
        let items = layers
            .composition()
            .into_iter()
            .filter_map(|entry| {
                let asset = AssetKey::Layer { layer: entry.id, source: entry.source };
                let raster = self.rasters.get(&asset)?;
                Some(DrawItem {
                    layer: entry.id,
                    z_index: entry.z_index,
                    dest: raster.dest(base),
                    asset,
                    alpha: entry.alpha,
                })
            })
            .collect();
        Frame { backend: BackendKind::Direct, transform: self.transform, items }
    }

    fn destroy(mut self: Box<Self>) -> Vec<Effect> {
        self.rasters.drain().into_iter().map(Effect::Release).collect()
    }
}
