//! GPU strategy: every layer is a texture on a sprite in one scene node.
//!
//! This side decides which decoded layers may become textures and orders the
//! sprites; [`crate::gl`] owns the actual `WebGL2` textures, keyed by the same
//! [`AssetKey`]. A layer is resident from the moment it decodes until its
//! release, and the host deletes the texture on that same release. A layer
//! larger than the device's maximum texture size fails like a decode error.

#[cfg(test)]
#[path = "gpu_test.rs"]
mod gpu_test;

use std::collections::HashSet;

use super::direct::current_raster;
use super::raster::RasterSet;
use super::{
    AssetKey, AssetOutcome, BackendInit, DrawItem, Effect, Frame, GpuCaps, Generation, RenderBackend, ViewContext,
};
use crate::config::BackendKind;
use crate::coords::ViewportTransform;
use crate::error::ViewerError;
use crate::layers::{LayerId, LayerPatch, LayerStack};

pub struct GpuBackend {
    generation: Generation,
    caps: GpuCaps,
    /// Transform of the scene node holding every sprite.
    node_transform: ViewportTransform,
    rasters: RasterSet,
    /// Layers admitted as textures.
    resident: HashSet<AssetKey>,
}

impl GpuBackend {
    /// # Errors
    ///
    /// Returns `BackendInit` when the host reports no GPU context.
    pub fn initialize(init: BackendInit<'_>) -> Result<(Self, Vec<Effect>), ViewerError> {
        if !init.gpu.available {
            return Err(ViewerError::BackendInit("GPU context unavailable".into()));
        }
        let mut rasters = RasterSet::default();
        let effects = rasters.request_all(init.generation, init.layers, false);
        tracing::debug!(
            generation = %init.generation,
            max_texture_size = init.gpu.max_texture_size,
            "gpu backend initialized"
        );
        let backend = Self {
            generation: init.generation,
            caps: init.gpu,
            node_transform: ViewportTransform::default(),
            rasters,
            resident: HashSet::new(),
        };
        Ok((backend, effects))
    }

    /// Number of layers held as textures.
    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.resident.len()
    }

    fn admit(&mut self, key: &AssetKey, width: u32, height: u32) -> Result<(), String> {
        let max = self.caps.max_texture_size;
        if width > max || height > max {
            return Err(format!("{width}x{height} exceeds max texture size {max}"));
        }
        self.resident.insert(key.clone());
        Ok(())
    }
}

impl RenderBackend for GpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn generation(&self) -> Generation {
        self.generation
    }

    fn update(&mut self, view: &ViewContext) -> Vec<Effect> {
        self.node_transform = view.transform;
        Vec::new()
    }

    fn apply_layer_change(&mut self, layer: LayerId, patch: &LayerPatch) -> Vec<Effect> {
        match patch {
            LayerPatch::Source(source) => self.rasters.request(self.generation, layer, source).into_iter().collect(),
            LayerPatch::Visible(_) | LayerPatch::Opacity(_) => vec![Effect::Redraw],
        }
    }

    fn on_asset(&mut self, key: &AssetKey, outcome: AssetOutcome) -> Result<Vec<Effect>, ViewerError> {
        if !matches!(key, AssetKey::Layer { .. }) {
            tracing::debug!(%key, "gpu backend ignores non-layer asset");
            return Ok(Vec::new());
        }
        let mut effects = self.rasters.complete(key, outcome);
        let mut rejected = false;
        for effect in &mut effects {
            let Effect::LayerLoaded { layer, source, width, height } = effect else {
                continue;
            };
            if let Err(reason) = self.admit(key, *width, *height) {
                tracing::warn!(%key, reason = %reason, "texture upload failed");
                self.rasters.release(key);
                *effect = Effect::LayerFailed { layer: *layer, source: source.clone(), reason };
                rejected = true;
            }
        }
        if rejected {
            // The host still holds the decoded image.
            effects.push(Effect::Release(key.clone()));
        }
        Ok(effects)
    }

    fn release(&mut self, key: &AssetKey) -> bool {
        let had_texture = self.resident.remove(key);
        self.rasters.release(key) || had_texture
    }

    fn frame(&self, layers: &LayerStack) -> Frame {
        let base = current_raster(&self.rasters, layers, LayerId::Base);
        let mut sprites: Vec<DrawItem> = layers
            .composition()
            .into_iter()
            .filter_map(|entry| {
                let asset = AssetKey::Layer { layer: entry.id, source: entry.source };
                let raster = self.rasters.get(&asset)?;
                if !self.resident.contains(&asset) {
                    return None;
                }
                Some(DrawItem {
                    layer: entry.id,
                    z_index: entry.z_index,
                    dest: raster.dest(base),
                    asset,
                    alpha: entry.alpha,
                })
            })
            .collect();
        sprites.sort_by_key(|s| s.z_index);
        Frame { backend: BackendKind::Gpu, transform: self.node_transform, items: sprites }
    }

    fn destroy(mut self: Box<Self>) -> Vec<Effect> {
        tracing::debug!(textures = self.resident.len(), "releasing gpu textures");
        self.resident.clear();
        self.rasters.drain().into_iter().map(Effect::Release).collect()
    }
}
