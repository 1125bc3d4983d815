//! Bookkeeping for whole-layer rasters shared by every strategy.

use std::collections::{HashMap, HashSet};

use super::{AssetKey, AssetOutcome, AssetRequest, Effect, Generation};
use crate::coords::Rect;
use crate::layers::{LayerId, LayerStack};

/// A decoded layer image held by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Raster {
    pub width: u32,
    pub height: u32,
}

impl Raster {
    /// Full-content rectangle, sized to `base` when known.
    pub fn dest(self, base: Option<Raster>) -> Rect {
        let r = base.unwrap_or(self);
        Rect::new(0.0, 0.0, f64::from(r.width), f64::from(r.height))
    }
}

#[derive(Debug, Default)]
pub(crate) struct RasterSet {
    loaded: HashMap<AssetKey, Raster>,
    pending: HashSet<AssetKey>,
}

impl RasterSet {
    /// Requests for every layer's current source, bottom-first.
    pub fn request_all(&mut self, generation: Generation, layers: &LayerStack, skip_base: bool) -> Vec<Effect> {
        layers
            .iter()
            .filter(|l| !(skip_base && l.id == LayerId::Base))
            .filter_map(|l| self.request(generation, l.id, &l.source))
            .collect()
    }

    /// `None` if the source is already loaded or in flight.
    pub fn request(&mut self, generation: Generation, layer: LayerId, source: &str) -> Option<Effect> {
        let key = AssetKey::Layer { layer, source: source.to_string() };
        if self.loaded.contains_key(&key) || !self.pending.insert(key.clone()) {
            return None;
        }
        Some(Effect::Load(AssetRequest { generation, key, url: source.to_string() }))
    }

    /// Record a completion. Unrequested images are handed straight back for release.
    pub fn complete(&mut self, key: &AssetKey, outcome: AssetOutcome) -> Vec<Effect> {
        let AssetKey::Layer { layer, source } = key else {
            return Vec::new();
        };
        if !self.pending.remove(key) {
            tracing::debug!(%key, "ignoring unrequested layer completion");
            return match outcome {
                AssetOutcome::Image { .. } => vec![Effect::Release(key.clone())],
                _ => Vec::new(),
            };
        }
        let effect = match outcome {
            AssetOutcome::Image { width, height } if width > 0 && height > 0 => {
                self.loaded.insert(key.clone(), Raster { width, height });
                Effect::LayerLoaded { layer: *layer, source: source.clone(), width, height }
            }
            AssetOutcome::Image { width, height } => {
                failed(*layer, source, format!("decoded to empty image {width}x{height}"))
            }
            AssetOutcome::Text(_) => failed(*layer, source, "expected an image, got text".into()),
            AssetOutcome::Failed(reason) => failed(*layer, source, reason),
        };
        vec![effect]
    }

    pub fn get(&self, key: &AssetKey) -> Option<Raster> {
        self.loaded.get(key).copied()
    }

    /// Forget `key`, whether loaded or in flight.
    pub fn release(&mut self, key: &AssetKey) -> bool {
        let was_pending = self.pending.remove(key);
        self.loaded.remove(key).is_some() || was_pending
    }

    /// Release everything, in a stable order.
    pub fn drain(&mut self) -> Vec<AssetKey> {
        self.pending.clear();
        let mut keys: Vec<AssetKey> = self.loaded.drain().map(|(k, _)| k).collect();
        keys.sort_by_cached_key(ToString::to_string);
        keys
    }
}

fn failed(layer: LayerId, source: &str, reason: String) -> Effect {
    tracing::warn!(%layer, source, reason = %reason, "layer load failed");
    Effect::LayerFailed { layer, source: source.to_string(), reason }
}
