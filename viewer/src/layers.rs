//! Layer stack: the base raster plus up to three difference overlays.
//!
//! The stack owns display semantics only (visibility, opacity, which source
//! is current, whether it has loaded). Decoded pixels belong to the render
//! backend. Toggling visibility never unloads anything; it only changes what
//! [`LayerStack::composition`] reports.
//!
//! Z-order is a field on each layer, not its position in a collection, so
//! backends are free to reorder internally.

#[cfg(test)]
#[path = "layers_test.rs"]
mod layers_test;

use std::fmt;

use serde::{Deserialize, Serialize};

/// The four fixed layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerId {
    /// Rendered reference page.
    Base,
    /// Content present in the reference but not the target (red mask).
    Missing,
    /// Content present in the target but not the reference (green mask).
    Added,
    /// Structurally changed content (blue mask).
    Modified,
}

impl LayerId {
    pub const ALL: [LayerId; 4] = [Self::Base, Self::Missing, Self::Added, Self::Modified];
    pub const OVERLAYS: [LayerId; 3] = [Self::Missing, Self::Added, Self::Modified];

    #[must_use]
    pub fn z_index(self) -> u8 {
        match self {
            Self::Base => 0,
            Self::Missing => 1,
            Self::Added => 2,
            Self::Modified => 3,
        }
    }

    #[must_use]
    pub fn is_overlay(self) -> bool {
        self != Self::Base
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Missing => "missing",
            Self::Added => "added",
            Self::Modified => "modified",
        }
    }

    /// Parse the lowercase name used by the host UI.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == name)
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load progress of a layer's current source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    Pending,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub id: LayerId,
    pub z_index: u8,
    /// URL of the source currently displayed (or being loaded for the first time).
    pub source: String,
    pub visible: bool,
    /// 0–100. Always 100 for the base layer.
    pub opacity: u8,
    pub loaded: LoadState,
    /// A replacement source that has been requested but not yet committed.
    pub pending_source: Option<String>,
}

impl LayerDescriptor {
    #[must_use]
    pub fn new(id: LayerId, source: impl Into<String>, opacity: u8) -> Self {
        Self {
            id,
            z_index: id.z_index(),
            source: source.into(),
            visible: true,
            opacity: if id.is_overlay() { opacity.min(100) } else { 100 },
            loaded: LoadState::Pending,
            pending_source: None,
        }
    }
}

/// A change pushed from the stack to the active backend.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerPatch {
    Visible(bool),
    Opacity(u8),
    /// A new source should be loaded; the old one stays displayed meanwhile.
    Source(String),
}

/// One entry of the visible composition, bottom first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeEntry {
    pub id: LayerId,
    pub z_index: u8,
    pub source: String,
    /// 0.0–1.0.
    pub alpha: f64,
}

/// Ordered set of image layers for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStack {
    layers: Vec<LayerDescriptor>,
    opacity: u8,
}

impl LayerStack {
    /// Build a stack from a base source and any overlay sources.
    ///
    /// Duplicate overlay ids keep the first source; a `Base` entry in
    /// `overlays` is ignored.
    #[must_use]
    pub fn new(base: impl Into<String>, overlays: Vec<(LayerId, String)>, opacity: u8) -> Self {
        let opacity = opacity.min(100);
        let mut layers = vec![LayerDescriptor::new(LayerId::Base, base, opacity)];
        for (id, source) in overlays {
            if id.is_overlay() && !layers.iter().any(|l| l.id == id) {
                layers.push(LayerDescriptor::new(id, source, opacity));
            }
        }
        layers.sort_by_key(|l| l.z_index);
        Self { layers, opacity }
    }

    #[must_use]
    pub fn get(&self, id: LayerId) -> Option<&LayerDescriptor> {
        self.layers.iter().find(|l| l.id == id)
    }

    fn get_mut(&mut self, id: LayerId) -> Option<&mut LayerDescriptor> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    /// Layers in ascending z-order.
    pub fn iter(&self) -> impl Iterator<Item = &LayerDescriptor> {
        self.layers.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Shared overlay opacity, 0–100.
    #[must_use]
    pub fn opacity(&self) -> u8 {
        self.opacity
    }

    /// Returns the patch to forward to the backend, or `None` if nothing changed.
    pub fn set_visible(&mut self, id: LayerId, visible: bool) -> Option<LayerPatch> {
        let layer = self.get_mut(id)?;
        if layer.visible == visible {
            return None;
        }
        layer.visible = visible;
        Some(LayerPatch::Visible(visible))
    }

    /// Set the opacity shared by every overlay. Values above 100 clamp.
    pub fn set_opacity(&mut self, value: u8) -> Option<LayerPatch> {
        let value = value.min(100);
        if value == self.opacity {
            return None;
        }
        self.opacity = value;
        for layer in self.layers.iter_mut().filter(|l| l.id.is_overlay()) {
            layer.opacity = value;
        }
        Some(LayerPatch::Opacity(value))
    }

    /// Request a new source for `id`. The current source stays displayed until
    /// [`LayerStack::mark_loaded`] reports the new one.
    pub fn swap_source(&mut self, id: LayerId, source: impl Into<String>) -> Option<LayerPatch> {
        let source = source.into();
        let layer = self.get_mut(id)?;
        if layer.pending_source.as_deref() == Some(source.as_str()) {
            return None;
        }
        if layer.source == source {
            // Swapping back before a pending load landed cancels it.
            layer.pending_source = None;
            return None;
        }
        layer.pending_source = Some(source.clone());
        Some(LayerPatch::Source(source))
    }

    /// A load for `source` finished. Promotes a pending swap or marks the
    /// initial source loaded. Returns `true` if the stack changed.
    pub fn mark_loaded(&mut self, id: LayerId, source: &str) -> bool {
        let Some(layer) = self.get_mut(id) else {
            return false;
        };
        if layer.pending_source.as_deref() == Some(source) {
            layer.source = source.to_string();
            layer.pending_source = None;
            layer.loaded = LoadState::Loaded;
            return true;
        }
        if layer.source == source && layer.loaded != LoadState::Loaded {
            layer.loaded = LoadState::Loaded;
            return true;
        }
        false
    }

    /// A load for `source` failed. A failed swap is abandoned and the previous
    /// source keeps displaying; a failed initial load drops the layer from
    /// composition. Returns `true` if the stack changed.
    pub fn mark_failed(&mut self, id: LayerId, source: &str) -> bool {
        let Some(layer) = self.get_mut(id) else {
            return false;
        };
        if layer.pending_source.as_deref() == Some(source) {
            layer.pending_source = None;
            return true;
        }
        if layer.source == source && layer.loaded == LoadState::Pending {
            layer.loaded = LoadState::Failed;
            return true;
        }
        false
    }

    /// Visible, loaded layers bottom-first with their effective alpha.
    #[must_use]
    pub fn composition(&self) -> Vec<CompositeEntry> {
        let mut out: Vec<CompositeEntry> = self
            .layers
            .iter()
            .filter(|l| l.visible && l.loaded == LoadState::Loaded)
            .map(|l| CompositeEntry {
                id: l.id,
                z_index: l.z_index,
                source: l.source.clone(),
                alpha: f64::from(l.opacity) / 100.0,
            })
            .collect();
        out.sort_by_key(|e| e.z_index);
        out
    }
}
