//! Inbound data contract from the document-processing collaborator.
//!
//! One [`SessionResult`] arrives per page-processing response and replaces the
//! previous one wholesale. [`SessionResult::layout`] validates it against the
//! active strategy and produces the inputs for a fresh display context.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use serde::{Deserialize, Serialize};

use crate::config::BackendKind;
use crate::coords::ContentSpace;
use crate::error::ViewerError;
use crate::layers::{LayerId, LayerStack};

/// Image URLs for the direct and GPU strategies (and overlays for tiled).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSet {
    pub base: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_grayscale: Option<String>,
    pub mask_red: String,
    pub mask_green: String,
    pub mask_blue: String,
}

/// Pyramid location for the tiled strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileSource {
    pub dzi_url: String,
    pub width: u32,
    pub height: u32,
    /// Top level index when the producer cut a shorter pyramid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_level: Option<u32>,
}

/// Alignment and difference statistics for the side panel.
///
/// Inert to the viewport engine; unknown keys are preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffStats {
    pub total_matches: u64,
    pub inliers: u64,
    pub inlier_ratio: f64,
    pub method: String,
    pub missing_regions: u64,
    pub added_regions: u64,
    pub modified_regions: u64,
    pub missing_pixels: u64,
    pub added_pixels: u64,
    pub modified_pixels: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One page-processing response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub session_id: String,
    pub current_page: u32,
    pub total_pages: u32,
    /// Content pixels per source-document unit (render DPI / 72).
    pub scaling_factor: f64,
    #[serde(default)]
    pub images: Option<ImageSet>,
    #[serde(default)]
    pub tiles: Option<TileSource>,
    #[serde(default)]
    pub stats: DiffStats,
}

/// Validated inputs for a new display context.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionLayout {
    pub layers: LayerStack,
    /// Known up front only when a pyramid supplies the size.
    pub content: Option<ContentSpace>,
    pub scaling_factor: f64,
    pub tiles: Option<TileSource>,
    pub base_color: String,
    pub base_grayscale: Option<String>,
}

impl SessionResult {
    /// # Errors
    ///
    /// Returns `InvalidSessionData` if the payload is not valid JSON for this contract.
    pub fn from_json(raw: &str) -> Result<Self, ViewerError> {
        serde_json::from_str(raw).map_err(|e| ViewerError::InvalidSessionData(e.to_string()))
    }

    /// Check required fields for `backend` and build the initial layer stack.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSessionData` naming the first missing or malformed field.
    pub fn layout(&self, backend: BackendKind, opacity: u8) -> Result<SessionLayout, ViewerError> {
        if self.session_id.trim().is_empty() {
            return Err(invalid("session_id is empty"));
        }
        if self.total_pages == 0 || self.current_page >= self.total_pages {
            return Err(invalid(&format!(
                "current_page {} out of range for total_pages {}",
                self.current_page, self.total_pages
            )));
        }
        if !self.scaling_factor.is_finite() || self.scaling_factor <= 0.0 {
            return Err(invalid(&format!("scaling_factor {} is not positive", self.scaling_factor)));
        }
        let images = self.images.as_ref().ok_or_else(|| invalid("images missing"))?;
        for (name, url) in [
            ("images.base", &images.base),
            ("images.mask_red", &images.mask_red),
            ("images.mask_green", &images.mask_green),
            ("images.mask_blue", &images.mask_blue),
        ] {
            if url.trim().is_empty() {
                return Err(invalid(&format!("{name} is empty")));
            }
        }

        let (tiles, content, base_source) = match backend {
            BackendKind::Tiled => {
                let tiles = self.tiles.clone().ok_or_else(|| invalid("tiles missing for tiled strategy"))?;
                if tiles.dzi_url.trim().is_empty() {
                    return Err(invalid("tiles.dzi_url is empty"));
                }
                let content = ContentSpace::new(f64::from(tiles.width), f64::from(tiles.height), self.scaling_factor)?;
                let base = tiles.dzi_url.clone();
                (Some(tiles), Some(content), base)
            }
            BackendKind::Direct | BackendKind::Gpu => (None, None, images.base.clone()),
        };

        let overlays = vec![
            (LayerId::Missing, images.mask_red.clone()),
            (LayerId::Added, images.mask_green.clone()),
            (LayerId::Modified, images.mask_blue.clone()),
        ];
        Ok(SessionLayout {
            layers: LayerStack::new(base_source, overlays, opacity),
            content,
            scaling_factor: self.scaling_factor,
            tiles,
            base_color: images.base.clone(),
            base_grayscale: images.base_grayscale.clone().filter(|s| !s.trim().is_empty()),
        })
    }
}

fn invalid(reason: &str) -> ViewerError {
    ViewerError::InvalidSessionData(reason.to_string())
}
