//! Viewer configuration.
//!
//! In the browser the host hands the engine a JSON object; the native harness
//! reads `VIEWER_*` environment variables. Both paths produce the same
//! [`ViewerConfig`] and run the same validation.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::{
    CLICK_THRESHOLD_PX, DEFAULT_OPACITY, DOUBLE_CLICK_FACTOR, FIT_MARGIN, MAX_SCALE, MIN_SCALE, MINIMAP_MIN_EXTENT,
    TILE_CACHE_BUDGET, TILED_MIN_SCALE, WHEEL_STEP,
};
use crate::error::ViewerError;
use crate::input::InputSettings;
use crate::viewport::ScaleLimits;

/// Rendering strategy. A deployment choice; behaviour is identical across all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Every layer decoded eagerly and stacked in one transformed container.
    #[default]
    Direct,
    /// Base layer streamed from a multi-resolution tile pyramid.
    Tiled,
    /// Layers held as GPU textures in a single transformed scene node.
    Gpu,
}

impl BackendKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Tiled => "tiled",
            Self::Gpu => "gpu",
        }
    }

    #[must_use]
    pub fn default_scale_limits(self) -> ScaleLimits {
        match self {
            Self::Tiled => ScaleLimits::new(TILED_MIN_SCALE, MAX_SCALE),
            Self::Direct | Self::Gpu => ScaleLimits::new(MIN_SCALE, MAX_SCALE),
        }
    }

    /// Double-click zoom competes with deliberate zoom gestures everywhere
    /// except the direct strategy.
    #[must_use]
    pub fn allows_double_click_zoom(self) -> bool {
        matches!(self, Self::Direct)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ViewerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "tiled" => Ok(Self::Tiled),
            "gpu" => Ok(Self::Gpu),
            other => Err(ViewerError::ConfigParse(format!(
                "unknown backend '{other}' (expected 'direct', 'tiled' or 'gpu')"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub backend: BackendKind,
    /// Overrides the strategy's default lower zoom bound.
    pub min_scale: Option<f64>,
    /// Overrides the strategy's default upper zoom bound.
    pub max_scale: Option<f64>,
    pub wheel_step: f64,
    pub click_threshold_px: f64,
    pub fit_margin: f64,
    pub minimap_min_extent: f64,
    pub tile_cache_budget: usize,
    pub default_opacity: u8,
    pub double_click_zoom: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Direct,
            min_scale: None,
            max_scale: None,
            wheel_step: WHEEL_STEP,
            click_threshold_px: CLICK_THRESHOLD_PX,
            fit_margin: FIT_MARGIN,
            minimap_min_extent: MINIMAP_MIN_EXTENT,
            tile_cache_budget: TILE_CACHE_BUDGET,
            default_opacity: DEFAULT_OPACITY,
            double_click_zoom: true,
        }
    }
}

impl ViewerConfig {
    /// Parse host-provided JSON. Absent keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigParse` if the JSON is malformed or a value is out of range.
    pub fn from_json(raw: &str) -> Result<Self, ViewerError> {
        let cfg: Self = serde_json::from_str(raw).map_err(|e| ViewerError::ConfigParse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build config from environment variables.
    ///
    /// All optional:
    /// - `VIEWER_BACKEND`: `direct` (default), `tiled`, or `gpu`
    /// - `VIEWER_MIN_SCALE` / `VIEWER_MAX_SCALE`: strategy defaults when absent
    /// - `VIEWER_WHEEL_STEP`: default 0.1
    /// - `VIEWER_CLICK_THRESHOLD_PX`: default 5
    /// - `VIEWER_FIT_MARGIN`: default 0.9
    /// - `VIEWER_MINIMAP_MIN_EXTENT`: default 0.05
    /// - `VIEWER_TILE_CACHE_BUDGET`: default 256
    /// - `VIEWER_DEFAULT_OPACITY`: default 70
    /// - `VIEWER_DOUBLE_CLICK_ZOOM`: default true
    ///
    /// # Errors
    ///
    /// Returns `ConfigParse` if a variable is set but unparsable or out of range.
    pub fn from_env() -> Result<Self, ViewerError> {
        let defaults = Self::default();
        let cfg = Self {
            backend: env_parse("VIEWER_BACKEND")?.unwrap_or(defaults.backend),
            min_scale: env_parse("VIEWER_MIN_SCALE")?,
            max_scale: env_parse("VIEWER_MAX_SCALE")?,
            wheel_step: env_parse("VIEWER_WHEEL_STEP")?.unwrap_or(defaults.wheel_step),
            click_threshold_px: env_parse("VIEWER_CLICK_THRESHOLD_PX")?.unwrap_or(defaults.click_threshold_px),
            fit_margin: env_parse("VIEWER_FIT_MARGIN")?.unwrap_or(defaults.fit_margin),
            minimap_min_extent: env_parse("VIEWER_MINIMAP_MIN_EXTENT")?.unwrap_or(defaults.minimap_min_extent),
            tile_cache_budget: env_parse("VIEWER_TILE_CACHE_BUDGET")?.unwrap_or(defaults.tile_cache_budget),
            default_opacity: env_parse("VIEWER_DEFAULT_OPACITY")?.unwrap_or(defaults.default_opacity),
            double_click_zoom: env_parse("VIEWER_DOUBLE_CLICK_ZOOM")?.unwrap_or(defaults.double_click_zoom),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    ///
    /// Returns `ConfigParse` naming the first out-of-range field.
    pub fn validate(&self) -> Result<(), ViewerError> {
        let limits = self.scale_limits();
        if !(limits.min.is_finite() && limits.max.is_finite() && limits.min > 0.0 && limits.min <= limits.max) {
            return Err(ViewerError::ConfigParse(format!(
                "scale limits {}..{} must be positive and ordered",
                limits.min, limits.max
            )));
        }
        if !(self.wheel_step.is_finite() && self.wheel_step > 0.0) {
            return Err(ViewerError::ConfigParse(format!("wheel_step {} must be positive", self.wheel_step)));
        }
        if !(self.click_threshold_px.is_finite() && self.click_threshold_px > 0.0) {
            return Err(ViewerError::ConfigParse(format!(
                "click_threshold_px {} must be positive",
                self.click_threshold_px
            )));
        }
        if !(self.fit_margin > 0.0 && self.fit_margin <= 1.0) {
            return Err(ViewerError::ConfigParse(format!("fit_margin {} must be in (0, 1]", self.fit_margin)));
        }
        if !(self.minimap_min_extent > 0.0 && self.minimap_min_extent <= 1.0) {
            return Err(ViewerError::ConfigParse(format!(
                "minimap_min_extent {} must be in (0, 1]",
                self.minimap_min_extent
            )));
        }
        if self.tile_cache_budget == 0 {
            return Err(ViewerError::ConfigParse("tile_cache_budget must be at least 1".into()));
        }
        if self.default_opacity > 100 {
            return Err(ViewerError::ConfigParse(format!(
                "default_opacity {} must be at most 100",
                self.default_opacity
            )));
        }
        Ok(())
    }

    /// Effective zoom bounds: explicit overrides, else the strategy default.
    #[must_use]
    pub fn scale_limits(&self) -> ScaleLimits {
        let defaults = self.backend.default_scale_limits();
        ScaleLimits::new(self.min_scale.unwrap_or(defaults.min), self.max_scale.unwrap_or(defaults.max))
    }

    #[must_use]
    pub fn input_settings(&self) -> InputSettings {
        InputSettings {
            wheel_step: self.wheel_step,
            click_threshold_px: self.click_threshold_px,
            double_click_zoom: self.double_click_zoom && self.backend.allows_double_click_zoom(),
            double_click_factor: DOUBLE_CLICK_FACTOR,
        }
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>, ViewerError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ViewerError::ConfigParse(format!("{key}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}
