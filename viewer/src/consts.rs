//! Shared numeric constants for the viewer crate.

// ── Zoom ────────────────────────────────────────────────────────

/// Lower zoom bound for the direct and GPU strategies.
pub const MIN_SCALE: f64 = 0.1;

/// Lower zoom bound for the tiled strategy; coarser levels add nothing.
pub const TILED_MIN_SCALE: f64 = 0.5;

/// Upper zoom bound for every strategy.
pub const MAX_SCALE: f64 = 10.0;

/// Fraction of the viewport the content occupies after fit-to-screen.
pub const FIT_MARGIN: f64 = 0.9;

/// Fractional scale change per wheel notch.
pub const WHEEL_STEP: f64 = 0.1;

/// Scale multiplier applied by double-click zoom.
pub const DOUBLE_CLICK_FACTOR: f64 = 2.0;

// ── Input ───────────────────────────────────────────────────────

/// Pointer travel, in screen pixels, below which a press/release is a click.
pub const CLICK_THRESHOLD_PX: f64 = 5.0;

// ── Minimap ─────────────────────────────────────────────────────

/// Smallest normalized extent of the overview indicator.
pub const MINIMAP_MIN_EXTENT: f64 = 0.05;

// ── Layers ──────────────────────────────────────────────────────

/// Overlay opacity applied to a freshly installed session (0–100).
pub const DEFAULT_OPACITY: u8 = 70;

// ── Tiles ───────────────────────────────────────────────────────

/// Maximum number of decoded pyramid tiles held at once.
pub const TILE_CACHE_BUDGET: usize = 256;
