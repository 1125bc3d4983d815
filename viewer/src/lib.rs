//! Viewport and layer-compositing engine for the document comparison viewer.
//!
//! This crate is compiled to WebAssembly and runs in the browser (and natively
//! for tests and the `drawcmp` harness). It owns the interactive display of one
//! comparison page: the base rendering with up to three difference masks on
//! top, pan/zoom, the overview minimap, and click-to-measure in source-document
//! units. The host JavaScript layer wires DOM events to the engine, performs
//! the asset loads it asks for, and reports completions back.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level engine and testable [`engine::EngineCore`] |
//! | [`coords`] | Screen ↔ content ↔ source-document mapping |
//! | [`viewport`] | Scale/translation state with zoom, pan, and fit |
//! | [`layers`] | Base + overlay layer stack with explicit z-order |
//! | [`input`] | Gesture state machine (drag, click, wheel, pinch) |
//! | [`backend`] | Render backend contract and the direct, tiled, and GPU strategies |
//! | [`pyramid`] | Deep-zoom descriptor parsing and tile geometry |
//! | [`minimap`] | Overview rectangle and minimap click mapping |
//! | [`session`] | Processing-result adapter feeding a new session |
//! | [`render`] | Canvas2D painter for the direct and tiled strategies |
//! | [`gl`] | `WebGL2` painter for the GPU strategy |
//! | [`config`] | Viewer configuration from JSON or environment |
//! | [`error`] | Error taxonomy and stable error codes |
//! | [`consts`] | Shared numeric defaults (zoom limits, thresholds, budgets) |

pub mod backend;
pub mod config;
pub mod consts;
pub mod coords;
pub mod engine;
pub mod error;
pub mod gl;
pub mod input;
pub mod layers;
pub mod minimap;
pub mod pyramid;
pub mod render;
pub mod session;
pub mod viewport;
