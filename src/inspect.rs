//! `inspect-dzi`: summarize a deep-zoom descriptor.

#[cfg(test)]
#[path = "inspect_test.rs"]
mod inspect_test;

use serde::Serialize;
use viewer::error::ViewerError;
use viewer::pyramid::{DziDescriptor, LevelInfo, Pyramid};

#[derive(Debug, Serialize)]
pub struct LevelTable {
    pub descriptor: DziDescriptor,
    pub max_level: u32,
    pub tile_root: String,
    pub total_tiles: u64,
    pub levels: Vec<LevelInfo>,
}

/// Parse `xml` and lay out every level, coarsest first.
///
/// # Errors
///
/// Returns `BackendInit` if the descriptor is malformed.
pub fn level_table(xml: &str, dzi_url: &str, max_level: Option<u32>) -> Result<LevelTable, ViewerError> {
    let descriptor = DziDescriptor::parse(xml)?;
    let pyramid = Pyramid::new(descriptor.clone(), dzi_url, max_level);
    let levels = pyramid.levels();
    let total_tiles = levels.iter().map(|l| u64::from(l.cols) * u64::from(l.rows)).sum();
    Ok(LevelTable {
        max_level: pyramid.max_level(),
        tile_root: pyramid.tiles_root().to_string(),
        descriptor,
        total_tiles,
        levels,
    })
}
