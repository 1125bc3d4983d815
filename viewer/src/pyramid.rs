//! Deep-zoom tile pyramid: descriptor parsing and level/tile geometry.
//!
//! A pyramid is described by a small XML document:
//!
//! ```xml
//! <Image TileSize="256" Overlap="1" Format="png">
//!     <Size Width="7016" Height="4961"/>
//! </Image>
//! ```
//!
//! Level `max_level` is full resolution and each level below halves it.
//! Tiles are addressed by `(level, col, row)` and live at
//! `<stem>_files/<level>/<col>_<row>.<format>`.

#[cfg(test)]
#[path = "pyramid_test.rs"]
mod pyramid_test;

use std::fmt;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde::Serialize;

use crate::coords::Rect;
use crate::error::ViewerError;

/// Parsed pyramid descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DziDescriptor {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub overlap: u32,
    pub format: String,
}

impl DziDescriptor {
    /// # Errors
    ///
    /// Returns `BackendInit` if the XML is malformed, an attribute is missing
    /// or non-numeric, a dimension is zero, or `overlap >= tile_size`.
    pub fn parse(xml: &str) -> Result<Self, ViewerError> {
        let mut reader = Reader::from_reader(xml.as_bytes());
        reader.config_mut().trim_text(true);
        let mut buf = Vec::with_capacity(256);

        let mut seen_image = false;
        let mut tile_size = None;
        let mut overlap = None;
        let mut format = None;
        let mut width = None;
        let mut height = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e) | Event::Empty(e)) => match e.local_name().as_ref() {
                    b"Image" => {
                        seen_image = true;
                        for attr in e.attributes().flatten() {
                            let value = reader
                                .decoder()
                                .decode(attr.value.as_ref())
                                .map_err(|err| malformed(format!("undecodable attribute: {err}")))?;
                            match attr.key.local_name().as_ref() {
                                b"TileSize" => tile_size = Some(parse_u32("TileSize", &value)?),
                                b"Overlap" => overlap = Some(parse_u32("Overlap", &value)?),
                                b"Format" => format = Some(value.trim().to_string()),
                                _ => {}
                            }
                        }
                    }
                    b"Size" => {
                        for attr in e.attributes().flatten() {
                            let value = reader
                                .decoder()
                                .decode(attr.value.as_ref())
                                .map_err(|err| malformed(format!("undecodable attribute: {err}")))?;
                            match attr.key.local_name().as_ref() {
                                b"Width" => width = Some(parse_u32("Width", &value)?),
                                b"Height" => height = Some(parse_u32("Height", &value)?),
                                _ => {}
                            }
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(err) => return Err(malformed(format!("xml error at {}: {err}", reader.buffer_position()))),
                Ok(_) => {}
            }
            buf.clear();
        }

        if !seen_image {
            return Err(malformed("missing <Image> element".into()));
        }
        let descriptor = Self {
            width: width.ok_or_else(|| missing("Size/@Width"))?,
            height: height.ok_or_else(|| missing("Size/@Height"))?,
            tile_size: tile_size.ok_or_else(|| missing("Image/@TileSize"))?,
            overlap: overlap.unwrap_or(0),
            format: format.filter(|f| !f.is_empty()).ok_or_else(|| missing("Image/@Format"))?,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> Result<(), ViewerError> {
        if self.width == 0 || self.height == 0 {
            return Err(malformed(format!("zero image size {}x{}", self.width, self.height)));
        }
        if self.tile_size == 0 {
            return Err(malformed("zero tile size".into()));
        }
        if self.overlap >= self.tile_size {
            return Err(malformed(format!("overlap {} >= tile size {}", self.overlap, self.tile_size)));
        }
        Ok(())
    }

    /// Number of halvings needed to bring the larger dimension down to one pixel.
    #[must_use]
    pub fn natural_max_level(&self) -> u32 {
        let max_dim = self.width.max(self.height);
        // ceil(log2(n)) for n >= 1
        u32::BITS - (max_dim - 1).leading_zeros()
    }
}

fn parse_u32(name: &str, raw: &str) -> Result<u32, ViewerError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| malformed(format!("attribute {name}={raw:?} is not a non-negative integer")))
}

fn missing(what: &str) -> ViewerError {
    malformed(format!("missing {what}"))
}

fn malformed(reason: String) -> ViewerError {
    ViewerError::BackendInit(format!("malformed pyramid descriptor: {reason}"))
}

/// Address of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TileCoord {
    pub level: u32,
    pub col: u32,
    pub row: u32,
}

impl TileCoord {
    #[must_use]
    pub fn new(level: u32, col: u32, row: u32) -> Self {
        Self { level, col, row }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}_{}", self.level, self.col, self.row)
    }
}

/// Geometry of one pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelInfo {
    pub level: u32,
    pub width: u32,
    pub height: u32,
    pub cols: u32,
    pub rows: u32,
}

/// A descriptor bound to its tile location and level numbering.
#[derive(Debug, Clone, PartialEq)]
pub struct Pyramid {
    descriptor: DziDescriptor,
    max_level: u32,
    tiles_root: String,
}

impl Pyramid {
    /// `max_level` overrides the natural level count for producers that cut a
    /// shorter pyramid; the top level is always full resolution.
    #[must_use]
    pub fn new(descriptor: DziDescriptor, dzi_url: &str, max_level: Option<u32>) -> Self {
        let max_level = max_level.unwrap_or_else(|| descriptor.natural_max_level());
        Self { descriptor, max_level, tiles_root: tiles_root(dzi_url) }
    }

    #[must_use]
    pub fn descriptor(&self) -> &DziDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// Directory holding one folder per level.
    #[must_use]
    pub fn tiles_root(&self) -> &str {
        &self.tiles_root
    }

    /// Normalized height of the image when its width is 1.
    #[must_use]
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.descriptor.height) / f64::from(self.descriptor.width)
    }

    /// Resolution of `level` relative to full size.
    #[must_use]
    pub fn level_scale(&self, level: u32) -> f64 {
        let halvings = self.max_level.saturating_sub(level.min(self.max_level));
        0.5_f64.powi(i32::try_from(halvings).unwrap_or(i32::MAX))
    }

    #[must_use]
    pub fn level_info(&self, level: u32) -> LevelInfo {
        let scale = self.level_scale(level);
        let width = scaled_dim(self.descriptor.width, scale);
        let height = scaled_dim(self.descriptor.height, scale);
        let ts = self.descriptor.tile_size;
        LevelInfo { level, width, height, cols: width.div_ceil(ts), rows: height.div_ceil(ts) }
    }

    /// All levels, coarsest first.
    #[must_use]
    pub fn levels(&self) -> Vec<LevelInfo> {
        (0..=self.max_level).map(|l| self.level_info(l)).collect()
    }

    /// The coarsest level whose resolution is at least `scale`.
    #[must_use]
    pub fn level_for_scale(&self, scale: f64) -> u32 {
        if !scale.is_finite() || scale <= 0.0 {
            return 0;
        }
        let offset = scale.log2().ceil();
        to_u32((f64::from(self.max_level) + offset).clamp(0.0, f64::from(self.max_level)))
    }

    /// Tile bounds in level pixels, including overlap on sides with neighbours.
    #[must_use]
    pub fn tile_level_rect(&self, tile: TileCoord) -> Rect {
        let info = self.level_info(tile.level);
        let ts = f64::from(self.descriptor.tile_size);
        let ov = f64::from(self.descriptor.overlap);
        let x = f64::from(tile.col) * ts - if tile.col > 0 { ov } else { 0.0 };
        let y = f64::from(tile.row) * ts - if tile.row > 0 { ov } else { 0.0 };
        let w = ts + if tile.col > 0 { ov } else { 0.0 } + if tile.col + 1 < info.cols { ov } else { 0.0 };
        let h = ts + if tile.row > 0 { ov } else { 0.0 } + if tile.row + 1 < info.rows { ov } else { 0.0 };
        Rect::new(x, y, w.min(f64::from(info.width) - x), h.min(f64::from(info.height) - y))
    }

    /// Tile bounds in full-resolution content pixels.
    #[must_use]
    pub fn tile_content_rect(&self, tile: TileCoord) -> Rect {
        let r = self.tile_level_rect(tile);
        let inv = 1.0 / self.level_scale(tile.level);
        Rect::new(r.x * inv, r.y * inv, r.width * inv, r.height * inv)
    }

    /// Tiles of `level` intersecting `visible` (content pixels), row-major.
    #[must_use]
    pub fn visible_tiles(&self, level: u32, visible: &Rect) -> Vec<TileCoord> {
        let level = level.min(self.max_level);
        let info = self.level_info(level);
        if info.cols == 0 || info.rows == 0 {
            return Vec::new();
        }
        let scale = self.level_scale(level);
        let ts = f64::from(self.descriptor.tile_size);
        let (c0, c1) = span(visible.x * scale, visible.right() * scale, ts, info.cols);
        let (r0, r1) = span(visible.y * scale, visible.bottom() * scale, ts, info.rows);
        let mut out = Vec::new();
        for row in r0..r1 {
            for col in c0..c1 {
                out.push(TileCoord { level, col, row });
            }
        }
        out
    }

    #[must_use]
    pub fn tile_url(&self, tile: TileCoord) -> String {
        format!("{}/{}/{}_{}.{}", self.tiles_root, tile.level, tile.col, tile.row, self.descriptor.format)
    }
}

/// Half-open index range of cells of size `cell` covering `[lo, hi)`, clamped to `[0, count)`.
fn span(lo: f64, hi: f64, cell: f64, count: u32) -> (u32, u32) {
    let max = f64::from(count);
    let start = (lo / cell).floor().clamp(0.0, max);
    let end = (hi / cell).ceil().clamp(0.0, max);
    (to_u32(start), to_u32(end))
}

fn scaled_dim(full: u32, scale: f64) -> u32 {
    to_u32((f64::from(full) * scale).ceil()).max(1)
}

/// Callers clamp `v` to a non-negative range that fits in `u32`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u32(v: f64) -> u32 {
    v as u32
}

/// `.../image.dzi` → `.../image_files`.
fn tiles_root(dzi_url: &str) -> String {
    let path = dzi_url.split(['?', '#']).next().unwrap_or(dzi_url);
    let stem = path.strip_suffix(".dzi").or_else(|| path.strip_suffix(".xml")).unwrap_or(path);
    format!("{stem}_files")
}
