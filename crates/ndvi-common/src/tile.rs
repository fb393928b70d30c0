//! Tile coordinates and tile-URL templates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::viz::Visualization;

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }
}

/// Errors from filling a tile-URL template.
#[derive(Debug, Error, PartialEq)]
pub enum TileTemplateError {
    #[error("tile URL template is missing the {0} placeholder")]
    MissingPlaceholder(&'static str),

    #[error("tile URL template contains more than one {0} placeholder")]
    DuplicatePlaceholder(&'static str),
}

/// A resolved visualization: a parameterized tile-URL template plus the
/// visualization it was registered with.
///
/// The template contains exactly one each of the `{z}`, `{x}`, `{y}`
/// placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct TileDescriptor {
    pub url_template: String,
    pub viz: Visualization,
}

impl TileDescriptor {
    /// Substitute a tile coordinate into the template.
    pub fn tile_url(&self, coord: TileCoord) -> Result<String, TileTemplateError> {
        fill_template(&self.url_template, coord)
    }
}

/// Substitute `{z}`, `{x}`, `{y}` into a tile-URL template, each exactly once.
pub fn fill_template(template: &str, coord: TileCoord) -> Result<String, TileTemplateError> {
    let mut url = template.to_string();
    for (placeholder, value) in [("{z}", coord.z), ("{x}", coord.x), ("{y}", coord.y)] {
        match url.matches(placeholder).count() {
            0 => return Err(TileTemplateError::MissingPlaceholder(placeholder)),
            1 => url = url.replacen(placeholder, &value.to_string(), 1),
            _ => return Err(TileTemplateError::DuplicatePlaceholder(placeholder)),
        }
    }
    Ok(url)
}
