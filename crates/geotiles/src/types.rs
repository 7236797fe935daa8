//! Tileset manifest types.
//!
//! These mirror the `tileset.json` schema of 3D Tiles 1.0 and 1.1 closely
//! enough to drive traversal. Unknown properties (metadata, extensions,
//! implicit tiling) are ignored.

use glam::DMat4;
use serde::Deserialize;

use crate::error::{Error, Result};

/// A parsed `tileset.json` manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tileset {
    /// Asset metadata.
    pub asset: Asset,
    /// Error, in meters, introduced if the tileset is not rendered at all.
    pub geometric_error: f64,
    /// The root tile.
    pub root: Tile,
}

impl Tileset {
    /// Parse and validate a manifest from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let tileset: Tileset = serde_json::from_slice(bytes)?;
        tileset.root.validate()?;
        Ok(tileset)
    }

    /// The up axis glTF content is authored in.
    pub fn gltf_up_axis(&self) -> UpAxis {
        self.asset.gltf_up_axis.unwrap_or_default()
    }
}

/// Asset metadata for a tileset.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// 3D Tiles format version (e.g. `"1.0"`).
    pub version: String,
    /// Application-specific version of this tileset.
    #[serde(default)]
    pub tileset_version: Option<String>,
    /// Legacy 1.0 property describing the glTF up axis.
    #[serde(default)]
    pub gltf_up_axis: Option<UpAxis>,
}

/// Up axis of glTF tile content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum UpAxis {
    #[serde(rename = "X")]
    X,
    #[default]
    #[serde(rename = "Y")]
    Y,
    #[serde(rename = "Z")]
    Z,
}

impl UpAxis {
    /// Rotation taking content authored with this up axis into the Z-up tileset frame.
    pub fn to_z_up(self) -> DMat4 {
        match self {
            Self::X => DMat4::from_rotation_y(-std::f64::consts::FRAC_PI_2),
            Self::Y => DMat4::from_rotation_x(std::f64::consts::FRAC_PI_2),
            Self::Z => DMat4::IDENTITY,
        }
    }
}

/// Refinement strategy for a tile's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Refine {
    /// Children are rendered in addition to the parent.
    #[serde(rename = "ADD", alias = "add")]
    Add,
    /// Children replace the parent.
    #[serde(rename = "REPLACE", alias = "replace")]
    Replace,
}

/// A single tile in the hierarchy.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    /// Volume enclosing the tile and all its descendants.
    pub bounding_volume: BoundingVolume,
    /// Error, in meters, introduced if this tile is rendered and its children are not.
    pub geometric_error: f64,
    /// Refinement strategy; inherited from the parent when absent.
    #[serde(default)]
    pub refine: Option<Refine>,
    /// Single content reference (1.0 style).
    #[serde(default)]
    pub content: Option<TileContent>,
    /// Multiple content references (1.1 style).
    #[serde(default)]
    pub contents: Vec<TileContent>,
    /// Child tiles.
    #[serde(default)]
    pub children: Vec<Tile>,
    /// Column-major transform from this tile's frame to its parent's.
    #[serde(default)]
    pub transform: Option<[f64; 16]>,
}

impl Tile {
    /// All content URIs of this tile, relative to the manifest.
    pub fn content_uris(&self) -> impl Iterator<Item = &str> {
        self.content
            .iter()
            .chain(self.contents.iter())
            .map(|content| content.uri.as_str())
    }

    fn validate(&self) -> Result<()> {
        if !self.geometric_error.is_finite() || self.geometric_error < 0.0 {
            return Err(Error::InvalidData {
                context: "tile",
                detail: format!("geometric error {} is not valid", self.geometric_error),
            });
        }
        if self.bounding_volume.is_empty() {
            return Err(Error::InvalidData {
                context: "tile",
                detail: "bounding volume has no box, sphere or region".to_string(),
            });
        }
        self.children.iter().try_for_each(Tile::validate)
    }
}

/// Reference to a tile's renderable content (or an external tileset).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileContent {
    /// URI of the content, relative to the manifest. Early tilesets used `url`.
    #[serde(alias = "url")]
    pub uri: String,
    /// Optional tighter volume around just the content.
    #[serde(default)]
    pub bounding_volume: Option<BoundingVolume>,
}

/// A bounding volume. At least one of the shapes must be present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoundingVolume {
    /// Oriented box: center followed by the three half-axis vectors.
    #[serde(rename = "box", default)]
    pub obb: Option<[f64; 12]>,
    /// Sphere: center followed by radius.
    #[serde(default)]
    pub sphere: Option<[f64; 4]>,
    /// Geographic region in radians: west, south, east, north, min height, max height.
    #[serde(default)]
    pub region: Option<[f64; 6]>,
}

impl BoundingVolume {
    /// True if no shape is present.
    pub fn is_empty(&self) -> bool {
        self.obb.is_none() && self.sphere.is_none() && self.region.is_none()
    }
}
