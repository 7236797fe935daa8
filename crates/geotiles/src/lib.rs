//! Async client and level-of-detail traversal for 3D Tiles tilesets.
//!
//! This crate fetches a `tileset.json` manifest, flattens its tile hierarchy
//! into an arena with accumulated transforms, and selects which tiles to show
//! for a viewpoint using screen-space error. Tile content is not decoded here:
//! callers register content handlers keyed by file extension and receive the
//! resolved content URLs. Batched 3D Model (`b3dm`) containers are unwrapped
//! to their embedded GLB by [`BatchedModel::parse`].
//!
//! # Example
//!
//! ```ignore
//! use geotiles::{Client, LodMetrics, TileTree};
//!
//! let client = Client::new();
//! let loaded = client.fetch_tileset("https://example.com/tiles/tileset.json").await?;
//! let tree = TileTree::from_tileset(&loaded.tileset, &loaded.url);
//!
//! let metrics = LodMetrics::new(viewpoint, fov_y, screen_height, 6.0);
//! let selection = tree.select(&metrics);
//! ```

pub mod bounds;
mod client;
pub mod content;
mod error;
pub mod geodesy;
pub mod handlers;
pub mod traversal;
pub mod tree;
pub mod types;

pub use bounds::BoundingSphere;
pub use client::{Client, LoadedTileset};
pub use content::{BatchedModel, DRACO_EXTENSION, glb_required_extensions};
pub use error::{Error, Result};
pub use handlers::{ContentHandlers, ExtensionPattern};
pub use traversal::{DEFAULT_ERROR_TARGET, LodMetrics, Selection};
pub use tree::{TileId, TileNode, TileTree};
pub use types::{BoundingVolume, Refine, Tile, TileContent, Tileset, UpAxis};

// Re-exported so callers can handle content URLs without a direct `url` dependency.
pub use reqwest::Url;
