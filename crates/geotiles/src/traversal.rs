//! Screen-space-error tile selection.
//!
//! A tile is refined when its geometric error, projected onto the screen at
//! the tile's distance from the viewpoint, exceeds the error target in pixels.

use glam::DVec3;

use crate::bounds::BoundingSphere;
use crate::tree::{TileId, TileTree};
use crate::types::Refine;

/// Distances closer than this are clamped to avoid dividing by zero inside a tile.
const MIN_DISTANCE: f64 = 1e-3;

/// Default maximum screen-space error in pixels before a tile is refined.
pub const DEFAULT_ERROR_TARGET: f64 = 6.0;

/// Viewpoint and screen parameters for LOD decisions.
#[derive(Debug, Clone, Copy)]
pub struct LodMetrics {
    /// Viewpoint in the tileset frame.
    pub viewpoint: DVec3,
    /// Pixels per meter of geometric error at unit distance.
    pub pixels_per_meter: f64,
    /// Maximum allowed screen-space error in pixels.
    pub error_target: f64,
}

impl LodMetrics {
    /// Create metrics for a perspective camera.
    ///
    /// `fov_y` is the vertical field of view in radians and `screen_height`
    /// the viewport height in pixels.
    #[must_use]
    pub fn new(viewpoint: DVec3, fov_y: f64, screen_height: f64, error_target: f64) -> Self {
        let pixels_per_meter = screen_height / (2.0 * (fov_y * 0.5).tan());
        Self {
            viewpoint,
            pixels_per_meter,
            error_target,
        }
    }

    /// Projected error, in pixels, of a tile with the given error and bounds.
    #[must_use]
    pub fn screen_space_error(&self, geometric_error: f64, sphere: &BoundingSphere) -> f64 {
        let distance = sphere.distance_to(self.viewpoint).max(MIN_DISTANCE);
        geometric_error * self.pixels_per_meter / distance
    }

    /// Check if a tile should be refined into its children.
    #[must_use]
    pub fn should_refine(&self, geometric_error: f64, sphere: &BoundingSphere) -> bool {
        self.screen_space_error(geometric_error, sphere) > self.error_target
    }
}

/// Result of a traversal: the tiles whose content should be shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Tiles to render, in depth-first order.
    pub visible: Vec<TileId>,
}

impl TileTree {
    /// Select the tiles to render for the given viewpoint.
    pub fn select(&self, metrics: &LodMetrics) -> Selection {
        let mut selection = Selection::default();
        if !self.is_empty() {
            self.visit(self.root(), metrics, &mut selection);
        }
        selection
    }

    fn visit(&self, id: TileId, metrics: &LodMetrics, selection: &mut Selection) {
        let Some(node) = self.get(id) else {
            return;
        };

        let refine = !node.children.is_empty()
            && metrics.should_refine(node.geometric_error, &node.sphere);

        if !refine {
            if node.has_content() {
                selection.visible.push(id);
            }
            return;
        }

        if node.refine == Refine::Add && node.has_content() {
            selection.visible.push(id);
        }
        for &child in &node.children {
            self.visit(child, metrics, selection);
        }
    }
}
