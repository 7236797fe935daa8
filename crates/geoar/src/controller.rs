//! Tileset lifecycle: anchor on a fix, launch the engine once, place the
//! container when the manifest arrives.
//!
//! The controller does not know how tilesets are loaded. It asks a
//! [`TilesetLauncher`] for an opaque handle and is told later, through
//! [`TilesetController::on_tileset_loaded`], what the tileset's bounds are.

use glam::{DVec3, Vec3};

use geotiles::BoundingSphere;

use crate::anchor::{AnchorPolicy, AnchorState, GeoAnchor};
use crate::sensor::GeoFix;

/// Default container rotation in degrees, tilting the model toward the viewer.
pub const INITIAL_ROTATION_DEGREES: Vec3 = Vec3::new(-30.0, 0.0, 0.0);

/// Everything a launcher needs to start streaming a tileset.
#[derive(Debug, Clone, PartialEq)]
pub struct TilesetLaunch {
    pub tileset_url: String,
    pub anchor: GeoAnchor,
}

/// Capability to start a tile engine.
pub trait TilesetLauncher {
    /// Handle identifying the launched engine.
    type Handle;

    fn launch(&mut self, request: &TilesetLaunch) -> Self::Handle;
}

/// What a fix did to the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixOutcome {
    /// First anchor; the engine was launched.
    Anchored(GeoAnchor),
    /// The anchor moved (follow policy).
    Reanchored(GeoAnchor),
    Ignored,
}

/// How the loaded tileset sits in the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerPlacement {
    /// Where the container is registered.
    pub anchor: GeoAnchor,
    /// Translation applied to the tileset root so its bounding sphere is
    /// centered on the container origin.
    pub recenter: DVec3,
    /// Container Euler rotation (XYZ) in degrees.
    pub rotation_degrees: Vec3,
    pub scale: f32,
}

#[derive(Debug)]
enum Phase<H> {
    Idle,
    Loading { handle: H },
    Ready { handle: H, placement: ContainerPlacement },
}

/// Owns the anchor latch and the engine handle.
#[derive(Debug)]
pub struct TilesetController<H> {
    tileset_url: String,
    policy: AnchorPolicy,
    anchor: AnchorState,
    initial_rotation: Vec3,
    phase: Phase<H>,
}

impl<H> TilesetController<H> {
    /// Create an idle controller.
    pub fn new(tileset_url: impl Into<String>, policy: AnchorPolicy) -> Self {
        Self {
            tileset_url: tileset_url.into(),
            policy,
            anchor: AnchorState::Unanchored,
            initial_rotation: INITIAL_ROTATION_DEGREES,
            phase: Phase::Idle,
        }
    }

    /// Override the container's initial rotation.
    #[must_use]
    pub fn with_initial_rotation(mut self, degrees: Vec3) -> Self {
        self.initial_rotation = degrees;
        self
    }

    /// Feed a fix. The first valid fix anchors and launches the engine.
    pub fn on_fix<L>(&mut self, fix: &GeoFix, launcher: &mut L) -> FixOutcome
    where
        L: TilesetLauncher<Handle = H> + ?Sized,
    {
        if !fix.is_valid() {
            tracing::warn!(?fix, "ignoring invalid fix");
            return FixOutcome::Ignored;
        }

        let anchor = self.policy.anchor_for(fix);
        if self.anchor.try_anchor(anchor) {
            let request = TilesetLaunch {
                tileset_url: self.tileset_url.clone(),
                anchor,
            };
            tracing::info!(
                url = %request.tileset_url,
                lat = anchor.latitude,
                lon = anchor.longitude,
                "launching tileset"
            );
            let handle = launcher.launch(&request);
            self.phase = Phase::Loading { handle };
            return FixOutcome::Anchored(anchor);
        }

        if self.policy.follows_fixes() && self.anchor.relocate(anchor) {
            if let Phase::Ready { placement, .. } = &mut self.phase {
                placement.anchor = anchor;
            }
            return FixOutcome::Reanchored(anchor);
        }

        FixOutcome::Ignored
    }

    /// The tileset manifest arrived. Returns the container placement once;
    /// later calls, or calls before a launch, return `None`.
    pub fn on_tileset_loaded(&mut self, sphere: &BoundingSphere) -> Option<ContainerPlacement> {
        let anchor = self.anchor.anchor()?;
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Loading { handle } => {
                let placement = ContainerPlacement {
                    anchor,
                    recenter: -sphere.center,
                    rotation_degrees: self.initial_rotation,
                    scale: 1.0,
                };
                tracing::debug!(
                    center = ?sphere.center,
                    radius = sphere.radius,
                    "tileset bounds received"
                );
                self.phase = Phase::Ready { handle, placement };
                Some(placement)
            }
            other => {
                self.phase = other;
                None
            }
        }
    }

    /// Handle of the launched engine, if any.
    pub fn handle(&self) -> Option<&H> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Loading { handle } | Phase::Ready { handle, .. } => Some(handle),
        }
    }

    pub fn anchor(&self) -> Option<GeoAnchor> {
        self.anchor.anchor()
    }

    pub fn is_anchored(&self) -> bool {
        self.anchor.is_anchored()
    }

    /// True once the container has been placed.
    pub fn is_ready(&self) -> bool {
        matches!(self.phase, Phase::Ready { .. })
    }

    pub fn placement(&self) -> Option<&ContainerPlacement> {
        match &self.phase {
            Phase::Ready { placement, .. } => Some(placement),
            _ => None,
        }
    }

    pub fn tileset_url(&self) -> &str {
        &self.tileset_url
    }

    pub fn policy(&self) -> AnchorPolicy {
        self.policy
    }
}
