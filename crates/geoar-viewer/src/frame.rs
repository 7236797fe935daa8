//! Per-frame stage ordering.
//!
//! Every frame runs, in order: sensor dispatch, camera feed, device
//! orientation, then tile streaming (only once a fix has anchored the
//! tileset). Rendering follows in Bevy's render sub-app.

use bevy::prelude::*;

use crate::state::tileset_anchored;

/// Ordered stages of the `Update` schedule.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStage {
    /// Drain sensor events into the session and controller.
    Sensors,
    CameraFeed,
    Orientation,
    Tiles,
}

pub struct FramePlugin;

impl Plugin for FramePlugin {
    fn build(&self, app: &mut App) {
        app.configure_sets(
            Update,
            (
                FrameStage::Sensors,
                FrameStage::CameraFeed,
                FrameStage::Orientation,
                FrameStage::Tiles.run_if(tileset_anchored),
            )
                .chain(),
        );
    }
}
