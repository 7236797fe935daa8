//! Resources holding the AR session and tileset lifecycle.

use bevy::prelude::*;
use geoar::{
    ContainerControls, OrientationPermission, Session, SessionConfig, TilesetController,
};

use crate::launch_params::LaunchParams;

/// The session: readout, debug log, watchdog, orientation and camera position.
#[derive(Resource, Default, Deref, DerefMut)]
pub struct ArSession(Session);

/// The anchor latch and the tileset's root entity once launched.
#[derive(Resource, Deref, DerefMut)]
pub struct TilesetLifecycle(TilesetController<Entity>);

impl TilesetLifecycle {
    pub fn new(controller: TilesetController<Entity>) -> Self {
        Self(controller)
    }
}

/// Slider state for the tileset container.
#[derive(Resource, Default, Deref, DerefMut)]
pub struct ContainerSliders(ContainerControls);

impl ContainerSliders {
    pub fn new(controls: ContainerControls) -> Self {
        Self(controls)
    }
}

/// Creates the session resources from the launch parameters.
pub struct SessionStatePlugin;

impl Plugin for SessionStatePlugin {
    fn build(&self, app: &mut App) {
        let params = app
            .world()
            .get_resource::<LaunchParams>()
            .cloned()
            .unwrap_or_default();

        let session = Session::new(SessionConfig {
            elevation: params.elevation,
            orientation_permission: initial_orientation_permission(),
            ..SessionConfig::default()
        });
        let controller = TilesetController::new(params.tileset_url.clone(), params.anchor_policy);

        app.insert_resource(ArSession(session))
            .insert_resource(TilesetLifecycle::new(controller))
            .init_resource::<ContainerSliders>();
    }
}

/// True once a fix has anchored the tileset.
pub fn tileset_anchored(lifecycle: Option<Res<TilesetLifecycle>>) -> bool {
    lifecycle.is_some_and(|lifecycle| lifecycle.is_anchored())
}

#[cfg(target_family = "wasm")]
fn initial_orientation_permission() -> OrientationPermission {
    crate::sensors::web::orientation_permission_state()
}

#[cfg(not(target_family = "wasm"))]
fn initial_orientation_permission() -> OrientationPermission {
    OrientationPermission::NotRequired
}
