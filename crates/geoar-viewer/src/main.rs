//! Augmented-reality viewer for 3D Tiles.
//!
//! Streams a tileset, anchors it at the device's first GPS fix and renders it
//! over the rear camera feed, with the camera following the device's
//! position and orientation.

mod async_runtime;
mod camera_feed;
mod frame;
mod launch_params;
mod scene;
mod sensors;
mod state;
mod tiles;
mod ui;

use async_runtime::AsyncRuntimePlugin;
use bevy::prelude::*;
use camera_feed::CameraFeedPlugin;
use frame::FramePlugin;
use scene::ScenePlugin;
use sensors::SensorPlugin;
use state::SessionStatePlugin;
use tiles::TilesPlugin;
use ui::UiPlugin;

/// Plugin for the main application.
pub struct AppPlugin;

impl Plugin for AppPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            SessionStatePlugin,
            FramePlugin,
            ScenePlugin,
            SensorPlugin,
            CameraFeedPlugin,
            TilesPlugin,
            UiPlugin,
        ));
    }
}

fn main() {
    // Initialize tracing for native platforms.
    #[cfg(not(target_family = "wasm"))]
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    // Initialize tracing for WASM (logs to browser console).
    #[cfg(target_family = "wasm")]
    {
        console_error_panic_hook::set_once();
        tracing_wasm::set_as_global_default();
    }

    let params = launch_params::parse();
    tracing::info!(url = %params.tileset_url, policy = ?params.anchor_policy, "starting");

    let mut app = App::new();

    #[allow(unused_mut)]
    let mut window = Window {
        title: "geoar-viewer".to_string(),
        ..Default::default()
    };

    // WASM: Fit canvas to parent element, prevent browser event handling, and
    // let the camera feed show through.
    #[cfg(target_family = "wasm")]
    {
        window.fit_canvas_to_parent = true;
        window.prevent_default_event_handling = true;
        window.transparent = true;
    }

    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(window),
        ..Default::default()
    }));

    // Add async runtime (Tokio on native, no-op on WASM).
    app.add_plugins(AsyncRuntimePlugin);

    app.insert_resource(params).add_plugins(AppPlugin).run();
}
