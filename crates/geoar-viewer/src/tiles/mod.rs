//! Tileset streaming.
//!
//! The first fix launches the tileset: a hidden container entity is spawned
//! with the tileset root beneath it and the manifest is fetched in the
//! background. When the manifest arrives the container is placed at the
//! anchor and revealed, and [`engine`] starts selecting tiles for the camera.
//! Batched 3D Model tiles are decoded by the loader in [`batched`].
//!
//! Uses platform-specific async runtimes through [`TaskSpawner`]:
//! - Native: `bevy-tokio-tasks` for Tokio runtime (reqwest requires it)
//! - WASM: Bevy's built-in `AsyncComputeTaskPool` (reqwest uses browser fetch)

mod batched;
mod engine;

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use geoar::{ContainerControls, TilesetLaunch, TilesetLauncher};
use geotiles::{LoadedTileset, TileId, TileTree, Url};

use crate::async_runtime::TaskSpawner;
use crate::frame::FrameStage;
use crate::launch_params::LaunchParams;
use crate::state::{ArSession, ContainerSliders, TilesetLifecycle};

pub use engine::TileEngine;

/// Plugin for tileset loading, placement and LOD.
pub struct TilesPlugin;

impl Plugin for TilesPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(batched::BatchedModelPlugin)
            .init_resource::<TilesClient>()
            .init_resource::<TileEngine>();

        init_tile_channels(app);

        app.add_systems(
            Update,
            (
                poll_root_manifest,
                place_container,
                engine::poll_external_tilesets,
                engine::update_selection,
            )
                .chain()
                .in_set(FrameStage::Tiles),
        );
    }
}

/// Marker for the entity registered at the GPS anchor. Slider scale and
/// rotation apply here.
#[derive(Component)]
pub struct TilesetContainer;

/// Marker for the tileset root beneath the container. Tile scenes are its
/// children.
#[derive(Component)]
pub struct TilesetRoot;

/// Shared manifest client.
#[derive(Resource, Default, Clone, Deref)]
pub struct TilesClient(geotiles::Client);

/// An external tileset referenced from a tile's content.
struct ExternalTileset {
    parent: TileId,
    url: Url,
    result: geotiles::Result<LoadedTileset>,
}

/// Channels for receiving fetch results from async tasks.
#[derive(Resource)]
struct TileChannels {
    manifest_tx: async_channel::Sender<geotiles::Result<LoadedTileset>>,
    manifest_rx: async_channel::Receiver<geotiles::Result<LoadedTileset>>,
    external_tx: async_channel::Sender<ExternalTileset>,
    external_rx: async_channel::Receiver<ExternalTileset>,
}

fn init_tile_channels(app: &mut App) {
    let (manifest_tx, manifest_rx) = async_channel::unbounded();
    let (external_tx, external_rx) = async_channel::unbounded();
    app.insert_resource(TileChannels {
        manifest_tx,
        manifest_rx,
        external_tx,
        external_rx,
    });
}

/// Everything needed to start streaming a tileset from inside a system.
#[derive(SystemParam)]
pub struct TilesetLaunchContext<'w, 's> {
    commands: Commands<'w, 's>,
    spawner: TaskSpawner<'w, 's>,
    client: Res<'w, TilesClient>,
    channels: Res<'w, TileChannels>,
    engine: ResMut<'w, TileEngine>,
    params: Res<'w, LaunchParams>,
}

impl TilesetLauncher for TilesetLaunchContext<'_, '_> {
    type Handle = Entity;

    fn launch(&mut self, request: &TilesetLaunch) -> Entity {
        let root = self
            .commands
            .spawn((TilesetRoot, Name::new("tileset root"), Transform::IDENTITY))
            .id();
        let container = self
            .commands
            .spawn((
                TilesetContainer,
                Name::new("tileset container"),
                Transform::IDENTITY,
                Visibility::Hidden,
            ))
            .add_child(root)
            .id();

        self.engine.start(root, self.params.error_target);

        let client = self.client.clone();
        let url = request.tileset_url.clone();
        self.spawner.spawn_reply(
            async move { client.fetch_tileset(&url).await },
            self.channels.manifest_tx.clone(),
        );

        container
    }
}

/// Place the container once the root manifest is in.
fn poll_root_manifest(
    channels: Res<TileChannels>,
    mut session: ResMut<ArSession>,
    mut lifecycle: ResMut<TilesetLifecycle>,
    mut sliders: ResMut<ContainerSliders>,
    mut engine: ResMut<TileEngine>,
) {
    while let Ok(result) = channels.manifest_rx.try_recv() {
        let loaded = match result {
            Ok(loaded) => loaded,
            Err(e) => {
                session.tileset_failed(&e);
                continue;
            }
        };

        let tree = TileTree::from_tileset(&loaded.tileset, &loaded.url);
        let sphere = tree.bounding_sphere();
        tracing::info!(
            url = %loaded.url,
            tiles = tree.len(),
            radius = sphere.radius,
            "tileset manifest loaded"
        );

        let Some((placement, position)) = session.place_tileset(&mut **lifecycle, &sphere) else {
            tracing::warn!(url = %loaded.url, "manifest arrived with no pending launch");
            continue;
        };
        tracing::info!(?position, "tileset container placed");

        engine.set_tree(tree, placement.recenter);
        **sliders = ContainerControls::new(placement.scale, placement.rotation_degrees);
    }
}

/// Keep the container at the anchor with the slider transform applied.
fn place_container(
    session: Res<ArSession>,
    lifecycle: Res<TilesetLifecycle>,
    sliders: Res<ContainerSliders>,
    mut containers: Query<(&mut Transform, &mut Visibility), With<TilesetContainer>>,
) {
    let Some(position) = session.container_position(&**lifecycle) else {
        return;
    };
    let target = Transform {
        translation: position.as_vec3(),
        rotation: sliders.rotation(),
        scale: sliders.scale_vector(),
    };

    for (mut transform, mut visibility) in &mut containers {
        transform.set_if_neq(target);
        visibility.set_if_neq(Visibility::Inherited);
    }
}
