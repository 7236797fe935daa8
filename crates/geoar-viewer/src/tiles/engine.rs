//! Tile selection and content loading.
//!
//! Each frame the camera is carried into the tileset frame, the tree selects
//! the tiles whose screen-space error is within the target, and their
//! content is dispatched by extension: glTF and `b3dm` scenes are spawned
//! beneath the tileset root, KTX2 textures are held while their tile is
//! selected, and nested manifests are fetched and grafted into the tree.
//!
//! Tiles that drop out of the selection are despawned only once everything
//! that replaces them has finished loading, so refinement never leaves a
//! hole in the model.

use std::collections::{HashMap, HashSet};

use bevy::asset::{LoadState, UntypedAssetId};
use bevy::prelude::*;
use geoar::projection::z_up_to_scene;
use geotiles::{
    ContentHandlers, DRACO_EXTENSION, ExtensionPattern, LodMetrics, TileId, TileTree, UpAxis, Url,
};
use glam::{DMat4, DVec3};

use super::batched::BatchedScene;
use super::{ExternalTileset, TileChannels, TilesClient};
use crate::async_runtime::TaskSpawner;
use crate::scene::ArCamera;
use crate::state::{ArSession, ContainerSliders, TilesetLifecycle};

/// Fallback viewport height when no window is available.
const DEFAULT_SCREEN_HEIGHT: f64 = 720.0;

/// What a content URL is loaded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentKind {
    Scene,
    Batched,
    Texture,
    Tileset,
}

/// Scene content selected for display.
#[derive(Debug, Clone)]
struct PlannedScene {
    url: Url,
    batched: bool,
    /// Tile frame relative to the tileset root entity.
    tile_frame: DMat4,
    up_axis: UpAxis,
}

impl PlannedScene {
    /// Scene transform relative to the root entity, given the content's
    /// `RTC_CENTER` offset.
    fn local_transform(&self, rtc_center: DVec3) -> DMat4 {
        self.tile_frame * DMat4::from_translation(rtc_center) * self.up_axis.to_z_up()
    }
}

enum SceneSource {
    Gltf(Handle<Scene>),
    Batched(Handle<BatchedScene>),
}

impl SceneSource {
    fn id(&self) -> UntypedAssetId {
        match self {
            Self::Gltf(handle) => handle.id().untyped(),
            Self::Batched(handle) => handle.id().untyped(),
        }
    }
}

/// A tile scene being loaded or shown.
struct TileScene {
    source: SceneSource,
    /// Spawned once the scene handle is known.
    entity: Option<Entity>,
}

impl TileScene {
    fn load(asset_server: &AssetServer, planned: &PlannedScene) -> Self {
        let path = planned.url.to_string();
        let source = if planned.batched {
            SceneSource::Batched(asset_server.load(path))
        } else {
            SceneSource::Gltf(asset_server.load(GltfAssetLabel::Scene(0).from_asset(path)))
        };
        Self {
            source,
            entity: None,
        }
    }

    /// The scene to spawn and its content offset. `b3dm` scenes are only
    /// known once the container has been decoded.
    fn scene(&self, batched: &Assets<BatchedScene>) -> Option<(Handle<Scene>, DVec3)> {
        match &self.source {
            SceneSource::Gltf(handle) => Some((handle.clone(), DVec3::ZERO)),
            SceneSource::Batched(handle) => batched
                .get(handle)
                .map(|model| (model.scene.clone(), model.rtc_center)),
        }
    }

    fn is_ready(&self, asset_server: &AssetServer) -> bool {
        self.entity.is_some() && asset_server.is_loaded_with_dependencies(self.source.id())
    }
}

/// Content requests for one selection pass.
#[derive(Debug, Default)]
struct Plan {
    scenes: Vec<PlannedScene>,
    textures: Vec<Url>,
    /// Nested manifests and the tile that references them.
    tilesets: Vec<(TileId, Url)>,
}

/// State for the streamed tileset.
#[derive(Resource, Default)]
pub struct TileEngine {
    /// Entity the tile scenes are parented to.
    root: Option<Entity>,
    tree: Option<TileTree>,
    /// Translation centering the tileset's bounds on the container origin.
    recenter: DVec3,
    error_target: f64,
    handlers: ContentHandlers<ContentKind>,
    scenes: HashMap<Url, TileScene>,
    /// Standalone texture content of the selected tiles. glTF that references
    /// the same URL shares the loaded image.
    textures: HashMap<Url, Handle<Image>>,
    /// Nested manifests currently being fetched.
    loading_tilesets: HashSet<Url>,
    /// Content that failed to load (to avoid retrying).
    failed: HashSet<Url>,
}

impl TileEngine {
    /// Register the content handlers and the root entity tiles attach to.
    pub fn start(&mut self, root: Entity, error_target: f64) {
        let mut handlers = ContentHandlers::new();
        handlers
            .add_handler(ExtensionPattern::new(["gltf", "glb"]), ContentKind::Scene)
            .add_handler(ExtensionPattern::new(["b3dm"]), ContentKind::Batched)
            .add_handler(ExtensionPattern::new(["ktx2"]), ContentKind::Texture)
            .add_handler(ExtensionPattern::new(["json"]), ContentKind::Tileset);

        *self = Self {
            root: Some(root),
            error_target,
            handlers,
            ..Self::default()
        };
    }

    /// Install the root manifest's tree.
    pub fn set_tree(&mut self, tree: TileTree, recenter: DVec3) {
        self.tree = Some(tree);
        self.recenter = recenter;
    }

    pub fn recenter(&self) -> DVec3 {
        self.recenter
    }

    /// Number of tile scenes currently spawned.
    #[must_use]
    pub fn scene_count(&self) -> usize {
        self.scenes.values().filter(|scene| scene.entity.is_some()).count()
    }

    /// Number of tiles in the tree, including grafted manifests.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tree.as_ref().map_or(0, TileTree::len)
    }

    /// Tileset frame (Z-up, recentered) to the root entity's local frame.
    fn tree_to_root(&self) -> DMat4 {
        z_up_to_scene() * DMat4::from_translation(self.recenter)
    }

    /// Work out what the selection for `metrics` needs loaded.
    fn plan(&self, metrics: &LodMetrics) -> Plan {
        let mut plan = Plan::default();
        let Some(tree) = &self.tree else {
            return plan;
        };
        let tree_to_root = self.tree_to_root();

        for id in tree.select(metrics).visible {
            let Some(node) = tree.get(id) else {
                continue;
            };
            for url in &node.content {
                if self.failed.contains(url) {
                    continue;
                }
                let kind = self.handlers.handler_for(url).copied();
                match kind {
                    Some(ContentKind::Scene | ContentKind::Batched) => {
                        plan.scenes.push(PlannedScene {
                            url: url.clone(),
                            batched: kind == Some(ContentKind::Batched),
                            tile_frame: tree_to_root * node.transform,
                            up_axis: node.up_axis,
                        });
                    }
                    Some(ContentKind::Texture) => plan.textures.push(url.clone()),
                    Some(ContentKind::Tileset) => plan.tilesets.push((id, url.clone())),
                    None => tracing::trace!(%url, "no handler for tile content"),
                }
            }
        }
        plan
    }

    /// Hold textures for `wanted` and release the rest.
    fn sync_textures(&mut self, wanted: Vec<Url>, mut load: impl FnMut(&Url) -> Handle<Image>) {
        let wanted: HashSet<Url> = wanted.into_iter().collect();
        self.textures.retain(|url, _| wanted.contains(url));
        for url in wanted {
            self.textures.entry(url).or_insert_with_key(|url| load(url));
        }
    }
}

/// True if a load failure was caused by Draco-compressed meshes.
fn is_draco_failure(message: &str) -> bool {
    message.contains(DRACO_EXTENSION)
}

/// Container transform in the scene, in double precision.
fn container_matrix(position: DVec3, sliders: &ContainerSliders) -> DMat4 {
    DMat4::from_scale_rotation_translation(
        sliders.scale_vector().as_dvec3(),
        sliders.rotation().as_dquat(),
        position,
    )
}

/// Select tiles for the camera and load or despawn content to match.
#[allow(clippy::too_many_arguments)]
pub(super) fn update_selection(
    mut commands: Commands,
    mut engine: ResMut<TileEngine>,
    asset_server: Res<AssetServer>,
    batched: Res<Assets<BatchedScene>>,
    session: Res<ArSession>,
    lifecycle: Res<TilesetLifecycle>,
    sliders: Res<ContainerSliders>,
    camera_query: Query<(&Transform, &Projection), With<ArCamera>>,
    windows: Query<&Window>,
    client: Res<TilesClient>,
    channels: Res<TileChannels>,
    spawner: TaskSpawner,
) {
    let Some(root) = engine.root else {
        return;
    };
    let Some(position) = session.container_position(&**lifecycle) else {
        return;
    };
    let Ok((camera, projection)) = camera_query.single() else {
        return;
    };
    let Projection::Perspective(perspective) = projection else {
        return;
    };

    let tree_to_scene = container_matrix(position, &sliders) * engine.tree_to_root();
    let viewpoint = tree_to_scene
        .inverse()
        .transform_point3(camera.translation.as_dvec3());
    let screen_height = windows
        .single()
        .ok()
        .map_or(DEFAULT_SCREEN_HEIGHT, |w| f64::from(w.physical_height()));
    let metrics = LodMetrics::new(
        viewpoint,
        f64::from(perspective.fov),
        screen_height,
        engine.error_target,
    );

    let plan = engine.plan(&metrics);
    let engine = &mut *engine;

    // Scenes.
    let mut desired = HashSet::with_capacity(plan.scenes.len());
    for planned in plan.scenes {
        let scene = engine
            .scenes
            .entry(planned.url.clone())
            .or_insert_with(|| {
                tracing::debug!(url = %planned.url, "loading tile");
                TileScene::load(&asset_server, &planned)
            });
        if scene.entity.is_none()
            && let Some((handle, rtc_center)) = scene.scene(&batched)
        {
            let local = planned.local_transform(rtc_center);
            scene.entity = Some(
                commands
                    .spawn((
                        SceneRoot(handle),
                        Transform::from_matrix(local.as_mat4()),
                        ChildOf(root),
                    ))
                    .id(),
            );
            tracing::debug!(url = %planned.url, "spawning tile");
        }
        desired.insert(planned.url);
    }

    // Textures.
    engine.sync_textures(plan.textures, |url| asset_server.load(url.to_string()));

    // Nested manifests.
    for (parent, url) in plan.tilesets {
        if !engine.loading_tilesets.insert(url.clone()) {
            continue;
        }
        let client = client.clone();
        let reply_url = url.clone();
        spawner.spawn_reply(
            async move {
                let result = client.fetch_tileset_url(url).await;
                ExternalTileset {
                    parent,
                    url: reply_url,
                    result,
                }
            },
            channels.external_tx.clone(),
        );
    }

    // Note failures so they drop out of future plans.
    let newly_failed: Vec<(Url, String)> = engine
        .scenes
        .iter()
        .filter_map(|(url, scene)| match asset_server.load_state(scene.source.id()) {
            LoadState::Failed(error) => Some((url.clone(), error.to_string())),
            _ => None,
        })
        .collect();
    for (url, error) in newly_failed {
        if is_draco_failure(&error) {
            tracing::warn!(%url, "tile uses Draco mesh compression, which cannot be decoded");
        } else {
            tracing::warn!(%url, "tile content failed to load: {error}");
        }
        if let Some(entity) = engine.scenes.remove(&url).and_then(|scene| scene.entity) {
            commands.entity(entity).despawn();
        }
        desired.remove(&url);
        engine.failed.insert(url);
    }

    // Keep replaced tiles until their replacements are ready.
    let replacements_ready = desired.iter().all(|url| {
        engine
            .scenes
            .get(url)
            .is_none_or(|scene| scene.is_ready(&asset_server))
    });
    if !replacements_ready {
        return;
    }

    let stale: Vec<Url> = engine
        .scenes
        .keys()
        .filter(|url| !desired.contains(*url))
        .cloned()
        .collect();
    for url in stale {
        if let Some(scene) = engine.scenes.remove(&url) {
            tracing::debug!(%url, "despawning tile");
            if let Some(entity) = scene.entity {
                commands.entity(entity).despawn();
            }
        }
    }
}

/// Graft fetched external tilesets into the tree.
pub(super) fn poll_external_tilesets(
    channels: Res<TileChannels>,
    mut engine: ResMut<TileEngine>,
) {
    while let Ok(ExternalTileset {
        parent,
        url,
        result,
    }) = channels.external_rx.try_recv()
    {
        engine.loading_tilesets.remove(&url);
        match result {
            Ok(loaded) => {
                let Some(tree) = engine.tree.as_mut() else {
                    continue;
                };
                let grafted = tree.graft(parent, &url, &loaded.tileset);
                tracing::debug!(%url, ?parent, ?grafted, "grafted external tileset");
            }
            Err(e) => {
                tracing::warn!(%url, "external tileset failed to load: {e}");
                engine.failed.insert(url);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geotiles::Tileset;

    fn engine() -> TileEngine {
        let json = r#"{
            "asset": { "version": "1.0" },
            "geometricError": 1000.0,
            "root": {
                "boundingVolume": { "sphere": [0, 0, 0, 100] },
                "geometricError": 100.0,
                "refine": "REPLACE",
                "content": { "uri": "root.glb" },
                "children": [
                    {
                        "boundingVolume": { "sphere": [-50, 0, 0, 50] },
                        "geometricError": 0.0,
                        "content": { "uri": "left.b3dm" }
                    },
                    {
                        "boundingVolume": { "sphere": [50, 0, 0, 50] },
                        "geometricError": 0.0,
                        "content": { "uri": "right/tileset.json" }
                    },
                    {
                        "boundingVolume": { "sphere": [0, 50, 0, 50] },
                        "geometricError": 0.0,
                        "content": { "uri": "atlas.ktx2" }
                    }
                ]
            }
        }"#;
        let tileset = Tileset::from_slice(json.as_bytes()).unwrap();
        let url = Url::parse("https://example.com/tiles/tileset.json").unwrap();
        let tree = TileTree::from_tileset(&tileset, &url);

        let mut engine = TileEngine::default();
        engine.start(Entity::PLACEHOLDER, 6.0);
        engine.set_tree(tree, DVec3::new(0.0, 0.0, -10.0));
        engine
    }

    fn metrics(distance: f64) -> LodMetrics {
        LodMetrics::new(
            DVec3::new(0.0, 0.0, distance),
            std::f64::consts::FRAC_PI_4,
            1080.0,
            6.0,
        )
    }

    #[test]
    fn test_far_viewpoint_plans_root_scene() {
        let plan = engine().plan(&metrics(1.0e7));
        assert_eq!(plan.scenes.len(), 1);
        assert_eq!(
            plan.scenes[0].url.as_str(),
            "https://example.com/tiles/root.glb"
        );
        assert!(!plan.scenes[0].batched);
        assert!(plan.tilesets.is_empty());
        assert!(plan.textures.is_empty());
    }

    #[test]
    fn test_near_viewpoint_refines_into_children() {
        let plan = engine().plan(&metrics(10.0));
        // The root is replaced, and the b3dm child is a scene of its own.
        assert_eq!(plan.scenes.len(), 1);
        assert_eq!(
            plan.scenes[0].url.as_str(),
            "https://example.com/tiles/left.b3dm"
        );
        assert!(plan.scenes[0].batched);
        assert_eq!(
            plan.textures,
            [Url::parse("https://example.com/tiles/atlas.ktx2").unwrap()]
        );
        assert_eq!(plan.tilesets.len(), 1);
        assert_eq!(
            plan.tilesets[0].1.as_str(),
            "https://example.com/tiles/right/tileset.json"
        );
    }

    #[test]
    fn test_failed_content_is_skipped() {
        let mut engine = engine();
        engine
            .failed
            .insert(Url::parse("https://example.com/tiles/root.glb").unwrap());
        assert!(engine.plan(&metrics(1.0e7)).scenes.is_empty());
    }

    #[test]
    fn test_scene_transform_is_y_up_and_recentered() {
        let plan = engine().plan(&metrics(1.0e7));
        let local = plan.scenes[0].local_transform(DVec3::ZERO);
        // glTF Y-up content ends up Y-up in the scene.
        let up = local.transform_vector3(DVec3::Y);
        assert!((up - DVec3::Y).length() < 1e-9);
        // Tileset Z is scene Y, so the recenter lowers the content by 10.
        let origin = local.transform_point3(DVec3::ZERO);
        assert!((origin - DVec3::new(0.0, -10.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn test_container_matrix_applies_slider_scale() {
        let mut sliders = ContainerSliders::default();
        sliders.set_scale(2.0);
        sliders.reset_rotation();
        let matrix = container_matrix(DVec3::new(1.0, 2.0, 3.0), &sliders);
        let p = matrix.transform_point3(DVec3::X);
        assert!((p - DVec3::new(3.0, 2.0, 3.0)).length() < 1e-6);
    }

    #[test]
    fn test_rtc_center_offsets_batched_scene() {
        let plan = engine().plan(&metrics(10.0));
        let planned = &plan.scenes[0];
        // RTC_CENTER is in the Z-up tile frame: +Z is scene up.
        let origin = planned
            .local_transform(DVec3::new(0.0, 0.0, 25.0))
            .transform_point3(DVec3::ZERO);
        assert!((origin - DVec3::new(0.0, 15.0, 0.0)).length() < 1e-9);
        // Content stays Y-up.
        let up = planned
            .local_transform(DVec3::ZERO)
            .transform_vector3(DVec3::Y);
        assert!((up - DVec3::Y).length() < 1e-9);
    }

    #[test]
    fn test_textures_follow_selection() {
        let mut engine = engine();
        let a = Url::parse("https://example.com/a.ktx2").unwrap();
        let b = Url::parse("https://example.com/b.ktx2").unwrap();
        let mut loads = 0;

        engine.sync_textures(vec![a.clone(), b.clone()], |_| {
            loads += 1;
            Handle::default()
        });
        assert_eq!(engine.textures.len(), 2);

        engine.sync_textures(vec![b.clone()], |_| {
            loads += 1;
            Handle::default()
        });
        assert!(!engine.textures.contains_key(&a));
        assert!(engine.textures.contains_key(&b));
        // Still-selected textures are not reloaded.
        assert_eq!(loads, 2);

        engine.sync_textures(Vec::new(), |_| Handle::default());
        assert!(engine.textures.is_empty());
    }

    #[test]
    fn test_draco_failure_detected() {
        assert!(is_draco_failure(
            "Failed to load asset 'tiles/0.b3dm': b3dm requires unsupported glTF extension KHR_draco_mesh_compression"
        ));
        assert!(!is_draco_failure("http request returned status 404"));
    }
}
