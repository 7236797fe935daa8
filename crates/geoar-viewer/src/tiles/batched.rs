//! Asset loader for Batched 3D Model (`b3dm`) tiles.
//!
//! The container is unwrapped with [`geotiles::BatchedModel`] and the
//! embedded GLB is handed to Bevy's glTF loader as a nested load, so tile
//! scenes come out the same way as for plain `.glb` content.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bevy::asset::io::{Reader, VecReader};
use bevy::asset::{AssetLoader, LoadContext, LoadDirectError};
use bevy::gltf::Gltf;
use bevy::prelude::*;
use bevy::reflect::TypePath;
use geotiles::{BatchedModel, DRACO_EXTENSION, glb_required_extensions};
use glam::DVec3;

/// Plugin registering the `b3dm` loader.
pub struct BatchedModelPlugin;

impl Plugin for BatchedModelPlugin {
    fn build(&self, app: &mut App) {
        app.init_asset::<BatchedScene>()
            .register_asset_loader(B3dmLoader);
    }
}

/// A decoded `b3dm` tile.
#[derive(Asset, TypePath, Debug)]
pub struct BatchedScene {
    /// The embedded glTF's default scene.
    #[dependency]
    pub scene: Handle<Scene>,
    /// Offset the scene's positions are relative to, in the tile's Z-up frame.
    pub rtc_center: DVec3,
}

#[derive(Debug)]
pub enum B3dmError {
    Io(std::io::Error),
    Parse(geotiles::Error),
    /// The embedded glTF requires an extension Bevy cannot decode.
    Unsupported(String),
    Gltf(LoadDirectError),
    /// The embedded glTF has no scene to spawn.
    NoScene,
}

impl fmt::Display for B3dmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read b3dm: {e}"),
            Self::Parse(e) => write!(f, "{e}"),
            Self::Unsupported(extension) => {
                write!(f, "b3dm requires unsupported glTF extension {extension}")
            }
            Self::Gltf(e) => write!(f, "embedded glTF failed to load: {e}"),
            Self::NoScene => write!(f, "embedded glTF has no scenes"),
        }
    }
}

impl std::error::Error for B3dmError {}

/// Distinguishes the nested GLB loads; their sub-assets are addressed by path.
static NEXT_GLB: AtomicU64 = AtomicU64::new(0);

#[derive(Default, TypePath)]
struct B3dmLoader;

impl AssetLoader for B3dmLoader {
    type Asset = BatchedScene;
    type Settings = ();
    type Error = B3dmError;

    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &Self::Settings,
        load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await.map_err(B3dmError::Io)?;
        let model = BatchedModel::parse(&bytes).map_err(B3dmError::Parse)?;

        // Unreadable JSON is left for the glTF loader to report.
        let required = glb_required_extensions(model.glb).unwrap_or_default();
        if let Some(extension) = required.iter().find(|e| e.as_str() == DRACO_EXTENSION) {
            return Err(B3dmError::Unsupported(extension.clone()));
        }

        let glb_path = format!("b3dm/{}.glb", NEXT_GLB.fetch_add(1, Ordering::Relaxed));
        let mut glb_reader = VecReader::new(model.glb.to_vec());
        let loaded = load_context
            .loader()
            .immediate()
            .with_reader(&mut glb_reader)
            .load::<Gltf>(glb_path)
            .await
            .map_err(B3dmError::Gltf)?;

        let gltf = loaded.get();
        let scene = gltf
            .default_scene
            .clone()
            .or_else(|| gltf.scenes.first().cloned())
            .ok_or(B3dmError::NoScene)?;
        tracing::trace!(
            batch_length = model.batch_length,
            rtc_center = ?model.rtc_center,
            "decoded b3dm"
        );

        // Registering the glTF sends its meshes, materials and scenes too.
        load_context.add_loaded_labeled_asset("glb", loaded);

        Ok(BatchedScene {
            scene,
            rtc_center: model.rtc_center,
        })
    }

    fn extensions(&self) -> &[&str] {
        &["b3dm"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draco_error_names_extension() {
        let error = B3dmError::Unsupported(DRACO_EXTENSION.to_owned());
        assert!(error.to_string().contains(DRACO_EXTENSION));
    }
}
