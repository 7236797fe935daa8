//! Camera, lights and reference helpers.
//!
//! The camera sits at the projected GPS position and looks where the device
//! points. On the web the canvas is transparent so the camera feed behind it
//! shows through.

use std::f32::consts::FRAC_PI_2;

use bevy::light::light_consts::lux;
use bevy::prelude::*;

use crate::frame::FrameStage;
use crate::launch_params::LaunchParams;
use crate::state::ArSession;

/// Vertical field of view in degrees.
const FOV_DEGREES: f32 = 80.0;
/// Far plane in meters.
const FAR: f32 = 1000.0;
/// Axis gizmo length in meters.
const AXES_LENGTH: f32 = 5.0;
/// Ground grid cells per side.
const GRID_CELLS: u32 = 10;

pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(ClearColor(background()))
            .add_systems(Startup, setup_scene)
            .add_systems(
                Update,
                apply_camera_pose.in_set(FrameStage::Orientation),
            )
            .add_systems(Update, draw_reference_gizmos);
    }
}

/// The AR camera.
#[derive(Component)]
pub struct ArCamera;

#[cfg(target_family = "wasm")]
fn background() -> Color {
    Color::NONE
}

#[cfg(not(target_family = "wasm"))]
fn background() -> Color {
    Color::BLACK
}

fn setup_scene(mut commands: Commands, params: Res<LaunchParams>) {
    commands.spawn((
        ArCamera,
        Camera3d::default(),
        Transform::IDENTITY,
        Projection::Perspective(PerspectiveProjection {
            fov: FOV_DEGREES.to_radians(),
            near: params.near,
            far: FAR,
            ..default()
        }),
    ));

    // Key light from above and behind the origin, plus a dimmer fill so
    // faces away from the key are not black.
    commands.spawn((
        DirectionalLight {
            illuminance: lux::OVERCAST_DAY,
            ..default()
        },
        Transform::from_xyz(0.0, 10.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.spawn((
        DirectionalLight {
            illuminance: lux::OVERCAST_DAY * 0.3,
            ..default()
        },
        Transform::from_xyz(-10.0, 5.0, -10.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    tracing::info!(near = params.near, far = FAR, "scene setup complete");
}

/// Move the camera to the latest fix and turn it with the device.
fn apply_camera_pose(session: Res<ArSession>, mut cameras: Query<&mut Transform, With<ArCamera>>) {
    let Ok(mut transform) = cameras.single_mut() else {
        return;
    };
    if let Some(position) = session.camera_position() {
        transform.translation = position.as_vec3();
    }
    transform.rotation = session.orientation().camera_rotation();
}

/// Axes at the local origin and a ground grid.
fn draw_reference_gizmos(mut gizmos: Gizmos) {
    gizmos.axes(Transform::IDENTITY, AXES_LENGTH);
    gizmos.grid(
        Isometry3d::from_rotation(Quat::from_rotation_x(FRAC_PI_2)),
        UVec2::splat(GRID_CELLS),
        Vec2::splat(1.0),
        Color::srgba(0.5, 0.5, 0.5, 0.6),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoar::{GeoFix, OrientationSample, SensorListener};

    #[test]
    fn test_camera_follows_session() {
        let mut app = App::new();
        app.init_resource::<ArSession>()
            .add_systems(Update, apply_camera_pose);
        let camera = app.world_mut().spawn((ArCamera, Transform::IDENTITY)).id();

        {
            let mut session = app.world_mut().resource_mut::<ArSession>();
            session.on_fix(GeoFix::new(51.0, -0.7, 5.0));
            session.on_fix(GeoFix::new(51.0001, -0.7, 5.0));
            session.on_orientation(OrientationSample {
                beta: 90.0,
                ..OrientationSample::default()
            });
        }
        app.update();

        let transform = app.world().get::<Transform>(camera).unwrap();
        // Moved north, which is -Z in the scene.
        assert!(transform.translation.z < -10.0);
        assert!(transform.translation.x.abs() < 1e-3);
        // Upright device looks north.
        let forward = transform.rotation * Vec3::NEG_Z;
        assert!((forward - Vec3::NEG_Z).length() < 1e-4);
    }
}
