//! Device orientation to camera rotation.

use glam::{EulerRot, Quat};

use crate::sensor::{OrientationPermission, OrientationSample};

/// Camera rotation for a device orientation reading.
///
/// The device frame is rotated by alpha around Y, beta around X and gamma
/// around Z (intrinsic YXZ), then tipped back 90° so the camera looks out of
/// the back of the device, then counter-rotated by the screen angle.
pub fn device_orientation_to_quat(sample: &OrientationSample) -> Quat {
    #[allow(clippy::cast_possible_truncation)]
    let [alpha, beta, gamma, screen] = [
        sample.alpha,
        sample.beta,
        sample.gamma,
        sample.screen_angle,
    ]
    .map(|degrees| degrees.to_radians() as f32);

    let device = Quat::from_euler(EulerRot::YXZ, alpha, beta, -gamma);
    let back_camera = Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2);
    let screen = Quat::from_rotation_z(-screen);
    (device * back_camera * screen).normalize()
}

/// Latest orientation sample and whether it may be used.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrientationState {
    permission: OrientationPermission,
    latest: Option<OrientationSample>,
}

impl OrientationState {
    #[must_use]
    pub fn new(permission: OrientationPermission) -> Self {
        Self {
            permission,
            latest: None,
        }
    }

    pub fn record(&mut self, sample: OrientationSample) {
        self.latest = Some(sample);
    }

    pub fn set_permission(&mut self, permission: OrientationPermission) {
        self.permission = permission;
    }

    pub fn permission(&self) -> OrientationPermission {
        self.permission
    }

    pub fn latest(&self) -> Option<&OrientationSample> {
        self.latest.as_ref()
    }

    /// True while the platform still waits for a user gesture.
    pub fn needs_prompt(&self) -> bool {
        self.permission == OrientationPermission::Prompt
    }

    /// Rotation for the camera, or identity when no usable sample exists.
    pub fn camera_rotation(&self) -> Quat {
        match self.latest {
            Some(sample) if self.permission.allows_samples() => {
                device_orientation_to_quat(&sample)
            }
            _ => Quat::IDENTITY,
        }
    }
}
