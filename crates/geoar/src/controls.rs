//! Scale and rotation applied to the tileset container.

use std::ops::RangeInclusive;

use glam::{EulerRot, Quat, Vec3};

use crate::controller::INITIAL_ROTATION_DEGREES;

/// Allowed uniform scale.
pub const SCALE_RANGE: RangeInclusive<f32> = 0.1..=20.0;
/// Slider step for scale.
pub const SCALE_STEP: f32 = 0.1;
/// Allowed rotation per axis, in degrees.
pub const ROTATION_RANGE: RangeInclusive<f32> = -180.0..=180.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Self; 3] = [Self::X, Self::Y, Self::Z];

    pub fn name(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::Z => "Z",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }
}

/// Slider state for the container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContainerControls {
    scale: f32,
    rotation_degrees: Vec3,
}

impl Default for ContainerControls {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rotation_degrees: INITIAL_ROTATION_DEGREES,
        }
    }
}

impl ContainerControls {
    /// Controls reflecting an existing placement.
    #[must_use]
    pub fn new(scale: f32, rotation_degrees: Vec3) -> Self {
        let mut controls = Self::default();
        controls.set_scale(scale);
        for axis in Axis::ALL {
            controls.set_rotation(axis, rotation_degrees[axis.index()]);
        }
        controls
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Set the uniform scale, clamped to [`SCALE_RANGE`].
    pub fn set_scale(&mut self, scale: f32) {
        if scale.is_finite() {
            self.scale = scale.clamp(*SCALE_RANGE.start(), *SCALE_RANGE.end());
        }
    }

    pub fn scale_label(&self) -> String {
        format!("{:.1}", self.scale)
    }

    pub fn rotation_degrees(&self, axis: Axis) -> f32 {
        self.rotation_degrees[axis.index()]
    }

    /// Set one rotation angle, clamped to [`ROTATION_RANGE`].
    pub fn set_rotation(&mut self, axis: Axis, degrees: f32) {
        if degrees.is_finite() {
            self.rotation_degrees[axis.index()] =
                degrees.clamp(*ROTATION_RANGE.start(), *ROTATION_RANGE.end());
        }
    }

    pub fn rotation_label(&self, axis: Axis) -> String {
        #[allow(clippy::cast_possible_truncation)]
        let degrees = self.rotation_degrees(axis).round() as i32;
        format!("{degrees}°")
    }

    /// Zero all three angles.
    pub fn reset_rotation(&mut self) {
        self.rotation_degrees = Vec3::ZERO;
    }

    /// Uniform scale vector.
    pub fn scale_vector(&self) -> Vec3 {
        Vec3::splat(self.scale)
    }

    /// Rotation as XYZ Euler angles.
    pub fn rotation(&self) -> Quat {
        let radians = self.rotation_degrees * std::f32::consts::PI / 180.0;
        Quat::from_euler(EulerRot::XYZ, radians.x, radians.y, radians.z)
    }
}
