//! Projection of geographic coordinates into the scene.
//!
//! The first projected position fixes a local east-north-up frame. Scene
//! coordinates are Y-up: `x = east`, `y = up`, `z = -north`.

use glam::{DMat4, DVec3};

use geotiles::geodesy::EnuFrame;

use crate::anchor::GeoAnchor;
use crate::sensor::GeoFix;

/// How the camera's height above the local origin is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElevationMode {
    /// Always this many meters above the origin.
    Fixed(f64),
    /// Use the fix altitude relative to the origin's altitude.
    Reported,
}

impl Default for ElevationMode {
    fn default() -> Self {
        Self::Fixed(0.0)
    }
}

/// Maps fixes and anchors to scene coordinates around a lazily chosen origin.
#[derive(Debug, Clone, Default)]
pub struct LocalProjection {
    elevation: ElevationMode,
    frame: Option<EnuFrame>,
    origin_height: f64,
}

/// Convert ENU to scene axes.
pub fn enu_to_scene(enu: DVec3) -> DVec3 {
    DVec3::new(enu.x, enu.z, -enu.y)
}

/// Rotation taking a Z-up frame (tilesets, ENU) to the Y-up scene.
pub fn z_up_to_scene() -> DMat4 {
    DMat4::from_rotation_x(-std::f64::consts::FRAC_PI_2)
}

impl LocalProjection {
    #[must_use]
    pub fn new(elevation: ElevationMode) -> Self {
        Self {
            elevation,
            frame: None,
            origin_height: 0.0,
        }
    }

    pub fn elevation(&self) -> ElevationMode {
        self.elevation
    }

    /// True once the origin is fixed.
    pub fn has_origin(&self) -> bool {
        self.frame.is_some()
    }

    /// Fix the origin at `fix` unless one is already set. Returns true if it was set now.
    pub fn ensure_origin(&mut self, fix: &GeoFix) -> bool {
        if self.frame.is_some() {
            return false;
        }
        self.origin_height = match self.elevation {
            ElevationMode::Fixed(_) => 0.0,
            ElevationMode::Reported => fix.altitude.unwrap_or(0.0),
        };
        self.frame = Some(EnuFrame::at(
            fix.latitude,
            fix.longitude,
            self.origin_height,
        ));
        tracing::debug!(
            lat = fix.latitude,
            lon = fix.longitude,
            height = self.origin_height,
            "local origin set"
        );
        true
    }

    /// Horizontal scene position of a coordinate, at the origin's height.
    pub fn project(&self, latitude: f64, longitude: f64) -> Option<DVec3> {
        let frame = self.frame.as_ref()?;
        let enu = frame.geodetic_to_enu(latitude, longitude, self.origin_height);
        Some(enu_to_scene(enu).with_y(0.0))
    }

    /// Scene position of the camera for a fix, setting the origin on first use.
    pub fn camera_position(&mut self, fix: &GeoFix) -> DVec3 {
        self.ensure_origin(fix);
        let horizontal = self
            .project(fix.latitude, fix.longitude)
            .unwrap_or(DVec3::ZERO);
        let height = match self.elevation {
            ElevationMode::Fixed(height) => height,
            ElevationMode::Reported => fix
                .altitude
                .map_or(0.0, |altitude| altitude - self.origin_height),
        };
        DVec3::new(horizontal.x, height, horizontal.z)
    }

    /// Scene position of an anchor, once the origin is known.
    pub fn anchor_position(&self, anchor: &GeoAnchor) -> Option<DVec3> {
        self.project(anchor.latitude, anchor.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_fix_is_origin() {
        let mut projection = LocalProjection::default();
        let fix = GeoFix::new(51.0501, -0.72, 10.0);
        assert!(projection.anchor_position(&GeoAnchor::from(fix)).is_none());

        let position = projection.camera_position(&fix);
        assert!(position.length() < 1e-6);
        assert!(!projection.ensure_origin(&GeoFix::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_axes() {
        let mut projection = LocalProjection::default();
        projection.ensure_origin(&GeoFix::new(0.0, 0.0, 1.0));

        // About 111 m per millidegree of latitude at the equator.
        let north = projection.project(0.001, 0.0).unwrap();
        assert!(north.z < -100.0 && north.z > -120.0);
        assert!(north.x.abs() < 1e-6);

        let east = projection.project(0.0, 0.001).unwrap();
        assert!(east.x > 100.0 && east.x < 120.0);
        assert!(east.z.abs() < 1e-6);
    }

    #[test]
    fn test_fixed_elevation() {
        let mut projection = LocalProjection::new(ElevationMode::Fixed(1.6));
        let fix = GeoFix::new(30.0, 120.0, 5.0).with_altitude(250.0);
        let position = projection.camera_position(&fix);
        assert!((position.y - 1.6).abs() < 1e-12);
    }

    #[test]
    fn test_reported_elevation_is_relative() {
        let mut projection = LocalProjection::new(ElevationMode::Reported);
        projection.camera_position(&GeoFix::new(30.0, 120.0, 5.0).with_altitude(100.0));
        let position = projection.camera_position(&GeoFix::new(30.0, 120.0, 5.0).with_altitude(112.5));
        assert!((position.y - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_enu_to_scene() {
        assert_eq!(
            enu_to_scene(DVec3::new(1.0, 2.0, 3.0)),
            DVec3::new(1.0, 3.0, -2.0)
        );
        let rotated = z_up_to_scene().transform_point3(DVec3::new(1.0, 2.0, 3.0));
        assert!((rotated - DVec3::new(1.0, 3.0, -2.0)).length() < 1e-12);
    }
}
