//! Bounding spheres derived from tile bounding volumes.
//!
//! Traversal only needs distances, so every volume shape is reduced to an
//! enclosing sphere in the tileset's frame.

use glam::{DMat4, DVec3};

use crate::geodesy::geodetic_radians_to_ecef;
use crate::types::BoundingVolume;

/// A sphere in tileset coordinates (meters).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}

impl BoundingSphere {
    /// Create a sphere.
    #[must_use]
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Reduce a bounding volume to a sphere.
    ///
    /// Boxes and spheres are expressed in the tile's frame and are mapped
    /// through `transform`. Regions are geographic and already absolute, so
    /// the transform does not apply to them.
    #[must_use]
    pub fn from_volume(volume: &BoundingVolume, transform: &DMat4) -> Option<Self> {
        if let Some(obb) = &volume.obb {
            return Some(Self::from_box(obb).transformed(transform));
        }
        if let Some([x, y, z, radius]) = volume.sphere {
            return Some(Self::new(DVec3::new(x, y, z), radius).transformed(transform));
        }
        volume.region.as_ref().and_then(Self::from_region)
    }

    fn from_box(obb: &[f64; 12]) -> Self {
        let center = DVec3::new(obb[0], obb[1], obb[2]);
        let u = DVec3::new(obb[3], obb[4], obb[5]);
        let v = DVec3::new(obb[6], obb[7], obb[8]);
        let w = DVec3::new(obb[9], obb[10], obb[11]);

        // Half-axes need not be orthogonal, so take the farthest corner.
        let mut radius: f64 = 0.0;
        for su in [-1.0, 1.0] {
            for sv in [-1.0, 1.0] {
                for sw in [-1.0, 1.0] {
                    radius = radius.max((u * su + v * sv + w * sw).length());
                }
            }
        }
        Self::new(center, radius)
    }

    fn from_region(region: &[f64; 6]) -> Option<Self> {
        let [west, south, mut east, north, min_height, max_height] = *region;
        // Regions crossing the antimeridian have `east < west`.
        if east < west {
            east += std::f64::consts::TAU;
        }
        let mid_lon = (west + east) * 0.5;
        let mid_lat = (south + north) * 0.5;

        let mut points = Vec::with_capacity(18);
        for lat in [south, mid_lat, north] {
            for lon in [west, mid_lon, east] {
                for height in [min_height, max_height] {
                    points.push(geodetic_radians_to_ecef(lat, lon, height));
                }
            }
        }
        Self::from_points(&points)
    }

    /// Smallest axis-aligned-centered sphere enclosing the points.
    #[must_use]
    pub fn from_points(points: &[DVec3]) -> Option<Self> {
        let first = *points.first()?;
        let (min, max) = points
            .iter()
            .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        let center = (min + max) * 0.5;
        let radius = points
            .iter()
            .map(|p| p.distance(center))
            .fold(0.0, f64::max);
        Some(Self::new(center, radius))
    }

    /// Map the sphere through an affine transform.
    ///
    /// Non-uniform scale is handled conservatively by using the largest axis scale.
    #[must_use]
    pub fn transformed(&self, transform: &DMat4) -> Self {
        let scale = transform
            .x_axis
            .truncate()
            .length()
            .max(transform.y_axis.truncate().length())
            .max(transform.z_axis.truncate().length());
        Self::new(transform.transform_point3(self.center), self.radius * scale)
    }

    /// Smallest sphere enclosing both spheres.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let offset = other.center - self.center;
        let distance = offset.length();

        if distance + other.radius <= self.radius {
            return *self;
        }
        if distance + self.radius <= other.radius {
            return *other;
        }

        let radius = (distance + self.radius + other.radius) * 0.5;
        let center = self.center + offset * ((radius - self.radius) / distance);
        Self::new(center, radius)
    }

    /// Distance from a point to the sphere's surface; zero inside the sphere.
    #[must_use]
    pub fn distance_to(&self, point: DVec3) -> f64 {
        (point.distance(self.center) - self.radius).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::WGS84_A;

    fn volume_box(obb: [f64; 12]) -> BoundingVolume {
        BoundingVolume {
            obb: Some(obb),
            ..Default::default()
        }
    }

    #[test]
    fn test_box_sphere() {
        let volume = volume_box([1.0, 2.0, 3.0, 3.0, 0.0, 0.0, 0.0, 4.0, 0.0, 0.0, 0.0, 12.0]);
        let sphere = BoundingSphere::from_volume(&volume, &DMat4::IDENTITY).unwrap();
        assert_eq!(sphere.center, DVec3::new(1.0, 2.0, 3.0));
        assert!((sphere.radius - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_sphere_with_transform() {
        let volume = BoundingVolume {
            sphere: Some([0.0, 0.0, 0.0, 2.0]),
            ..Default::default()
        };
        let transform = DMat4::from_scale_rotation_translation(
            DVec3::splat(3.0),
            glam::DQuat::IDENTITY,
            DVec3::new(10.0, 0.0, 0.0),
        );
        let sphere = BoundingSphere::from_volume(&volume, &transform).unwrap();
        assert_eq!(sphere.center, DVec3::new(10.0, 0.0, 0.0));
        assert!((sphere.radius - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_region_sphere_sits_on_ellipsoid() {
        // A small region around (0, 0).
        let volume = BoundingVolume {
            region: Some([-0.001, -0.001, 0.001, 0.001, 0.0, 100.0]),
            ..Default::default()
        };
        let sphere = BoundingSphere::from_volume(&volume, &DMat4::IDENTITY).unwrap();
        assert!((sphere.center.x - WGS84_A).abs() < 200.0);
        assert!(sphere.radius > 6_000.0 && sphere.radius < 10_000.0);
    }

    #[test]
    fn test_region_across_antimeridian() {
        // 179°E to 179°W on the equator, 2° wide.
        let west = 179.0_f64.to_radians();
        let east = (-179.0_f64).to_radians();
        let volume = BoundingVolume {
            region: Some([west, -0.001, east, 0.001, 0.0, 100.0]),
            ..Default::default()
        };
        let sphere = BoundingSphere::from_volume(&volume, &DMat4::IDENTITY).unwrap();
        // Centered near lon 180, not wrapped around the far side of the globe.
        assert!((sphere.center.x + WGS84_A).abs() < 1_000.0);
        assert!(sphere.center.y.abs() < 1_000.0);
        assert!(sphere.radius < 200_000.0);
    }

    #[test]
    fn test_empty_volume() {
        assert!(BoundingSphere::from_volume(&BoundingVolume::default(), &DMat4::IDENTITY).is_none());
    }

    #[test]
    fn test_union_contains_both() {
        let a = BoundingSphere::new(DVec3::ZERO, 1.0);
        let b = BoundingSphere::new(DVec3::new(10.0, 0.0, 0.0), 2.0);
        let u = a.union(&b);
        assert!((u.radius - 6.5).abs() < 1e-9);
        assert!((u.center.x - 5.5).abs() < 1e-9);

        // Nested spheres return the outer one.
        let outer = BoundingSphere::new(DVec3::ZERO, 10.0);
        assert_eq!(outer.union(&a), outer);
        assert_eq!(a.union(&outer), outer);
    }

    #[test]
    fn test_distance_to() {
        let sphere = BoundingSphere::new(DVec3::ZERO, 5.0);
        assert_eq!(sphere.distance_to(DVec3::new(1.0, 0.0, 0.0)), 0.0);
        assert!((sphere.distance_to(DVec3::new(0.0, 8.0, 0.0)) - 3.0).abs() < 1e-9);
    }
}
