//! WGS84 geodesy: geodetic/ECEF conversion and local east-north-up frames.
//!
//! Tilesets are usually authored in ECEF (Earth-Centered, Earth-Fixed)
//! coordinates, while an AR scene works in meters around the viewer. The
//! [`EnuFrame`] bridges the two.

use glam::{DMat3, DVec3};

/// WGS84 semi-major axis in meters.
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// WGS84 first eccentricity squared.
pub const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);

/// Convert geodetic coordinates (radians, meters) to ECEF.
pub fn geodetic_radians_to_ecef(lat: f64, lon: f64, height: f64) -> DVec3 {
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    DVec3::new(
        (n + height) * cos_lat * cos_lon,
        (n + height) * cos_lat * sin_lon,
        (n * (1.0 - WGS84_E2) + height) * sin_lat,
    )
}

/// Convert geodetic coordinates (degrees, meters) to ECEF.
pub fn geodetic_to_ecef(lat_deg: f64, lon_deg: f64, height: f64) -> DVec3 {
    geodetic_radians_to_ecef(lat_deg.to_radians(), lon_deg.to_radians(), height)
}

/// Convert ECEF to geodetic coordinates `(lat_deg, lon_deg, height)`.
///
/// Uses a fixed number of Bowring iterations, which converges to sub-millimeter
/// accuracy away from the poles.
pub fn ecef_to_geodetic(position: DVec3) -> (f64, f64, f64) {
    let lon = position.y.atan2(position.x);
    let p = position.x.hypot(position.y);
    let mut lat = position.z.atan2(p * (1.0 - WGS84_E2));
    let mut height = 0.0;

    for _ in 0..6 {
        let sin_lat = lat.sin();
        let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        height = p / lat.cos() - n;
        lat = position.z.atan2(p * (1.0 - WGS84_E2 * n / (n + height)));
    }

    (lat.to_degrees(), lon.to_degrees(), height)
}

/// A local east-north-up tangent frame anchored at a geodetic position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnuFrame {
    origin: DVec3,
    /// Columns are the east, north and up unit vectors in ECEF.
    axes: DMat3,
}

impl EnuFrame {
    /// Create a frame whose origin is the given geodetic position (degrees, meters).
    pub fn at(lat_deg: f64, lon_deg: f64, height: f64) -> Self {
        let (sin_lat, cos_lat) = lat_deg.to_radians().sin_cos();
        let (sin_lon, cos_lon) = lon_deg.to_radians().sin_cos();

        let east = DVec3::new(-sin_lon, cos_lon, 0.0);
        let north = DVec3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat);
        let up = DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat);

        Self {
            origin: geodetic_to_ecef(lat_deg, lon_deg, height),
            axes: DMat3::from_cols(east, north, up),
        }
    }

    /// Origin of the frame in ECEF.
    pub fn origin(&self) -> DVec3 {
        self.origin
    }

    /// ECEF to local `(east, north, up)` meters.
    pub fn to_enu(&self, ecef: DVec3) -> DVec3 {
        self.axes.transpose() * (ecef - self.origin)
    }

    /// Local `(east, north, up)` meters to ECEF.
    pub fn to_ecef(&self, enu: DVec3) -> DVec3 {
        self.origin + self.axes * enu
    }

    /// Geodetic position (degrees, meters) to local `(east, north, up)` meters.
    pub fn geodetic_to_enu(&self, lat_deg: f64, lon_deg: f64, height: f64) -> DVec3 {
        self.to_enu(geodetic_to_ecef(lat_deg, lon_deg, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_equator_prime_meridian() {
        let p = geodetic_to_ecef(0.0, 0.0, 0.0);
        assert!((p.x - WGS84_A).abs() < 1e-6);
        assert!(p.y.abs() < 1e-6);
        assert!(p.z.abs() < 1e-6);
    }

    #[test]
    fn test_north_pole_uses_polar_radius() {
        let p = geodetic_to_ecef(90.0, 0.0, 0.0);
        let polar_radius = WGS84_A * (1.0 - WGS84_F);
        assert!((p.z - polar_radius).abs() < 1e-3);
    }

    #[test]
    fn test_enu_axes() {
        let frame = EnuFrame::at(51.0501, -0.72, 0.0);

        // A point straight above the origin is pure "up".
        let above = geodetic_to_ecef(51.0501, -0.72, 100.0);
        let enu = frame.to_enu(above);
        assert!(enu.x.abs() < 1e-6);
        assert!(enu.y.abs() < 1e-6);
        assert!((enu.z - 100.0).abs() < 1e-6);

        // A small step north has a positive north component and almost no east.
        let north = frame.geodetic_to_enu(51.0511, -0.72, 0.0);
        assert!(north.y > 100.0 && north.y < 120.0);
        assert!(north.x.abs() < 1e-6);

        // A small step east has a positive east component.
        let east = frame.geodetic_to_enu(51.0501, -0.71, 0.0);
        assert!(east.x > 600.0 && east.x < 800.0);
    }

    #[test]
    fn test_enu_ecef_inverse() {
        let frame = EnuFrame::at(30.538_563, 104.062_78, 500.0);
        let local = DVec3::new(12.5, -40.0, 3.0);
        let back = frame.to_enu(frame.to_ecef(local));
        assert!((back - local).length() < 1e-6);
    }

    proptest! {
        #[test]
        fn geodetic_round_trip(
            lat in -80.0f64..80.0,
            lon in -179.0f64..179.0,
            height in -100.0f64..10_000.0,
        ) {
            let (lat2, lon2, height2) = ecef_to_geodetic(geodetic_to_ecef(lat, lon, height));
            prop_assert!((lat - lat2).abs() < 1e-7);
            prop_assert!((lon - lon2).abs() < 1e-7);
            prop_assert!((height - height2).abs() < 1e-3);
        }
    }
}
