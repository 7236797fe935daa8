//! Sensor readings, errors, and the event interface they are delivered through.
//!
//! Platform bridges (browser geolocation, a simulator, the "test location"
//! button) all produce [`SensorEvent`]s. Consumers implement
//! [`SensorListener`] and receive events via [`SensorEvent::dispatch`], so no
//! callback needs to capture shared state.

use std::fmt;
use std::time::Duration;

/// One sampled geographic position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFix {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude above the ellipsoid in meters, if the platform reports one.
    pub altitude: Option<f64>,
    /// Accuracy radius in meters.
    pub accuracy_meters: f64,
}

/// The fix injected by the "test location" button.
pub const TEST_FIX: GeoFix = GeoFix {
    latitude: 51.0501,
    longitude: -0.72,
    altitude: None,
    accuracy_meters: 10.0,
};

impl GeoFix {
    /// Create a fix without altitude.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            accuracy_meters,
        }
    }

    /// Attach an altitude.
    #[must_use]
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    /// True if the coordinates are finite and within geographic bounds.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Sensor failures surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The user or platform refused location access.
    PermissionDenied,
    /// The platform could not determine a position.
    PositionUnavailable,
    /// No position arrived within the subscription timeout.
    Timeout,
    /// Any other platform error.
    Unknown,
    /// The watchdog saw no fix within its window.
    NoFixWithinWindow,
}

impl SensorError {
    /// Classify a W3C `GeolocationPositionError.code`.
    pub fn from_geolocation_code(code: u16) -> Self {
        match code {
            1 => Self::PermissionDenied,
            2 => Self::PositionUnavailable,
            3 => Self::Timeout,
            _ => Self::Unknown,
        }
    }

    /// Message shown in the debug log and, for permission errors, the banner.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::PermissionDenied => "无法获取位置信息，请确保已授予位置权限。",
            Self::PositionUnavailable => "位置信息不可用，请移动到开阔区域后重试。",
            Self::Timeout => "获取位置超时，请稍后重试。",
            Self::Unknown => "获取位置时发生未知错误。",
            Self::NoFixWithinWindow => "10秒内未收到GPS更新，GPS可能未正常工作",
        }
    }

    /// True if the error also raises the red banner.
    pub fn shows_banner(self) -> bool {
        matches!(self, Self::PermissionDenied)
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PermissionDenied => "sensor-permission-denied",
            Self::PositionUnavailable => "sensor-unavailable",
            Self::Timeout => "sensor-timeout",
            Self::Unknown => "sensor-unknown",
            Self::NoFixWithinWindow => "no-fix-received-within-watchdog-window",
        };
        f.write_str(name)
    }
}

impl std::error::Error for SensorError {}

/// Options for the platform location subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeolocationOptions {
    /// Ask the platform for its most accurate source (GPS over Wi-Fi).
    pub high_accuracy: bool,
    /// Maximum wait for each position.
    pub timeout: Duration,
    /// Maximum age of a cached position; zero forces a fresh reading.
    pub maximum_age: Duration,
}

impl Default for GeolocationOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(30),
            maximum_age: Duration::ZERO,
        }
    }
}

impl GeolocationOptions {
    /// Timeout in whole milliseconds, saturating.
    pub fn timeout_millis(&self) -> u32 {
        u32::try_from(self.timeout.as_millis()).unwrap_or(u32::MAX)
    }

    /// Maximum age in whole milliseconds, saturating.
    pub fn maximum_age_millis(&self) -> u32 {
        u32::try_from(self.maximum_age.as_millis()).unwrap_or(u32::MAX)
    }
}

/// A device orientation reading in degrees, as delivered by `deviceorientation`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrientationSample {
    /// Rotation around the device Z axis, 0..360.
    pub alpha: f64,
    /// Rotation around the device X axis, -180..180.
    pub beta: f64,
    /// Rotation around the device Y axis, -90..90.
    pub gamma: f64,
    /// Screen orientation angle (0, 90, 180, 270).
    pub screen_angle: f64,
}

/// Whether orientation samples may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrientationPermission {
    /// The platform delivers orientation without asking.
    #[default]
    NotRequired,
    /// The platform requires a user gesture before delivering orientation.
    Prompt,
    Granted,
    Denied,
}

impl OrientationPermission {
    /// True if samples should be applied to the camera.
    pub fn allows_samples(self) -> bool {
        matches!(self, Self::NotRequired | Self::Granted)
    }
}

/// An event produced by a sensor bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    Fix(GeoFix),
    Error(SensorError),
    Orientation(OrientationSample),
    OrientationPermission(OrientationPermission),
    /// The orientation permission request itself failed, with the
    /// platform's error text.
    OrientationFailed(String),
}

impl SensorEvent {
    /// Route the event to the matching listener method.
    pub fn dispatch<L: SensorListener + ?Sized>(self, listener: &mut L) {
        match self {
            Self::Fix(fix) => listener.on_fix(fix),
            Self::Error(error) => listener.on_error(error),
            Self::Orientation(sample) => listener.on_orientation(sample),
            Self::OrientationPermission(permission) => {
                listener.on_orientation_permission(permission);
            }
            Self::OrientationFailed(detail) => listener.on_orientation_failed(&detail),
        }
    }
}

/// Receiver of sensor events.
pub trait SensorListener {
    fn on_fix(&mut self, fix: GeoFix);

    fn on_error(&mut self, error: SensorError);

    fn on_orientation(&mut self, sample: OrientationSample);

    fn on_orientation_permission(&mut self, _permission: OrientationPermission) {}

    fn on_orientation_failed(&mut self, _detail: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<&'static str>,
    }

    impl SensorListener for Recorder {
        fn on_fix(&mut self, _fix: GeoFix) {
            self.calls.push("fix");
        }

        fn on_error(&mut self, _error: SensorError) {
            self.calls.push("error");
        }

        fn on_orientation(&mut self, _sample: OrientationSample) {
            self.calls.push("orientation");
        }
    }

    #[test]
    fn test_error_classification() {
        assert_eq!(SensorError::from_geolocation_code(1), SensorError::PermissionDenied);
        assert_eq!(SensorError::from_geolocation_code(2), SensorError::PositionUnavailable);
        assert_eq!(SensorError::from_geolocation_code(3), SensorError::Timeout);
        assert_eq!(SensorError::from_geolocation_code(0), SensorError::Unknown);
        assert_eq!(SensorError::from_geolocation_code(42), SensorError::Unknown);
    }

    #[test]
    fn test_error_messages_are_distinct() {
        let errors = [
            SensorError::PermissionDenied,
            SensorError::PositionUnavailable,
            SensorError::Timeout,
            SensorError::Unknown,
            SensorError::NoFixWithinWindow,
        ];
        for (i, a) in errors.iter().enumerate() {
            for b in &errors[i + 1..] {
                assert_ne!(a.user_message(), b.user_message());
                assert_ne!(a.to_string(), b.to_string());
            }
        }
        assert!(SensorError::PermissionDenied.shows_banner());
        assert!(!SensorError::Timeout.shows_banner());
    }

    #[test]
    fn test_default_geolocation_options() {
        let options = GeolocationOptions::default();
        assert!(options.high_accuracy);
        assert_eq!(options.timeout_millis(), 30_000);
        assert_eq!(options.maximum_age_millis(), 0);
    }

    #[test]
    fn test_fix_validity() {
        assert!(TEST_FIX.is_valid());
        assert!(!GeoFix::new(f64::NAN, 0.0, 1.0).is_valid());
        assert!(!GeoFix::new(91.0, 0.0, 1.0).is_valid());
        assert!(!GeoFix::new(0.0, -181.0, 1.0).is_valid());
    }

    #[test]
    fn test_dispatch_routes_events() {
        let mut recorder = Recorder::default();
        SensorEvent::Fix(TEST_FIX).dispatch(&mut recorder);
        SensorEvent::Error(SensorError::Timeout).dispatch(&mut recorder);
        SensorEvent::Orientation(OrientationSample::default()).dispatch(&mut recorder);
        // Permission changes default to a no-op.
        SensorEvent::OrientationPermission(OrientationPermission::Granted).dispatch(&mut recorder);
        SensorEvent::OrientationFailed("NotAllowedError".to_owned()).dispatch(&mut recorder);
        assert_eq!(recorder.calls, ["fix", "error", "orientation"]);
    }
}
