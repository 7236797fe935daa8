//! The session context: everything the panels and camera read, updated from
//! sensor events.

use glam::DVec3;

use geotiles::BoundingSphere;

use crate::controller::{ContainerPlacement, FixOutcome, TilesetController, TilesetLauncher};
use crate::log::{DEFAULT_CAPACITY, DebugLog};
use crate::orientation::OrientationState;
use crate::projection::{ElevationMode, LocalProjection};
use crate::readout::CoordinateReadout;
use crate::sensor::{
    GeoFix, OrientationPermission, OrientationSample, SensorError, SensorListener, TEST_FIX,
};
use crate::watchdog::{GpsWatchdog, WatchdogVerdict};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub elevation: ElevationMode,
    /// Orientation permission state at startup.
    pub orientation_permission: OrientationPermission,
    pub log_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            elevation: ElevationMode::default(),
            orientation_permission: OrientationPermission::default(),
            log_capacity: DEFAULT_CAPACITY,
        }
    }
}

/// State derived from the sensor stream.
#[derive(Debug, Clone)]
pub struct Session {
    readout: CoordinateReadout,
    log: DebugLog,
    watchdog: GpsWatchdog,
    orientation: OrientationState,
    projection: LocalProjection,
    last_fix: Option<GeoFix>,
    camera_position: Option<DVec3>,
    banner: Option<&'static str>,
    last_error: Option<SensorError>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let mut log = DebugLog::with_capacity(config.log_capacity);
        log.push("应用启动...");
        Self {
            readout: CoordinateReadout::new(),
            log,
            watchdog: GpsWatchdog::new(),
            orientation: OrientationState::new(config.orientation_permission),
            projection: LocalProjection::new(config.elevation),
            last_fix: None,
            camera_position: None,
            banner: None,
            last_error: None,
        }
    }

    /// Note that the location subscription is starting.
    pub fn gps_starting(&mut self) {
        self.log.push("正在启动GPS...");
    }

    /// Advance the watchdog by one second.
    pub fn tick_watchdog(&mut self) -> WatchdogVerdict {
        let verdict = self.watchdog.tick();
        if verdict == WatchdogVerdict::Stalled {
            let error = SensorError::NoFixWithinWindow;
            tracing::warn!(%error, "no fix received");
            self.log.push(error.user_message());
            self.readout.mark_no_signal();
            self.last_error = Some(error);
        }
        verdict
    }

    /// The "test location" button was pressed. Returns the fix to inject.
    pub fn test_fix_requested(&mut self) -> GeoFix {
        self.log.push("手动测试位置更新...");
        self.log.push(format!(
            "测试位置: {:.6}, {:.6}",
            TEST_FIX.latitude, TEST_FIX.longitude
        ));
        TEST_FIX
    }

    /// Hand a loaded tileset's bounds to the controller. On the first call
    /// returns the container placement and the container's scene position.
    pub fn place_tileset<H>(
        &mut self,
        controller: &mut TilesetController<H>,
        sphere: &BoundingSphere,
    ) -> Option<(ContainerPlacement, DVec3)> {
        let placement = controller.on_tileset_loaded(sphere)?;
        let position = self
            .projection
            .anchor_position(&placement.anchor)
            .unwrap_or(DVec3::ZERO);
        self.log.push("3D Tiles加载完成并添加到GPS位置");
        Some((placement, position))
    }

    /// Scene position of the container for the controller's current placement.
    pub fn container_position<H>(&self, controller: &TilesetController<H>) -> Option<DVec3> {
        controller
            .placement()
            .and_then(|placement| self.projection.anchor_position(&placement.anchor))
    }

    /// Record a failure from the tile engine.
    pub fn tileset_failed(&mut self, error: &dyn std::error::Error) {
        tracing::error!(%error, "tileset failed to load");
        self.log.push(format!("3D Tiles加载失败: {error}"));
    }

    /// Append a free-form line to the debug log.
    pub fn log_message(&mut self, message: impl Into<String>) {
        self.log.push(message);
    }

    pub fn readout(&self) -> &CoordinateReadout {
        &self.readout
    }

    pub fn log(&self) -> &DebugLog {
        &self.log
    }

    pub fn watchdog(&self) -> &GpsWatchdog {
        &self.watchdog
    }

    pub fn orientation(&self) -> &OrientationState {
        &self.orientation
    }

    pub fn projection(&self) -> &LocalProjection {
        &self.projection
    }

    pub fn last_fix(&self) -> Option<&GeoFix> {
        self.last_fix.as_ref()
    }

    /// Camera position in the scene for the latest fix.
    pub fn camera_position(&self) -> Option<DVec3> {
        self.camera_position
    }

    /// Text of the red error banner, if raised.
    pub fn banner(&self) -> Option<&'static str> {
        self.banner
    }

    pub fn last_error(&self) -> Option<SensorError> {
        self.last_error
    }
}

impl SensorListener for Session {
    fn on_fix(&mut self, fix: GeoFix) {
        if !fix.is_valid() {
            tracing::warn!(?fix, "dropping invalid fix");
            return;
        }
        self.watchdog.on_fix();

        let position = self.projection.camera_position(&fix);
        let moved = self.camera_position.map_or(0.0, |previous| {
            (position - previous).with_y(0.0).length()
        });
        self.camera_position = Some(position);
        self.last_fix = Some(fix);

        self.log.push(format!(
            "GPS位置更新: {:.6}, {:.6}, {moved:.2}",
            fix.latitude, fix.longitude
        ));
        self.readout.show(fix);
    }

    fn on_error(&mut self, error: SensorError) {
        tracing::error!(%error, "sensor error");
        self.log.push(format!("GPS错误: {}", error.user_message()));
        if error.shows_banner() {
            self.banner = Some(SensorError::PermissionDenied.user_message());
        }
        self.last_error = Some(error);
    }

    fn on_orientation(&mut self, sample: OrientationSample) {
        self.orientation.record(sample);
    }

    fn on_orientation_permission(&mut self, permission: OrientationPermission) {
        match permission {
            OrientationPermission::Granted => self.log.push("设备方向权限已获取"),
            OrientationPermission::Denied => self.log.push("设备方向权限被拒绝"),
            OrientationPermission::NotRequired | OrientationPermission::Prompt => {}
        }
        self.orientation.set_permission(permission);
    }

    fn on_orientation_failed(&mut self, detail: &str) {
        tracing::warn!(detail, "orientation permission request failed");
        self.log.push(format!("设备方向错误: {detail}"));
        self.orientation.set_permission(OrientationPermission::Denied);
    }
}

/// Routes sensor events to the session and the tileset controller together.
pub struct SessionDispatch<'a, L: TilesetLauncher + ?Sized> {
    pub session: &'a mut Session,
    pub controller: &'a mut TilesetController<L::Handle>,
    pub launcher: &'a mut L,
}

impl<L: TilesetLauncher + ?Sized> SensorListener for SessionDispatch<'_, L> {
    fn on_fix(&mut self, fix: GeoFix) {
        self.session.on_fix(fix);
        match self.controller.on_fix(&fix, &mut *self.launcher) {
            FixOutcome::Anchored(_) => {
                self.session.log_message("开始加载3D Tiles...");
                self.session.log_message("标记物体添加完成");
            }
            FixOutcome::Reanchored(anchor) => {
                tracing::debug!(lat = anchor.latitude, lon = anchor.longitude, "anchor moved");
            }
            FixOutcome::Ignored => {}
        }
    }

    fn on_error(&mut self, error: SensorError) {
        self.session.on_error(error);
    }

    fn on_orientation(&mut self, sample: OrientationSample) {
        self.session.on_orientation(sample);
    }

    fn on_orientation_permission(&mut self, permission: OrientationPermission) {
        self.session.on_orientation_permission(permission);
    }

    fn on_orientation_failed(&mut self, detail: &str) {
        self.session.on_orientation_failed(detail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::{AnchorPolicy, GeoAnchor};
    use crate::controller::TilesetLaunch;
    use crate::readout::NO_SIGNAL;
    use crate::sensor::SensorEvent;

    #[derive(Default)]
    struct Launcher {
        count: u32,
    }

    impl TilesetLauncher for Launcher {
        type Handle = u32;

        fn launch(&mut self, _request: &TilesetLaunch) -> u32 {
            self.count += 1;
            self.count
        }
    }

    fn messages(session: &Session) -> Vec<String> {
        session.log().entries().map(|e| e.message.clone()).collect()
    }

    #[test]
    fn test_startup_log() {
        let mut session = Session::default();
        session.gps_starting();
        assert_eq!(messages(&session), ["应用启动...", "正在启动GPS..."]);
    }

    #[test]
    fn test_fix_updates_readout_and_log() {
        let mut session = Session::default();
        session.on_fix(TEST_FIX);
        assert_eq!(session.readout().lines()[0], "纬度: 51.050100°");
        assert_eq!(
            session.log().latest().map(|e| e.message.as_str()),
            Some("GPS位置更新: 51.050100, -0.720000, 0.00")
        );
        assert_eq!(session.camera_position(), Some(DVec3::ZERO));
        assert!(!session.watchdog().is_running());
    }

    #[test]
    fn test_watchdog_marks_no_signal_once() {
        let mut session = Session::default();
        let stalls = (0..30)
            .filter(|_| session.tick_watchdog() == WatchdogVerdict::Stalled)
            .count();
        assert_eq!(stalls, 1);
        assert_eq!(session.readout().lines(), [NO_SIGNAL]);
        assert_eq!(session.last_error(), Some(SensorError::NoFixWithinWindow));
        let stall_lines = messages(&session)
            .iter()
            .filter(|m| m.as_str() == SensorError::NoFixWithinWindow.user_message())
            .count();
        assert_eq!(stall_lines, 1);
    }

    #[test]
    fn test_fix_before_window_prevents_no_signal() {
        let mut session = Session::default();
        for _ in 0..5 {
            session.tick_watchdog();
        }
        session.on_fix(TEST_FIX);
        for _ in 0..20 {
            assert_eq!(session.tick_watchdog(), WatchdogVerdict::Idle);
        }
        assert!(!session.readout().is_no_signal());
    }

    #[test]
    fn test_permission_error_raises_banner() {
        let mut session = Session::default();
        session.on_error(SensorError::Timeout);
        assert_eq!(session.banner(), None);
        session.on_error(SensorError::PermissionDenied);
        assert_eq!(session.banner(), Some("无法获取位置信息，请确保已授予位置权限。"));
    }

    #[test]
    fn test_dispatch_anchors_once() {
        let mut session = Session::default();
        let mut controller = TilesetController::new("https://example.com/t.json", AnchorPolicy::FirstFix);
        let mut launcher = Launcher::default();

        let fix = session.test_fix_requested();
        {
            let mut dispatch = SessionDispatch {
                session: &mut session,
                controller: &mut controller,
                launcher: &mut launcher,
            };
            SensorEvent::Fix(fix).dispatch(&mut dispatch);
            SensorEvent::Fix(GeoFix::new(51.06, -0.71, 4.0)).dispatch(&mut dispatch);
        }

        let (placement, position) = session
            .place_tileset(
                &mut controller,
                &BoundingSphere::new(DVec3::new(1.0, 2.0, 3.0), 10.0),
            )
            .unwrap();
        assert_eq!(placement.anchor, GeoAnchor::new(51.0501, -0.72));
        assert!(position.length() < 1e-6);
        assert_eq!(session.container_position(&controller), Some(position));
        assert!(
            session
                .place_tileset(&mut controller, &BoundingSphere::new(DVec3::ZERO, 1.0))
                .is_none()
        );

        assert_eq!(launcher.count, 1);
        let log = messages(&session);
        assert_eq!(log.iter().filter(|m| *m == "开始加载3D Tiles...").count(), 1);
        assert!(log.contains(&"3D Tiles加载完成并添加到GPS位置".to_owned()));
        assert!(log.contains(&"测试位置: 51.050100, -0.720000".to_owned()));
    }

    #[test]
    fn test_orientation_permission_logged() {
        let mut session = Session::new(SessionConfig {
            orientation_permission: OrientationPermission::Prompt,
            ..SessionConfig::default()
        });
        session.on_orientation_permission(OrientationPermission::Granted);
        assert_eq!(
            session.log().latest().map(|e| e.message.as_str()),
            Some("设备方向权限已获取")
        );
        assert!(session.orientation().permission().allows_samples());
    }

    #[test]
    fn test_orientation_failure_logs_error_text() {
        let mut session = Session::new(SessionConfig {
            orientation_permission: OrientationPermission::Prompt,
            ..SessionConfig::default()
        });
        SensorEvent::OrientationFailed("NotAllowedError: denied".to_owned()).dispatch(&mut session);

        let log = messages(&session);
        assert_eq!(
            log.last().map(String::as_str),
            Some("设备方向错误: NotAllowedError: denied")
        );
        assert!(!log.contains(&"设备方向权限被拒绝".to_owned()));
        assert_eq!(session.orientation().permission(), OrientationPermission::Denied);
    }
}
