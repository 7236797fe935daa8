//! Sensor plumbing.
//!
//! Platform sources (browser geolocation and device orientation on the web,
//! a simulated GPS on native) push [`SensorEvent`]s into an unbounded
//! channel. Once per frame the events are drained and dispatched to the
//! session and tileset controller, in arrival order.

#[cfg(not(target_family = "wasm"))]
mod simulated;
#[cfg(target_family = "wasm")]
pub mod web;

use bevy::prelude::*;
use geoar::{SensorEvent, SessionDispatch, WatchdogVerdict};

use crate::frame::FrameStage;
use crate::state::{ArSession, TilesetLifecycle};
use crate::tiles::TilesetLaunchContext;

/// Watchdog tick period in seconds.
const WATCHDOG_PERIOD_SECS: f32 = 1.0;

pub struct SensorPlugin;

impl Plugin for SensorPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SensorChannel>()
            .insert_resource(WatchdogTimer(Timer::from_seconds(
                WATCHDOG_PERIOD_SECS,
                TimerMode::Repeating,
            )))
            .add_systems(Startup, start_sensors)
            .add_systems(
                Update,
                (dispatch_sensor_events, tick_watchdog)
                    .chain()
                    .in_set(FrameStage::Sensors),
            );

        #[cfg(not(target_family = "wasm"))]
        app.add_plugins(simulated::SimulatedSensorPlugin);
    }
}

/// Channel carrying sensor events from callbacks and tasks into the schedule.
#[derive(Resource)]
pub struct SensorChannel {
    tx: async_channel::Sender<SensorEvent>,
    rx: async_channel::Receiver<SensorEvent>,
}

impl Default for SensorChannel {
    fn default() -> Self {
        let (tx, rx) = async_channel::unbounded();
        Self { tx, rx }
    }
}

impl SensorChannel {
    /// A sender for platform callbacks to hold on to.
    pub fn sender(&self) -> async_channel::Sender<SensorEvent> {
        self.tx.clone()
    }

    /// Queue an event from inside the schedule.
    pub fn send(&self, event: SensorEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::warn!("dropping sensor event: {e}");
        }
    }
}

/// Drives the GPS watchdog once per second.
#[derive(Resource, Deref, DerefMut)]
struct WatchdogTimer(Timer);

#[cfg_attr(not(target_family = "wasm"), allow(unused_variables))]
fn start_sensors(mut session: ResMut<ArSession>, channel: Res<SensorChannel>) {
    session.gps_starting();

    #[cfg(target_family = "wasm")]
    if let Err(e) = web::start(channel.sender(), &geoar::GeolocationOptions::default()) {
        tracing::error!("failed to start browser sensors: {e}");
        session.log_message(format!("GPS错误: {e}"));
    }
}

/// Dispatch queued events to the session and controller.
fn dispatch_sensor_events(
    channel: Res<SensorChannel>,
    mut session: ResMut<ArSession>,
    mut lifecycle: ResMut<TilesetLifecycle>,
    mut launcher: TilesetLaunchContext,
) {
    let mut dispatch = SessionDispatch {
        session: &mut **session,
        controller: &mut **lifecycle,
        launcher: &mut launcher,
    };
    while let Ok(event) = channel.rx.try_recv() {
        event.dispatch(&mut dispatch);
    }
}

fn tick_watchdog(time: Res<Time>, mut timer: ResMut<WatchdogTimer>, mut session: ResMut<ArSession>) {
    timer.tick(time.delta());
    for _ in 0..timer.times_finished_this_tick() {
        match session.tick_watchdog() {
            WatchdogVerdict::Waiting => {}
            WatchdogVerdict::Stalled | WatchdogVerdict::Idle => {
                timer.pause();
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use geoar::{GeoFix, SensorError, SensorListener, readout};

    fn app() -> App {
        let mut app = App::new();
        app.init_resource::<ArSession>()
            .init_resource::<SensorChannel>()
            .insert_resource(WatchdogTimer(Timer::from_seconds(
                WATCHDOG_PERIOD_SECS,
                TimerMode::Repeating,
            )))
            .init_resource::<Time>()
            .add_systems(Update, tick_watchdog);
        app
    }

    fn advance(app: &mut App, seconds: u64) {
        for _ in 0..seconds {
            app.world_mut()
                .resource_mut::<Time>()
                .advance_by(Duration::from_secs(1));
            app.update();
        }
    }

    #[test]
    fn test_watchdog_marks_no_signal_after_ten_seconds() {
        let mut app = app();
        advance(&mut app, 9);
        assert!(app.world().resource::<ArSession>().readout().is_waiting());

        advance(&mut app, 1);
        let session = app.world().resource::<ArSession>();
        assert!(session.readout().is_no_signal());
        assert_eq!(session.last_error(), Some(SensorError::NoFixWithinWindow));
        assert_eq!(session.readout().lines(), [readout::NO_SIGNAL]);
        assert!(app.world().resource::<WatchdogTimer>().is_paused());

        // Further seconds leave the timer stopped and the state unchanged.
        advance(&mut app, 5);
        assert!(app.world().resource::<WatchdogTimer>().is_paused());
        assert!(app.world().resource::<ArSession>().readout().is_no_signal());
    }

    #[test]
    fn test_fix_before_deadline_keeps_watchdog_quiet() {
        let mut app = app();
        advance(&mut app, 5);
        app.world_mut()
            .resource_mut::<ArSession>()
            .on_fix(GeoFix::new(51.0, -0.7, 5.0));
        advance(&mut app, 20);

        let session = app.world().resource::<ArSession>();
        assert!(!session.readout().is_no_signal());
        assert_eq!(session.last_error(), None);
        assert!(app.world().resource::<WatchdogTimer>().is_paused());
    }

    #[test]
    fn test_channel_preserves_order() {
        let channel = SensorChannel::default();
        channel.send(SensorEvent::Error(SensorError::Timeout));
        channel.send(SensorEvent::Fix(GeoFix::new(1.0, 2.0, 3.0)));
        assert!(matches!(
            channel.rx.try_recv(),
            Ok(SensorEvent::Error(SensorError::Timeout))
        ));
        assert!(matches!(channel.rx.try_recv(), Ok(SensorEvent::Fix(_))));
        assert!(channel.rx.try_recv().is_err());
    }
}
