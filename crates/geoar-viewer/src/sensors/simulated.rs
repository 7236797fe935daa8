//! Simulated sensors for desktop runs.
//!
//! Desktops have no GPS or gyroscope. When `--sim-lat`/`--sim-lon` are given
//! the configured fix is reported once a second, as a browser's
//! `watchPosition` would; otherwise nothing is reported and the watchdog
//! fires as it would on a phone without a signal. The arrow keys turn the
//! simulated device: left/right change the compass heading (alpha),
//! up/down tilt it (beta).

use bevy::prelude::*;
use geoar::{OrientationSample, SensorEvent};

use super::SensorChannel;
use crate::launch_params::LaunchParams;

/// Seconds between simulated fixes.
const FIX_PERIOD_SECS: f32 = 1.0;
/// Degrees per second the arrow keys turn the device.
const TURN_RATE: f64 = 45.0;

pub struct SimulatedSensorPlugin;

impl Plugin for SimulatedSensorPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(FixTimer(Timer::from_seconds(
            FIX_PERIOD_SECS,
            TimerMode::Repeating,
        )))
        .init_resource::<SimulatedOrientation>()
        .add_systems(Update, (report_simulated_fix, steer_simulated_orientation));
    }
}

#[derive(Resource, Deref, DerefMut)]
struct FixTimer(Timer);

/// The simulated device starts upright, facing north.
#[derive(Resource)]
struct SimulatedOrientation(OrientationSample);

impl Default for SimulatedOrientation {
    fn default() -> Self {
        Self(OrientationSample {
            beta: 90.0,
            ..OrientationSample::default()
        })
    }
}

fn report_simulated_fix(
    time: Res<Time>,
    mut timer: ResMut<FixTimer>,
    params: Res<LaunchParams>,
    channel: Res<SensorChannel>,
) {
    let Some(fix) = params.simulated_fix else {
        return;
    };
    timer.tick(time.delta());
    if timer.just_finished() {
        channel.send(SensorEvent::Fix(fix));
    }
}

fn steer_simulated_orientation(
    time: Res<Time>,
    keys: Option<Res<ButtonInput<KeyCode>>>,
    mut orientation: ResMut<SimulatedOrientation>,
    channel: Res<SensorChannel>,
) {
    let Some(keys) = keys else {
        return;
    };

    let axis = |negative: KeyCode, positive: KeyCode| {
        f64::from(i8::from(keys.pressed(positive)) - i8::from(keys.pressed(negative)))
    };
    let turn = axis(KeyCode::ArrowRight, KeyCode::ArrowLeft);
    let tilt = axis(KeyCode::ArrowDown, KeyCode::ArrowUp);
    if turn == 0.0 && tilt == 0.0 {
        return;
    }

    let step = TURN_RATE * time.delta_secs_f64();
    let sample = &mut orientation.0;
    sample.alpha = (sample.alpha + turn * step).rem_euclid(360.0);
    sample.beta = (sample.beta + tilt * step).clamp(-180.0, 180.0);
    channel.send(SensorEvent::Orientation(*sample));
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use geoar::GeoFix;

    #[test]
    fn test_fix_reported_each_second() {
        let fix = GeoFix::new(51.0, -0.7, 5.0);
        let mut app = App::new();
        app.insert_resource(LaunchParams {
            simulated_fix: Some(fix),
            ..LaunchParams::default()
        })
        .init_resource::<SensorChannel>()
        .init_resource::<Time>()
        .insert_resource(FixTimer(Timer::from_seconds(
            FIX_PERIOD_SECS,
            TimerMode::Repeating,
        )))
        .add_systems(Update, report_simulated_fix);

        for _ in 0..3 {
            app.world_mut()
                .resource_mut::<Time>()
                .advance_by(Duration::from_secs(1));
            app.update();
        }

        let channel = app.world().resource::<SensorChannel>();
        let mut fixes = 0;
        while let Ok(event) = channel.rx.try_recv() {
            assert!(matches!(event, SensorEvent::Fix(f) if f == fix));
            fixes += 1;
        }
        assert_eq!(fixes, 3);
    }

    #[test]
    fn test_left_arrow_turns_heading() {
        let mut app = App::new();
        app.init_resource::<SensorChannel>()
            .init_resource::<Time>()
            .init_resource::<ButtonInput<KeyCode>>()
            .init_resource::<SimulatedOrientation>()
            .add_systems(Update, steer_simulated_orientation);

        app.world_mut()
            .resource_mut::<ButtonInput<KeyCode>>()
            .press(KeyCode::ArrowLeft);
        app.world_mut()
            .resource_mut::<Time>()
            .advance_by(Duration::from_secs(1));
        app.update();

        let channel = app.world().resource::<SensorChannel>();
        let Ok(SensorEvent::Orientation(sample)) = channel.rx.try_recv() else {
            panic!("expected an orientation event");
        };
        assert!((sample.alpha - TURN_RATE).abs() < 1e-9);
        assert!((sample.beta - 90.0).abs() < 1e-9);
    }
}
