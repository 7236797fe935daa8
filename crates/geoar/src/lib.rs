//! Session logic for anchoring a 3D Tiles tileset to a GPS fix in an AR view.
//!
//! Everything in this crate is headless: platform sensors, the renderer and
//! the tile engine are reached through small traits so the glue between them
//! can be exercised without a browser or GPU.
//!
//! The pieces, leaf-first:
//!
//! - [`sensor`]: fixes, errors and orientation samples, plus the
//!   [`SensorListener`] interface events are dispatched through
//! - [`watchdog`]: declares the GPS stalled after ten silent seconds
//! - [`anchor`] and [`controller`]: the first-fix latch and the tileset
//!   lifecycle it drives
//! - [`readout`], [`log`], [`controls`]: what the panels show and edit
//! - [`projection`] and [`orientation`]: where the camera is and where it looks
//! - [`session`]: the context object tying the above together

pub mod anchor;
pub mod controller;
pub mod controls;
pub mod log;
pub mod orientation;
pub mod projection;
pub mod readout;
pub mod sensor;
pub mod session;
pub mod watchdog;

pub use anchor::{AnchorPolicy, AnchorState, GeoAnchor};
pub use controller::{
    ContainerPlacement, FixOutcome, TilesetController, TilesetLaunch, TilesetLauncher,
};
pub use controls::{Axis, ContainerControls};
pub use log::{DebugLog, LogEntry};
pub use orientation::OrientationState;
pub use projection::{ElevationMode, LocalProjection};
pub use readout::CoordinateReadout;
pub use sensor::{
    GeoFix, GeolocationOptions, OrientationPermission, OrientationSample, SensorError,
    SensorEvent, SensorListener, TEST_FIX,
};
pub use session::{Session, SessionConfig, SessionDispatch};
pub use watchdog::{GpsWatchdog, WatchdogVerdict};
