//! Launch parameters for the viewer.
//!
//! On native, parameters are parsed from command-line arguments using clap.
//! On WASM, defaults are used.

use bevy::prelude::*;
use geoar::{AnchorPolicy, ElevationMode, GeoFix};
use geotiles::DEFAULT_ERROR_TARGET;

/// Tileset streamed when no URL is given.
pub const DEFAULT_TILESET_URL: &str =
    "https://kc3.kcgis.cn:30011/3dtiled/e/2024/yz/DK1_z/tileset.json";
/// Camera near plane in meters.
pub const DEFAULT_NEAR: f32 = 0.0001;
/// Font fetched on WASM, relative to the page.
#[cfg(target_family = "wasm")]
const DEFAULT_WEB_FONT: &str = "assets/fonts/NotoSansSC-Regular.otf";

/// Launch parameters for the viewer.
#[derive(Resource, Debug, Clone)]
pub struct LaunchParams {
    pub tileset_url: String,
    pub anchor_policy: AnchorPolicy,
    pub elevation: ElevationMode,
    pub near: f32,
    /// Maximum screen-space error in pixels before a tile is refined.
    pub error_target: f64,
    /// Fix reported every second by the simulated GPS (native only).
    pub simulated_fix: Option<GeoFix>,
    /// Path or URL of a font with CJK coverage.
    pub font: Option<String>,
}

impl Default for LaunchParams {
    fn default() -> Self {
        Self {
            tileset_url: DEFAULT_TILESET_URL.to_owned(),
            anchor_policy: AnchorPolicy::FirstFix,
            elevation: ElevationMode::default(),
            near: DEFAULT_NEAR,
            error_target: DEFAULT_ERROR_TARGET,
            simulated_fix: None,
            #[cfg(target_family = "wasm")]
            font: Some(DEFAULT_WEB_FONT.to_owned()),
            #[cfg(not(target_family = "wasm"))]
            font: None,
        }
    }
}

#[cfg(not(target_family = "wasm"))]
mod native {
    use clap::{Parser, ValueEnum};

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
    enum PolicyArg {
        /// Anchor at the first fix and stay there.
        #[default]
        FirstFix,
        /// Move the anchor with every fix.
        Follow,
        /// Anchor at --anchor-lat/--anchor-lon.
        Fixed,
    }

    #[derive(Parser, Debug)]
    #[command(about = "AR viewer anchoring a 3D Tiles tileset to a GPS position")]
    struct CliArgs {
        /// URL of the tileset manifest.
        #[arg(long, default_value = DEFAULT_TILESET_URL)]
        tileset_url: String,

        /// How the tileset anchor follows GPS fixes.
        #[arg(long, value_enum, default_value_t = PolicyArg::default())]
        anchor_policy: PolicyArg,

        /// Anchor latitude in degrees, for --anchor-policy fixed.
        #[arg(long, required_if_eq("anchor_policy", "fixed"))]
        anchor_lat: Option<f64>,

        /// Anchor longitude in degrees, for --anchor-policy fixed.
        #[arg(long, required_if_eq("anchor_policy", "fixed"))]
        anchor_lon: Option<f64>,

        /// Camera height above the local origin in meters.
        #[arg(long, default_value_t = 0.0)]
        elevation: f64,

        /// Use the altitude reported by the GPS instead of --elevation.
        #[arg(long)]
        use_reported_altitude: bool,

        /// Camera near plane in meters.
        #[arg(long, default_value_t = DEFAULT_NEAR)]
        near: f32,

        /// Maximum screen-space error in pixels.
        #[arg(long, default_value_t = DEFAULT_ERROR_TARGET)]
        error_target: f64,

        /// Simulated GPS latitude in degrees.
        #[arg(long, requires = "sim_lon")]
        sim_lat: Option<f64>,

        /// Simulated GPS longitude in degrees.
        #[arg(long, requires = "sim_lat")]
        sim_lon: Option<f64>,

        /// Simulated GPS accuracy in meters.
        #[arg(long, default_value_t = 5.0)]
        sim_accuracy: f64,

        /// Font file (or URL) covering CJK characters.
        #[arg(long)]
        font: Option<String>,
    }

    pub fn parse() -> LaunchParams {
        let args = CliArgs::parse();

        let anchor_policy = match (args.anchor_policy, args.anchor_lat, args.anchor_lon) {
            (PolicyArg::FirstFix, ..) => AnchorPolicy::FirstFix,
            (PolicyArg::Follow, ..) => AnchorPolicy::Follow,
            (PolicyArg::Fixed, Some(latitude), Some(longitude)) => AnchorPolicy::Fixed {
                latitude,
                longitude,
            },
            // clap enforces both coordinates for the fixed policy.
            (PolicyArg::Fixed, ..) => AnchorPolicy::FirstFix,
        };

        let elevation = if args.use_reported_altitude {
            ElevationMode::Reported
        } else {
            ElevationMode::Fixed(args.elevation)
        };

        let simulated_fix = args
            .sim_lat
            .zip(args.sim_lon)
            .map(|(lat, lon)| GeoFix::new(lat, lon, args.sim_accuracy));

        LaunchParams {
            tileset_url: args.tileset_url,
            anchor_policy,
            elevation,
            near: args.near,
            error_target: args.error_target,
            simulated_fix,
            font: args.font,
        }
    }
}

/// Parse launch parameters from CLI args (native) or use defaults (WASM).
pub fn parse() -> LaunchParams {
    #[cfg(not(target_family = "wasm"))]
    {
        native::parse()
    }
    #[cfg(target_family = "wasm")]
    {
        LaunchParams::default()
    }
}
