//! Overlay UI: coordinate readout, error banner, debug log, test button and
//! the model adjustment panel.

mod fonts;
mod panels;

use bevy::prelude::*;
use bevy_egui::{EguiContexts, EguiPlugin, EguiPrimaryContextPass};

/// Plugin for the egui overlay.
pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(EguiPlugin::default())
            .add_plugins(fonts::FontPlugin)
            .add_systems(EguiPrimaryContextPass, overlay_ui_system);
    }
}

/// Render every panel.
fn overlay_ui_system(mut contexts: EguiContexts, mut params: panels::PanelParams) -> Result {
    let ctx = contexts.ctx_mut()?;

    // Bottom panel first so the areas are laid out above it.
    panels::debug_log_panel(ctx, &params);
    panels::coordinate_panel(ctx, &params);
    panels::error_banner(ctx, &params);
    panels::test_location_button(ctx, &mut params);
    panels::adjustment_panel(ctx, &mut params);

    Ok(())
}
