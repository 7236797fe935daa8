//! The individual overlay panels.

use bevy::{ecs::system::SystemParam, prelude::*};
use bevy_egui::egui;
use geoar::controls::{ROTATION_RANGE, SCALE_RANGE, SCALE_STEP};
use geoar::{Axis, SensorEvent};

use crate::sensors::SensorChannel;
use crate::state::{ArSession, ContainerSliders, TilesetLifecycle};
use crate::tiles::TileEngine;

/// Readout background while showing coordinates or waiting.
const READOUT_FILL: egui::Color32 = egui::Color32::from_rgba_premultiplied(0, 40, 120, 200);
/// Readout background once the GPS is declared silent.
const NO_SIGNAL_FILL: egui::Color32 = egui::Color32::from_rgba_premultiplied(140, 0, 0, 200);
const BANNER_FILL: egui::Color32 = egui::Color32::from_rgb(200, 30, 30);
const LOG_FILL: egui::Color32 = egui::Color32::from_rgba_premultiplied(0, 0, 0, 160);
const MARGIN: f32 = 10.0;
const LOG_MAX_HEIGHT: f32 = 150.0;

/// Resources the panels read and edit.
#[derive(SystemParam)]
pub(super) struct PanelParams<'w> {
    session: ResMut<'w, ArSession>,
    lifecycle: Res<'w, TilesetLifecycle>,
    sliders: ResMut<'w, ContainerSliders>,
    channel: Res<'w, SensorChannel>,
    engine: Res<'w, TileEngine>,
}

fn boxed(fill: egui::Color32) -> egui::Frame {
    egui::Frame::NONE
        .fill(fill)
        .inner_margin(8.0)
        .corner_radius(5.0)
}

/// Latitude, longitude and accuracy, top left.
pub(super) fn coordinate_panel(ctx: &egui::Context, params: &PanelParams) {
    let readout = params.session.readout();
    let fill = if readout.is_no_signal() {
        NO_SIGNAL_FILL
    } else {
        READOUT_FILL
    };

    egui::Area::new(egui::Id::new("coordinates"))
        .anchor(egui::Align2::LEFT_TOP, [MARGIN, MARGIN])
        .show(ctx, |ui| {
            boxed(fill).show(ui, |ui| {
                for line in readout.lines() {
                    ui.colored_label(egui::Color32::WHITE, line);
                }
            });
        });
}

/// Red banner for errors the user has to act on.
pub(super) fn error_banner(ctx: &egui::Context, params: &PanelParams) {
    let Some(message) = params.session.banner() else {
        return;
    };

    egui::Area::new(egui::Id::new("error_banner"))
        .anchor(egui::Align2::CENTER_TOP, [0.0, MARGIN])
        .show(ctx, |ui| {
            boxed(BANNER_FILL).show(ui, |ui| {
                ui.colored_label(egui::Color32::WHITE, message);
            });
        });
}

/// Timestamped debug log, newest at the bottom.
pub(super) fn debug_log_panel(ctx: &egui::Context, params: &PanelParams) {
    egui::TopBottomPanel::bottom("debug_log")
        .frame(boxed(LOG_FILL))
        .max_height(LOG_MAX_HEIGHT)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .stick_to_bottom(true)
                .auto_shrink([false, true])
                .show(ui, |ui| {
                    for entry in params.session.log().entries() {
                        ui.colored_label(egui::Color32::LIGHT_GRAY, entry.line());
                    }
                });
        });
}

/// Injects the fixed test fix, top right.
pub(super) fn test_location_button(ctx: &egui::Context, params: &mut PanelParams) {
    egui::Area::new(egui::Id::new("test_location"))
        .anchor(egui::Align2::RIGHT_TOP, [-MARGIN, MARGIN])
        .show(ctx, |ui| {
            if ui.button("测试位置更新").clicked() {
                let fix = params.session.test_fix_requested();
                params.channel.send(SensorEvent::Fix(fix));
            }
        });
}

/// Scale and rotation sliders, shown once the tileset is placed.
pub(super) fn adjustment_panel(ctx: &egui::Context, params: &mut PanelParams) {
    if !params.lifecycle.is_ready() {
        return;
    }

    egui::Window::new("模型大小调整")
        .anchor(egui::Align2::RIGHT_TOP, [-MARGIN, 50.0])
        .resizable(false)
        .collapsible(true)
        .show(ctx, |ui| {
            let sliders = &mut **params.sliders;

            let mut scale = sliders.scale();
            ui.horizontal(|ui| {
                ui.label("大小:");
                if ui
                    .add(
                        egui::Slider::new(&mut scale, SCALE_RANGE)
                            .step_by(f64::from(SCALE_STEP))
                            .show_value(false),
                    )
                    .changed()
                {
                    sliders.set_scale(scale);
                }
                ui.label(sliders.scale_label());
            });

            for axis in Axis::ALL {
                let mut degrees = sliders.rotation_degrees(axis);
                ui.horizontal(|ui| {
                    ui.label(format!("{}轴旋转:", axis.name()));
                    if ui
                        .add(
                            egui::Slider::new(&mut degrees, ROTATION_RANGE)
                                .step_by(1.0)
                                .show_value(false),
                        )
                        .changed()
                    {
                        sliders.set_rotation(axis, degrees);
                    }
                    ui.label(sliders.rotation_label(axis));
                });
            }

            if ui.button("重置旋转").clicked() {
                sliders.reset_rotation();
            }

            ui.separator();
            ui.label(format!(
                "瓦片: {} / {}",
                params.engine.scene_count(),
                params.engine.tile_count()
            ));
        });
}
