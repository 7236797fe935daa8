//! CJK font loading.
//!
//! egui's built-in fonts have no Chinese glyphs, so the font named by the
//! launch parameters is fetched in the background and appended as a fallback
//! to both families once it arrives. Without one the labels still work but
//! Chinese text renders as boxes.

use std::sync::Arc;

use bevy::prelude::*;
use bevy_egui::{EguiContexts, EguiPrimaryContextPass, egui};

use crate::async_runtime::TaskSpawner;
use crate::launch_params::LaunchParams;

/// Name the loaded font is registered under.
const FONT_NAME: &str = "cjk";

pub(super) struct FontPlugin;

impl Plugin for FontPlugin {
    fn build(&self, app: &mut App) {
        let (tx, rx) = async_channel::bounded(1);
        app.insert_resource(FontChannel { tx, rx })
            .add_systems(Startup, load_font)
            .add_systems(
                EguiPrimaryContextPass,
                install_font.run_if(not(resource_exists::<HasInitialisedFonts>)),
            );
    }
}

/// Inserted once the font has been handed to egui (or failed to load).
#[derive(Resource)]
struct HasInitialisedFonts;

#[derive(Resource)]
struct FontChannel {
    tx: async_channel::Sender<Result<Vec<u8>, String>>,
    rx: async_channel::Receiver<Result<Vec<u8>, String>>,
}

fn load_font(
    mut commands: Commands,
    params: Res<LaunchParams>,
    channel: Res<FontChannel>,
    spawner: TaskSpawner,
) {
    let Some(source) = params.font.clone() else {
        tracing::warn!("no CJK font configured; Chinese labels will not render");
        commands.insert_resource(HasInitialisedFonts);
        return;
    };
    tracing::info!(%source, "loading font");
    spawner.spawn_reply(fetch_font(source), channel.tx.clone());
}

fn install_font(
    mut contexts: EguiContexts,
    mut commands: Commands,
    channel: Res<FontChannel>,
) -> Result {
    let ctx = contexts.ctx_mut()?;
    let Ok(result) = channel.rx.try_recv() else {
        return Ok(());
    };
    commands.insert_resource(HasInitialisedFonts);

    match result {
        Ok(bytes) => {
            tracing::info!(bytes = bytes.len(), "font loaded");
            ctx.set_fonts(font_definitions(bytes));
        }
        Err(e) => tracing::warn!("failed to load font: {e}"),
    }
    Ok(())
}

/// Default fonts with `bytes` appended as a fallback to every family.
fn font_definitions(bytes: Vec<u8>) -> egui::FontDefinitions {
    let mut fonts = egui::FontDefinitions::default();
    fonts.font_data.insert(
        FONT_NAME.into(),
        Arc::new(egui::FontData::from_owned(bytes)),
    );
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        fonts
            .families
            .entry(family)
            .or_default()
            .push(FONT_NAME.into());
    }
    fonts
}

async fn fetch_url(url: &str) -> Result<Vec<u8>, String> {
    let response = reqwest::get(url).await.map_err(|e| format!("{url}: {e}"))?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("{url}: HTTP {status}"));
    }
    let bytes = response.bytes().await.map_err(|e| format!("{url}: {e}"))?;
    Ok(bytes.to_vec())
}

/// Read a font from a local path or an HTTP(S) URL.
#[cfg(not(target_family = "wasm"))]
async fn fetch_font(source: String) -> Result<Vec<u8>, String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        fetch_url(&source).await
    } else {
        tokio::fs::read(&source)
            .await
            .map_err(|e| format!("{source}: {e}"))
    }
}

/// Fetch a font, resolving relative paths against the page URL.
#[cfg(target_family = "wasm")]
async fn fetch_font(source: String) -> Result<Vec<u8>, String> {
    let url = web_sys::window()
        .and_then(|window| window.location().href().ok())
        .and_then(|page| geotiles::Url::parse(&page).ok())
        .and_then(|page| page.join(&source).ok())
        .map_or(source, |url| url.to_string());
    fetch_url(&url).await
}
