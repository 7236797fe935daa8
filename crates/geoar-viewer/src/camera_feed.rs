//! Rear camera feed behind the transparent canvas.
//!
//! On the web the back camera is opened with `getUserMedia` and played in a
//! full-screen `<video>` element inserted under the canvas. Native builds
//! have no feed; the scene renders on the clear color instead.

use bevy::prelude::*;

use crate::frame::FrameStage;
use crate::state::ArSession;

pub struct CameraFeedPlugin;

impl Plugin for CameraFeedPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CameraFeed>()
            .add_systems(Startup, start_camera_feed)
            .add_systems(Update, poll_camera_feed.in_set(FrameStage::CameraFeed));
    }
}

/// State of the camera feed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedStatus {
    /// No camera on this platform.
    #[default]
    Unavailable,
    Starting,
    Live,
    Failed(String),
}

/// The camera feed and the channel its start-up task reports on.
#[derive(Resource)]
pub struct CameraFeed {
    status: FeedStatus,
    #[cfg_attr(not(target_family = "wasm"), allow(dead_code))]
    tx: async_channel::Sender<FeedStatus>,
    rx: async_channel::Receiver<FeedStatus>,
}

impl Default for CameraFeed {
    fn default() -> Self {
        let (tx, rx) = async_channel::unbounded();
        Self {
            status: FeedStatus::Unavailable,
            tx,
            rx,
        }
    }
}

impl CameraFeed {
    pub fn status(&self) -> &FeedStatus {
        &self.status
    }
}

#[cfg(target_family = "wasm")]
fn start_camera_feed(mut feed: ResMut<CameraFeed>) {
    feed.status = FeedStatus::Starting;
    let tx = feed.tx.clone();
    wasm_bindgen_futures::spawn_local(async move {
        let status = match web::open_rear_camera().await {
            Ok(()) => FeedStatus::Live,
            Err(e) => FeedStatus::Failed(e),
        };
        let _ = tx.send(status).await;
    });
}

#[cfg(not(target_family = "wasm"))]
fn start_camera_feed(feed: Res<CameraFeed>) {
    tracing::info!(status = ?feed.status, "no camera feed on this platform");
}

/// Pick up status changes and note them in the debug log.
fn poll_camera_feed(mut feed: ResMut<CameraFeed>, mut session: ResMut<ArSession>) {
    let CameraFeed {
        status: current,
        rx,
        ..
    } = &mut *feed;
    while let Ok(status) = rx.try_recv() {
        match &status {
            FeedStatus::Live => {
                tracing::info!("camera feed live");
                session.log_message("摄像头已启动");
            }
            FeedStatus::Failed(reason) => {
                tracing::error!(%reason, "camera feed failed");
                session.log_message(format!("摄像头启动失败: {reason}"));
            }
            FeedStatus::Unavailable | FeedStatus::Starting => {}
        }
        *current = status;
    }
}

#[cfg(target_family = "wasm")]
mod web {
    use js_sys::{Object, Reflect};
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::JsFuture;

    fn describe(value: &JsValue) -> String {
        value.as_string().unwrap_or_else(|| format!("{value:?}"))
    }

    /// `{ video: { facingMode: "environment" }, audio: false }`
    fn constraints() -> Result<web_sys::MediaStreamConstraints, JsValue> {
        let video = Object::new();
        Reflect::set(&video, &"facingMode".into(), &"environment".into())?;
        let constraints = web_sys::MediaStreamConstraints::new();
        constraints.set_video(&video);
        constraints.set_audio(&JsValue::FALSE);
        Ok(constraints)
    }

    pub async fn open_rear_camera() -> Result<(), String> {
        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;
        let body = document.body().ok_or("no body")?;

        let devices = window.navigator().media_devices().map_err(|e| describe(&e))?;
        let constraints = constraints().map_err(|e| describe(&e))?;
        let promise = devices
            .get_user_media_with_constraints(&constraints)
            .map_err(|e| describe(&e))?;
        let stream = JsFuture::from(promise)
            .await
            .map_err(|e| describe(&e))?
            .dyn_into::<web_sys::MediaStream>()
            .map_err(|e| describe(&e))?;

        let video = document
            .create_element("video")
            .map_err(|e| describe(&e))?
            .dyn_into::<web_sys::HtmlVideoElement>()
            .map_err(|e| describe(&e))?;
        video.set_autoplay(true);
        video.set_muted(true);
        // iOS Safari only plays inline with this attribute.
        video
            .set_attribute("playsinline", "")
            .map_err(|e| describe(&e))?;

        let style = video.style();
        for (property, value) in [
            ("position", "fixed"),
            ("top", "0"),
            ("left", "0"),
            ("width", "100%"),
            ("height", "100%"),
            ("object-fit", "cover"),
            ("z-index", "-1"),
        ] {
            style
                .set_property(property, value)
                .map_err(|e| describe(&e))?;
        }

        video.set_src_object(Some(&stream));
        body.insert_before(&video, body.first_child().as_ref())
            .map_err(|e| describe(&e))?;

        let play = video.play().map_err(|e| describe(&e))?;
        JsFuture::from(play).await.map_err(|e| describe(&e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_changes_are_logged() {
        let mut app = App::new();
        app.init_resource::<ArSession>()
            .init_resource::<CameraFeed>()
            .add_systems(Update, poll_camera_feed);

        let tx = app.world().resource::<CameraFeed>().tx.clone();
        tx.try_send(FeedStatus::Failed("NotAllowedError".into()))
            .unwrap();
        app.update();

        let feed = app.world().resource::<CameraFeed>();
        assert_eq!(
            feed.status(),
            &FeedStatus::Failed("NotAllowedError".into())
        );
        let session = app.world().resource::<ArSession>();
        assert_eq!(
            session.log().latest().unwrap().message,
            "摄像头启动失败: NotAllowedError"
        );
    }
}
