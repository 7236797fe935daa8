//! Browser sensors: geolocation, device orientation and the iOS permission
//! prompt.
//!
//! Every callback is a leaked [`Closure`] that forwards into the sensor
//! channel; the page lives as long as the app, so nothing is unregistered.

use std::fmt;

use geoar::{
    GeoFix, GeolocationOptions, OrientationPermission, OrientationSample, SensorError, SensorEvent,
};
use js_sys::{Function, Promise, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

/// Label of the button that requests orientation access.
const PERMISSION_BUTTON_LABEL: &str = "启用设备方向";

/// A browser API the sensors depend on is missing or threw.
#[derive(Debug)]
pub struct StartError {
    context: &'static str,
    detail: String,
}

impl StartError {
    fn new(context: &'static str, value: &JsValue) -> Self {
        Self {
            context,
            detail: js_error_text(value),
        }
    }

    fn missing(context: &'static str) -> Self {
        Self {
            context,
            detail: "not available".to_owned(),
        }
    }
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.detail)
    }
}

impl std::error::Error for StartError {}

/// Readable text for a thrown JS value.
fn js_error_text(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.to_string());
    }
    format!("{value:?}")
}

/// Subscribe to position and orientation updates.
pub fn start(
    tx: async_channel::Sender<SensorEvent>,
    options: &GeolocationOptions,
) -> Result<(), StartError> {
    let window = web_sys::window().ok_or_else(|| StartError::missing("window"))?;

    watch_position(&window, tx.clone(), options)?;
    listen_for_orientation(&window, tx.clone())?;

    if orientation_permission_state() == OrientationPermission::Prompt {
        add_permission_button(&window, tx)?;
    }
    Ok(())
}

/// Whether orientation events need an explicit grant (iOS 13+).
pub fn orientation_permission_state() -> OrientationPermission {
    if request_permission().is_some() {
        OrientationPermission::Prompt
    } else {
        OrientationPermission::NotRequired
    }
}

fn send(tx: &async_channel::Sender<SensorEvent>, event: SensorEvent) {
    if let Err(e) = tx.try_send(event) {
        tracing::warn!("dropping sensor event: {e}");
    }
}

fn watch_position(
    window: &web_sys::Window,
    tx: async_channel::Sender<SensorEvent>,
    options: &GeolocationOptions,
) -> Result<(), StartError> {
    let geolocation = window
        .navigator()
        .geolocation()
        .map_err(|e| StartError::new("navigator.geolocation", &e))?;

    let fix_tx = tx.clone();
    let success = Closure::wrap(Box::new(move |position: web_sys::Position| {
        let coords = position.coords();
        let mut fix = GeoFix::new(coords.latitude(), coords.longitude(), coords.accuracy());
        if let Some(altitude) = coords.altitude() {
            fix = fix.with_altitude(altitude);
        }
        send(&fix_tx, SensorEvent::Fix(fix));
    }) as Box<dyn FnMut(_)>);

    let failure = Closure::wrap(Box::new(move |error: web_sys::PositionError| {
        tracing::warn!(code = error.code(), message = %error.message(), "geolocation error");
        send(
            &tx,
            SensorEvent::Error(SensorError::from_geolocation_code(error.code())),
        );
    }) as Box<dyn FnMut(_)>);

    let position_options = web_sys::PositionOptions::new();
    position_options.set_enable_high_accuracy(options.high_accuracy);
    position_options.set_timeout(options.timeout_millis());
    position_options.set_maximum_age(options.maximum_age_millis());

    geolocation
        .watch_position_with_error_callback_and_options(
            success.as_ref().unchecked_ref(),
            Some(failure.as_ref().unchecked_ref()),
            &position_options,
        )
        .map_err(|e| StartError::new("watchPosition", &e))?;

    success.forget();
    failure.forget();
    tracing::info!("geolocation watch started");
    Ok(())
}

fn listen_for_orientation(
    window: &web_sys::Window,
    tx: async_channel::Sender<SensorEvent>,
) -> Result<(), StartError> {
    let screen_window = window.clone();
    let listener = Closure::wrap(Box::new(move |event: web_sys::DeviceOrientationEvent| {
        // Desktop browsers fire the event with null angles.
        let (Some(alpha), Some(beta), Some(gamma)) = (event.alpha(), event.beta(), event.gamma())
        else {
            return;
        };
        let screen_angle = screen_window
            .screen()
            .ok()
            .and_then(|screen| screen.orientation().angle().ok())
            .map_or(0.0, f64::from);
        send(
            &tx,
            SensorEvent::Orientation(OrientationSample {
                alpha,
                beta,
                gamma,
                screen_angle,
            }),
        );
    }) as Box<dyn FnMut(_)>);

    window
        .add_event_listener_with_callback("deviceorientation", listener.as_ref().unchecked_ref())
        .map_err(|e| StartError::new("deviceorientation listener", &e))?;
    listener.forget();
    Ok(())
}

/// `DeviceOrientationEvent` and its `requestPermission`, where the browser has one.
fn request_permission() -> Option<(JsValue, Function)> {
    let constructor = Reflect::get(&js_sys::global(), &JsValue::from_str("DeviceOrientationEvent"))
        .ok()
        .filter(|value| !value.is_undefined())?;
    let function = Reflect::get(&constructor, &JsValue::from_str("requestPermission"))
        .ok()?
        .dyn_into::<Function>()
        .ok()?;
    Some((constructor, function))
}

/// Permission can only be requested from a user gesture, so put a button on
/// the page.
fn add_permission_button(
    window: &web_sys::Window,
    tx: async_channel::Sender<SensorEvent>,
) -> Result<(), StartError> {
    let document = window
        .document()
        .ok_or_else(|| StartError::missing("document"))?;
    let body = document.body().ok_or_else(|| StartError::missing("body"))?;

    let button = document
        .create_element("button")
        .map_err(|e| StartError::new("create button", &e))?
        .dyn_into::<web_sys::HtmlElement>()
        .map_err(|e| StartError::new("button element", &e))?;
    button.set_text_content(Some(PERMISSION_BUTTON_LABEL));

    let style = button.style();
    for (property, value) in [
        ("position", "absolute"),
        ("top", "60px"),
        ("right", "10px"),
        ("z-index", "10"),
        ("padding", "8px 12px"),
    ] {
        style
            .set_property(property, value)
            .map_err(|e| StartError::new("button style", &e))?;
    }

    let clicked = button.clone();
    let on_click = Closure::wrap(Box::new(move || {
        let Some((constructor, function)) = request_permission() else {
            return;
        };
        let promise = match function.call0(&constructor).map(JsCast::dyn_into::<Promise>) {
            Ok(Ok(promise)) => promise,
            Ok(Err(value)) | Err(value) => {
                send(&tx, SensorEvent::OrientationFailed(js_error_text(&value)));
                return;
            }
        };

        clicked.remove();
        let tx = tx.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let event = match JsFuture::from(promise).await {
                Ok(state) if state.as_string().as_deref() == Some("granted") => {
                    SensorEvent::OrientationPermission(OrientationPermission::Granted)
                }
                Ok(_) => SensorEvent::OrientationPermission(OrientationPermission::Denied),
                Err(e) => SensorEvent::OrientationFailed(js_error_text(&e)),
            };
            send(&tx, event);
        });
    }) as Box<dyn FnMut()>);

    button.set_onclick(Some(on_click.as_ref().unchecked_ref()));
    on_click.forget();

    body.append_child(&button)
        .map_err(|e| StartError::new("append button", &e))?;
    Ok(())
}
