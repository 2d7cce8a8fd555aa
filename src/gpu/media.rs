//! Looping, muted `<video>` elements backing video textures in the browser.

use std::rc::Rc;

use anyhow::anyhow;
use futures::{FutureExt, future::LocalBoxFuture};
use futures_intrusive::channel::LocalOneshotChannel;
use wasm_bindgen::{JsCast, prelude::Closure};
use web_sys::HtmlVideoElement;

use crate::engine::MediaElement;

fn js_error(what: &str, err: wasm_bindgen::JsValue) -> anyhow::Error {
    anyhow!("{what}: {err:?}")
}

pub struct VideoElement {
    element: HtmlVideoElement,
    ready: Rc<LocalOneshotChannel<()>>,
    _on_canplay: Closure<dyn FnMut()>,
}

impl VideoElement {
    /// Creates a hidden element playing `path` from the asset origin.
    pub fn new(path: &str) -> anyhow::Result<Self> {
        let url = crate::resources::fetch::asset_url(path)?;
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| anyhow!("No document to attach {path} to"))?;
        let element: HtmlVideoElement = document
            .create_element("video")
            .map_err(|e| js_error("Unable to create video element", e))?
            .dyn_into()
            .map_err(|_| anyhow!("Created element is not a video"))?;

        element.set_cross_origin(Some("anonymous"));
        element.set_loop(true);
        element.set_muted(true);
        element
            .set_attribute("playsinline", "")
            .map_err(|e| js_error("Unable to set playsinline", e))?;
        element
            .style()
            .set_property("display", "none")
            .map_err(|e| js_error("Unable to hide video", e))?;

        let ready = Rc::new(LocalOneshotChannel::new());
        let sender = ready.clone();
        let on_canplay = Closure::<dyn FnMut()>::new(move || {
            // Only the first signal matters
            let _ = sender.send(());
        });
        element
            .add_event_listener_with_callback("canplay", on_canplay.as_ref().unchecked_ref())
            .map_err(|e| js_error("Unable to listen for canplay", e))?;

        element.set_src(url.as_str());
        if let Some(body) = document.body() {
            body.append_child(&element)
                .map_err(|e| js_error("Unable to attach video", e))?;
        }

        Ok(Self {
            element,
            ready,
            _on_canplay: on_canplay,
        })
    }

    pub fn element(&self) -> &HtmlVideoElement {
        &self.element
    }
}

impl MediaElement for VideoElement {
    fn play(&self) -> anyhow::Result<()> {
        // The returned promise rejects when autoplay is blocked; playback
        // then starts with the first user gesture.
        self.element
            .play()
            .map(|_| ())
            .map_err(|e| js_error("Unable to play video", e))
    }

    fn pause(&self) -> anyhow::Result<()> {
        self.element
            .pause()
            .map_err(|e| js_error("Unable to pause video", e))
    }

    fn detach(&self) -> anyhow::Result<()> {
        self.element.remove();
        self.element
            .remove_attribute("src")
            .map_err(|e| js_error("Unable to drop video source", e))?;
        self.element.load();
        Ok(())
    }

    fn ready(&self) -> LocalBoxFuture<'static, ()> {
        let ready = self.ready.clone();
        async move {
            ready.receive().await;
        }
        .boxed_local()
    }
}
