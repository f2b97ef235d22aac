//! `performance.now()` clock with `requestAnimationFrame` frame requests.

use glimmer_core::{FrameHandle, TimingSource};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

pub struct BrowserTiming {
    window: web_sys::Window,
    performance: web_sys::Performance,
    on_frame: Closure<dyn FnMut(f64)>,
}

impl BrowserTiming {
    /// `on_frame` runs once per granted frame request.
    pub fn new(on_frame: impl FnMut(f64) + 'static) -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global window"))?;
        let performance = window
            .performance()
            .ok_or_else(|| JsValue::from_str("window.performance unavailable"))?;
        Ok(Self {
            window,
            performance,
            on_frame: Closure::wrap(Box::new(on_frame) as Box<dyn FnMut(f64)>),
        })
    }
}

impl TimingSource for BrowserTiming {
    fn now(&self) -> f64 {
        self.performance.now()
    }

    fn request_frame(&self) -> FrameHandle {
        match self
            .window
            .request_animation_frame(self.on_frame.as_ref().unchecked_ref())
        {
            Ok(id) => FrameHandle(id as u64),
            Err(err) => {
                web_sys::console::error_2(&JsValue::from_str("requestAnimationFrame failed"), &err);
                FrameHandle(0)
            }
        }
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        if let Err(err) = self.window.cancel_animation_frame(handle.0 as i32) {
            web_sys::console::error_2(&JsValue::from_str("cancelAnimationFrame failed"), &err);
        }
    }
}
