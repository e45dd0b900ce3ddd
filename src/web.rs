#![cfg(target_arch = "wasm32")]

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use gloo_events::EventListener;
use log::{debug, error, warn};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlElement, MutationObserver, MutationObserverInit};

use crate::animation::{FrameHandle, FrameInfo, FrameScheduler};
use crate::appearance::{Appearance, AppearanceListener, AppearanceSignal, Subscription};
use crate::backdrop::{observe_appearance, BackgroundRenderer};
use crate::config::{BackgroundOptions, PAGE_COLOR};
use crate::error::{BackdropError, Result};
use crate::render::{CanvasSurface, ElementMount};
use crate::variant::Variant;
use crate::viewport::ViewportProvider;

type WebRenderer = BackgroundRenderer<CanvasSurface, RafScheduler>;
type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;
type RequestedFrame = Rc<Cell<Option<FrameHandle>>>;

#[wasm_bindgen(start)]
pub fn bootstrap() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

/// A background mounted into a page element.
#[wasm_bindgen]
pub struct WebBackground {
    renderer: Rc<RefCell<WebRenderer>>,
    callback: FrameCallback,
    overlay: Option<Element>,
    resize: Option<EventListener>,
}

#[wasm_bindgen]
impl WebBackground {
    /// Mounts `variant` into the element with id `element_id`.
    ///
    /// Resolves to `undefined` when the element is not in the document yet.
    pub fn mount(
        element_id: &str,
        variant: &str,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Result<Option<WebBackground>, JsValue> {
        let variant = Variant::from_id(variant)
            .ok_or_else(|| JsValue::from_str(&format!("unknown background variant `{variant}`")))?;
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("window not available"))?;
        let mut options = BackgroundOptions::new(variant);
        options.width = width;
        options.height = height;

        let target: Rc<RefCell<Weak<RefCell<WebRenderer>>>> = Rc::new(RefCell::new(Weak::new()));
        let requested: RequestedFrame = Rc::new(Cell::new(None));
        let callback: FrameCallback = Rc::new(RefCell::new(Some(frame_callback(
            Rc::clone(&target),
            Rc::clone(&requested),
        ))));
        let scheduler = RafScheduler {
            window: window.clone(),
            callback: Rc::clone(&callback),
            requested,
        };

        let mount = ElementMount::find(element_id);
        let viewport = BrowserViewport {
            window: window.clone(),
        };
        let Some(renderer) = WebRenderer::mount(mount.as_ref(), &options, &viewport, scheduler)
            .map_err(|err| JsValue::from_str(&err.to_string()))?
        else {
            debug!("#{element_id} not found; background not mounted");
            return Ok(None);
        };
        let renderer = Rc::new(RefCell::new(renderer));
        *target.borrow_mut() = Rc::downgrade(&renderer);

        let weak = Rc::downgrade(&renderer);
        let resize = EventListener::new(&window, "resize", move |_| {
            let Some(renderer) = weak.upgrade() else {
                return;
            };
            match renderer.try_borrow_mut() {
                Ok(mut renderer) => renderer.on_viewport_resize(&viewport),
                Err(_) => warn!("background busy; skipped resize"),
            };
        });

        let overlay = match mount.as_ref() {
            Some(mount) => decorate(mount.element(), variant)?,
            None => None,
        };

        if variant.reacts_to_appearance() {
            match window.document().and_then(|document| document.document_element()) {
                Some(root) => observe_appearance(&renderer, &DocumentAppearance { root })
                    .map_err(|err| JsValue::from_str(&err.to_string()))?,
                None => warn!("no document element; appearance stays at its defaults"),
            }
        }

        Ok(Some(WebBackground {
            renderer,
            callback,
            overlay,
            resize: Some(resize),
        }))
    }

    /// Stops the animation and removes everything `mount` added to the page.
    pub fn unmount(&mut self) {
        match self.renderer.try_borrow_mut() {
            Ok(mut renderer) => renderer.teardown(),
            Err(_) => warn!("background busy during unmount"),
        }
        if let Some(overlay) = self.overlay.take() {
            overlay.remove();
        }
        self.resize.take();
        self.callback.borrow_mut().take();
    }

    #[wasm_bindgen(getter)]
    pub fn frames(&self) -> f64 {
        self.renderer
            .try_borrow()
            .map(|renderer| renderer.frames_rendered() as f64)
            .unwrap_or(0.0)
    }
}

impl Drop for WebBackground {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Persistent rAF callback that forwards frames to the renderer in `target`.
fn frame_callback(
    target: Rc<RefCell<Weak<RefCell<WebRenderer>>>>,
    requested: RequestedFrame,
) -> Closure<dyn FnMut(f64)> {
    let mut number = 0u64;
    let mut last: Option<f64> = None;
    Closure::wrap(Box::new(move |timestamp: f64| {
        let Some(handle) = requested.take() else {
            return;
        };
        let renderer = target.borrow().upgrade();
        let Some(renderer) = renderer else {
            return;
        };
        let Ok(mut renderer) = renderer.try_borrow_mut() else {
            warn!("background busy; dropped frame {number}");
            return;
        };
        let time = timestamp / 1000.0;
        let frame = FrameInfo::new(number, time, last.map_or(0.0, |last| time - last));
        number += 1;
        last = Some(time);
        if let Err(err) = renderer.on_frame(handle, frame) {
            error!("background stopped: {err}");
        }
    }) as Box<dyn FnMut(f64)>)
}

/// `requestAnimationFrame` as a [`FrameScheduler`].
struct RafScheduler {
    window: web_sys::Window,
    callback: FrameCallback,
    requested: RequestedFrame,
}

impl FrameScheduler for RafScheduler {
    fn request_frame(&mut self) -> Result<FrameHandle> {
        let callback = self.callback.borrow();
        let closure = callback
            .as_ref()
            .ok_or_else(|| BackdropError::Scheduler("frame callback already released".into()))?;
        let id = self
            .window
            .request_animation_frame(closure.as_ref().unchecked_ref())
            .map_err(|err| BackdropError::Scheduler(format!("requestAnimationFrame failed: {err:?}")))?;
        let handle = FrameHandle(id as u64);
        self.requested.set(Some(handle));
        Ok(handle)
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.requested.get() == Some(handle) {
            self.requested.set(None);
        }
        if let Err(err) = self.window.cancel_animation_frame(handle.0 as i32) {
            debug!("cancelAnimationFrame failed: {err:?}");
        }
    }
}

/// Window inner size in CSS pixels.
struct BrowserViewport {
    window: web_sys::Window,
}

impl ViewportProvider for BrowserViewport {
    fn viewport_size(&self) -> (u32, u32) {
        let read = |value: std::result::Result<JsValue, JsValue>| {
            value.ok().and_then(|value| value.as_f64()).unwrap_or(0.0).max(0.0) as u32
        };
        (read(self.window.inner_width()), read(self.window.inner_height()))
    }
}

/// The `dark` class on the document element.
struct DocumentAppearance {
    root: Element,
}

impl DocumentAppearance {
    fn read(root: &Element) -> Appearance {
        Appearance::from_dark(root.class_list().contains("dark"))
    }
}

impl AppearanceSignal for DocumentAppearance {
    fn current(&self) -> Appearance {
        Self::read(&self.root)
    }

    fn subscribe(&self, mut listener: AppearanceListener) -> Box<dyn Subscription> {
        let root = self.root.clone();
        let last = Cell::new(self.current());
        let callback = Closure::wrap(Box::new(move || {
            let now = Self::read(&root);
            if now != last.get() {
                last.set(now);
                listener(now);
            }
        }) as Box<dyn FnMut()>);

        let observer = match MutationObserver::new(callback.as_ref().unchecked_ref()) {
            Ok(observer) => observer,
            Err(err) => {
                warn!("MutationObserver unavailable: {err:?}");
                return Box::new(ClassObserver::default());
            }
        };
        let init = MutationObserverInit::new();
        init.set_attributes(true);
        init.set_attribute_filter(&js_sys::Array::of1(&JsValue::from_str("class")));
        if let Err(err) = observer.observe_with_options(&self.root, &init) {
            warn!("failed to observe document classes: {err:?}");
        }
        Box::new(ClassObserver {
            observer: Some(observer),
            callback: Some(callback),
        })
    }
}

#[derive(Default)]
struct ClassObserver {
    observer: Option<MutationObserver>,
    callback: Option<Closure<dyn FnMut()>>,
}

impl Subscription for ClassObserver {
    fn cancel(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }
        self.callback.take();
    }
}

impl Drop for ClassObserver {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Adds the per-variant page decoration: glyphs over the cube, the page
/// color behind everything else.
fn decorate(element: &Element, variant: Variant) -> Result<Option<Element>, JsValue> {
    let glyphs = variant.overlay_glyphs();
    if glyphs.is_empty() {
        if let Some(element) = element.dyn_ref::<HtmlElement>() {
            element
                .style()
                .set_property("background-color", &format!("#{PAGE_COLOR:06x}"))?;
        }
        return Ok(None);
    }

    let document = element
        .owner_document()
        .ok_or_else(|| JsValue::from_str("mount element has no document"))?;
    let overlay = document.create_element("div")?;
    overlay.set_class_name("backdrop-overlay");
    overlay.set_attribute(
        "style",
        "position:absolute;inset:0;display:grid;grid-template-columns:repeat(2,auto);\
         place-content:center;gap:2rem;pointer-events:none;font-size:2rem;color:#2186eb",
    )?;
    for glyph in glyphs {
        let cell = document.create_element("span")?;
        cell.set_class_name("backdrop-glyph");
        cell.set_attribute("data-glyph", glyph.name())?;
        cell.set_text_content(Some(glyph.symbol()));
        overlay.append_child(&cell)?;
    }
    element.append_child(&overlay)?;
    Ok(Some(overlay))
}
