use log::debug;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, Element, HtmlCanvasElement};

use crate::camera::PerspectiveCamera;
use crate::error::{BackdropError, Result};
use crate::scene::Scene;
use crate::surface::{MountPoint, RenderSurface};

use super::common::{css_rgba, DrawList};

/// DOM element the canvas is appended to.
#[derive(Debug, Clone)]
pub struct ElementMount {
    element: Element,
}

impl ElementMount {
    pub fn new(element: Element) -> Self {
        Self { element }
    }

    /// Looks up the mount element; `None` while the page has not rendered it yet.
    pub fn find(id: &str) -> Option<Self> {
        web_sys::window()?
            .document()?
            .get_element_by_id(id)
            .map(Self::new)
    }

    pub fn element(&self) -> &Element {
        &self.element
    }
}

impl MountPoint for ElementMount {
    type Surface = CanvasSurface;

    fn attach(&self, width: u32, height: u32) -> Result<CanvasSurface> {
        let document = self
            .element
            .owner_document()
            .ok_or_else(|| BackdropError::Surface("mount element has no document".into()))?;
        let canvas = document
            .create_element("canvas")
            .map_err(|err| BackdropError::Surface(format!("failed to create canvas: {err:?}")))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| BackdropError::Surface("element is not a canvas".into()))?;
        canvas.set_width(width);
        canvas.set_height(height);
        canvas
            .set_attribute("style", "position:absolute;inset:0;pointer-events:none")
            .map_err(|err| BackdropError::Surface(format!("failed to style canvas: {err:?}")))?;

        let context = canvas
            .get_context("2d")
            .map_err(|err| BackdropError::Surface(format!("failed to query canvas context: {err:?}")))?
            .ok_or_else(|| BackdropError::Surface("canvas does not support 2d context".into()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| BackdropError::Surface("failed to cast canvas context".into()))?;

        self.element
            .append_child(&canvas)
            .map_err(|err| BackdropError::Surface(format!("failed to attach canvas: {err:?}")))?;

        Ok(CanvasSurface {
            canvas,
            context,
            parent: Some(self.element.clone()),
            size: (width, height),
        })
    }
}

/// Transparent 2D canvas surface for WebAssembly builds.
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    parent: Option<Element>,
    size: (u32, u32),
}

impl CanvasSurface {
    fn paint(&self, list: &DrawList) {
        let (width, height) = (self.size.0 as f64, self.size.1 as f64);
        self.context.clear_rect(0.0, 0.0, width, height);
        if let Some(clear) = list.clear {
            self.context.set_fill_style_str(&css_rgba(clear));
            self.context.fill_rect(0.0, 0.0, width, height);
        }

        // Batch consecutive segments sharing a color into one path.
        let mut current: Option<glam::Vec4> = None;
        for line in &list.lines {
            if current != Some(line.color) {
                if current.is_some() {
                    self.context.stroke();
                }
                self.context.set_stroke_style_str(&css_rgba(line.color));
                self.context.begin_path();
                current = Some(line.color);
            }
            self.context.move_to(line.from.x as f64, line.from.y as f64);
            self.context.line_to(line.to.x as f64, line.to.y as f64);
        }
        if current.is_some() {
            self.context.stroke();
        }

        let mut fill: Option<glam::Vec4> = None;
        for point in &list.points {
            if fill != Some(point.color) {
                self.context.set_fill_style_str(&css_rgba(point.color));
                fill = Some(point.color);
            }
            let size = point.size as f64;
            self.context.fill_rect(
                point.position.x as f64 - size * 0.5,
                point.position.y as f64 - size * 0.5,
                size,
                size,
            );
        }
    }
}

impl RenderSurface for CanvasSurface {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = (width, height);
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }

    fn draw(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<()> {
        if self.parent.is_none() {
            return Err(BackdropError::Surface("canvas is detached".into()));
        }
        let list = DrawList::build(scene, camera, self.size.0, self.size.1);
        self.paint(&list);
        Ok(())
    }

    fn detach(&mut self) {
        let Some(parent) = self.parent.take() else {
            return;
        };
        // The page may already have removed the element; nothing to undo then.
        if parent.remove_child(&self.canvas).is_err() {
            debug!("canvas was already removed from its mount point");
        }
    }

    fn is_attached(&self) -> bool {
        self.parent.is_some()
    }
}
