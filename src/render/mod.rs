pub mod common;
pub mod headless;
#[cfg(not(target_arch = "wasm32"))]
pub mod native;
#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use common::{DrawList, ScreenLine, ScreenPoint};
pub use headless::{HeadlessMount, PixelSurface};
#[cfg(not(target_arch = "wasm32"))]
pub use native::{GpuSurface, WindowMount};
#[cfg(target_arch = "wasm32")]
pub use wasm::{CanvasSurface, ElementMount};
