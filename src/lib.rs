//! Decorative 3D backgrounds for the portfolio pages.
//!
//! A [`BackgroundRenderer`] builds one of four small animated scenes
//! ([`Variant`]), attaches a drawing surface to a mount point and advances the
//! scene once per frame delivered by a [`FrameScheduler`]. Surfaces exist for
//! the desktop (wgpu), the browser (2D canvas) and offscreen rendering, so the
//! animation logic stays testable without a window.

pub mod animation;
pub mod app;
pub mod appearance;
pub mod backdrop;
pub mod camera;
pub mod config;
pub mod error;
pub mod geometry;
pub mod render;
pub mod rng;
pub mod scene;
pub mod surface;
pub mod variant;
pub mod viewport;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use animation::{AnimationLoop, FrameHandle, FrameInfo, FrameScheduler, LoopState, ManualScheduler};
pub use appearance::{Appearance, AppearanceFlag, AppearanceSignal, Subscription};
pub use backdrop::{observe_appearance, BackgroundRenderer};
pub use camera::PerspectiveCamera;
pub use config::{AppearancePalette, BackgroundOptions, WaveSettings};
pub use error::{BackdropError, Result};
pub use render::{DrawList, HeadlessMount, PixelSurface};
pub use scene::{NodeId, NodeKind, Scene, SceneStats};
pub use surface::{MountPoint, RenderSurface};
pub use variant::{Glyph, Motion, Variant};
pub use viewport::{SharedViewport, StaticViewport, ViewportProvider};
