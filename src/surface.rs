use crate::camera::PerspectiveCamera;
use crate::error::Result;
use crate::scene::Scene;

/// Drawing target owned by one background renderer.
pub trait RenderSurface {
    /// Current size in pixels.
    fn size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32);

    /// Draws one frame of `scene` as seen through `camera`.
    fn draw(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<()>;

    /// Removes the drawing target from its mount point and frees it.
    ///
    /// Must tolerate repeated calls and targets that are already gone.
    fn detach(&mut self);

    fn is_attached(&self) -> bool;
}

/// Place in the host's display hierarchy a surface can be attached to.
pub trait MountPoint {
    type Surface: RenderSurface;

    /// Creates a `width` x `height` alpha-capable surface and attaches it here.
    fn attach(&self, width: u32, height: u32) -> Result<Self::Surface>;
}
