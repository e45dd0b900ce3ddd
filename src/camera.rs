use glam::{Mat4, Vec3, Vec4Swizzles};

pub const DEFAULT_FOV_DEGREES: f32 = 75.0;
pub const DEFAULT_NEAR: f32 = 0.1;
pub const DEFAULT_FAR: f32 = 1000.0;

/// Perspective camera looking at a fixed target.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
    aspect: f32,
}

impl PerspectiveCamera {
    pub fn new(aspect: f32) -> Self {
        Self {
            fov_degrees: DEFAULT_FOV_DEGREES,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            aspect,
        }
    }

    /// Aspect ratio for a `width` x `height` surface.
    pub fn aspect_for(width: u32, height: u32) -> f32 {
        if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// Distance between the camera and its target.
    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_gl(
            self.fov_degrees.to_radians(),
            self.aspect.max(0.01),
            self.near,
            self.far,
        )
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Maps a world-space point to normalized device coordinates.
    ///
    /// Returns `None` for points behind the camera or outside the depth range.
    pub fn project(view_proj: &Mat4, point: Vec3) -> Option<Vec3> {
        let clip = *view_proj * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return None;
        }
        let ndc = clip.xyz() / clip.w;
        (-1.0..=1.0).contains(&ndc.z).then_some(ndc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_background_contract() {
        let camera = PerspectiveCamera::new(16.0 / 9.0);
        assert_eq!(camera.fov_degrees, 75.0);
        assert_eq!(camera.near, 0.1);
        assert_eq!(camera.far, 1000.0);
        assert_eq!(camera.aspect(), 16.0 / 9.0);
    }

    #[test]
    fn view_ray_projects_to_center_within_depth_range() {
        let mut camera = PerspectiveCamera::new(1.0);
        camera.position = Vec3::new(0.0, 400.0, 1000.0);
        camera.look_at(Vec3::ZERO);
        let view_proj = camera.view_proj();

        let ndc = PerspectiveCamera::project(&view_proj, Vec3::new(0.0, 40.0, 100.0)).unwrap();
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4, "{ndc:?}");
        // The target itself sits beyond the far plane.
        assert!(PerspectiveCamera::project(&view_proj, Vec3::ZERO).is_none());
    }

    #[test]
    fn points_behind_camera_are_culled() {
        let mut camera = PerspectiveCamera::new(1.0);
        camera.position = Vec3::new(0.0, 0.0, 2.0);
        let behind = Vec3::new(0.0, 0.0, 10.0);
        assert!(PerspectiveCamera::project(&camera.view_proj(), behind).is_none());
    }

    #[test]
    fn zero_height_falls_back_to_square() {
        assert_eq!(PerspectiveCamera::aspect_for(800, 0), 1.0);
        assert_eq!(PerspectiveCamera::aspect_for(800, 400), 2.0);
    }
}
