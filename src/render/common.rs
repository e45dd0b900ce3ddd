use glam::{Vec2, Vec3, Vec4};

use crate::camera::PerspectiveCamera;
use crate::scene::{NodeKind, Scene};

/// A point splat in pixel coordinates (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenPoint {
    pub position: Vec2,
    pub size: f32,
    pub color: Vec4,
}

/// A line segment in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenLine {
    pub from: Vec2,
    pub to: Vec2,
    pub color: Vec4,
}

/// Backend-neutral description of one frame.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    pub width: u32,
    pub height: u32,
    /// `None` keeps the surface transparent.
    pub clear: Option<Vec4>,
    pub points: Vec<ScreenPoint>,
    pub lines: Vec<ScreenLine>,
}

impl DrawList {
    /// Projects every visible primitive of `scene` into a `width` x `height` target.
    ///
    /// Lines with an endpoint behind the camera or outside the depth range are dropped.
    pub fn build(scene: &Scene, camera: &PerspectiveCamera, width: u32, height: u32) -> Self {
        let view_proj = camera.view_proj();
        let size = Vec2::new(width as f32, height as f32);
        let to_pixels = |ndc: Vec3| Vec2::new((ndc.x + 1.0) * 0.5, (1.0 - ndc.y) * 0.5) * size;

        let mut list = DrawList {
            width,
            height,
            clear: scene.background.map(|color| color.extend(1.0)),
            ..DrawList::default()
        };

        for (id, node) in scene.nodes() {
            match &node.kind {
                NodeKind::Group => {}
                NodeKind::Points(cloud) => {
                    let mvp = view_proj * scene.world_matrix(id);
                    let color = cloud.material.color.extend(cloud.material.opacity);
                    list.points.extend(cloud.geometry.positions.iter().filter_map(|p| {
                        PerspectiveCamera::project(&mvp, *p).map(|ndc| ScreenPoint {
                            position: to_pixels(ndc),
                            size: cloud.material.size,
                            color,
                        })
                    }));
                }
                NodeKind::Mesh(mesh) => {
                    let mvp = view_proj * scene.world_matrix(id);
                    let color = mesh.material.color.extend(mesh.material.opacity);
                    let projected: Vec<Option<Vec2>> = mesh
                        .geometry
                        .positions
                        .iter()
                        .map(|p| PerspectiveCamera::project(&mvp, *p).map(to_pixels))
                        .collect();
                    list.lines.extend(mesh.geometry.edges.iter().filter_map(|[a, b]| {
                        let from = projected.get(*a as usize).copied().flatten()?;
                        let to = projected.get(*b as usize).copied().flatten()?;
                        Some(ScreenLine { from, to, color })
                    }));
                }
            }
        }
        list
    }

    /// Converts a pixel position back to normalized device coordinates.
    pub fn to_ndc(&self, pixel: Vec2) -> Vec2 {
        let width = self.width.max(1) as f32;
        let height = self.height.max(1) as f32;
        Vec2::new(pixel.x / width * 2.0 - 1.0, 1.0 - pixel.y / height * 2.0)
    }
}

/// `rgba(r, g, b, a)` string for canvas style properties.
pub fn css_rgba(color: Vec4) -> String {
    let rgb = (color.truncate().clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
    format!(
        "rgba({}, {}, {}, {:.3})",
        rgb.x as u8,
        rgb.y as u8,
        rgb.z as u8,
        color.w.clamp(0.0, 1.0)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScatterRng;
    use crate::variant::Variant;

    fn build(variant: Variant) -> DrawList {
        let mut scene = Scene::new();
        let mut camera = PerspectiveCamera::new(1.0);
        variant.build(&mut scene, &mut ScatterRng::seeded(5));
        variant.position_camera(&mut camera);
        DrawList::build(&scene, &camera, 200, 200)
    }

    #[test]
    fn cube_projects_all_edges_inside_target() {
        let list = build(Variant::WireframeSolid);
        assert_eq!(list.lines.len(), 12);
        assert!(list.points.is_empty());
        assert!(list.clear.is_none());
        for line in &list.lines {
            for p in [line.from, line.to] {
                assert!(p.x >= 0.0 && p.x <= 200.0 && p.y >= 0.0 && p.y <= 200.0);
            }
        }
    }

    #[test]
    fn particle_field_culls_points_beyond_far_plane() {
        let list = build(Variant::ParticleField);
        assert!(!list.points.is_empty());
        assert!(list.points.len() < crate::variant::FIELD_POINTS);
    }

    #[test]
    fn ndc_round_trip_of_corners() {
        let list = DrawList {
            width: 100,
            height: 50,
            ..DrawList::default()
        };
        assert_eq!(list.to_ndc(Vec2::ZERO), Vec2::new(-1.0, 1.0));
        assert_eq!(list.to_ndc(Vec2::new(100.0, 50.0)), Vec2::new(1.0, -1.0));
    }

    #[test]
    fn css_colors_are_clamped() {
        assert_eq!(css_rgba(Vec4::new(1.0, 0.0, 2.0, 0.3)), "rgba(255, 0, 255, 0.300)");
    }
}
