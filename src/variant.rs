//! The four procedural backgrounds and the motion attached to each.

use std::f32::consts::FRAC_PI_2;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::animation::FrameInfo;
use crate::camera::PerspectiveCamera;
use crate::config::{hex_color, WaveSettings, MATERIAL_COLOR};
use crate::geometry::{self, Geometry};
use crate::rng::ScatterRng;
use crate::scene::{
    AmbientLight, LineMaterial, NodeId, NodeKind, PointCloud, PointMaterial, Scene, SceneNode,
    WireMesh,
};

/// Per-frame rotation of the wireframe solid, radians on X and Y.
pub const SOLID_SPIN: f32 = 0.01;
/// Per-frame rotation of the particle field, radians on X and Y.
pub const FIELD_SPIN: f32 = 0.0005;
/// Per-frame Y rotation of the whole cluster group.
pub const CLUSTER_SPIN: f32 = 0.001;
/// Per-frame X/Y self-rotation of each cluster polyhedron.
pub const SHAPE_SPIN: f32 = 0.005;

pub const FIELD_POINTS: usize = 5000;
pub const CLUSTER_POINTS: usize = 3000;
/// Side of the cube the particle clouds are scattered in.
pub const CLOUD_EXTENT: f32 = 2000.0;
/// Side of the cube the cluster polyhedra are placed in.
pub const SHAPE_EXTENT: f32 = 1000.0;
pub const WAVE_EXTENT: f32 = 2000.0;
pub const WAVE_SEGMENTS: u32 = 100;

/// Available background scenes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// A single spinning unit cube.
    WireframeSolid,
    /// Slowly rotating sparse point cloud; the hero background.
    ParticleField,
    /// Point cloud plus three self-rotating polyhedra.
    Cluster,
    /// Flat wire-mesh plane with a travelling sine swell.
    WavePlane,
}

/// Decorative icon drawn over the cube variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Glyph {
    Code,
    Globe,
    Laptop,
    Video,
}

impl Glyph {
    pub fn name(self) -> &'static str {
        match self {
            Glyph::Code => "code",
            Glyph::Globe => "globe",
            Glyph::Laptop => "laptop",
            Glyph::Video => "video",
        }
    }

    /// Text fallback used when no icon font is available.
    pub fn symbol(self) -> &'static str {
        match self {
            Glyph::Code => "</>",
            Glyph::Globe => "\u{1F310}",
            Glyph::Laptop => "\u{1F4BB}",
            Glyph::Video => "\u{25B6}",
        }
    }
}

impl Variant {
    pub fn all() -> &'static [Variant] {
        &[
            Variant::WireframeSolid,
            Variant::ParticleField,
            Variant::Cluster,
            Variant::WavePlane,
        ]
    }

    /// Parses an id or one of the page aliases (`cube`, `hero`, `edu`, `bg1`, `bg2`).
    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "wireframe-solid" | "cube" => Some(Variant::WireframeSolid),
            "particle-field" | "particles" | "hero" | "edu" => Some(Variant::ParticleField),
            "cluster" | "bg1" => Some(Variant::Cluster),
            "wave-plane" | "wave" | "bg2" => Some(Variant::WavePlane),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Variant::WireframeSolid => "wireframe-solid",
            Variant::ParticleField => "particle-field",
            Variant::Cluster => "cluster",
            Variant::WavePlane => "wave-plane",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Variant::WireframeSolid => "Wireframe Cube",
            Variant::ParticleField => "Particle Field",
            Variant::Cluster => "Polyhedra Cluster",
            Variant::WavePlane => "Wave Plane",
        }
    }

    /// Only the hero particle field follows the page's dark/light mode.
    pub fn reacts_to_appearance(&self) -> bool {
        matches!(self, Variant::ParticleField)
    }

    pub fn overlay_glyphs(&self) -> &'static [Glyph] {
        match self {
            Variant::WireframeSolid => &[Glyph::Code, Glyph::Globe, Glyph::Laptop, Glyph::Video],
            _ => &[],
        }
    }

    /// Places the camera for this variant.
    pub fn position_camera(&self, camera: &mut PerspectiveCamera) {
        camera.position = match self {
            Variant::WireframeSolid => Vec3::new(0.0, 0.0, 2.0),
            Variant::ParticleField | Variant::Cluster => Vec3::new(0.0, 0.0, 1000.0),
            Variant::WavePlane => Vec3::new(0.0, 400.0, 1000.0),
        };
        camera.look_at(Vec3::ZERO);
    }

    /// Populates `scene` and returns the motion that animates it.
    pub fn build(&self, scene: &mut Scene, rng: &mut ScatterRng) -> Motion {
        let color = hex_color(MATERIAL_COLOR);
        let wire = LineMaterial {
            color,
            opacity: 1.0,
        };
        match self {
            Variant::WireframeSolid => {
                let solid = scene.add(mesh("cube", geometry::box_wireframe(1.0, 1.0, 1.0), wire));
                Motion::Spin {
                    node: solid,
                    step: SOLID_SPIN,
                }
            }
            Variant::ParticleField => {
                let material = PointMaterial {
                    color,
                    size: 1.5,
                    opacity: 0.3,
                };
                let cloud = geometry::point_cloud(FIELD_POINTS, CLOUD_EXTENT, rng);
                let field = scene.add(points("particles", cloud, material));
                scene.ambient = Some(AmbientLight {
                    color: hex_color(0x404040),
                    intensity: 2.0,
                });
                Motion::Spin {
                    node: field,
                    step: FIELD_SPIN,
                }
            }
            Variant::Cluster => {
                let group = scene.add(SceneNode::group("cluster"));
                let material = PointMaterial {
                    color,
                    size: 2.0,
                    opacity: 0.6,
                };
                let cloud = geometry::point_cloud(CLUSTER_POINTS, CLOUD_EXTENT, rng);
                scene.add_child(group, points("particles", cloud, material));

                let solids = [
                    ("icosahedron", geometry::icosahedron(20.0)),
                    ("octahedron", geometry::octahedron(15.0)),
                    ("tetrahedron", geometry::tetrahedron(25.0)),
                ];
                let shapes = solids.map(|(name, solid)| {
                    let position = rng.point_in_cube(SHAPE_EXTENT);
                    scene.add_child(group, mesh(name, solid, wire).with_position(position))
                });
                Motion::Cluster { group, shapes }
            }
            Variant::WavePlane => {
                let group = scene.add(SceneNode::group("wave"));
                let grid = geometry::plane_grid(WAVE_EXTENT, WAVE_EXTENT, WAVE_SEGMENTS, WAVE_SEGMENTS);
                let plane = scene.add_child(
                    group,
                    mesh("plane", grid, wire).with_rotation(Vec3::new(-FRAC_PI_2, 0.0, 0.0)),
                );
                Motion::Wave { plane }
            }
        }
    }
}

fn mesh(name: &str, geometry: Geometry, material: LineMaterial) -> SceneNode {
    SceneNode::new(name, NodeKind::Mesh(WireMesh { geometry, material }))
}

fn points(name: &str, geometry: Geometry, material: PointMaterial) -> SceneNode {
    SceneNode::new(name, NodeKind::Points(PointCloud { geometry, material }))
}

/// Per-frame update attached to a variant at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    Spin { node: NodeId, step: f32 },
    Cluster { group: NodeId, shapes: [NodeId; 3] },
    Wave { plane: NodeId },
}

impl Motion {
    /// Applies one frame of motion to `scene`.
    pub fn advance(&self, scene: &mut Scene, frame: &FrameInfo, wave: &WaveSettings) {
        match *self {
            Motion::Spin { node, step } => {
                let rotation = &mut scene.node_mut(node).transform.rotation;
                rotation.x += step;
                rotation.y += step;
            }
            Motion::Cluster { group, shapes } => {
                scene.node_mut(group).transform.rotation.y += CLUSTER_SPIN;
                for shape in shapes {
                    let rotation = &mut scene.node_mut(shape).transform.rotation;
                    rotation.x += SHAPE_SPIN;
                    rotation.y += SHAPE_SPIN;
                }
            }
            Motion::Wave { plane } => {
                if let NodeKind::Mesh(mesh) = &mut scene.node_mut(plane).kind {
                    let time = frame.time as f32;
                    for vertex in &mut mesh.geometry.positions {
                        vertex.z = wave.height(vertex.x, vertex.y, time);
                    }
                    mesh.geometry.mark_dirty();
                }
            }
        }
    }
}
