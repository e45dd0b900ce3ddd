use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;

/// Index of a node inside a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Runtime representation of a background scene.
///
/// Nodes live in an arena; groups reference their children by [`NodeId`].
#[derive(Debug, Clone, Default)]
pub struct Scene {
    nodes: Vec<SceneNode>,
    roots: Vec<NodeId>,
    pub ambient: Option<AmbientLight>,
    /// Solid clear color; `None` leaves the surface transparent.
    pub background: Option<Vec3>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node at the top level of the scene.
    pub fn add(&mut self, node: SceneNode) -> NodeId {
        let id = self.push(node, None);
        self.roots.push(id);
        id
    }

    /// Adds a node as a child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, node: SceneNode) -> NodeId {
        let id = self.push(node, Some(parent));
        self.nodes[parent.0].children.push(id);
        id
    }

    fn push(&mut self, mut node: SceneNode, parent: Option<NodeId>) -> NodeId {
        node.parent = parent;
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> &SceneNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SceneNode {
        &mut self.nodes[id.0]
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }

    /// Model matrix of a node including every ancestor transform.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let node = self.node(id);
        let local = node.transform.matrix();
        match node.parent {
            Some(parent) => self.world_matrix(parent) * local,
            None => local,
        }
    }

    pub fn stats(&self) -> SceneStats {
        let mut stats = SceneStats {
            top_level: self.roots.len(),
            ..SceneStats::default()
        };
        for node in &self.nodes {
            match &node.kind {
                NodeKind::Group => stats.groups += 1,
                NodeKind::Points(cloud) => {
                    stats.point_clouds += 1;
                    stats.points += cloud.geometry.vertex_count();
                }
                NodeKind::Mesh(_) => stats.meshes += 1,
            }
        }
        stats
    }

    /// Releases all nodes and lighting state.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
        self.ambient = None;
        self.background = None;
    }
}

/// Object counts used for summaries and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneStats {
    pub top_level: usize,
    pub groups: usize,
    pub point_clouds: usize,
    pub meshes: usize,
    pub points: usize,
}

impl SceneStats {
    /// Individually drawn primitives: every point of every cloud plus every mesh.
    pub fn primitives(&self) -> usize {
        self.points + self.meshes
    }
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub kind: NodeKind,
    pub transform: Transform,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            transform: Transform::default(),
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.transform.rotation = rotation;
        self
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Group,
    Points(PointCloud),
    Mesh(WireMesh),
}

#[derive(Debug, Clone)]
pub struct PointCloud {
    pub geometry: Geometry,
    pub material: PointMaterial,
}

#[derive(Debug, Clone)]
pub struct WireMesh {
    pub geometry: Geometry,
    pub material: LineMaterial,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointMaterial {
    pub color: Vec3,
    /// Point size in pixels.
    pub size: f32,
    pub opacity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineMaterial {
    pub color: Vec3,
    pub opacity: f32,
}

/// Position and Euler rotation (radians, XYZ order) of a node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
}

impl Transform {
    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        Mat4::from_rotation_translation(rotation, self.position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientLight {
    pub color: Vec3,
    pub intensity: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{box_wireframe, point_cloud};
    use crate::rng::ScatterRng;

    fn line() -> LineMaterial {
        LineMaterial {
            color: Vec3::ONE,
            opacity: 1.0,
        }
    }

    #[test]
    fn children_inherit_parent_transform() {
        let mut scene = Scene::new();
        let group = scene.add(SceneNode::group("group").with_position(Vec3::new(10.0, 0.0, 0.0)));
        let child = scene.add_child(
            group,
            SceneNode::new(
                "cube",
                NodeKind::Mesh(WireMesh {
                    geometry: box_wireframe(1.0, 1.0, 1.0),
                    material: line(),
                }),
            )
            .with_position(Vec3::new(0.0, 5.0, 0.0)),
        );
        let origin = scene.world_matrix(child).transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(10.0, 5.0, 0.0)).length() < 1e-5);
        assert_eq!(scene.node(child).parent(), Some(group));
        assert_eq!(scene.roots(), &[group]);
    }

    #[test]
    fn stats_count_points_and_meshes() {
        let mut rng = ScatterRng::seeded(1);
        let mut scene = Scene::new();
        let group = scene.add(SceneNode::group("group"));
        scene.add_child(
            group,
            SceneNode::new(
                "points",
                NodeKind::Points(PointCloud {
                    geometry: point_cloud(50, 10.0, &mut rng),
                    material: PointMaterial {
                        color: Vec3::ONE,
                        size: 1.0,
                        opacity: 1.0,
                    },
                }),
            ),
        );
        scene.add_child(
            group,
            SceneNode::new(
                "cube",
                NodeKind::Mesh(WireMesh {
                    geometry: box_wireframe(1.0, 1.0, 1.0),
                    material: line(),
                }),
            ),
        );
        let stats = scene.stats();
        assert_eq!(stats.top_level, 1);
        assert_eq!(stats.groups, 1);
        assert_eq!(stats.points, 50);
        assert_eq!(stats.primitives(), 51);

        scene.clear();
        assert_eq!(scene.stats(), SceneStats::default());
    }
}
