use std::collections::BTreeSet;

use glam::Vec3;

use crate::rng::ScatterRng;

/// Vertex positions plus the edges drawn for wireframe rendering.
///
/// Point clouds leave `edges` empty. `revision` is bumped whenever positions
/// change after construction so GPU backends know to re-upload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
    pub edges: Vec<[u32; 2]>,
    revision: u64,
}

impl Geometry {
    pub fn new(positions: Vec<Vec3>, edges: Vec<[u32; 2]>) -> Self {
        Self {
            positions,
            edges,
            revision: 0,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Flags the positions as modified.
    pub fn mark_dirty(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

/// Axis-aligned box centered on the origin, 12 edges.
pub fn box_wireframe(width: f32, height: f32, depth: f32) -> Geometry {
    let (hx, hy, hz) = (width * 0.5, height * 0.5, depth * 0.5);
    let positions = vec![
        Vec3::new(-hx, -hy, -hz),
        Vec3::new(hx, -hy, -hz),
        Vec3::new(hx, hy, -hz),
        Vec3::new(-hx, hy, -hz),
        Vec3::new(-hx, -hy, hz),
        Vec3::new(hx, -hy, hz),
        Vec3::new(hx, hy, hz),
        Vec3::new(-hx, hy, hz),
    ];
    // Back face, front face, then the four connecting sides.
    let edges = vec![
        [0, 1],
        [1, 2],
        [2, 3],
        [3, 0],
        [4, 5],
        [5, 6],
        [6, 7],
        [7, 4],
        [0, 4],
        [1, 5],
        [2, 6],
        [3, 7],
    ];
    Geometry::new(positions, edges)
}

pub fn tetrahedron(radius: f32) -> Geometry {
    let vertices = [
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(-1.0, -1.0, 1.0),
        Vec3::new(-1.0, 1.0, -1.0),
        Vec3::new(1.0, -1.0, -1.0),
    ];
    let faces = [[2, 1, 0], [0, 3, 2], [1, 3, 0], [2, 3, 1]];
    polyhedron(&vertices, &faces, radius)
}

pub fn octahedron(radius: f32) -> Geometry {
    let vertices = [
        Vec3::X,
        Vec3::NEG_X,
        Vec3::Y,
        Vec3::NEG_Y,
        Vec3::Z,
        Vec3::NEG_Z,
    ];
    let faces = [
        [0, 2, 4],
        [0, 4, 3],
        [0, 3, 5],
        [0, 5, 2],
        [1, 2, 5],
        [1, 5, 3],
        [1, 3, 4],
        [1, 4, 2],
    ];
    polyhedron(&vertices, &faces, radius)
}

pub fn icosahedron(radius: f32) -> Geometry {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let vertices = [
        Vec3::new(-1.0, t, 0.0),
        Vec3::new(1.0, t, 0.0),
        Vec3::new(-1.0, -t, 0.0),
        Vec3::new(1.0, -t, 0.0),
        Vec3::new(0.0, -1.0, t),
        Vec3::new(0.0, 1.0, t),
        Vec3::new(0.0, -1.0, -t),
        Vec3::new(0.0, 1.0, -t),
        Vec3::new(t, 0.0, -1.0),
        Vec3::new(t, 0.0, 1.0),
        Vec3::new(-t, 0.0, -1.0),
        Vec3::new(-t, 0.0, 1.0),
    ];
    let faces = [
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];
    polyhedron(&vertices, &faces, radius)
}

/// Projects the vertices onto a sphere of `radius` and keeps each shared edge once.
fn polyhedron(vertices: &[Vec3], faces: &[[u32; 3]], radius: f32) -> Geometry {
    let positions = vertices.iter().map(|v| v.normalize() * radius).collect();
    let mut edges = BTreeSet::new();
    for [a, b, c] in faces.iter().copied() {
        for (from, to) in [(a, b), (b, c), (c, a)] {
            edges.insert([from.min(to), from.max(to)]);
        }
    }
    Geometry::new(positions, edges.into_iter().collect())
}

/// Subdivided plane in the XY plane, centered on the origin.
///
/// Vertices run row by row from `+y` to `-y`, left to right. Each cell
/// contributes its top and left edges plus one diagonal, matching a
/// triangulated wireframe.
pub fn plane_grid(width: f32, height: f32, segments_x: u32, segments_y: u32) -> Geometry {
    let segments_x = segments_x.max(1);
    let segments_y = segments_y.max(1);
    let columns = segments_x + 1;
    let rows = segments_y + 1;
    let cell_w = width / segments_x as f32;
    let cell_h = height / segments_y as f32;

    let mut positions = Vec::with_capacity((columns * rows) as usize);
    for row in 0..rows {
        let y = height * 0.5 - row as f32 * cell_h;
        for column in 0..columns {
            let x = column as f32 * cell_w - width * 0.5;
            positions.push(Vec3::new(x, y, 0.0));
        }
    }

    let index = |column: u32, row: u32| row * columns + column;
    let mut edges = Vec::new();
    for row in 0..rows {
        for column in 0..columns {
            if column + 1 < columns {
                edges.push([index(column, row), index(column + 1, row)]);
            }
            if row + 1 < rows {
                edges.push([index(column, row), index(column, row + 1)]);
            }
            if column + 1 < columns && row + 1 < rows {
                edges.push([index(column + 1, row), index(column, row + 1)]);
            }
        }
    }
    Geometry::new(positions, edges)
}

/// `count` points scattered uniformly in a cube of side `extent`.
pub fn point_cloud(count: usize, extent: f32, rng: &mut ScatterRng) -> Geometry {
    let positions = (0..count).map(|_| rng.point_in_cube(extent)).collect();
    Geometry::new(positions, Vec::new())
}
