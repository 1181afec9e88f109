//! Polyhedron tables.
//!
//! Meshes are built from polygons: polygon boundaries become the wireframe
//! edges, and a fan triangulation becomes the solid faces. Every triangle is
//! wound so that `(b - a) x (c - a)` points away from the solid.

use std::collections::{HashMap, HashSet};
use std::f32::consts::TAU;
use std::sync::Arc;

use glam::Vec3;
use tracing::debug;

use crate::scene::Shape;

const SPHERE_SUBDIVISIONS: usize = 1;
const TORUS_MAJOR_SEGMENTS: usize = 24;
const TORUS_MINOR_SEGMENTS: usize = 12;
const KNOT_SEGMENTS: usize = 160;

/// A triangle plus flags marking which of its sides `(a,b)`, `(b,c)`, `(c,a)`
/// lie on the source polygon's boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub indices: [usize; 3],
    pub outline: [bool; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub edges: Vec<(usize, usize)>,
    /// Empty for curve-only shapes, which always render as wireframe.
    pub faces: Vec<Face>,
}

impl Mesh {
    pub fn build(shape: Shape, size: f32) -> Self {
        let radius = size.abs() * 0.5;
        match shape {
            Shape::Box => cube(radius),
            Shape::Sphere => icosphere(radius, SPHERE_SUBDIVISIONS),
            Shape::Icosahedron => {
                let vertices = icosahedron_vertices(radius);
                let polygons = triangles_between_nearest(&vertices);
                from_polygons(vertices, &polygons, |_| Vec3::ZERO)
            }
            Shape::Octahedron => {
                let vertices = vec![
                    Vec3::X * radius,
                    Vec3::NEG_X * radius,
                    Vec3::Y * radius,
                    Vec3::NEG_Y * radius,
                    Vec3::Z * radius,
                    Vec3::NEG_Z * radius,
                ];
                let polygons = triangles_between_nearest(&vertices);
                from_polygons(vertices, &polygons, |_| Vec3::ZERO)
            }
            Shape::Tetrahedron => {
                let vertices = [
                    Vec3::new(1.0, 1.0, 1.0),
                    Vec3::new(1.0, -1.0, -1.0),
                    Vec3::new(-1.0, 1.0, -1.0),
                    Vec3::new(-1.0, -1.0, 1.0),
                ]
                .map(|v| v.normalize() * radius)
                .to_vec();
                let polygons = triangles_between_nearest(&vertices);
                from_polygons(vertices, &polygons, |_| Vec3::ZERO)
            }
            Shape::Dodecahedron => dodecahedron(radius),
            Shape::Torus => torus(radius * 0.7, radius * 0.3),
            Shape::TorusKnot => torus_knot(radius / 3.0),
        }
    }

    pub fn is_curve(&self) -> bool {
        self.faces.is_empty()
    }
}

/// Fan-triangulates each polygon and orients the triangles away from the
/// point returned by `inside` for that polygon's centroid.
fn from_polygons(
    vertices: Vec<Vec3>,
    polygons: &[Vec<usize>],
    inside: impl Fn(Vec3) -> Vec3,
) -> Mesh {
    let mut edges = Vec::new();
    let mut seen = HashSet::new();
    let mut faces = Vec::new();

    for polygon in polygons {
        let n = polygon.len();
        for i in 0..n {
            let (a, b) = (polygon[i], polygon[(i + 1) % n]);
            if seen.insert((a.min(b), a.max(b))) {
                edges.push((a, b));
            }
        }

        let centroid = polygon.iter().map(|i| vertices[*i]).sum::<Vec3>() / n as f32;
        let outward = centroid - inside(centroid);
        for i in 1..n.saturating_sub(1) {
            let mut face = Face {
                indices: [polygon[0], polygon[i], polygon[i + 1]],
                outline: [i == 1, true, i + 2 == n],
            };
            let [a, b, c] = face.indices.map(|index| vertices[index]);
            if (b - a).cross(c - a).dot(outward) < 0.0 {
                // Swapping b and c reverses the winding; the sides become
                // (a,c), (c,b), (b,a).
                face.indices.swap(1, 2);
                face.outline = [face.outline[2], face.outline[1], face.outline[0]];
            }
            faces.push(face);
        }
    }

    Mesh {
        vertices,
        edges,
        faces,
    }
}

fn cube(half: f32) -> Mesh {
    let vertices = (0..8)
        .map(|i| {
            let pick = |bit: usize| if i & bit != 0 { half } else { -half };
            Vec3::new(pick(1), pick(2), pick(4))
        })
        .collect();
    let polygons = [
        vec![0, 2, 6, 4],
        vec![1, 3, 7, 5],
        vec![0, 1, 5, 4],
        vec![2, 3, 7, 6],
        vec![0, 1, 3, 2],
        vec![4, 5, 7, 6],
    ];
    from_polygons(vertices, &polygons, |_| Vec3::ZERO)
}

fn icosahedron_vertices(radius: f32) -> Vec<Vec3> {
    let phi = (1.0 + 5.0_f32.sqrt()) * 0.5;
    let mut vertices = Vec::with_capacity(12);
    for a in [-1.0, 1.0] {
        for b in [-phi, phi] {
            vertices.push(Vec3::new(a, b, 0.0));
            vertices.push(Vec3::new(0.0, a, b));
            vertices.push(Vec3::new(b, 0.0, a));
        }
    }
    vertices.into_iter().map(|v| v.normalize() * radius).collect()
}

/// All triangles whose three sides have the minimum vertex spacing. Yields
/// the faces of any regular solid with triangular faces.
fn triangles_between_nearest(vertices: &[Vec3]) -> Vec<Vec<usize>> {
    let mut shortest = f32::MAX;
    for i in 0..vertices.len() {
        for j in i + 1..vertices.len() {
            shortest = shortest.min(vertices[i].distance(vertices[j]));
        }
    }
    let tolerance = shortest * 1e-3;
    let adjacent = |i: usize, j: usize| (vertices[i].distance(vertices[j]) - shortest).abs() < tolerance;

    let mut triangles = Vec::new();
    for i in 0..vertices.len() {
        for j in i + 1..vertices.len() {
            if !adjacent(i, j) {
                continue;
            }
            for k in j + 1..vertices.len() {
                if adjacent(i, k) && adjacent(j, k) {
                    triangles.push(vec![i, j, k]);
                }
            }
        }
    }
    triangles
}

fn icosphere(radius: f32, subdivisions: usize) -> Mesh {
    let mut vertices = icosahedron_vertices(radius);
    let mut triangles: Vec<[usize; 3]> = triangles_between_nearest(&vertices)
        .into_iter()
        .map(|t| [t[0], t[1], t[2]])
        .collect();

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(usize, usize), usize> = HashMap::new();
        let mut midpoint = |a: usize, b: usize, vertices: &mut Vec<Vec3>| {
            *midpoints.entry((a.min(b), a.max(b))).or_insert_with(|| {
                vertices.push(((vertices[a] + vertices[b]) * 0.5).normalize() * radius);
                vertices.len() - 1
            })
        };

        let mut next = Vec::with_capacity(triangles.len() * 4);
        for [a, b, c] in triangles {
            let ab = midpoint(a, b, &mut vertices);
            let bc = midpoint(b, c, &mut vertices);
            let ca = midpoint(c, a, &mut vertices);
            next.extend([[a, ab, ca], [b, bc, ab], [c, ca, bc], [ab, bc, ca]]);
        }
        triangles = next;
    }

    let polygons: Vec<Vec<usize>> = triangles.iter().map(|t| t.to_vec()).collect();
    from_polygons(vertices, &polygons, |_| Vec3::ZERO)
}

/// Dual of the icosahedron: one vertex per icosahedron face, one pentagon per
/// icosahedron vertex.
fn dodecahedron(radius: f32) -> Mesh {
    let ico = icosahedron_vertices(1.0);
    let ico_faces = triangles_between_nearest(&ico);

    let vertices: Vec<Vec3> = ico_faces
        .iter()
        .map(|f| (ico[f[0]] + ico[f[1]] + ico[f[2]]).normalize() * radius)
        .collect();

    let polygons: Vec<Vec<usize>> = ico
        .iter()
        .enumerate()
        .map(|(corner, axis)| {
            let u = axis.any_orthonormal_vector();
            let w = axis.cross(u);
            let mut ring: Vec<usize> = ico_faces
                .iter()
                .enumerate()
                .filter(|(_, face)| face.contains(&corner))
                .map(|(index, _)| index)
                .collect();
            ring.sort_by(|a, b| {
                let angle = |i: usize| vertices[i].dot(w).atan2(vertices[i].dot(u));
                angle(*a).total_cmp(&angle(*b))
            });
            ring
        })
        .collect();

    from_polygons(vertices, &polygons, |_| Vec3::ZERO)
}

/// Torus around the Y axis. Quads are oriented away from the tube's centre
/// line rather than the origin.
fn torus(major: f32, minor: f32) -> Mesh {
    let index = |i: usize, j: usize| (i % TORUS_MAJOR_SEGMENTS) * TORUS_MINOR_SEGMENTS + j % TORUS_MINOR_SEGMENTS;

    let mut vertices = Vec::with_capacity(TORUS_MAJOR_SEGMENTS * TORUS_MINOR_SEGMENTS);
    for i in 0..TORUS_MAJOR_SEGMENTS {
        let theta = i as f32 / TORUS_MAJOR_SEGMENTS as f32 * TAU;
        for j in 0..TORUS_MINOR_SEGMENTS {
            let phi = j as f32 / TORUS_MINOR_SEGMENTS as f32 * TAU;
            let ring = major + minor * phi.cos();
            vertices.push(Vec3::new(ring * theta.cos(), minor * phi.sin(), ring * theta.sin()));
        }
    }

    let mut polygons = Vec::with_capacity(TORUS_MAJOR_SEGMENTS * TORUS_MINOR_SEGMENTS);
    for i in 0..TORUS_MAJOR_SEGMENTS {
        for j in 0..TORUS_MINOR_SEGMENTS {
            polygons.push(vec![
                index(i, j),
                index(i + 1, j),
                index(i + 1, j + 1),
                index(i, j + 1),
            ]);
        }
    }

    from_polygons(vertices, &polygons, |centroid| {
        let planar = Vec3::new(centroid.x, 0.0, centroid.z);
        planar.normalize_or_zero() * major
    })
}

/// (2,3) torus knot as a closed polyline.
fn torus_knot(scale: f32) -> Mesh {
    let (p, q) = (2.0, 3.0);
    let vertices: Vec<Vec3> = (0..KNOT_SEGMENTS)
        .map(|i| {
            let t = i as f32 / KNOT_SEGMENTS as f32 * TAU;
            let r = (q * t).cos() + 2.0;
            Vec3::new(r * (p * t).cos(), r * (p * t).sin(), -(q * t).sin()) * scale
        })
        .collect();
    let edges = (0..KNOT_SEGMENTS).map(|i| (i, (i + 1) % KNOT_SEGMENTS)).collect();

    Mesh {
        vertices,
        edges,
        faces: Vec::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryKey {
    shape: Shape,
    size_bits: u32,
}

impl GeometryKey {
    pub fn new(shape: Shape, size: f32) -> Self {
        Self {
            shape,
            size_bits: size.to_bits(),
        }
    }
}

/// Meshes shared by every layer asking for the same shape and size.
#[derive(Debug, Default)]
pub struct GeometryCache {
    meshes: HashMap<GeometryKey, Arc<Mesh>>,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(&mut self, shape: Shape, size: f32) -> Arc<Mesh> {
        self.meshes
            .entry(GeometryKey::new(shape, size))
            .or_insert_with(|| {
                debug!(?shape, size, "building geometry");
                Arc::new(Mesh::build(shape, size))
            })
            .clone()
    }

    /// Drops meshes whose key is not in `keep`.
    pub fn retain(&mut self, keep: &HashSet<GeometryKey>) {
        self.meshes.retain(|key, _| keep.contains(key));
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_outward(mesh: &Mesh, inside: impl Fn(Vec3) -> Vec3) {
        for face in &mesh.faces {
            let [a, b, c] = face.indices.map(|i| mesh.vertices[i]);
            let centroid = (a + b + c) / 3.0;
            let normal = (b - a).cross(c - a);
            assert!(normal.dot(centroid - inside(centroid)) > 0.0, "{face:?}");
        }
    }

    #[test]
    fn solids_have_expected_counts() {
        let cases = [
            (Shape::Box, 8, 12, 12),
            (Shape::Tetrahedron, 4, 6, 4),
            (Shape::Octahedron, 6, 12, 8),
            (Shape::Icosahedron, 12, 30, 20),
            (Shape::Dodecahedron, 20, 30, 36),
            (Shape::Sphere, 42, 120, 80),
        ];

        for (shape, vertices, edges, faces) in cases {
            let mesh = Mesh::build(shape, 100.0);
            assert_eq!(mesh.vertices.len(), vertices, "{shape:?}");
            assert_eq!(mesh.edges.len(), edges, "{shape:?}");
            assert_eq!(mesh.faces.len(), faces, "{shape:?}");
            assert_outward(&mesh, |_| Vec3::ZERO);
        }
    }

    #[test]
    fn cube_spans_half_size() {
        let mesh = Mesh::build(Shape::Box, 100.0);
        for v in &mesh.vertices {
            assert_eq!(v.abs(), Vec3::splat(50.0));
        }
        // Quads keep their diagonal out of the outline.
        let outline_sides: usize = mesh
            .faces
            .iter()
            .map(|face| face.outline.iter().filter(|side| **side).count())
            .sum();
        assert_eq!(outline_sides, 24);
    }

    #[test]
    fn torus_faces_point_away_from_tube() {
        let mesh = Mesh::build(Shape::Torus, 100.0);
        assert_eq!(mesh.faces.len(), TORUS_MAJOR_SEGMENTS * TORUS_MINOR_SEGMENTS * 2);
        assert_outward(&mesh, |c| Vec3::new(c.x, 0.0, c.z).normalize() * 35.0);
    }

    #[test]
    fn torus_knot_is_a_closed_curve() {
        let mesh = Mesh::build(Shape::TorusKnot, 90.0);
        assert!(mesh.is_curve());
        assert_eq!(mesh.edges.len(), mesh.vertices.len());
        assert_eq!(mesh.edges.last(), Some(&(KNOT_SEGMENTS - 1, 0)));
    }

    #[test]
    fn cache_shares_entries_by_shape_and_size() {
        let mut cache = GeometryCache::new();
        let a = cache.get_or_build(Shape::Box, 100.0);
        let b = cache.get_or_build(Shape::Box, 100.0);
        let _ = cache.get_or_build(Shape::Box, 50.0);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);

        let keep = HashSet::from([GeometryKey::new(Shape::Box, 50.0)]);
        cache.retain(&keep);
        assert_eq!(cache.len(), 1);
    }
}
