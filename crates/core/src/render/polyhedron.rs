//! Software 3D for geometry layers: rotate, project, cull, depth sort, shade.
//!
//! Coordinates are x right, y down and z away from the viewer, who sits at
//! `z = -focal`. A point projects with `scale = focal / (focal + z)`. Faces
//! whose outward normal points away from the viewer (`normal.z > 0`) are
//! culled and the rest are painted farthest first.

use glam::Vec3;

use super::geometry::Mesh;
use crate::{
    scene::{Color, Geometry3D, Material, Shading},
    surface::{Paint, Path, Surface},
};

/// Extra rotation per axis, as a multiple of `level * reactive_gain` degrees.
const REACTIVE_WEIGHTS: Vec3 = Vec3::new(1.0, 0.7, 0.4);
const SMOOTH_BOOST: f32 = 1.1;
const MIN_DEPTH: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedFace {
    pub indices: [usize; 3],
    pub outline: [bool; 3],
    /// Mean view-space z of the three corners.
    pub depth: f32,
    pub color: Color,
}

/// Buffers reused from frame to frame.
#[derive(Debug, Default)]
pub struct Projection {
    rotated: Vec<Vec3>,
    projected: Vec<(f32, f32)>,
    faces: Vec<ProjectedFace>,
    path: Path,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Screen-space vertex positions relative to the layer origin.
    pub fn projected(&self) -> &[(f32, f32)] {
        &self.projected
    }

    /// Visible faces in paint order.
    pub fn faces(&self) -> &[ProjectedFace] {
        &self.faces
    }

    /// Rotates by `angles` (radians, applied X then Y then Z) and projects.
    pub fn transform(&mut self, mesh: &Mesh, angles: Vec3, focal: f32) {
        let (sx, cx) = angles.x.sin_cos();
        let (sy, cy) = angles.y.sin_cos();
        let (sz, cz) = angles.z.sin_cos();

        self.rotated.clear();
        self.projected.clear();
        for v in &mesh.vertices {
            let (y, z) = (v.y * cx - v.z * sx, v.y * sx + v.z * cx);
            let (x, z) = (v.x * cy + z * sy, -v.x * sy + z * cy);
            let (x, y) = (x * cz - y * sz, x * sz + y * cz);
            let p = Vec3::new(x, y, z);

            let scale = focal / (focal + p.z).max(MIN_DEPTH);
            self.rotated.push(p);
            self.projected.push((p.x * scale, p.y * scale));
        }
    }

    /// Culls back faces, shades the rest and sorts them farthest first.
    pub fn collect_faces(&mut self, mesh: &Mesh, material: Material, shading: Shading, base: Color) {
        self.faces.clear();
        for face in &mesh.faces {
            let [a, b, c] = face.indices.map(|i| self.rotated[i]);
            let normal = (b - a).cross(c - a);
            if -normal.z < 0.0 {
                continue;
            }
            let normal = normal.normalize_or_zero();
            self.faces.push(ProjectedFace {
                indices: face.indices,
                outline: face.outline,
                depth: (a.z + b.z + c.z) / 3.0,
                color: shade(material, shading, base, normal),
            });
        }
        self.faces.sort_by(|a, b| b.depth.total_cmp(&a.depth));
    }
}

/// Total rotation in radians for a frame with average amplitude `level`.
pub fn rotation_angles(layer: &Geometry3D, level: f32) -> Vec3 {
    let base = Vec3::new(layer.rotation_x, layer.rotation_y, layer.rotation_z);
    let extra = REACTIVE_WEIGHTS * (level * layer.reactive_gain);
    Vec3::new(
        (base.x + extra.x).to_radians(),
        (base.y + extra.y).to_radians(),
        (base.z + extra.z).to_radians(),
    )
}

/// Unit vector toward the light: up, left and toward the viewer.
fn light_direction() -> Vec3 {
    Vec3::new(-0.4, -0.6, -1.0).normalize()
}

fn shade(material: Material, shading: Shading, base: Color, normal: Vec3) -> Color {
    let diffuse = normal.dot(light_direction()).max(0.0);
    let facing = (-normal.z).max(0.0);
    let intensity = match material {
        Material::Basic => 1.0,
        Material::Lambert => 0.3 + 0.7 * diffuse,
        Material::Phong => 0.2 + 0.7 * diffuse + 0.6 * facing.powi(32),
        Material::Standard => 0.25 + 0.65 * diffuse + 0.25 * facing.powi(8),
        Material::Normal => {
            let channel = |v: f32| ((v * 0.5 + 0.5) * 255.0).round().clamp(0.0, 255.0) as u8;
            return Color::rgba(channel(normal.x), channel(normal.y), channel(normal.z), base.a);
        }
    };
    let intensity = match shading {
        Shading::Flat => intensity,
        Shading::Smooth => intensity * SMOOTH_BOOST,
    };
    base.scaled(intensity)
}

pub(super) fn draw<S: Surface + ?Sized>(
    surface: &mut S,
    layer: &Geometry3D,
    mesh: &Mesh,
    level: f32,
    focal: f32,
    projection: &mut Projection,
) {
    projection.transform(mesh, rotation_angles(layer, level), focal);

    if layer.wireframe || mesh.is_curve() {
        projection.path.clear();
        for &(a, b) in &mesh.edges {
            let (ax, ay) = projection.projected[a];
            let (bx, by) = projection.projected[b];
            projection.path.move_to(ax, ay).line_to(bx, by);
        }
        surface.stroke_path(&projection.path, &Paint::Solid(layer.color), layer.line_width);
        return;
    }

    projection.collect_faces(mesh, layer.material, layer.shading, layer.color);
    let edge_paint = Paint::Solid(layer.edge_color);
    for face in &projection.faces {
        let [a, b, c] = face.indices.map(|i| projection.projected[i]);
        projection.path.clear();
        projection
            .path
            .move_to(a.0, a.1)
            .line_to(b.0, b.1)
            .line_to(c.0, c.1)
            .close();
        surface.fill_path(&projection.path, &Paint::Solid(face.color));

        if layer.show_edges {
            projection.path.clear();
            let corners = [a, b, c];
            for side in 0..3 {
                if face.outline[side] {
                    let (from, to) = (corners[side], corners[(side + 1) % 3]);
                    projection.path.move_to(from.0, from.1).line_to(to.0, to.1);
                }
            }
            if !projection.path.is_empty() {
                surface.stroke_path(&projection.path, &edge_paint, layer.line_width);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        scene::Shape,
        surface::{DrawOp, RecordingSurface},
    };

    fn unrotated() -> Geometry3D {
        Geometry3D {
            rotation_x: 0.0,
            rotation_y: 0.0,
            rotation_z: 0.0,
            ..Geometry3D::default()
        }
    }

    #[test]
    fn cube_projects_with_focal_scale() {
        let mesh = Mesh::build(Shape::Box, 100.0);
        let mut projection = Projection::new();
        projection.transform(&mesh, Vec3::ZERO, 400.0);

        for (v, (x, y)) in mesh.vertices.iter().zip(projection.projected()) {
            let scale = 400.0 / (400.0 + v.z);
            assert_relative_eq!(*x, v.x * scale, epsilon = 1e-4);
            assert_relative_eq!(*y, v.y * scale, epsilon = 1e-4);
        }
        // Front corners at z = -50 project outward by 400 / 350.
        let front = projection.projected()[0];
        assert_relative_eq!(front.0, -50.0 * 400.0 / 350.0, epsilon = 1e-4);
    }

    #[test]
    fn axis_aligned_cube_culls_back_face() {
        let mesh = Mesh::build(Shape::Box, 100.0);
        let mut projection = Projection::new();
        projection.transform(&mesh, Vec3::ZERO, 400.0);
        projection.collect_faces(&mesh, Material::Basic, Shading::Flat, Color::WHITE);

        // Side faces are edge-on (normal.z == 0) and survive culling; the back
        // face at z = 50 does not.
        assert_eq!(projection.faces().len(), 10);
        assert!(projection
            .faces()
            .iter()
            .any(|face| face.depth == -50.0));
        assert!(projection.faces().iter().all(|face| face.depth < 50.0));
    }

    #[test]
    fn faces_are_painted_farthest_first() {
        for shape in [Shape::Box, Shape::Sphere, Shape::Torus, Shape::Dodecahedron] {
            let mesh = Mesh::build(shape, 120.0);
            let mut projection = Projection::new();
            projection.transform(&mesh, Vec3::new(0.3, 0.7, 0.2), 400.0);
            projection.collect_faces(&mesh, Material::Standard, Shading::Flat, Color::WHITE);

            assert!(!projection.faces().is_empty());
            for pair in projection.faces().windows(2) {
                assert!(pair[0].depth >= pair[1].depth, "{shape:?}");
            }
        }
    }

    #[test]
    fn convex_solids_cull_about_half() {
        let mesh = Mesh::build(Shape::Icosahedron, 100.0);
        let mut projection = Projection::new();
        projection.transform(&mesh, Vec3::new(0.4, 0.9, 0.1), 400.0);
        projection.collect_faces(&mesh, Material::Basic, Shading::Flat, Color::WHITE);

        let visible = projection.faces().len();
        assert!((6..=14).contains(&visible), "{visible}");
    }

    #[test]
    fn reactive_gain_adds_weighted_rotation() {
        let layer = Geometry3D {
            reactive_gain: 10.0,
            ..unrotated()
        };
        let angles = rotation_angles(&layer, 0.5);

        assert_relative_eq!(angles.x, 5.0_f32.to_radians(), epsilon = 1e-6);
        assert_relative_eq!(angles.y, 3.5_f32.to_radians(), epsilon = 1e-6);
        assert_relative_eq!(angles.z, 2.0_f32.to_radians(), epsilon = 1e-6);
    }

    #[test]
    fn materials_shade_differently() {
        let base = Color::rgb(200, 200, 200);
        let lit = Vec3::new(0.0, 0.0, -1.0);

        assert_eq!(shade(Material::Basic, Shading::Flat, base, lit), base);
        let lambert = shade(Material::Lambert, Shading::Flat, base, lit);
        let smooth = shade(Material::Lambert, Shading::Smooth, base, lit);
        assert!(lambert.r < base.r);
        assert!(smooth.r > lambert.r);

        let normal = shade(Material::Normal, Shading::Flat, base, lit);
        assert_eq!((normal.r, normal.g, normal.b), (128, 128, 0));
    }

    #[test]
    fn wireframe_is_one_stroke() {
        let mesh = Mesh::build(Shape::Box, 100.0);
        let mut projection = Projection::new();
        let mut surface = RecordingSurface::new(200, 200);
        let layer = Geometry3D {
            wireframe: true,
            ..unrotated()
        };

        draw(&mut surface, &layer, &mesh, 0.0, 400.0, &mut projection);

        assert_eq!(surface.calls().len(), 1);
        let DrawOp::StrokePath { path, .. } = &surface.calls()[0].op else {
            panic!("expected a stroke");
        };
        assert_eq!(path.contour_count(), 12);
    }

    #[test]
    fn edges_follow_each_visible_face() {
        let mesh = Mesh::build(Shape::Tetrahedron, 100.0);
        let mut projection = Projection::new();
        let mut surface = RecordingSurface::new(200, 200);
        let layer = Geometry3D {
            show_edges: true,
            ..Geometry3D::default()
        };

        draw(&mut surface, &layer, &mesh, 0.0, 400.0, &mut projection);

        let fills = surface
            .calls()
            .iter()
            .filter(|call| matches!(call.op, DrawOp::FillPath { .. }))
            .count();
        let strokes = surface.calls().len() - fills;
        assert_eq!(fills, projection.faces().len());
        assert_eq!(strokes, fills);
    }
}
