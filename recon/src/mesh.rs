//! Triangle mesh container and cleanup passes.
//!
//! Reconstruction engines emit raw meshes that may reference every input point,
//! repeat faces discovered from both sides of an edge, or contain slivers. The
//! cleanup passes here bring such a mesh into a form suitable for export.

use std::collections::{HashMap, HashSet};

use nalgebra::{Point3, Vector3};

/// Faces with squared area below this are considered degenerate.
const DEGENERATE_AREA_SQ: f64 = 1e-24;

/// An indexed triangle mesh with optional per-vertex attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub vertices: Vec<Point3<f64>>,

    /// Triangles as indices into `vertices`.
    pub faces: Vec<[usize; 3]>,

    /// Per-vertex unit normals, if computed.
    pub normals: Option<Vec<Vector3<f64>>>,

    /// Per-vertex RGB colors, if known.
    pub colors: Option<Vec<[u8; 3]>>,
}

impl TriangleMesh {
    /// Creates an empty mesh.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            normals: None,
            colors: None,
        }
    }

    /// Creates a mesh from vertices and faces, without attributes.
    #[must_use]
    pub const fn from_vertices_and_faces(
        vertices: Vec<Point3<f64>>,
        faces: Vec<[usize; 3]>,
    ) -> Self {
        Self {
            vertices,
            faces,
            normals: None,
            colors: None,
        }
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Returns true when the mesh has no faces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Unit normal of face `i`, or `None` for degenerate faces.
    #[must_use]
    pub fn face_normal(&self, i: usize) -> Option<Vector3<f64>> {
        let [a, b, c] = *self.faces.get(i)?;
        let e1 = self.vertices[b] - self.vertices[a];
        let e2 = self.vertices[c] - self.vertices[a];
        let n = e1.cross(&e2);
        let len = n.norm();
        if len < 1e-12 { None } else { Some(n / len) }
    }

    /// Merges vertices that share the exact same coordinates, remapping faces.
    pub fn remove_duplicate_vertices(&mut self) {
        let mut seen: HashMap<[u64; 3], usize> = HashMap::new();
        let mut remap = vec![0usize; self.vertices.len()];
        let mut kept_vertices = Vec::with_capacity(self.vertices.len());
        let mut kept_normals = self.normals.as_ref().map(|_| Vec::new());
        let mut kept_colors = self.colors.as_ref().map(|_| Vec::new());

        for (i, v) in self.vertices.iter().enumerate() {
            let key = [v.x.to_bits(), v.y.to_bits(), v.z.to_bits()];
            match seen.get(&key) {
                Some(&existing) => remap[i] = existing,
                None => {
                    let new_idx = kept_vertices.len();
                    seen.insert(key, new_idx);
                    remap[i] = new_idx;
                    kept_vertices.push(*v);
                    if let (Some(kept), Some(normals)) = (&mut kept_normals, &self.normals) {
                        kept.push(normals[i]);
                    }
                    if let (Some(kept), Some(colors)) = (&mut kept_colors, &self.colors) {
                        kept.push(colors[i]);
                    }
                }
            }
        }

        for face in &mut self.faces {
            *face = [remap[face[0]], remap[face[1]], remap[face[2]]];
        }
        self.vertices = kept_vertices;
        self.normals = kept_normals;
        self.colors = kept_colors;
    }

    /// Drops faces that reference the same vertex set as an earlier face,
    /// regardless of winding.
    pub fn remove_duplicate_faces(&mut self) {
        let mut seen: HashSet<[usize; 3]> = HashSet::new();
        self.faces.retain(|face| {
            let mut key = *face;
            key.sort_unstable();
            seen.insert(key)
        });
    }

    /// Drops faces with repeated indices or near-zero area.
    pub fn remove_degenerate_faces(&mut self) {
        let vertices = &self.vertices;
        self.faces.retain(|&[a, b, c]| {
            if a == b || b == c || a == c {
                return false;
            }
            let e1 = vertices[b] - vertices[a];
            let e2 = vertices[c] - vertices[a];
            e1.cross(&e2).norm_squared() > DEGENERATE_AREA_SQ
        });
    }

    /// Drops vertices referenced by no face, remapping faces and attributes.
    pub fn remove_unreferenced_vertices(&mut self) {
        let mut referenced = vec![false; self.vertices.len()];
        for face in &self.faces {
            for &idx in face {
                referenced[idx] = true;
            }
        }

        let mut remap = vec![usize::MAX; self.vertices.len()];
        let mut kept = 0usize;
        for (i, used) in referenced.iter().enumerate() {
            if *used {
                remap[i] = kept;
                kept += 1;
            }
        }

        let mut next = 0usize;
        self.vertices.retain(|_| {
            let keep = referenced[next];
            next += 1;
            keep
        });
        if let Some(normals) = &mut self.normals {
            let mut next = 0usize;
            normals.retain(|_| {
                let keep = referenced[next];
                next += 1;
                keep
            });
        }
        if let Some(colors) = &mut self.colors {
            let mut next = 0usize;
            colors.retain(|_| {
                let keep = referenced[next];
                next += 1;
                keep
            });
        }

        for face in &mut self.faces {
            *face = [remap[face[0]], remap[face[1]], remap[face[2]]];
        }
    }

    /// Runs all cleanup passes in order: duplicate vertices, duplicate faces,
    /// degenerate faces, unreferenced vertices.
    pub fn cleanup(&mut self) {
        self.remove_duplicate_vertices();
        self.remove_duplicate_faces();
        self.remove_degenerate_faces();
        self.remove_unreferenced_vertices();
    }

    /// Computes per-vertex normals by accumulating area-weighted face normals.
    ///
    /// The unnormalized cross product of two face edges has magnitude equal to
    /// twice the face area, so summing raw cross products weights each face by
    /// its area. Vertices touched by no face get +Z.
    pub fn compute_vertex_normals(&mut self) {
        let mut accum = vec![Vector3::zeros(); self.vertices.len()];

        for &[a, b, c] in &self.faces {
            let e1 = self.vertices[b] - self.vertices[a];
            let e2 = self.vertices[c] - self.vertices[a];
            let n = e1.cross(&e2);
            accum[a] += n;
            accum[b] += n;
            accum[c] += n;
        }

        let normals = accum
            .into_iter()
            .map(|n| {
                let len = n.norm();
                if len < 1e-12 { Vector3::z() } else { n / len }
            })
            .collect();
        self.normals = Some(normals);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quad_mesh() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn face_normal_of_ccw_triangle_points_up() {
        let mesh = quad_mesh();
        let n = mesh.face_normal(0).unwrap();
        assert_relative_eq!(n.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn face_normal_degenerate_is_none() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        assert!(mesh.face_normal(0).is_none());
    }

    #[test]
    fn remove_duplicate_vertices_merges_and_remaps() {
        let mut mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
                Point3::new(1.0, 0.0, 0.0), // duplicate of vertex 1
                Point3::new(1.5, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [3, 4, 2]],
        );
        mesh.remove_duplicate_vertices();

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.faces[1][0], 1);
    }

    #[test]
    fn remove_duplicate_faces_ignores_winding() {
        let mut mesh = quad_mesh();
        mesh.faces.push([2, 1, 0]);
        mesh.remove_duplicate_faces();
        assert_eq!(mesh.face_count(), 2);
    }

    #[test]
    fn remove_degenerate_faces_drops_slivers() {
        let mut mesh = quad_mesh();
        mesh.faces.push([0, 0, 1]);
        mesh.vertices.push(Point3::new(2.0, 0.0, 0.0));
        mesh.faces.push([0, 1, 4]); // collinear with the x axis
        mesh.remove_degenerate_faces();
        assert_eq!(mesh.face_count(), 2);
    }

    #[test]
    fn remove_unreferenced_vertices_remaps_attributes() {
        let mut mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(9.0, 9.0, 9.0), // unreferenced
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
            ],
            vec![[0, 2, 3]],
        );
        mesh.colors = Some(vec![[1, 1, 1], [2, 2, 2], [3, 3, 3], [4, 4, 4]]);
        mesh.remove_unreferenced_vertices();

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.faces[0], [0, 1, 2]);
        assert_eq!(mesh.colors.as_ref().unwrap().as_slice(), &[[1, 1, 1], [3, 3, 3], [4, 4, 4]]);
    }

    #[test]
    fn compute_vertex_normals_flat_quad() {
        let mut mesh = quad_mesh();
        mesh.compute_vertex_normals();

        let normals = mesh.normals.unwrap();
        assert_eq!(normals.len(), 4);
        for n in normals {
            assert_relative_eq!(n.z, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn cleanup_runs_all_passes() {
        let mut mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
                Point3::new(0.5, 1.0, 0.0), // duplicate of vertex 2
                Point3::new(7.0, 7.0, 7.0), // unreferenced
            ],
            vec![[0, 1, 2], [0, 1, 3], [1, 1, 2]],
        );
        mesh.cleanup();

        assert_eq!(mesh.face_count(), 1);
        assert_eq!(mesh.vertex_count(), 3);
    }
}
