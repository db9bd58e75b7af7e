//! Wavefront OBJ mesh writer.

use std::io::Write;

use crate::error::{ReconError, Result};
use crate::mesh::TriangleMesh;

/// Writes a mesh as OBJ text.
///
/// Emits `v` lines, `vn` lines when the mesh carries normals, and 1-based `f`
/// lines (`a//an` form when normals exist). OBJ has no standard per-vertex
/// color representation, so colors are not emitted.
///
/// # Errors
///
/// Returns an error if the mesh is empty or writing fails.
pub fn write_mesh<W: Write>(writer: &mut W, mesh: &TriangleMesh) -> Result<()> {
    if mesh.is_empty() {
        return Err(ReconError::EmptyMesh);
    }

    for v in &mesh.vertices {
        writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
    }

    if let Some(normals) = &mesh.normals {
        for n in normals {
            writeln!(writer, "vn {} {} {}", n.x, n.y, n.z)?;
        }
        for &[a, b, c] in &mesh.faces {
            writeln!(
                writer,
                "f {}//{} {}//{} {}//{}",
                a + 1,
                a + 1,
                b + 1,
                b + 1,
                c + 1,
                c + 1
            )?;
        }
    } else {
        for &[a, b, c] in &mesh.faces {
            writeln!(writer, "f {} {} {}", a + 1, b + 1, c + 1)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn triangle_mesh() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
    }

    #[test]
    fn bare_mesh_uses_plain_face_lines() {
        let mut buf = Vec::new();
        write_mesh(&mut buf, &triangle_mesh()).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("v 0 0 0"));
        assert!(text.contains("f 1 2 3"));
        assert!(!text.contains("vn"));
    }

    #[test]
    fn normals_switch_to_slashed_faces() {
        let mut mesh = triangle_mesh();
        mesh.compute_vertex_normals();

        let mut buf = Vec::new();
        write_mesh(&mut buf, &mesh).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("vn 0 0 1"));
        assert!(text.contains("f 1//1 2//2 3//3"));
    }

    #[test]
    fn empty_mesh_is_rejected() {
        let mut buf = Vec::new();
        assert!(matches!(
            write_mesh(&mut buf, &TriangleMesh::new()),
            Err(ReconError::EmptyMesh)
        ));
    }
}
