//! Binary STL mesh writer.
//!
//! Layout: an 80-byte header, a little-endian `u32` triangle count, then one
//! 50-byte record per triangle (normal and three vertices as f32 triples,
//! followed by a two-byte attribute word).

use std::io::Write;

use nalgebra::Vector3;

use crate::error::{ReconError, Result};
use crate::mesh::TriangleMesh;

/// Writes a mesh as binary STL.
///
/// STL carries no shared vertices or per-vertex attributes; face normals are
/// recomputed from the winding (degenerate faces get a zero normal).
///
/// # Errors
///
/// Returns an error if the mesh is empty, has more than `u32::MAX` faces, or
/// writing fails.
pub fn write_mesh<W: Write>(writer: &mut W, mesh: &TriangleMesh) -> Result<()> {
    if mesh.is_empty() {
        return Err(ReconError::EmptyMesh);
    }
    let count = u32::try_from(mesh.faces.len()).map_err(|_| ReconError::InvalidParameter {
        reason: "mesh has too many faces for STL".to_string(),
    })?;

    writer.write_all(&[0u8; 80])?;
    writer.write_all(&count.to_le_bytes())?;

    for (i, &[a, b, c]) in mesh.faces.iter().enumerate() {
        let normal = mesh.face_normal(i).unwrap_or_else(Vector3::zeros);
        write_vector(writer, normal.x, normal.y, normal.z)?;
        for idx in [a, b, c] {
            let v = mesh.vertices[idx];
            write_vector(writer, v.x, v.y, v.z)?;
        }
        writer.write_all(&0u16.to_le_bytes())?;
    }

    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
fn write_vector<W: Write>(writer: &mut W, x: f64, y: f64, z: f64) -> Result<()> {
    writer.write_all(&(x as f32).to_le_bytes())?;
    writer.write_all(&(y as f32).to_le_bytes())?;
    writer.write_all(&(z as f32).to_le_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn binary_layout() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );

        let mut buf = Vec::new();
        write_mesh(&mut buf, &mesh).unwrap();

        // 80-byte header + 4-byte count + one 50-byte record.
        assert_eq!(buf.len(), 134);
        assert_eq!(u32::from_le_bytes(buf[80..84].try_into().unwrap()), 1);

        // Face normal of the CCW triangle is +Z.
        let nz = f32::from_le_bytes(buf[92..96].try_into().unwrap());
        assert!((nz - 1.0).abs() < 1e-6);

        // First vertex follows the normal.
        let vx = f32::from_le_bytes(buf[96..100].try_into().unwrap());
        assert!((vx - 0.0).abs() < 1e-6);

        // Attribute word is zero.
        assert_eq!(&buf[132..134], &[0, 0]);
    }

    #[test]
    fn record_count_matches_faces() {
        let mesh = TriangleMesh::from_vertices_and_faces(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        );

        let mut buf = Vec::new();
        write_mesh(&mut buf, &mesh).unwrap();
        assert_eq!(buf.len(), 84 + 2 * 50);
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
