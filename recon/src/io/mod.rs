//! Point cloud and mesh encoding.

use std::io::Write;
use std::str::FromStr;

use crate::error::{ReconError, Result};
use crate::mesh::TriangleMesh;

pub mod obj;
pub mod ply;
pub mod stl;

/// Supported mesh output encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    /// ASCII PLY with normals and colors when present.
    Ply,
    /// Wavefront OBJ (positions and normals).
    Obj,
    /// Binary STL (positions only; normals are recomputed per face).
    Stl,
}

impl MeshFormat {
    /// File extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Ply => "ply",
            Self::Obj => "obj",
            Self::Stl => "stl",
        }
    }

    /// MIME type for HTTP responses.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Ply => "application/octet-stream",
            Self::Obj => "model/obj",
            Self::Stl => "model/stl",
        }
    }
}

impl FromStr for MeshFormat {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ply" => Ok(Self::Ply),
            "obj" => Ok(Self::Obj),
            "stl" => Ok(Self::Stl),
            other => Err(ReconError::UnsupportedFormat {
                format: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for MeshFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Encodes a mesh in the given format.
///
/// # Errors
///
/// Returns an error if the mesh is empty or writing fails.
pub fn write_mesh<W: Write>(writer: &mut W, mesh: &TriangleMesh, format: MeshFormat) -> Result<()> {
    match format {
        MeshFormat::Ply => ply::write_mesh(writer, mesh),
        MeshFormat::Obj => obj::write_mesh(writer, mesh),
        MeshFormat::Stl => stl::write_mesh(writer, mesh),
    }
}
