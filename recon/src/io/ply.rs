//! PLY encoding and decoding via `ply-rs`.

use std::io::{BufRead, Write};

use nalgebra::{Point3, Vector3};
use ply_rs::{
    parser::Parser,
    ply::{
        Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
        ScalarType,
    },
    writer::Writer,
};

use crate::cloud::{CloudPoint, PointCloud};
use crate::error::{ReconError, Result};
use crate::mesh::TriangleMesh;

/// Reads a point cloud from PLY data.
///
/// Requires `x`/`y`/`z` vertex properties; picks up `nx`/`ny`/`nz` normals and
/// `red`/`green`/`blue` colors when present on every vertex.
///
/// # Errors
///
/// Returns an error if the data is not valid PLY or has no vertex element.
pub fn read_cloud<R: BufRead>(reader: &mut R) -> Result<PointCloud> {
    let parser = Parser::<DefaultElement>::new();
    let ply = parser
        .read_ply(reader)
        .map_err(|e| ReconError::PlyParse { reason: e.to_string() })?;

    let vertices = ply
        .payload
        .get("vertex")
        .ok_or_else(|| ReconError::PlyParse {
            reason: "no vertex element".to_string(),
        })?;

    let mut cloud = PointCloud::new();
    for vertex in vertices {
        let x = scalar_property(vertex, "x")?;
        let y = scalar_property(vertex, "y")?;
        let z = scalar_property(vertex, "z")?;
        let mut point = CloudPoint::new(Point3::new(x, y, z));

        if let (Ok(nx), Ok(ny), Ok(nz)) = (
            scalar_property(vertex, "nx"),
            scalar_property(vertex, "ny"),
            scalar_property(vertex, "nz"),
        ) {
            point.normal = Some(Vector3::new(nx, ny, nz));
        }

        if let (Some(r), Some(g), Some(b)) = (
            color_property(vertex, "red"),
            color_property(vertex, "green"),
            color_property(vertex, "blue"),
        ) {
            point.color = Some([r, g, b]);
        }

        cloud.points.push(point);
    }

    Ok(cloud)
}

/// Writes a point cloud as ASCII PLY.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_cloud<W: Write>(writer: &mut W, cloud: &PointCloud) -> Result<()> {
    let with_normals = cloud.has_normals();
    let with_colors = cloud.has_colors();

    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;

    let mut vertex_def = ElementDef::new("vertex".to_string());
    vertex_def.count = cloud.len();
    add_position_properties(&mut vertex_def);
    if with_normals {
        add_normal_properties(&mut vertex_def);
    }
    if with_colors {
        add_color_properties(&mut vertex_def);
    }
    ply.header.elements.add(vertex_def);

    let mut vertices = Vec::with_capacity(cloud.len());
    for point in &cloud.points {
        let mut element = DefaultElement::new();
        insert_position(&mut element, &point.position);
        if with_normals
            && let Some(n) = point.normal
        {
            insert_normal(&mut element, &n);
        }
        if with_colors
            && let Some(c) = point.color
        {
            insert_color(&mut element, c);
        }
        vertices.push(element);
    }
    ply.payload.insert("vertex".to_string(), vertices);

    let w = Writer::new();
    w.write_ply(writer, &mut ply)?;
    Ok(())
}

/// Writes a mesh as ASCII PLY with `vertex_indices` face lists.
///
/// # Errors
///
/// Returns an error if the mesh is empty or writing fails.
pub fn write_mesh<W: Write>(writer: &mut W, mesh: &TriangleMesh) -> Result<()> {
    if mesh.is_empty() {
        return Err(ReconError::EmptyMesh);
    }

    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;

    let mut vertex_def = ElementDef::new("vertex".to_string());
    vertex_def.count = mesh.vertices.len();
    add_position_properties(&mut vertex_def);
    if mesh.normals.is_some() {
        add_normal_properties(&mut vertex_def);
    }
    if mesh.colors.is_some() {
        add_color_properties(&mut vertex_def);
    }
    ply.header.elements.add(vertex_def);

    let mut face_def = ElementDef::new("face".to_string());
    face_def.count = mesh.faces.len();
    face_def.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::Int),
    ));
    ply.header.elements.add(face_def);

    let mut vertices = Vec::with_capacity(mesh.vertices.len());
    for (i, position) in mesh.vertices.iter().enumerate() {
        let mut element = DefaultElement::new();
        insert_position(&mut element, position);
        if let Some(normals) = &mesh.normals {
            insert_normal(&mut element, &normals[i]);
        }
        if let Some(colors) = &mesh.colors {
            insert_color(&mut element, colors[i]);
        }
        vertices.push(element);
    }
    ply.payload.insert("vertex".to_string(), vertices);

    let mut faces = Vec::with_capacity(mesh.faces.len());
    for face in &mesh.faces {
        let mut element = DefaultElement::new();
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let indices = vec![face[0] as i32, face[1] as i32, face[2] as i32];
        element.insert("vertex_indices".to_string(), Property::ListInt(indices));
        faces.push(element);
    }
    ply.payload.insert("face".to_string(), faces);

    let w = Writer::new();
    w.write_ply(writer, &mut ply)?;
    Ok(())
}

fn add_position_properties(def: &mut ElementDef) {
    for name in ["x", "y", "z"] {
        def.properties.add(PropertyDef::new(
            name.to_string(),
            PropertyType::Scalar(ScalarType::Float),
        ));
    }
}

fn add_normal_properties(def: &mut ElementDef) {
    for name in ["nx", "ny", "nz"] {
        def.properties.add(PropertyDef::new(
            name.to_string(),
            PropertyType::Scalar(ScalarType::Float),
        ));
    }
}

fn add_color_properties(def: &mut ElementDef) {
    for name in ["red", "green", "blue"] {
        def.properties.add(PropertyDef::new(
            name.to_string(),
            PropertyType::Scalar(ScalarType::UChar),
        ));
    }
}

#[allow(clippy::cast_possible_truncation)]
fn insert_position(element: &mut DefaultElement, p: &Point3<f64>) {
    element.insert("x".to_string(), Property::Float(p.x as f32));
    element.insert("y".to_string(), Property::Float(p.y as f32));
    element.insert("z".to_string(), Property::Float(p.z as f32));
}

#[allow(clippy::cast_possible_truncation)]
fn insert_normal(element: &mut DefaultElement, n: &Vector3<f64>) {
    element.insert("nx".to_string(), Property::Float(n.x as f32));
    element.insert("ny".to_string(), Property::Float(n.y as f32));
    element.insert("nz".to_string(), Property::Float(n.z as f32));
}

fn insert_color(element: &mut DefaultElement, c: [u8; 3]) {
    element.insert("red".to_string(), Property::UChar(c[0]));
    element.insert("green".to_string(), Property::UChar(c[1]));
    element.insert("blue".to_string(), Property::UChar(c[2]));
}

/// Reads a numeric vertex property as f64.
fn scalar_property(element: &DefaultElement, name: &str) -> Result<f64> {
    match element.get(name) {
        Some(Property::Float(v)) => Ok(f64::from(*v)),
        Some(Property::Double(v)) => Ok(*v),
        Some(Property::Int(v)) => Ok(f64::from(*v)),
        Some(Property::UInt(v)) => Ok(f64::from(*v)),
        Some(Property::Short(v)) => Ok(f64::from(*v)),
        Some(Property::UShort(v)) => Ok(f64::from(*v)),
        Some(Property::Char(v)) => Ok(f64::from(*v)),
        Some(Property::UChar(v)) => Ok(f64::from(*v)),
        _ => Err(ReconError::PlyParse {
            reason: format!("vertex property '{name}' missing or non-scalar"),
        }),
    }
}

/// Reads a color channel, accepting the common uchar encoding as well as
/// normalized floats.
fn color_property(element: &DefaultElement, name: &str) -> Option<u8> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    match element.get(name) {
        Some(Property::UChar(v)) => Some(*v),
        Some(Property::Int(v)) => Some((*v).clamp(0, 255) as u8),
        Some(Property::UInt(v)) => Some((*v).min(255) as u8),
        Some(Property::Float(v)) => Some(((f64::from(*v)).clamp(0.0, 1.0) * 255.0).round() as u8),
        Some(Property::Double(v)) => Some((v.clamp(0.0, 1.0) * 255.0).round() as u8),
        _ => None,
    }
}
