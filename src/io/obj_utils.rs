// Copyright @yucwang 2023

use std::fs;
use std::path::Path;

use crate::math::constants::Vector3f;

use wavefront_obj::{obj, ParseError};
use std::fmt;

#[derive(Debug)]
pub enum ObjLoadError {
    Io(std::io::Error),
    Parse(ParseError),
    Topology(String),
}

impl From<std::io::Error> for ObjLoadError {
    fn from(err: std::io::Error) -> Self {
        ObjLoadError::Io(err)
    }
}

impl From<ParseError> for ObjLoadError {
    fn from(err: ParseError) -> Self {
        ObjLoadError::Parse(err)
    }
}

impl fmt::Display for ObjLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjLoadError::Io(err) => write!(f, "io error: {}", err),
            ObjLoadError::Parse(err) => write!(f, "parse error: {}", err),
            ObjLoadError::Topology(msg) => write!(f, "bad topology: {}", msg),
        }
    }
}

impl std::error::Error for ObjLoadError {}

/// Unwelded triangle soup: three corners per face, normals per corner when
/// every face carries them.
#[derive(Debug, Default)]
pub struct MeshData {
    pub positions: Vec<Vector3f>,
    pub normals: Vec<Vector3f>,
    pub indices: Vec<[usize; 3]>,
}

pub fn load_mesh_from_str<S: AsRef<str>>(input: S) -> Result<MeshData, ObjLoadError> {
    let obj_set = obj::parse(triangulate_faces(input.as_ref()))?;
    let mut data = MeshData::default();
    let mut all_normals = true;

    for object in &obj_set.objects {
        let position = |i: usize| -> Result<Vector3f, ObjLoadError> {
            object
                .vertices
                .get(i)
                .map(|v| Vector3f::new(v.x as f32, v.y as f32, v.z as f32))
                .ok_or_else(|| ObjLoadError::Topology(format!("vertex {} out of range", i)))
        };
        let normal = |i: Option<usize>| {
            i.and_then(|i| object.normals.get(i))
                .map(|n| Vector3f::new(n.x as f32, n.y as f32, n.z as f32))
        };

        for geom in &object.geometry {
            for shape in &geom.shapes {
                if let obj::Primitive::Triangle(a, b, c) = &shape.primitive {
                    let base = data.positions.len();
                    for corner in [*a, *b, *c] {
                        data.positions.push(position(corner.0)?);
                        match normal(corner.2) {
                            Some(n) => data.normals.push(n),
                            None => all_normals = false,
                        }
                    }
                    data.indices.push([base, base + 1, base + 2]);
                }
            }
        }
    }

    if !all_normals {
        data.normals.clear();
    }
    log::debug!("parsed obj mesh: {} triangles", data.indices.len());
    Ok(data)
}

pub fn load_mesh_from_file<P: AsRef<Path>>(path: P) -> Result<MeshData, ObjLoadError> {
    let text = fs::read_to_string(path.as_ref())?;
    log::info!("Loading bounding mesh from: {}.", path.as_ref().display());
    load_mesh_from_str(text)
}

// Fan-triangulates polygon faces; the parser only accepts triangles and lines.
fn triangulate_faces(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 4);
    for line in input.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("f ") || trimmed.starts_with("f\t") {
            let parts: Vec<&str> = trimmed.split_whitespace().collect();
            if parts.len() > 4 {
                for i in 2..(parts.len() - 1) {
                    out.push_str(&format!("f {} {} {}\n", parts[1], parts[i], parts[i + 1]));
                }
                continue;
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_face_is_fan_triangulated() {
        let input = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
f 1 2 3 4
";
        let data = load_mesh_from_str(input).expect("failed to parse obj");
        assert_eq!(data.indices.len(), 2);
        assert_eq!(data.positions.len(), 6);
        assert!(data.normals.is_empty());
        assert_eq!(data.positions[5], Vector3f::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_mesh_from_file("/definitely/not/here.obj").unwrap_err();
        assert!(matches!(err, ObjLoadError::Io(_)));
    }
}
