use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::protocol::DataItem;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("item data is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported geometry description: {0}")]
    Unsupported(String),
    #[error("mesh face {face} has {len} indices; expected 3 or 4")]
    FaceArity { face: usize, len: usize },
    #[error("mesh face {face} references vertex {index} but mesh has {vertex_count}")]
    IndexOutOfRange {
        face: usize,
        index: u32,
        vertex_count: usize,
    },
    #[error("polyline needs at least two points, got {0}")]
    DegeneratePolyline(usize),
}

/// Triangle mesh; quads are split on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub vertices: Vec<[f64; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Unique undirected edges, in first-seen order.
    pub fn edges(&self) -> Vec<[u32; 2]> {
        let mut seen = std::collections::HashSet::new();
        let mut edges = Vec::with_capacity(self.triangles.len() * 3 / 2);
        for tri in &self.triangles {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                let key = if a < b { [a, b] } else { [b, a] };
                if seen.insert(key) {
                    edges.push(key);
                }
            }
        }
        edges
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Geometry {
    Point {
        location: [f64; 3],
    },
    Polyline {
        points: Vec<[f64; 3]>,
        closed: bool,
    },
    Mesh(MeshData),
    /// Native encoded object kept verbatim; it has no drawable form here.
    Encoded {
        archive3dm: i64,
        payload: Value,
    },
}

impl Geometry {
    pub fn is_mesh(&self) -> bool {
        matches!(self, Geometry::Mesh(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Geometry::Point { .. } => "point",
            Geometry::Polyline { .. } => "polyline",
            Geometry::Mesh(_) => "mesh",
            Geometry::Encoded { .. } => "encoded",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireGeometry {
    Point {
        location: [f64; 3],
    },
    Polyline {
        points: Vec<[f64; 3]>,
        #[serde(default)]
        closed: bool,
    },
    Mesh {
        vertices: Vec<[f64; 3]>,
        faces: Vec<Vec<u32>>,
    },
}

/// Decodes the JSON description embedded in one result item.
pub fn decode_item(item: &DataItem) -> Result<Geometry, GeometryError> {
    // The service double-encodes: `data` is a JSON string holding the JSON object.
    let value: Value = serde_json::from_str(&item.data)?;
    let value = match value {
        Value::String(inner) => serde_json::from_str(&inner)?,
        other => other,
    };
    decode_value(value)
}

pub fn decode_value(value: Value) -> Result<Geometry, GeometryError> {
    let Value::Object(map) = &value else {
        return Err(GeometryError::Unsupported(describe(&value)));
    };

    if map.contains_key("type") {
        let wire: WireGeometry = serde_json::from_value(value)?;
        return wire_to_geometry(wire);
    }

    if let Some(archive3dm) = map.get("archive3dm").and_then(Value::as_i64) {
        return Ok(Geometry::Encoded {
            archive3dm,
            payload: value,
        });
    }

    Err(GeometryError::Unsupported(describe(&value)))
}

fn wire_to_geometry(wire: WireGeometry) -> Result<Geometry, GeometryError> {
    match wire {
        WireGeometry::Point { location } => Ok(Geometry::Point { location }),
        WireGeometry::Polyline { points, closed } => {
            if points.len() < 2 {
                return Err(GeometryError::DegeneratePolyline(points.len()));
            }
            Ok(Geometry::Polyline { points, closed })
        }
        WireGeometry::Mesh { vertices, faces } => {
            let triangles = triangulate(&faces, vertices.len())?;
            Ok(Geometry::Mesh(MeshData {
                vertices,
                triangles,
            }))
        }
    }
}

fn triangulate(faces: &[Vec<u32>], vertex_count: usize) -> Result<Vec<[u32; 3]>, GeometryError> {
    let mut triangles = Vec::with_capacity(faces.len());
    for (face, indices) in faces.iter().enumerate() {
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(GeometryError::IndexOutOfRange {
                face,
                index,
                vertex_count,
            });
        }
        match indices.as_slice() {
            &[a, b, c] => triangles.push([a, b, c]),
            &[a, b, c, d] => {
                triangles.push([a, b, c]);
                triangles.push([a, c, d]);
            }
            other => {
                return Err(GeometryError::FaceArity {
                    face,
                    len: other.len(),
                })
            }
        }
    }
    Ok(triangles)
}

fn describe(value: &Value) -> String {
    let mut text = value.to_string();
    if text.len() > 64 {
        let cut = (0..=64).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0);
        text.truncate(cut);
        text.push_str("...");
    }
    text
}
