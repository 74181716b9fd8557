use crate::{geometry::MeshData, model::Document};

#[inline]
fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
fn normalize(v: [f64; 3]) -> [f64; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len <= f64::EPSILON {
        [0.0, 0.0, 0.0]
    } else {
        [v[0] / len, v[1] / len, v[2] / len]
    }
}

#[inline]
fn triangle_normal(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> [f64; 3] {
    let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    normalize(cross(ab, ac))
}

/// All mesh objects of `doc` merged into one binary STL.
pub fn document_to_binary_stl(doc: &Document, name: &str) -> Vec<u8> {
    let meshes: Vec<&MeshData> = doc.meshes().collect();
    let tri_count: usize = meshes.iter().map(|m| m.triangle_count()).sum();

    let mut bytes = Vec::<u8>::with_capacity(84 + tri_count * 50);

    let mut header = [0u8; 80];
    let name_bytes = name.as_bytes();
    let header_len = name_bytes.len().min(80);
    header[..header_len].copy_from_slice(&name_bytes[..header_len]);
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(&(tri_count as u32).to_le_bytes());

    for mesh in meshes {
        for tri in &mesh.triangles {
            let a = mesh.vertices[tri[0] as usize];
            let b = mesh.vertices[tri[1] as usize];
            let c = mesh.vertices[tri[2] as usize];

            push_f32_triplet(&mut bytes, triangle_normal(a, b, c));
            push_f32_triplet(&mut bytes, a);
            push_f32_triplet(&mut bytes, b);
            push_f32_triplet(&mut bytes, c);
            bytes.extend_from_slice(&0u16.to_le_bytes());
        }
    }

    bytes
}

#[inline]
fn push_f32_triplet(bytes: &mut Vec<u8>, value: [f64; 3]) {
    bytes.extend_from_slice(&(value[0] as f32).to_le_bytes());
    bytes.extend_from_slice(&(value[1] as f32).to_le_bytes());
    bytes.extend_from_slice(&(value[2] as f32).to_le_bytes());
}
