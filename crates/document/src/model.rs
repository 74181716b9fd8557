use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Geometry;

/// File signature of a serialized document.
pub const MAGIC: &[u8; 8] = b"VSLDOC\0\x01";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentObject {
    pub id: ObjectId,
    pub geometry: Geometry,
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("not a document archive")]
    BadMagic,
    #[error("unsupported document format version {0}")]
    UnsupportedVersion(u32),
    #[error("document archive is truncated")]
    Truncated,
    #[error("document archive body is corrupt: {0}")]
    Body(#[from] serde_json::Error),
}

/// What the pipeline needs from a geometry document.
pub trait ModelDocument: Send + Sync {
    fn clear(&mut self);
    fn insert(&mut self, geometry: Geometry) -> ObjectId;
    fn to_bytes(&self) -> Vec<u8>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    objects: Vec<DocumentObject>,
    next_id: u32,
}

#[derive(Serialize)]
struct ArchiveRef<'a> {
    objects: &'a [DocumentObject],
}

#[derive(Deserialize)]
struct Archive {
    objects: Vec<DocumentObject>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn objects(&self) -> &[DocumentObject] {
        &self.objects
    }

    pub fn meshes(&self) -> impl Iterator<Item = &crate::geometry::MeshData> {
        self.objects.iter().filter_map(|obj| match &obj.geometry {
            Geometry::Mesh(mesh) => Some(mesh),
            _ => None,
        })
    }

    /// Parses bytes produced by [`ModelDocument::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocumentError> {
        if bytes.len() < MAGIC.len() {
            return Err(DocumentError::Truncated);
        }
        let (magic, rest) = bytes.split_at(MAGIC.len());
        if magic != MAGIC {
            return Err(DocumentError::BadMagic);
        }
        if rest.len() < 4 {
            return Err(DocumentError::Truncated);
        }
        let (version, body) = rest.split_at(4);
        let version = u32::from_le_bytes([version[0], version[1], version[2], version[3]]);
        if version != FORMAT_VERSION {
            return Err(DocumentError::UnsupportedVersion(version));
        }

        let archive: Archive = serde_json::from_slice(body)?;
        let next_id = archive
            .objects
            .iter()
            .map(|obj| obj.id.0 + 1)
            .max()
            .unwrap_or(0);
        Ok(Self {
            objects: archive.objects,
            next_id,
        })
    }
}

impl ModelDocument for Document {
    fn clear(&mut self) {
        self.objects.clear();
    }

    fn insert(&mut self, geometry: Geometry) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.push(DocumentObject { id, geometry });
        id
    }

    fn to_bytes(&self) -> Vec<u8> {
        let archive = ArchiveRef {
            objects: &self.objects,
        };
        let body = serde_json::to_vec(&archive)
            .expect("document archive has only string-keyed maps");

        let mut bytes = Vec::with_capacity(MAGIC.len() + 4 + body.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&body);
        bytes
    }

    fn len(&self) -> usize {
        self.objects.len()
    }
}
