use document::{Document, DocumentError};
use shared::error::{Classify, ErrorCode};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::graph::{Drawable, SceneSink};

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to decode document for display: {0}")]
    Decode(#[from] DocumentError),
    #[error("scene decode worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl Classify for SceneError {
    fn code(&self) -> ErrorCode {
        match self {
            SceneError::Decode(_) => ErrorCode::Decode,
            SceneError::Worker(_) => ErrorCode::Internal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneUpdate {
    pub removed: usize,
    pub added: usize,
    pub wireframes: usize,
}

/// Decodes document bytes into drawables, attaching a wireframe to every mesh.
pub fn decode_drawables(bytes: &[u8]) -> Result<Vec<Drawable>, DocumentError> {
    let doc = Document::from_bytes(bytes)?;
    Ok(doc
        .objects()
        .iter()
        .map(|obj| {
            let mut drawable = Drawable::from_geometry(obj.geometry.clone());
            if drawable.is_mesh() {
                drawable.attach_wireframe();
            }
            drawable
        })
        .collect())
}

/// Clears geometry first, then decodes `doc_bytes` off the async threads and
/// adds the result. Readers may observe the lights-only scene in between.
pub async fn update_scene<S: SceneSink>(
    scene: &RwLock<S>,
    doc_bytes: Vec<u8>,
) -> Result<SceneUpdate, SceneError> {
    let removed = scene.write().await.clear_geometry();

    let drawables = tokio::task::spawn_blocking(move || decode_drawables(&doc_bytes)).await??;
    let wireframes = drawables
        .iter()
        .filter(|d| matches!(d, Drawable::Mesh { overlay: Some(_), .. }))
        .count();

    let added = drawables.len();
    {
        let mut scene = scene.write().await;
        for drawable in drawables {
            scene.add_drawable(drawable);
        }
    }

    debug!(removed, added, wireframes, "scene updated");
    Ok(SceneUpdate {
        removed,
        added,
        wireframes,
    })
}
