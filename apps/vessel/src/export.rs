use std::path::{Path, PathBuf};

use document::{document_to_binary_stl, ModelDocument};
use shared::error::{Classify, ErrorCode};
use thiserror::Error;
use tracing::info;

use crate::app_state::AppState;

pub const EXPORT_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// The document's own serialized form.
    #[default]
    Native,
    /// Mesh objects only, as binary STL.
    Stl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export: no document has been computed yet")]
    NoDocument,
    #[error("download unavailable while computing")]
    Busy,
    #[error("failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Classify for ExportError {
    fn code(&self) -> ErrorCode {
        match self {
            ExportError::NoDocument => ErrorCode::NotFound,
            ExportError::Busy => ErrorCode::Validation,
            ExportError::Io { .. } => ErrorCode::Internal,
        }
    }
}

/// Serializes the live document. `file_name` is used as-is for the native
/// format; STL keeps the stem and swaps the extension.
pub async fn export_document(
    state: &AppState,
    format: ExportFormat,
    file_name: &str,
) -> Result<ExportArtifact, ExportError> {
    let artifact = state
        .with_document(|doc| match format {
            ExportFormat::Native => ExportArtifact {
                file_name: file_name.to_string(),
                mime_type: EXPORT_MIME_TYPE,
                bytes: doc.to_bytes(),
            },
            ExportFormat::Stl => {
                let stem = Path::new(file_name)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("export");
                ExportArtifact {
                    file_name: format!("{stem}.stl"),
                    mime_type: EXPORT_MIME_TYPE,
                    bytes: document_to_binary_stl(doc, stem),
                }
            }
        })
        .await
        .ok_or(ExportError::NoDocument)?;

    info!(
        file = %artifact.file_name,
        bytes = artifact.bytes.len(),
        "prepared export"
    );
    Ok(artifact)
}

/// Writes `artifact` into `dir`, creating the directory if needed.
pub async fn save_artifact(artifact: &ExportArtifact, dir: &Path) -> Result<PathBuf, ExportError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ExportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

    let path = dir.join(&artifact.file_name);
    tokio::fs::write(&path, &artifact.bytes)
        .await
        .map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;

    info!(path = %path.display(), "saved export");
    Ok(path)
}

#[cfg(test)]
#[path = "tests/export_tests.rs"]
mod tests;
