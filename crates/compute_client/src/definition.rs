//! One-shot startup load of the opaque algorithm definition.

use std::path::PathBuf;

use reqwest::Client;
use shared::{
    domain::Definition,
    error::{Classify, ErrorCode},
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read definition '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to fetch definition '{url}': {source}")]
    Fetch { url: String, source: reqwest::Error },
    #[error("fetching definition '{url}' returned status {status}")]
    Status { url: String, status: u16 },
    #[error("definition '{0}' is empty")]
    Empty(String),
}

impl Classify for DefinitionError {
    fn code(&self) -> ErrorCode {
        match self {
            DefinitionError::Read { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                ErrorCode::NotFound
            }
            DefinitionError::Read { .. } => ErrorCode::Internal,
            DefinitionError::Fetch { .. } => ErrorCode::Transport,
            DefinitionError::Status { status, .. } => ErrorCode::from_status(*status),
            DefinitionError::Empty(_) => ErrorCode::Validation,
        }
    }
}

/// Loads `source` over HTTP when it is an `http(s)` URL, otherwise from disk.
pub async fn load_definition(http: &Client, source: &str) -> Result<Definition, DefinitionError> {
    let bytes = if source.starts_with("http://") || source.starts_with("https://") {
        let res = http
            .get(source)
            .send()
            .await
            .map_err(|source_err| DefinitionError::Fetch {
                url: source.to_string(),
                source: source_err,
            })?;
        let status = res.status();
        if !status.is_success() {
            return Err(DefinitionError::Status {
                url: source.to_string(),
                status: status.as_u16(),
            });
        }
        res.bytes()
            .await
            .map_err(|source_err| DefinitionError::Fetch {
                url: source.to_string(),
                source: source_err,
            })?
            .to_vec()
    } else {
        let path = PathBuf::from(source);
        tokio::fs::read(&path)
            .await
            .map_err(|source| DefinitionError::Read { path, source })?
    };

    let definition = Definition::new(display_name(source), bytes);
    if definition.is_empty() {
        return Err(DefinitionError::Empty(source.to_string()));
    }

    info!(
        definition = definition.name(),
        bytes = definition.len(),
        "loaded definition"
    );
    Ok(definition)
}

fn display_name(source: &str) -> String {
    source
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(source)
        .to_string()
}
