use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header::HeaderValue, Client};
use shared::{
    domain::{Credential, Definition, ParameterSet},
    error::{Classify, ErrorCode},
    protocol::{ComputeRequest, ComputeResponse},
};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

pub mod definition;

pub use definition::{load_definition, DefinitionError};

/// Header the compute service reads the access key from.
pub const API_KEY_HEADER: &str = "RhinoComputeKey";
const GRASSHOPPER_PATH: &str = "grasshopper";

#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("invalid compute url '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("compute credential is not a valid header value")]
    InvalidCredential,
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("compute request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("compute service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed compute response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("compute service reported errors: {}", .0.join("; "))]
    Service(Vec<String>),
}

impl Classify for ComputeError {
    fn code(&self) -> ErrorCode {
        match self {
            ComputeError::InvalidUrl { .. } | ComputeError::InvalidCredential => {
                ErrorCode::Validation
            }
            ComputeError::Client(_) => ErrorCode::Internal,
            ComputeError::Transport(_) => ErrorCode::Transport,
            ComputeError::Status { status, .. } => ErrorCode::from_status(*status),
            ComputeError::Decode(_) => ErrorCode::Decode,
            ComputeError::Service(_) => ErrorCode::Service,
        }
    }
}

/// Evaluates a definition remotely for one parameter set.
#[async_trait]
pub trait ComputeBackend: Send + Sync {
    async fn evaluate(
        &self,
        definition: &Definition,
        parameters: &ParameterSet,
    ) -> Result<ComputeResponse, ComputeError>;
}

#[derive(Debug, Clone)]
pub struct ComputeClientOptions {
    pub base_url: String,
    pub credential: Option<Credential>,
    pub timeout: Option<Duration>,
}

pub struct ComputeClient {
    http: Client,
    endpoint: Url,
    api_key: Option<HeaderValue>,
}

impl ComputeClient {
    pub fn new(options: ComputeClientOptions) -> Result<Self, ComputeError> {
        let endpoint = grasshopper_endpoint(&options.base_url)?;

        let api_key = options
            .credential
            .as_ref()
            .map(|credential| {
                let mut value = HeaderValue::from_str(credential.expose())
                    .map_err(|_| ComputeError::InvalidCredential)?;
                value.set_sensitive(true);
                Ok::<_, ComputeError>(value)
            })
            .transpose()?;

        let mut builder = Client::builder();
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ComputeError::Client)?;

        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn build_request(definition: &Definition, parameters: &ParameterSet) -> ComputeRequest {
        ComputeRequest {
            algo: Some(STANDARD.encode(definition.bytes())),
            pointer: None,
            values: ComputeRequest::input_trees(parameters),
        }
    }
}

#[async_trait]
impl ComputeBackend for ComputeClient {
    async fn evaluate(
        &self,
        definition: &Definition,
        parameters: &ParameterSet,
    ) -> Result<ComputeResponse, ComputeError> {
        let request = Self::build_request(definition, parameters);
        info!(
            endpoint = %self.endpoint,
            density = parameters.density,
            radius = parameters.radius,
            rotate = parameters.rotate,
            "evaluating definition"
        );

        let mut http_request = self.http.post(self.endpoint.clone()).json(&request);
        if let Some(key) = &self.api_key {
            http_request = http_request.header(API_KEY_HEADER, key.clone());
        }

        let res = http_request.send().await.map_err(ComputeError::Transport)?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "compute service rejected request");
            return Err(ComputeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = res.bytes().await.map_err(ComputeError::Transport)?;
        debug!(bytes = body.len(), "received compute response");
        let response: ComputeResponse =
            serde_json::from_slice(&body).map_err(ComputeError::Decode)?;

        for warning in &response.warnings {
            warn!(warning = %warning, "compute service warning");
        }
        if !response.errors.is_empty() {
            return Err(ComputeError::Service(response.errors));
        }

        Ok(response)
    }
}

fn grasshopper_endpoint(base_url: &str) -> Result<Url, ComputeError> {
    let trimmed = base_url.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };

    Url::parse(&with_slash)
        .and_then(|base| base.join(GRASSHOPPER_PATH))
        .map_err(|source| ComputeError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
