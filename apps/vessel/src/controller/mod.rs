//! Input controller: runs compute → materialize → scene cycles, latest request wins.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use compute_client::{ComputeBackend, ComputeError};
use document::{materialize, MaterializeError};
use scene::SceneError;
use shared::{
    domain::{Parameter, ParameterSet},
    error::{ApiError, Classify, ErrorCode},
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::app_state::AppState;

pub mod events;

pub use events::{ControllerEvent, ControllerStatus, UiState};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Compute(#[from] ComputeError),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

impl Classify for PipelineError {
    fn code(&self) -> ErrorCode {
        match self {
            PipelineError::Compute(err) => err.code(),
            PipelineError::Materialize(err) => err.code(),
            PipelineError::Scene(err) => err.code(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Applied {
        generation: u64,
        objects: usize,
    },
    Superseded {
        generation: u64,
    },
}

/// Shared flag a newer cycle flips to invalidate an older one.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

struct ControllerInner {
    generation: u64,
    active: Option<CancellationToken>,
    status: ControllerStatus,
    last_error: Option<ApiError>,
}

pub struct Controller {
    state: Arc<AppState>,
    backend: Arc<dyn ComputeBackend>,
    inner: Mutex<ControllerInner>,
    // Serializes document swap + scene update so commits never interleave.
    commit: Mutex<()>,
    events: broadcast::Sender<ControllerEvent>,
}

impl Controller {
    pub fn new(state: Arc<AppState>, backend: Arc<dyn ComputeBackend>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state,
            backend,
            inner: Mutex::new(ControllerInner {
                generation: 0,
                active: None,
                status: ControllerStatus::Idle,
                last_error: None,
            }),
            commit: Mutex::new(()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub async fn status(&self) -> ControllerStatus {
        self.inner.lock().await.status
    }

    pub async fn last_error(&self) -> Option<ApiError> {
        self.inner.lock().await.last_error.clone()
    }

    pub async fn ui_state(&self) -> UiState {
        let busy = matches!(self.status().await, ControllerStatus::Busy { .. });
        UiState {
            loading_indicator: busy,
            export_enabled: !busy && self.state.has_document().await,
        }
    }

    /// Slider release: store the value, then recompute.
    pub async fn on_parameter_release(
        &self,
        parameter: Parameter,
        value: f64,
    ) -> Result<CycleOutcome, PipelineError> {
        self.state.set_parameter(parameter, value).await;
        self.run_cycle().await
    }

    /// Runs one full cycle. A cycle started later cancels this one; a
    /// cancelled cycle never touches the document or scene.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, PipelineError> {
        let (generation, token) = self.begin().await;
        let parameters = self.state.parameters().await;
        info!(generation, ?parameters, "compute cycle started");

        let result = self.execute(generation, &token, &parameters).await;
        self.finish(generation, &result).await;
        result
    }

    async fn begin(&self) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let generation = {
            let mut inner = self.inner.lock().await;
            inner.generation += 1;
            if let Some(previous) = inner.active.replace(token.clone()) {
                previous.cancel();
            }
            inner.status = ControllerStatus::Busy {
                generation: inner.generation,
            };
            inner.generation
        };

        self.emit(ControllerEvent::Busy { generation });
        self.emit(ControllerEvent::Ui(UiState {
            loading_indicator: true,
            export_enabled: false,
        }));
        (generation, token)
    }

    async fn execute(
        &self,
        generation: u64,
        token: &CancellationToken,
        parameters: &ParameterSet,
    ) -> Result<CycleOutcome, PipelineError> {
        let response = self
            .backend
            .evaluate(self.state.definition(), parameters)
            .await?;
        if token.is_cancelled() {
            return Ok(CycleOutcome::Superseded { generation });
        }

        // Built off to the side: a decode failure leaves the previous document in place.
        let document = materialize(&response)?;

        let _commit = self.commit.lock().await;
        if token.is_cancelled() {
            return Ok(CycleOutcome::Superseded { generation });
        }

        let objects = document.objects().len();
        let bytes = self.state.replace_document(document).await;
        let update = self.state.refresh_scene(bytes).await?;

        self.emit(ControllerEvent::Completed {
            generation,
            objects,
            wireframes: update.wireframes,
        });
        Ok(CycleOutcome::Applied {
            generation,
            objects,
        })
    }

    async fn finish(&self, generation: u64, result: &Result<CycleOutcome, PipelineError>) {
        match result {
            Ok(CycleOutcome::Superseded { .. }) => {
                warn!(generation, "discarding stale compute result");
                self.emit(ControllerEvent::Discarded { generation });
            }
            Ok(CycleOutcome::Applied { objects, .. }) => {
                info!(generation, objects, "compute cycle completed");
            }
            Err(err) => {
                warn!(generation, error = %err, "compute cycle failed");
            }
        }

        let is_latest = {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                false
            } else {
                inner.status = ControllerStatus::Idle;
                inner.active = None;
                inner.last_error = result.as_ref().err().map(ApiError::classify);
                true
            }
        };

        if !is_latest {
            return;
        }

        if let Err(err) = result {
            self.emit(ControllerEvent::Failed {
                generation,
                error: ApiError::classify(err),
            });
        }
        self.emit(ControllerEvent::Ui(UiState {
            loading_indicator: false,
            export_enabled: self.state.has_document().await,
        }));
    }

    fn emit(&self, event: ControllerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
