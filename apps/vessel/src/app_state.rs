use std::sync::Arc;

use document::{Document, ModelDocument};
use scene::{update_scene, Scene, SceneError, SceneUpdate};
use shared::domain::{Definition, Parameter, ParameterSet};
use tokio::sync::{Mutex, RwLock};

/// Sole owner of the definition, current inputs, live document, and scene.
pub struct AppState {
    definition: Definition,
    parameters: Mutex<ParameterSet>,
    document: Mutex<Option<Document>>,
    scene: Arc<RwLock<Scene>>,
}

impl AppState {
    pub fn new(definition: Definition, parameters: ParameterSet, scene: Scene) -> Self {
        Self {
            definition,
            parameters: Mutex::new(parameters),
            document: Mutex::new(None),
            scene: Arc::new(RwLock::new(scene)),
        }
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    pub async fn parameters(&self) -> ParameterSet {
        *self.parameters.lock().await
    }

    pub async fn set_parameter(&self, parameter: Parameter, value: f64) -> ParameterSet {
        let mut parameters = self.parameters.lock().await;
        parameters.set(parameter, value);
        *parameters
    }

    pub fn scene(&self) -> Arc<RwLock<Scene>> {
        Arc::clone(&self.scene)
    }

    /// Installs `next` and returns its serialized form. The previous document is dropped first.
    pub async fn replace_document(&self, next: Document) -> Vec<u8> {
        let mut slot = self.document.lock().await;
        drop(slot.take());
        let bytes = next.to_bytes();
        *slot = Some(next);
        bytes
    }

    /// Rebuilds the scene from `bytes`. On failure the document is dropped too,
    /// so export never offers a document the scene could not show.
    pub async fn refresh_scene(&self, bytes: Vec<u8>) -> Result<SceneUpdate, SceneError> {
        let update = update_scene(self.scene.as_ref(), bytes).await;
        if update.is_err() {
            self.document.lock().await.take();
        }
        update
    }

    pub async fn has_document(&self) -> bool {
        self.document.lock().await.is_some()
    }

    #[cfg(test)]
    pub async fn document_bytes(&self) -> Option<Vec<u8>> {
        self.document.lock().await.as_ref().map(|doc| doc.to_bytes())
    }

    pub async fn with_document<T>(&self, f: impl FnOnce(&Document) -> T) -> Option<T> {
        self.document.lock().await.as_ref().map(f)
    }
}

#[cfg(test)]
#[path = "tests/app_state_tests.rs"]
mod tests;
