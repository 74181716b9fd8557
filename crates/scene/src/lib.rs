//! Display-side model: scene graph, document-to-scene updates, and the viewport.

pub mod graph;
pub mod updater;
pub mod viewport;

pub use graph::{Color, Drawable, Light, LightKind, NodeId, Scene, SceneObject, SceneSink, Wireframe};
pub use updater::{decode_drawables, update_scene, SceneError, SceneUpdate};
pub use viewport::{Camera, FrameStats, HeadlessRenderer, Renderer, Viewport};

#[cfg(test)]
#[path = "tests/scene_tests.rs"]
mod tests;
