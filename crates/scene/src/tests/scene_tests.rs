use std::{sync::Arc, time::Duration};

use document::{Document, Geometry, MeshData, ModelDocument};
use tokio::sync::{watch, RwLock};

use crate::{
    decode_drawables, update_scene, Camera, Drawable, HeadlessRenderer, Renderer, Scene,
    SceneError, SceneSink, Viewport,
};

fn triangle() -> MeshData {
    MeshData {
        vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        triangles: vec![[0, 1, 2]],
    }
}

fn document_bytes(items: Vec<Geometry>) -> Vec<u8> {
    let mut doc = Document::new();
    for geometry in items {
        doc.insert(geometry);
    }
    doc.to_bytes()
}

#[test]
fn default_scene_has_only_lights() {
    let scene = Scene::with_default_lights();
    assert_eq!(scene.light_count(), 2);
    assert_eq!(scene.geometry_count(), 0);
}

#[test]
fn clear_geometry_keeps_lights() {
    let mut scene = Scene::with_default_lights();
    scene.add_drawable(Drawable::Point {
        location: [0.0, 0.0, 0.0],
    });
    scene.add_drawable(Drawable::Opaque);

    assert_eq!(scene.clear_geometry(), 2);
    assert_eq!(scene.light_count(), 2);
    assert_eq!(scene.geometry_count(), 0);
}

#[test]
fn decoded_meshes_carry_wireframe_overlays() {
    let bytes = document_bytes(vec![
        Geometry::Mesh(triangle()),
        Geometry::Point {
            location: [1.0, 2.0, 3.0],
        },
    ]);

    let drawables = decode_drawables(&bytes).expect("decode");
    assert_eq!(drawables.len(), 2);
    match &drawables[0] {
        Drawable::Mesh {
            overlay: Some(wire),
            ..
        } => assert_eq!(wire.segments.len(), 3),
        other => panic!("expected mesh with overlay, got {other:?}"),
    }
    assert!(matches!(drawables[1], Drawable::Point { .. }));
}

#[tokio::test]
async fn update_replaces_previous_geometry() {
    let scene = RwLock::new(Scene::with_default_lights());

    let first = update_scene(
        &scene,
        document_bytes(vec![Geometry::Mesh(triangle()), Geometry::Mesh(triangle())]),
    )
    .await
    .expect("first update");
    assert_eq!(first.added, 2);
    assert_eq!(first.wireframes, 2);

    let second = update_scene(
        &scene,
        document_bytes(vec![Geometry::Polyline {
            points: vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]],
            closed: false,
        }]),
    )
    .await
    .expect("second update");
    assert_eq!(second.removed, 2);
    assert_eq!(second.added, 1);

    let scene = scene.read().await;
    assert_eq!(scene.light_count(), 2);
    assert_eq!(scene.geometry_count(), 1);
}

#[tokio::test]
async fn empty_document_leaves_lights_only() {
    let scene = RwLock::new(Scene::with_default_lights());
    update_scene(&scene, document_bytes(vec![Geometry::Mesh(triangle())]))
        .await
        .expect("populate");

    let update = update_scene(&scene, Document::new().to_bytes())
        .await
        .expect("empty update");
    assert_eq!(update.added, 0);

    let scene = scene.read().await;
    assert_eq!(scene.geometry_count(), 0);
    assert_eq!(scene.light_count(), 2);
}

#[tokio::test]
async fn undecodable_bytes_fail_after_clearing() {
    let scene = RwLock::new(Scene::with_default_lights());
    update_scene(&scene, document_bytes(vec![Geometry::Mesh(triangle())]))
        .await
        .expect("populate");

    let err = update_scene(&scene, b"garbage!garbage".to_vec())
        .await
        .expect_err("must fail");
    assert!(matches!(err, SceneError::Decode(_)));
    assert_eq!(scene.read().await.geometry_count(), 0);
}

#[test]
fn headless_renderer_tallies_frame_contents() {
    let mut scene = Scene::with_default_lights();
    let mut mesh = Drawable::Mesh {
        mesh: triangle(),
        overlay: None,
    };
    mesh.attach_wireframe();
    scene.add_drawable(mesh);
    scene.add_drawable(Drawable::Polyline {
        points: vec![[0.0; 3], [1.0; 3], [2.0; 3]],
        closed: true,
    });

    let mut renderer = HeadlessRenderer::default();
    let stats = renderer.render(&scene, &Camera::perspective(800, 600));
    assert_eq!(stats.frame, 1);
    assert_eq!(stats.lights, 2);
    assert_eq!(stats.objects, 2);
    assert_eq!(stats.triangles, 1);
    assert_eq!(stats.line_segments, 3 + 3);
}

#[test]
fn camera_defaults_and_orbit_keep_distance() {
    let mut camera = Camera::perspective(1280, 720);
    assert_eq!(camera.position, [0.0, 0.0, -30.0]);
    assert_eq!(camera.up, [0.0, 0.0, 1.0]);
    assert!((camera.aspect - 1280.0 / 720.0).abs() < 1e-9);

    camera.orbit(45.0, 30.0);
    assert!((camera.distance() - 30.0).abs() < 1e-9);
    assert_ne!(camera.position, [0.0, 0.0, -30.0]);
}

#[tokio::test(start_paused = true)]
async fn render_loop_runs_until_shutdown() {
    let scene = Arc::new(RwLock::new(Scene::with_default_lights()));
    let camera = Arc::new(RwLock::new(Camera::perspective(640, 480)));
    let viewport = Viewport::new(scene, camera, 30);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut renderer = HeadlessRenderer::default();
        let frames = viewport.run(&mut renderer, shutdown_rx).await;
        (frames, renderer.frames())
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown_tx.send(true).expect("signal shutdown");

    let (frames, rendered) = handle.await.expect("join");
    assert!(frames >= 2, "expected several frames, got {frames}");
    assert_eq!(frames, rendered);
}
