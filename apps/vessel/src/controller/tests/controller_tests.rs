use super::*;
use std::collections::VecDeque;

use async_trait::async_trait;
use axum::{routing::post, Json, Router};
use compute_client::{ComputeClient, ComputeClientOptions};
use scene::Scene;
use serde_json::json;
use shared::{
    domain::Definition,
    protocol::{ComputeResponse, DataItem, DataTree, ParamTree},
};
use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot},
};

type Reply = Result<ComputeResponse, ComputeError>;

enum Scripted {
    Ready(Reply),
    Gated(oneshot::Receiver<Reply>),
}

struct ScriptedBackend {
    script: Mutex<VecDeque<Scripted>>,
    seen: Mutex<Vec<ParameterSet>>,
    started: mpsc::UnboundedSender<usize>,
}

impl ScriptedBackend {
    fn new(script: Vec<Scripted>) -> (Arc<Self>, mpsc::UnboundedReceiver<usize>) {
        let (started, started_rx) = mpsc::unbounded_channel();
        let backend = Arc::new(Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
            started,
        });
        (backend, started_rx)
    }
}

#[async_trait]
impl ComputeBackend for ScriptedBackend {
    async fn evaluate(
        &self,
        _definition: &Definition,
        parameters: &ParameterSet,
    ) -> Result<ComputeResponse, ComputeError> {
        let next = self.script.lock().await.pop_front();
        let index = {
            let mut seen = self.seen.lock().await;
            seen.push(*parameters);
            seen.len() - 1
        };
        let _ = self.started.send(index);

        match next {
            Some(Scripted::Ready(reply)) => reply,
            Some(Scripted::Gated(rx)) => rx.await.unwrap_or_else(|_| Err(unavailable())),
            None => Err(unavailable()),
        }
    }
}

fn unavailable() -> ComputeError {
    ComputeError::Status {
        status: 503,
        body: "unavailable".into(),
    }
}

fn geometry_item(value: serde_json::Value) -> DataItem {
    DataItem {
        kind: Some("Rhino.Geometry.GeometryBase".into()),
        data: serde_json::to_string(&value.to_string()).expect("encode"),
    }
}

fn mesh_value() -> serde_json::Value {
    json!({
        "type": "mesh",
        "vertices": [[0, 0, 0], [1, 0, 0], [1, 1, 0], [0, 1, 0]],
        "faces": [[0, 1, 2, 3]]
    })
}

fn response_of(items: Vec<DataItem>) -> ComputeResponse {
    let mut inner_tree = DataTree::new();
    inner_tree.append(&[0], items);
    ComputeResponse {
        values: vec![ParamTree {
            param_name: "RH_OUT:vessel".into(),
            inner_tree,
        }],
        ..ComputeResponse::default()
    }
}

fn points(n: usize) -> ComputeResponse {
    response_of(
        (0..n)
            .map(|i| geometry_item(json!({"type": "point", "location": [i, 0, 0]})))
            .collect(),
    )
}

fn controller_with(backend: Arc<dyn ComputeBackend>) -> Arc<Controller> {
    let state = Arc::new(AppState::new(
        Definition::new("vassel.gh", b"definition".to_vec()),
        ParameterSet::default(),
        Scene::with_default_lights(),
    ));
    Arc::new(Controller::new(state, backend))
}

async fn scene_counts(controller: &Controller) -> (usize, usize) {
    let scene = controller.state().scene();
    let scene = scene.read().await;
    (scene.light_count(), scene.geometry_count())
}

#[tokio::test]
async fn single_cycle_populates_document_and_scene() {
    let (backend, _started) = ScriptedBackend::new(vec![Scripted::Ready(Ok(response_of(vec![
        geometry_item(mesh_value()),
        geometry_item(json!({"type": "point", "location": [1, 2, 3]})),
    ])))]);
    let controller = controller_with(backend);
    let mut events = controller.subscribe();

    let outcome = controller.run_cycle().await.expect("cycle");
    assert_eq!(
        outcome,
        CycleOutcome::Applied {
            generation: 1,
            objects: 2
        }
    );

    assert_eq!(scene_counts(&controller).await, (2, 2));
    let bytes = controller.state().document_bytes().await.expect("document");
    assert!(!bytes.is_empty());
    assert_eq!(controller.status().await, ControllerStatus::Idle);
    assert_eq!(
        controller.ui_state().await,
        UiState {
            loading_indicator: false,
            export_enabled: true
        }
    );

    assert_eq!(
        events.recv().await.expect("event"),
        ControllerEvent::Busy { generation: 1 }
    );
    assert_eq!(
        events.recv().await.expect("event"),
        ControllerEvent::Ui(UiState {
            loading_indicator: true,
            export_enabled: false
        })
    );
    assert_eq!(
        events.recv().await.expect("event"),
        ControllerEvent::Completed {
            generation: 1,
            objects: 2,
            wireframes: 1
        }
    );
    assert_eq!(
        events.recv().await.expect("event"),
        ControllerEvent::Ui(UiState {
            loading_indicator: false,
            export_enabled: true
        })
    );
}

#[tokio::test]
async fn empty_payload_yields_lights_only_scene() {
    let (backend, _started) = ScriptedBackend::new(vec![
        Scripted::Ready(Ok(points(3))),
        Scripted::Ready(Ok(ComputeResponse::default())),
    ]);
    let controller = controller_with(backend);

    controller.run_cycle().await.expect("first");
    let outcome = controller.run_cycle().await.expect("empty");
    assert_eq!(
        outcome,
        CycleOutcome::Applied {
            generation: 2,
            objects: 0
        }
    );

    assert_eq!(scene_counts(&controller).await, (2, 0));
    assert_eq!(
        controller.state().with_document(|doc| doc.objects().len()).await,
        Some(0)
    );
}

#[tokio::test]
async fn compute_failure_returns_to_idle_with_error() {
    let (backend, _started) = ScriptedBackend::new(vec![Scripted::Ready(Err(
        ComputeError::Status {
            status: 503,
            body: "overloaded".into(),
        },
    ))]);
    let controller = controller_with(backend);
    let mut events = controller.subscribe();

    let err = controller.run_cycle().await.expect_err("must fail");
    assert!(matches!(err, PipelineError::Compute(_)));

    assert_eq!(controller.status().await, ControllerStatus::Idle);
    let last = controller.last_error().await.expect("recorded");
    assert_eq!(last.code, ErrorCode::Service);
    assert!(!controller.state().has_document().await);
    assert_eq!(
        controller.ui_state().await,
        UiState {
            loading_indicator: false,
            export_enabled: false
        }
    );

    let mut saw_failed = false;
    while let Ok(event) = events.try_recv() {
        if let ControllerEvent::Failed { generation, error } = event {
            assert_eq!(generation, 1);
            assert!(error.message.contains("503"));
            saw_failed = true;
        }
    }
    assert!(saw_failed);
}

#[tokio::test]
async fn decode_failure_keeps_previous_document_and_scene() {
    let (backend, _started) = ScriptedBackend::new(vec![
        Scripted::Ready(Ok(points(2))),
        Scripted::Ready(Ok(response_of(vec![
            geometry_item(mesh_value()),
            DataItem {
                kind: None,
                data: "{not json".into(),
            },
        ]))),
    ]);
    let controller = controller_with(backend);

    controller.run_cycle().await.expect("first");
    let before = controller.state().document_bytes().await.expect("document");

    let err = controller.run_cycle().await.expect_err("decode failure");
    assert!(matches!(err, PipelineError::Materialize(_)));
    assert_eq!(
        controller.last_error().await.map(|e| e.code),
        Some(ErrorCode::Decode)
    );

    assert_eq!(controller.state().document_bytes().await, Some(before));
    assert_eq!(scene_counts(&controller).await, (2, 2));
    assert!(controller.ui_state().await.export_enabled);
}

#[tokio::test]
async fn stale_response_landing_last_is_discarded() {
    let (first_tx, first_rx) = oneshot::channel();
    let (second_tx, second_rx) = oneshot::channel();
    let (backend, mut started) = ScriptedBackend::new(vec![
        Scripted::Gated(first_rx),
        Scripted::Gated(second_rx),
    ]);
    let controller = controller_with(backend);

    let first = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.run_cycle().await }
    });
    assert_eq!(started.recv().await, Some(0));

    let second = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.run_cycle().await }
    });
    assert_eq!(started.recv().await, Some(1));

    second_tx.send(Ok(points(2))).expect("release second");
    let second = second.await.expect("join").expect("second cycle");
    assert_eq!(
        second,
        CycleOutcome::Applied {
            generation: 2,
            objects: 2
        }
    );
    assert_eq!(controller.status().await, ControllerStatus::Idle);

    first_tx.send(Ok(points(5))).expect("release first");
    let first = first.await.expect("join").expect("first cycle");
    assert_eq!(first, CycleOutcome::Superseded { generation: 1 });

    assert_eq!(scene_counts(&controller).await, (2, 2));
    assert_eq!(
        controller.state().with_document(|doc| doc.objects().len()).await,
        Some(2)
    );
    assert_eq!(controller.status().await, ControllerStatus::Idle);
}

#[tokio::test]
async fn stale_response_landing_first_keeps_controller_busy() {
    let (first_tx, first_rx) = oneshot::channel();
    let (second_tx, second_rx) = oneshot::channel();
    let (backend, mut started) = ScriptedBackend::new(vec![
        Scripted::Gated(first_rx),
        Scripted::Gated(second_rx),
    ]);
    let controller = controller_with(backend);

    let first = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.run_cycle().await }
    });
    assert_eq!(started.recv().await, Some(0));
    let second = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.run_cycle().await }
    });
    assert_eq!(started.recv().await, Some(1));

    first_tx.send(Ok(points(5))).expect("release first");
    let first = first.await.expect("join").expect("first cycle");
    assert_eq!(first, CycleOutcome::Superseded { generation: 1 });
    assert_eq!(
        controller.status().await,
        ControllerStatus::Busy { generation: 2 }
    );
    assert!(!controller.state().has_document().await);
    assert_eq!(scene_counts(&controller).await, (2, 0));

    second_tx.send(Ok(points(1))).expect("release second");
    second.await.expect("join").expect("second cycle");
    assert_eq!(scene_counts(&controller).await, (2, 1));
    assert_eq!(controller.status().await, ControllerStatus::Idle);
}

#[tokio::test]
async fn stale_failure_does_not_touch_status() {
    let (first_tx, first_rx) = oneshot::channel();
    let (second_tx, second_rx) = oneshot::channel();
    let (backend, mut started) = ScriptedBackend::new(vec![
        Scripted::Gated(first_rx),
        Scripted::Gated(second_rx),
    ]);
    let controller = controller_with(backend);

    let first = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.run_cycle().await }
    });
    started.recv().await;
    let second = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.run_cycle().await }
    });
    started.recv().await;

    first_tx
        .send(Err(unavailable()))
        .expect("release first");
    assert!(first.await.expect("join").is_err());
    assert_eq!(
        controller.status().await,
        ControllerStatus::Busy { generation: 2 }
    );
    assert!(controller.last_error().await.is_none());

    second_tx.send(Ok(points(1))).expect("release second");
    second.await.expect("join").expect("second cycle");
    assert!(controller.last_error().await.is_none());
}

#[tokio::test]
async fn parameter_release_sends_updated_values() {
    let (backend, _started) = ScriptedBackend::new(vec![
        Scripted::Ready(Ok(points(1))),
        Scripted::Ready(Ok(points(1))),
    ]);
    let controller = controller_with(backend.clone());

    controller
        .on_parameter_release(Parameter::Radius, 9.0)
        .await
        .expect("radius");
    controller
        .on_parameter_release(Parameter::Rotate, 180.0)
        .await
        .expect("rotate");

    let seen = backend.seen.lock().await;
    assert_eq!(seen[0].radius, 9.0);
    assert_eq!(seen[0].rotate, 0.0);
    assert_eq!(seen[1].radius, 9.0);
    assert_eq!(seen[1].rotate, 180.0);
}

#[tokio::test]
async fn pipeline_runs_against_http_compute_service() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new().route(
        "/grasshopper",
        post(|Json(body): Json<serde_json::Value>| async move {
            let density = body["values"][0]["InnerTree"]["{0}"][0]["data"]
                .as_str()
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(0.0);
            let items: Vec<serde_json::Value> = (0..density as usize)
                .map(|i| {
                    json!({
                        "type": "System.String",
                        "data": json!({"type": "point", "location": [i, 0, 0]}).to_string()
                    })
                })
                .collect();
            Json(json!({"values": [{"ParamName": "RH_OUT:points", "InnerTree": {"{ 0; }": items}}]}))
        }),
    );
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let client = ComputeClient::new(ComputeClientOptions {
        base_url: format!("http://{addr}"),
        credential: None,
        timeout: None,
    })
    .expect("client");
    let controller = controller_with(Arc::new(client));

    controller
        .on_parameter_release(Parameter::Density, 4.0)
        .await
        .expect("cycle");
    assert_eq!(scene_counts(&controller).await, (2, 4));
}
