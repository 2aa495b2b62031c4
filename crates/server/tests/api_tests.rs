//! In-process API tests.
//!
//! These drive the axum router directly with a mock transfer engine behind
//! the orchestrator, so no socket or radio is involved.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use dfufleet_core::{
    testing::MockTransferEngine, Config, DfuOrchestrator, EngineEvent, OrchestratorConfig,
    TransferEngine,
};
use dfufleet_server::api::create_router;
use dfufleet_server::state::AppState;

/// In-process server fixture with a controllable mock engine.
struct TestServer {
    app: Router,
    engine: Arc<MockTransferEngine>,
    firmware_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestServer {
    fn new(max_parallel: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let firmware_path = temp_dir.path().join("fw.zip");
        let mut file = std::fs::File::create(&firmware_path).unwrap();
        file.write_all(&[0x50, 0x4b, 0x03, 0x04]).unwrap();
        file.write_all(b"payload").unwrap();

        let engine = Arc::new(MockTransferEngine::new());
        let orchestrator = Arc::new(DfuOrchestrator::new(
            OrchestratorConfig {
                max_parallel,
                event_buffer: 256,
            },
            Arc::clone(&engine) as Arc<dyn TransferEngine>,
        ));

        let state = Arc::new(AppState::new(Config::default(), orchestrator));
        let app = create_router(state);

        Self {
            app,
            engine,
            firmware_path,
            _temp_dir: temp_dir,
        }
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = match body {
            Some(body) => Request::builder()
                .method(method)
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => Request::builder()
                .method(method)
                .uri(path)
                .body(Body::empty())
                .unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).to_string(),
            ))
        };
        (status, body)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.request("GET", path, None).await
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", path, Some(body)).await
    }

    fn start_body(&self, address: &str) -> Value {
        json!({
            "address": address,
            "filePath": self.firmware_path,
        })
    }
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::new(2);
    let (status, body) = server.get("/api/v1/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_start_dfu_success() {
    let server = TestServer::new(2);

    let (status, body) = server
        .post("/api/v1/dfu", server.start_body("AA:BB:CC:DD:EE:FF"))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["address"], "AA:BB:CC:DD:EE:FF");
    assert_eq!(
        server.engine.begun_addresses(),
        vec!["AA:BB:CC:DD:EE:FF".to_string()]
    );
}

#[tokio::test]
async fn test_start_dfu_missing_file_path() {
    let server = TestServer::new(2);

    let (status, body) = server
        .post("/api/v1/dfu", json!({"address": "AA:BB:CC:DD:EE:FF"}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ABNORMAL_PARAMETER");
    assert!(server.engine.begun_addresses().is_empty());
}

#[tokio::test]
async fn test_start_dfu_missing_address() {
    let server = TestServer::new(2);

    let (status, body) = server
        .post("/api/v1/dfu", json!({"filePath": server.firmware_path}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ABNORMAL_PARAMETER");
}

#[tokio::test]
async fn test_start_dfu_bad_firmware() {
    let server = TestServer::new(2);

    let (status, body) = server
        .post(
            "/api/v1/dfu",
            json!({"address": "AA:BB", "filePath": "/nonexistent/fw.zip"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "FIRMWARE_INVALID");
}

#[tokio::test]
async fn test_start_dfu_already_active() {
    let server = TestServer::new(2);

    let (status, _) = server.post("/api/v1/dfu", server.start_body("AA:BB")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server.post("/api/v1/dfu", server.start_body("AA:BB")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "ALREADY_ACTIVE");
}

#[tokio::test]
async fn test_start_dfu_parallel_limit() {
    let server = TestServer::new(1);

    let (status, _) = server.post("/api/v1/dfu", server.start_body("AA:01")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server.post("/api/v1/dfu", server.start_body("AA:02")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "PARALLEL_LIMIT_REACHED");
}

#[tokio::test]
async fn test_list_sessions_and_terminal_removal() {
    let server = TestServer::new(2);

    server.post("/api/v1/dfu", server.start_body("AA:BB")).await;

    let (status, body) = server.get("/api/v1/dfu").await;
    assert_eq!(status, StatusCode::OK);
    let sessions = body["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["device_address"], "AA:BB");
    assert_eq!(sessions[0]["state"], "idle");

    server.engine.emit("AA:BB", EngineEvent::Completed);

    let (_, body) = server.get("/api/v1/dfu").await;
    assert!(body["sessions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_abort_unknown_address() {
    let server = TestServer::new(2);

    let (status, body) = server
        .post("/api/v1/dfu/abort", json!({"address": "AA:BB"}))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "INVALID_ADDRESS");
}

#[tokio::test]
async fn test_abort_all_with_no_sessions() {
    let server = TestServer::new(2);

    let (status, body) = server.post("/api/v1/dfu/abort", json!({})).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NO_ACTIVE_DFU");
}

#[tokio::test]
async fn test_abort_all_acks_every_session() {
    let server = TestServer::new(2);

    server.post("/api/v1/dfu", server.start_body("AA:01")).await;
    server.post("/api/v1/dfu", server.start_body("AA:02")).await;

    let (status, body) = server.post("/api/v1/dfu/abort", json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let mut aborted: Vec<String> = body["aborted"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    aborted.sort();
    assert_eq!(aborted, vec!["AA:01".to_string(), "AA:02".to_string()]);

    // Abort is an ack, not a termination: sessions stay live until the
    // engine reports them gone.
    let (_, body) = server.get("/api/v1/dfu").await;
    assert_eq!(body["sessions"].as_array().unwrap().len(), 2);

    server.engine.emit("AA:01", EngineEvent::Aborted);
    server.engine.emit("AA:02", EngineEvent::Aborted);

    let (_, body) = server.get("/api/v1/dfu").await;
    assert!(body["sessions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_abort_single_session() {
    let server = TestServer::new(2);

    server.post("/api/v1/dfu", server.start_body("AA:01")).await;
    server.post("/api/v1/dfu", server.start_body("AA:02")).await;

    let (status, body) = server
        .post("/api/v1/dfu/abort", json!({"address": "AA:01"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["aborted"], json!(["AA:01"]));
    assert_eq!(server.engine.aborted_addresses(), vec!["AA:01".to_string()]);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let server = TestServer::new(2);

    server.post("/api/v1/dfu", server.start_body("AA:BB")).await;

    let (status, body) = server.get("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("dfufleet_sessions_started_total"));
}

#[tokio::test]
async fn test_config_endpoint() {
    let server = TestServer::new(2);

    let (status, body) = server.get("/api/v1/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["server"]["port"], 8080);
    assert_eq!(body["engine"]["backend"], "simulated");
}
