//! End-to-end tests for the HTTP gateway.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::{header, HeaderValue, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use nautic_core::{AuthConfig, FailurePolicy, FnCapability, HasherConfig};
use nautic_gateway::vision::{
    AnnotatedImage, BoundingBox, Detection, DetectionReport, ImageSize, ModelFile, VisionError,
    VISION_CAPABILITY,
};
use nautic_gateway::{create_router, AppState, GatewayConfig, ModelLoader, VisionBackend};
use serde_json::{json, Value};

/// Reports one detection and echoes the upload back as the "annotated" image.
struct FakeBackend;

impl VisionBackend for FakeBackend {
    fn model_name(&self) -> &str {
        "fake-hull-inspector"
    }

    fn detect(&self, image: &[u8], confidence: f32) -> Result<DetectionReport, VisionError> {
        if image.starts_with(b"garbage") {
            return Err(VisionError::InvalidImage("unrecognized format".to_string()));
        }
        let size = ImageSize {
            width: 640,
            height: 480,
        };
        let bbox = BoundingBox {
            x1: 64.0,
            y1: 48.0,
            x2: 320.0,
            y2: 240.0,
        };
        let detections = if confidence <= 0.8 {
            vec![Detection {
                class_id: 4,
                class_name: "corrosion".to_string(),
                confidence: 0.8,
                bbox,
                bbox_normalized: bbox.normalized(size),
            }]
        } else {
            Vec::new()
        };
        Ok(DetectionReport {
            detections,
            image_size: size,
            inference_time_ms: 12.5,
        })
    }

    fn annotate(&self, image: &[u8], confidence: f32) -> Result<AnnotatedImage, VisionError> {
        let report = self.detect(image, confidence)?;
        Ok(AnnotatedImage {
            jpeg: image.to_vec(),
            detection_count: report.detections.len(),
            image_size: report.image_size,
            inference_time_ms: report.inference_time_ms,
        })
    }
}

fn config() -> GatewayConfig {
    GatewayConfig::default()
        .with_auth(AuthConfig::with_secret("gateway-test-secret").with_hasher(HasherConfig::fast()))
        .with_failure_policy(FailurePolicy::Sticky)
}

/// Server whose vision capability counts initializer calls.
fn server_with_vision(available: bool) -> (TestServer, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let vision = FnCapability::new(VISION_CAPABILITY, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if available {
                Ok(Arc::new(FakeBackend) as Arc<dyn VisionBackend>)
            } else {
                Err("model file not found".to_string())
            }
        }
    });

    let state = AppState::with_vision(config(), vision).unwrap();
    (TestServer::new(create_router(state)).unwrap(), calls)
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).unwrap()
}

fn image_form() -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(b"\xff\xd8\xff\xe0fake-jpeg".to_vec())
            .file_name("hull.jpg")
            .mime_type("image/jpeg"),
    )
}

async fn register(server: &TestServer, username: &str, password: &str) -> String {
    let response = server
        .post("/auth/register")
        .json(&json!({ "username": username, "password": password }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_register_login_verify() {
    let (server, _) = server_with_vision(true);

    let response = server
        .post("/auth/register")
        .json(&json!({ "username": "alice", "password": "wonderland" }))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 3600);

    let response = server
        .post("/auth/login")
        .json(&json!({ "username": "alice", "password": "wonderland" }))
        .await;
    response.assert_status_ok();
    let token = response.json::<Value>()["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = server
        .get("/auth/verify")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["valid"], true);
    assert_eq!(body["username"], "alice");
    assert!(body["expires_at"].is_string());
}

#[tokio::test]
async fn test_login_failures_are_uniform() {
    let (server, _) = server_with_vision(true);
    register(&server, "alice", "wonderland").await;

    let wrong_password = server
        .post("/auth/login")
        .json(&json!({ "username": "alice", "password": "wrong" }))
        .await;
    let unknown_user = server
        .post("/auth/login")
        .json(&json!({ "username": "bob", "password": "wonderland" }))
        .await;

    wrong_password.assert_status(StatusCode::UNAUTHORIZED);
    unknown_user.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        wrong_password.json::<Value>(),
        unknown_user.json::<Value>()
    );
    assert_eq!(wrong_password.json::<Value>()["message"], "invalid credentials");
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_empty_fields() {
    let (server, _) = server_with_vision(true);
    register(&server, "alice", "wonderland").await;

    let duplicate = server
        .post("/auth/register")
        .json(&json!({ "username": "alice", "password": "other" }))
        .await;
    duplicate.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.json::<Value>()["code"], "BAD_REQUEST");

    let empty = server
        .post("/auth/register")
        .json(&json!({ "username": "", "password": "x" }))
        .await;
    empty.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_verify_rejects_bad_tokens() {
    let (server, _) = server_with_vision(true);

    server
        .get("/auth/verify")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .get("/auth/verify")
        .add_header(header::AUTHORIZATION, bearer("not.a.token"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.header(header::WWW_AUTHENTICATE), "Bearer");
}

#[tokio::test]
async fn test_detect_requires_token_before_touching_vision() {
    let (server, calls) = server_with_vision(true);

    server
        .post("/vision/detect")
        .multipart(image_form())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    server
        .post("/vision/detect")
        .add_header(header::AUTHORIZATION, bearer("forged"))
        .multipart(image_form())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_detect_with_unavailable_backend() {
    let (server, calls) = server_with_vision(false);
    let token = register(&server, "alice", "wonderland").await;

    for _ in 0..3 {
        let response = server
            .post("/vision/detect")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .multipart(image_form())
            .await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.json::<Value>()["message"],
            "vision service not available"
        );
    }

    // Sticky policy: one attempt, shared by every later call.
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let health = server.get("/health").await.json::<Value>();
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["auth"], "available");
    assert_eq!(health["vision"], "unavailable");
}

#[tokio::test]
async fn test_detect() {
    let (server, calls) = server_with_vision(true);
    let token = register(&server, "alice", "wonderland").await;

    let response = server
        .post("/vision/detect")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(image_form())
        .await;
    response.assert_status_ok();

    let body = response.json::<Value>();
    assert_eq!(body["model"], "fake-hull-inspector");
    assert_eq!(body["detection_count"], 1);
    assert_eq!(body["detections"][0]["class_name"], "corrosion");
    assert_eq!(body["image_size"]["width"], 640);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // A high threshold filters the detection out.
    let response = server
        .post("/vision/detect")
        .add_query_param("confidence", 0.95)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(image_form())
        .await;
    assert_eq!(response.json::<Value>()["detection_count"], 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_detect_rejects_bad_uploads() {
    let (server, _) = server_with_vision(true);
    let token = register(&server, "alice", "wonderland").await;

    let wrong_field = MultipartForm::new().add_part("image", Part::bytes(b"data".to_vec()));
    server
        .post("/vision/detect")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(wrong_field)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let garbage = MultipartForm::new().add_part("file", Part::bytes(b"garbage".to_vec()));
    server
        .post("/vision/detect")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(garbage)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post("/vision/detect")
        .add_query_param("confidence", 2.0)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(image_form())
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_annotate_returns_image_with_headers() {
    let (server, _) = server_with_vision(true);
    let token = register(&server, "alice", "wonderland").await;

    let response = server
        .post("/vision/annotate")
        .add_query_param("confidence", 0.5)
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(image_form())
        .await;
    response.assert_status_ok();

    assert_eq!(response.header(header::CONTENT_TYPE), "image/jpeg");
    assert_eq!(response.header("x-detection-count"), "1");
    assert_eq!(response.header("x-image-width"), "640");
    assert_eq!(response.header("x-image-height"), "480");
    assert_eq!(
        response.header(header::CONTENT_DISPOSITION),
        "inline; filename=detected_hull.jpg"
    );
    assert_eq!(response.as_bytes().as_ref(), b"\xff\xd8\xff\xe0fake-jpeg");
}

#[tokio::test]
async fn test_health_and_info_do_not_initialize() {
    let (server, calls) = server_with_vision(true);

    let health = server.get("/health").await;
    health.assert_status_ok();
    let body = health.json::<Value>();
    assert_eq!(body["auth"], "available");
    assert_eq!(body["capabilities"][0]["name"], "auth");
    assert_eq!(body["capabilities"][0]["state"], "unknown");
    assert_eq!(body["capabilities"][1]["name"], "vision");

    let info = server.get("/").await.json::<Value>();
    assert_eq!(info["name"], "Nautic API");
    assert_eq!(info["endpoints"]["vision"][0], "/vision/detect");

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_model_file_capability_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("best.pt");
    std::fs::write(&model_path, b"weights").unwrap();

    let loader: ModelLoader = Arc::new(|model: ModelFile| {
        assert_eq!(model.size(), 7);
        Ok(Arc::new(FakeBackend) as Arc<dyn VisionBackend>)
    });
    let state = AppState::new(config().with_model_path(&model_path), loader).unwrap();
    let server = TestServer::new(create_router(state)).unwrap();

    let health = server.get("/health").await.json::<Value>();
    assert_eq!(health["vision"], "available");

    let token = register(&server, "alice", "wonderland").await;
    server
        .post("/vision/detect")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .multipart(image_form())
        .await
        .assert_status_ok();

    let health = server.get("/health").await.json::<Value>();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["capabilities"][1]["state"], "available");
}

#[tokio::test]
async fn test_slow_probe_does_not_stall_the_runtime() {
    let vision = FnCapability::new(VISION_CAPABILITY, || async {
        Ok(Arc::new(FakeBackend) as Arc<dyn VisionBackend>)
    })
    .with_probe(|| {
        std::thread::sleep(std::time::Duration::from_millis(300));
        true
    });
    let state = AppState::with_vision(config(), vision).unwrap();
    let server = TestServer::new(create_router(state)).unwrap();

    let ticks = Arc::new(AtomicUsize::new(0));
    let ticker = {
        let ticks = ticks.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    let health = server.get("/health").await.json::<Value>();
    ticker.abort();

    assert_eq!(health["vision"], "available");
    assert!(ticks.load(Ordering::SeqCst) >= 5);
}
