use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use envconfig::Envconfig;
use http_body_util::BodyExt;
use patient_edu::{
    backend::{MemoryFileStorage, MemorySpreadsheet, StoredFile},
    clock::ManualClock,
    config::Config,
    create_app, AppState,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;
use tower::ServiceExt;

struct TestApp {
    app: Router,
    files: Arc<MemoryFileStorage>,
    sheets: Arc<MemorySpreadsheet>,
    clock: Arc<ManualClock>,
}

fn test_app(vars: &[(&str, &str)]) -> TestApp {
    let mut env: HashMap<String, String> = HashMap::from([
        ("STORAGE_BACKEND".to_string(), "memory".to_string()),
        ("MAIN_FOLDER_ID".to_string(), "root".to_string()),
    ]);
    for (key, value) in vars {
        env.insert(key.to_string(), value.to_string());
    }
    let config = Config::init_from_hashmap(&env).unwrap();

    let files = Arc::new(MemoryFileStorage::new());
    let sheets = Arc::new(MemorySpreadsheet::new());
    let clock = Arc::new(ManualClock::new());
    let state = AppState::with_backends(config, files.clone(), sheets.clone(), clock.clone());

    TestApp {
        app: create_app(state),
        files,
        sheets,
        clock,
    }
}

fn from_peer(mut request: Request<Body>, peer: [u8; 4]) -> Request<Body> {
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((peer, 40000))));
    request
}

fn get(uri: &str) -> Request<Body> {
    from_peer(Request::get(uri).body(Body::empty()).unwrap(), [127, 0, 0, 1])
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    from_peer(
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        [127, 0, 0, 1],
    )
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn media(id: &str, name: &str, mime: &str, size: u64) -> StoredFile {
    StoredFile {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: mime.to_string(),
        size: Some(size),
    }
}

#[tokio::test]
async fn test_root_reports_running() {
    let t = test_app(&[]);
    let (status, headers, body) = send(&t.app, get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["message"].as_str().unwrap().contains("running"));
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers["x-ratelimit-limit"], "60");
}

#[tokio::test]
async fn test_health_healthy_then_degraded() {
    let t = test_app(&[]);
    let (status, _, body) = send(&t.app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["drive"], "connected");
    assert_eq!(body["services"]["sheets"], "connected");

    t.files.set_unreachable(true);
    let (status, _, body) = send(&t.app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"]["drive"], "error");
}

#[tokio::test]
async fn test_diseases_and_symptom_types() {
    let t = test_app(&[]);

    let (status, _, body) = send(&t.app, get("/api/diseases")).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["diseases"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["diabetes", "hypertension", "cardiac"]);

    let (status, _, body) = send(&t.app, get("/api/symptoms/types")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["types"].as_array().unwrap().len(), 4);
    assert_eq!(body["types"][2]["name"], "فشار خون");
}

#[tokio::test]
async fn test_unknown_category_is_404() {
    let t = test_app(&[]);
    let (status, _, body) = send(&t.app, get("/api/videos/flu")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
    assert_eq!(body["error"], "not_found");
    assert!(body["message"].as_str().unwrap().contains("flu"));
    assert_eq!(t.files.list_calls(), 0);
}

#[tokio::test]
async fn test_videos_are_listed_and_cached() {
    let t = test_app(&[("VIDEO_CACHE_DURATION", "1800")]);
    t.files.add_folder("root", "diab", "Diabetes Mellitus");
    t.files.add_file("diab", media("v1", "intro.mp4", "video/mp4", 2048));
    t.files.add_file("diab", media("d1", "diet.pdf", "application/pdf", 512));
    t.files.add_file("diab", media("x1", "notes.txt", "text/plain", 10));

    let (status, _, body) = send(&t.app, get("/api/videos/diabetes")).await;
    assert_eq!(status, StatusCode::OK);
    let videos = body["videos"].as_array().unwrap();
    assert_eq!(videos.len(), 2);
    assert_eq!(videos[0]["type"], "document");
    assert_eq!(videos[1]["id"], "v1");
    assert_eq!(videos[1]["type"], "video");
    assert_eq!(videos[1]["size"], 2048);
    assert_eq!(videos[1]["url"], "https://drive.google.com/file/d/v1/preview");

    send(&t.app, get("/api/videos/diabetes")).await;
    assert_eq!(t.files.list_calls(), 1);

    t.clock.advance(Duration::from_secs(1800));
    send(&t.app, get("/api/videos/diabetes")).await;
    assert_eq!(t.files.list_calls(), 2);
}

#[tokio::test]
async fn test_missing_folder_gives_empty_list() {
    let t = test_app(&[]);
    let (status, _, body) = send(&t.app, get("/api/videos/cardiac")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["videos"], json!([]));
}

#[tokio::test]
async fn test_save_then_read_history() {
    let t = test_app(&[]);

    let (status, _, body) = send(
        &t.app,
        post_json(
            "/api/symptoms",
            json!({"user_id": "user_alice", "symptom_type": "فشار خون", "value": "120/80"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _, _) = send(
        &t.app,
        post_json(
            "/api/symptoms",
            json!({"userId": "user_alice", "symptomType": "weight", "value": "72.5"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let rows = t.sheets.sheet_rows("User_user_alice").unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], vec!["تاریخ", "ساعت", "نوع علامت", "مقدار"]);

    let (status, _, body) = send(&t.app, get("/api/history?user_id=user_alice")).await;
    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["type"], "فشار خون");
    assert_eq!(data[0]["value"], "120/80");
    assert_eq!(data[1]["type"], "وزن");

    let (status, _, body) = send(
        &t.app,
        post_json(
            "/api/symptoms/history",
            json!({"user_id": "user_alice", "symptom_filter": "وزن"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["value"], "72.5");
}

#[tokio::test]
async fn test_unknown_user_has_empty_history() {
    let t = test_app(&[]);
    let (status, _, body) = send(&t.app, get("/api/history?user_id=user_nobody")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_invalid_submissions_are_422() {
    let t = test_app(&[]);
    let cases = [
        json!({"user_id": "alice_123", "symptom_type": "وزن", "value": "70"}),
        json!({"user_id": "user_alice", "symptom_type": "سرفه", "value": "70"}),
        json!({"user_id": "user_alice", "symptom_type": "قند ناشتا", "value": "999"}),
        json!({"user_id": "user_alice", "symptom_type": "فشار خون", "value": "80/120"}),
        json!({"user_id": "user_alice", "symptom_type": "وزن"}),
    ];

    for case in cases {
        let (status, _, body) = send(&t.app, post_json("/api/symptoms", case.clone())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "case {case}");
        assert_eq!(body["code"], 422);
        assert_eq!(body["error"], "validation_error");
    }

    assert!(t.sheets.sheet_rows("User_user_alice").is_none());
    assert_eq!(t.sheets.sheets_created(), 0);
}

#[tokio::test]
async fn test_malformed_json_is_422() {
    let t = test_app(&[]);
    let request = from_peer(
        Request::post("/api/symptoms")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
        [127, 0, 0, 1],
    );
    let (status, _, body) = send(&t.app, request).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_glucose_message_names_the_range() {
    let t = test_app(&[]);
    let (_, _, body) = send(
        &t.app,
        post_json(
            "/api/symptoms",
            json!({"user_id": "user_alice", "symptom_type": "قند ناشتا", "value": "999"}),
        ),
    )
    .await;

    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("مقدار نامعتبر"));
    assert!(message.contains("600"));
}

#[tokio::test]
async fn test_history_requires_valid_user_id() {
    let t = test_app(&[]);
    let (status, _, _) = send(&t.app, get("/api/history?user_id=bob")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _, _) = send(&t.app, get("/api/history")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_backend_failure_is_opaque_500() {
    let t = test_app(&[]);
    t.sheets.set_fail_appends(true);

    let (status, _, body) = send(
        &t.app,
        post_json(
            "/api/symptoms",
            json!({"user_id": "user_alice", "symptom_type": "وزن", "value": "70"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "internal_error");
    assert_eq!(body["message"], "خطای داخلی سرور");
}

#[tokio::test]
async fn test_rate_limit_per_client() {
    let t = test_app(&[("MAX_REQUESTS_PER_MINUTE", "3")]);

    for _ in 0..3 {
        let (status, _, _) = send(&t.app, get("/api/contact")).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, headers, body) = send(&t.app, get("/api/contact")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], 429);
    assert_eq!(headers[header::RETRY_AFTER], "60");

    // Another peer has its own window.
    let other = from_peer(Request::get("/api/contact").body(Body::empty()).unwrap(), [10, 0, 0, 2]);
    let (status, _, _) = send(&t.app, other).await;
    assert_eq!(status, StatusCode::OK);

    t.clock.advance(Duration::from_secs(60));
    let (status, _, _) = send(&t.app, get("/api/contact")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_contact_info() {
    let t = test_app(&[]);
    let (status, _, body) = send(&t.app, get("/api/contact")).await;

    assert_eq!(status, StatusCode::OK);
    for field in ["eitaa", "phone", "email", "address"] {
        assert!(body[field].is_string(), "missing {field}");
    }
    assert_eq!(body["eitaa"], "https://eitaa.com/joinchat/6055926614C5ed07fc3f6");
    assert_eq!(body["phone"], "021-12345678");

    let t = test_app(&[("CONTACT_EMAIL", "clinic@example.org")]);
    let (_, _, body) = send(&t.app, get("/api/contact")).await;
    assert_eq!(body["email"], "clinic@example.org");
}

#[tokio::test]
async fn test_history_filter_accepts_symptom_id() {
    let t = test_app(&[]);
    for (kind, value) in [("weight", "75"), ("fasting_glucose", "95")] {
        let (status, _, _) = send(
            &t.app,
            post_json(
                "/api/symptoms",
                json!({"user_id": "user_abc12", "symptom_type": kind, "value": value}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _, body) = send(
        &t.app,
        get("/api/history?user_id=user_abc12&symptom_filter=weight"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["type"], "وزن");
    assert_eq!(data[0]["value"], "75");
}

#[tokio::test]
async fn test_persian_digits_are_accepted() {
    let t = test_app(&[]);
    for (kind, value) in [("weight", "۷۵"), ("blood_pressure", "۱۲۰/۸۰")] {
        let (status, _, body) = send(
            &t.app,
            post_json(
                "/api/symptoms",
                json!({"user_id": "user_fa001", "symptom_type": kind, "value": value}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{kind} {value}: {body}");
    }

    let (_, _, body) = send(&t.app, get("/api/history?user_id=user_fa001")).await;
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[1]["value"], "۱۲۰/۸۰");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let t = test_app(&[]);
    let (status, _, body) = send(&t.app, get("/api/unknown")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_submissions_create_one_sheet() {
    let t = test_app(&[("MAX_REQUESTS_PER_MINUTE", "100")]);

    let mut handles = Vec::new();
    for i in 0..10 {
        let app = t.app.clone();
        handles.push(tokio::spawn(async move {
            let request = post_json(
                "/api/symptoms",
                json!({"user_id": "user_bob", "symptom_type": "وزن", "value": format!("{}", 60 + i)}),
            );
            app.oneshot(request).await.map(|response| response.status())
        }));
    }

    for handle in handles {
        let status = assert_ok!(handle.await.unwrap());
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(t.sheets.sheets_created(), 1);
    assert_eq!(t.sheets.sheet_rows("User_user_bob").unwrap().len(), 11);
}
