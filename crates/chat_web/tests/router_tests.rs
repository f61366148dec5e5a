use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chat_core::blob::{BlobStore, BlobUploader, PutOptions, CACHE_CONTROL};
use chat_core::openai::call::CompletionChoice;
use chat_core::openai::mock::MockChatModel;
use chat_core::sqlite::{Db, MessageLog, SharedDb, SqliteBlobStore};
use chat_core::{AppConfig, ChatService, ToolDispatcher};
use chat_web::{build_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;
use tracing_subscriber::EnvFilter;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[ctor::ctor]
fn _init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}

struct TestApp {
    router: Router,
    db: SharedDb,
    store: Arc<SqliteBlobStore>,
}

fn app(completions: Vec<CompletionChoice>, api_key: Option<&str>) -> TestApp {
    let db = Db::in_memory().unwrap().into_shared();
    let store = Arc::new(SqliteBlobStore::new(db.clone()));
    let uploader = BlobUploader::new(store.clone(), "http://localhost:3000/?key=");
    let dispatcher = ToolDispatcher::new(Arc::new(MockChatModel::new(completions)), uploader);
    let chat = Arc::new(ChatService::new(dispatcher).with_log(MessageLog::new(db.clone())));
    let router = build_router(AppState::new(chat, store.clone(), api_key.map(str::to_string)));
    TestApp { router, db, store }
}

fn post() -> axum::http::request::Builder {
    Request::builder().method(Method::POST).uri("/").header(header::CONTENT_TYPE, "application/json")
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec(), headers)
}

fn json_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

#[tokio::test]
async fn chat_returns_json_string_and_logs_exchange() {
    let t = app(vec![CompletionChoice::text("Hello there")], None);
    let body = r#"{"messages":[{"role":"user","content":"hi"}]}"#;
    let req = post().header("x-forwarded-for", "203.0.113.7").body(Body::from(body)).unwrap();

    let (status, bytes, _) = send(&t.router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&bytes), json!("Hello there"));

    let rows = MessageLog::new(t.db.clone()).recent(10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!((rows[0].ip.as_str(), rows[0].prompt.as_str()), ("203.0.113.7", "hi"));
}

#[tokio::test]
async fn prompt_field_stands_in_for_messages() {
    let t = app(vec![CompletionChoice::text("ok")], None);
    let body = r#"{"prompt":"just a prompt"}"#;
    let (status, bytes, _) = send(&t.router, post().body(Body::from(body)).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&bytes), json!("ok"));
}

#[tokio::test]
async fn bad_bodies_are_rejected() {
    let t = app(vec![], None);
    let (status, bytes, _) = send(&t.router, post().body(Body::from("{not json")).unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_body(&bytes)["error"].as_str().unwrap().starts_with("Invalid request body"));

    let (status, bytes, _) = send(&t.router, post().body(Body::from("{}")).unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&bytes), json!({"error": "No messages provided"}));
}

#[tokio::test]
async fn dispatch_errors_become_500() {
    let t = app(vec![CompletionChoice::tool_call("read_website_content", "{oops")], None);
    let body = r#"{"messages":[{"role":"user","content":"read it"}]}"#;
    let (status, bytes, _) = send(&t.router, post().body(Body::from(body)).unwrap()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_body(&bytes)["error"].as_str().unwrap().contains("read_website_content"));
    assert!(MessageLog::new(t.db.clone()).recent(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn api_key_guards_post_only() {
    let t = app(vec![CompletionChoice::text("a"), CompletionChoice::text("b")], Some("s3cret"));
    let body = r#"{"prompt":"x"}"#;

    let (status, _, _) = send(&t.router, post().body(Body::from(body)).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = post().header("x-api-key", "s3cret").body(Body::from(body)).unwrap();
    assert_eq!(send(&t.router, req).await.0, StatusCode::OK);

    let req = post().header(header::AUTHORIZATION, "Bearer s3cret").body(Body::from(body)).unwrap();
    assert_eq!(send(&t.router, req).await.0, StatusCode::OK);

    // GET は認証なしで使える
    let req = Request::builder().uri("/?key=missing.png").body(Body::empty()).unwrap();
    assert_eq!(send(&t.router, req).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn image_endpoint_serves_stored_bytes() {
    let t = app(vec![], None);
    let opts = PutOptions { content_type: "image/png".into(), cache_control: CACHE_CONTROL.into() };
    t.store.put("image-42-abcd.png", &[9, 8, 7], &opts).await.unwrap();

    let req = Request::builder().uri("/?key=image-42-abcd.png").body(Body::empty()).unwrap();
    let (status, bytes, headers) = send(&t.router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, vec![9, 8, 7]);
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=31536000");

    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let (status, bytes, _) = send(&t.router, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&bytes), json!({"error": "No key provided"}));

    let req = Request::builder().uri("/?key=nope").body(Body::empty()).unwrap();
    let (status, bytes, _) = send(&t.router, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&bytes), json!({"error": "No image found"}));
}

#[tokio::test]
async fn other_methods_are_not_allowed() {
    let t = app(vec![], None);
    let req = Request::builder().method(Method::DELETE).uri("/").body(Body::empty()).unwrap();
    assert_eq!(send(&t.router, req).await.0, StatusCode::METHOD_NOT_ALLOWED);
}

/// 本番と同じ構成 (ChatService::from_config) を偽の OpenAI 互換サーバに向けて通す
#[tokio::test]
async fn production_wiring_against_fake_openai() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "gpt-4-1106-preview",
            "choices": [{ "index": 0, "message": {"role": "assistant", "content": "from fake"}, "finish_reason": "stop" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let config = AppConfig::from_lookup(|k| match k {
        "OPENAI_API_KEY" => Some("sk-test".to_string()),
        "OPENAI_API_BASE" => Some(uri.clone()),
        _ => None,
    })
    .unwrap();
    let db = Db::in_memory().unwrap().into_shared();
    let chat = Arc::new(ChatService::from_config(&config, db.clone()));
    let router = build_router(AppState::new(chat, Arc::new(SqliteBlobStore::new(db)), None));

    let body = r#"{"messages":[{"role":"user","content":"ping"}]}"#;
    let (status, bytes, _) = send(&router, post().body(Body::from(body)).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&bytes), json!("from fake"));
}
