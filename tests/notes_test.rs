use async_trait::async_trait;
use atelier_backend::config::AppConfig;
use atelier_backend::entities::prelude::*;
use atelier_backend::infrastructure::database;
use atelier_backend::services::ai::{AiError, CompletionModel, ContentPart, GenerativeModel};
use atelier_backend::services::analysis::AnalysisService;
use atelier_backend::services::storage::{BlobError, BlobStore};
use atelier_backend::{AppState, create_app};
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use sea_orm::{Database, DatabaseConnection, EntityTrait, PaginatorTrait};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

struct NullBlobStore;

#[async_trait]
impl BlobStore for NullBlobStore {
    async fn put(&self, _key: &str, _data: Bytes) -> Result<(), BlobError> {
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Bytes, BlobError> {
        Err(BlobError::NotFound(key.to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), BlobError> {
        Ok(())
    }
}

struct SilentModel;

#[async_trait]
impl GenerativeModel for SilentModel {
    async fn generate(&self, _parts: &[ContentPart]) -> Result<String, AiError> {
        Ok("ok".to_string())
    }
}

#[async_trait]
impl CompletionModel for SilentModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, AiError> {
        Err(AiError::EmptyResponse)
    }
}

async fn setup() -> (axum::Router, DatabaseConnection) {
    unsafe {
        std::env::set_var("DATABASE_URL", "sqlite::memory:");
    }
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();

    let storage = Arc::new(NullBlobStore) as Arc<dyn BlobStore>;
    let config = AppConfig::default();
    let analysis = Arc::new(AnalysisService::new(
        db.clone(),
        storage.clone(),
        Arc::new(SilentModel),
        Arc::new(SilentModel),
        Arc::new(SilentModel),
        &config,
    ));

    let app = create_app(AppState {
        db: db.clone(),
        storage,
        analysis,
        config,
    });

    (app, db)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn register_and_login(app: &axum::Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/register",
            None,
            serde_json::json!({ "email": email, "password": "hunter2hunter2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/login",
            None,
            serde_json::json!({ "email": email, "password": "hunter2hunter2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn register_rejects_duplicates_and_bad_credentials() {
    let (app, _db) = setup().await;

    let _token = register_and_login(&app, "artist@example.com").await;

    // Same email again.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/register",
            None,
            serde_json::json!({ "email": "artist@example.com", "password": "hunter2hunter2" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Wrong password.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/login",
            None,
            serde_json::json!({ "email": "artist@example.com", "password": "wrong-password" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Short password at registration.
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/register",
            None,
            serde_json::json!({ "email": "second@example.com", "password": "short" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn manual_note_crud_is_owner_scoped() {
    let (app, db) = setup().await;
    let token = register_and_login(&app, "owner@example.com").await;
    let other_token = register_and_login(&app, "other@example.com").await;

    // Unauthenticated access is rejected outright.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/notes")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Create with no category: defaults to "general".
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/notes",
            Some(&token),
            serde_json::json!({ "title": "Warm-up sketches", "content": "Ten minutes of gesture drawing daily." }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let note = body_json(response).await;
    assert_eq!(note["category"], "general");
    assert_eq!(note["type"], "manual");
    let note_id = note["id"].as_str().unwrap().to_string();

    // Unknown category is rejected.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/notes",
            Some(&token),
            serde_json::json!({ "title": "x", "content": "y", "category": "misc" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Update changes content and category.
    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/notes/{}", note_id),
            Some(&token),
            serde_json::json!({ "content": "Fifteen minutes, varied poses.", "category": "technique" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["category"], "technique");
    assert_eq!(updated["content"], "Fifteen minutes, varied poses.");

    // Another user can neither see nor delete it.
    let response = app
        .clone()
        .oneshot(json_request(
            "GET",
            "/api/notes",
            Some(&other_token),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 0);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/notes/{}", note_id))
                .header("Authorization", format!("Bearer {}", other_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The owner can.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/notes/{}", note_id))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(Notes::find().count(&db).await.unwrap(), 0);
}
