pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::analysis::AnalysisService;
use crate::services::storage::BlobStore;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::analyze::analyze,
        api::handlers::chat::chat,
        api::handlers::conversations::get_conversation,
        api::handlers::conversations::list_conversations,
        api::handlers::conversations::delete_conversation,
        api::handlers::files::upload_file,
        api::handlers::files::list_files,
        api::handlers::files::file_content,
        api::handlers::files::delete_file,
        api::handlers::notes::list_notes,
        api::handlers::notes::create_note,
        api::handlers::notes::update_note,
        api::handlers::notes::delete_note,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::auth::RegisterRequest,
            api::handlers::auth::LoginRequest,
            api::handlers::auth::AuthResponse,
            api::handlers::analyze::AnalyzeRequest,
            api::handlers::analyze::AnalyzeResponse,
            api::handlers::chat::ChatRequest,
            api::handlers::chat::ChatResponse,
            api::handlers::conversations::ConversationViewResponse,
            api::handlers::conversations::ConversationListResponse,
            api::handlers::conversations::ConversationSummary,
            api::handlers::files::UploadResponse,
            api::handlers::notes::CreateNoteRequest,
            api::handlers::notes::UpdateNoteRequest,
            api::handlers::types::ConversationDto,
            api::handlers::types::MessageDto,
            api::handlers::types::FileDto,
            api::handlers::types::NoteDto,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "auth", description = "Authentication endpoints"),
        (name = "analysis", description = "AI critique and follow-up chat"),
        (name = "files", description = "Upload session file management"),
        (name = "notes", description = "Saved insight notes")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn BlobStore>,
    pub analysis: Arc<AnalysisService>,
    pub config: AppConfig,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/api/register", post(api::handlers::auth::register))
        .route("/api/login", post(api::handlers::auth::login))
        .route(
            "/api/analyze",
            post(api::handlers::analyze::analyze).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::optional_auth_middleware,
            )),
        )
        .route("/api/chat", post(api::handlers::chat::chat))
        .route(
            "/api/conversation/:session_id",
            get(api::handlers::conversations::get_conversation)
                .delete(api::handlers::conversations::delete_conversation)
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::optional_auth_middleware,
                )),
        )
        .route(
            "/api/conversations",
            get(api::handlers::conversations::list_conversations).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .route(
            "/api/upload",
            post(api::handlers::files::upload_file)
                .layer(axum::extract::DefaultBodyLimit::max(
                    state.config.max_file_size + 10 * 1024 * 1024, // multipart overhead headroom
                ))
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::optional_auth_middleware,
                )),
        )
        .route("/api/files", get(api::handlers::files::list_files))
        .route(
            "/api/files/:id/content",
            get(api::handlers::files::file_content),
        )
        .route(
            "/api/files/:id",
            axum::routing::delete(api::handlers::files::delete_file).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::optional_auth_middleware,
            )),
        )
        .route(
            "/api/notes",
            get(api::handlers::notes::list_notes)
                .post(api::handlers::notes::create_note)
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .route(
            "/api/notes/:id",
            axum::routing::put(api::handlers::notes::update_note)
                .delete(api::handlers::notes::delete_note)
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .with_state(state)
}
