use atelier_backend::config::AppConfig;
use atelier_backend::infrastructure::{database, storage};
use atelier_backend::services::ai::{GeminiClient, OpenAiCompatClient, build_http_client};
use atelier_backend::services::analysis::AnalysisService;
use atelier_backend::{AppState, create_app};
use clap::Parser;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the API server
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initial Environment & Logging Setup
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Atelier Backend...");

    let config = AppConfig::from_env();
    info!(
        "🛡️  Config: Max Upload={}MB, Analysis Model={}, Free Quota={}/month",
        config.max_file_size / 1024 / 1024,
        config.ai.analysis_model,
        config.quotas.free
    );

    // 2. Setup Infrastructure
    let db = database::setup_database().await?;
    let blob_store = storage::setup_storage(&config).await?;

    // 3. Long-lived AI clients (one HTTP pool, per-call timeout)
    let http = build_http_client(config.ai.request_timeout_secs);
    let analysis_model = Arc::new(GeminiClient::new(
        http.clone(),
        &config.ai,
        config.ai.analysis_model.clone(),
    ));
    let title_model = Arc::new(GeminiClient::new(
        http.clone(),
        &config.ai,
        config.ai.title_model.clone(),
    ));
    let extraction_model = Arc::new(OpenAiCompatClient::new(http, &config.ai));

    let analysis = Arc::new(AnalysisService::new(
        db.clone(),
        blob_store.clone(),
        analysis_model,
        title_model,
        extraction_model,
        &config,
    ));

    let state = AppState {
        db,
        storage: blob_store,
        analysis,
        config: config.clone(),
    };

    let app = create_app(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(config.max_file_size));

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
