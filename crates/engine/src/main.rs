//! Reverie Engine - Main entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header::HeaderName, HeaderValue, Method};
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reverie_engine::infrastructure::ports::ExecutionRepo;
use reverie_engine::infrastructure::{
    sqlite, ComfyUIClient, FsAssetStore, OllamaClient, RetryConfig, SystemClock,
};
use reverie_engine::{api, App};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the engine usually runs from `crates/engine`).
    load_dotenv_from_repo_root();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reverie_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Reverie Engine");

    let comfyui_url =
        std::env::var("COMFYUI_URL").unwrap_or_else(|_| "http://localhost:8188".into());
    let db_path = std::env::var("REVERIE_DB").unwrap_or_else(|_| "reverie.db".into());
    let assets_dir = std::env::var("ASSETS_DIR").unwrap_or_else(|_| "assets".into());
    let server_host = std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let server_port: u16 = std::env::var("SERVER_PORT")
        .or_else(|_| std::env::var("PORT"))
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .unwrap_or(3000);

    tracing::info!("Opening database at {}", db_path);
    let pool = sqlite::connect(&db_path).await?;
    let executions = Arc::new(sqlite::SqliteExecutionRepo::new(pool.clone()).await?);
    let conversations = Arc::new(sqlite::SqliteConversationRepo::new(pool).await?);

    // Executions interrupted by a previous shutdown can never finish.
    let swept = executions.fail_orphaned("interrupted by restart").await?;
    if swept > 0 {
        tracing::info!(count = swept, "Failed orphaned executions from previous run");
    }

    let llm = Arc::new(OllamaClient::from_env());
    let retry = RetryConfig::default();
    tracing::info!(
        "LLM retry configured: max_attempts={}, base_delay_ms={}",
        retry.max_attempts,
        retry.base_delay_ms
    );
    let image_gen = Arc::new(ComfyUIClient::new(&comfyui_url));
    let assets = Arc::new(FsAssetStore::new(&assets_dir));

    let app = Arc::new(App::new(
        executions,
        conversations,
        llm,
        image_gen,
        assets,
        Arc::new(SystemClock),
        retry,
    ));

    let mut router = api::routes()
        .route("/ws/turns/{id}", get(api::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app);

    if let Some(cors) = build_cors_layer_from_env() {
        router = router.layer(cors);
    }

    let addr: SocketAddr = format!("{server_host}:{server_port}").parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}

fn build_cors_layer_from_env() -> Option<CorsLayer> {
    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())?;

    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("x-user-id"),
            axum::http::header::CONTENT_TYPE,
        ]);

    if allowed_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| HeaderValue::from_str(s).ok())
            .collect();

        if origins.is_empty() {
            return None;
        }

        cors = cors.allow_origin(origins);
    }

    Some(cors)
}
