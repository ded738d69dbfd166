use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use slotwise::config::AppConfig;
use slotwise::handlers;
use slotwise::services::ai::groq::GroqProvider;
use slotwise::services::ai::ollama::OllamaProvider;
use slotwise::services::ai::LlmProvider;
use slotwise::services::engine::Engine;
use slotwise::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let llm: Option<Arc<dyn LlmProvider>> = match config.llm_provider.as_str() {
        "groq" => {
            anyhow::ensure!(!config.groq_api_key.is_empty(), "GROQ_API_KEY must be set when LLM_PROVIDER=groq");
            tracing::info!("using Groq LLM provider (model: {})", config.groq_model);
            Some(Arc::new(GroqProvider::new(config.groq_api_key.clone(), config.groq_model.clone())))
        }
        "ollama" => {
            tracing::info!("using Ollama LLM provider (url: {}, model: {})", config.ollama_url, config.ollama_model);
            Some(Arc::new(OllamaProvider::new(config.ollama_url.clone(), config.ollama_model.clone())))
        }
        "none" => {
            tracing::info!("no LLM provider configured, using keyword rules only");
            None
        }
        other => anyhow::bail!("unknown LLM_PROVIDER {other:?}, expected groq, ollama or none"),
    };

    let state = Arc::new(AppState {
        engine: Engine::new(llm, config.oracle_timeout),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/query", post(handlers::query::parse_query))
        .route("/api/email/analyze", post(handlers::email::analyze_email))
        .route("/api/slots", post(handlers::slots::recommend_slots))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
