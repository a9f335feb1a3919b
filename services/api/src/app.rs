//! services/api/src/app.rs
//!
//! Wires the adapters into the core services and builds the web router.
//! Shared by the `api` and `ingest` binaries.

use crate::{
    adapters::{build_embedder, FsCourseLoader, OpenAiChatAdapter, SqliteUserStore, SqliteVectorIndex},
    config::{Config, ConfigError},
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, register_handler},
        profile_handler, require_auth,
        rest::ApiDoc,
        state::AppState,
        ws_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tutor_core::{
    accounts::Accounts,
    chunking::{Chunker, ChunkerConfig},
    knowledge::KnowledgeBase,
    prompts::PromptTemplates,
    tutor::Tutor,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Opens the vector index and assembles the knowledge base over it.
pub async fn build_knowledge(config: &Config) -> Result<Arc<KnowledgeBase>, ApiError> {
    info!("Opening vector index at {}", config.vector_db_path.display());
    let index = Arc::new(SqliteVectorIndex::open(&config.vector_db_path).await?);
    let corpus = Arc::new(FsCourseLoader::new(config.content_dir.clone()));
    let chunker = Chunker::new(ChunkerConfig {
        chunk_size: config.chunk_size,
        chunk_overlap: config.chunk_overlap,
        ..ChunkerConfig::default()
    });
    Ok(Arc::new(KnowledgeBase::new(
        corpus,
        build_embedder(config),
        index,
        chunker,
    )))
}

/// Builds every service the server needs.
pub async fn build_state(config: Arc<Config>) -> Result<Arc<AppState>, ApiError> {
    info!("Opening user store at {}", config.user_db_path.display());
    let users = Arc::new(SqliteUserStore::open(&config.user_db_path).await?);
    let knowledge = build_knowledge(&config).await?;

    let openai_config = OpenAIConfig::new()
        .with_api_key(config.openai_api_key.clone())
        .with_api_base(config.openai_base_url.clone());
    let llm = Arc::new(OpenAiChatAdapter::new(
        Client::with_config(openai_config),
        config.chat_model.clone(),
        config.llm_temperature,
        config.llm_max_tokens,
    ));

    let templates = PromptTemplates::load(&config.prompts_path);
    let tutor = Tutor::new(Accounts::new(users.clone()), knowledge, llm, templates)
        .with_top_k(config.retrieval_top_k);

    Ok(Arc::new(AppState {
        config,
        tutor: Arc::new(tutor),
        users,
    }))
}

/// The complete HTTP application: auth routes, protected routes and Swagger UI.
pub fn router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = app_state
        .config
        .allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| ConfigError::InvalidValue("ALLOWED_ORIGIN".to_string(), e.to_string()))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/me", get(profile_handler))
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
