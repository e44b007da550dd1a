//! HTTP route definitions

use crate::api::handlers;
use crate::api::models::*;
use crate::backend::{BackendKind, ChatMessage, ConversationContext};
use crate::relay::{ChatResult, ModelConfig};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Chat Relay API",
        description = "Relay between a chat front end and official, reverse-proxy and web-chat backends.",
        license(name = "MIT"),
    ),
    paths(
        handlers::chat_process,
        handlers::config,
        handlers::session,
        handlers::health_check,
    ),
    components(schemas(
        ChatProcessRequest,
        ConfigResponse,
        SessionResponse,
        SessionData,
        HealthResponse,
        ModelConfig,
        ChatResult,
        ChatMessage,
        ConversationContext,
        BackendKind,
    )),
    tags(
        (name = "Chat", description = "Message forwarding"),
        (name = "Config", description = "Relay configuration and session"),
        (name = "Health", description = "Health and monitoring endpoints"),
    )
)]
pub struct ApiDoc;

/// Create the main application router.
///
/// Relay routes are served both at the root and under `/api`.
pub fn create_router(state: Arc<crate::AppState>) -> Router {
    let relay_routes = Router::new()
        .route("/chat-process", post(handlers::chat_process))
        .route("/config", post(handlers::config))
        .route("/session", post(handlers::session));

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(relay_routes.clone())
        .nest("/api", relay_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
