use axum::{middleware, Router};

use crate::auth::middleware::Verifier;
use crate::chat::presence;
use crate::dm::{conversations, messages};
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Inject the credential verifier into request extensions so the AuthUser extractor can find it.
async fn inject_verifier(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(Verifier(state.verifier.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // WebSocket endpoint (auth via query param, header, or first frame)
    let ws_routes = Router::new().route("/ws", axum::routing::get(ws_handler::ws_upgrade));

    // Authenticated routes (JWT required, AuthUser extractor validates token)
    let presence_routes = Router::new().route(
        "/api/presence/{user_id}",
        axum::routing::get(presence::get_presence),
    );

    let archive_routes = Router::new()
        .route(
            "/api/conversations",
            axum::routing::get(conversations::list_conversations)
                .post(conversations::create_conversation),
        )
        .route("/api/messages", axum::routing::post(messages::save_message))
        .route(
            "/api/messages/{conversation_id}",
            axum::routing::get(messages::get_messages),
        );

    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(ws_routes)
        .merge(presence_routes)
        .merge(archive_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_verifier,
        ))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
