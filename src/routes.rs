use crate::config::NETLIFY_FUNCTION_PATH;
use crate::relay::RelayHandler;
use axum::{
    extract::{Request, State},
    http::Method,
    response::Response,
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Build the relay router.
///
/// No layer answers on the relay's behalf: every non-POST, preflight
/// `OPTIONS` included, reaches the handler and gets its 405. The body size
/// limit is enforced by the handler after that check.
pub fn create_router(handler: Arc<RelayHandler>, relay_path: &str) -> Router {
    let mut router = Router::new()
        // Health check endpoint
        .route("/health", get(RelayHandler::health_check))
        // Relay endpoint; any method so non-POST gets the plain-text 405
        .route(relay_path, any(relay_request_handler));

    if relay_path != NETLIFY_FUNCTION_PATH {
        router = router.route(NETLIFY_FUNCTION_PATH, any(relay_request_handler));
    }

    router
        .with_state(handler)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Handler that relays frontend requests upstream
async fn relay_request_handler(
    State(handler): State<Arc<RelayHandler>>,
    method: Method,
    request: Request,
) -> Response {
    handler.handle(method, request.into_body()).await
}
