//! Router assembly and the listening loop.

use std::future::Future;
use std::net::SocketAddr;

use axum::routing::{any, get};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handler::{
    detect_vehicle_handler, health_handler, method_not_allowed_handler, not_found_handler,
};
use crate::identify::Identifier;

/// Shared handler state. Cloned per request; the identifier is `Arc`-backed.
#[derive(Clone, Debug)]
pub struct AppState {
    pub identifier: Identifier,
}

/// Build the application router.
///
/// Every response, fallbacks included, is a JSON [`super::ApiResponse`].
pub fn router(identifier: Identifier) -> Router {
    Router::new()
        .route("/", any(detect_vehicle_handler))
        .route("/detect_vehicle", any(detect_vehicle_handler))
        .route(
            "/health",
            get(health_handler).fallback(method_not_allowed_handler),
        )
        .fallback(not_found_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { identifier })
}

/// Listen on `addr` until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    identifier: Identifier,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = router(identifier);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
