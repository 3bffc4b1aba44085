//! Endpoint handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::Method;
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::request::IdentifyRequest;
use super::response::ApiResponse;
use super::server::AppState;
use crate::error::ErrorKind;
use crate::identify::Identifier;

/// Run one identification request.
///
/// # Request
/// `POST` with a JSON object body carrying a non-empty string `url`.
///
/// # Response
/// - 200 `{ "status": "success", "data": { "placa", "marca", "tipo" } }`
/// - 400 `{ "error", "status": "error" }` for bad input, fetch failures,
///   and non-image content
/// - 405 `{ "error": "method not allowed" }` for any other method, whatever
///   the body
/// - 500 `{ "error": "internal error", "status": "error" }`
pub async fn handle(identifier: &Identifier, method: &Method, body: &[u8]) -> ApiResponse {
    if *method != Method::POST {
        debug!("Rejecting {} request", method);
        return ApiResponse::method_not_allowed();
    }

    // 1. Parse and validate the body
    let request = match IdentifyRequest::parse(body) {
        Ok(r) => r,
        Err(e) => {
            warn!("Bad identification request: {}", e);
            return ApiResponse::from_error(&e);
        }
    };
    let url = match request.validate() {
        Ok(url) => url,
        Err(e) => {
            warn!("Bad identification request: {}", e);
            return ApiResponse::from_error(&e);
        }
    };

    // 2. Run the pipeline
    match identifier.identify(url).await {
        Ok(result) => {
            info!(
                "Identification complete: placa='{}' marca='{}' tipo='{}'",
                result.plate.text, result.vehicle.brand, result.vehicle.kind
            );
            ApiResponse::success(&result)
        }
        Err(e) => {
            if e.kind() == ErrorKind::InternalError {
                error!("Identification failed: {}", e);
            } else {
                warn!("Identification rejected: {}", e);
            }
            ApiResponse::from_error(&e)
        }
    }
}

/// `/` and `/detect_vehicle` — any method; non-POST gets 405 from [`handle`].
pub async fn detect_vehicle_handler(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> ApiResponse {
    handle(&state.identifier, &method, &body).await
}

/// GET /health
pub async fn health_handler() -> ApiResponse {
    ApiResponse {
        status: 200,
        body: json!({ "status": "ok" }),
    }
}

/// Any method other than GET on `/health`.
pub async fn method_not_allowed_handler() -> ApiResponse {
    ApiResponse::method_not_allowed()
}

/// Router fallback for paths that match no route.
pub async fn not_found_handler() -> ApiResponse {
    ApiResponse::not_found()
}
