//! Response bodies and the transport-neutral [`ApiResponse`].
//!
//! Field names on the wire are Spanish (`placa`, `marca`, `tipo`) because
//! existing clients consume them that way.

use crate::error::IdentifyError;
use crate::output::IdentificationResult;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// `data` member of a successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleData {
    /// Plate text, or "not detected".
    pub placa: String,
    /// Brand, or a sentinel.
    pub marca: String,
    /// Vehicle type, or a sentinel.
    pub tipo: String,
}

/// `200 { "status": "success", "data": { ... } }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessBody {
    pub status: String,
    pub data: VehicleData,
}

impl From<&IdentificationResult> for SuccessBody {
    fn from(result: &IdentificationResult) -> Self {
        Self {
            status: "success".to_string(),
            data: VehicleData {
                placa: result.plate.text.clone(),
                marca: result.vehicle.brand.clone(),
                tipo: result.vehicle.kind.clone(),
            },
        }
    }
}

/// `{ "error": "...", "status": "error" }`; the 405 body omits `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            status: Some("error".to_string()),
        }
    }
}

/// Status code plus JSON body, independent of any HTTP framework.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    /// Headers every response carries.
    pub const HEADERS: [(&'static str, &'static str); 2] = [
        ("content-type", "application/json"),
        ("access-control-allow-origin", "*"),
    ];

    pub fn success(result: &IdentificationResult) -> Self {
        Self::json(200, &SuccessBody::from(result))
    }

    /// Map a pipeline error to its status and public message.
    pub fn from_error(err: &IdentifyError) -> Self {
        Self::json(err.status_code(), &ErrorBody::new(err.public_message()))
    }

    pub fn method_not_allowed() -> Self {
        Self::json(
            405,
            &ErrorBody {
                error: "method not allowed".to_string(),
                status: None,
            },
        )
    }

    /// Unrouted paths.
    pub fn not_found() -> Self {
        Self::json(404, &ErrorBody::new("not found"))
    }

    fn json<T: Serialize>(status: u16, body: &T) -> Self {
        // Plain structs of strings always serialise.
        let body = serde_json::to_value(body).unwrap_or(serde_json::Value::Null);
        Self { status, body }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body.to_string()).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        response
    }
}
