//! Identification request parsing and validation.

use crate::error::IdentifyError;
use serde::{Deserialize, Serialize};

/// Body of `POST /detect_vehicle`: `{ "url": "https://..." }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyRequest {
    /// URL of the photograph. Required, but optional here so that a missing
    /// field is reported as such instead of as a generic parse error.
    #[serde(default)]
    pub url: Option<String>,
}

impl IdentifyRequest {
    /// Parse a raw request body.
    ///
    /// The body must be a JSON object; a `url` that is present but not a
    /// string is malformed.
    pub fn parse(body: &[u8]) -> Result<Self, IdentifyError> {
        let value: serde_json::Value =
            serde_json::from_slice(body).map_err(|e| IdentifyError::MalformedRequest {
                detail: format!("body is not valid JSON: {e}"),
            })?;
        if !value.is_object() {
            return Err(IdentifyError::MalformedRequest {
                detail: "body must be a JSON object".to_string(),
            });
        }
        serde_json::from_value(value).map_err(|e| IdentifyError::MalformedRequest {
            detail: e.to_string(),
        })
    }

    /// The trimmed URL, or [`IdentifyError::MissingUrl`] when absent or blank.
    pub fn validate(&self) -> Result<&str, IdentifyError> {
        match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(IdentifyError::MissingUrl),
        }
    }
}
