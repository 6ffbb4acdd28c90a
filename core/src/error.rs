//! Error types for the AgriPredict client.
//!
//! # Design
//! The backend only distinguishes "response not OK" from success, so every
//! non-2xx status lands in `HttpError` with the raw status code and body.
//! The remaining variants make failures explicit that a browser client
//! would surface as unhandled rejections: malformed JSON, `{"error": ..}`
//! bodies sent with a 2xx status, and view values that do not parse.

use thiserror::Error;

/// Errors returned by `AgriClient` parse methods and `Dashboard` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned a status outside 200..=299.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The server answered 2xx but the body was `{"error": "..."}`.
    #[error("server reported an error: {0}")]
    ServerError(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// A view value could not be turned into a request field.
    #[error("invalid value for {field}: {value:?}")]
    InvalidInput { field: String, value: String },

    /// The request never produced a response.
    #[error("transport failed: {0}")]
    Transport(String),
}

impl ApiError {
    pub(crate) fn invalid(field: &str, value: Option<String>) -> Self {
        ApiError::InvalidInput {
            field: field.to_string(),
            value: value.unwrap_or_default(),
        }
    }
}
