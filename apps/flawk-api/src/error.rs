use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

/// Structured API error returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Application-level error type that converts into an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<Vec<FieldError>>,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn validation(details: Vec<FieldError>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION_ERROR".to_string(),
            message: "Validation failed".to_string(),
            details: Some(details),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorDetail {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<axum::extract::rejection::QueryRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

/// Failure reported by a [`crate::db::store::UserStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists: {0}")]
    Conflict(&'static str),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("pool error: {0}")]
    Pool(#[from] diesel_async::pooled_connection::deadpool::PoolError),
    #[error("pool setup failed: {0}")]
    PoolSetup(#[from] diesel_async::pooled_connection::deadpool::BuildError),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => Self::conflict(format!("{what} already exists")),
            other => {
                tracing::error!(err = %other, "store error");
                Self::internal("An internal error occurred")
            }
        }
    }
}

/// Reasons a websocket connection is terminated by the gateway.
///
/// The four credential failures are all handled the same way: the offending
/// connection is closed and nothing is surfaced to other clients.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("user not found")]
    UserNotFound,
    #[error("token is no longer active")]
    TokenRevoked,
    #[error("packet carried no token")]
    UnauthenticatedPacket,
    #[error("malformed frame")]
    InvalidFrame,
    #[error("unknown event `{0}`")]
    UnknownEvent(String),
    #[error("connection closed during authentication")]
    ConnectionClosed,
    #[error("user lookup failed")]
    Store(#[from] StoreError),
}

/// Application close codes (4000 range).
pub mod close_code {
    pub const INVALID_FRAME: u16 = 4000;
    pub const UNKNOWN_EVENT: u16 = 4001;
    pub const NOT_AUTHENTICATED: u16 = 4003;
    pub const AUTH_FAILED: u16 = 4004;
}

impl GatewayError {
    /// The websocket close code sent before the connection is dropped.
    pub fn close_code(&self) -> u16 {
        match self {
            Self::InvalidFrame => close_code::INVALID_FRAME,
            Self::UnknownEvent(_) => close_code::UNKNOWN_EVENT,
            Self::UnauthenticatedPacket => close_code::NOT_AUTHENTICATED,
            Self::InvalidToken
            | Self::UserNotFound
            | Self::TokenRevoked
            | Self::ConnectionClosed
            | Self::Store(_) => close_code::AUTH_FAILED,
        }
    }

    /// Short reason sent in the close frame. Never leaks which check failed.
    pub fn close_reason(&self) -> &'static str {
        match self {
            Self::InvalidFrame => "Invalid frame",
            Self::UnknownEvent(_) => "Unknown event",
            Self::UnauthenticatedPacket => "Token required",
            Self::InvalidToken
            | Self::UserNotFound
            | Self::TokenRevoked
            | Self::ConnectionClosed
            | Self::Store(_) => "Authentication failed",
        }
    }
}
