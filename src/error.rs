use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Short user-facing messages shared by handlers and tests.
pub mod msg {
    pub const NOT_SIGNED_IN: &str = "Not signed in";
    pub const CAMPAIGN_NOT_FOUND: &str = "Campaign not found";
    pub const PLEDGE_NOT_FOUND: &str = "Pledge not found";
    pub const PLEDGE_NOT_INTENT: &str = "Pledge is not awaiting payment";
    pub const INVALID_EMAIL: &str = "Invalid email";
    pub const INVALID_ROLE: &str = "Invalid role";
    pub const INVALID_AMOUNT: &str = "Amount must be a positive number";
    pub const INVALID_CURRENCY: &str = "Currency must be a 3-letter code";
    pub const MISSING_FIELDS: &str = "Missing fields";
    pub const MISSING_ORDER_ID: &str = "orderId is required";
    pub const PAYPAL_NOT_CONFIGURED: &str = "PayPal is not configured";
    pub const PAYMENT_OWNED_ELSEWHERE: &str = "Payment is attached to another pledge";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{}", msg::NOT_SIGNED_IN)]
    Unauthorized,

    #[error("{0}")]
    Conflict(String),

    /// The payment provider refused or failed a call.
    #[error("PayPal error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    JsonRejection(#[from] JsonRejection),

    #[error(transparent)]
    QueryRejection(#[from] QueryRejection),

    #[error(transparent)]
    PathRejection(#[from] PathRejection),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Every error body carries `ok: false` so clients can branch on one field.
#[derive(Serialize)]
struct ErrorResponse {
    ok: bool,
    error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::JsonRejection(r) => r.status(),
            AppError::QueryRejection(r) => r.status(),
            AppError::PathRejection(r) => r.status(),
            AppError::Upstream(_)
            | AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "Database error".to_string()
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                "Database unavailable".to_string()
            }
            AppError::Internal(m) => {
                tracing::error!("Internal error: {}", m);
                "Server error".to_string()
            }
            AppError::Upstream(m) => {
                // The provider's message is embedded; the caller cannot retry the provider call.
                tracing::error!("PayPal error: {}", m);
                self.to_string()
            }
            AppError::JsonRejection(r) => r.body_text(),
            AppError::QueryRejection(r) => r.body_text(),
            AppError::PathRejection(r) => r.body_text(),
            _ => self.to_string(),
        };

        (status, Json(ErrorResponse { ok: false, error })).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Turns a missing row into a 404 with a fixed message.
pub trait OptionExt<T> {
    fn or_not_found(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(message.to_string()))
    }
}
