// Error Types
// Storefront errors and their mapping onto HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::paypal::PaymentError;
use crate::security::AuthenticationError;

/// Result alias used by the storefront services
pub type ShopResult<T> = std::result::Result<T, ShopError>;

/// Errors surfaced by the storefront services and handlers
#[derive(Error, Debug)]
pub enum ShopError {
    /// Requested entity does not exist
    #[error("{0}")]
    NotFound(String),

    /// User input rejected; the message is shown to the visitor as-is
    #[error("{0}")]
    Validation(String),

    /// Credentials rejected
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    /// Page requires a logged in user
    #[error("{0}")]
    LoginRequired(String),

    /// Checkout attempted with nothing in the basket
    #[error("Basket is empty.")]
    EmptyBasket,

    /// Payment provider failure
    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("Database error.")]
    Database(#[from] rusqlite::Error),

    /// Session value could not be encoded
    #[error("Session data error.")]
    Session(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ShopError {
    pub fn status(&self) -> StatusCode {
        match self {
            ShopError::NotFound(_) => StatusCode::NOT_FOUND,
            ShopError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ShopError::Authentication(_) | ShopError::LoginRequired(_) => StatusCode::UNAUTHORIZED,
            ShopError::EmptyBasket => StatusCode::CONFLICT,
            ShopError::Payment(_) => StatusCode::BAD_GATEWAY,
            ShopError::Database(_) | ShopError::Session(_) | ShopError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ShopError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ShopError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ShopError::EmptyBasket.status(), StatusCode::CONFLICT);
        assert_eq!(
            ShopError::Validation("Please enter all required fields.".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_database_error_hides_details() {
        let err = ShopError::from(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(err.to_string(), "Database error.");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
