use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use reckon_core::store::StoreError;
use reckon_filing::FilingError;
use reckon_ledger::LedgerError;
use reckon_order::OrderError;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    PaymentRequired(String),
    UnauthorizedError(String),
    NotFoundError(String),
    ConflictError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::PaymentRequired(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            AppError::UnauthorizedError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredit(msg) => AppError::ValidationError(msg),
            LedgerError::Conflict => AppError::ConflictError(err.to_string()),
            LedgerError::NotFound(_) => AppError::NotFoundError(err.to_string()),
            LedgerError::Store(e) => AppError::Anyhow(e.into()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_, _) => AppError::NotFoundError(err.to_string()),
            StoreError::Conflict => AppError::ConflictError(err.to_string()),
            other => AppError::Anyhow(other.into()),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Invalid(e) => AppError::ValidationError(e.to_string()),
            OrderError::Ledger(e) => e.into(),
            OrderError::Store(e) => e.into(),
            OrderError::Payment(e) => AppError::PaymentRequired(e.to_string()),
            OrderError::Verification(e) => AppError::UnauthorizedError(e.to_string()),
            OrderError::NotFound(tid) => {
                AppError::NotFoundError(format!("Transaction not found: {}", tid))
            }
            OrderError::UnknownReferral(_) => AppError::ValidationError(err.to_string()),
        }
    }
}

impl From<FilingError> for AppError {
    fn from(err: FilingError) -> Self {
        match err {
            FilingError::NotFound(fid) => {
                AppError::NotFoundError(format!("Filing not found: {}", fid))
            }
            FilingError::NotVat | FilingError::InvalidState | FilingError::NoObligation(_) => {
                AppError::ValidationError(err.to_string())
            }
            FilingError::Ledger(e) => e.into(),
            FilingError::Store(e) => e.into(),
            FilingError::Submission(e) => AppError::Anyhow(e.into()),
        }
    }
}
