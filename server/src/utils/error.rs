use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::services::{AllocationError, CatalogError};
use crate::store::LedgerError;
use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Allocation conflict: {0}")]
    AllocationConflict(String),

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AllocationConflict(_) => StatusCode::CONFLICT,
            AppError::LedgerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::AllocationConflict(_) => "ALLOCATION_CONFLICT",
            AppError::LedgerUnavailable(_) => "LEDGER_UNAVAILABLE",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::ValidationError(msg) | AppError::NotFound(msg) => {
                warn!(code = self.code(), message = %msg, "Request rejected");
            }
            AppError::AllocationConflict(msg)
            | AppError::LedgerUnavailable(msg)
            | AppError::InternalServerError(msg) => {
                error!(code = self.code(), message = %msg, "Application error");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(msg) | AppError::NotFound(msg) => msg.clone(),
            AppError::AllocationConflict(_) => {
                "Ticket could not be issued due to concurrent sales, please retry".to_string()
            }
            AppError::LedgerUnavailable(_) => "Ticket ledger is unavailable, please retry".to_string(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::InternalServerError(_) => "An internal error occurred".to_string(),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Database(e) => AppError::DatabaseError(e),
            LedgerError::Unavailable(msg) => AppError::LedgerUnavailable(msg),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::InvalidRequest(msg) => AppError::ValidationError(msg),
            AllocationError::UnknownTicketType { .. } => AppError::NotFound(err.to_string()),
            AllocationError::Exhausted(_) => AppError::AllocationConflict(err.to_string()),
            AllocationError::Conflict { .. } => AppError::AllocationConflict(err.to_string()),
            AllocationError::Ledger(e) => e.into(),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::InvalidListing(msg) => AppError::ValidationError(msg),
            CatalogError::Ledger(e) => e.into(),
            CatalogError::Encoding(e) => AppError::InternalServerError(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();

        // Details stay in the log.
        error_response(self.code(), self.public_message(), None, self.status_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventKey;
    use chrono::NaiveDate;

    fn launch() -> EventKey {
        EventKey::new(NaiveDate::from_ymd_opt(2025, 7, 20).unwrap(), "Launch")
    }

    #[test]
    fn test_allocation_errors_map_to_stable_codes() {
        let conflict: AppError = AllocationError::Conflict {
            event: launch(),
            attempts: 5,
        }
        .into();
        assert_eq!(conflict.code(), "ALLOCATION_CONFLICT");
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        let unknown: AppError = AllocationError::UnknownTicketType {
            event: launch(),
            ticket_type: "Backstage".to_string(),
        }
        .into();
        assert_eq!(unknown.code(), "NOT_FOUND");

        let offline: AppError =
            AllocationError::Ledger(LedgerError::Unavailable("offline".to_string())).into();
        assert_eq!(offline.code(), "LEDGER_UNAVAILABLE");
        assert_eq!(offline.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_catalog_validation_is_a_bad_request() {
        let err: AppError = CatalogError::InvalidListing("event name is empty".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.public_message(), "event name is empty");
    }
}
