//! Maps domain `AppError` to HTTP responses.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use keygate_core::error::{AppError, ErrorKind};
use keygate_core::types::response::Envelope;

/// Handler and middleware error. Always answers with the JSON envelope.
#[derive(Debug)]
pub struct ApiError(pub AppError);

/// Result alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// HTTP status for an error kind.
    ///
    /// Business failures are reported with 200 and `success = false`.
    pub fn status_for(kind: ErrorKind) -> StatusCode {
        match kind {
            ErrorKind::Unauthenticated
            | ErrorKind::TokenNotFound
            | ErrorKind::TokenDisabled
            | ErrorKind::TokenExpired
            | ErrorKind::TokenExhausted => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Database
            | ErrorKind::Configuration
            | ErrorKind::Serialization
            | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::InvalidCredential
            | ErrorKind::InsufficientRole
            | ErrorKind::AccountDisabled
            | ErrorKind::Validation
            | ErrorKind::NotFound
            | ErrorKind::Conflict => StatusCode::OK,
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = Self::status_for(err.kind);

        let message = if err.kind.is_internal() {
            tracing::error!(kind = %err.kind, error = %err.message, "Internal server error");
            "internal server error".to_string()
        } else {
            tracing::debug!(kind = %err.kind, message = %err.message, "Request refused");
            err.message
        };

        (status, Json(Envelope::failure(message))).into_response()
    }
}

/// Malformed JSON bodies are a business failure, not a 4xx.
pub fn invalid_body(rejection: JsonRejection) -> ApiError {
    ApiError(AppError::validation(format!(
        "invalid parameters: {}",
        rejection.body_text()
    )))
}

pub fn invalid_query(rejection: QueryRejection) -> ApiError {
    ApiError(AppError::validation(format!(
        "invalid parameters: {}",
        rejection.body_text()
    )))
}

/// Collapse `validator` failures into one message.
pub fn validation_failed(errors: validator::ValidationErrors) -> ApiError {
    let mut fields: Vec<String> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let reason = errs
                .iter()
                .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| "is invalid".to_string());
            format!("{field} {reason}")
        })
        .collect();
    fields.sort();
    ApiError(AppError::validation(fields.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_failures_answer_200() {
        for kind in [
            ErrorKind::InvalidCredential,
            ErrorKind::InsufficientRole,
            ErrorKind::AccountDisabled,
        ] {
            assert_eq!(ApiError::status_for(kind), StatusCode::OK);
        }
    }

    #[test]
    fn token_failures_answer_401() {
        for kind in [
            ErrorKind::Unauthenticated,
            ErrorKind::TokenNotFound,
            ErrorKind::TokenDisabled,
            ErrorKind::TokenExpired,
            ErrorKind::TokenExhausted,
        ] {
            assert_eq!(ApiError::status_for(kind), StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn store_failures_are_not_credential_failures() {
        assert_eq!(
            ApiError::status_for(ErrorKind::Database),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::status_for(ErrorKind::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::status_for(ErrorKind::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn internal_detail_is_hidden() {
        let response = ApiError(AppError::database("connection refused")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
