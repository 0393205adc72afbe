use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use tracing::{error, warn};

use crate::domain::RegistrationError;

#[derive(Debug)]
pub enum ApiError {
    /// Caller can fix the request and retry
    BadRequest {
        kind: &'static str,
        message: String,
        missing_fields: Option<Vec<String>>,
    },
    /// Caller must choose a different identity or folio
    Conflict { kind: &'static str, message: String },
    /// Dependency or operator-level failure
    Internal {
        kind: &'static str,
        message: String,
        debug: Option<String>,
    },
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest { kind, message, .. } => write!(f, "Bad request ({}): {}", kind, message),
            ApiError::Conflict { kind, message } => write!(f, "Conflict ({}): {}", kind, message),
            ApiError::Internal { kind, message, .. } => write!(f, "Internal error ({}): {}", kind, message),
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    missing_fields: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, missing_fields, debug) = match self {
            ApiError::BadRequest { kind, message, missing_fields } => {
                (StatusCode::BAD_REQUEST, kind, message, missing_fields, None)
            }
            ApiError::Conflict { kind, message } => (StatusCode::CONFLICT, kind, message, None, None),
            ApiError::Internal { kind, message, debug } => {
                (StatusCode::INTERNAL_SERVER_ERROR, kind, message, None, debug)
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            missing_fields,
            debug,
        });

        (status, body).into_response()
    }
}

impl ApiError {
    /// Translate a domain failure. Internal detail is only attached when
    /// `expose_details` is set.
    pub fn from_registration(err: RegistrationError, expose_details: bool) -> Self {
        let kind = err.kind();
        match err {
            RegistrationError::MissingFields(fields) => ApiError::BadRequest {
                kind,
                message: "Missing required fields".to_string(),
                missing_fields: Some(fields),
            },
            RegistrationError::InvalidField { .. }
            | RegistrationError::ConsentRequired
            | RegistrationError::InvalidFolio(_) => ApiError::BadRequest {
                kind,
                message: err.to_string(),
                missing_fields: None,
            },
            RegistrationError::DuplicateEmail
            | RegistrationError::DuplicateIdentity
            | RegistrationError::DuplicateFolio => ApiError::Conflict {
                kind,
                message: err.to_string(),
            },
            RegistrationError::SequenceExhausted { .. } => {
                error!(error = %err, "Legacy folio namespace exhausted; a new prefix is required");
                ApiError::Internal {
                    kind,
                    message: "Could not allocate a legacy folio".to_string(),
                    debug: expose_details.then(|| err.to_string()),
                }
            }
            RegistrationError::Encryption(_) | RegistrationError::Store(_) | RegistrationError::Internal(_) => {
                error!(error = %err, kind, "Registration failed");
                ApiError::Internal {
                    kind,
                    message: "Internal server error".to_string(),
                    debug: expose_details.then(|| err.to_string()),
                }
            }
        }
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        error!(error = %err, "Store call failed");
        ApiError::Internal {
            kind: "store_error",
            message: "Store unavailable".to_string(),
            debug: None,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(status = %rejection.status(), "Rejected request body");
        let message = match rejection {
            JsonRejection::MissingJsonContentType(_) => "Request body must be sent as application/json",
            JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON",
            _ => "Request body does not match the registration form",
        };
        ApiError::BadRequest {
            kind: "validation_error",
            message: message.to_string(),
            missing_fields: None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseError;

    #[test]
    fn test_validation_keeps_missing_fields() {
        let api = ApiError::from_registration(
            RegistrationError::MissingFields(vec!["curp".to_string()]),
            false,
        );
        match api {
            ApiError::BadRequest { kind, missing_fields, .. } => {
                assert_eq!(kind, "validation_error");
                assert_eq!(missing_fields, Some(vec!["curp".to_string()]));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_store_error_hides_detail_unless_exposed() {
        let err = || RegistrationError::Store(DatabaseError::TransactionError("socket closed".to_string()));

        match ApiError::from_registration(err(), false) {
            ApiError::Internal { debug, message, .. } => {
                assert_eq!(debug, None);
                assert!(!message.contains("socket"));
            }
            other => panic!("unexpected {:?}", other),
        }
        match ApiError::from_registration(err(), true) {
            ApiError::Internal { debug, .. } => assert!(debug.unwrap().contains("socket closed")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_conflicts_map_to_409() {
        let response = ApiError::from_registration(RegistrationError::DuplicateFolio, false).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
