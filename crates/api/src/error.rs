use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use tagd_core::error::CoreError;
use tagd_directory::DirectoryError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and classifies database and
/// upstream-directory failures into the same taxonomy. Implements
/// [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `tagd_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A user- or post-directory call failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "an internal error occurred".to_string(),
                    )
                }
            },

            AppError::Database(err) => classify_sqlx_error(err),

            AppError::Directory(err) => match err {
                DirectoryError::NotFound { service, subject } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{service} has no record matching '{subject}'"),
                ),
                other => {
                    tracing::error!(error = %other, "upstream directory error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "an internal error occurred".to_string(),
                    )
                }
            },
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique violations (23505) map to 409: a renamed tag colliding with an
///   existing name, or a duplicate inheritance edge.
/// - Not-null violations (23502) map to 400: an update naming an unknown
///   tag class resolves the class id to NULL.
/// - Check violations (23514) map to 400: the inheritance cycle guard.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            let classified = classify_db_code(
                db_err.code().as_deref(),
                db_err.constraint(),
            );
            match classified {
                Some(result) => result,
                None => {
                    tracing::error!(error = %db_err, "database error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "an internal error occurred".to_string(),
                    )
                }
            }
        }
        other => {
            tracing::error!(error = %other, "database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "an internal error occurred".to_string(),
            )
        }
    }
}

/// Map a PostgreSQL error code (plus the violated constraint, when the
/// driver reports one) onto the error taxonomy. Returns `None` for codes
/// that should stay internal.
fn classify_db_code(
    code: Option<&str>,
    constraint: Option<&str>,
) -> Option<(StatusCode, &'static str, String)> {
    match code {
        // unique_violation
        Some("23505") => {
            let message = match constraint {
                Some(c) if c.contains("tag_inheritance") => {
                    "this inheritance edge already exists".to_string()
                }
                Some(c) if c.contains("tags") => {
                    "a tag with that name already exists".to_string()
                }
                _ => "duplicate value violates a unique constraint".to_string(),
            };
            Some((StatusCode::CONFLICT, "CONFLICT", message))
        }
        // not_null_violation: tag_class_to_id() returned NULL
        Some("23502") => Some((
            StatusCode::BAD_REQUEST,
            "BAD_REQUEST",
            "unknown tag class".to_string(),
        )),
        // check_violation: the inheritance cycle guard
        Some("23514") => Some((
            StatusCode::BAD_REQUEST,
            "BAD_REQUEST",
            "this inheritance edge would create a cycle".to_string(),
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_is_conflict() {
        let (status, code, msg) =
            classify_db_code(Some("23505"), Some("tags_name_key")).unwrap();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "CONFLICT");
        assert!(msg.contains("tag with that name"));

        let (status, _, msg) =
            classify_db_code(Some("23505"), Some("tag_inheritance_pkey")).unwrap();
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(msg.contains("inheritance edge"));
    }

    #[test]
    fn not_null_violation_is_bad_request() {
        let (status, code, _) = classify_db_code(Some("23502"), None).unwrap();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "BAD_REQUEST");
    }

    #[test]
    fn check_violation_is_bad_request() {
        let (status, _, msg) = classify_db_code(Some("23514"), None).unwrap();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(msg.contains("cycle"));
    }

    #[test]
    fn other_codes_stay_internal() {
        assert!(classify_db_code(Some("40001"), None).is_none());
        assert!(classify_db_code(None, None).is_none());
    }
}
