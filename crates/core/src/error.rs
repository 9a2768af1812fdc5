use thiserror::Error;

/// Domain error taxonomy.
///
/// Every variant corresponds to one HTTP status; the api crate owns the
/// mapping. Validation errors are raised before any side effect.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Validation failure: empty patch, oversized description, unknown tag
    /// group, malformed post id.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid credentials on a gated operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but lacking the required ownership or scope.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The addressed tag, post, or user does not exist -- or the caller is
    /// not allowed to learn that it does.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate tag name or duplicate inheritance edge.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unexpected database or collaborator failure.
    #[error("internal error: {0}")]
    Internal(String),
}
