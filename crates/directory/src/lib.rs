//! HTTP clients for the user-directory and post-directory services.
//!
//! Responses are deserialized into the narrow shapes this service needs;
//! upstream fields beyond those are ignored.

pub mod posts;
pub mod users;

pub use posts::{InternalPost, PostDirectory};
pub use users::{DirectoryUser, UserDirectory};

use std::time::Duration;

use thiserror::Error;

/// Default deadline for outbound directory calls.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The upstream has no record matching the subject.
    #[error("{service} has no record matching '{subject}'")]
    NotFound {
        service: &'static str,
        subject: String,
    },

    /// The upstream returned an unexpected non-2xx status.
    #[error("{service} returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },
}

/// Shared non-2xx handling: 404 becomes [`DirectoryError::NotFound`],
/// anything else non-2xx becomes [`DirectoryError::Upstream`].
pub(crate) async fn check_status(
    service: &'static str,
    subject: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, DirectoryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(DirectoryError::NotFound {
            service,
            subject: subject.to_owned(),
        });
    }
    let body = response.text().await.unwrap_or_default();
    Err(DirectoryError::Upstream {
        service,
        status: status.as_u16(),
        body,
    })
}
