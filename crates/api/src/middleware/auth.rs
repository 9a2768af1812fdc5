//! Bearer-token extractor producing the [`UserAuth`] record.
//!
//! Several routes are optional-auth (anyone may fetch a public post's
//! tags), so a missing Authorization header yields an anonymous record
//! instead of a rejection. A header that is present but invalid is still
//! an error: a caller who sent credentials expects them honored.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use tagd_core::auth::UserAuth;
use tagd_core::error::CoreError;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// The authenticated (or anonymous) caller.
///
/// ```ignore
/// async fn my_handler(Auth(user): Auth) -> AppResult<Json<()>> {
///     let user_id = user.require_authenticated()?;
///     ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Auth(pub UserAuth);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(auth_header) = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(Auth(UserAuth::anonymous()));
        };

        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "invalid Authorization format, expected: Bearer <token>".into(),
                ))
            })?;

        let claims = validate_token(token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("invalid or expired token".into()))
        })?;

        Ok(Auth(UserAuth {
            user_id: Some(claims.sub),
            scopes: claims.scopes,
            token: Some(token.to_owned()),
        }))
    }
}
