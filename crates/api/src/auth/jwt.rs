//! Access-token validation.
//!
//! Tokens are HS256-signed JWTs issued by the platform's auth service;
//! this service only validates them and reads out the caller's id and
//! scopes.

use std::collections::BTreeSet;

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use tagd_core::auth::Scope;
use tagd_core::types::DbId;

/// JWT claims embedded in every access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    /// The scopes granted to this token.
    pub scopes: BTreeSet<Scope>,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
}

/// Configuration for JWT validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret shared with the token issuer.
    pub secret: String,
}

impl JwtConfig {
    /// Load JWT configuration from the environment.
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");
        Self { secret }
    }
}

/// Validate and decode an access token, returning the embedded [`Claims`].
///
/// Validates the signature, expiration, and issued-at claims automatically.
pub fn validate_token(
    token: &str,
    config: &JwtConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(), // HS256
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{encode, EncodingKey, Header};

    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".into(),
        }
    }

    fn sign(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn claims(scopes: &[Scope]) -> Claims {
        let now = chrono::Utc::now().timestamp();
        Claims {
            sub: 42,
            scopes: scopes.iter().copied().collect(),
            exp: now + 600,
            iat: now,
        }
    }

    #[test]
    fn valid_token_round_trips() {
        let token = sign(&claims(&[Scope::User, Scope::Mod]), "test-secret");
        let decoded = validate_token(&token, &config()).unwrap();
        assert_eq!(decoded.sub, 42);
        assert!(decoded.scopes.contains(&Scope::Mod));
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = sign(&claims(&[Scope::User]), "other-secret");
        assert!(validate_token(&token, &config()).is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let now = chrono::Utc::now().timestamp();
        let expired = Claims {
            sub: 42,
            scopes: BTreeSet::new(),
            exp: now - 600,
            iat: now - 1200,
        };
        let token = sign(&expired, "test-secret");
        assert!(validate_token(&token, &config()).is_err());
    }
}
