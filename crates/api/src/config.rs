use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development except
/// the connection URLs and the JWT secret.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5002`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// redis connection URL for the cache and counter stores.
    pub redis_url: String,
    /// Base URL of the user-directory service.
    pub users_host: String,
    /// Base URL of the post-directory service.
    pub posts_host: String,
    /// JWT validation configuration.
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                   |
    /// |------------------------|---------------------------|
    /// | `HOST`                 | `0.0.0.0`                 |
    /// | `PORT`                 | `5002`                    |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`   |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                      |
    /// | `REDIS_URL`            | `redis://localhost:6379`  |
    /// | `USERS_HOST`           | `http://localhost:5004`   |
    /// | `POSTS_HOST`           | `http://localhost:5003`   |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "5002".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());

        let users_host =
            std::env::var("USERS_HOST").unwrap_or_else(|_| "http://localhost:5004".into());

        let posts_host =
            std::env::var("POSTS_HOST").unwrap_or_else(|_| "http://localhost:5003".into());

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            redis_url,
            users_host,
            posts_host,
            jwt,
        }
    }
}
