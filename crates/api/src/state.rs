use std::sync::Arc;

use crate::config::ServerConfig;
use crate::tagger::Tagger;

/// Shared application state available to all Axum handlers via
/// `State<AppState>`. Cheaply cloneable; inner data is behind `Arc` or is
/// already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: tagd_db::DbPool,
    /// Server configuration (accessed by middleware and handlers).
    pub config: Arc<ServerConfig>,
    /// The tag orchestrator behind every route.
    pub tagger: Arc<Tagger>,
}
