pub mod health;
pub mod tags;

use axum::Router;

use crate::state::AppState;

/// All service routes. Paths are absolute (`/v1/...`, `/i1/...`); there is
/// no shared prefix.
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(health::router()).merge(tags::router())
}
