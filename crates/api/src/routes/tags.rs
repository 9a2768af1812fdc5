//! Handlers for the tag routes.
//!
//! Handlers stay thin: parse and validate the boundary forms, call the
//! [`Tagger`](crate::tagger::Tagger), and map the result. Mutations return
//! 204 with no body.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use tagd_core::tag::{Tag, TagGroups};
use tagd_core::types::PostId;

use crate::error::AppResult;
use crate::middleware::auth::Auth;
use crate::state::AppState;
use crate::tagger::TagUpdate;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body of `POST /v1/add_tags` and `POST /v1/remove_tags`.
#[derive(Debug, Deserialize)]
pub struct TagsRequest {
    pub post_id: String,
    pub tags: Vec<String>,
}

/// Body of `POST /v1/inherit_tag`.
#[derive(Debug, Deserialize)]
pub struct InheritRequest {
    pub parent_tag: String,
    pub child_tag: String,
    #[serde(default)]
    pub deprecate: bool,
}

/// Body of `POST /v1/remove_inheritance`.
#[derive(Debug, Deserialize)]
pub struct RemoveInheritanceRequest {
    pub parent_tag: String,
    pub child_tag: String,
}

/// Body of `PATCH /v1/tag/{tag}`. All fields optional; an entirely empty
/// patch is rejected downstream, and field validation runs after the
/// ownership check so unauthorized callers learn nothing but 403.
#[derive(Debug, Deserialize)]
pub struct UpdateTagRequest {
    pub name: Option<String>,
    pub group: Option<String>,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub deprecated: Option<bool>,
}

/// Body of `POST /v1/lookup_tags`. A missing or empty `tag` matches all.
#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    pub tag: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /v1/add_tags
async fn add_tags(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(body): Json<TagsRequest>,
) -> AppResult<StatusCode> {
    let post_id = PostId::parse(&body.post_id)?;
    state.tagger.add_tags(&user, &post_id, &body.tags).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/remove_tags
async fn remove_tags(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(body): Json<TagsRequest>,
) -> AppResult<StatusCode> {
    let post_id = PostId::parse(&body.post_id)?;
    state.tagger.remove_tags(&user, &post_id, &body.tags).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/inherit_tag
async fn inherit_tag(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(body): Json<InheritRequest>,
) -> AppResult<StatusCode> {
    state
        .tagger
        .inherit_tag(&user, &body.parent_tag, &body.child_tag, body.deprecate)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/remove_inheritance
async fn remove_inheritance(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(body): Json<RemoveInheritanceRequest>,
) -> AppResult<StatusCode> {
    state
        .tagger
        .remove_inheritance(&user, &body.parent_tag, &body.child_tag)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /v1/tag/{tag}
async fn update_tag(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Json(body): Json<UpdateTagRequest>,
) -> AppResult<StatusCode> {
    let update = TagUpdate {
        name: body.name,
        group: body.group,
        owner: body.owner,
        description: body.description,
        deprecated: body.deprecated,
    };
    state.tagger.update_tag(&user, &tag, update).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/tag/{tag}
async fn fetch_tag(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> AppResult<Json<Tag>> {
    Ok(Json(state.tagger.fetch_tag(&tag).await?))
}

/// GET /v1/fetch_tags/{post_id}
async fn fetch_tags(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Json<TagGroups>> {
    let post_id = PostId::parse(&post_id)?;
    Ok(Json(state.tagger.fetch_tags_by_post(&user, &post_id).await?))
}

/// POST /v1/lookup_tags
async fn lookup_tags(
    State(state): State<AppState>,
    Json(body): Json<LookupRequest>,
) -> AppResult<Json<Vec<Tag>>> {
    Ok(Json(state.tagger.tag_lookup(body.tag.as_deref()).await?))
}

/// GET /v1/get_user_tags/{handle}
async fn user_tags(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> AppResult<Json<Vec<Tag>>> {
    Ok(Json(state.tagger.fetch_tags_by_user(&handle).await?))
}

/// GET /v1/frequently_used
async fn frequently_used(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> AppResult<Json<TagGroups>> {
    Ok(Json(state.tagger.frequently_used(&user).await?))
}

/// GET /i1/tags/{post_id} -- internal scope only.
async fn internal_tags(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Json<TagGroups>> {
    let post_id = PostId::parse(&post_id)?;
    Ok(Json(
        state.tagger.internal_tags_by_post(&user, &post_id).await?,
    ))
}

/// Mount the tag routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/add_tags", post(add_tags))
        .route("/v1/remove_tags", post(remove_tags))
        .route("/v1/inherit_tag", post(inherit_tag))
        .route("/v1/remove_inheritance", post(remove_inheritance))
        .route("/v1/tag/{tag}", get(fetch_tag).patch(update_tag))
        .route("/v1/fetch_tags/{post_id}", get(fetch_tags))
        .route("/v1/lookup_tags", post(lookup_tags))
        .route("/v1/get_user_tags/{handle}", get(user_tags))
        .route("/v1/frequently_used", get(frequently_used))
        .route("/i1/tags/{post_id}", get(internal_tags))
}
