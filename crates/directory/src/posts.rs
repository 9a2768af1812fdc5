//! Client for the post-directory service.

use serde::Deserialize;
use serde_json::json;

use tagd_core::tag::Privacy;
use tagd_core::types::{DbId, PostId};

use crate::{check_status, DirectoryError, REQUEST_TIMEOUT};

const SERVICE: &str = "post directory";

/// How many recent posts to pull for the frequently-used aggregation.
const RECENT_POSTS: u32 = 64;

/// A post record as the directory returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct InternalPost {
    pub post_id: PostId,
    pub uploader: DbId,
    pub privacy: Privacy,
}

/// HTTP client for the post directory. The caller's bearer token is
/// forwarded so the upstream applies its own visibility rules.
#[derive(Clone)]
pub struct PostDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl PostDirectory {
    /// * `base_url` - e.g. `http://posts.internal:5003`.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self { client, base_url }
    }

    /// Fetch one post record.
    pub async fn fetch_post(
        &self,
        post_id: &PostId,
        token: Option<&str>,
    ) -> Result<InternalPost, DirectoryError> {
        let mut request = self
            .client
            .get(format!("{}/i1/post/{post_id}", self.base_url));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let response = check_status(SERVICE, post_id.as_str(), response).await?;
        Ok(response.json().await?)
    }

    /// The caller's most recent posts, newest first.
    pub async fn user_posts(&self, token: &str) -> Result<Vec<InternalPost>, DirectoryError> {
        let response = self
            .client
            .post(format!("{}/v1/user_posts", self.base_url))
            .bearer_auth(token)
            .json(&json!({ "sort": "new", "count": RECENT_POSTS }))
            .send()
            .await?;
        let response = check_status(SERVICE, "user posts", response).await?;
        Ok(response.json().await?)
    }
}
