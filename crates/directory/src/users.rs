//! Client for the user-directory service.

use serde::Deserialize;

use tagd_core::tag::UserPortable;
use tagd_core::types::DbId;

use crate::{check_status, DirectoryError, REQUEST_TIMEOUT};

const SERVICE: &str = "user directory";

/// A user record as the directory returns it. Carries the numeric id for
/// internal use; the portable projection drops it.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryUser {
    pub user_id: DbId,
    pub handle: String,
    pub name: Option<String>,
}

impl DirectoryUser {
    pub fn portable(self) -> UserPortable {
        UserPortable {
            handle: self.handle,
            name: self.name,
        }
    }
}

/// HTTP client for the user directory.
#[derive(Clone)]
pub struct UserDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl UserDirectory {
    /// * `base_url` - e.g. `http://users.internal:5004`.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self { client, base_url }
    }

    /// Resolve a handle to a user record.
    pub async fn fetch_user(&self, handle: &str) -> Result<DirectoryUser, DirectoryError> {
        let response = self
            .client
            .get(format!("{}/v1/fetch_user/{handle}", self.base_url))
            .send()
            .await?;
        let response = check_status(SERVICE, handle, response).await?;
        Ok(response.json().await?)
    }

    /// Resolve an internal user id to a user record (internal route).
    pub async fn fetch_user_by_id(&self, user_id: DbId) -> Result<DirectoryUser, DirectoryError> {
        let response = self
            .client
            .get(format!("{}/i1/user/{user_id}", self.base_url))
            .send()
            .await?;
        let response = check_status(SERVICE, &user_id.to_string(), response).await?;
        Ok(response.json().await?)
    }
}
