//! Conversion from the internal tag form to the public form.

use tagd_cache::CounterStore;
use tagd_core::tag::Tag;
use tagd_db::models::InternalTag;
use tagd_directory::UserDirectory;

/// Resolves internal tags into the [`Tag`] form served to clients: the
/// owner id becomes a portable user record and the public-use count is
/// attached.
pub struct Projection {
    users: UserDirectory,
    counters: CounterStore,
}

impl Projection {
    pub fn new(users: UserDirectory, counters: CounterStore) -> Self {
        Self { users, counters }
    }

    /// Project one tag. Owner resolution and the counter read are issued
    /// together; either failing degrades its field (no owner, count 0)
    /// rather than failing the projection.
    pub async fn tag(&self, internal: InternalTag) -> Tag {
        let owner_task = async {
            let owner_id = internal.owner?;
            match self.users.fetch_user_by_id(owner_id).await {
                Ok(user) => Some(user.portable()),
                Err(err) => {
                    tracing::warn!(owner_id, error = %err, "tag owner resolution failed");
                    None
                }
            }
        };
        let count_task = async {
            match self.counters.get(&internal.name).await {
                Ok(count) => count,
                Err(err) => {
                    tracing::warn!(tag = %internal.name, error = %err, "counter read failed");
                    0
                }
            }
        };

        let (owner, count) = tokio::join!(owner_task, count_task);

        Tag {
            tag: internal.name,
            owner,
            group: internal.group,
            deprecated: internal.deprecated,
            inherited_tags: internal.inherited_tags,
            description: internal.description,
            count,
        }
    }
}
