//! Authenticated user record and the authorization gate.
//!
//! The gate is a set of pure predicates; transport-level token parsing
//! lives in the api crate and produces the [`UserAuth`] record consumed
//! here.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::tag::Privacy;
use crate::types::DbId;

/// Named role scopes carried by an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Any signed-in user.
    User,
    /// Moderator: may edit any tag and toggle deprecation.
    Mod,
    /// Administrator: may manage the inheritance graph.
    Admin,
    /// Service-to-service traffic on `/i1` routes.
    Internal,
}

/// The authenticated user record the core operates on.
///
/// `user_id` is `None` for anonymous requests. The raw bearer token is
/// retained so outbound directory calls can forward the caller's identity.
#[derive(Debug, Clone, Default)]
pub struct UserAuth {
    pub user_id: Option<DbId>,
    pub scopes: BTreeSet<Scope>,
    pub token: Option<String>,
}

impl UserAuth {
    /// An unauthenticated record, used for requests without credentials.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// The caller's id, or Unauthorized for anonymous callers.
    pub fn require_authenticated(&self) -> Result<DbId, CoreError> {
        self.user_id
            .ok_or_else(|| CoreError::Unauthorized("this operation requires authentication".into()))
    }

    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }
}

/// Whether `user` may edit the tag owned by `owner`.
pub fn may_edit(user: &UserAuth, owner: Option<DbId>) -> bool {
    (user.user_id.is_some() && user.user_id == owner) || user.has_scope(Scope::Mod)
}

/// Whether `user` may change a tag's deprecation flag.
pub fn may_edit_deprecation(user: &UserAuth) -> bool {
    user.has_scope(Scope::Mod)
}

/// Whether `user` may add an inheritance edge.
pub fn may_inherit(user: &UserAuth) -> bool {
    user.has_scope(Scope::Admin)
}

/// Whether `user` may remove an inheritance edge.
pub fn may_remove_inheritance(user: &UserAuth) -> bool {
    user.has_scope(Scope::Admin)
}

/// Whether `user` may see the tags of a post with the given visibility.
pub fn may_see_post_tags(user: &UserAuth, privacy: Privacy, uploader: DbId) -> bool {
    privacy.visible_to_all() || user.user_id == Some(uploader)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_scopes(user_id: DbId, scopes: &[Scope]) -> UserAuth {
        UserAuth {
            user_id: Some(user_id),
            scopes: scopes.iter().copied().collect(),
            token: None,
        }
    }

    #[test]
    fn owner_may_edit_own_tag() {
        let user = with_scopes(7, &[Scope::User]);
        assert!(may_edit(&user, Some(7)));
        assert!(!may_edit(&user, Some(8)));
        assert!(!may_edit(&user, None));
    }

    #[test]
    fn mod_may_edit_any_tag() {
        let moderator = with_scopes(1, &[Scope::User, Scope::Mod]);
        assert!(may_edit(&moderator, Some(99)));
        assert!(may_edit(&moderator, None));
    }

    #[test]
    fn anonymous_may_edit_nothing() {
        assert!(!may_edit(&UserAuth::anonymous(), None));
        assert!(!may_edit(&UserAuth::anonymous(), Some(1)));
    }

    #[test]
    fn deprecation_requires_mod() {
        assert!(may_edit_deprecation(&with_scopes(1, &[Scope::Mod])));
        assert!(!may_edit_deprecation(&with_scopes(1, &[Scope::User])));
    }

    #[test]
    fn inheritance_requires_admin() {
        let admin = with_scopes(1, &[Scope::Admin]);
        let moderator = with_scopes(2, &[Scope::Mod]);
        assert!(may_inherit(&admin));
        assert!(may_remove_inheritance(&admin));
        assert!(!may_inherit(&moderator));
        assert!(!may_remove_inheritance(&moderator));
    }

    #[test]
    fn post_visibility_gate() {
        let uploader = with_scopes(3, &[Scope::User]);
        let stranger = with_scopes(4, &[Scope::User]);
        let anon = UserAuth::anonymous();

        for user in [&uploader, &stranger, &anon] {
            assert!(may_see_post_tags(user, Privacy::Public, 3));
            assert!(may_see_post_tags(user, Privacy::Unlisted, 3));
        }
        assert!(may_see_post_tags(&uploader, Privacy::Private, 3));
        assert!(!may_see_post_tags(&stranger, Privacy::Private, 3));
        assert!(!may_see_post_tags(&anon, Privacy::Private, 3));
    }

    #[test]
    fn require_authenticated_rejects_anonymous() {
        assert!(UserAuth::anonymous().require_authenticated().is_err());
        assert_eq!(with_scopes(5, &[]).require_authenticated().unwrap(), 5);
    }
}
