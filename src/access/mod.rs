//! Access decisions for collections and the items inside them.
//!
//! Everything here is pure: callers load the principal, collection and item
//! and get back a [`Decision`]. An anonymous request is `principal = None`.

use crate::types::{Collection, Item, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Write,
    Administer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    ForbiddenResourceAccess,
    AccessDenied,
    EditDenied,
    DeleteDenied,
}

impl DenyReason {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ForbiddenResourceAccess => "FORBIDDEN_RESOURCE_ACCESS",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::EditDenied => "EDIT_DENIED",
            Self::DeleteDenied => "DELETE_DENIED",
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ForbiddenResourceAccess => "Insufficient permissions to modify this collection",
            Self::AccessDenied => "No access to this collection",
            Self::EditDenied => "Insufficient permissions to edit this item",
            Self::DeleteDenied => "Insufficient permissions to delete this item",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    #[must_use]
    pub fn is_allowed(self) -> bool {
        self == Self::Allow
    }

    fn allow_if(condition: bool, reason: DenyReason) -> Self {
        if condition { Self::Allow } else { Self::Deny(reason) }
    }
}

fn is_owner_or_admin(principal: Option<&User>, owner_id: &str) -> bool {
    principal.is_some_and(|p| p.id == owner_id || p.is_admin())
}

/// Resolves `action` on `collection` for `principal`.
///
/// Write and administer require ownership or the admin role. Read is open on
/// public collections and otherwise additionally open to allow-listed users.
#[must_use]
pub fn resolve(principal: Option<&User>, collection: &Collection, action: Action) -> Decision {
    match action {
        Action::Administer | Action::Write => Decision::allow_if(
            is_owner_or_admin(principal, &collection.owner_id),
            DenyReason::ForbiddenResourceAccess,
        ),
        Action::Read => Decision::allow_if(
            collection.is_public()
                || is_owner_or_admin(principal, &collection.owner_id)
                || principal.is_some_and(|p| collection.allows(&p.id)),
            DenyReason::AccessDenied,
        ),
    }
}

/// Base rule for adding an item: the principal must be able to write the
/// collection.
#[must_use]
pub fn resolve_item_create(principal: Option<&User>, collection: &Collection) -> Decision {
    resolve(principal, collection, Action::Write)
}

/// Layered on top of [`resolve_item_create`] for collections that restrict
/// item creation to their owner. Admins do not bypass it.
#[must_use]
pub fn resolve_owner_only_creation(principal: Option<&User>, collection: &Collection) -> Decision {
    if !collection.owner_only_items {
        return Decision::Allow;
    }
    Decision::allow_if(
        principal.is_some_and(|p| p.id == collection.owner_id),
        DenyReason::ForbiddenResourceAccess,
    )
}

/// Items may be edited by their creator or an admin, and by any
/// authenticated user while the parent collection is public.
#[must_use]
pub fn resolve_item_edit(
    principal: Option<&User>,
    collection: &Collection,
    item: &Item,
) -> Decision {
    Decision::allow_if(
        principal.is_some_and(|_| collection.is_public())
            || is_owner_or_admin(principal, &item.created_by),
        DenyReason::EditDenied,
    )
}

/// Items may only be deleted by their creator or an admin.
#[must_use]
pub fn resolve_item_delete(principal: Option<&User>, item: &Item) -> Decision {
    Decision::allow_if(
        is_owner_or_admin(principal, &item.created_by),
        DenyReason::DeleteDenied,
    )
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::{AttributeMap, Privacy, Role};

    fn user(id: &str, role: Role) -> User {
        User {
            id: id.to_string(),
            username: id.to_string(),
            email: format!("{id}@example.com"),
            password_hash: String::new(),
            role,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn collection(owner: &str, privacy: Privacy, allowed: &[&str]) -> Collection {
        Collection {
            id: "col-1".to_string(),
            name: "Shelf".to_string(),
            description: None,
            owner_id: owner.to_string(),
            category_id: "cat-1".to_string(),
            privacy,
            allowed_users: allowed.iter().map(|s| s.to_string()).collect(),
            owner_only_items: false,
            views: 0,
            cover_image: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(created_by: &str) -> Item {
        Item {
            id: "item-1".to_string(),
            collection_id: "col-1".to_string(),
            name: "Dune".to_string(),
            description: None,
            attributes: AttributeMap::new(),
            images: Vec::new(),
            created_by: created_by.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_private_read_allow_list() {
        let col = collection("u1", Privacy::Private, &["u2"]);
        let u2 = user("u2", Role::User);
        let u3 = user("u3", Role::User);

        assert_eq!(resolve(Some(&u2), &col, Action::Read), Decision::Allow);
        assert_eq!(
            resolve(Some(&u3), &col, Action::Read),
            Decision::Deny(DenyReason::AccessDenied)
        );
        assert_eq!(
            resolve(None, &col, Action::Read),
            Decision::Deny(DenyReason::AccessDenied)
        );
    }

    #[test]
    fn test_public_read_is_anonymous() {
        let col = collection("u1", Privacy::Public, &[]);
        assert!(resolve(None, &col, Action::Read).is_allowed());
        assert_eq!(
            resolve(None, &col, Action::Write),
            Decision::Deny(DenyReason::ForbiddenResourceAccess)
        );
    }

    #[test]
    fn test_write_requires_owner_or_admin() {
        let col = collection("u1", Privacy::Private, &["u2"]);
        let owner = user("u1", Role::User);
        let admin = user("root", Role::Admin);
        let allowed = user("u2", Role::User);

        assert!(resolve(Some(&owner), &col, Action::Administer).is_allowed());
        assert!(resolve(Some(&admin), &col, Action::Write).is_allowed());
        assert_eq!(
            resolve(Some(&allowed), &col, Action::Write),
            Decision::Deny(DenyReason::ForbiddenResourceAccess)
        );
    }

    #[test]
    fn test_read_denial_implies_write_denial() {
        let principals = [
            None,
            Some(user("u1", Role::User)),
            Some(user("u2", Role::User)),
            Some(user("u3", Role::User)),
            Some(user("root", Role::Admin)),
        ];
        let collections = [
            collection("u1", Privacy::Private, &["u2"]),
            collection("u1", Privacy::Public, &[]),
            collection("u9", Privacy::Private, &[]),
        ];

        for col in &collections {
            for principal in &principals {
                if !resolve(principal.as_ref(), col, Action::Read).is_allowed() {
                    assert!(!resolve(principal.as_ref(), col, Action::Write).is_allowed());
                    assert!(!resolve(principal.as_ref(), col, Action::Administer).is_allowed());
                }
            }
        }
    }

    #[test]
    fn test_public_collection_loosens_item_edit_only() {
        let col = collection("u1", Privacy::Public, &[]);
        let it = item("u1");
        let u2 = user("u2", Role::User);

        assert!(resolve_item_edit(Some(&u2), &col, &it).is_allowed());
        assert_eq!(
            resolve_item_delete(Some(&u2), &it),
            Decision::Deny(DenyReason::DeleteDenied)
        );
        assert_eq!(
            resolve_item_edit(None, &col, &it),
            Decision::Deny(DenyReason::EditDenied)
        );
    }

    #[test]
    fn test_private_item_edit_by_creator_or_admin() {
        let col = collection("u1", Privacy::Private, &["u2"]);
        let it = item("u2");

        assert!(resolve_item_edit(Some(&user("u2", Role::User)), &col, &it).is_allowed());
        assert!(resolve_item_edit(Some(&user("root", Role::Admin)), &col, &it).is_allowed());
        assert_eq!(
            resolve_item_edit(Some(&user("u1", Role::User)), &col, &it),
            Decision::Deny(DenyReason::EditDenied)
        );
    }

    #[test]
    fn test_owner_only_creation_excludes_admin() {
        let mut col = collection("u1", Privacy::Public, &[]);
        let admin = user("root", Role::Admin);

        assert!(resolve_item_create(Some(&admin), &col).is_allowed());
        assert!(resolve_owner_only_creation(Some(&admin), &col).is_allowed());

        col.owner_only_items = true;
        assert_eq!(
            resolve_owner_only_creation(Some(&admin), &col),
            Decision::Deny(DenyReason::ForbiddenResourceAccess)
        );
        assert!(resolve_owner_only_creation(Some(&user("u1", Role::User)), &col).is_allowed());
    }
}
