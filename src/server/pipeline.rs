//! Request authorization as an ordered chain of checks.
//!
//! Each [`Check`] receives the [`RequestContext`] built so far and either
//! returns it (possibly enriched with loaded entities) or short-circuits with
//! an [`ApiError`]. Checks never write to the store.

use chrono::Utc;

use super::response::{ApiError, StoreOptionExt, StoreResultExt};
use crate::access::{self, Action, Decision};
use crate::lifecycle::{ItemChanges, ItemDraft, prepare_create, prepare_update};
use crate::store::Store;
use crate::types::{Category, Collection, Item, Privacy, User};
use crate::validation::validate_username;

#[derive(Debug, Default)]
pub struct RequestContext {
    pub principal: Option<User>,
    pub collection: Option<Collection>,
    pub category: Option<Category>,
    pub item: Option<Item>,
    /// The item as it would be stored after a create or update.
    pub prepared_item: Option<Item>,
    /// A user being added to an allow-list.
    pub subject_user: Option<User>,
}

fn missing(what: &str) -> ApiError {
    tracing::error!("pipeline misconfigured: no {what} in context");
    ApiError::internal("Internal server error")
}

impl RequestContext {
    #[must_use]
    pub fn new(principal: Option<User>) -> Self {
        Self {
            principal,
            ..Self::default()
        }
    }

    pub fn principal(&self) -> Result<&User, ApiError> {
        self.principal.as_ref().ok_or_else(|| missing("principal"))
    }

    pub fn collection(&self) -> Result<&Collection, ApiError> {
        self.collection.as_ref().ok_or_else(|| missing("collection"))
    }

    pub fn category(&self) -> Result<&Category, ApiError> {
        self.category.as_ref().ok_or_else(|| missing("category"))
    }

    pub fn item(&self) -> Result<&Item, ApiError> {
        self.item.as_ref().ok_or_else(|| missing("item"))
    }

    pub fn take_collection(&mut self) -> Result<Collection, ApiError> {
        self.collection.take().ok_or_else(|| missing("collection"))
    }

    pub fn take_item(&mut self) -> Result<Item, ApiError> {
        self.item.take().ok_or_else(|| missing("item"))
    }

    pub fn take_prepared_item(&mut self) -> Result<Item, ApiError> {
        self.prepared_item.take().ok_or_else(|| missing("prepared item"))
    }

    pub fn take_subject_user(&mut self) -> Result<User, ApiError> {
        self.subject_user.take().ok_or_else(|| missing("subject user"))
    }
}

pub trait Check: Send {
    fn name(&self) -> &'static str;

    fn check(self: Box<Self>, store: &dyn Store, ctx: RequestContext)
    -> Result<RequestContext, ApiError>;
}

#[derive(Default)]
pub struct Pipeline {
    checks: Vec<Box<dyn Check>>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn then(mut self, check: impl Check + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    /// Runs every check in order, stopping at the first failure.
    pub fn run(
        self,
        store: &dyn Store,
        mut ctx: RequestContext,
    ) -> Result<RequestContext, ApiError> {
        for check in self.checks {
            let name = check.name();
            ctx = check.check(store, ctx).inspect_err(|e| {
                tracing::debug!(check = name, code = e.code, "request short-circuited");
            })?;
        }
        Ok(ctx)
    }
}

fn enforce(decision: Decision) -> Result<(), ApiError> {
    match decision {
        Decision::Allow => Ok(()),
        Decision::Deny(reason) => Err(reason.into()),
    }
}

pub struct RequireAuthenticated;

impl Check for RequireAuthenticated {
    fn name(&self) -> &'static str {
        "require_authenticated"
    }

    fn check(
        self: Box<Self>,
        _: &dyn Store,
        ctx: RequestContext,
    ) -> Result<RequestContext, ApiError> {
        if ctx.principal.is_none() {
            return Err(ApiError::unauthorized("MISSING_TOKEN", "Authentication required"));
        }
        Ok(ctx)
    }
}

pub struct LoadCollection(pub String);

impl Check for LoadCollection {
    fn name(&self) -> &'static str {
        "load_collection"
    }

    fn check(
        self: Box<Self>,
        store: &dyn Store,
        mut ctx: RequestContext,
    ) -> Result<RequestContext, ApiError> {
        let collection = store
            .get_collection(&self.0)
            .api_err("Failed to get collection")?
            .or_not_found("COLLECTION_NOT_FOUND", "Collection not found")?;
        ctx.collection = Some(collection);
        Ok(ctx)
    }
}

/// Loads a collection and its category. With no id, the collection is the
/// parent of the item already in the context.
pub struct LoadCollectionAndCategory(pub Option<String>);

impl Check for LoadCollectionAndCategory {
    fn name(&self) -> &'static str {
        "load_collection_and_category"
    }

    fn check(
        self: Box<Self>,
        store: &dyn Store,
        ctx: RequestContext,
    ) -> Result<RequestContext, ApiError> {
        let collection_id = match self.0 {
            Some(id) => id,
            None => ctx.item()?.collection_id.clone(),
        };
        let mut ctx = Box::new(LoadCollection(collection_id)).check(store, ctx)?;

        let category = store
            .get_category(&ctx.collection()?.category_id)
            .api_err("Failed to get category")?
            .or_not_found("CATEGORY_NOT_FOUND", "Category not found")?;
        ctx.category = Some(category);
        Ok(ctx)
    }
}

pub struct LoadItem(pub String);

impl Check for LoadItem {
    fn name(&self) -> &'static str {
        "load_item"
    }

    fn check(
        self: Box<Self>,
        store: &dyn Store,
        mut ctx: RequestContext,
    ) -> Result<RequestContext, ApiError> {
        let item = store
            .get_item(&self.0)
            .api_err("Failed to get item")?
            .or_not_found("ITEM_NOT_FOUND", "Item not found")?;
        ctx.item = Some(item);
        Ok(ctx)
    }
}

pub struct ResolveAccess(pub Action);

impl Check for ResolveAccess {
    fn name(&self) -> &'static str {
        "resolve_access"
    }

    fn check(
        self: Box<Self>,
        _: &dyn Store,
        ctx: RequestContext,
    ) -> Result<RequestContext, ApiError> {
        enforce(access::resolve(ctx.principal.as_ref(), ctx.collection()?, self.0))?;
        Ok(ctx)
    }
}

pub struct RequireItemCreation;

impl Check for RequireItemCreation {
    fn name(&self) -> &'static str {
        "require_item_creation"
    }

    fn check(
        self: Box<Self>,
        _: &dyn Store,
        ctx: RequestContext,
    ) -> Result<RequestContext, ApiError> {
        enforce(access::resolve_item_create(ctx.principal.as_ref(), ctx.collection()?))?;
        Ok(ctx)
    }
}

pub struct RequireOwnerOnlyItemCreation;

impl Check for RequireOwnerOnlyItemCreation {
    fn name(&self) -> &'static str {
        "require_owner_only_item_creation"
    }

    fn check(
        self: Box<Self>,
        _: &dyn Store,
        ctx: RequestContext,
    ) -> Result<RequestContext, ApiError> {
        enforce(access::resolve_owner_only_creation(
            ctx.principal.as_ref(),
            ctx.collection()?,
        ))?;
        Ok(ctx)
    }
}

pub struct RequireItemEditor;

impl Check for RequireItemEditor {
    fn name(&self) -> &'static str {
        "require_item_editor"
    }

    fn check(
        self: Box<Self>,
        _: &dyn Store,
        ctx: RequestContext,
    ) -> Result<RequestContext, ApiError> {
        enforce(access::resolve_item_edit(
            ctx.principal.as_ref(),
            ctx.collection()?,
            ctx.item()?,
        ))?;
        Ok(ctx)
    }
}

pub struct RequireItemDeleter;

impl Check for RequireItemDeleter {
    fn name(&self) -> &'static str {
        "require_item_deleter"
    }

    fn check(
        self: Box<Self>,
        _: &dyn Store,
        ctx: RequestContext,
    ) -> Result<RequestContext, ApiError> {
        enforce(access::resolve_item_delete(ctx.principal.as_ref(), ctx.item()?))?;
        Ok(ctx)
    }
}

/// Checks the requested privacy and allow-list against each other and the
/// user table. Absent fields fall back to the loaded collection's state, or
/// to a new public collection owned by the principal.
pub struct ValidateAllowedUsers {
    pub privacy: Option<Privacy>,
    pub allowed_users: Option<Vec<String>>,
}

impl Check for ValidateAllowedUsers {
    fn name(&self) -> &'static str {
        "validate_allowed_users"
    }

    fn check(
        self: Box<Self>,
        store: &dyn Store,
        ctx: RequestContext,
    ) -> Result<RequestContext, ApiError> {
        let (current, owner_id) = match &ctx.collection {
            Some(c) => (c.privacy, c.owner_id.as_str()),
            None => (Privacy::Public, ctx.principal()?.id.as_str()),
        };
        let effective = self.privacy.unwrap_or(current);
        let Some(allowed) = self.allowed_users else {
            return Ok(ctx);
        };

        if effective == Privacy::Public {
            if allowed.is_empty() {
                return Ok(ctx);
            }
            return Err(ApiError::bad_request(
                "PUBLIC_COLLECTION_CONFLICT",
                "A public collection cannot have allowed users",
            ));
        }

        let mut invalid = Vec::new();
        for id in &allowed {
            let eligible = id != owner_id
                && store
                    .get_user(id)
                    .api_err("Failed to get user")?
                    .is_some_and(|u| u.is_active);
            if !eligible && !invalid.contains(id) {
                invalid.push(id.clone());
            }
        }

        if !invalid.is_empty() {
            return Err(ApiError::bad_request(
                "INVALID_USERS_SELECTED",
                "Allowed users must be active and cannot include the owner",
            )
            .with_details(invalid));
        }
        Ok(ctx)
    }
}

/// Resolves a username into a user who may be allow-listed on the loaded
/// collection.
pub struct LoadAllowListCandidate(pub String);

impl Check for LoadAllowListCandidate {
    fn name(&self) -> &'static str {
        "load_allow_list_candidate"
    }

    fn check(
        self: Box<Self>,
        store: &dyn Store,
        mut ctx: RequestContext,
    ) -> Result<RequestContext, ApiError> {
        let username = self.0.trim();
        validate_username(username).map_err(|e| ApiError::bad_request("INVALID_USERNAME", e))?;

        let user = store
            .get_user_by_username(username)
            .api_err("Failed to get user")?
            .or_not_found("USER_NOT_FOUND", "User not found")?;

        if !user.is_active || user.id == ctx.collection()?.owner_id {
            return Err(ApiError::bad_request(
                "INVALID_USERS_SELECTED",
                "Allowed users must be active and cannot include the owner",
            )
            .with_details(vec![user.username]));
        }

        ctx.subject_user = Some(user);
        Ok(ctx)
    }
}

pub struct PrepareItemCreate(pub ItemDraft);

impl Check for PrepareItemCreate {
    fn name(&self) -> &'static str {
        "validate_item_attributes"
    }

    fn check(
        self: Box<Self>,
        _: &dyn Store,
        mut ctx: RequestContext,
    ) -> Result<RequestContext, ApiError> {
        let item = prepare_create(
            ctx.principal()?,
            ctx.collection()?,
            ctx.category()?,
            self.0,
            Utc::now(),
        )?;
        ctx.prepared_item = Some(item);
        Ok(ctx)
    }
}

pub struct PrepareItemUpdate(pub ItemChanges);

impl Check for PrepareItemUpdate {
    fn name(&self) -> &'static str {
        "merge_item_changes"
    }

    fn check(
        self: Box<Self>,
        _: &dyn Store,
        mut ctx: RequestContext,
    ) -> Result<RequestContext, ApiError> {
        let item = prepare_update(ctx.item()?, ctx.category()?, self.0, Utc::now())?;
        ctx.prepared_item = Some(item);
        Ok(ctx)
    }
}
