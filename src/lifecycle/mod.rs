//! Creation, update and deletion of items.
//!
//! `prepare_*` functions are pure: they validate and build the item that
//! would be stored. [`ItemLifecycle`] persists prepared items.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::attributes::{ValidationMode, Violation, validate};
use crate::error::Error as StoreError;
use crate::store::Store;
use crate::types::{
    AttributeMap, AttributeSchema, Category, Collection, Item, SubmittedAttributes, User,
    find_attribute,
};
use crate::validation::{validate_description, validate_images, validate_item_name};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid item fields")]
    InvalidFields(Vec<String>),

    #[error("invalid attributes")]
    InvalidAttributes(Vec<Violation>),

    #[error("an item cannot be moved to another collection")]
    ParentImmutable,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A new item as submitted by a client.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemDraft {
    pub collection_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub attributes: SubmittedAttributes,
}

/// A partial update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemChanges {
    #[serde(default)]
    pub collection_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub attributes: Option<SubmittedAttributes>,
}

fn check_fields(
    name: &str,
    description: Option<&str>,
    images: &[String],
    category: &Category,
) -> Result<(), LifecycleError> {
    let errors: Vec<String> = [
        validate_item_name(name, category.require_item_name),
        validate_description(description),
        validate_images(images),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(LifecycleError::InvalidFields(errors))
    }
}

/// Builds a new item owned by `creator`.
pub fn prepare_create(
    creator: &User,
    collection: &Collection,
    category: &Category,
    draft: ItemDraft,
    now: DateTime<Utc>,
) -> Result<Item, LifecycleError> {
    check_fields(&draft.name, draft.description.as_deref(), &draft.images, category)?;

    let attributes = validate(&category.attributes, &draft.attributes, ValidationMode::Create)
        .map_err(LifecycleError::InvalidAttributes)?;

    Ok(Item {
        id: Uuid::new_v4().to_string(),
        collection_id: collection.id.clone(),
        name: draft.name.trim().to_string(),
        description: draft.description,
        attributes,
        images: draft.images,
        created_by: creator.id.clone(),
        created_at: now,
        updated_at: now,
    })
}

/// Applies `changes` to `existing`. The creator and parent collection never
/// change, and the resulting attribute map covers exactly the category's
/// current schema.
pub fn prepare_update(
    existing: &Item,
    category: &Category,
    changes: ItemChanges,
    now: DateTime<Utc>,
) -> Result<Item, LifecycleError> {
    if let Some(collection_id) = &changes.collection_id {
        if *collection_id != existing.collection_id {
            return Err(LifecycleError::ParentImmutable);
        }
    }

    let name = changes.name.unwrap_or_else(|| existing.name.clone());
    // An empty description clears it.
    let description = match changes.description {
        Some(d) if d.trim().is_empty() => None,
        Some(d) => Some(d),
        None => existing.description.clone(),
    };
    let images = changes.images.unwrap_or_else(|| existing.images.clone());
    check_fields(&name, description.as_deref(), &images, category)?;

    let supplied = match &changes.attributes {
        Some(submitted) => validate(&category.attributes, submitted, ValidationMode::Update)
            .map_err(LifecycleError::InvalidAttributes)?,
        None => AttributeMap::new(),
    };

    Ok(Item {
        id: existing.id.clone(),
        collection_id: existing.collection_id.clone(),
        name: name.trim().to_string(),
        description,
        attributes: merge_attributes(&category.attributes, &existing.attributes, supplied),
        images,
        created_by: existing.created_by.clone(),
        created_at: existing.created_at,
        updated_at: now,
    })
}

/// Produces one entry per schema attribute: the supplied value if any, else
/// the previous value if it still conforms, else the kind's zero value.
/// Previous entries for attributes no longer in the schema are dropped.
#[must_use]
pub fn merge_attributes(
    schemas: &[AttributeSchema],
    previous: &AttributeMap,
    supplied: AttributeMap,
) -> AttributeMap {
    schemas
        .iter()
        .map(|schema| {
            let value = supplied
                .get(&schema.name)
                .cloned()
                .or_else(|| {
                    find_attribute(previous, &schema.name)
                        .filter(|v| v.conforms_to(schema))
                        .cloned()
                })
                .unwrap_or_else(|| schema.zero_value());
            (schema.name.clone(), value)
        })
        .collect()
}

/// Persists prepared items.
pub struct ItemLifecycle<'a> {
    store: &'a dyn Store,
}

impl<'a> ItemLifecycle<'a> {
    #[must_use]
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub fn insert(&self, item: &Item) -> Result<(), LifecycleError> {
        self.store.create_item(item)?;
        tracing::debug!(item = %item.id, collection = %item.collection_id, "item created");
        Ok(())
    }

    pub fn save(&self, item: &Item) -> Result<(), LifecycleError> {
        self.store.update_item(item)?;
        tracing::debug!(item = %item.id, "item updated");
        Ok(())
    }

    pub fn delete(&self, item: &Item) -> Result<(), LifecycleError> {
        if !self.store.delete_item(&item.id)? {
            return Err(LifecycleError::Store(StoreError::NotFound));
        }
        tracing::debug!(item = %item.id, "item deleted");
        Ok(())
    }
}
