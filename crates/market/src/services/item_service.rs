//! Listing creation, editing and browsing.

use std::sync::Arc;

use bazaar_backend::{Backend, BackendError, DataApiExt, Direction, Query};
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::entities::{
    Item, ItemDraft, ItemFilter, ItemStatus, NewItem, Profile, ITEMS_TABLE, PROFILES_TABLE,
};
use crate::services::{require_session, ImageService};
use crate::types::{MarketError, MarketResult};

pub struct ItemService {
    backend: Arc<dyn Backend>,
    images: Arc<ImageService>,
}

impl ItemService {
    pub fn new(backend: Arc<dyn Backend>, images: Arc<ImageService>) -> Self {
        Self { backend, images }
    }

    /// Publish a new listing owned by the signed-in principal.
    pub async fn create_item(&self, draft: &ItemDraft) -> MarketResult<Item> {
        let fields = draft.validate().map_err(MarketError::Validation)?;
        let session = require_session(&*self.backend).await?;

        let profile: Option<Profile> = self
            .backend
            .select_optional(&Query::from(PROFILES_TABLE).eq("user_id", &session.user.id))
            .await?;
        if profile.is_none() {
            return Err(MarketError::ProfileNotFound);
        }

        let row = NewItem::new(fields, &session.user.id);
        let item: Item = self.backend.insert_as(ITEMS_TABLE, &row).await?;
        info!(item_id = %item.id, user_id = %session.user.id, "item created");
        Ok(item)
    }

    /// Replace a listing's editable fields. Only the owner's rows match.
    pub async fn update_item(&self, item_id: &str, draft: &ItemDraft) -> MarketResult<Item> {
        let fields = draft.validate().map_err(MarketError::Validation)?;
        let session = require_session(&*self.backend).await?;

        let mut changes = serde_json::to_value(&fields).map_err(BackendError::from)?;
        changes["updated_at"] = json!(Utc::now());

        let updated: Vec<Item> = self
            .backend
            .update_as(&owned(item_id, &session.user.id), changes)
            .await?;
        let item = updated
            .into_iter()
            .next()
            .ok_or_else(|| MarketError::item_not_found(item_id))?;
        info!(item_id, "item updated");
        Ok(item)
    }

    pub async fn get_item(&self, item_id: &str) -> MarketResult<Item> {
        let query = Query::from(ITEMS_TABLE).eq("id", item_id);
        match self.backend.select_single(&query).await {
            Ok(item) => Ok(item),
            Err(err) if err.is_not_found() => Err(MarketError::item_not_found(item_id)),
            Err(err) => Err(err.into()),
        }
    }

    /// Browse listings, newest first. Failures yield an empty list.
    pub async fn list_items(&self, filter: &ItemFilter) -> Vec<Item> {
        let mut query = Query::from(ITEMS_TABLE).order("created_at", Direction::Descending);
        if let Some(category) = filter.category {
            query = query.eq("category", category.as_str());
        }
        if let Some(status) = filter.status {
            query = query.eq("status", status.as_str());
        }
        if let Some(owner) = &filter.owner {
            query = query.eq("user_id", owner);
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query = query.ilike("title", format!("*{search}*"));
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        match self.backend.select_as(&query).await {
            Ok(items) => items,
            Err(err) => {
                warn!(error = %err, "failed to load items");
                Vec::new()
            }
        }
    }

    /// Listings of the signed-in principal.
    pub async fn my_items(&self) -> MarketResult<Vec<Item>> {
        let session = require_session(&*self.backend).await?;
        let filter = ItemFilter {
            owner: Some(session.user.id),
            ..ItemFilter::default()
        };
        Ok(self.list_items(&filter).await)
    }

    pub async fn set_status(&self, item_id: &str, status: ItemStatus) -> MarketResult<Item> {
        let session = require_session(&*self.backend).await?;
        let updated: Vec<Item> = self
            .backend
            .update_as(
                &owned(item_id, &session.user.id),
                json!({ "status": status, "updated_at": Utc::now() }),
            )
            .await?;
        let item = updated
            .into_iter()
            .next()
            .ok_or_else(|| MarketError::item_not_found(item_id))?;
        info!(item_id, status = status.as_str(), "item status changed");
        Ok(item)
    }

    /// Bump the view counter. Best effort, returns the new count when it stuck.
    pub async fn record_view(&self, item: &Item) -> Option<i64> {
        let views = item.views + 1;
        let query = Query::from(ITEMS_TABLE).eq("id", &item.id);
        match self.backend.update(&query, json!({ "views": views })).await {
            Ok(_) => Some(views),
            Err(err) => {
                warn!(item_id = %item.id, error = %err, "could not record view");
                None
            }
        }
    }

    /// Remove a listing and its stored images.
    pub async fn delete_item(&self, item_id: &str) -> MarketResult<()> {
        let session = require_session(&*self.backend).await?;
        let item: Item = match self
            .backend
            .select_single(&owned(item_id, &session.user.id))
            .await
        {
            Ok(item) => item,
            Err(err) if err.is_not_found() => return Err(MarketError::item_not_found(item_id)),
            Err(err) => return Err(err.into()),
        };

        self.images.purge(&item.images).await;
        self.backend
            .delete(&owned(item_id, &session.user.id))
            .await?;
        info!(item_id, "item deleted");
        Ok(())
    }
}

fn owned(item_id: &str, user_id: &str) -> Query {
    Query::from(ITEMS_TABLE)
        .eq("id", item_id)
        .eq("user_id", user_id)
}
