//! Favorite toggling.
//!
//! Read-check-then-write against the join table, followed by a separate
//! read-modify-write of the item's counter. The two steps are not atomic;
//! a counter failure leaves the join row in place.

use std::sync::Arc;

use bazaar_backend::{Backend, DataApiExt, Direction, Query};
use serde_json::json;
use tracing::{info, warn};

use crate::entities::{
    Favorite, FavoriteToggle, Item, Profile, FAVORITES_TABLE, ITEMS_TABLE,
};
use crate::types::MarketResult;

pub struct FavoriteService {
    backend: Arc<dyn Backend>,
}

impl FavoriteService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    fn favorite_query(profile_id: &str, item_id: &str) -> Query {
        Query::from(FAVORITES_TABLE)
            .eq("profile_id", profile_id)
            .eq("item_id", item_id)
    }

    pub async fn is_favorited(&self, profile_id: &str, item_id: &str) -> MarketResult<bool> {
        let existing: Option<Favorite> = self
            .backend
            .select_optional(&Self::favorite_query(profile_id, item_id))
            .await?;
        Ok(existing.is_some())
    }

    pub async fn toggle_favorite(
        &self,
        profile: &Profile,
        item_id: &str,
    ) -> MarketResult<FavoriteToggle> {
        let query = Self::favorite_query(&profile.id, item_id);
        let existing: Option<Favorite> = self.backend.select_optional(&query).await?;

        let (favorited, delta) = match existing {
            Some(_) => {
                self.backend.delete(&query).await?;
                (false, -1)
            }
            None => {
                self.backend
                    .insert(
                        FAVORITES_TABLE,
                        json!({ "profile_id": profile.id, "item_id": item_id }),
                    )
                    .await?;
                (true, 1)
            }
        };
        info!(profile_id = %profile.id, item_id, favorited, "favorite toggled");

        let favorites = self.adjust_counter(item_id, delta).await;
        Ok(FavoriteToggle {
            favorited,
            favorites,
        })
    }

    /// Best effort: failures are logged and reported as an unknown count.
    async fn adjust_counter(&self, item_id: &str, delta: i64) -> Option<i64> {
        let query = Query::from(ITEMS_TABLE).eq("id", item_id);
        let current = match self.backend.select_single::<Item>(&query).await {
            Ok(item) => item.favorites,
            Err(err) => {
                warn!(item_id, error = %err, "could not read favorite counter");
                return None;
            }
        };

        let next = current + delta;
        match self
            .backend
            .update(&query, json!({ "favorites": next }))
            .await
        {
            Ok(_) => Some(next),
            Err(err) => {
                warn!(item_id, error = %err, "could not update favorite counter");
                None
            }
        }
    }

    /// Items favorited by a profile, most recently favorited first.
    pub async fn list_favorites(&self, profile_id: &str) -> Vec<Item> {
        let query = Query::from(FAVORITES_TABLE)
            .eq("profile_id", profile_id)
            .order("created_at", Direction::Descending);
        let favorites: Vec<Favorite> = match self.backend.select_as(&query).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(profile_id, error = %err, "failed to load favorites");
                return Vec::new();
            }
        };
        if favorites.is_empty() {
            return Vec::new();
        }

        let ids: Vec<&str> = favorites.iter().map(|favorite| favorite.item_id.as_str()).collect();
        let items_query = Query::from(ITEMS_TABLE).in_list("id", ids.iter());
        let mut items: Vec<Item> = match self.backend.select_as(&items_query).await {
            Ok(items) => items,
            Err(err) => {
                warn!(profile_id, error = %err, "failed to load favorite items");
                return Vec::new();
            }
        };

        items.sort_by_key(|item| {
            ids.iter()
                .position(|id| *id == item.id)
                .unwrap_or(usize::MAX)
        });
        items
    }
}
