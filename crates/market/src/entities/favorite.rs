use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const FAVORITES_TABLE: &str = "favorites";

/// Join row marking an item as favorited by a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    #[serde(default)]
    pub id: Option<String>,
    pub profile_id: String,
    pub item_id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Outcome of flipping a favorite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FavoriteToggle {
    /// State after the toggle
    pub favorited: bool,
    /// The item's counter after adjustment, `None` when it could not be updated
    pub favorites: Option<i64>,
}
