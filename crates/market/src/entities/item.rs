use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ValidationErrors;

pub const ITEMS_TABLE: &str = "items";
pub const MAX_ITEM_IMAGES: usize = 3;

const TITLE_MIN: usize = 2;
const TITLE_MAX: usize = 50;
const DESCRIPTION_MIN: usize = 10;
const DESCRIPTION_MAX: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Electronics,
    Fashion,
    Home,
    Sports,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Electronics,
        Category::Fashion,
        Category::Home,
        Category::Sports,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Electronics => "electronics",
            Category::Fashion => "fashion",
            Category::Home => "home",
            Category::Sports => "sports",
            Category::Other => "other",
        }
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == s.trim().to_lowercase())
            .ok_or(())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition grade of a listed item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Quality {
    New,
    LikeNew,
    Good,
    Fair,
    Poor,
}

impl Quality {
    pub const ALL: [Quality; 5] = [
        Quality::New,
        Quality::LikeNew,
        Quality::Good,
        Quality::Fair,
        Quality::Poor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::New => "new",
            Quality::LikeNew => "like-new",
            Quality::Good => "good",
            Quality::Fair => "fair",
            Quality::Poor => "poor",
        }
    }
}

impl FromStr for Quality {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Quality::ALL
            .into_iter()
            .find(|quality| quality.as_str() == s.trim().to_lowercase())
            .ok_or(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Available,
    Pending,
    Sold,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::Pending => "pending",
            ItemStatus::Sold => "sold",
        }
    }
}

impl From<&str> for ItemStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pending" => ItemStatus::Pending,
            "sold" => ItemStatus::Sold,
            _ => ItemStatus::Available,
        }
    }
}

/// A listed item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    /// Owning auth principal
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    pub price: f64,
    pub quality: Quality,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub main_image: Option<String>,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub favorites: i64,
    #[serde(default)]
    pub conversations: i64,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Item {
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    /// Image shown first: the chosen main image, else the first one.
    pub fn cover_image(&self) -> Option<&str> {
        self.main_image
            .as_deref()
            .or_else(|| self.images.first().map(String::as_str))
    }
}

/// Listing form as submitted, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemDraft {
    pub title: String,
    pub description: String,
    pub category: String,
    pub price: String,
    pub quality: String,
    pub location: String,
    pub images: Vec<String>,
    #[serde(default)]
    pub main_image: Option<String>,
}

/// Validated listing fields, ready to be written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFields {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub price: f64,
    pub quality: Quality,
    pub location: String,
    pub images: Vec<String>,
    pub main_image: Option<String>,
}

impl ItemDraft {
    /// Check every field, collecting all failures.
    pub fn validate(&self) -> Result<ItemFields, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let title = self.title.trim();
        let title_len = title.chars().count();
        if title_len < TITLE_MIN {
            errors.push("title", "Title must be at least 2 characters");
        } else if title_len > TITLE_MAX {
            errors.push("title", "Title must be less than 50 characters");
        }

        let description = self.description.trim();
        let description_len = description.chars().count();
        if description_len < DESCRIPTION_MIN {
            errors.push("description", "Description must be at least 10 characters");
        } else if description_len > DESCRIPTION_MAX {
            errors.push("description", "Description must be less than 500 characters");
        }

        let category = if self.category.trim().is_empty() {
            errors.push("category", "Please select a category");
            None
        } else {
            let parsed = self.category.parse::<Category>().ok();
            if parsed.is_none() {
                errors.push("category", "Please select a valid category");
            }
            parsed
        };

        let price = if self.price.trim().is_empty() {
            errors.push("price", "Please enter a price");
            None
        } else {
            match self.price.trim().parse::<f64>() {
                Ok(price) if price.is_finite() && price >= 0.0 => Some(price),
                _ => {
                    errors.push("price", "Price must be a non-negative number");
                    None
                }
            }
        };

        let quality = if self.quality.trim().is_empty() {
            errors.push("quality", "Please select item quality");
            None
        } else {
            let parsed = self.quality.parse::<Quality>().ok();
            if parsed.is_none() {
                errors.push("quality", "Please select a valid item quality");
            }
            parsed
        };

        let location = self.location.trim();
        if location.is_empty() {
            errors.push("location", "Please enter a location");
        }

        if self.images.is_empty() {
            errors.push("images", "Please upload at least one image");
        } else if self.images.len() > MAX_ITEM_IMAGES {
            errors.push("images", "Maximum 3 images allowed");
        }

        let main_image = match &self.main_image {
            Some(main) if !self.images.contains(main) => {
                errors.push("main_image", "Main image must be one of the uploaded images");
                None
            }
            Some(main) => Some(main.clone()),
            None => self.images.first().cloned(),
        };

        match (category, price, quality) {
            (Some(category), Some(price), Some(quality)) if errors.is_empty() => Ok(ItemFields {
                title: title.to_string(),
                description: description.to_string(),
                category,
                price,
                quality,
                location: location.to_string(),
                images: self.images.clone(),
                main_image,
            }),
            _ => Err(errors),
        }
    }
}

impl From<&Item> for ItemDraft {
    fn from(item: &Item) -> Self {
        Self {
            title: item.title.clone(),
            description: item.description.clone(),
            category: item.category.as_str().to_string(),
            price: item.price.to_string(),
            quality: item.quality.as_str().to_string(),
            location: item.location.clone(),
            images: item.images.clone(),
            main_image: item.main_image.clone(),
        }
    }
}

/// Row written when a listing is created
#[derive(Debug, Clone, Serialize)]
pub struct NewItem {
    #[serde(flatten)]
    pub fields: ItemFields,
    pub user_id: String,
    pub status: ItemStatus,
    pub views: i64,
    pub favorites: i64,
    pub conversations: i64,
}

impl NewItem {
    pub fn new(fields: ItemFields, user_id: impl Into<String>) -> Self {
        Self {
            fields,
            user_id: user_id.into(),
            status: ItemStatus::Available,
            views: 0,
            favorites: 0,
            conversations: 0,
        }
    }
}

/// Listing query options
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub category: Option<Category>,
    pub status: Option<ItemStatus>,
    pub owner: Option<String>,
    /// Case-insensitive title search
    pub search: Option<String>,
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_draft() -> ItemDraft {
        ItemDraft {
            title: "Vintage camera".into(),
            description: "Fully working film camera with strap".into(),
            category: "electronics".into(),
            price: "120".into(),
            quality: "like-new".into(),
            location: "Berlin".into(),
            images: vec!["item/1.jpg".into()],
            main_image: None,
        }
    }

    #[test]
    fn valid_draft_defaults_main_image_to_first() {
        let fields = valid_draft().validate().expect("draft should be valid");
        assert_eq!(fields.category, Category::Electronics);
        assert_eq!(fields.quality, Quality::LikeNew);
        assert_eq!(fields.price, 120.0);
        assert_eq!(fields.main_image.as_deref(), Some("item/1.jpg"));
    }

    #[test]
    fn empty_images_block_regardless_of_other_fields() {
        let mut draft = valid_draft();
        draft.images.clear();
        let errors = draft.validate().expect_err("images are required");
        assert_eq!(errors.for_field("images"), Some("Please upload at least one image"));
        assert_eq!(errors.0.len(), 1);

        let errors = ItemDraft::default().validate().expect_err("everything missing");
        assert_eq!(errors.for_field("images"), Some("Please upload at least one image"));
    }

    #[test]
    fn collects_every_field_error() {
        let draft = ItemDraft {
            title: "A".into(),
            description: "short".into(),
            price: "-4".into(),
            images: vec!["1".into(), "2".into(), "3".into(), "4".into()],
            ..ItemDraft::default()
        };
        let errors = draft.validate().expect_err("invalid");

        assert_eq!(errors.for_field("title"), Some("Title must be at least 2 characters"));
        assert_eq!(
            errors.for_field("description"),
            Some("Description must be at least 10 characters")
        );
        assert_eq!(errors.for_field("category"), Some("Please select a category"));
        assert_eq!(errors.for_field("price"), Some("Price must be a non-negative number"));
        assert_eq!(errors.for_field("quality"), Some("Please select item quality"));
        assert_eq!(errors.for_field("location"), Some("Please enter a location"));
        assert_eq!(errors.for_field("images"), Some("Maximum 3 images allowed"));
    }

    #[test]
    fn main_image_must_be_listed() {
        let mut draft = valid_draft();
        draft.main_image = Some("elsewhere.jpg".into());
        let errors = draft.validate().expect_err("unknown main image");
        assert!(errors.for_field("main_image").is_some());
    }

    #[test]
    fn enums_use_stored_spelling() {
        assert_eq!(serde_json::to_value(Quality::LikeNew).unwrap(), "like-new");
        assert_eq!(serde_json::to_value(Category::Home).unwrap(), "home");
        assert_eq!(ItemStatus::from("SOLD"), ItemStatus::Sold);
        assert_eq!("Sports".parse::<Category>(), Ok(Category::Sports));
        assert!("vehicles".parse::<Category>().is_err());
    }

    #[test]
    fn new_item_starts_available_with_zero_counters() {
        let fields = valid_draft().validate().unwrap();
        let row = serde_json::to_value(NewItem::new(fields, "user-1")).unwrap();
        assert_eq!(row["status"], "available");
        assert_eq!(row["views"], 0);
        assert_eq!(row["favorites"], 0);
        assert_eq!(row["conversations"], 0);
        assert_eq!(row["user_id"], "user-1");
        assert_eq!(row["title"], "Vintage camera");
    }
}
