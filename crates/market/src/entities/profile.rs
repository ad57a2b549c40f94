use bazaar_backend::AuthUser;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PROFILES_TABLE: &str = "profiles";
pub const DEFAULT_REPUTATION: f64 = 5.0;

/// Public profile attached 1:1 to an auth principal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    /// Auth principal owning this profile
    pub user_id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub invites_left: i32,
    #[serde(default = "default_reputation")]
    pub reputation_score: f64,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_reputation() -> f64 {
    DEFAULT_REPUTATION
}

impl Profile {
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("Someone")
    }

    pub fn can_invite(&self) -> bool {
        self.invites_left > 0
    }
}

/// Row inserted when a principal visits for the first time
#[derive(Debug, Clone, Serialize)]
pub struct NewProfile {
    pub user_id: String,
    pub full_name: String,
    pub invites_left: i32,
    pub reputation_score: f64,
    pub is_admin: bool,
}

impl NewProfile {
    /// Defaults for `user`: signup name, else the local part of the email.
    pub fn for_user(user: &AuthUser, invites: i32) -> Self {
        let full_name = user
            .metadata_str("full_name")
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .or_else(|| {
                user.email
                    .as_deref()
                    .and_then(|email| email.split('@').next())
                    .map(str::to_string)
            })
            .unwrap_or_default();

        Self {
            user_id: user.id.clone(),
            full_name,
            invites_left: invites,
            reputation_score: DEFAULT_REPUTATION,
            is_admin: false,
        }
    }
}

/// Editable profile fields; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.avatar_url.is_none()
    }
}
