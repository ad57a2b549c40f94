//! Profile lookup and lazy creation.

use std::sync::Arc;

use bazaar_backend::{AuthUser, Backend, DataApiExt, Query};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use crate::entities::{NewProfile, Profile, ProfileUpdate, PROFILES_TABLE};
use crate::services::require_session;
use crate::types::{MarketError, MarketResult};
use crate::utils::Validator;

pub struct ProfileService {
    backend: Arc<dyn Backend>,
    default_invites: i32,
}

impl ProfileService {
    pub fn new(backend: Arc<dyn Backend>, default_invites: i32) -> Self {
        Self {
            backend,
            default_invites,
        }
    }

    /// The profile of `user`, created with defaults when it does not exist yet.
    pub async fn ensure_profile(&self, user: &AuthUser) -> MarketResult<Profile> {
        let query = Query::from(PROFILES_TABLE).eq("user_id", &user.id);
        match self.backend.select_single::<Profile>(&query).await {
            Ok(profile) => Ok(profile),
            Err(err) if err.is_not_found() => {
                debug!(user_id = %user.id, "no profile yet, creating one");
                let row = NewProfile::for_user(user, self.default_invites);
                let profile: Profile = self.backend.insert_as(PROFILES_TABLE, &row).await?;
                info!(profile_id = %profile.id, user_id = %user.id, "profile created");
                Ok(profile)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Profile of the signed-in principal, creating it on first visit.
    pub async fn current_profile(&self) -> MarketResult<Profile> {
        let session = require_session(&*self.backend).await?;
        self.ensure_profile(&session.user).await
    }

    pub async fn get_profile(&self, profile_id: &str) -> MarketResult<Profile> {
        let query = Query::from(PROFILES_TABLE).eq("id", profile_id);
        self.backend
            .select_single(&query)
            .await
            .map_err(|err| match err {
                err if err.is_not_found() => MarketError::ProfileNotFound,
                err => err.into(),
            })
    }

    pub async fn find_by_user(&self, user_id: &str) -> MarketResult<Option<Profile>> {
        let query = Query::from(PROFILES_TABLE).eq("user_id", user_id);
        Ok(self.backend.select_optional(&query).await?)
    }

    /// Edit the signed-in principal's own profile.
    pub async fn update_profile(&self, update: ProfileUpdate) -> MarketResult<Profile> {
        let session = require_session(&*self.backend).await?;
        if let Some(name) = &update.full_name {
            Validator::full_name(name)?;
        }
        if update.is_empty() {
            return self.ensure_profile(&session.user).await;
        }

        let mut changes = serde_json::to_value(&update).map_err(bazaar_backend::BackendError::from)?;
        changes["updated_at"] = json!(Utc::now());

        let query = Query::from(PROFILES_TABLE).eq("user_id", &session.user.id);
        let updated: Vec<Profile> = self.backend.update_as(&query, changes).await?;
        let profile = updated.into_iter().next().ok_or(MarketError::ProfileNotFound)?;
        info!(profile_id = %profile.id, "profile updated");
        Ok(profile)
    }
}
