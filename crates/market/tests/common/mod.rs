//! Shared fixtures for the marketplace integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use bazaar_backend::{AuthApi, Backend, BackendError, MemoryBackend, Query, Session};
use bazaar_config::{InviteConfig, StorageConfig};
use bazaar_market::{Profile, ProfileService};
use chrono::Utc;
use serde_json::{json, Value};

pub const PASSWORD: &str = "correct-horse";

/// Memory backend with the constraints and procedures the hosted schema has.
pub async fn marketplace_backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.add_unique("invites", &["code"]).await;
    backend.add_unique("invites", &["email"]).await;
    backend.add_unique("favorites", &["profile_id", "item_id"]).await;
    backend.add_unique("profiles", &["user_id"]).await;

    backend
        .register_procedure("accept_invite", |tables, args| {
            let invite_id = bazaar_backend::memory::arg_str(&args, "invite_id")?.to_string();
            let user_id = bazaar_backend::memory::arg_str(&args, "user_id")?.to_string();
            let full_name = bazaar_backend::memory::arg_str(&args, "full_name")?.to_string();

            let profile_id = format!("profile-{user_id}");
            let Some(invite) = tables.find_mut(&Query::from("invites").eq("id", &invite_id)) else {
                return Ok(json!(false));
            };
            if invite["status"] != "pending" {
                return Ok(json!(false));
            }
            invite["status"] = json!("accepted");
            invite["accepted_at"] = json!(Utc::now());
            invite["accepted_profile_id"] = json!(profile_id);

            tables.rows_mut("profiles").push(json!({
                "id": profile_id,
                "user_id": user_id,
                "full_name": full_name,
                "invites_left": 3,
                "reputation_score": 5.0,
                "is_admin": false,
            }));
            Ok::<Value, BackendError>(json!(true))
        })
        .await;

    backend
}

pub fn shared(backend: &MemoryBackend) -> Arc<dyn Backend> {
    Arc::new(backend.clone())
}

/// Create a principal, sign it in and give it a profile.
pub async fn signed_in_member(backend: &MemoryBackend, email: &str) -> (Session, Profile) {
    backend
        .create_user(email, PASSWORD, json!({ "full_name": email.split('@').next() }))
        .await;
    let session = backend
        .sign_in(email, PASSWORD)
        .await
        .expect("sign in should succeed");
    let profile = ProfileService::new(shared(backend), 3)
        .ensure_profile(&session.user)
        .await
        .expect("profile should be created");
    (session, profile)
}

pub fn invite_config() -> InviteConfig {
    InviteConfig::default()
}

pub fn storage_config() -> StorageConfig {
    StorageConfig::default()
}

pub fn item_row(id: &str, owner: &str) -> Value {
    json!({
        "id": id,
        "user_id": owner,
        "title": "Vintage camera",
        "description": "Fully working film camera with strap",
        "category": "electronics",
        "price": 120.0,
        "quality": "good",
        "location": "Berlin",
        "images": [format!("{id}/1.jpg")],
        "main_image": format!("{id}/1.jpg"),
        "views": 0,
        "favorites": 0,
        "conversations": 0,
        "status": "available",
    })
}
