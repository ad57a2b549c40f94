//! Request sequencing over the backend.

pub mod auth_service;
pub mod chat_service;
pub mod favorite_service;
pub mod image_service;
pub mod invite_service;
pub mod item_service;
pub mod profile_service;
pub mod purchase_service;

pub use auth_service::AuthService;
pub use chat_service::{ChatService, MessageSubscription};
pub use favorite_service::FavoriteService;
pub use image_service::{ImageFile, ImageService, ImageSet};
pub use invite_service::{EmailDelivery, GeneratedInvite, InviteService, Redemption};
pub use item_service::ItemService;
pub use profile_service::ProfileService;
pub use purchase_service::PurchaseService;

use bazaar_backend::{Backend, Session};

use crate::types::{MarketError, MarketResult};

pub(crate) async fn require_session(backend: &dyn Backend) -> MarketResult<Session> {
    backend.session().await.ok_or(MarketError::NotAuthenticated)
}
