//! # Bazaar Market Crate
//!
//! Marketplace logic on top of the hosted backend: listings and their
//! images, favorites, chat, purchase requests, profiles and the invite-only
//! signup flow. Validation and request sequencing live here; persistence,
//! sessions and fan-out are the platform's job.
//!
//! ## Architecture
//!
//! - **Entities**: rows as stored plus validated form drafts
//! - **Services**: one per concern, each holding an `Arc<dyn Backend>`
//! - **Mailer**: delivery seam for invite emails
//! - **Types**: error taxonomy
//! - **Utils**: validation and code generation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bazaar_backend::{Backend, MemoryBackend};
//! use bazaar_market::ChatService;
//!
//! # async fn demo() {
//! let backend: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
//! let chat = ChatService::new(backend);
//! let messages = chat.list_messages("chat-1").await;
//! # let _ = messages;
//! # }
//! ```

pub mod entities;
pub mod mailer;
pub mod services;
pub mod types;
pub mod utils;

pub use entities::{
    Category, Favorite, FavoriteToggle, Invite, InviteDetails, InviteStatus, InviteSummary, Item,
    ItemDraft, ItemFilter, ItemStatus, Message, Profile, ProfileUpdate, PurchaseRequest, Quality,
    RedeemInviteRequest, RequestStatus,
};
pub use mailer::{HttpInviteMailer, InviteEmail, InviteMailer, LogMailer};
pub use services::{
    AuthService, ChatService, EmailDelivery, FavoriteService, GeneratedInvite, ImageFile,
    ImageService, ImageSet, InviteService, ItemService, MessageSubscription, ProfileService,
    PurchaseService, Redemption,
};
pub use types::{FieldError, MarketError, MarketResult, ValidationErrors};
