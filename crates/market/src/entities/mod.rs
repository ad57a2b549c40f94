//! Domain entities for the marketplace.

pub mod favorite;
pub mod invite;
pub mod item;
pub mod message;
pub mod profile;
pub mod purchase_request;

pub use favorite::*;
pub use invite::*;
pub use item::*;
pub use message::*;
pub use profile::*;
pub use purchase_request::*;
