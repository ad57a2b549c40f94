//! Shared types for the marketplace crate.

pub mod errors;

pub use errors::{FieldError, MarketError, MarketResult, ValidationErrors};
