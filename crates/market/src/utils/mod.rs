//! Internal utilities.

pub mod codes;
pub mod validation;

pub use codes::{generate_invite_code, normalize_invite_code};
pub use validation::Validator;
