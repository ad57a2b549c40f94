//! Error types for marketplace operations.
//!
//! `Display` renders the text shown to the person using the client.

use std::fmt;

use bazaar_backend::BackendError;
use thiserror::Error;

/// Result type alias for marketplace operations
pub type MarketResult<T> = Result<T, MarketError>;

/// A single failed form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Every field error found in one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn for_field(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message.as_str())
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|error| error.message.as_str())
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), MarketError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(MarketError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.messages().collect();
        write!(f, "{}", messages.join("; "))
    }
}

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("{0}")]
    Backend(#[from] BackendError),

    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("Please sign in to continue")]
    NotAuthenticated,

    #[error("Profile not found")]
    ProfileNotFound,

    #[error("You have no invites left")]
    NoInvitesLeft,

    #[error("This email has already been invited")]
    EmailAlreadyInvited,

    #[error("Invalid invite code")]
    InvalidInviteCode,

    #[error("This invite code has already been used")]
    InviteAlreadyUsed,

    #[error("This invite code has expired")]
    InviteExpired,

    #[error("Failed to accept invite: {reason}")]
    InviteAcceptanceFailed { reason: String },

    #[error("Failed to send invite email")]
    MailDelivery { reason: String },

    #[error("Maximum {max} images allowed")]
    TooManyImages { max: usize },

    #[error("Unsupported image type: {content_type}")]
    UnsupportedImageType { content_type: String },

    #[error("Image {file_name} exceeds the {max_bytes} byte limit")]
    ImageTooLarge { file_name: String, max_bytes: usize },

    #[error("Image is not part of this item")]
    UnknownImage,

    #[error("Item not found")]
    ItemNotFound { id: String },

    #[error("You cannot request your own item")]
    OwnItem,

    #[error("This item is no longer available")]
    ItemUnavailable,

    #[error("Purchase request not found")]
    RequestNotFound { id: String },
}

impl MarketError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation(ValidationErrors(vec![FieldError::new(field, message)]))
    }

    pub fn item_not_found(id: impl Into<String>) -> Self {
        Self::ItemNotFound { id: id.into() }
    }

    pub fn request_not_found(id: impl Into<String>) -> Self {
        Self::RequestNotFound { id: id.into() }
    }

    pub fn acceptance_failed(reason: impl Into<String>) -> Self {
        Self::InviteAcceptanceFailed {
            reason: reason.into(),
        }
    }

    pub fn mail(reason: impl Into<String>) -> Self {
        Self::MailDelivery {
            reason: reason.into(),
        }
    }

    /// Field errors, when this is a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}
