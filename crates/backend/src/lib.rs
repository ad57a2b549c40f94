//! Generic client surface over the hosted backend.
//!
//! Services depend on the [`Backend`] umbrella trait. [`RestBackend`] talks
//! to the real platform; [`MemoryBackend`] keeps everything in process.

pub mod auth;
pub mod data;
pub mod error;
pub mod memory;
pub mod query;
pub mod realtime;
pub mod rest;
pub mod storage;

pub use auth::{AuthApi, AuthEvent, AuthUser, Session, SignUpOutcome, SignUpRequest};
pub use data::{DataApi, DataApiExt};
pub use error::{BackendError, BackendResult, NO_ROWS, UNIQUE_VIOLATION};
pub use memory::{MemoryBackend, Tables};
pub use query::{Direction, Filter, Query};
pub use realtime::{ChangeEvent, ChangeKind, ChannelFilter, RealtimeApi, Subscription};
pub use rest::RestBackend;
pub use storage::{StorageApi, UploadOptions};

/// Everything a service may ask of the platform.
pub trait Backend: AuthApi + DataApi + StorageApi + RealtimeApi {}

impl<T> Backend for T where T: AuthApi + DataApi + StorageApi + RealtimeApi {}
