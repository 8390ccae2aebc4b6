//! Credentials and token refresh
//!
//! - [`token`] types wrap raw token strings so they never leak into logs.
//! - [`KeyValueStore`] is the persistence seam, with [`MemoryStore`] and
//!   [`FileStore`] implementations.
//! - [`CredentialStore`] owns the current [`TokenPair`] and keeps the
//!   persisted layout consistent.
//! - [`RefreshCoordinator`] guarantees a single refresh exchange per burst
//!   of rejected requests.
//!
//! # Example
//!
//! ```no_run
//! use pasale_client::auth::{CredentialStore, FileStore, KeyValueStore};
//! use std::sync::Arc;
//!
//! # fn example() -> pasale_client::Result<()> {
//! let backend: Arc<dyn KeyValueStore> = Arc::new(FileStore::new("/tmp/pasale/session.json"));
//! let credentials = CredentialStore::load(backend)?;
//! println!("authenticated: {}", credentials.is_authenticated());
//! # Ok(())
//! # }
//! ```

mod credentials;
mod refresh;
mod storage;
pub mod token;

pub use credentials::{
    CredentialStore, KEY_ACCESS_TOKEN, KEY_AUTH_TOKEN, KEY_REFRESH_TOKEN, KEY_SESSION_BLOB,
};
pub use refresh::{RefreshCoordinator, RefreshFailure, RefreshOutcome};
pub use storage::{Change, FileStore, KeyValueStore, MemoryStore};
pub use token::{AccessToken, RefreshToken, TokenPair};

pub(crate) use token::TokenResponse;
