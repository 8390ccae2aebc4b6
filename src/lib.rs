//! # Pasale API client
//!
//! Async client for the Pasale REST backend. It attaches bearer tokens,
//! refreshes them transparently when the server answers 401, and keeps
//! the stored session consistent across concurrent requests.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pasale_client::{ApiClient, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ApiClient::new(ClientConfig::from_env()?)?;
//!
//!     client.login("owner@example.com", "secret").await?;
//!     client.verify_login_otp("owner@example.com", "123456").await?;
//!
//!     for product in client.products().list().await? {
//!         println!("{}: {}", product.product_name, product.quantity);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Core Features
//!
//! ### 1. Transparent refresh
//!
//! A request that comes back 401 waits for a refreshed access token and
//! is retried once. Concurrent 401s share a single refresh exchange. If
//! the refresh fails, stored credentials are cleared, the configured
//! [`SessionExpiredHandler`] runs, and the caller gets
//! [`PasaleError::AuthExpired`].
//!
//! ### 2. Persistent sessions
//!
//! Pass a [`FileStore`](auth::FileStore) to keep the session across
//! restarts:
//!
//! ```no_run
//! # use pasale_client::{ApiClient, ClientConfig};
//! # use pasale_client::auth::FileStore;
//! # use std::sync::Arc;
//! # fn example() -> pasale_client::Result<()> {
//! let config = ClientConfig::from_env()?;
//! let store = Arc::new(FileStore::new(config.resolved_credentials_path()));
//! let client = ApiClient::builder().config(config).store(store).build()?;
//! # Ok(())
//! # }
//! ```
//!
//! ### 3. Cancellation
//!
//! Every request can carry a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! through [`RequestOptions`]; [`ApiClient::shutdown`] cancels everything.
//!
//! ## Architecture
//!
//! - [`client`]: request pipeline and the [`ApiClient`] entry point
//! - [`auth`]: tokens, credential storage and the refresh coordinator
//! - [`api`]: typed services for products, parties and expenses
//! - [`callbacks`]: session-expired notification
//! - [`config`]: client configuration and environment overrides
//! - [`error`]: error types and handling
//! - [`utils`]: URL resolution and error-message extraction
//!
//! ## Logging
//!
//! This crate uses [`tracing`](https://crates.io/crates/tracing) for structured logging.
//! Token values are never logged. To see logs, attach a subscriber in your
//! application:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, PasaleError>`](Result):
//!
//! ```no_run
//! # use pasale_client::{ApiClient, PasaleError};
//! # async fn example(client: &ApiClient) {
//! match client.get::<serde_json::Value>("/products/").await {
//!     Ok(products) => { /* ... */ }
//!     Err(PasaleError::AuthExpired) => {
//!         eprintln!("Please log in again");
//!     }
//!     Err(e) => {
//!         eprintln!("Error: {}", e);
//!     }
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod auth;
pub mod callbacks;
pub mod client;
pub mod config;
pub mod error;
pub mod utils;

// Re-export commonly used types
pub use callbacks::{
    ExpiryReason, FnSessionExpiredHandler, LogOnlyHandler, SessionExpired, SessionExpiredHandler,
    SharedSessionExpiredHandler,
};
pub use client::{ApiClient, ApiClientBuilder, RequestOptions};
pub use config::ClientConfig;
pub use error::{AUTH_EXPIRED_MESSAGE, PasaleError, Result};

/// Version of the client
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
