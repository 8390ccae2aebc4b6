//! Trait-based callbacks for session events.
//!
//! When the refresh exchange fails the client clears credentials and hands
//! control to a [`SessionExpiredHandler`], which is where an application
//! sends its user back to the login view. Implement the trait on your own
//! type, or wrap a closure with [`FnSessionExpiredHandler`].
//!
//! # Example
//!
//! ```no_run
//! use pasale_client::callbacks::{SessionExpired, SessionExpiredHandler};
//! use async_trait::async_trait;
//!
//! struct Navigator;
//!
//! #[async_trait]
//! impl SessionExpiredHandler for Navigator {
//!     async fn on_session_expired(&self, event: SessionExpired) {
//!         println!("navigate to {}", event.login_path);
//!     }
//! }
//! ```

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Why the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryReason {
    /// No refresh token was stored
    NoRefreshToken,
    /// The refresh endpoint answered with a non-2xx status
    RefreshRejected,
    /// The refresh endpoint answered 2xx without an access token
    MissingAccessToken,
    /// The refresh call failed at the transport level or timed out
    RefreshTransport,
}

/// Event passed to [`SessionExpiredHandler::on_session_expired`]
#[derive(Debug, Clone)]
pub struct SessionExpired {
    /// Login entry point from [`ClientConfig::login_path`](crate::ClientConfig::login_path)
    pub login_path: String,
    /// URL of the request that observed the 401
    pub request_url: String,
    /// Failure class of the refresh attempt
    pub reason: ExpiryReason,
}

/// Reacts to an unrecoverable session, typically by redirecting to login.
///
/// Called once per request that ends in `AuthExpired`, after stored
/// credentials are cleared, so implementations should be idempotent.
#[async_trait]
pub trait SessionExpiredHandler: Send + Sync {
    /// Called after credentials have been cleared
    async fn on_session_expired(&self, event: SessionExpired);
}

#[async_trait]
impl<T: SessionExpiredHandler + ?Sized> SessionExpiredHandler for Arc<T> {
    async fn on_session_expired(&self, event: SessionExpired) {
        (**self).on_session_expired(event).await;
    }
}

#[async_trait]
impl SessionExpiredHandler for Box<dyn SessionExpiredHandler> {
    async fn on_session_expired(&self, event: SessionExpired) {
        (**self).on_session_expired(event).await;
    }
}

/// Shared handler, as stored by the client
pub type SharedSessionExpiredHandler = Arc<dyn SessionExpiredHandler>;

/// Handler that only logs; used when none is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyHandler;

#[async_trait]
impl SessionExpiredHandler for LogOnlyHandler {
    async fn on_session_expired(&self, event: SessionExpired) {
        tracing::warn!(
            login_path = %event.login_path,
            reason = ?event.reason,
            "Session expired; re-authentication required"
        );
    }
}

/// Wrapper to convert a closure into a `SessionExpiredHandler`.
///
/// # Example
///
/// ```no_run
/// use pasale_client::callbacks::{FnSessionExpiredHandler, SessionExpiredHandler};
/// use std::sync::Arc;
///
/// let handler = FnSessionExpiredHandler::new(|event| {
///     Box::pin(async move {
///         eprintln!("please log in again at {}", event.login_path);
///     })
/// });
///
/// let shared: Arc<dyn SessionExpiredHandler> = Arc::new(handler);
/// ```
pub struct FnSessionExpiredHandler<F>
where
    F: Fn(SessionExpired) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync,
{
    func: F,
}

impl<F> FnSessionExpiredHandler<F>
where
    F: Fn(SessionExpired) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync,
{
    /// Create a new function-based handler.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> SessionExpiredHandler for FnSessionExpiredHandler<F>
where
    F: Fn(SessionExpired) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync,
{
    async fn on_session_expired(&self, event: SessionExpired) {
        (self.func)(event).await;
    }
}
