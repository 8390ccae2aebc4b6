//! Single-flight access-token refresh
//!
//! Any number of requests can observe a 401 at the same time. The first
//! one to reach [`RefreshCoordinator::await_refreshed_token`] spawns the
//! refresh exchange as its own task; everyone arriving while it is
//! outstanding attaches to the same shared handle and receives the same
//! outcome. Waiters can drop out at any time without stalling the
//! exchange. The task empties the slot once it settles, after the new
//! credentials (or their removal) are already visible in the
//! [`CredentialStore`].
//!
//! ```text
//!   401 ──► slot empty? ──yes──► spawn exchange ──► store/clear ──► empty slot ──► outcome
//!                │                                                                   ▲
//!                └──no──► clone shared future ─────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::credentials::CredentialStore;
use super::token::{AccessToken, RefreshRequest, RefreshToken, TokenResponse};
use crate::callbacks::ExpiryReason;
use crate::config::ClientConfig;

/// Why a refresh did not produce a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    /// Nothing to exchange; no network call was made
    NoRefreshToken,
    /// Refresh endpoint returned a non-2xx status
    Rejected {
        /// HTTP status of the refresh response
        status: u16,
    },
    /// Refresh endpoint returned 2xx without an `access` field
    MissingAccessToken,
    /// Connection failure or unreadable response
    Transport(String),
    /// The exchange exceeded the refresh timeout
    TimedOut,
    /// The client was shut down while the exchange was outstanding
    Cancelled,
}

impl RefreshFailure {
    /// Failure class reported to the session-expired handler
    #[must_use]
    pub fn reason(&self) -> ExpiryReason {
        match self {
            Self::NoRefreshToken => ExpiryReason::NoRefreshToken,
            Self::Rejected { .. } => ExpiryReason::RefreshRejected,
            Self::MissingAccessToken => ExpiryReason::MissingAccessToken,
            Self::Transport(_) | Self::TimedOut | Self::Cancelled => ExpiryReason::RefreshTransport,
        }
    }

    /// Whether this failure ends the session (credentials cleared).
    ///
    /// Only client shutdown leaves the session intact.
    #[must_use]
    pub fn ends_session(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl std::fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRefreshToken => write!(f, "no refresh token available"),
            Self::Rejected { status } => write!(f, "refresh rejected with status {status}"),
            Self::MissingAccessToken => write!(f, "refresh response carried no access token"),
            Self::Transport(msg) => write!(f, "refresh transport error: {msg}"),
            Self::TimedOut => write!(f, "refresh timed out"),
            Self::Cancelled => write!(f, "refresh cancelled"),
        }
    }
}

/// Result of one refresh exchange, shared by every waiter
pub type RefreshOutcome = Result<AccessToken, RefreshFailure>;

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

struct Inner {
    http: reqwest::Client,
    refresh_url: String,
    timeout: Duration,
    credentials: Arc<CredentialStore>,
    shutdown: CancellationToken,
    // (generation, future) of the outstanding exchange
    inflight: std::sync::Mutex<Option<(u64, SharedRefresh)>>,
    started: AtomicU64,
}

/// Coordinates token refresh so at most one exchange is in flight
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refresh_url", &self.inner.refresh_url)
            .field("refreshing", &self.is_refreshing())
            .field("started", &self.refreshes_started())
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    /// Create a coordinator.
    ///
    /// `shutdown` aborts an outstanding exchange without ending the session.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        config: &ClientConfig,
        credentials: Arc<CredentialStore>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                refresh_url: config.refresh_url(),
                timeout: config.refresh_timeout,
                credentials,
                shutdown,
                inflight: std::sync::Mutex::new(None),
                started: AtomicU64::new(0),
            }),
        }
    }

    /// Obtain a fresh access token after `stale` was rejected.
    ///
    /// Attaches to the outstanding exchange if there is one. Otherwise, if
    /// the stored token already differs from `stale`, a refresh finished in
    /// the meantime and the stored token is returned without a network call.
    /// Failing that, a new exchange is started.
    pub async fn await_refreshed_token(&self, stale: Option<&AccessToken>) -> RefreshOutcome {
        let shared = {
            let mut slot = self
                .inner
                .inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            if let Some((generation, shared)) = slot.as_ref() {
                debug!(generation, "Waiting on in-flight token refresh");
                shared.clone()
            } else {
                if let Some(current) = self.inner.credentials.access_token() {
                    if stale != Some(&current) {
                        debug!("Stored token changed since request; skipping refresh");
                        return Ok(current);
                    }
                }

                let generation = self.inner.started.fetch_add(1, Ordering::SeqCst) + 1;
                let inner = Arc::clone(&self.inner);
                let task = tokio::spawn(async move {
                    let outcome = inner.run_exchange().await;
                    inner.release(generation);
                    outcome
                });
                let shared = async move {
                    task.await.unwrap_or_else(|e| {
                        Err(RefreshFailure::Transport(format!("refresh task failed: {e}")))
                    })
                }
                .boxed()
                .shared();
                *slot = Some((generation, shared.clone()));
                shared
            }
        };

        shared.await
    }

    /// True while an exchange is outstanding
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inner
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Number of exchanges started since creation
    #[must_use]
    pub fn refreshes_started(&self) -> u64 {
        self.inner.started.load(Ordering::SeqCst)
    }
}

impl Inner {
    fn release(&self, generation: u64) {
        let mut slot = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|(g, _)| *g == generation) {
            *slot = None;
        }
    }

    async fn run_exchange(&self) -> RefreshOutcome {
        let outcome = match self.credentials.refresh_token() {
            None => Err(RefreshFailure::NoRefreshToken),
            Some(refresh) => {
                info!("Refreshing access token");
                tokio::select! {
                    biased;
                    () = self.shutdown.cancelled() => Err(RefreshFailure::Cancelled),
                    result = tokio::time::timeout(self.timeout, self.exchange(&refresh)) => {
                        result.unwrap_or(Err(RefreshFailure::TimedOut))
                    }
                }
            }
        };

        match outcome {
            Ok((access, rotated)) => {
                if let Err(e) = self.credentials.set_tokens(access.clone(), rotated) {
                    warn!("Refreshed token could not be persisted: {e}");
                }
                info!("Token refreshed successfully");
                Ok(access)
            }
            Err(failure) => {
                warn!("Token refresh failed: {failure}");
                if failure.ends_session() {
                    if let Err(e) = self.credentials.clear() {
                        warn!("Failed to clear credentials after refresh failure: {e}");
                    }
                }
                Err(failure)
            }
        }
    }

    async fn exchange(
        &self,
        refresh: &RefreshToken,
    ) -> Result<(AccessToken, Option<RefreshToken>), RefreshFailure> {
        let response = self
            .http
            .post(&self.refresh_url)
            .json(&RefreshRequest {
                refresh: refresh.as_str(),
            })
            .send()
            .await
            .map_err(|e| RefreshFailure::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshFailure::Rejected {
                status: status.as_u16(),
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| RefreshFailure::Transport(e.to_string()))?;

        let access = body
            .access
            .filter(|a| !a.is_empty())
            .map(AccessToken::new)
            .ok_or(RefreshFailure::MissingAccessToken)?;
        let rotated = body.refresh.filter(|r| !r.is_empty()).map(RefreshToken::new);

        Ok((access, rotated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::storage::MemoryStore;

    fn coordinator(credentials: Arc<CredentialStore>) -> RefreshCoordinator {
        // Port 9 (discard) on localhost; tests below never reach the network.
        let config = ClientConfig::builder()
            .base_url("http://127.0.0.1:9/api")
            .build();
        RefreshCoordinator::new(
            reqwest::Client::new(),
            &config,
            credentials,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_no_refresh_token_fails_without_network() {
        let credentials = Arc::new(CredentialStore::empty(Arc::new(MemoryStore::new())));
        credentials.set_tokens(AccessToken::new("tok1"), None).unwrap();
        let coordinator = coordinator(credentials.clone());

        let outcome = coordinator
            .await_refreshed_token(Some(&AccessToken::new("tok1")))
            .await;

        assert_eq!(outcome, Err(RefreshFailure::NoRefreshToken));
        assert!(!credentials.is_authenticated());
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test]
    async fn test_stale_token_short_circuit() {
        let credentials = Arc::new(CredentialStore::empty(Arc::new(MemoryStore::new())));
        credentials
            .set_tokens(AccessToken::new("tok2"), Some(RefreshToken::new("ref")))
            .unwrap();
        let coordinator = coordinator(credentials);

        let outcome = coordinator
            .await_refreshed_token(Some(&AccessToken::new("tok1")))
            .await;

        assert_eq!(outcome, Ok(AccessToken::new("tok2")));
        assert_eq!(coordinator.refreshes_started(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_keeps_session() {
        let credentials = Arc::new(CredentialStore::empty(Arc::new(MemoryStore::new())));
        credentials
            .set_tokens(AccessToken::new("tok1"), Some(RefreshToken::new("ref")))
            .unwrap();
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let config = ClientConfig::builder()
            .base_url("http://127.0.0.1:9/api")
            .build();
        let coordinator = RefreshCoordinator::new(
            reqwest::Client::new(),
            &config,
            credentials.clone(),
            shutdown,
        );

        let outcome = coordinator
            .await_refreshed_token(Some(&AccessToken::new("tok1")))
            .await;

        assert_eq!(outcome, Err(RefreshFailure::Cancelled));
        assert!(credentials.is_authenticated());
    }

    #[tokio::test]
    async fn test_dropped_waiter_does_not_stall_exchange() {
        let credentials = Arc::new(CredentialStore::empty(Arc::new(MemoryStore::new())));
        credentials
            .set_tokens(AccessToken::new("tok1"), Some(RefreshToken::new("ref")))
            .unwrap();
        let coordinator = coordinator(credentials.clone());

        // Poll the only waiter once so the exchange starts, then drop it.
        let stale = AccessToken::new("tok1");
        let waiter = coordinator.await_refreshed_token(Some(&stale));
        let _ = tokio::time::timeout(Duration::from_millis(1), waiter).await;

        // Nothing listens on the discard port, so the spawned exchange
        // settles on its own with a transport failure.
        tokio::time::timeout(Duration::from_secs(5), async {
            while coordinator.is_refreshing() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(coordinator.refreshes_started(), 1);
        assert!(!credentials.is_authenticated());
    }

    #[test]
    fn test_failure_reasons() {
        assert_eq!(
            RefreshFailure::Rejected { status: 401 }.reason(),
            ExpiryReason::RefreshRejected
        );
        assert_eq!(RefreshFailure::TimedOut.reason(), ExpiryReason::RefreshTransport);
        assert!(RefreshFailure::MissingAccessToken.ends_session());
        assert!(!RefreshFailure::Cancelled.ends_session());
    }
}
