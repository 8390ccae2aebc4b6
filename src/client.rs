//! `ApiClient`: authenticated requests with transparent token refresh
//!
//! Every request goes through the same pipeline:
//!
//! ```text
//! ISSUING ──(non-401)──────────────────────────────────────────────► DONE
//!    │
//!    └─(401)─► REFRESH_CHECK ─┬─ no exchange running ─► REFRESHING ─┐
//!                             └─ exchange running ────► WAITING ────┤
//!                                                                   ├─ token ──► RETRYING ─► DONE
//!                                                                   └─ failure ► clear, notify ─► AuthExpired
//! ```
//!
//! - The bearer token is attached when one is stored.
//! - A 401 triggers at most one refresh for the request; concurrent 401s
//!   share a single refresh exchange (see [`RefreshCoordinator`]).
//! - The retry's result is final. A second 401 is returned as
//!   `RequestFailed { status: 401 }`.
//! - Non-401 failures are returned untouched and never retried.
//!
//! # Example
//!
//! ```no_run
//! use pasale_client::{ApiClient, ClientConfig};
//!
//! # async fn example() -> pasale_client::Result<()> {
//! let client = ApiClient::new(ClientConfig::from_env()?)?;
//! let products: serde_json::Value = client.get("/products/").await?;
//! println!("{products}");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use crate::auth::{
    AccessToken, CredentialStore, KeyValueStore, MemoryStore, RefreshCoordinator, RefreshFailure,
    RefreshToken, TokenResponse,
};
use crate::callbacks::{
    LogOnlyHandler, SessionExpired, SessionExpiredHandler, SharedSessionExpiredHandler,
};
use crate::config::ClientConfig;
use crate::error::{PasaleError, Result};
use crate::utils::{body_preview, extract_error_message, resolve_url};

const LOG_BODY_LIMIT: usize = 512;

/// Per-request options
#[derive(Debug, Clone, Default, TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for RequestOptions"),
    builder_type(doc = "Builder for RequestOptions", vis = "pub")
)]
pub struct RequestOptions {
    /// Extra headers; they override `Content-Type` but never `Authorization`
    #[builder(default)]
    pub headers: HeaderMap,

    /// Abort this request (including any wait on a refresh) when cancelled
    #[builder(default, setter(strip_option))]
    pub cancel: Option<CancellationToken>,
}

/// A request that can be sent more than once
#[derive(Debug)]
struct PreparedRequest {
    method: Method,
    url: String,
    body: Option<Vec<u8>>,
    headers: HeaderMap,
    cancel: Option<CancellationToken>,
}

/// Status and raw body of one HTTP exchange
#[derive(Debug)]
struct RawResponse {
    status: StatusCode,
    body: Vec<u8>,
}

impl RawResponse {
    fn into_json(self) -> Result<serde_json::Value> {
        if !self.status.is_success() {
            let message = extract_error_message(&self.body, self.status.canonical_reason());
            debug!(
                status = self.status.as_u16(),
                body = %body_preview(&self.body, LOG_BODY_LIMIT),
                "Request failed"
            );
            return Err(PasaleError::request_failed(self.status.as_u16(), message));
        }

        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ClientConfig>,
    store: Option<Arc<dyn KeyValueStore>>,
    on_session_expired: Option<SharedSessionExpiredHandler>,
    http_client: Option<reqwest::Client>,
}

impl ApiClientBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client configuration (default: [`ClientConfig::default`])
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the credential backend (default: an empty [`MemoryStore`])
    #[must_use]
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the handler run when a session cannot be refreshed
    #[must_use]
    pub fn on_session_expired<H>(mut self, handler: H) -> Self
    where
        H: SessionExpiredHandler + 'static,
    {
        self.on_session_expired = Some(Arc::new(handler));
        self
    }

    /// Use a preconfigured HTTP client instead of building one
    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Build the client, loading any stored credentials
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the HTTP client
    /// cannot be constructed, or stored credentials cannot be read.
    pub fn build(self) -> Result<ApiClient> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let http = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .timeout(config.request_timeout)
                .build()
                .map_err(|e| PasaleError::invalid_config(format!("HTTP client: {e}")))?,
        };

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>);
        let credentials = Arc::new(CredentialStore::load(store)?);
        let shutdown = CancellationToken::new();
        let refresher =
            RefreshCoordinator::new(http.clone(), &config, credentials.clone(), shutdown.clone());

        Ok(ApiClient {
            config,
            http,
            credentials,
            refresher,
            on_session_expired: self
                .on_session_expired
                .unwrap_or_else(|| Arc::new(LogOnlyHandler)),
            shutdown,
        })
    }
}

/// Client for the Pasale REST API
///
/// Cheap to share behind an `Arc`; all methods take `&self` and may be
/// called concurrently.
pub struct ApiClient {
    config: ClientConfig,
    http: reqwest::Client,
    credentials: Arc<CredentialStore>,
    refresher: RefreshCoordinator,
    on_session_expired: SharedSessionExpiredHandler,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .field("authenticated", &self.is_authenticated())
            .field("refresher", &self.refresher)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client with in-memory credentials
    ///
    /// # Errors
    ///
    /// See [`ApiClientBuilder::build`].
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::new()
    }

    /// Client configuration
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Credentials
    // ------------------------------------------------------------------

    /// True iff a non-empty access token is stored
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_authenticated()
    }

    /// Store a new credential pair, e.g. after login.
    ///
    /// `refresh = None` keeps the current refresh token. An empty access
    /// token clears the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials cannot be persisted.
    pub fn set_tokens(
        &self,
        access: impl Into<AccessToken>,
        refresh: Option<RefreshToken>,
    ) -> Result<()> {
        self.credentials.set_tokens(access.into(), refresh)
    }

    /// Wipe stored credentials. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend cannot be written.
    pub fn clear_tokens(&self) -> Result<()> {
        self.credentials.clear()
    }

    /// `exp` claim of the stored access token, when it is a JWT
    #[must_use]
    pub fn access_token_expires_at(&self) -> Option<u64> {
        self.credentials.access_token().and_then(|t| t.expires_at())
    }

    /// Time left before the stored access token's `exp`, if known and not past
    #[must_use]
    pub fn access_token_valid_for(&self) -> Option<std::time::Duration> {
        self.credentials
            .access_token()
            .and_then(|t| t.remaining_validity())
    }

    /// True while a token refresh exchange is outstanding
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.refresher.is_refreshing()
    }

    /// Cancel every in-flight request and any outstanding refresh.
    ///
    /// Stored credentials are left alone. Requests issued afterwards fail
    /// with `PasaleError::Cancelled`.
    pub fn shutdown(&self) {
        info!("Shutting down API client");
        self.shutdown.cancel();
    }

    // ------------------------------------------------------------------
    // Login
    // ------------------------------------------------------------------

    /// Submit credentials; the server answers by sending a one-time code.
    ///
    /// # Errors
    ///
    /// Returns `RequestFailed` with the server's message on rejection.
    pub async fn login(&self, email: &str, password: &str) -> Result<serde_json::Value> {
        let body = serde_json::json!({ "email": email, "password": password });
        let request = self.prepare(Method::POST, "/login/", Some(&body), RequestOptions::default())?;
        self.dispatch(&request, None).await?.into_json()
    }

    /// Exchange the one-time code for a token pair and store it
    ///
    /// # Errors
    ///
    /// Returns `RequestFailed` if the code is rejected or the response
    /// carries no access token.
    pub async fn verify_login_otp(&self, email: &str, otp: &str) -> Result<()> {
        let body = serde_json::json!({ "email": email, "otp": otp });
        let request = self.prepare(
            Method::POST,
            "/verify-login-otp/",
            Some(&body),
            RequestOptions::default(),
        )?;
        let response = self.dispatch(&request, None).await?;
        let status = response.status.as_u16();
        let tokens: TokenResponse = serde_json::from_value(response.into_json()?)?;

        let access = tokens
            .access
            .filter(|a| !a.is_empty())
            .ok_or_else(|| {
                PasaleError::request_failed(status, "Login response did not include an access token")
            })?;
        let refresh = tokens.refresh.filter(|r| !r.is_empty()).map(RefreshToken::new);

        self.credentials.set_tokens(AccessToken::new(access), refresh)?;
        info!("Logged in");
        Ok(())
    }

    /// Drop the session locally
    ///
    /// # Errors
    ///
    /// See [`clear_tokens`](Self::clear_tokens).
    pub fn logout(&self) -> Result<()> {
        self.clear_tokens()
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    /// `GET` a path and decode the JSON response
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request::<T, ()>(Method::GET, path, None, RequestOptions::default())
            .await
    }

    /// `POST` a JSON body
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, Some(body), RequestOptions::default())
            .await
    }

    /// `PUT` a JSON body
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PUT, path, Some(body), RequestOptions::default())
            .await
    }

    /// `PATCH` a JSON body
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PATCH, path, Some(body), RequestOptions::default())
            .await
    }

    /// `DELETE` a path
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request::<T, ()>(Method::DELETE, path, None, RequestOptions::default())
            .await
    }

    /// Send a request through the authenticated pipeline.
    ///
    /// `target` is either relative to the base URL or absolute (`http...`).
    /// An empty 2xx body decodes from JSON `null`.
    ///
    /// # Errors
    ///
    /// - `AuthExpired` if the token was rejected and could not be refreshed
    /// - `RequestFailed` for any other non-2xx response
    /// - `Network` / `Timeout` for transport failures (no refresh attempted)
    /// - `Cancelled` if the request or the client was cancelled
    /// - `Json` if a 2xx body does not decode into `T`
    pub async fn request<T, B>(
        &self,
        method: Method,
        target: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.prepare(method, target, body, options)?;
        let value = self.execute(&request).await?;
        Ok(serde_json::from_value(value)?)
    }

    fn prepare<B>(
        &self,
        method: Method,
        target: &str,
        body: Option<&B>,
        options: RequestOptions,
    ) -> Result<PreparedRequest>
    where
        B: Serialize + ?Sized,
    {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &options.headers {
            if *name != AUTHORIZATION {
                headers.insert(name.clone(), value.clone());
            }
        }

        Ok(PreparedRequest {
            method,
            url: resolve_url(&self.config.base_url, target),
            body: body.map(serde_json::to_vec).transpose()?,
            headers,
            cancel: options.cancel,
        })
    }

    async fn execute(&self, request: &PreparedRequest) -> Result<serde_json::Value> {
        let sent_with = self.credentials.access_token();
        let first = self.dispatch(request, sent_with.as_ref()).await?;
        if first.status != StatusCode::UNAUTHORIZED {
            return first.into_json();
        }

        debug!(url = %request.url, "Access token rejected; awaiting refresh");
        let outcome = tokio::select! {
            biased;
            () = self.cancelled(request) => return Err(PasaleError::Cancelled),
            outcome = self.refresher.await_refreshed_token(sent_with.as_ref()) => outcome,
        };

        match outcome {
            Ok(token) => {
                debug!(url = %request.url, "Retrying with refreshed token");
                self.dispatch(request, Some(&token)).await?.into_json()
            }
            Err(RefreshFailure::Cancelled) => Err(PasaleError::Cancelled),
            Err(failure) => {
                warn!(url = %request.url, "Session expired: {failure}");
                self.on_session_expired
                    .on_session_expired(SessionExpired {
                        login_path: self.config.login_path.clone(),
                        request_url: request.url.clone(),
                        reason: failure.reason(),
                    })
                    .await;
                Err(PasaleError::AuthExpired)
            }
        }
    }

    async fn dispatch(
        &self,
        request: &PreparedRequest,
        token: Option<&AccessToken>,
    ) -> Result<RawResponse> {
        let mut headers = request.headers.clone();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&token.bearer())
                .map_err(|_| PasaleError::storage("stored access token is not a valid header value"))?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        debug!(method = %request.method, url = %request.url, "Sending request");
        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let body = response.bytes().await?.to_vec();
            Ok::<_, PasaleError>(RawResponse { status, body })
        };

        tokio::select! {
            biased;
            () = self.cancelled(request) => Err(PasaleError::Cancelled),
            result = exchange => {
                if let Err(e) = &result {
                    warn!(url = %request.url, "Request error: {e}");
                }
                result
            }
        }
    }

    async fn cancelled(&self, request: &PreparedRequest) {
        match &request.cancel {
            Some(token) => {
                tokio::select! {
                    () = self.shutdown.cancelled() => {}
                    () = token.cancelled() => {}
                }
            }
            None => self.shutdown.cancelled().await,
        }
    }
}
