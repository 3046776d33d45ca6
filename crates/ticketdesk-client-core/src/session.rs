//! Access/refresh token lifecycle for all outbound API calls.
//!
//! `SessionManager` is the only writer of the default Authorization header
//! and of the persisted session fields. Every request goes through
//! [`SessionManager::execute`], which recovers from one expired access token
//! per request by refreshing and re-issuing the request exactly once.
//!
//! Concurrent 401s share a single refresh: refreshes are serialised behind a
//! gate, and a waiter whose failed token has already been replaced retries
//! with the current token instead of refreshing again. A teardown epoch makes
//! logout and expiry win over refreshes that complete afterwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::auth::{
    AuthError, LOGIN_PATH, LOGOUT_PATH, LoginCredentials, LoginResponse, REFRESH_PATH,
    RefreshResponse, SIGN_IN_ROUTE, SessionUser,
};
use crate::error::ClientError;
use crate::storage::{
    AUTH_TOKEN_KEY, PersistedSession, REFRESH_TOKEN_KEY, SessionStorage, StorageError,
    clear_session, load_session, persist_login,
};
use crate::transport::{AUTHORIZATION_HEADER, ApiRequest, ApiResponse, HttpTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    SignedOut,
    Authenticated { user: Option<SessionUser> },
}

impl SessionStatus {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    #[must_use]
    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            Self::Authenticated { user } => user.as_ref(),
            Self::SignedOut => None,
        }
    }
}

/// Route changes requested by the session layer.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

pub type AuthFailureCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndpointKind {
    Login,
    Refresh,
    Other,
}

impl EndpointKind {
    fn of(request: &ApiRequest) -> Self {
        match request.normalized_path() {
            LOGIN_PATH => Self::Login,
            REFRESH_PATH => Self::Refresh,
            _ => Self::Other,
        }
    }
}

pub struct SessionManager<T, S> {
    transport: T,
    storage: S,
    default_authorization: RwLock<Option<String>>,
    status: watch::Sender<SessionStatus>,
    refresh_gate: tokio::sync::Mutex<()>,
    // Guards teardown against a concurrent refresh persisting its token.
    state_lock: Mutex<()>,
    teardown_epoch: AtomicU64,
    on_auth_failure: Option<AuthFailureCallback>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl<T, S> SessionManager<T, S>
where
    T: HttpTransport,
    S: SessionStorage,
{
    pub fn new(transport: T, storage: S) -> Self {
        let (status, _) = watch::channel(SessionStatus::SignedOut);
        Self {
            transport,
            storage,
            default_authorization: RwLock::new(None),
            status,
            refresh_gate: tokio::sync::Mutex::new(()),
            state_lock: Mutex::new(()),
            teardown_epoch: AtomicU64::new(0),
            on_auth_failure: None,
            navigator: None,
        }
    }

    #[must_use]
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    #[must_use]
    pub fn on_auth_failure(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_auth_failure = Some(Arc::new(callback));
        self
    }

    /// Receiver for the authenticated flag used for route gating.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status.borrow().is_authenticated()
    }

    pub fn current_user(&self) -> Option<SessionUser> {
        self.status.borrow().user().cloned()
    }

    /// Reads the persisted session fields without changing any state.
    pub fn current_session(&self) -> Result<PersistedSession, ClientError> {
        Ok(load_session(&self.storage)?)
    }

    /// Restores the persisted session at start-up. An unreadable store is
    /// cleared and treated as signed out.
    pub fn initialize(&self) -> Result<PersistedSession, ClientError> {
        let session = match load_session(&self.storage) {
            Ok(session) => session,
            Err(error) => {
                warn!(%error, "persisted session unreadable; starting signed out");
                self.teardown()?;
                return Ok(PersistedSession::default());
            }
        };
        match session.access_token.as_deref() {
            Some(token) => {
                self.attach_token(Some(token));
                self.status.send_replace(SessionStatus::Authenticated {
                    user: session.user.clone(),
                });
                info!(
                    user_id = session.user.as_ref().map(|user| user.id.as_str()),
                    "restored persisted session"
                );
            }
            None => {
                self.attach_token(None);
                self.status.send_replace(SessionStatus::SignedOut);
                debug!("no persisted session");
            }
        }
        Ok(session)
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<SessionUser, ClientError> {
        let credentials = credentials.normalized()?;
        let request = ApiRequest::post(LOGIN_PATH).with_json(&credentials)?;

        let response = match self.transport.send(&request).await {
            Ok(response) => response,
            Err(error) => {
                warn!(%error, "login request failed");
                return Err(AuthError::InvalidCredentials.into());
            }
        };
        if response.status != 200 {
            debug!(status = response.status, "login rejected");
            return Err(AuthError::InvalidCredentials.into());
        }

        let login: LoginResponse = response.json()?;
        {
            let _guard = self.lock_state();
            persist_login(
                &self.storage,
                &login.access_token,
                &login.refresh_token,
                &login.user,
            )?;
            self.attach_token(Some(&login.access_token));
            self.status.send_replace(SessionStatus::Authenticated {
                user: Some(login.user.clone()),
            });
        }
        info!(user_id = %login.user.id, role = %login.user.role, "session established");
        Ok(login.user)
    }

    /// Sets or clears the default Authorization header.
    pub fn attach_token(&self, token: Option<&str>) {
        let value = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| format!("Bearer {token}"));
        let mut header = self
            .default_authorization
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *header = value;
    }

    pub fn default_authorization(&self) -> Option<String> {
        self.default_authorization
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Sends `request` with the default credentials and recovers from a
    /// first 401. Non-2xx responses are returned as-is.
    pub async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse, ClientError> {
        if request.header(AUTHORIZATION_HEADER).is_none() {
            if let Some(value) = self.default_authorization() {
                request.set_header(AUTHORIZATION_HEADER, value);
            }
        }

        debug!(
            method = request.method.as_str(),
            path = %request.path,
            retried = request.retried,
            "dispatching request"
        );
        let response = self.transport.send(&request).await?;
        if response.status == 401 && !request.retried {
            return self.handle_unauthorized(request).await;
        }
        Ok(response)
    }

    /// Recovery for a request that failed with 401 on its first attempt.
    pub async fn handle_unauthorized(
        &self,
        mut request: ApiRequest,
    ) -> Result<ApiResponse, ClientError> {
        if request.retried {
            return Err(ClientError::from_http_status(
                401,
                b"request was already retried after a token refresh",
            ));
        }

        match EndpointKind::of(&request) {
            EndpointKind::Refresh => {
                self.expire_session("refresh endpoint rejected the refresh token");
                Err(AuthError::SessionExpired.into())
            }
            EndpointKind::Login => Err(AuthError::InvalidCredentials.into()),
            EndpointKind::Other => {
                request.retried = true;
                let token = self.refresh_access_token(request.bearer_token()).await?;
                request.set_bearer(&token);
                debug!(path = %request.path, "retrying request with refreshed access token");
                Ok(self.transport.send(&request).await?)
            }
        }
    }

    /// Best-effort server logout followed by unconditional local sign-out.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let mut request = ApiRequest::post(LOGOUT_PATH);
        if let Some(value) = self.default_authorization() {
            request.set_header(AUTHORIZATION_HEADER, value);
        }
        match self.transport.send(&request).await {
            Ok(response) if response.is_success() => debug!("server acknowledged logout"),
            Ok(response) => warn!(
                status = response.status,
                "server logout failed; clearing local session anyway"
            ),
            Err(error) => warn!(%error, "server logout unreachable; clearing local session anyway"),
        }

        let cleared = self.teardown();
        info!("signed out");
        cleared.map_err(ClientError::from)
    }

    async fn refresh_access_token(&self, failed_token: Option<&str>) -> Result<String, ClientError> {
        let epoch = self.teardown_epoch.load(Ordering::SeqCst);
        let _gate = self.refresh_gate.lock().await;
        if self.teardown_epoch.load(Ordering::SeqCst) != epoch {
            return Err(AuthError::SessionExpired.into());
        }

        let session = match load_session(&self.storage) {
            Ok(session) => session,
            Err(error) => {
                warn!(%error, "failed to read session before refresh");
                self.expire_session("session storage unreadable");
                return Err(AuthError::SessionExpired.into());
            }
        };
        if let Some(current) = session.access_token.as_deref() {
            if failed_token != Some(current) {
                debug!("access token already refreshed by another request");
                return Ok(current.to_string());
            }
        }
        let Some(refresh_token) = session.refresh_token else {
            self.expire_session("no refresh token stored");
            return Err(AuthError::SessionExpired.into());
        };

        let request = ApiRequest::post(REFRESH_PATH).with_bearer(&refresh_token);
        let refreshed = match self.transport.send(&request).await {
            Ok(response) if response.is_success() => match response.json::<RefreshResponse>() {
                Ok(refreshed) if !refreshed.access_token.trim().is_empty() => refreshed,
                Ok(_) => {
                    self.expire_session("refresh response carried an empty access token");
                    return Err(AuthError::SessionExpired.into());
                }
                Err(error) => {
                    warn!(%error, "refresh response could not be decoded");
                    self.expire_session("refresh response undecodable");
                    return Err(AuthError::SessionExpired.into());
                }
            },
            Ok(response) => {
                warn!(status = response.status, "refresh rejected");
                self.expire_session("refresh rejected");
                return Err(AuthError::SessionExpired.into());
            }
            Err(error) => {
                warn!(%error, "refresh request failed");
                self.expire_session("refresh unreachable");
                return Err(AuthError::SessionExpired.into());
            }
        };

        let guard = self.lock_state();
        if self.teardown_epoch.load(Ordering::SeqCst) != epoch {
            info!("discarding refreshed token for a session that was already cleared");
            return Err(AuthError::SessionExpired.into());
        }
        if let Err(error) = self.persist_refreshed(&refreshed) {
            warn!(%error, "failed to persist refreshed token");
            drop(guard);
            self.expire_session("refreshed token could not be persisted");
            return Err(AuthError::SessionExpired.into());
        }
        self.attach_token(Some(&refreshed.access_token));
        info!("access token refreshed");
        Ok(refreshed.access_token)
    }

    fn persist_refreshed(&self, refreshed: &RefreshResponse) -> Result<(), StorageError> {
        self.storage
            .set_item(AUTH_TOKEN_KEY, &refreshed.access_token)?;
        if let Some(rotated) = refreshed
            .refresh_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
        {
            self.storage.set_item(REFRESH_TOKEN_KEY, rotated)?;
        }
        Ok(())
    }

    fn expire_session(&self, reason: &str) {
        warn!(reason, "session expired; clearing local session");
        if let Err(error) = self.teardown() {
            warn!(%error, "failed to clear persisted session");
        }
        if let Some(callback) = &self.on_auth_failure {
            callback();
        }
        if let Some(navigator) = &self.navigator {
            navigator.navigate(SIGN_IN_ROUTE);
        }
    }

    fn teardown(&self) -> Result<(), StorageError> {
        let _guard = self.lock_state();
        self.teardown_epoch.fetch_add(1, Ordering::SeqCst);
        let cleared = clear_session(&self.storage);
        self.attach_token(None);
        self.status.send_replace(SessionStatus::SignedOut);
        cleared
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ()> {
        self.state_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
