use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use ticketdesk_client_core::auth::{SIGN_IN_ROUTE, UserRole};
use ticketdesk_client_core::storage::{
    AUTH_TOKEN_KEY, REFRESH_TOKEN_KEY, StorageError, USER_ID_KEY, USER_NAME_KEY, USER_ROLE_KEY,
};
use ticketdesk_client_core::{
    ApiRequest, ApiResponse, AuthError, ClientError, FileStorage, HttpTransport, LoginCredentials,
    MemoryStorage, Navigator, SessionManager, SessionStatus, SessionStorage, TransportError,
};

const PASSWORD: &str = "correct horse";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshMode {
    Issue,
    Reject,
    Unreachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogoutMode {
    Accept,
    ServerError,
    Unreachable,
}

struct BackendState {
    valid_access: String,
    valid_refresh: String,
    issued: usize,
    refresh_mode: RefreshMode,
    logout_mode: LogoutMode,
    tickets_always_unauthorized: bool,
}

/// In-process stand-in for the REST backend.
struct FakeBackend {
    state: Mutex<BackendState>,
    requests: Mutex<Vec<ApiRequest>>,
    refresh_calls: AtomicUsize,
    refresh_delay: Duration,
}

impl FakeBackend {
    fn new() -> Arc<Self> {
        Self::with_refresh_delay(Duration::ZERO)
    }

    fn with_refresh_delay(refresh_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BackendState {
                valid_access: "access-live".to_string(),
                valid_refresh: "refresh-live".to_string(),
                issued: 0,
                refresh_mode: RefreshMode::Issue,
                logout_mode: LogoutMode::Accept,
                tickets_always_unauthorized: false,
            }),
            requests: Mutex::new(Vec::new()),
            refresh_calls: AtomicUsize::new(0),
            refresh_delay,
        })
    }

    fn configure(&self, apply: impl FnOnce(&mut BackendState)) {
        apply(&mut self.state.lock().unwrap_or_else(|p| p.into_inner()));
    }

    fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|request| request.path == path)
            .cloned()
            .collect()
    }

    fn respond(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        match request.path.as_str() {
            "/login" => {
                let password = match &request.body {
                    ticketdesk_client_core::transport::RequestBody::Json(body) => {
                        body["password"].as_str().unwrap_or_default().to_string()
                    }
                    _ => String::new(),
                };
                if password != PASSWORD {
                    return Ok(ApiResponse::new(401, br#"{"message":"bad credentials"}"#.to_vec()));
                }
                let body = json!({
                    "accessToken": state.valid_access,
                    "refreshToken": state.valid_refresh,
                    "user": { "id": 7, "name": "Riley", "role": "support" }
                });
                Ok(ApiResponse::new(200, body.to_string()))
            }
            "/refresh" => match state.refresh_mode {
                RefreshMode::Unreachable => Err(TransportError::Network {
                    message: "connection reset".to_string(),
                }),
                RefreshMode::Reject => Ok(ApiResponse::new(401, Vec::new())),
                RefreshMode::Issue => {
                    if request.bearer_token() != Some(state.valid_refresh.as_str()) {
                        return Ok(ApiResponse::new(401, Vec::new()));
                    }
                    state.issued += 1;
                    state.valid_access = format!("access-{}", state.issued);
                    let body = json!({ "access_token": state.valid_access });
                    Ok(ApiResponse::new(200, body.to_string()))
                }
            },
            "/logout" => match state.logout_mode {
                LogoutMode::Accept => Ok(ApiResponse::new(200, b"{}".to_vec())),
                LogoutMode::ServerError => Ok(ApiResponse::new(500, b"boom".to_vec())),
                LogoutMode::Unreachable => Err(TransportError::Network {
                    message: "connection refused".to_string(),
                }),
            },
            _ => {
                if state.tickets_always_unauthorized
                    || request.bearer_token() != Some(state.valid_access.as_str())
                {
                    return Ok(ApiResponse::new(401, Vec::new()));
                }
                Ok(ApiResponse::new(200, b"[]".to_vec()))
            }
        }
    }
}

#[async_trait]
impl HttpTransport for FakeBackend {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(request.clone());
        if request.path == "/refresh" {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if !self.refresh_delay.is_zero() {
                tokio::time::sleep(self.refresh_delay).await;
            }
        }
        self.respond(request)
    }
}

#[derive(Default)]
struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        self.routes
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(route.to_string());
    }
}

impl RecordingNavigator {
    fn routes(&self) -> Vec<String> {
        self.routes.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

struct Harness {
    backend: Arc<FakeBackend>,
    storage: Arc<MemoryStorage>,
    navigator: Arc<RecordingNavigator>,
    failures: Arc<AtomicUsize>,
    session: Arc<SessionManager<Arc<FakeBackend>, Arc<MemoryStorage>>>,
}

fn harness(backend: Arc<FakeBackend>) -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    let navigator = Arc::new(RecordingNavigator::default());
    let failures = Arc::new(AtomicUsize::new(0));
    let failure_counter = Arc::clone(&failures);
    let session = SessionManager::new(Arc::clone(&backend), Arc::clone(&storage))
        .with_navigator(navigator.clone())
        .on_auth_failure(move || {
            failure_counter.fetch_add(1, Ordering::SeqCst);
        });
    Harness {
        backend,
        storage,
        navigator,
        failures,
        session: Arc::new(session),
    }
}

fn seed_session(storage: &MemoryStorage, access: &str, refresh: &str) {
    storage.set_item(AUTH_TOKEN_KEY, access).expect("seed access");
    storage.set_item(REFRESH_TOKEN_KEY, refresh).expect("seed refresh");
    storage.set_item(USER_ID_KEY, "7").expect("seed id");
    storage.set_item(USER_NAME_KEY, "Riley").expect("seed name");
    storage.set_item(USER_ROLE_KEY, "support").expect("seed role");
}

fn session_keys_absent(storage: &MemoryStorage) -> bool {
    let snapshot = storage.snapshot();
    [
        AUTH_TOKEN_KEY,
        REFRESH_TOKEN_KEY,
        USER_ID_KEY,
        USER_NAME_KEY,
        USER_ROLE_KEY,
    ]
    .iter()
    .all(|key| !snapshot.contains_key(*key))
}

#[tokio::test]
async fn initialize_restores_persisted_session() {
    let h = harness(FakeBackend::new());
    seed_session(&h.storage, "access-live", "refresh-live");

    let restored = h.session.initialize().expect("initialize");

    assert_eq!(restored.access_token.as_deref(), Some("access-live"));
    assert!(h.session.is_authenticated());
    assert_eq!(
        h.session.default_authorization().as_deref(),
        Some("Bearer access-live")
    );
    assert_eq!(
        h.session.current_user().map(|user| user.role),
        Some(UserRole::Support)
    );
}

#[tokio::test]
async fn initialize_without_token_stays_signed_out() {
    let h = harness(FakeBackend::new());
    h.session.attach_token(Some("leftover"));

    h.session.initialize().expect("initialize");

    assert_eq!(h.session.status(), SessionStatus::SignedOut);
    assert_eq!(h.session.default_authorization(), None);
}

#[tokio::test]
async fn login_persists_tokens_and_user() {
    let h = harness(FakeBackend::new());
    let mut status = h.session.subscribe();

    let user = h
        .session
        .login(&LoginCredentials::new("Riley@Example.com", PASSWORD))
        .await
        .expect("login");

    assert_eq!(user.id, "7");
    assert_eq!(user.role, UserRole::Support);
    let snapshot = h.storage.snapshot();
    assert_eq!(snapshot.get(AUTH_TOKEN_KEY).map(String::as_str), Some("access-live"));
    assert_eq!(snapshot.get(REFRESH_TOKEN_KEY).map(String::as_str), Some("refresh-live"));
    assert_eq!(snapshot.get(USER_NAME_KEY).map(String::as_str), Some("Riley"));
    assert!(status.has_changed().expect("status channel open"));
    assert!(status.borrow_and_update().is_authenticated());

    let sent = h.backend.requests_to("/login");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].bearer_token(), None);
}

#[tokio::test]
async fn wrong_password_keeps_previously_stored_tokens() {
    let h = harness(FakeBackend::new());
    seed_session(&h.storage, "access-old", "refresh-old");
    let before = h.storage.snapshot();

    let error = h
        .session
        .login(&LoginCredentials::new("riley@example.com", "wrong"))
        .await
        .expect_err("login must fail");

    assert!(matches!(error, ClientError::Auth(AuthError::InvalidCredentials)));
    assert_eq!(h.storage.snapshot(), before);
    assert_eq!(h.backend.refresh_calls(), 0);
    assert!(h.navigator.routes().is_empty());
}

#[tokio::test]
async fn login_validation_never_reaches_the_server() {
    let h = harness(FakeBackend::new());

    let error = h
        .session
        .login(&LoginCredentials::new("not-an-email", ""))
        .await
        .expect_err("invalid form");

    assert!(matches!(error, ClientError::Validation(_)));
    assert!(h.backend.requests_to("/login").is_empty());
}

#[tokio::test]
async fn expired_access_token_refreshes_once_and_retries_once() {
    let h = harness(FakeBackend::new());
    seed_session(&h.storage, "access-stale", "refresh-live");
    h.session.initialize().expect("initialize");

    let response = h
        .session
        .execute(ApiRequest::get("/ticket"))
        .await
        .expect("request recovers");

    assert_eq!(response.status, 200);
    assert_eq!(h.backend.refresh_calls(), 1);
    let attempts = h.backend.requests_to("/ticket");
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].bearer_token(), Some("access-stale"));
    assert!(!attempts[0].retried);
    assert_eq!(attempts[1].bearer_token(), Some("access-1"));
    assert!(attempts[1].retried);

    let refresh = h.backend.requests_to("/refresh");
    assert_eq!(refresh[0].bearer_token(), Some("refresh-live"));
    assert_eq!(
        h.storage.snapshot().get(AUTH_TOKEN_KEY).map(String::as_str),
        Some("access-1")
    );
    assert_eq!(
        h.session.default_authorization().as_deref(),
        Some("Bearer access-1")
    );
    let saved = h.session.current_session().expect("read session");
    assert_eq!(saved.access_token.as_deref(), Some("access-1"));
    assert_eq!(saved.refresh_token.as_deref(), Some("refresh-live"));
}

#[tokio::test]
async fn retried_request_that_still_fails_is_not_refreshed_again() {
    let backend = FakeBackend::new();
    backend.configure(|state| state.tickets_always_unauthorized = true);
    let h = harness(backend);
    seed_session(&h.storage, "access-stale", "refresh-live");
    h.session.initialize().expect("initialize");

    let response = h
        .session
        .execute(ApiRequest::get("/ticket"))
        .await
        .expect("second 401 is surfaced as a response");

    assert_eq!(response.status, 401);
    assert_eq!(h.backend.refresh_calls(), 1);
    assert_eq!(h.backend.requests_to("/ticket").len(), 2);
    assert!(h.session.is_authenticated());
}

#[tokio::test]
async fn rejected_refresh_tears_down_session_and_redirects() {
    let backend = FakeBackend::new();
    backend.configure(|state| state.refresh_mode = RefreshMode::Reject);
    let h = harness(backend);
    seed_session(&h.storage, "access-stale", "refresh-live");
    h.session.initialize().expect("initialize");

    let error = h
        .session
        .execute(ApiRequest::get("/ticket"))
        .await
        .expect_err("session expires");

    assert!(error.is_session_expired());
    assert!(session_keys_absent(&h.storage));
    assert_eq!(h.navigator.routes(), vec![SIGN_IN_ROUTE.to_string()]);
    assert_eq!(h.failures.load(Ordering::SeqCst), 1);
    assert_eq!(h.session.status(), SessionStatus::SignedOut);
    assert_eq!(h.session.default_authorization(), None);
    assert_eq!(h.backend.requests_to("/ticket").len(), 1);
}

#[tokio::test]
async fn unreachable_refresh_is_treated_like_a_rejection() {
    let backend = FakeBackend::new();
    backend.configure(|state| state.refresh_mode = RefreshMode::Unreachable);
    let h = harness(backend);
    seed_session(&h.storage, "access-stale", "refresh-live");
    h.session.initialize().expect("initialize");

    let error = h
        .session
        .execute(ApiRequest::get("/user"))
        .await
        .expect_err("session expires");

    assert!(error.is_session_expired());
    assert!(session_keys_absent(&h.storage));
    assert_eq!(h.navigator.routes(), vec![SIGN_IN_ROUTE.to_string()]);
}

#[tokio::test]
async fn missing_refresh_token_expires_without_calling_refresh() {
    let h = harness(FakeBackend::new());
    h.storage.set_item(AUTH_TOKEN_KEY, "access-stale").expect("seed");
    h.session.initialize().expect("initialize");

    let error = h
        .session
        .execute(ApiRequest::get("/ticket"))
        .await
        .expect_err("session expires");

    assert!(error.is_session_expired());
    assert_eq!(h.backend.refresh_calls(), 0);
    assert!(session_keys_absent(&h.storage));
}

#[tokio::test]
async fn unauthorized_login_through_interceptor_is_invalid_credentials() {
    let h = harness(FakeBackend::new());
    seed_session(&h.storage, "access-old", "refresh-old");
    let before = h.storage.snapshot();

    let request = ApiRequest::post("/login")
        .with_json(&json!({ "email": "riley@example.com", "password": "nope" }))
        .expect("json body");
    let error = h.session.execute(request).await.expect_err("login fails");

    assert!(matches!(error, ClientError::Auth(AuthError::InvalidCredentials)));
    assert_eq!(h.storage.snapshot(), before);
    assert_eq!(h.backend.refresh_calls(), 0);
    assert!(h.navigator.routes().is_empty());
}

#[tokio::test]
async fn unauthorized_refresh_through_interceptor_is_unrecoverable() {
    let h = harness(FakeBackend::new());
    seed_session(&h.storage, "access-live", "refresh-revoked");
    h.session.initialize().expect("initialize");

    let request = ApiRequest::post("/refresh").with_bearer("refresh-revoked");
    let error = h.session.execute(request).await.expect_err("refresh fails");

    assert!(error.is_session_expired());
    assert!(session_keys_absent(&h.storage));
    assert_eq!(h.navigator.routes(), vec![SIGN_IN_ROUTE.to_string()]);
    assert_eq!(h.backend.refresh_calls(), 1);
}

#[tokio::test]
async fn logout_clears_local_state_when_server_accepts() {
    let h = harness(FakeBackend::new());
    seed_session(&h.storage, "access-live", "refresh-live");
    h.session.initialize().expect("initialize");

    h.session.logout().await.expect("logout");

    assert!(session_keys_absent(&h.storage));
    assert_eq!(h.session.default_authorization(), None);
    assert!(!h.session.is_authenticated());
    let sent = h.backend.requests_to("/logout");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].bearer_token(), Some("access-live"));
}

#[tokio::test]
async fn logout_clears_local_state_when_server_fails() {
    for mode in [LogoutMode::ServerError, LogoutMode::Unreachable] {
        let backend = FakeBackend::new();
        backend.configure(|state| state.logout_mode = mode);
        let h = harness(backend);
        seed_session(&h.storage, "access-live", "refresh-live");
        h.session.initialize().expect("initialize");

        h.session.logout().await.expect("logout still succeeds locally");

        assert!(session_keys_absent(&h.storage), "mode {mode:?}");
        assert_eq!(h.session.default_authorization(), None);
        assert_eq!(h.session.status(), SessionStatus::SignedOut);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_unauthorized_requests_share_one_refresh() {
    let h = harness(FakeBackend::with_refresh_delay(Duration::from_millis(50)));
    seed_session(&h.storage, "access-stale", "refresh-live");
    h.session.initialize().expect("initialize");

    let mut tasks = tokio::task::JoinSet::new();
    for index in 0..6 {
        let session = Arc::clone(&h.session);
        tasks.spawn(async move {
            session
                .execute(ApiRequest::get(format!("/ticket/{index}")))
                .await
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let response = joined.expect("task").expect("request recovers");
        assert_eq!(response.status, 200);
    }
    assert_eq!(h.backend.refresh_calls(), 1);
    assert_eq!(
        h.storage.snapshot().get(AUTH_TOKEN_KEY).map(String::as_str),
        Some("access-1")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn logout_wins_over_a_refresh_that_completes_later() {
    let h = harness(FakeBackend::with_refresh_delay(Duration::from_millis(150)));
    seed_session(&h.storage, "access-stale", "refresh-live");
    h.session.initialize().expect("initialize");

    let session = Arc::clone(&h.session);
    let pending = tokio::spawn(async move { session.execute(ApiRequest::get("/ticket")).await });

    while h.backend.refresh_calls() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    h.session.logout().await.expect("logout");

    let outcome = pending.await.expect("task");
    assert!(matches!(outcome, Err(ClientError::Auth(AuthError::SessionExpired))));
    assert!(session_keys_absent(&h.storage));
    assert_eq!(h.session.default_authorization(), None);
    assert!(!h.session.is_authenticated());
}

#[tokio::test]
async fn corrupt_session_file_starts_signed_out_and_logout_clears_it() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.json");
    std::fs::write(&path, r#"{"authToken": "tok", "#).expect("write corrupt file");
    let session = SessionManager::new(FakeBackend::new(), FileStorage::new(&path));

    let restored = session.initialize().expect("initialize recovers");
    assert!(restored.is_empty());
    assert_eq!(session.status(), SessionStatus::SignedOut);
    assert_eq!(session.default_authorization(), None);

    std::fs::write(&path, r#"{"authToken": "tok", "#).expect("corrupt again");
    session.logout().await.expect("logout clears");

    let raw = std::fs::read_to_string(&path).expect("read back");
    assert!(!raw.contains("tok"), "{raw}");
}

/// Memory storage whose access-token writes can be made to fail.
#[derive(Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    refuse_access_token: AtomicBool,
}

impl SessionStorage for FlakyStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if key == AUTH_TOKEN_KEY && self.refuse_access_token.load(Ordering::SeqCst) {
            return Err(StorageError::Write {
                message: "disk full".to_string(),
            });
        }
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove_item(key)
    }
}

#[tokio::test]
async fn unpersistable_refreshed_token_expires_the_session() {
    let backend = FakeBackend::new();
    let storage = Arc::new(FlakyStorage::default());
    seed_session(&storage.inner, "access-stale", "refresh-live");
    let navigator = Arc::new(RecordingNavigator::default());
    let session = SessionManager::new(Arc::clone(&backend), Arc::clone(&storage))
        .with_navigator(navigator.clone());
    session.initialize().expect("initialize");
    storage.refuse_access_token.store(true, Ordering::SeqCst);

    let error = session
        .execute(ApiRequest::get("/ticket"))
        .await
        .expect_err("session expires");

    assert!(error.is_session_expired());
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.requests_to("/ticket").len(), 1);
    assert_eq!(session.default_authorization(), None);
    assert_eq!(session.status(), SessionStatus::SignedOut);
    assert!(session_keys_absent(&storage.inner));
    assert_eq!(navigator.routes(), vec![SIGN_IN_ROUTE.to_string()]);
}
