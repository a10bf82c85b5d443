use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use crate::client::{
    coordinator::{RefreshCoordinator, RefreshOutcome},
    transport::{ApiRequest, ApiResponse, Transport},
};

const REFRESH_PATH: &str = "/api/auth/check";
const LOGIN_PATH: &str = "/api/auth/login";

// A 401 from these means bad credentials, not a stale session.
fn is_auth_endpoint(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path);
    path == REFRESH_PATH || path == LOGIN_PATH
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("session expired: {0}")]
    SessionExpired(String),

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Told once per failed refresh, so the app can drop local state and send
/// the user to the login page.
pub trait SessionListener: Send + Sync {
    fn session_expired(&self);
}

/// API client that renews an expired session once for a whole burst of requests.
pub struct SessionClient {
    transport: Arc<dyn Transport>,
    coordinator: RefreshCoordinator,
    listener: Option<Arc<dyn SessionListener>>,
}

impl SessionClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            coordinator: RefreshCoordinator::new(),
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Sends `request`; on a 401 refreshes the session (shared with any
    /// concurrent callers) and replays the request once.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let response = self.transport.send(&request).await?;
        if response.status != StatusCode::UNAUTHORIZED || is_auth_endpoint(&request.path) {
            return Ok(response);
        }

        debug!(path = %request.path, "401, waiting for session refresh");
        match self.coordinator.refresh(|| self.try_refresh()).await {
            // A second 401 is handed back as is; there is no further retry.
            RefreshOutcome::Refreshed => Ok(self.transport.send(&request).await?),
            RefreshOutcome::Failed(reason) => Err(ClientError::SessionExpired(reason)),
        }
    }

    async fn try_refresh(&self) -> RefreshOutcome {
        let outcome = match self.transport.send(&ApiRequest::get(REFRESH_PATH)).await {
            Ok(res) if res.status.is_success() => RefreshOutcome::Refreshed,
            Ok(res) => RefreshOutcome::Failed(format!("refresh rejected with {}", res.status)),
            Err(e) => RefreshOutcome::Failed(e.to_string()),
        };
        if let RefreshOutcome::Failed(reason) = &outcome {
            warn!(%reason, "session refresh failed");
            if let Some(listener) = &self.listener {
                listener.session_expired();
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::{sync::Notify, task::JoinSet};

    use super::*;

    /// Fake API: protected paths answer 401 until a refresh succeeds.
    struct FakeApi {
        session_valid: AtomicBool,
        refresh_succeeds: bool,
        always_unauthorized: bool,
        refresh_calls: AtomicUsize,
        sends: AtomicUsize,
        gate: Notify,
    }

    impl FakeApi {
        fn new(refresh_succeeds: bool) -> Self {
            Self {
                session_valid: AtomicBool::new(false),
                refresh_succeeds,
                always_unauthorized: false,
                refresh_calls: AtomicUsize::new(0),
                sends: AtomicUsize::new(0),
                gate: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl Transport for FakeApi {
        async fn send(&self, request: &ApiRequest) -> anyhow::Result<ApiResponse> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if request.path == REFRESH_PATH {
                self.refresh_calls.fetch_add(1, Ordering::SeqCst);
                self.gate.notified().await;
                if self.refresh_succeeds {
                    self.session_valid.store(true, Ordering::SeqCst);
                    return Ok(ApiResponse {
                        status: StatusCode::OK,
                        body: json!({ "authenticated": true }),
                    });
                }
                return Ok(ApiResponse {
                    status: StatusCode::UNAUTHORIZED,
                    body: json!({ "error": "session_expired" }),
                });
            }
            if request.path == LOGIN_PATH
                || self.always_unauthorized
                || !self.session_valid.load(Ordering::SeqCst)
            {
                return Ok(ApiResponse {
                    status: StatusCode::UNAUTHORIZED,
                    body: json!({ "error": "authentication_required" }),
                });
            }
            Ok(ApiResponse {
                status: StatusCode::OK,
                body: json!({ "path": request.path }),
            })
        }
    }

    #[derive(Default)]
    struct CountingListener(AtomicUsize);

    impl SessionListener for CountingListener {
        fn session_expired(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    const BURST: usize = 6;

    fn spawn_burst(client: &Arc<SessionClient>) -> JoinSet<Result<ApiResponse, ClientError>> {
        let mut set = JoinSet::new();
        for i in 0..BURST {
            let client = client.clone();
            set.spawn(async move {
                client
                    .execute(ApiRequest::get(format!("/api/review?topic=animals&n={i}")))
                    .await
            });
        }
        set
    }

    async fn wait_for_parked(client: &SessionClient, n: usize) {
        while client.coordinator().waiting() < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn burst_of_401s_triggers_one_refresh_and_all_succeed() {
        let api = Arc::new(FakeApi::new(true));
        let client = Arc::new(SessionClient::new(api.clone()));

        let mut set = spawn_burst(&client);
        wait_for_parked(&client, BURST - 1).await;
        api.gate.notify_one();

        while let Some(res) = set.join_next().await {
            let res = res.unwrap().expect("request succeeds after refresh");
            assert_eq!(res.status, StatusCode::OK);
        }
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
        // Each request: original + replay; plus the single refresh.
        assert_eq!(api.sends.load(Ordering::SeqCst), BURST * 2 + 1);
    }

    #[tokio::test]
    async fn failed_refresh_fails_the_whole_burst() {
        let api = Arc::new(FakeApi::new(false));
        let listener = Arc::new(CountingListener::default());
        let client = Arc::new(SessionClient::new(api.clone()).with_listener(listener.clone()));

        let mut set = spawn_burst(&client);
        wait_for_parked(&client, BURST - 1).await;
        api.gate.notify_one();

        while let Some(res) = set.join_next().await {
            assert!(matches!(res.unwrap(), Err(ClientError::SessionExpired(_))));
        }
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(listener.0.load(Ordering::SeqCst), 1);
        assert!(!client.coordinator().is_refreshing());
    }

    #[tokio::test]
    async fn request_is_replayed_at_most_once() {
        let api = Arc::new(FakeApi {
            always_unauthorized: true,
            ..FakeApi::new(true)
        });
        api.gate.notify_one();
        let client = SessionClient::new(api.clone());

        let res = client
            .execute(ApiRequest::get("/api/users"))
            .await
            .expect("second 401 is returned, not retried");
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.sends.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn login_failures_do_not_trigger_refresh() {
        let api = Arc::new(FakeApi::new(true));
        let client = SessionClient::new(api.clone());

        let res = client
            .execute(ApiRequest::post(
                LOGIN_PATH,
                json!({ "email": "a@b.co", "password": "wrong" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 0);
    }
}
