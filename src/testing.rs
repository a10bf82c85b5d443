//! Router harness over in-memory repositories.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        Method, Request, StatusCode,
    },
    Router,
};
use cookie::Cookie;
use lazy_static::lazy_static;
use serde_json::Value;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    app::build_app,
    auth::{
        cookies::{ACCESS_COOKIE, REFRESH_COOKIE},
        jwt::{tests::test_jwt_config, JwtKeys},
        password::hash_password,
    },
    config::{AppConfig, Environment},
    review::repo::memory::MemoryQuestionRepo,
    state::AppState,
    users::{
        repo::memory::MemoryUserRepo,
        repo_types::{Role, User, UserStatus},
    },
};

pub(crate) const TEST_PASSWORD: &str = "correct-horse-battery";

lazy_static! {
    // Argon2 is slow in debug builds; hash once for every seeded user.
    static ref TEST_PASSWORD_HASH: String =
        hash_password(TEST_PASSWORD).expect("hash test password");
}

pub(crate) struct TestApp {
    pub state: AppState,
    pub users: Arc<MemoryUserRepo>,
    pub questions: Arc<MemoryQuestionRepo>,
    pub keys: JwtKeys,
}

pub(crate) struct TestResponse {
    pub status: StatusCode,
    pub set_cookies: Vec<String>,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        let config = Arc::new(AppConfig {
            database_url: "postgres://unused".into(),
            jwt: test_jwt_config(),
            environment: Environment::Development,
            cors_origin: None,
        });
        let users = Arc::new(MemoryUserRepo::default());
        let questions = Arc::new(MemoryQuestionRepo::default());
        let state = AppState::from_parts(config, users.clone(), questions.clone());
        let keys = JwtKeys::from_config(&state.config.jwt);
        Self {
            state,
            users,
            questions,
            keys,
        }
    }

    pub fn router(&self) -> Router {
        build_app(self.state.clone())
    }

    pub fn seed_user(&self, email: &str, role: Role) -> User {
        self.seed_user_with(email, role, UserStatus::Active, true)
    }

    pub fn seed_user_with(
        &self,
        email: &str,
        role: Role,
        status: UserStatus,
        is_active: bool,
    ) -> User {
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: TEST_PASSWORD_HASH.clone(),
            name: email.split('@').next().unwrap_or(email).to_string(),
            role,
            status,
            avatar: None,
            is_active,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(user.clone());
        user
    }

    /// `Cookie` header value carrying a fresh pair for `user`.
    pub fn session_cookie(&self, user: &User) -> String {
        let pair = self.keys.issue_pair(&user.identity()).expect("issue pair");
        format!("{ACCESS_COOKIE}={}; {REFRESH_COOKIE}={}", pair.access, pair.refresh)
    }

    pub async fn call(&self, req: Request<Body>) -> TestResponse {
        let res = self.router().oneshot(req).await.expect("router is infallible");
        let status = res.status();
        let set_cookies = res
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        TestResponse {
            status,
            set_cookies,
            body,
        }
    }
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    let body = match body {
        Some(v) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    builder.body(body).expect("valid request")
}

/// Value of the named cookie among `Set-Cookie` headers, empty when cleared.
pub(crate) fn cookie_value(set_cookies: &[String], name: &str) -> Option<String> {
    set_cookies
        .iter()
        .filter_map(|raw| Cookie::parse(raw.as_str()).ok())
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}
