use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;

/// A JSON API call, addressed by path relative to the API base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> anyhow::Result<ApiResponse>;
}

/// HTTP transport that keeps the session cookies the API sets, including
/// the rotated pair that arrives on any response.
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Reads `NEXT_PUBLIC_API_URL`, the variable the web app uses for the API origin.
    pub fn from_env() -> anyhow::Result<Self> {
        let base = std::env::var("NEXT_PUBLIC_API_URL").context("NEXT_PUBLIC_API_URL is not set")?;
        Self::new(base)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> anyhow::Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.request(request.method.clone(), &url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let res = builder
            .send()
            .await
            .with_context(|| format!("{} {}", request.method, url))?;
        let status = res.status();
        let bytes = res.bytes().await.context("read response body")?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        http::{
            header::{COOKIE, SET_COOKIE},
            HeaderMap,
        },
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;

    use super::*;

    async fn spawn_server() -> String {
        let app = Router::new()
            .route(
                "/login",
                post(|Json(body): Json<Value>| async move {
                    (
                        [(SET_COOKIE, "accessToken=abc; Path=/; HttpOnly")],
                        Json(json!({ "echo": body })),
                    )
                }),
            )
            .route(
                "/whoami",
                get(|headers: HeaderMap| async move {
                    let cookie = headers
                        .get(COOKIE)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    Json(json!({ "cookie": cookie }))
                }),
            )
            .route("/plain", get(|| async { "not json" }))
            .route("/empty", get(|| async { axum::http::StatusCode::NO_CONTENT }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let transport = ReqwestTransport::new("https://api.englishpro.example///").unwrap();
        assert_eq!(transport.base_url, "https://api.englishpro.example");
    }

    #[test]
    fn from_env_reads_the_web_app_api_url() {
        std::env::set_var("NEXT_PUBLIC_API_URL", "http://localhost:4000/");
        let transport = ReqwestTransport::from_env().unwrap();
        assert_eq!(transport.base_url, "http://localhost:4000");
        std::env::remove_var("NEXT_PUBLIC_API_URL");
        assert!(ReqwestTransport::from_env().is_err());
    }

    #[tokio::test]
    async fn cookies_set_by_the_api_are_sent_back() {
        let base = spawn_server().await;
        let transport = ReqwestTransport::new(format!("{base}/")).unwrap();

        let login = transport
            .send(&ApiRequest::post("/login", json!({ "email": "a@b.co" })))
            .await
            .unwrap();
        assert_eq!(login.status, StatusCode::OK);
        assert_eq!(login.body["echo"]["email"], "a@b.co");

        let whoami = transport.send(&ApiRequest::get("/whoami")).await.unwrap();
        assert_eq!(whoami.body["cookie"], "accessToken=abc");
    }

    #[tokio::test]
    async fn non_json_and_empty_bodies_are_tolerated() {
        let base = spawn_server().await;
        let transport = ReqwestTransport::new(base).unwrap();

        let plain = transport.send(&ApiRequest::get("/plain")).await.unwrap();
        assert_eq!(plain.body, json!("not json"));

        let empty = transport.send(&ApiRequest::get("/empty")).await.unwrap();
        assert_eq!(empty.status, StatusCode::NO_CONTENT);
        assert_eq!(empty.body, Value::Null);
    }

    #[tokio::test]
    async fn unreachable_api_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = ReqwestTransport::new(format!("http://{addr}")).unwrap();
        let err = transport.send(&ApiRequest::delete("/x")).await.unwrap_err();
        assert!(err.to_string().contains("DELETE"));
    }
}
