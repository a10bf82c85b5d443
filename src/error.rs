use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("unknown topic `{topic}`")]
    UnknownTopic { topic: String, valid: Vec<&'static str> },

    #[error("authentication required")]
    AuthRequired,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("session expired, please log in again")]
    SessionExpired,

    #[error("account is disabled")]
    AccountDisabled,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::UnknownTopic { .. } => StatusCode::BAD_REQUEST,
            AppError::AuthRequired
            | AppError::InvalidCredentials
            | AppError::SessionExpired
            | AppError::AccountDisabled => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::UnknownTopic { .. } => "unknown_topic",
            AppError::AuthRequired => "authentication_required",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::SessionExpired => "session_expired",
            AppError::AccountDisabled => "account_disabled",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::UnknownTopic { valid, .. } => json!({
                "error": self.code(),
                "message": self.to_string(),
                "validTopics": valid,
            }),
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                json!({ "error": self.code(), "message": self.to_string() })
            }
            _ => json!({ "error": self.code(), "message": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// `Json` that rejects with [`AppError::Validation`] instead of axum's plain-text rejection.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidJson(value)),
            Err(rejection) => Err(AppError::Validation(json_rejection_message(&rejection))),
        }
    }
}

fn json_rejection_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::JsonDataError(e) => e.body_text(),
        JsonRejection::JsonSyntaxError(_) => "malformed JSON body".into(),
        JsonRejection::MissingJsonContentType(_) => {
            "expected `Content-Type: application/json`".into()
        }
        other => other.body_text(),
    }
}
