use axum::{
    extract::{FromRef, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        cookies,
        dto::{LoginRequest, LoginResponse, LogoutResponse, SessionResponse},
        jwt::{JwtKeys, TokenPair},
        password::{is_valid_email, normalize_email, verify_password},
        session::{resolve_session, write_rotated_cookies},
    },
    error::{AppError, AppResult, ValidJson},
    state::AppState,
    users::repo_types::User,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/check", get(check))
        .route("/auth/logout", post(logout))
}

/// Resolves the user afresh and signs a pair for them.
///
/// A user that disappeared after the password check gets no tokens.
async fn issue_for_user(state: &AppState, user_id: Uuid) -> AppResult<(User, TokenPair)> {
    let user = state.users.find_by_id(user_id).await?.ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("user {user_id} vanished before token issuance"))
    })?;
    let pair = JwtKeys::from_ref(state).issue_pair(&user.identity())?;
    Ok((user, pair))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::validation("invalid email"));
    }

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    if !user.can_authenticate() {
        warn!(user_id = %user.id, status = %user.status, "login on disabled account");
        return Err(AppError::AccountDisabled);
    }

    let (user, pair) = issue_for_user(&state, user.id).await?;
    let mut headers = HeaderMap::new();
    write_rotated_cookies(&state, &mut headers, &pair)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((
        headers,
        Json(LoginResponse {
            access_token: pair.access,
            user: user.into(),
        }),
    ))
}

/// Reports the current identity, refreshing the session when needed.
#[instrument(skip(state, headers))]
pub async fn check(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    match resolve_session(&state, &headers).await {
        Ok(outcome) => {
            let mut out = HeaderMap::new();
            if let Some(pair) = &outcome.rotated {
                write_rotated_cookies(&state, &mut out, pair)?;
            }
            let body = SessionResponse {
                authenticated: true,
                refreshed: outcome.rotated.is_some(),
                user: outcome.user.into(),
            };
            Ok((out, Json(body)).into_response())
        }
        Err(e @ (AppError::SessionExpired | AppError::AccountDisabled)) => {
            // Dead cookies are useless to the browser; drop them with the 401.
            let mut out = HeaderMap::new();
            cookies::clear_session_cookies(&mut out, state.config.environment)?;
            Ok((out, e).into_response())
        }
        Err(e) => Err(e),
    }
}

#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> AppResult<(HeaderMap, Json<LogoutResponse>)> {
    let mut headers = HeaderMap::new();
    cookies::clear_session_cookies(&mut headers, state.config.environment)?;
    Ok((headers, Json(LogoutResponse { ok: true })))
}
