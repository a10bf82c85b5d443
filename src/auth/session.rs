//! Per-request session validation with transparent refresh.
//!
//! The access token is read from the `accessToken` cookie (or a bearer header).
//! When it is missing or no longer verifies, the `refreshToken` cookie is tried
//! once; a valid refresh token rotates both tokens and the new cookies are
//! attached to whatever response the handler produces.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        cookies,
        jwt::{JwtKeys, TokenPair},
    },
    error::{AppError, AppResult},
    state::AppState,
    users::repo_types::{Role, User},
};

/// Authenticated caller, attached to the request by [`require_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::AuthRequired)
    }
}

/// Result of a successful session check.
#[derive(Debug)]
pub struct SessionOutcome {
    pub user: User,
    /// Set when the access token was renewed from the refresh token.
    pub rotated: Option<TokenPair>,
}

pub async fn resolve_session(state: &AppState, headers: &HeaderMap) -> AppResult<SessionOutcome> {
    let keys = JwtKeys::from_ref(state);
    let access = cookies::access_token(headers);
    let refresh = cookies::refresh_token(headers);

    if access.is_none() && refresh.is_none() {
        return Err(AppError::AuthRequired);
    }

    if let Some(token) = access {
        match keys.verify_access(&token) {
            Ok(claims) => {
                let user = load_user(state, claims.sub).await?;
                return Ok(SessionOutcome {
                    user,
                    rotated: None,
                });
            }
            Err(e) => debug!(error = %e, "access token rejected, trying refresh token"),
        }
    }

    let Some(refresh) = refresh else {
        warn!("access token invalid and no refresh token present");
        return Err(AppError::SessionExpired);
    };

    let claims = keys.verify_refresh(&refresh).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        AppError::SessionExpired
    })?;

    let user = load_user(state, claims.sub).await?;
    let pair = keys.issue_pair(&user.identity())?;
    info!(user_id = %user.id, "session refreshed, tokens rotated");

    Ok(SessionOutcome {
        user,
        rotated: Some(pair),
    })
}

/// Loads the token's subject and refuses accounts that may not sign in.
async fn load_user(state: &AppState, user_id: Uuid) -> AppResult<User> {
    let user = state.users.find_by_id(user_id).await?.ok_or_else(|| {
        warn!(%user_id, "token subject no longer exists");
        AppError::AuthRequired
    })?;
    if !user.can_authenticate() {
        warn!(
            %user_id,
            status = %user.status,
            is_active = user.is_active,
            "disabled account presented a token"
        );
        return Err(AppError::AccountDisabled);
    }
    Ok(user)
}

/// Attach `Set-Cookie` headers for a rotated pair.
pub fn write_rotated_cookies(
    state: &AppState,
    headers: &mut HeaderMap,
    pair: &TokenPair,
) -> AppResult<()> {
    let keys = JwtKeys::from_ref(state);
    cookies::set_session_cookies(
        headers,
        pair,
        keys.access_ttl,
        keys.refresh_ttl,
        state.config.environment,
    )?;
    Ok(())
}

/// Middleware guarding every route that needs a signed-in caller.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> AppResult<Response> {
    let outcome = resolve_session(&state, req.headers()).await?;
    req.extensions_mut().insert(AuthUser::from(&outcome.user));

    let mut res = next.run(req).await;
    if let Some(pair) = &outcome.rotated {
        write_rotated_cookies(&state, res.headers_mut(), pair)?;
    }
    Ok(res)
}
