use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        password::{hash_password, is_valid_email, normalize_email, MIN_PASSWORD_LEN},
        roles::AdminUser,
        session::{require_session, AuthUser},
    },
    error::{AppError, AppResult, ValidJson},
    state::AppState,
    users::{
        dto::{CreateUserRequest, UpdateUserRequest, UserResponse},
        repo::EmailTaken,
        repo_types::{NewUser, Role, UserChanges, UserStatus},
    },
};

pub fn user_routes(state: AppState) -> Router<AppState> {
    let session = middleware::from_fn_with_state(state, require_session);
    Router::new()
        // route_layer only wraps the methods registered before it: listing
        // needs a session, registration does not.
        .route(
            "/users",
            get(list_users).route_layer(session.clone()).post(register),
        )
        .route(
            "/users/:id",
            get(get_user)
                .put(update_user)
                .delete(delete_user)
                .route_layer(session),
        )
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name must not be empty"));
    }
    Ok(name.to_string())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::validation("invalid email"));
    }
    validate_password(&payload.password)?;
    let name = validate_name(&payload.name)?;

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::Conflict("email already registered".into()));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = state
        .users
        .create(NewUser {
            email,
            password_hash,
            name,
            role: Role::User,
            status: UserStatus::Active,
        })
        .await
        .map_err(|e| {
            if e.is::<EmailTaken>() {
                AppError::Conflict("email already registered".into())
            } else {
                AppError::Internal(e)
            }
        })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<Vec<UserResponse>>> {
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    caller.require_self_or_admin(id)?;
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    caller.require_self_or_admin(id)?;

    let mut changes = UserChanges {
        name: payload.name.as_deref().map(validate_name).transpose()?,
        avatar: payload.avatar.map(|a| a.trim().to_string()),
        password_hash: None,
        role: payload.role,
        status: payload.status,
        is_active: payload.is_active,
    };
    if changes.touches_privileges() {
        caller.require_admin()?;
    }
    if let Some(password) = payload.password.as_deref() {
        validate_password(password)?;
        changes.password_hash = Some(hash_password(password)?);
    }

    let user = state
        .users
        .update(id, changes)
        .await?
        .ok_or(AppError::NotFound("user"))?;

    info!(user_id = %user.id, by = %caller.id, "user updated");
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    caller.require_self_or_admin(id)?;
    if !state.users.delete(id).await? {
        return Err(AppError::NotFound("user"));
    }
    info!(user_id = %id, by = %caller.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
