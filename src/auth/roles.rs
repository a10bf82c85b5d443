use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::session::AuthUser,
    error::{AppError, AppResult},
    users::repo_types::Role,
};

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            warn!(user_id = %self.id, role = %self.role, "admin route refused");
            Err(AppError::forbidden("admin role required"))
        }
    }

    /// Callers may act on their own record; admins on any.
    pub fn require_self_or_admin(&self, subject: Uuid) -> AppResult<()> {
        if self.id == subject || self.is_admin() {
            Ok(())
        } else {
            warn!(user_id = %self.id, %subject, "access to another user's record refused");
            Err(AppError::forbidden("not allowed to access this user"))
        }
    }
}

/// An [`AuthUser`] whose role is admin.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.require_admin()?;
        Ok(AdminUser(user))
    }
}
