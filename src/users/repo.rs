use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::users::repo_types::{NewUser, User, UserChanges, UserRow};

/// Raised by [`UserRepo::create`] when the email is already registered.
#[derive(Debug, thiserror::Error)]
#[error("email already registered")]
pub struct EmailTaken;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn list(&self) -> anyhow::Result<Vec<User>>;
    async fn create(&self, new: NewUser) -> anyhow::Result<User>;
    async fn update(&self, id: Uuid, changes: UserChanges) -> anyhow::Result<Option<User>>;
    /// Hard delete. Returns `false` when no row matched.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

const USER_COLUMNS: &str =
    "id, email, password_hash, name, role, status, avatar, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        row.map(User::try_from).transpose()
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"
        ))
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let res = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (email, password_hash, name, role, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.name)
        .bind(new.role.as_str())
        .bind(new.status.as_str())
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(row) => User::try_from(row),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(EmailTaken.into()),
            Err(e) => Err(anyhow::Error::new(e).context("insert user")),
        }
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
               SET name          = COALESCE($2, name),
                   avatar        = COALESCE($3, avatar),
                   password_hash = COALESCE($4, password_hash),
                   role          = COALESCE($5, role),
                   status        = COALESCE($6, status),
                   is_active     = COALESCE($7, is_active),
                   updated_at    = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.avatar)
        .bind(changes.password_hash)
        .bind(changes.role.map(|r| r.as_str()))
        .bind(changes.status.map(|s| s.as_str()))
        .bind(changes.is_active)
        .fetch_optional(&self.db)
        .await
        .context("update user")?;
        row.map(User::try_from).transpose()
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected() > 0)
    }
}
