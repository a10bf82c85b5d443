use crate::config::AppConfig;
use crate::review::repo::{PgQuestionRepo, QuestionRepo};
use crate::users::repo::{PgUserRepo, UserRepo};
use anyhow::Context;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub questions: Arc<dyn QuestionRepo>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migrations failed; continuing");
        }

        let users = Arc::new(PgUserRepo::new(db.clone())) as Arc<dyn UserRepo>;
        let questions = Arc::new(PgQuestionRepo::new(db)) as Arc<dyn QuestionRepo>;

        Ok(Self::from_parts(config, users, questions))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        questions: Arc<dyn QuestionRepo>,
    ) -> Self {
        Self {
            config,
            users,
            questions,
        }
    }
}
