use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::review::repo_types::{NewQuestion, Question, QuestionChanges, QuestionRow};

/// Raised when a write would break the answer-count or correct-index constraints,
/// e.g. when two edits to the same question race.
#[derive(Debug, thiserror::Error)]
#[error("answers and correctAnswer no longer fit together; reload the question and retry")]
pub struct AnswerBoundsViolated;

fn map_write_error(e: sqlx::Error, what: &'static str) -> anyhow::Error {
    match e {
        sqlx::Error::Database(db) if db.is_check_violation() => AnswerBoundsViolated.into(),
        e => anyhow::Error::new(e).context(what),
    }
}

#[async_trait]
pub trait QuestionRepo: Send + Sync {
    /// Up to `limit` active questions of `topic`, in random order.
    async fn sample_active(&self, topic: &str, limit: i64) -> anyhow::Result<Vec<Question>>;
    async fn list(
        &self,
        topic: &str,
        include_inactive: bool,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Question>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Question>>;
    async fn create(&self, new: NewQuestion) -> anyhow::Result<Question>;
    async fn update(&self, id: Uuid, changes: QuestionChanges) -> anyhow::Result<Option<Question>>;
    /// Flips `is_active` off. Returns `false` when no question matched.
    async fn soft_delete(&self, id: Uuid, topic: &str) -> anyhow::Result<bool>;
}

const QUESTION_COLUMNS: &str = "id, topic, question, answers, correct_answer, explanation, \
                                difficulty, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct PgQuestionRepo {
    db: PgPool,
}

impl PgQuestionRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_questions(rows: Vec<QuestionRow>) -> anyhow::Result<Vec<Question>> {
    rows.into_iter().map(Question::try_from).collect()
}

#[async_trait]
impl QuestionRepo for PgQuestionRepo {
    async fn sample_active(&self, topic: &str, limit: i64) -> anyhow::Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(&format!(
            r#"
            SELECT {QUESTION_COLUMNS}
              FROM questions
             WHERE topic = $1 AND is_active
             ORDER BY random()
             LIMIT $2
            "#
        ))
        .bind(topic)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("sample questions")?;
        into_questions(rows)
    }

    async fn list(
        &self,
        topic: &str,
        include_inactive: bool,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Question>> {
        let rows = sqlx::query_as::<_, QuestionRow>(&format!(
            r#"
            SELECT {QUESTION_COLUMNS}
              FROM questions
             WHERE topic = $1 AND (is_active OR $2)
             ORDER BY created_at DESC
             LIMIT $3 OFFSET $4
            "#
        ))
        .bind(topic)
        .bind(include_inactive)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await
        .context("list questions")?;
        into_questions(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Question>> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find question")?;
        row.map(Question::try_from).transpose()
    }

    async fn create(&self, new: NewQuestion) -> anyhow::Result<Question> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            r#"
            INSERT INTO questions
                   (topic, question, answers, correct_answer, explanation, difficulty)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(new.topic)
        .bind(&new.question)
        .bind(&new.answers)
        .bind(new.correct_answer)
        .bind(&new.explanation)
        .bind(new.difficulty.map(|d| d.as_str()))
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_write_error(e, "insert question"))?;
        Question::try_from(row)
    }

    async fn update(&self, id: Uuid, changes: QuestionChanges) -> anyhow::Result<Option<Question>> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            r#"
            UPDATE questions
               SET question       = COALESCE($2, question),
                   answers        = COALESCE($3, answers),
                   correct_answer = COALESCE($4, correct_answer),
                   explanation    = COALESCE($5, explanation),
                   difficulty     = COALESCE($6, difficulty),
                   is_active      = COALESCE($7, is_active),
                   updated_at     = now()
             WHERE id = $1
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.question)
        .bind(changes.answers)
        .bind(changes.correct_answer)
        .bind(changes.explanation)
        .bind(changes.difficulty.map(|d| d.as_str()))
        .bind(changes.is_active)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| map_write_error(e, "update question"))?;
        row.map(Question::try_from).transpose()
    }

    async fn soft_delete(&self, id: Uuid, topic: &str) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE questions
               SET is_active = FALSE, updated_at = now()
             WHERE id = $1 AND topic = $2 AND is_active
            "#,
        )
        .bind(id)
        .bind(topic)
        .execute(&self.db)
        .await
        .context("soft delete question")?;
        Ok(res.rows_affected() > 0)
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::sync::{Mutex, PoisonError};

    use rand::seq::SliceRandom;
    use time::OffsetDateTime;

    use super::*;
    use crate::review::repo_types::check_answer_bounds;

    #[derive(Default)]
    pub(crate) struct MemoryQuestionRepo {
        questions: Mutex<Vec<Question>>,
    }

    impl MemoryQuestionRepo {
        fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Question>> {
            self.questions.lock().unwrap_or_else(PoisonError::into_inner)
        }

        pub(crate) fn get(&self, id: Uuid) -> Option<Question> {
            self.lock().iter().find(|q| q.id == id).cloned()
        }
    }

    #[async_trait]
    impl QuestionRepo for MemoryQuestionRepo {
        async fn sample_active(&self, topic: &str, limit: i64) -> anyhow::Result<Vec<Question>> {
            let questions = self.lock();
            let active: Vec<&Question> = questions
                .iter()
                .filter(|q| q.topic == topic && q.is_active)
                .collect();
            Ok(active
                .choose_multiple(&mut rand::thread_rng(), limit.max(0) as usize)
                .map(|q| (*q).clone())
                .collect())
        }

        async fn list(
            &self,
            topic: &str,
            include_inactive: bool,
            limit: i64,
            offset: i64,
        ) -> anyhow::Result<Vec<Question>> {
            Ok(self
                .lock()
                .iter()
                .filter(|q| q.topic == topic && (q.is_active || include_inactive))
                .skip(offset.max(0) as usize)
                .take(limit.max(0) as usize)
                .cloned()
                .collect())
        }

        async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Question>> {
            Ok(self.get(id))
        }

        async fn create(&self, new: NewQuestion) -> anyhow::Result<Question> {
            let now = OffsetDateTime::now_utc();
            let question = Question {
                id: Uuid::new_v4(),
                topic: new.topic.to_string(),
                question: new.question,
                answers: new.answers,
                correct_answer: new.correct_answer,
                explanation: new.explanation,
                difficulty: new.difficulty,
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            self.lock().push(question.clone());
            Ok(question)
        }

        async fn update(
            &self,
            id: Uuid,
            changes: QuestionChanges,
        ) -> anyhow::Result<Option<Question>> {
            let mut questions = self.lock();
            let Some(q) = questions.iter_mut().find(|q| q.id == id) else {
                return Ok(None);
            };
            // Same guarantee as the table's CHECK constraints.
            let answers = changes.answers.as_deref().unwrap_or(&q.answers);
            let correct = changes.correct_answer.unwrap_or(q.correct_answer);
            if check_answer_bounds(answers, correct).is_err() {
                return Err(AnswerBoundsViolated.into());
            }
            if let Some(text) = changes.question {
                q.question = text;
            }
            if let Some(answers) = changes.answers {
                q.answers = answers;
            }
            if let Some(idx) = changes.correct_answer {
                q.correct_answer = idx;
            }
            if let Some(explanation) = changes.explanation {
                q.explanation = explanation;
            }
            if let Some(difficulty) = changes.difficulty {
                q.difficulty = Some(difficulty);
            }
            if let Some(active) = changes.is_active {
                q.is_active = active;
            }
            q.updated_at = OffsetDateTime::now_utc();
            Ok(Some(q.clone()))
        }

        async fn soft_delete(&self, id: Uuid, topic: &str) -> anyhow::Result<bool> {
            let mut questions = self.lock();
            match questions
                .iter_mut()
                .find(|q| q.id == id && q.topic == topic && q.is_active)
            {
                Some(q) => {
                    q.is_active = false;
                    q.updated_at = OffsetDateTime::now_utc();
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }
}
