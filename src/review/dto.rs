use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    review::{
        repo_types::{check_answer_bounds, Difficulty, NewQuestion, Question, QuestionChanges},
        topics,
    },
};

#[derive(Debug, Deserialize)]
pub struct TopicQuery {
    pub topic: Option<String>,
}

impl TopicQuery {
    pub fn resolve(&self) -> AppResult<&'static str> {
        let raw = self
            .topic
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::validation("query parameter `topic` is required"))?;
        topics::resolve(raw)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageQuery {
    pub topic: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub include_inactive: bool,
}
fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    pub topic: String,
    pub question: String,
    pub answers: Vec<String>,
    pub correct_answer: i32,
    #[serde(default)]
    pub explanation: String,
    pub difficulty: Option<Difficulty>,
}

impl CreateQuestionRequest {
    pub fn validate(self) -> AppResult<NewQuestion> {
        let topic = topics::resolve(&self.topic)?;
        let question = non_blank(&self.question, "question")?;
        let answers: Vec<String> = self.answers.iter().map(|a| a.trim().to_string()).collect();
        check_answer_bounds(&answers, self.correct_answer).map_err(AppError::Validation)?;
        Ok(NewQuestion {
            topic,
            question,
            answers,
            correct_answer: self.correct_answer,
            explanation: self.explanation.trim().to_string(),
            difficulty: self.difficulty,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuestionRequest {
    /// Accepted only when it names the question's current topic.
    pub topic: Option<String>,
    pub question: Option<String>,
    pub answers: Option<Vec<String>>,
    pub correct_answer: Option<i32>,
    pub explanation: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub is_active: Option<bool>,
}

impl UpdateQuestionRequest {
    /// Checks the edit against the stored question and returns the changes to persist.
    pub fn validate_against(self, current: &Question) -> AppResult<QuestionChanges> {
        if let Some(topic) = self.topic.as_deref() {
            if topics::resolve(topic)? != current.topic {
                return Err(AppError::validation(
                    "topic cannot be changed; delete the question and create it under the new \
                     topic",
                ));
            }
        }

        let question = self
            .question
            .as_deref()
            .map(|q| non_blank(q, "question"))
            .transpose()?;
        let answers = self
            .answers
            .map(|a| a.iter().map(|s| s.trim().to_string()).collect::<Vec<_>>());

        let merged_answers = answers.as_deref().unwrap_or(&current.answers);
        let merged_correct = self.correct_answer.unwrap_or(current.correct_answer);
        check_answer_bounds(merged_answers, merged_correct).map_err(AppError::Validation)?;

        Ok(QuestionChanges {
            question,
            answers,
            correct_answer: self.correct_answer,
            explanation: self.explanation.map(|e| e.trim().to_string()),
            difficulty: self.difficulty,
            is_active: self.is_active,
        })
    }
}

fn non_blank(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub id: Uuid,
    pub topic: String,
    pub question: String,
    pub answers: Vec<String>,
    pub correct_answer: i32,
    pub explanation: String,
    pub difficulty: Option<Difficulty>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Question> for QuestionResponse {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            topic: q.topic,
            question: q.question,
            answers: q.answers,
            correct_answer: q.correct_answer,
            explanation: q.explanation,
            difficulty: q.difficulty,
            is_active: q.is_active,
            created_at: q.created_at,
            updated_at: q.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TopicResponse {
    pub key: &'static str,
    pub slug: String,
}
