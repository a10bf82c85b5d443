use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const MIN_ANSWERS: usize = 2;
pub const MAX_ANSWERS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => anyhow::bail!("unknown difficulty `{other}`"),
        }
    }
}

/// A multiple-choice question in one topic's bank.
#[derive(Debug, Clone)]
pub struct Question {
    pub id: Uuid,
    pub topic: String,
    pub question: String,
    pub answers: Vec<String>,
    pub correct_answer: i32,
    pub explanation: String,
    pub difficulty: Option<Difficulty>,
    pub is_active: bool, // false once soft-deleted
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub(crate) struct QuestionRow {
    pub id: Uuid,
    pub topic: String,
    pub question: String,
    pub answers: Vec<String>,
    pub correct_answer: i32,
    pub explanation: String,
    pub difficulty: Option<String>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<QuestionRow> for Question {
    type Error = anyhow::Error;

    fn try_from(r: QuestionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            topic: r.topic,
            question: r.question,
            answers: r.answers,
            correct_answer: r.correct_answer,
            explanation: r.explanation,
            difficulty: r.difficulty.as_deref().map(str::parse::<Difficulty>).transpose()?,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Validated input for a new question.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub topic: &'static str,
    pub question: String,
    pub answers: Vec<String>,
    pub correct_answer: i32,
    pub explanation: String,
    pub difficulty: Option<Difficulty>,
}

/// Partial update. The topic is fixed at creation and has no field here.
#[derive(Debug, Clone, Default)]
pub struct QuestionChanges {
    pub question: Option<String>,
    pub answers: Option<Vec<String>>,
    pub correct_answer: Option<i32>,
    pub explanation: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub is_active: Option<bool>,
}

/// Answer-count and index bounds shared by create and update.
pub fn check_answer_bounds(answers: &[String], correct_answer: i32) -> Result<(), String> {
    if !(MIN_ANSWERS..=MAX_ANSWERS).contains(&answers.len()) {
        return Err(format!(
            "answers must contain between {MIN_ANSWERS} and {MAX_ANSWERS} choices, got {}",
            answers.len()
        ));
    }
    if answers.iter().any(|a| a.trim().is_empty()) {
        return Err("answer choices must not be empty".into());
    }
    if correct_answer < 0 || correct_answer as usize >= answers.len() {
        return Err(format!(
            "correctAnswer must be an index into answers (0..{}), got {correct_answer}",
            answers.len()
        ));
    }
    Ok(())
}
