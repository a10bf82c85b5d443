use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, put},
    Json, Router,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        roles::AdminUser,
        session::{require_session, AuthUser},
    },
    error::{AppError, AppResult, ValidJson},
    review::{
        dto::{
            CreateQuestionRequest, ManageQuery, QuestionResponse, TopicQuery, TopicResponse,
            UpdateQuestionRequest,
        },
        repo::AnswerBoundsViolated,
        topics::{self, TOPICS},
    },
    state::AppState,
};

/// Questions served per practice round.
pub const SAMPLE_SIZE: i64 = 20;
const MAX_PAGE: i64 = 200;

pub fn review_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/review", get(sample_questions).post(create_question))
        .route("/review/topics", get(list_topics))
        .route("/review/manage", get(manage_questions))
        .route("/review/:id", put(update_question).delete(delete_question))
        .route_layer(middleware::from_fn_with_state(state, require_session))
}

fn bounds_to_validation(e: anyhow::Error) -> AppError {
    match e.downcast::<AnswerBoundsViolated>() {
        Ok(violation) => AppError::Validation(violation.to_string()),
        Err(e) => AppError::Internal(e),
    }
}

#[instrument(skip(state))]
pub async fn sample_questions(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<TopicQuery>,
) -> AppResult<Json<Vec<QuestionResponse>>> {
    let topic = query.resolve()?;
    let questions = state.questions.sample_active(topic, SAMPLE_SIZE).await?;
    debug!(user_id = %caller.id, %topic, count = questions.len(), "served practice round");
    Ok(Json(questions.into_iter().map(QuestionResponse::from).collect()))
}

#[instrument(skip_all)]
pub async fn list_topics(AdminUser(_admin): AdminUser) -> Json<Vec<TopicResponse>> {
    Json(
        TOPICS
            .iter()
            .copied()
            .map(|key| TopicResponse {
                key,
                slug: topics::slug(key),
            })
            .collect(),
    )
}

#[instrument(skip(state))]
pub async fn manage_questions(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<ManageQuery>,
) -> AppResult<Json<Vec<QuestionResponse>>> {
    let topic = TopicQuery { topic: query.topic }.resolve()?;
    let limit = query.limit.clamp(1, MAX_PAGE);
    let offset = query.offset.max(0);
    let questions = state
        .questions
        .list(topic, query.include_inactive, limit, offset)
        .await?;
    Ok(Json(questions.into_iter().map(QuestionResponse::from).collect()))
}

#[instrument(skip(state, payload))]
pub async fn create_question(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidJson(payload): ValidJson<CreateQuestionRequest>,
) -> AppResult<(StatusCode, Json<QuestionResponse>)> {
    let new = payload.validate()?;
    let question = state
        .questions
        .create(new)
        .await
        .map_err(bounds_to_validation)?;
    info!(question_id = %question.id, topic = %question.topic, by = %admin.id, "question created");
    Ok((StatusCode::CREATED, Json(question.into())))
}

#[instrument(skip(state, payload))]
pub async fn update_question(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    ValidJson(payload): ValidJson<UpdateQuestionRequest>,
) -> AppResult<Json<QuestionResponse>> {
    let current = state
        .questions
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("question"))?;
    let changes = payload.validate_against(&current)?;
    let question = state
        .questions
        .update(id, changes)
        .await
        .map_err(bounds_to_validation)?
        .ok_or(AppError::NotFound("question"))?;
    info!(question_id = %id, by = %admin.id, "question updated");
    Ok(Json(question.into()))
}

#[instrument(skip(state))]
pub async fn delete_question(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Query(query): Query<TopicQuery>,
) -> AppResult<StatusCode> {
    let topic = query.resolve()?;
    if !state.questions.soft_delete(id, topic).await? {
        warn!(question_id = %id, %topic, "soft delete matched nothing");
        return Err(AppError::NotFound("question"));
    }
    info!(question_id = %id, %topic, by = %admin.id, "question soft-deleted");
    Ok(StatusCode::NO_CONTENT)
}
