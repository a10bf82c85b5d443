mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod topics;

use crate::state::AppState;
use axum::Router;

pub fn router(state: AppState) -> Router<AppState> {
    handlers::review_routes(state)
}
