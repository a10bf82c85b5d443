mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;

pub use dto::UserResponse;

use crate::state::AppState;
use axum::Router;

pub fn router(state: AppState) -> Router<AppState> {
    handlers::user_routes(state)
}
