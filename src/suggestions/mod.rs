//! Meal suggestions: eligibility of personal foods, catalog sampling, and
//! the per-interaction session that ties them together.

mod dto;
pub mod eligibility;
pub mod handlers;
pub mod meal_context;
pub mod paginator;
pub mod selector;
pub mod service;
pub mod session;

use crate::state::AppState;
use axum::Router;

pub use service::{SessionView, SuggestionService};

pub fn router() -> Router<AppState> {
    handlers::routes()
}
