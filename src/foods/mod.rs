mod dto;
pub mod handlers;
pub mod model;
pub mod repo;
mod repo_types;
pub mod store;

use crate::state::AppState;
use axum::Router;

pub use repo::PgFoodStore;
pub use store::{FoodStore, MemoryFoodStore};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::preference_routes())
        .merge(handlers::food_routes())
}
