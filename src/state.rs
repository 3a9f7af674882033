use crate::config::AppConfig;
use crate::foods::{FoodStore, PgFoodStore};
use crate::suggestions::SuggestionService;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn FoodStore>,
    pub suggestions: SuggestionService,
}

impl AppState {
    /// Connects to Postgres; the pool is handed back for migrations.
    pub async fn init() -> anyhow::Result<(Self, PgPool)> {
        let config = AppConfig::from_env()?;

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;

        let store = Arc::new(PgFoodStore::new(db.clone())) as Arc<dyn FoodStore>;
        Ok((Self::from_parts(config, store), db))
    }

    pub fn from_parts(config: AppConfig, store: Arc<dyn FoodStore>) -> Self {
        let suggestions = SuggestionService::new(store.clone(), config.suggestions.clone());
        Self {
            config: Arc::new(config),
            store,
            suggestions,
        }
    }
}
