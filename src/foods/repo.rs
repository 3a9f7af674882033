use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::model::{
    CatalogFoodItem, NewPersonalFood, PersonalFoodItem, PersonalFoodPatch, UserKey,
    UserPreferences,
};
use super::repo_types::{eating_type_names, CatalogFoodRow, PersonalFoodRow, PreferencesRow};
use super::store::{CatalogQuery, DuplicateName, FoodStore};

/// Maps a `(user_key, name)` unique violation to [`DuplicateName`].
fn name_taken_or(e: sqlx::Error, name: &str, what: &'static str) -> anyhow::Error {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DuplicateName(name.to_string()).into()
        }
        _ => anyhow::Error::new(e).context(what),
    }
}

/// Postgres-backed [`FoodStore`].
#[derive(Clone)]
pub struct PgFoodStore {
    db: PgPool,
}

impl PgFoodStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FoodStore for PgFoodStore {
    async fn preferences(&self, user: &UserKey) -> anyhow::Result<Option<UserPreferences>> {
        let row = sqlx::query_as::<_, PreferencesRow>(
            r#"
            SELECT food_types, cuisines
              FROM user_preferences
             WHERE user_key = $1
            "#,
        )
        .bind(user.as_str())
        .fetch_optional(&self.db)
        .await
        .context("load preferences")?;
        Ok(row.map(UserPreferences::from))
    }

    async fn save_preferences(&self, user: &UserKey, prefs: &UserPreferences) -> anyhow::Result<()> {
        let food_types: Vec<&str> = prefs.food_types.iter().map(|t| t.as_str()).collect();
        let cuisines: Vec<&str> = prefs.cuisines.iter().map(String::as_str).collect();
        sqlx::query(
            r#"
            INSERT INTO user_preferences (user_key, food_types, cuisines)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_key)
            DO UPDATE SET food_types = EXCLUDED.food_types,
                          cuisines = EXCLUDED.cuisines,
                          updated_at = now()
            "#,
        )
        .bind(user.as_str())
        .bind(&food_types)
        .bind(&cuisines)
        .execute(&self.db)
        .await
        .context("save preferences")?;
        Ok(())
    }

    async fn list_personal(&self, user: &UserKey) -> anyhow::Result<Vec<PersonalFoodItem>> {
        let rows = sqlx::query_as::<_, PersonalFoodRow>(
            r#"
            SELECT id, name, food_type, eating_types, last_consumption_date, repeat_after_days
              FROM personal_foods
             WHERE user_key = $1
             ORDER BY created_at ASC
            "#,
        )
        .bind(user.as_str())
        .fetch_all(&self.db)
        .await
        .context("list personal foods")?;
        rows.into_iter().map(PersonalFoodItem::try_from).collect()
    }

    async fn get_personal(
        &self,
        user: &UserKey,
        id: Uuid,
    ) -> anyhow::Result<Option<PersonalFoodItem>> {
        let row = sqlx::query_as::<_, PersonalFoodRow>(
            r#"
            SELECT id, name, food_type, eating_types, last_consumption_date, repeat_after_days
              FROM personal_foods
             WHERE id = $1 AND user_key = $2
            "#,
        )
        .bind(id)
        .bind(user.as_str())
        .fetch_optional(&self.db)
        .await
        .context("get personal food")?;
        row.map(PersonalFoodItem::try_from).transpose()
    }

    async fn add_personal(
        &self,
        user: &UserKey,
        food: NewPersonalFood,
    ) -> anyhow::Result<PersonalFoodItem> {
        let row = sqlx::query_as::<_, PersonalFoodRow>(
            r#"
            INSERT INTO personal_foods
                (id, user_key, name, food_type, eating_types, last_consumption_date, repeat_after_days)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, food_type, eating_types, last_consumption_date, repeat_after_days
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.as_str())
        .bind(&food.name)
        .bind(food.food_type.as_str())
        .bind(eating_type_names(&food.eating_types))
        .bind(food.last_consumption_date)
        .bind(food.repeat_after_days.map(|d| d as i32))
        .fetch_one(&self.db)
        .await
        .map_err(|e| name_taken_or(e, &food.name, "insert personal food"))?;
        PersonalFoodItem::try_from(row)
    }

    async fn update_personal(
        &self,
        user: &UserKey,
        id: Uuid,
        patch: &PersonalFoodPatch,
    ) -> anyhow::Result<Option<PersonalFoodItem>> {
        let row = sqlx::query_as::<_, PersonalFoodRow>(
            r#"
            UPDATE personal_foods
               SET name = COALESCE($3, name),
                   food_type = COALESCE($4, food_type),
                   eating_types = COALESCE($5, eating_types),
                   last_consumption_date = CASE WHEN $6 THEN $7 ELSE last_consumption_date END,
                   repeat_after_days = CASE WHEN $8 THEN $9 ELSE repeat_after_days END
             WHERE id = $1 AND user_key = $2
            RETURNING id, name, food_type, eating_types, last_consumption_date, repeat_after_days
            "#,
        )
        .bind(id)
        .bind(user.as_str())
        .bind(patch.name.as_deref())
        .bind(patch.food_type.map(|t| t.as_str()))
        .bind(patch.eating_types.as_ref().map(eating_type_names))
        .bind(patch.last_consumption_date.is_some())
        .bind(patch.last_consumption_date.flatten())
        .bind(patch.repeat_after_days.is_some())
        .bind(patch.repeat_after_days.flatten().map(|d| d as i32))
        .fetch_optional(&self.db)
        .await
        .map_err(|e| {
            name_taken_or(e, patch.name.as_deref().unwrap_or_default(), "update personal food")
        })?;
        row.map(PersonalFoodItem::try_from).transpose()
    }

    async fn query_catalog(&self, query: &CatalogQuery) -> anyhow::Result<Vec<CatalogFoodItem>> {
        let food_types: Vec<&str> = query.food_types.iter().map(|t| t.as_str()).collect();
        let rows = sqlx::query_as::<_, CatalogFoodRow>(
            r#"
            SELECT id, name, food_type, eating_types, cuisines
              FROM catalog_foods
             WHERE (cardinality($1::text[]) = 0 OR food_type = ANY($1))
               AND (cardinality($2::text[]) = 0 OR cuisines && $2)
               AND ($3::text IS NULL OR (name, id) > ($3, $4::uuid))
             ORDER BY name, id
             LIMIT $5
            "#,
        )
        .bind(&food_types)
        .bind(&query.cuisines)
        .bind(query.after.as_ref().map(|c| c.name.as_str()))
        .bind(query.after.as_ref().map(|c| c.id))
        .bind(i64::from(query.limit))
        .fetch_all(&self.db)
        .await
        .context("query catalog")?;
        rows.into_iter().map(CatalogFoodItem::try_from).collect()
    }

    async fn get_catalog(&self, id: Uuid) -> anyhow::Result<Option<CatalogFoodItem>> {
        let row = sqlx::query_as::<_, CatalogFoodRow>(
            r#"
            SELECT id, name, food_type, eating_types, cuisines
              FROM catalog_foods
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get catalog food")?;
        row.map(CatalogFoodItem::try_from).transpose()
    }
}
