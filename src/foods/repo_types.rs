use std::collections::BTreeSet;

use anyhow::Context;
use sqlx::FromRow;
use time::Date;
use uuid::Uuid;

use super::model::{CatalogFoodItem, EatingType, FoodType, PersonalFoodItem, UserPreferences};

/// Row of `personal_foods`.
#[derive(Debug, FromRow)]
pub struct PersonalFoodRow {
    pub id: Uuid,
    pub name: String,
    pub food_type: String,
    pub eating_types: Vec<String>,
    pub last_consumption_date: Option<Date>,
    pub repeat_after_days: Option<i32>,
}

/// Row of `catalog_foods`.
#[derive(Debug, FromRow)]
pub struct CatalogFoodRow {
    pub id: Uuid,
    pub name: String,
    pub food_type: String,
    pub eating_types: Vec<String>,
    pub cuisines: Vec<String>,
}

/// Row of `user_preferences`.
#[derive(Debug, FromRow)]
pub struct PreferencesRow {
    pub food_types: Vec<String>,
    pub cuisines: Vec<String>,
}

fn food_type(raw: &str) -> anyhow::Result<FoodType> {
    FoodType::parse(raw).with_context(|| format!("unknown food_type {raw:?}"))
}

fn eating_types(raw: &[String]) -> anyhow::Result<BTreeSet<EatingType>> {
    raw.iter()
        .map(|s| EatingType::parse(s).with_context(|| format!("unknown eating_type {s:?}")))
        .collect()
}

pub fn eating_type_names(types: &BTreeSet<EatingType>) -> Vec<String> {
    types.iter().map(|t| t.as_str().to_string()).collect()
}

impl TryFrom<PersonalFoodRow> for PersonalFoodItem {
    type Error = anyhow::Error;

    fn try_from(r: PersonalFoodRow) -> anyhow::Result<Self> {
        Ok(Self {
            id: r.id,
            food_type: food_type(&r.food_type)?,
            eating_types: eating_types(&r.eating_types)?,
            name: r.name,
            last_consumption_date: r.last_consumption_date,
            repeat_after_days: r
                .repeat_after_days
                .map(u32::try_from)
                .transpose()
                .context("negative repeat_after_days")?,
        })
    }
}

impl TryFrom<CatalogFoodRow> for CatalogFoodItem {
    type Error = anyhow::Error;

    fn try_from(r: CatalogFoodRow) -> anyhow::Result<Self> {
        Ok(Self {
            id: r.id,
            food_type: food_type(&r.food_type)?,
            eating_types: eating_types(&r.eating_types)?,
            name: r.name,
            cuisines: r.cuisines.into_iter().collect(),
        })
    }
}

impl From<PreferencesRow> for UserPreferences {
    fn from(r: PreferencesRow) -> Self {
        // Unknown food types left over from older clients are dropped rather than failing the session.
        Self {
            food_types: r.food_types.iter().filter_map(|s| FoodType::parse(s)).collect(),
            cuisines: r.cuisines.into_iter().collect(),
        }
    }
}
