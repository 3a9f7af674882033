use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use time::Date;
use uuid::Uuid;

use super::model::{
    optional_date, CatalogFoodItem, EatingType, FoodType, NewPersonalFood, PersonalFoodPatch,
};
use crate::error::{AppError, AppResult};
use crate::foods::store::CatalogCursor;
use crate::suggestions::paginator::{CatalogPage, FilterTruncation};

/// About a hundred years; keeps the value inside a Postgres INT.
const MAX_REPEAT_AFTER_DAYS: i64 = 36_500;

#[derive(Debug, Deserialize)]
pub struct CreateFoodRequest {
    pub name: String,
    pub food_type: FoodType,
    pub eating_types: BTreeSet<EatingType>,
    #[serde(with = "optional_date", default)]
    pub last_consumption_date: Option<Date>,
    #[serde(default)]
    pub repeat_after_days: Option<i64>,
}

impl CreateFoodRequest {
    pub fn into_new(self) -> AppResult<NewPersonalFood> {
        Ok(NewPersonalFood {
            name: valid_name(&self.name)?,
            food_type: self.food_type,
            eating_types: valid_eating_types(self.eating_types)?,
            last_consumption_date: self.last_consumption_date,
            repeat_after_days: valid_repeat(self.repeat_after_days)?,
        })
    }
}

/// Absent fields stay as they are; `null` clears the nullable ones.
#[derive(Debug, Default, Deserialize)]
pub struct PatchFoodRequest {
    pub name: Option<String>,
    pub food_type: Option<FoodType>,
    pub eating_types: Option<BTreeSet<EatingType>>,
    #[serde(default, deserialize_with = "present_date")]
    pub last_consumption_date: Option<Option<Date>>,
    #[serde(default, deserialize_with = "present")]
    pub repeat_after_days: Option<Option<i64>>,
}

impl PatchFoodRequest {
    pub fn into_patch(self) -> AppResult<PersonalFoodPatch> {
        Ok(PersonalFoodPatch {
            name: self.name.as_deref().map(valid_name).transpose()?,
            food_type: self.food_type,
            eating_types: self.eating_types.map(valid_eating_types).transpose()?,
            last_consumption_date: self.last_consumption_date,
            repeat_after_days: self.repeat_after_days.map(valid_repeat).transpose()?,
        })
    }
}

fn present<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

fn present_date<'de, D>(de: D) -> Result<Option<Option<Date>>, D::Error>
where
    D: Deserializer<'de>,
{
    optional_date::deserialize(de).map(Some)
}

fn valid_name(name: &str) -> AppResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput("name must not be blank".into()));
    }
    Ok(trimmed.to_string())
}

fn valid_eating_types(set: BTreeSet<EatingType>) -> AppResult<BTreeSet<EatingType>> {
    if set.is_empty() {
        return Err(AppError::InvalidInput(
            "at least one eating type is required".into(),
        ));
    }
    Ok(set)
}

fn valid_repeat(days: Option<i64>) -> AppResult<Option<u32>> {
    match days {
        None => Ok(None),
        Some(d) if (0..=MAX_REPEAT_AFTER_DAYS).contains(&d) => Ok(Some(d as u32)),
        Some(d) => Err(AppError::InvalidInput(format!(
            "repeat_after_days {d} must be within 0..={MAX_REPEAT_AFTER_DAYS}"
        ))),
    }
}

#[derive(Debug, Deserialize)]
pub struct ImportFoodRequest {
    pub catalog_id: Uuid,
}

/// Comma-separated filter values, plus an optional `(after_name, after_id)` cursor.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogParams {
    pub food_types: Option<String>,
    pub cuisines: Option<String>,
    pub after_name: Option<String>,
    pub after_id: Option<Uuid>,
    pub limit: Option<u32>,
}

impl CatalogParams {
    pub fn food_types(&self) -> AppResult<BTreeSet<FoodType>> {
        split(self.food_types.as_deref())
            .map(|s| {
                FoodType::parse(s)
                    .ok_or_else(|| AppError::InvalidInput(format!("unknown food type {s}")))
            })
            .collect()
    }

    pub fn cuisines(&self) -> BTreeSet<String> {
        split(self.cuisines.as_deref()).map(str::to_string).collect()
    }

    pub fn cursor(&self) -> AppResult<Option<CatalogCursor>> {
        match (&self.after_name, self.after_id) {
            (Some(name), Some(id)) => Ok(Some(CatalogCursor {
                name: name.clone(),
                id,
            })),
            (None, None) => Ok(None),
            _ => Err(AppError::InvalidInput(
                "after_name and after_id go together".into(),
            )),
        }
    }
}

fn split(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Serialize)]
pub struct CursorDto {
    pub after_name: String,
    pub after_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CatalogPageResponse {
    pub items: Vec<CatalogFoodItem>,
    pub next: Option<CursorDto>,
    pub has_more: bool,
    pub truncated: Vec<FilterTruncation>,
}

impl CatalogPageResponse {
    pub fn new(page: CatalogPage, truncated: Vec<FilterTruncation>) -> Self {
        Self {
            items: page.items,
            next: page.next_cursor.map(|c| CursorDto {
                after_name: c.name,
                after_id: c.id,
            }),
            has_more: page.has_more,
            truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn create_trims_name_and_rejects_blank() {
        let req: CreateFoodRequest = serde_json::from_str(
            r#"{"name":"  Poha ","food_type":"Veg","eating_types":["Breakfast"]}"#,
        )
        .unwrap();
        assert_eq!(req.into_new().unwrap().name, "Poha");

        let blank: CreateFoodRequest = serde_json::from_str(
            r#"{"name":"   ","food_type":"Veg","eating_types":["Breakfast"]}"#,
        )
        .unwrap();
        assert!(matches!(blank.into_new(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn create_rejects_negative_repeat_and_empty_eating_types() {
        let negative: CreateFoodRequest = serde_json::from_str(
            r#"{"name":"Idli","food_type":"Veg","eating_types":["Breakfast"],"repeat_after_days":-1}"#,
        )
        .unwrap();
        assert!(matches!(negative.into_new(), Err(AppError::InvalidInput(_))));

        let none: CreateFoodRequest =
            serde_json::from_str(r#"{"name":"Idli","food_type":"Veg","eating_types":[]}"#)
                .unwrap();
        assert!(matches!(none.into_new(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn patch_tells_null_from_absent() {
        let req: PatchFoodRequest = serde_json::from_str(
            r#"{"last_consumption_date":null,"repeat_after_days":4}"#,
        )
        .unwrap();
        let patch = req.into_patch().unwrap();
        assert_eq!(patch.last_consumption_date, Some(None));
        assert_eq!(patch.repeat_after_days, Some(Some(4)));
        assert!(patch.name.is_none());

        let req: PatchFoodRequest =
            serde_json::from_str(r#"{"last_consumption_date":"01/01/2024"}"#).unwrap();
        let patch = req.into_patch().unwrap();
        assert_eq!(patch.last_consumption_date, Some(Some(date!(2024 - 01 - 01))));
        assert_eq!(patch.repeat_after_days, None);
    }

    #[test]
    fn catalog_params_parse_lists_and_cursor() {
        let params = CatalogParams {
            food_types: Some("Veg, Vegan".into()),
            cuisines: Some("Punjabi,,Bengali".into()),
            ..Default::default()
        };
        assert_eq!(
            params.food_types().unwrap(),
            BTreeSet::from([FoodType::Veg, FoodType::Vegan])
        );
        assert_eq!(params.cuisines().len(), 2);
        assert_eq!(params.cursor().unwrap(), None);

        let half = CatalogParams {
            after_name: Some("Dosa".into()),
            ..Default::default()
        };
        assert!(half.cursor().is_err());

        let bad = CatalogParams {
            food_types: Some("Fish".into()),
            ..Default::default()
        };
        assert!(bad.food_types().is_err());
    }
}
