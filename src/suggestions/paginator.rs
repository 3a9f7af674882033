use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::foods::model::{CatalogFoodItem, FoodType, UserPreferences};
use crate::foods::store::{CatalogCursor, CatalogQuery, FoodStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterDimension {
    FoodTypes,
    Cuisines,
}

/// A filter clause was cut down to the provider's cardinality cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterTruncation {
    pub dimension: FilterDimension,
    pub supplied: usize,
    pub kept: usize,
}

/// Catalog filter that already fits the provider's per-clause cap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    food_types: Vec<FoodType>,
    cuisines: Vec<String>,
}

impl CatalogFilter {
    /// Builds the filter from user preferences, keeping at most `cap` values
    /// per dimension. Dropped values are reported, never treated as errors.
    pub fn from_preferences(prefs: &UserPreferences, cap: usize) -> (Self, Vec<FilterTruncation>) {
        let mut truncations = Vec::new();

        let food_types = truncate(
            prefs.food_types.iter().copied(),
            cap,
            FilterDimension::FoodTypes,
            &mut truncations,
        );
        let cuisines = truncate(
            prefs.cuisines.iter().cloned(),
            cap,
            FilterDimension::Cuisines,
            &mut truncations,
        );

        (Self { food_types, cuisines }, truncations)
    }

    pub fn food_types(&self) -> &[FoodType] {
        &self.food_types
    }

    pub fn cuisines(&self) -> &[String] {
        &self.cuisines
    }

    pub fn query(&self, after: Option<CatalogCursor>, page_size: u32) -> CatalogQuery {
        CatalogQuery {
            food_types: self.food_types.clone(),
            cuisines: self.cuisines.clone(),
            after,
            limit: page_size,
        }
    }
}

fn truncate<T>(
    values: impl ExactSizeIterator<Item = T>,
    cap: usize,
    dimension: FilterDimension,
    truncations: &mut Vec<FilterTruncation>,
) -> Vec<T> {
    let supplied = values.len();
    if supplied > cap {
        warn!(?dimension, supplied, kept = cap, "catalog filter truncated to provider limit");
        truncations.push(FilterTruncation {
            dimension,
            supplied,
            kept: cap,
        });
    }
    values.take(cap).collect()
}

/// One page of catalog results plus the position to continue from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPage {
    pub items: Vec<CatalogFoodItem>,
    pub next_cursor: Option<CatalogCursor>,
    pub has_more: bool,
}

impl CatalogPage {
    pub fn from_items(items: Vec<CatalogFoodItem>, page_size: u32) -> Self {
        let next_cursor = items.last().map(CatalogCursor::of);
        let has_more = items.len() == page_size as usize && next_cursor.is_some();
        Self {
            items,
            next_cursor,
            has_more,
        }
    }
}

/// Fetches the page following `cursor` (or the first page if `None`).
///
/// A store failure surfaces as [`AppError::TransientFetch`]; the caller's
/// cursor is not touched, so the same call can simply be retried.
pub async fn fetch_page(
    store: &dyn FoodStore,
    filter: &CatalogFilter,
    cursor: Option<&CatalogCursor>,
    page_size: u32,
) -> AppResult<CatalogPage> {
    let query = filter.query(cursor.cloned(), page_size);
    let items = store.query_catalog(&query).await.map_err(|e| {
        warn!(error = %e, "catalog page fetch failed");
        AppError::TransientFetch(e.to_string())
    })?;
    let page = CatalogPage::from_items(items, page_size);
    debug!(
        fetched = page.items.len(),
        has_more = page.has_more,
        "catalog page fetched"
    );
    Ok(page)
}
