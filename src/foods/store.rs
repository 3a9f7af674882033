use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::model::{
    CatalogFoodItem, FoodType, NewPersonalFood, PersonalFoodItem, PersonalFoodPatch, UserKey,
    UserPreferences,
};

/// Position in the catalog ordering `(name, id)`; the last item of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogCursor {
    pub name: String,
    pub id: Uuid,
}

impl CatalogCursor {
    pub fn of(item: &CatalogFoodItem) -> Self {
        Self {
            name: item.name.clone(),
            id: item.id,
        }
    }

    fn cmp_item(&self, item: &CatalogFoodItem) -> Ordering {
        (self.name.as_str(), self.id).cmp(&(item.name.as_str(), item.id))
    }
}

/// One catalog query as issued to the store.
///
/// `food_types` is an "in" clause and `cuisines` an "array-contains-any"
/// clause; an empty list means the clause is omitted. Callers keep both
/// lists within the provider's cardinality cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub food_types: Vec<FoodType>,
    pub cuisines: Vec<String>,
    pub after: Option<CatalogCursor>,
    pub limit: u32,
}

impl CatalogQuery {
    pub fn matches(&self, item: &CatalogFoodItem) -> bool {
        let type_ok = self.food_types.is_empty() || self.food_types.contains(&item.food_type);
        let cuisine_ok =
            self.cuisines.is_empty() || self.cuisines.iter().any(|c| item.cuisines.contains(c));
        type_ok && cuisine_ok
    }
}

/// A user already owns a personal food with this name.
#[derive(Debug, thiserror::Error)]
#[error("{0} is already in the personal list")]
pub struct DuplicateName(pub String);

/// Document-store contract the suggestion engine depends on.
///
/// `add_personal` and `update_personal` fail with [`DuplicateName`] when the
/// name is taken by another of the user's foods.
#[async_trait]
pub trait FoodStore: Send + Sync {
    async fn preferences(&self, user: &UserKey) -> anyhow::Result<Option<UserPreferences>>;
    async fn save_preferences(&self, user: &UserKey, prefs: &UserPreferences) -> anyhow::Result<()>;

    async fn list_personal(&self, user: &UserKey) -> anyhow::Result<Vec<PersonalFoodItem>>;
    async fn get_personal(&self, user: &UserKey, id: Uuid)
        -> anyhow::Result<Option<PersonalFoodItem>>;
    async fn add_personal(
        &self,
        user: &UserKey,
        food: NewPersonalFood,
    ) -> anyhow::Result<PersonalFoodItem>;
    async fn update_personal(
        &self,
        user: &UserKey,
        id: Uuid,
        patch: &PersonalFoodPatch,
    ) -> anyhow::Result<Option<PersonalFoodItem>>;

    async fn query_catalog(&self, query: &CatalogQuery) -> anyhow::Result<Vec<CatalogFoodItem>>;
    async fn get_catalog(&self, id: Uuid) -> anyhow::Result<Option<CatalogFoodItem>>;
}

#[derive(Default)]
struct MemoryInner {
    preferences: HashMap<UserKey, UserPreferences>,
    personal: HashMap<UserKey, Vec<PersonalFoodItem>>,
    catalog: Vec<CatalogFoodItem>,
}

/// In-process store used by tests and local runs without Postgres.
///
/// Rejects catalog queries whose clauses exceed `max_filter_values`, like the
/// hosted provider does.
pub struct MemoryFoodStore {
    inner: RwLock<MemoryInner>,
    max_filter_values: usize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryFoodStore {
    pub fn new(max_filter_values: usize) -> Self {
        Self {
            inner: RwLock::new(MemoryInner::default()),
            max_filter_values,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn with_catalog(max_filter_values: usize, mut catalog: Vec<CatalogFoodItem>) -> Self {
        catalog.sort_by(|a, b| (a.name.as_str(), a.id).cmp(&(b.name.as_str(), b.id)));
        Self {
            inner: RwLock::new(MemoryInner {
                catalog,
                ..MemoryInner::default()
            }),
            ..Self::new(max_filter_values)
        }
    }

    /// Makes every read fail until switched off again.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, AtomicOrdering::SeqCst);
    }

    pub async fn seed_personal(&self, user: &UserKey, items: Vec<PersonalFoodItem>) {
        self.inner
            .write()
            .await
            .personal
            .entry(user.clone())
            .or_default()
            .extend(items);
    }

    fn check_read(&self) -> anyhow::Result<()> {
        if self.fail_reads.load(AtomicOrdering::SeqCst) {
            anyhow::bail!("store unavailable");
        }
        Ok(())
    }

    fn check_write(&self) -> anyhow::Result<()> {
        if self.fail_writes.load(AtomicOrdering::SeqCst) {
            anyhow::bail!("store rejected write");
        }
        Ok(())
    }
}

#[async_trait]
impl FoodStore for MemoryFoodStore {
    async fn preferences(&self, user: &UserKey) -> anyhow::Result<Option<UserPreferences>> {
        self.check_read()?;
        Ok(self.inner.read().await.preferences.get(user).cloned())
    }

    async fn save_preferences(&self, user: &UserKey, prefs: &UserPreferences) -> anyhow::Result<()> {
        self.check_write()?;
        self.inner
            .write()
            .await
            .preferences
            .insert(user.clone(), prefs.clone());
        Ok(())
    }

    async fn list_personal(&self, user: &UserKey) -> anyhow::Result<Vec<PersonalFoodItem>> {
        self.check_read()?;
        Ok(self
            .inner
            .read()
            .await
            .personal
            .get(user)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_personal(
        &self,
        user: &UserKey,
        id: Uuid,
    ) -> anyhow::Result<Option<PersonalFoodItem>> {
        self.check_read()?;
        Ok(self
            .inner
            .read()
            .await
            .personal
            .get(user)
            .and_then(|items| items.iter().find(|i| i.id == id).cloned()))
    }

    async fn add_personal(
        &self,
        user: &UserKey,
        food: NewPersonalFood,
    ) -> anyhow::Result<PersonalFoodItem> {
        self.check_write()?;
        let mut inner = self.inner.write().await;
        let items = inner.personal.entry(user.clone()).or_default();
        if items.iter().any(|i| i.name == food.name) {
            return Err(DuplicateName(food.name).into());
        }
        let item = PersonalFoodItem {
            id: Uuid::new_v4(),
            name: food.name,
            food_type: food.food_type,
            eating_types: food.eating_types,
            last_consumption_date: food.last_consumption_date,
            repeat_after_days: food.repeat_after_days,
        };
        items.push(item.clone());
        Ok(item)
    }

    async fn update_personal(
        &self,
        user: &UserKey,
        id: Uuid,
        patch: &PersonalFoodPatch,
    ) -> anyhow::Result<Option<PersonalFoodItem>> {
        self.check_write()?;
        let mut inner = self.inner.write().await;
        let Some(items) = inner.personal.get_mut(user) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            if items.iter().any(|i| i.id != id && &i.name == name) {
                return Err(DuplicateName(name.clone()).into());
            }
        }
        let Some(item) = items.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        patch.apply_to(item);
        Ok(Some(item.clone()))
    }

    async fn query_catalog(&self, query: &CatalogQuery) -> anyhow::Result<Vec<CatalogFoodItem>> {
        self.check_read()?;
        anyhow::ensure!(
            query.food_types.len() <= self.max_filter_values,
            "'in' filter supports up to {} values",
            self.max_filter_values
        );
        anyhow::ensure!(
            query.cuisines.len() <= self.max_filter_values,
            "'array-contains-any' filter supports up to {} values",
            self.max_filter_values
        );

        let inner = self.inner.read().await;
        let page = inner
            .catalog
            .iter()
            .filter(|item| {
                query
                    .after
                    .as_ref()
                    .map_or(true, |c| c.cmp_item(item) == Ordering::Less)
            })
            .filter(|item| query.matches(item))
            .take(query.limit as usize)
            .cloned()
            .collect();
        Ok(page)
    }

    async fn get_catalog(&self, id: Uuid) -> anyhow::Result<Option<CatalogFoodItem>> {
        self.check_read()?;
        Ok(self
            .inner
            .read()
            .await
            .catalog
            .iter()
            .find(|i| i.id == id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foods::model::EatingType;
    use std::collections::BTreeSet;

    fn dish(name: &str, food_type: FoodType, cuisines: &[&str]) -> CatalogFoodItem {
        CatalogFoodItem {
            id: Uuid::new_v4(),
            name: name.into(),
            food_type,
            eating_types: BTreeSet::from([EatingType::Lunch]),
            cuisines: cuisines.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn store() -> MemoryFoodStore {
        MemoryFoodStore::with_catalog(
            10,
            vec![
                dish("Biryani", FoodType::NonVeg, &["Hyderabadi", "Mughlai"]),
                dish("Dal Makhani", FoodType::Veg, &["Punjabi"]),
                dish("Egg Curry", FoodType::Eggy, &["Bengali"]),
                dish("Avial", FoodType::Vegan, &["Kerala"]),
            ],
        )
    }

    fn query(food_types: Vec<FoodType>, cuisines: &[&str]) -> CatalogQuery {
        CatalogQuery {
            food_types,
            cuisines: cuisines.iter().map(|c| c.to_string()).collect(),
            after: None,
            limit: 50,
        }
    }

    #[tokio::test]
    async fn unfiltered_query_returns_catalog_in_name_order() {
        let items = store().query_catalog(&query(vec![], &[])).await.unwrap();
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Avial", "Biryani", "Dal Makhani", "Egg Curry"]);
    }

    #[tokio::test]
    async fn both_dimensions_must_match_when_both_present() {
        let items = store()
            .query_catalog(&query(vec![FoodType::Veg], &["Punjabi", "Hyderabadi"]))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Dal Makhani");
    }

    #[tokio::test]
    async fn cursor_skips_everything_up_to_and_including_it() {
        let s = store();
        let first = s
            .query_catalog(&CatalogQuery {
                limit: 2,
                ..query(vec![], &[])
            })
            .await
            .unwrap();
        let next = s
            .query_catalog(&CatalogQuery {
                after: first.last().map(CatalogCursor::of),
                limit: 2,
                ..query(vec![], &[])
            })
            .await
            .unwrap();
        let names: Vec<_> = next.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["Dal Makhani", "Egg Curry"]);
    }

    #[tokio::test]
    async fn oversized_filter_is_rejected() {
        let cuisines: Vec<String> = (0..11).map(|i| format!("c{i}")).collect();
        let err = store()
            .query_catalog(&CatalogQuery {
                food_types: vec![],
                cuisines,
                after: None,
                limit: 10,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("up to 10"));
    }

    #[tokio::test]
    async fn update_unknown_food_returns_none() {
        let user = UserKey("a@b.c".into());
        let res = store()
            .update_personal(&user, Uuid::new_v4(), &PersonalFoodPatch::default())
            .await
            .unwrap();
        assert!(res.is_none());
    }

    fn new_food(name: &str) -> NewPersonalFood {
        NewPersonalFood {
            name: name.into(),
            food_type: FoodType::Veg,
            eating_types: BTreeSet::from([EatingType::Lunch]),
            last_consumption_date: None,
            repeat_after_days: None,
        }
    }

    #[tokio::test]
    async fn personal_names_are_unique_per_user() {
        let s = store();
        let cook = UserKey("cook@example.com".into());
        let guest = UserKey("guest@example.com".into());

        s.add_personal(&cook, new_food("Rajma")).await.unwrap();
        let err = s.add_personal(&cook, new_food("Rajma")).await.unwrap_err();
        assert!(err.downcast_ref::<DuplicateName>().is_some());
        s.add_personal(&guest, new_food("Rajma")).await.unwrap();

        let kadhi = s.add_personal(&cook, new_food("Kadhi")).await.unwrap();
        let rename = PersonalFoodPatch {
            name: Some("Rajma".into()),
            ..PersonalFoodPatch::default()
        };
        let err = s.update_personal(&cook, kadhi.id, &rename).await.unwrap_err();
        assert!(err.downcast_ref::<DuplicateName>().is_some());

        let keep_name = PersonalFoodPatch {
            name: Some("Kadhi".into()),
            ..PersonalFoodPatch::default()
        };
        assert!(s
            .update_personal(&cook, kadhi.id, &keep_name)
            .await
            .unwrap()
            .is_some());
    }
}
