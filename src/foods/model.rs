use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

time::serde::format_description!(day_month_year, Date, "[day]/[month]/[year]");

/// `dd/MM/yyyy` on the wire.
pub(crate) mod date_format {
    pub use super::day_month_year::serialize;
}

pub(crate) mod optional_date {
    pub use super::day_month_year::option::{deserialize, serialize};
}

/// Opaque user key handed to us by the identity provider (email-like).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserKey(pub String);

impl UserKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FoodType {
    Veg,
    NonVeg,
    Eggy,
    Vegan,
}

impl FoodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FoodType::Veg => "Veg",
            FoodType::NonVeg => "NonVeg",
            FoodType::Eggy => "Eggy",
            FoodType::Vegan => "Vegan",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Veg" => Some(FoodType::Veg),
            "NonVeg" => Some(FoodType::NonVeg),
            "Eggy" => Some(FoodType::Eggy),
            "Vegan" => Some(FoodType::Vegan),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EatingType {
    Breakfast,
    Lunch,
    Dinner,
    Snacks,
}

impl EatingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EatingType::Breakfast => "Breakfast",
            EatingType::Lunch => "Lunch",
            EatingType::Dinner => "Dinner",
            EatingType::Snacks => "Snacks",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Breakfast" => Some(EatingType::Breakfast),
            "Lunch" => Some(EatingType::Lunch),
            "Dinner" => Some(EatingType::Dinner),
            "Snacks" => Some(EatingType::Snacks),
            _ => None,
        }
    }
}

/// A dish the user has added to their own list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalFoodItem {
    pub id: Uuid,
    pub name: String,
    pub food_type: FoodType,
    pub eating_types: BTreeSet<EatingType>,
    /// `None` means the item was never eaten.
    #[serde(with = "optional_date", default)]
    pub last_consumption_date: Option<Date>,
    pub repeat_after_days: Option<u32>,
}

impl PersonalFoodItem {
    pub fn served_at(&self, eating_types: &BTreeSet<EatingType>) -> bool {
        !self.eating_types.is_disjoint(eating_types)
    }
}

/// Shared, read-only dish from the common catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFoodItem {
    pub id: Uuid,
    pub name: String,
    pub food_type: FoodType,
    pub eating_types: BTreeSet<EatingType>,
    pub cuisines: BTreeSet<String>,
}

impl CatalogFoodItem {
    pub fn served_at(&self, eating_types: &BTreeSet<EatingType>) -> bool {
        !self.eating_types.is_disjoint(eating_types)
    }
}

/// Empty sets mean "no restriction" on that dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default)]
    pub food_types: BTreeSet<FoodType>,
    #[serde(default)]
    pub cuisines: BTreeSet<String>,
}

/// Input for creating a personal food, already validated.
#[derive(Debug, Clone)]
pub struct NewPersonalFood {
    pub name: String,
    pub food_type: FoodType,
    pub eating_types: BTreeSet<EatingType>,
    pub last_consumption_date: Option<Date>,
    pub repeat_after_days: Option<u32>,
}

impl From<&CatalogFoodItem> for NewPersonalFood {
    fn from(item: &CatalogFoodItem) -> Self {
        Self {
            name: item.name.clone(),
            food_type: item.food_type,
            eating_types: item.eating_types.clone(),
            last_consumption_date: None,
            repeat_after_days: None,
        }
    }
}

/// Partial update of a personal food. Outer `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct PersonalFoodPatch {
    pub name: Option<String>,
    pub food_type: Option<FoodType>,
    pub eating_types: Option<BTreeSet<EatingType>>,
    pub last_consumption_date: Option<Option<Date>>,
    pub repeat_after_days: Option<Option<u32>>,
}

impl PersonalFoodPatch {
    pub fn consumed_on(date: Date) -> Self {
        Self {
            last_consumption_date: Some(Some(date)),
            ..Self::default()
        }
    }

    pub fn apply_to(&self, item: &mut PersonalFoodItem) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(food_type) = self.food_type {
            item.food_type = food_type;
        }
        if let Some(eating_types) = &self.eating_types {
            item.eating_types = eating_types.clone();
        }
        if let Some(date) = self.last_consumption_date {
            item.last_consumption_date = date;
        }
        if let Some(days) = self.repeat_after_days {
            item.repeat_after_days = days;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn personal_item_uses_day_month_year_dates() {
        let item = PersonalFoodItem {
            id: Uuid::nil(),
            name: "Idli".into(),
            food_type: FoodType::Veg,
            eating_types: BTreeSet::from([EatingType::Breakfast]),
            last_consumption_date: Some(date!(2024 - 01 - 05)),
            repeat_after_days: Some(3),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["last_consumption_date"], "05/01/2024");
        assert_eq!(json["food_type"], "Veg");

        let back: PersonalFoodItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn missing_consumption_date_deserializes_as_never() {
        let item: PersonalFoodItem = serde_json::from_value(serde_json::json!({
            "id": Uuid::nil(),
            "name": "Poha",
            "food_type": "Vegan",
            "eating_types": ["Breakfast", "Snacks"],
            "repeat_after_days": null
        }))
        .unwrap();
        assert_eq!(item.last_consumption_date, None);
        assert_eq!(item.repeat_after_days, None);
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut item = PersonalFoodItem {
            id: Uuid::nil(),
            name: "Dosa".into(),
            food_type: FoodType::Veg,
            eating_types: BTreeSet::from([EatingType::Breakfast]),
            last_consumption_date: None,
            repeat_after_days: Some(2),
        };
        PersonalFoodPatch::consumed_on(date!(2024 - 03 - 10)).apply_to(&mut item);
        assert_eq!(item.last_consumption_date, Some(date!(2024 - 03 - 10)));
        assert_eq!(item.repeat_after_days, Some(2));
        assert_eq!(item.name, "Dosa");
    }

    #[test]
    fn enum_names_parse_back() {
        for t in [FoodType::Veg, FoodType::NonVeg, FoodType::Eggy, FoodType::Vegan] {
            assert_eq!(FoodType::parse(t.as_str()), Some(t));
        }
        assert_eq!(EatingType::parse("Snacks"), Some(EatingType::Snacks));
        assert_eq!(EatingType::parse("snacks"), None);
    }
}
