use std::collections::BTreeSet;

use serde::Serialize;

use crate::config::MealHours;
use crate::foods::model::EatingType;

/// The three meals a clock hour can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl From<MealType> for EatingType {
    fn from(meal: MealType) -> Self {
        match meal {
            MealType::Breakfast => EatingType::Breakfast,
            MealType::Lunch => EatingType::Lunch,
            MealType::Dinner => EatingType::Dinner,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Greeting {
    Morning,
    Afternoon,
    Evening,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MealContext {
    pub meal: MealType,
    pub greeting: Greeting,
    pub default_eating_types: BTreeSet<EatingType>,
}

pub fn resolve_meal_context(hour: u8, hours: &MealHours) -> MealContext {
    let (meal, greeting) = if (hours.breakfast..hours.lunch).contains(&hour) {
        (MealType::Breakfast, Greeting::Morning)
    } else if (hours.lunch..hours.dinner).contains(&hour) {
        (MealType::Lunch, Greeting::Afternoon)
    } else {
        (MealType::Dinner, Greeting::Evening)
    };
    MealContext {
        meal,
        greeting,
        default_eating_types: BTreeSet::from([meal.into()]),
    }
}

/// The meal filter in force: an explicit choice always beats the default.
pub fn effective_eating_types<'a>(
    explicit: Option<&'a BTreeSet<EatingType>>,
    context: &'a MealContext,
) -> &'a BTreeSet<EatingType> {
    explicit.unwrap_or(&context.default_eating_types)
}
