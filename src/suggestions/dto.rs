use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::Date;

use super::session::{Notice, SuggestionResult};
use crate::error::{AppError, AppResult};
use crate::foods::model::{optional_date, EatingType};

/// Everything is optional; the server clock fills in `hour` and `today`.
#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    pub hour: Option<u8>,
    #[serde(with = "optional_date", default)]
    pub today: Option<Date>,
    pub eating_types: Option<BTreeSet<EatingType>>,
}

impl StartSessionRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(hour) = self.hour {
            if hour > 23 {
                return Err(AppError::InvalidInput(format!("hour {hour} is not 0..=23")));
            }
        }
        validate_eating_types(self.eating_types.as_ref())
    }
}

/// `null` falls back to the meal of the current hour.
#[derive(Debug, Deserialize)]
pub struct MealRequest {
    pub eating_types: Option<BTreeSet<EatingType>>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub result: SuggestionResult,
    pub notices: Vec<Notice>,
}

pub(crate) fn validate_eating_types(eating_types: Option<&BTreeSet<EatingType>>) -> AppResult<()> {
    match eating_types {
        Some(set) if set.is_empty() => Err(AppError::InvalidInput(
            "eating_types must not be empty; send null for the default".into(),
        )),
        _ => Ok(()),
    }
}
