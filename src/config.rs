use serde::Deserialize;

/// Largest catalog page a single query may ask for.
pub const MAX_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Start hour of each meal; anything outside [breakfast, dinner) is dinner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MealHours {
    pub breakfast: u8,
    pub lunch: u8,
    pub dinner: u8,
}

impl Default for MealHours {
    fn default() -> Self {
        Self {
            breakfast: 5,
            lunch: 12,
            dinner: 17,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestionConfig {
    pub meal_hours: MealHours,
    pub page_size: u32,
    pub sample_size: usize,
    /// Provider cap on distinct values per filter clause.
    pub max_filter_values: usize,
    /// Fixed sampling seed; random when unset.
    pub seed: Option<u64>,
    /// Sessions untouched for longer than this are dropped.
    pub session_ttl_secs: u64,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            meal_hours: MealHours::default(),
            page_size: 50,
            sample_size: 15,
            max_filter_values: 10,
            seed: None,
            session_ttl_secs: 30 * 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub suggestions: SuggestionConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl SuggestionConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let meal_hours = MealHours {
            breakfast: env_or("MEAL_BREAKFAST_HOUR", defaults.meal_hours.breakfast),
            lunch: env_or("MEAL_LUNCH_HOUR", defaults.meal_hours.lunch),
            dinner: env_or("MEAL_DINNER_HOUR", defaults.meal_hours.dinner),
        };
        anyhow::ensure!(
            meal_hours.breakfast <= meal_hours.lunch
                && meal_hours.lunch <= meal_hours.dinner
                && meal_hours.dinner <= 24,
            "meal hours must be ordered within a day: {meal_hours:?}"
        );

        let config = Self {
            meal_hours,
            page_size: env_or("CATALOG_PAGE_SIZE", defaults.page_size),
            sample_size: env_or("CATALOG_SAMPLE_SIZE", defaults.sample_size),
            max_filter_values: env_or("CATALOG_MAX_FILTER_VALUES", defaults.max_filter_values),
            seed: std::env::var("SUGGESTION_SEED")
                .ok()
                .and_then(|v| v.parse::<u64>().ok()),
            session_ttl_secs: env_or("SUGGESTION_SESSION_TTL_SECS", defaults.session_ttl_secs),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (1..=MAX_PAGE_SIZE).contains(&self.page_size),
            "CATALOG_PAGE_SIZE must be within 1..={MAX_PAGE_SIZE}"
        );
        anyhow::ensure!(
            self.max_filter_values > 0,
            "CATALOG_MAX_FILTER_VALUES must be positive"
        );
        anyhow::ensure!(
            self.session_ttl_secs > 0,
            "SUGGESTION_SESSION_TTL_SECS must be positive"
        );
        Ok(())
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "mealsuggest".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "mealsuggest-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60),
        };
        Ok(Self {
            database_url,
            jwt,
            suggestions: SuggestionConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let cfg = SuggestionConfig::default();
        assert_eq!(cfg.meal_hours, MealHours { breakfast: 5, lunch: 12, dinner: 17 });
        assert_eq!(cfg.page_size, 50);
        assert_eq!(cfg.sample_size, 15);
        assert_eq!(cfg.max_filter_values, 10);
        assert!(cfg.seed.is_none());
        assert_eq!(cfg.session_ttl_secs, 1800);
        cfg.validate().unwrap();
    }

    #[test]
    fn page_size_above_query_limit_is_rejected() {
        let cfg = SuggestionConfig {
            page_size: MAX_PAGE_SIZE + 1,
            ..SuggestionConfig::default()
        };
        assert!(cfg.validate().is_err());

        let at_limit = SuggestionConfig {
            page_size: MAX_PAGE_SIZE,
            ..SuggestionConfig::default()
        };
        at_limit.validate().unwrap();
    }

    #[test]
    fn env_or_falls_back_on_garbage() {
        std::env::set_var("MEALSUGGEST_TEST_PAGE_SIZE", "not-a-number");
        assert_eq!(env_or("MEALSUGGEST_TEST_PAGE_SIZE", 50u32), 50);
        std::env::set_var("MEALSUGGEST_TEST_PAGE_SIZE", "20");
        assert_eq!(env_or("MEALSUGGEST_TEST_PAGE_SIZE", 50u32), 20);
        std::env::remove_var("MEALSUGGEST_TEST_PAGE_SIZE");
    }
}
