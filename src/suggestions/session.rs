//! Suggestion session as an explicit state machine.
//!
//! A session never mutates in place: [`SuggestionSession::apply`] takes an
//! event and returns a [`Step`] holding the next session, at most one fetch
//! the driver should run, and any one-shot notices for the caller.
//!
//! Every fetch effect carries the session generation (and, for catalog pages,
//! the cursor it was issued from). Completions that do not match the current
//! generation and cursor are stale and dropped.

use std::collections::BTreeSet;

use rand::Rng;
use serde::Serialize;
use time::Date;
use tracing::debug;
use uuid::Uuid;

use super::eligibility::due_items;
use super::meal_context::{effective_eating_types, resolve_meal_context, Greeting, MealContext, MealType};
use super::paginator::{CatalogFilter, CatalogPage, FilterTruncation};
use super::selector::{owned_names, select_sample};
use crate::config::SuggestionConfig;
use crate::error::{AppError, AppResult};
use crate::foods::model::{
    date_format, CatalogFoodItem, EatingType, PersonalFoodItem, UserKey, UserPreferences,
};
use crate::foods::store::CatalogCursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Loading,
    Ready,
    LoadingMore,
}

/// One-shot notification for whoever drove the transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    FilterTruncated(FilterTruncation),
    FetchFailed { message: String },
    /// A personal food changed; views listing personal foods should reload.
    FoodsChanged { food_id: Uuid },
}

/// A catalog page fetch as issued by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub generation: u64,
    pub filter: CatalogFilter,
    pub cursor: Option<CatalogCursor>,
    pub page_size: u32,
}

/// Work the driver must perform and feed back as an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FetchPreferences { generation: u64 },
    FetchPersonal { generation: u64 },
    FetchPage(PageRequest),
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Start,
    PreferencesLoaded {
        generation: u64,
        preferences: UserPreferences,
    },
    PersonalLoaded {
        generation: u64,
        items: Vec<PersonalFoodItem>,
    },
    PageLoaded {
        request: PageRequest,
        page: CatalogPage,
    },
    /// `request` is set when the failed fetch was a catalog page.
    FetchFailed {
        generation: u64,
        request: Option<PageRequest>,
        message: String,
    },
    LoadMoreRequested,
    /// `None` drops the explicit choice and falls back to the clock default.
    MealFilterChanged(Option<BTreeSet<EatingType>>),
    PreferencesChanged(UserPreferences),
    ConsumptionConfirmed {
        food_id: Uuid,
        date: Date,
    },
}

#[derive(Debug, Clone)]
pub struct Step {
    pub session: SuggestionSession,
    pub effect: Option<Effect>,
    pub notices: Vec<Notice>,
}

#[derive(Debug, Clone)]
pub struct SuggestionSession {
    id: Uuid,
    user: UserKey,
    config: SuggestionConfig,
    today: Date,
    context: MealContext,
    explicit_meal: Option<BTreeSet<EatingType>>,
    preferences: Option<UserPreferences>,
    filter: CatalogFilter,
    personal: Vec<PersonalFoodItem>,
    catalog: Vec<CatalogFoodItem>,
    cursor: Option<CatalogCursor>,
    has_more: bool,
    generation: u64,
    state: SessionState,
    /// Filter notices held back until a load under the new filter succeeds.
    pending: Vec<Notice>,
}

/// What the caller gets to see: due personal foods and the catalog sample,
/// both narrowed to the meal filter in force.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionResult {
    pub session_id: Uuid,
    pub state: SessionState,
    pub meal: MealType,
    pub greeting: Greeting,
    pub eating_types: BTreeSet<EatingType>,
    #[serde(serialize_with = "date_format::serialize")]
    pub today: Date,
    pub due: Vec<PersonalFoodItem>,
    pub catalog: Vec<CatalogFoodItem>,
    pub has_more: bool,
}

impl SuggestionSession {
    pub fn new(
        user: UserKey,
        today: Date,
        hour: u8,
        explicit_meal: Option<BTreeSet<EatingType>>,
        config: SuggestionConfig,
    ) -> Self {
        let context = resolve_meal_context(hour, &config.meal_hours);
        Self {
            id: Uuid::new_v4(),
            user,
            today,
            context,
            explicit_meal,
            preferences: None,
            filter: CatalogFilter::default(),
            personal: Vec::new(),
            catalog: Vec::new(),
            cursor: None,
            has_more: false,
            generation: 0,
            state: SessionState::Idle,
            pending: Vec::new(),
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user(&self) -> &UserKey {
        &self.user
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn today(&self) -> Date {
        self.today
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cursor(&self) -> Option<&CatalogCursor> {
        self.cursor.as_ref()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn preferences(&self) -> Option<&UserPreferences> {
        self.preferences.as_ref()
    }

    /// Accumulated catalog sample, before meal filtering.
    pub fn catalog(&self) -> &[CatalogFoodItem] {
        &self.catalog
    }

    pub fn personal(&self) -> &[PersonalFoodItem] {
        &self.personal
    }

    pub fn result(&self) -> SuggestionResult {
        let eating_types = effective_eating_types(self.explicit_meal.as_ref(), &self.context);
        let owned = owned_names(&self.personal);
        let due = due_items(
            self.personal.iter().filter(|item| item.served_at(eating_types)),
            self.today,
        );
        let catalog = self
            .catalog
            .iter()
            .filter(|item| item.served_at(eating_types) && !owned.contains(&item.name))
            .cloned()
            .collect();

        SuggestionResult {
            session_id: self.id,
            state: self.state,
            meal: self.context.meal,
            greeting: self.context.greeting,
            eating_types: eating_types.clone(),
            today: self.today,
            due,
            catalog,
            has_more: self.has_more,
        }
    }

    /// Computes the transition for `event`.
    ///
    /// Only requests that make no sense in the current state are errors
    /// (`Conflict`); stale completions are dropped silently.
    pub fn apply<R>(&self, event: SessionEvent, rng: &mut R) -> AppResult<Step>
    where
        R: Rng + ?Sized,
    {
        match event {
            SessionEvent::Start => self.start(),
            SessionEvent::PreferencesLoaded {
                generation,
                preferences,
            } => Ok(self.preferences_loaded(generation, preferences)),
            SessionEvent::PersonalLoaded { generation, items } => {
                Ok(self.personal_loaded(generation, items))
            }
            SessionEvent::PageLoaded { request, page } => Ok(self.page_loaded(request, page, rng)),
            SessionEvent::FetchFailed {
                generation,
                request,
                message,
            } => Ok(self.fetch_failed(generation, request, message)),
            SessionEvent::LoadMoreRequested => self.load_more(),
            SessionEvent::MealFilterChanged(eating_types) => {
                let mut next = self.clone();
                next.explicit_meal = eating_types;
                Ok(next.settle(None, Vec::new()))
            }
            SessionEvent::PreferencesChanged(preferences) => Ok(self.reset(preferences)),
            SessionEvent::ConsumptionConfirmed { food_id, date } => {
                let mut next = self.clone();
                if let Some(item) = next.personal.iter_mut().find(|i| i.id == food_id) {
                    item.last_consumption_date = Some(date);
                }
                let notices = vec![Notice::FoodsChanged { food_id }];
                if next.state == SessionState::Loading {
                    // The personal list in flight may predate the write.
                    next.generation += 1;
                    let effect = next.first_fetch();
                    return Ok(next.settle(Some(effect), notices));
                }
                Ok(next.settle(None, notices))
            }
        }
    }

    fn settle(self, effect: Option<Effect>, notices: Vec<Notice>) -> Step {
        Step {
            session: self,
            effect,
            notices,
        }
    }

    fn unchanged(&self) -> Step {
        self.clone().settle(None, Vec::new())
    }

    fn start(&self) -> AppResult<Step> {
        if self.state != SessionState::Idle {
            return Err(AppError::Conflict(format!(
                "session is {:?}, not idle",
                self.state
            )));
        }
        let mut next = self.clone();
        next.generation += 1;
        next.state = SessionState::Loading;
        let effect = next.first_fetch();
        Ok(next.settle(Some(effect), Vec::new()))
    }

    /// Known preferences are not fetched again.
    fn first_fetch(&self) -> Effect {
        if self.preferences.is_some() {
            Effect::FetchPersonal {
                generation: self.generation,
            }
        } else {
            Effect::FetchPreferences {
                generation: self.generation,
            }
        }
    }

    fn with_preferences(&mut self, preferences: UserPreferences) {
        let (filter, truncations) =
            CatalogFilter::from_preferences(&preferences, self.config.max_filter_values);
        self.filter = filter;
        self.preferences = Some(preferences);
        self.pending = truncations.into_iter().map(Notice::FilterTruncated).collect();
    }

    fn preferences_loaded(&self, generation: u64, preferences: UserPreferences) -> Step {
        if self.state != SessionState::Loading || generation != self.generation {
            debug!(session = %self.id, generation, "stale preferences dropped");
            return self.unchanged();
        }
        let mut next = self.clone();
        next.with_preferences(preferences);
        let effect = Effect::FetchPersonal {
            generation: next.generation,
        };
        next.settle(Some(effect), Vec::new())
    }

    fn personal_loaded(&self, generation: u64, items: Vec<PersonalFoodItem>) -> Step {
        if self.state != SessionState::Loading || generation != self.generation {
            debug!(session = %self.id, generation, "stale personal foods dropped");
            return self.unchanged();
        }
        let mut next = self.clone();
        next.personal = items;
        let request = next.page_request();
        next.settle(Some(Effect::FetchPage(request)), Vec::new())
    }

    fn page_request(&self) -> PageRequest {
        PageRequest {
            generation: self.generation,
            filter: self.filter.clone(),
            cursor: self.cursor.clone(),
            page_size: self.config.page_size,
        }
    }

    fn awaits(&self, request: &PageRequest) -> bool {
        matches!(self.state, SessionState::Loading | SessionState::LoadingMore)
            && request.generation == self.generation
            && request.cursor == self.cursor
    }

    fn page_loaded<R>(&self, request: PageRequest, page: CatalogPage, rng: &mut R) -> Step
    where
        R: Rng + ?Sized,
    {
        if !self.awaits(&request) {
            debug!(
                session = %self.id,
                generation = request.generation,
                "stale catalog page dropped"
            );
            return self.unchanged();
        }
        let mut next = self.clone();
        let owned = owned_names(&next.personal);
        let sample = select_sample(&page.items, &owned, next.config.sample_size, rng);
        debug!(
            session = %next.id,
            fetched = page.items.len(),
            sampled = sample.len(),
            "catalog page sampled"
        );
        next.catalog.extend(sample);
        // An empty page carries no cursor; keep the old one so it never regresses.
        if let Some(cursor) = page.next_cursor {
            next.cursor = Some(cursor);
        }
        next.has_more = page.has_more;
        next.state = SessionState::Ready;
        let notices = std::mem::take(&mut next.pending);
        next.settle(None, notices)
    }

    fn fetch_failed(
        &self,
        generation: u64,
        request: Option<PageRequest>,
        message: String,
    ) -> Step {
        let current = match &request {
            Some(request) => self.awaits(request),
            None => self.state == SessionState::Loading && generation == self.generation,
        };
        if !current {
            debug!(session = %self.id, generation, "stale fetch failure dropped");
            return self.unchanged();
        }
        let mut next = self.clone();
        next.state = match self.state {
            SessionState::LoadingMore => SessionState::Ready,
            _ => SessionState::Idle,
        };
        next.settle(None, vec![Notice::FetchFailed { message }])
    }

    fn load_more(&self) -> AppResult<Step> {
        match self.state {
            SessionState::Ready if self.has_more => {
                let mut next = self.clone();
                next.state = SessionState::LoadingMore;
                let request = next.page_request();
                Ok(next.settle(Some(Effect::FetchPage(request)), Vec::new()))
            }
            SessionState::Ready => Ok(self.unchanged()),
            SessionState::LoadingMore => Err(AppError::Conflict(
                "load more already in progress".into(),
            )),
            SessionState::Idle | SessionState::Loading => Err(AppError::Conflict(format!(
                "session is {:?}, not ready",
                self.state
            ))),
        }
    }

    /// New food-type/cuisine filters invalidate the cursor and everything
    /// sampled so far. Personal foods are reloaded; preferences are not.
    fn reset(&self, preferences: UserPreferences) -> Step {
        let mut next = self.clone();
        next.with_preferences(preferences);
        next.generation += 1;
        next.catalog.clear();
        next.cursor = None;
        next.has_more = false;
        next.state = SessionState::Loading;
        let effect = Effect::FetchPersonal {
            generation: next.generation,
        };
        next.settle(Some(effect), Vec::new())
    }
}
