use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use time::Date;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::paginator::fetch_page;
use super::session::{
    Effect, Notice, SessionEvent, SessionState, SuggestionResult, SuggestionSession,
};
use crate::config::SuggestionConfig;
use crate::error::{AppError, AppResult};
use crate::foods::model::{EatingType, PersonalFoodPatch, UserKey, UserPreferences};
use crate::foods::store::FoodStore;

struct Slot {
    session: SuggestionSession,
    touched: Instant,
}

struct Registry {
    sessions: HashMap<Uuid, Slot>,
    rng: StdRng,
    ttl: Duration,
}

impl Registry {
    fn owned(&self, user: &UserKey, id: Uuid) -> AppResult<&SuggestionSession> {
        self.sessions
            .get(&id)
            .map(|slot| &slot.session)
            .filter(|s| s.user() == user)
            .ok_or_else(|| AppError::NotFound(format!("session {id}")))
    }

    /// Drops sessions nobody has touched within the TTL, except `keep`.
    fn evict_idle(&mut self, now: Instant, keep: Uuid) {
        let ttl = self.ttl;
        let before = self.sessions.len();
        self.sessions.retain(|id, slot| {
            *id == keep || now.saturating_duration_since(slot.touched) <= ttl
        });
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            info!(evicted, live = self.sessions.len(), "idle suggestion sessions evicted");
        }
    }
}

/// Result of one session call plus the notices it produced.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub result: SuggestionResult,
    pub notices: Vec<Notice>,
}

struct Outcome {
    view: SessionView,
    /// Set when a fetch failed during this call.
    failure: Option<String>,
}

impl Outcome {
    fn into_result(self) -> AppResult<SessionView> {
        match self.failure {
            Some(message) => Err(AppError::TransientFetch(message)),
            None => Ok(self.view),
        }
    }
}

/// Owns the live sessions and runs their fetch effects against the store.
///
/// The registry lock is only held while a transition is computed, never
/// across a store call.
#[derive(Clone)]
pub struct SuggestionService {
    store: Arc<dyn FoodStore>,
    config: SuggestionConfig,
    registry: Arc<Mutex<Registry>>,
}

impl SuggestionService {
    pub fn new(store: Arc<dyn FoodStore>, config: SuggestionConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let ttl = Duration::from_secs(config.session_ttl_secs);
        Self {
            store,
            config,
            registry: Arc::new(Mutex::new(Registry {
                sessions: HashMap::new(),
                rng,
                ttl,
            })),
        }
    }

    pub fn config(&self) -> &SuggestionConfig {
        &self.config
    }

    pub async fn start(
        &self,
        user: &UserKey,
        today: Date,
        hour: u8,
        eating_types: Option<BTreeSet<EatingType>>,
    ) -> AppResult<SessionView> {
        let session =
            SuggestionSession::new(user.clone(), today, hour, eating_types, self.config.clone());
        let id = session.id();
        {
            let mut registry = self.registry.lock().await;
            let now = Instant::now();
            registry.evict_idle(now, id);
            registry.sessions.insert(
                id,
                Slot {
                    session,
                    touched: now,
                },
            );
        }
        info!(session = %id, %user, "suggestion session started");

        match self
            .drive(user, id, SessionEvent::Start)
            .await
            .and_then(Outcome::into_result)
        {
            Err(AppError::TransientFetch(message)) => {
                // Nothing was shown yet; the caller simply starts over.
                self.registry.lock().await.sessions.remove(&id);
                Err(AppError::TransientFetch(message))
            }
            other => other,
        }
    }

    pub async fn result(&self, user: &UserKey, id: Uuid) -> AppResult<SuggestionResult> {
        let registry = self.registry.lock().await;
        Ok(registry.owned(user, id)?.result())
    }

    pub async fn load_more(&self, user: &UserKey, id: Uuid) -> AppResult<SessionView> {
        self.drive(user, id, SessionEvent::LoadMoreRequested)
            .await?
            .into_result()
    }

    pub async fn retry(&self, user: &UserKey, id: Uuid) -> AppResult<SessionView> {
        self.drive(user, id, SessionEvent::Start).await?.into_result()
    }

    pub async fn change_meal(
        &self,
        user: &UserKey,
        id: Uuid,
        eating_types: Option<BTreeSet<EatingType>>,
    ) -> AppResult<SessionView> {
        self.drive(user, id, SessionEvent::MealFilterChanged(eating_types))
            .await?
            .into_result()
    }

    pub async fn change_filters(
        &self,
        user: &UserKey,
        id: Uuid,
        preferences: UserPreferences,
    ) -> AppResult<SessionView> {
        self.drive(user, id, SessionEvent::PreferencesChanged(preferences))
            .await?
            .into_result()
    }

    /// Marks a personal food as eaten today. The session only learns about
    /// it once the store accepted the write.
    ///
    /// Only a loaded session accepts this. If a reload starts while the write
    /// is in flight, the session reloads personal foods again; a failure of
    /// that reload is reported as a notice since the write itself succeeded.
    pub async fn confirm_consumption(
        &self,
        user: &UserKey,
        id: Uuid,
        food_id: Uuid,
    ) -> AppResult<SessionView> {
        let today = {
            let registry = self.registry.lock().await;
            let session = registry.owned(user, id)?;
            if !matches!(
                session.state(),
                SessionState::Ready | SessionState::LoadingMore
            ) {
                return Err(AppError::Conflict(format!(
                    "session is {:?}, not ready",
                    session.state()
                )));
            }
            session.today()
        };

        let updated = self
            .store
            .update_personal(user, food_id, &PersonalFoodPatch::consumed_on(today))
            .await
            .map_err(|e| {
                warn!(error = %e, session = %id, %food_id, "consumption write failed");
                AppError::WriteConflict(e.to_string())
            })?;
        if updated.is_none() {
            return Err(AppError::NotFound(format!("food {food_id}")));
        }

        let outcome = self
            .drive(
                user,
                id,
                SessionEvent::ConsumptionConfirmed {
                    food_id,
                    date: today,
                },
            )
            .await?;
        Ok(outcome.view)
    }

    pub async fn dispose(&self, user: &UserKey, id: Uuid) -> AppResult<()> {
        let mut registry = self.registry.lock().await;
        registry.owned(user, id)?;
        registry.sessions.remove(&id);
        info!(session = %id, %user, "suggestion session disposed");
        Ok(())
    }

    /// Feeds `event` to the session and keeps running effects until it
    /// settles. A fetch failure accepted by the session is recorded in the
    /// outcome once the session is back in a stable state.
    async fn drive(&self, user: &UserKey, id: Uuid, event: SessionEvent) -> AppResult<Outcome> {
        let mut notices = Vec::new();
        let mut effect = self.transition(user, id, event, &mut notices, false).await?;

        while let Some(next) = effect {
            let completion = self.run(user, next).await;
            effect = self
                .transition(user, id, completion, &mut notices, true)
                .await?;
        }

        let failure = notices.iter().find_map(|n| match n {
            Notice::FetchFailed { message } => Some(message.clone()),
            _ => None,
        });
        let result = self.result(user, id).await?;
        Ok(Outcome {
            view: SessionView { result, notices },
            failure,
        })
    }

    async fn transition(
        &self,
        user: &UserKey,
        id: Uuid,
        event: SessionEvent,
        notices: &mut Vec<Notice>,
        completion: bool,
    ) -> AppResult<Option<Effect>> {
        let mut registry = self.registry.lock().await;
        let now = Instant::now();
        if !completion {
            registry.evict_idle(now, id);
        }
        let Registry { sessions, rng, .. } = &mut *registry;

        let slot = match sessions.get_mut(&id) {
            Some(slot) if slot.session.user() == user => slot,
            None if completion => {
                debug!(session = %id, "session gone mid-fetch; completion ignored");
                return Ok(None);
            }
            _ => return Err(AppError::NotFound(format!("session {id}"))),
        };

        let step = slot.session.apply(event, rng)?;
        notices.extend(step.notices);
        slot.session = step.session;
        slot.touched = now;
        Ok(step.effect)
    }

    async fn run(&self, user: &UserKey, effect: Effect) -> SessionEvent {
        match effect {
            Effect::FetchPreferences { generation } => match self.store.preferences(user).await {
                Ok(preferences) => SessionEvent::PreferencesLoaded {
                    generation,
                    preferences: preferences.unwrap_or_default(),
                },
                Err(e) => {
                    warn!(error = %e, %user, "preferences fetch failed");
                    SessionEvent::FetchFailed {
                        generation,
                        request: None,
                        message: e.to_string(),
                    }
                }
            },
            Effect::FetchPersonal { generation } => match self.store.list_personal(user).await {
                Ok(items) => SessionEvent::PersonalLoaded { generation, items },
                Err(e) => {
                    warn!(error = %e, %user, "personal foods fetch failed");
                    SessionEvent::FetchFailed {
                        generation,
                        request: None,
                        message: e.to_string(),
                    }
                }
            },
            Effect::FetchPage(request) => {
                match fetch_page(
                    self.store.as_ref(),
                    &request.filter,
                    request.cursor.as_ref(),
                    request.page_size,
                )
                .await
                {
                    Ok(page) => SessionEvent::PageLoaded { request, page },
                    Err(e) => SessionEvent::FetchFailed {
                        generation: request.generation,
                        request: Some(request),
                        message: e.to_string(),
                    },
                }
            }
        }
    }
}
