use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::application::services::market_service::{
    BudgetSummary, MarketError, MarketService, MarketSession, SessionState,
};
use crate::domain::entities::lineup::{Slot, LINEUP_SIZE};
use crate::domain::entities::player::{Player, Position};
use crate::domain::entities::round::Round;
use crate::domain::errors::{LineupError, NoticeLevel};
use crate::domain::repositories::market_backend::{BackendError, SaveOutcome};
use crate::domain::services::catalog_filter::{CatalogEntry, CatalogQuery, SortMode};

pub const SAVE_SUCCESS_MESSAGE: &str = "Lineup saved successfully!";

pub const DEFAULT_SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// One user's session. The map lock is only held to look this up; work on the
/// session, backend calls included, happens under its own mutex.
struct SessionEntry {
    session: Arc<Mutex<MarketSession>>,
    last_seen: Instant,
}

impl SessionEntry {
    fn new(session: MarketSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            last_seen: Instant::now(),
        }
    }

    fn is_idle(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Shared handler state: the service plus every open session keyed by user
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MarketService>,
    sessions: Arc<Mutex<HashMap<String, SessionEntry>>>,
    idle_timeout: Duration,
}

impl AppState {
    pub fn new(service: Arc<MarketService>) -> Self {
        Self {
            service,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout: DEFAULT_SESSION_IDLE_TIMEOUT,
        }
    }

    /// Sessions untouched for longer than `timeout` are dropped
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    async fn insert_session(&self, user_id: String, session: MarketSession) {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_idle(self.idle_timeout));
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("Evicted {} idle sessions", evicted);
        }
        sessions.insert(user_id, SessionEntry::new(session));
    }

    async fn session(&self, user_id: &str) -> Result<Arc<Mutex<MarketSession>>, ApiError> {
        let mut sessions = self.sessions.lock().await;
        if let Some(entry) = sessions.get_mut(user_id) {
            if !entry.is_idle(self.idle_timeout) {
                entry.last_seen = Instant::now();
                return Ok(entry.session.clone());
            }
        }
        if sessions.remove(user_id).is_some() {
            debug!("Session for {} expired", user_id);
        }
        Err(api_error(MarketError::SessionNotFound(user_id.to_string())))
    }
}

/// Query parameters for the catalog endpoint
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CatalogParams {
    /// Case-insensitive substring of the player name
    pub search: Option<String>,
    /// "Goleiro", "Fixo", "Ala", "Pivô" or the english names
    pub position: Option<String>,
    pub team: Option<i64>,
    /// price_asc, price_desc (default), name_asc, name_desc
    pub sort: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddPlayerRequest {
    pub player_id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SlotResponse {
    pub slot: String,
    pub position: Position,
    pub player: Option<Player>,
}

/// Lineup, budget and round as shown on the market screen
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub round: Option<Round>,
    pub state: SessionState,
    pub warning: Option<String>,
    pub slots: Vec<SlotResponse>,
    /// "n/5"
    pub selected: String,
    pub complete: bool,
    pub budget: BudgetSummary,
}

impl From<&MarketSession> for SessionResponse {
    fn from(session: &MarketSession) -> Self {
        let lineup = session.lineup();
        Self {
            user_id: session.user_id().to_string(),
            round: session.round().cloned(),
            state: session.state(),
            warning: session.warning().map(str::to_string),
            slots: Slot::ALL
                .iter()
                .map(|slot| SlotResponse {
                    slot: slot.name().to_string(),
                    position: slot.position(),
                    player: lineup.get(*slot).cloned(),
                })
                .collect(),
            selected: lineup.summary(),
            complete: lineup.is_complete(),
            budget: session.budget_summary(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogResponse {
    pub players: Vec<CatalogEntry>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveResponse {
    pub outcome: SaveOutcome,
    pub message: String,
    pub session: SessionResponse,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub level: NoticeLevel,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message,
            level: NoticeLevel::Warning,
        }),
    )
}

impl From<MarketError> for ErrorResponse {
    fn from(err: MarketError) -> Self {
        match err {
            MarketError::Lineup(e) => Self {
                level: e.notice_level(),
                error: e.to_string(),
            },
            // Raw backend detail stays in the logs
            MarketError::Backend(e) => Self {
                error: e.user_message().to_string(),
                level: NoticeLevel::Error,
            },
            other => Self {
                error: other.to_string(),
                level: NoticeLevel::Warning,
            },
        }
    }
}

fn api_error(err: MarketError) -> ApiError {
    let status = match &err {
        MarketError::Lineup(LineupError::NoActiveRound) => StatusCode::CONFLICT,
        MarketError::Lineup(_) => StatusCode::UNPROCESSABLE_ENTITY,
        MarketError::PlayerNotInCatalog(_)
        | MarketError::SessionNotFound(_)
        | MarketError::Backend(BackendError::NotFound(_)) => StatusCode::NOT_FOUND,
        MarketError::Backend(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(ErrorResponse::from(err)))
}

/// Open (or reopen) the market for a user, replacing any session in memory
pub async fn open_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.service.open_session(&user_id).await.map_err(api_error)?;
    let response = SessionResponse::from(&session);
    state.insert_session(user_id, session).await;
    Ok(Json(response))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let handle = state.session(&user_id).await?;
    let session = handle.lock().await;
    Ok(Json(SessionResponse::from(&*session)))
}

/// Filtered catalog with the `selected` flag for players already in the lineup
pub async fn get_catalog(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<CatalogParams>,
) -> Result<Json<CatalogResponse>, ApiError> {
    let mut query = CatalogQuery::new();
    if let Some(search) = params.search {
        query = query.search(search);
    }
    if let Some(position) = params.position {
        query = query.position(position.parse::<Position>().map_err(bad_request)?);
    }
    if let Some(team_id) = params.team {
        query = query.team(team_id);
    }
    if let Some(sort) = params.sort {
        query = query.sort(sort.parse::<SortMode>().map_err(bad_request)?);
    }

    let handle = state.session(&user_id).await?;
    let players = handle.lock().await.catalog_view(&query);
    debug!("Catalog for {}: {} players", user_id, players.len());

    Ok(Json(CatalogResponse {
        total: players.len(),
        players,
    }))
}

pub async fn add_player(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<AddPlayerRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let handle = state.session(&user_id).await?;
    let mut session = handle.lock().await;
    let slot = session
        .add_player_by_id(request.player_id)
        .map_err(api_error)?;
    debug!("{} placed player {} in {}", user_id, request.player_id, slot);
    Ok(Json(SessionResponse::from(&*session)))
}

/// Empty one slot; removing from an empty slot is a no-op
pub async fn remove_player(
    State(state): State<AppState>,
    Path((user_id, slot)): Path<(String, String)>,
) -> Result<Json<SessionResponse>, ApiError> {
    let slot = slot.parse::<Slot>().map_err(bad_request)?;
    let handle = state.session(&user_id).await?;
    let mut session = handle.lock().await;
    session.remove_player(slot);
    Ok(Json(SessionResponse::from(&*session)))
}

pub async fn clear_lineup(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let handle = state.session(&user_id).await?;
    let mut session = handle.lock().await;
    session.clear();
    Ok(Json(SessionResponse::from(&*session)))
}

pub async fn save_lineup(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<SaveResponse>, ApiError> {
    let handle = state.session(&user_id).await?;
    let mut session = handle.lock().await;
    let outcome = state.service.save(&mut session).await.map_err(api_error)?;
    info!("{} saved lineup ({:?})", user_id, outcome);

    Ok(Json(SaveResponse {
        outcome,
        message: SAVE_SUCCESS_MESSAGE.to_string(),
        session: SessionResponse::from(&*session),
    }))
}

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sessions = state.session_count().await;
    Json(serde_json::json!({
        "status": "running",
        "sessions": sessions,
        "lineup_size": LINEUP_SIZE,
    }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/market/:user_id/session",
            post(open_session).get(get_session),
        )
        .route("/market/:user_id/catalog", get(get_catalog))
        .route(
            "/market/:user_id/slots",
            post(add_player).delete(clear_lineup),
        )
        .route("/market/:user_id/slots/:slot", delete(remove_player))
        .route("/market/:user_id/save", post(save_lineup))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::lineup::Lineup;
    use crate::domain::entities::round::RoundStatus;
    use crate::domain::repositories::market_backend::{BackendResult, LineupStore};
    use crate::domain::value_objects::cartoletas::Cartoletas;
    use crate::infrastructure::in_memory_backend::InMemoryBackend;
    use async_trait::async_trait;

    /// Lineup store that takes its time to answer a save
    struct SlowStore {
        inner: Arc<InMemoryBackend>,
        delay: Duration,
    }

    #[async_trait]
    impl LineupStore for SlowStore {
        async fn fetch_saved_lineup(
            &self,
            user_id: &str,
            round_id: i64,
        ) -> BackendResult<Option<Lineup>> {
            self.inner.fetch_saved_lineup(user_id, round_id).await
        }

        async fn save_lineup(
            &self,
            user_id: &str,
            round_id: i64,
            lineup: &Lineup,
        ) -> BackendResult<SaveOutcome> {
            tokio::time::sleep(self.delay).await;
            self.inner.save_lineup(user_id, round_id, lineup).await
        }
    }

    fn player(id: i64, name: &str, position: Position, cents: i64) -> Player {
        Player::new(id, name, position, Cartoletas::from_cents(cents)).unwrap()
    }

    fn state_with(backend: Arc<InMemoryBackend>) -> AppState {
        AppState::new(Arc::new(MarketService::with_backend(backend)))
    }

    fn backend() -> Arc<InMemoryBackend> {
        Arc::new(
            InMemoryBackend::new()
                .with_players(vec![
                    player(1, "Guitta", Position::Goalkeeper, 1_000),
                    player(2, "Rodrigo", Position::Fixed, 2_000),
                    player(3, "Dyego", Position::Wing, 1_500),
                    player(4, "Pito", Position::Wing, 1_500),
                    player(5, "Ferrao", Position::Pivot, 3_000),
                ])
                .with_default_budget(Cartoletas::from_cents(10_000))
                .with_active_round(Round::new(1, 1, RoundStatus::InProgress)),
        )
    }

    async fn add(state: &AppState, player_id: i64) -> Result<Json<SessionResponse>, ApiError> {
        add_player(
            State(state.clone()),
            Path("user-1".to_string()),
            Json(AddPlayerRequest { player_id }),
        )
        .await
    }

    #[tokio::test]
    async fn test_session_must_be_opened_first() {
        let state = state_with(backend());
        let (status, body) = get_session(State(state), Path("user-1".to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.error.contains("user-1"));
    }

    #[tokio::test]
    async fn test_build_and_save_lineup() {
        let state = state_with(backend());
        let Json(opened) = open_session(State(state.clone()), Path("user-1".to_string()))
            .await
            .unwrap();
        assert_eq!(opened.selected, "0/5");
        assert!(opened.warning.is_none());

        for id in 1..=5 {
            add(&state, id).await.unwrap();
        }

        let Json(saved) = save_lineup(State(state.clone()), Path("user-1".to_string()))
            .await
            .unwrap();
        assert_eq!(saved.outcome, SaveOutcome::Created);
        assert_eq!(saved.message, SAVE_SUCCESS_MESSAGE);
        assert_eq!(saved.session.state, SessionState::Saved);
        assert_eq!(saved.session.selected, "5/5");
        assert_eq!(saved.session.budget.total_cost, Cartoletas::from_cents(9_000));
        assert_eq!(saved.session.budget.remaining, Cartoletas::from_cents(1_000));
    }

    #[tokio::test]
    async fn test_lineup_rule_violation_is_unprocessable() {
        let state = state_with(backend());
        open_session(State(state.clone()), Path("user-1".to_string()))
            .await
            .unwrap();
        add(&state, 1).await.unwrap();

        let (status, body) = add(&state, 1).await.unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.error, "Guitta is already in the lineup");
        assert_eq!(body.level, NoticeLevel::Warning);

        let (status, _) = add(&state, 99).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_incomplete_save_is_rejected() {
        let state = state_with(backend());
        open_session(State(state.clone()), Path("user-1".to_string()))
            .await
            .unwrap();
        add(&state, 1).await.unwrap();

        let (status, body) = save_lineup(State(state), Path("user-1".to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.error, "You need to select 5 players (1/5 selected)");
    }

    #[tokio::test]
    async fn test_save_after_round_closed_conflicts() {
        let backend = backend();
        let state = state_with(backend.clone());
        open_session(State(state.clone()), Path("user-1".to_string()))
            .await
            .unwrap();
        for id in 1..=5 {
            add(&state, id).await.unwrap();
        }

        backend.set_active_round(None).await;
        let (status, _) = save_lineup(State(state), Path("user-1".to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(backend.save_calls(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_maps_to_bad_gateway() {
        let backend = backend();
        backend.set_offline(true);
        let state = state_with(backend);

        let (status, body) = open_session(State(state), Path("user-1".to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body.error, "Connection error. Check your internet connection.");
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let state = state_with(backend());
        open_session(State(state.clone()), Path("user-1".to_string()))
            .await
            .unwrap();
        add(&state, 3).await.unwrap();
        add(&state, 4).await.unwrap();

        let Json(after_remove) = remove_player(
            State(state.clone()),
            Path(("user-1".to_string(), "wing1".to_string())),
        )
        .await
        .unwrap();
        assert_eq!(after_remove.selected, "1/5");
        assert!(after_remove.slots[2].player.is_none());
        assert_eq!(after_remove.slots[3].player.as_ref().map(|p| p.id), Some(4));

        let (status, _) = remove_player(
            State(state.clone()),
            Path(("user-1".to_string(), "striker".to_string())),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let Json(cleared) = clear_lineup(State(state), Path("user-1".to_string()))
            .await
            .unwrap();
        assert_eq!(cleared.selected, "0/5");
    }

    #[tokio::test]
    async fn test_catalog_marks_selected_players() {
        let state = state_with(backend());
        open_session(State(state.clone()), Path("user-1".to_string()))
            .await
            .unwrap();
        add(&state, 3).await.unwrap();

        let params = CatalogParams {
            position: Some("Ala".to_string()),
            sort: Some("name_asc".to_string()),
            ..CatalogParams::default()
        };
        let Json(catalog) = get_catalog(State(state.clone()), Path("user-1".to_string()), Query(params))
            .await
            .unwrap();

        assert_eq!(catalog.total, 2);
        assert_eq!(catalog.players[0].player.name, "Dyego");
        assert!(catalog.players[0].selected);
        assert!(!catalog.players[1].selected);

        let params = CatalogParams {
            sort: Some("random".to_string()),
            ..CatalogParams::default()
        };
        let (status, _) = get_catalog(State(state), Path("user-1".to_string()), Query(params))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let backend = Arc::new(
            InMemoryBackend::new().with_active_round(Round::new(1, 1, RoundStatus::InProgress)),
        );
        let state = state_with(backend);

        let (status, body) = open_session(State(state.clone()), Path("ghost".to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.level, NoticeLevel::Error);
        assert_eq!(state.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_slow_save_does_not_block_other_users() {
        let backend = backend();
        let store = Arc::new(SlowStore {
            inner: backend.clone(),
            delay: Duration::from_millis(500),
        });
        let service = MarketService::new(backend.clone(), backend.clone(), backend.clone(), store);
        let state = AppState::new(Arc::new(service));

        for user in ["user-1", "user-2"] {
            open_session(State(state.clone()), Path(user.to_string()))
                .await
                .unwrap();
        }
        for id in 1..=5 {
            add(&state, id).await.unwrap();
        }

        let saving = tokio::spawn(save_lineup(State(state.clone()), Path("user-1".to_string())));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let other = tokio::time::timeout(
            Duration::from_millis(200),
            get_session(State(state.clone()), Path("user-2".to_string())),
        )
        .await
        .expect("user-2 waited on user-1's save");
        assert_eq!(other.unwrap().selected, "0/5");

        let Json(health) = tokio::time::timeout(Duration::from_millis(200), health_check(State(state)))
            .await
            .expect("health check waited on a save");
        assert_eq!(health["sessions"], 2);

        let Json(saved) = saving.await.unwrap().unwrap();
        assert_eq!(saved.outcome, SaveOutcome::Created);
        assert_eq!(backend.save_calls(), 1);
    }

    #[tokio::test]
    async fn test_idle_sessions_are_evicted() {
        let state = state_with(backend()).with_idle_timeout(Duration::from_millis(100));
        open_session(State(state.clone()), Path("user-1".to_string()))
            .await
            .unwrap();
        add(&state, 1).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        open_session(State(state.clone()), Path("user-2".to_string()))
            .await
            .unwrap();
        assert_eq!(state.session_count().await, 1);

        let (status, _) = get_session(State(state.clone()), Path("user-1".to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        get_session(State(state), Path("user-2".to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_expired_session_is_dropped_on_access() {
        let state = state_with(backend()).with_idle_timeout(Duration::from_millis(100));
        open_session(State(state.clone()), Path("user-1".to_string()))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        let (status, _) = add(&state, 1).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(state.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_health_check_counts_sessions() {
        let state = state_with(backend());
        open_session(State(state.clone()), Path("user-1".to_string()))
            .await
            .unwrap();
        let Json(health) = health_check(State(state)).await;
        assert_eq!(health["status"], "running");
        assert_eq!(health["sessions"], 1);
    }
}
