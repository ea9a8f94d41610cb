//! Market Service
//!
//! Orchestrates one user's market session: loads the catalog, balance, active
//! round and any previously saved lineup through the backend ports, applies
//! the lineup rules to the session the caller owns, and hands the finished
//! lineup to the store.
//!
//! Backend calls are awaited one at a time. A failed call never touches the
//! session, so the user can retry without re-entering the selection.

use crate::domain::entities::lineup::{Lineup, Slot};
use crate::domain::entities::player::Player;
use crate::domain::entities::round::Round;
use crate::domain::errors::LineupError;
use crate::domain::repositories::market_backend::{
    BackendError, BudgetSource, LineupStore, MarketBackend, PlayerCatalog, RoundSource,
    SaveOutcome,
};
use crate::domain::services::catalog_filter::{catalog_view, CatalogEntry, CatalogQuery};
use crate::domain::services::lineup_builder::LineupBuilder;
use crate::domain::value_objects::cartoletas::Cartoletas;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const NO_ACTIVE_ROUND_WARNING: &str = "No active round at the moment";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error(transparent)]
    Lineup(#[from] LineupError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Player {0} is not available on the market")]
    PlayerNotInCatalog(i64),

    #[error("No market session for user {0}")]
    SessionNotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Editing,
    Saved,
}

/// Running balance shown next to the lineup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub budget: Cartoletas,
    pub total_cost: Cartoletas,
    pub remaining: Cartoletas,
}

/// Editing state of one user's lineup for the current round
#[derive(Debug, Clone)]
pub struct MarketSession {
    user_id: String,
    budget: Cartoletas,
    round: Option<Round>,
    catalog: Vec<Player>,
    lineup: Lineup,
    state: SessionState,
}

impl MarketSession {
    pub fn new(
        user_id: impl Into<String>,
        budget: Cartoletas,
        round: Option<Round>,
        catalog: Vec<Player>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            budget,
            round,
            catalog,
            lineup: Lineup::new(),
            state: SessionState::Editing,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn budget(&self) -> Cartoletas {
        self.budget
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn catalog(&self) -> &[Player] {
        &self.catalog
    }

    pub fn lineup(&self) -> &Lineup {
        &self.lineup
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Warning to show when lineups cannot be saved at all
    pub fn warning(&self) -> Option<&'static str> {
        if self.round.is_none() {
            Some(NO_ACTIVE_ROUND_WARNING)
        } else {
            None
        }
    }

    pub fn add_player(&mut self, player: Player) -> Result<Slot, LineupError> {
        let slot = LineupBuilder::add_player(&mut self.lineup, player, self.budget)?;
        self.state = SessionState::Editing;
        Ok(slot)
    }

    /// Add a player picked from the catalog grid
    pub fn add_player_by_id(&mut self, player_id: i64) -> Result<Slot, MarketError> {
        let player = self
            .catalog
            .iter()
            .find(|p| p.id == player_id)
            .cloned()
            .ok_or(MarketError::PlayerNotInCatalog(player_id))?;
        Ok(self.add_player(player)?)
    }

    pub fn remove_player(&mut self, slot: Slot) -> Option<Player> {
        let removed = LineupBuilder::remove_player(&mut self.lineup, slot);
        if removed.is_some() {
            self.state = SessionState::Editing;
        }
        removed
    }

    pub fn clear(&mut self) {
        self.lineup.clear();
        self.state = SessionState::Editing;
    }

    /// Replace the selection with a previously saved lineup
    pub fn load_lineup(&mut self, lineup: Lineup) {
        self.lineup = lineup;
        self.state = SessionState::Editing;
    }

    pub fn total_cost(&self) -> Cartoletas {
        LineupBuilder::compute_total_cost(&self.lineup)
    }

    pub fn remaining_budget(&self) -> Cartoletas {
        LineupBuilder::remaining_budget(&self.lineup, self.budget)
    }

    pub fn budget_summary(&self) -> BudgetSummary {
        BudgetSummary {
            budget: self.budget,
            total_cost: self.total_cost(),
            remaining: self.remaining_budget(),
        }
    }

    pub fn validate_for_save(&self) -> Result<(), LineupError> {
        LineupBuilder::validate_for_save(&self.lineup, self.budget)
    }

    pub fn catalog_view(&self, query: &CatalogQuery) -> Vec<CatalogEntry> {
        catalog_view(&self.catalog, query, &self.lineup)
    }

    fn mark_saved(&mut self) {
        self.state = SessionState::Saved;
    }
}

pub struct MarketService {
    catalog: Arc<dyn PlayerCatalog>,
    budgets: Arc<dyn BudgetSource>,
    rounds: Arc<dyn RoundSource>,
    store: Arc<dyn LineupStore>,
}

impl MarketService {
    pub fn new(
        catalog: Arc<dyn PlayerCatalog>,
        budgets: Arc<dyn BudgetSource>,
        rounds: Arc<dyn RoundSource>,
        store: Arc<dyn LineupStore>,
    ) -> Self {
        Self {
            catalog,
            budgets,
            rounds,
            store,
        }
    }

    /// Wire every port to the same backend
    pub fn with_backend<B: MarketBackend + 'static>(backend: Arc<B>) -> Self {
        Self::new(backend.clone(), backend.clone(), backend.clone(), backend)
    }

    /// Start a session for the user.
    ///
    /// A missing active round is not an error: the session opens read-only in
    /// practice and carries a warning. A saved lineup that fails to load is
    /// logged and the session starts empty.
    pub async fn open_session(&self, user_id: &str) -> Result<MarketSession, MarketError> {
        let round = self.rounds.fetch_active_round().await?;
        if round.is_none() {
            warn!("No active round, lineups cannot be saved");
        }

        let players = self.catalog.fetch_available_players().await?;
        let budget = self.budgets.fetch_current_budget(user_id).await?;
        info!(
            "Market opened for {}: {} players, budget {}",
            user_id,
            players.len(),
            budget
        );

        let mut session = MarketSession::new(user_id, budget, round, players);

        if let Some(round_id) = session.round().map(|r| r.id) {
            match self.store.fetch_saved_lineup(user_id, round_id).await {
                Ok(Some(saved)) => {
                    debug!(
                        "Loaded saved lineup for {} in round {} ({})",
                        user_id,
                        round_id,
                        saved.summary()
                    );
                    session.load_lineup(saved);
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to load saved lineup for {}: {}", user_id, e),
            }
        }

        Ok(session)
    }

    /// Reload catalog and balance, keeping the current selection
    pub async fn refresh(&self, session: &mut MarketSession) -> Result<(), MarketError> {
        let players = self.catalog.fetch_available_players().await?;
        let budget = self.budgets.fetch_current_budget(session.user_id()).await?;
        session.catalog = players;
        session.budget = budget;
        debug!("Refreshed market for {}", session.user_id());
        Ok(())
    }

    /// Validate and persist the lineup.
    ///
    /// The active round is checked again right before writing: if it finished
    /// or was replaced while the user was editing, the save is refused with
    /// `NoActiveRound` and nothing is written.
    pub async fn save(&self, session: &mut MarketSession) -> Result<SaveOutcome, MarketError> {
        session.validate_for_save()?;

        let round_id = session
            .round()
            .map(|r| r.id)
            .ok_or(LineupError::NoActiveRound)?;

        match self.rounds.fetch_active_round().await? {
            Some(current) if current.id == round_id => {}
            Some(current) => {
                warn!(
                    "Round changed during editing (session round {}, active round {})",
                    round_id, current.id
                );
                return Err(LineupError::NoActiveRound.into());
            }
            None => {
                warn!("Round {} is no longer active", round_id);
                return Err(LineupError::NoActiveRound.into());
            }
        }

        let outcome = self
            .store
            .save_lineup(session.user_id(), round_id, session.lineup())
            .await
            .map_err(|e| {
                error!("Failed to save lineup for {}: {}", session.user_id(), e);
                e
            })?;

        session.mark_saved();
        info!(
            "Lineup {:?} for {} in round {} (cost {})",
            outcome,
            session.user_id(),
            round_id,
            session.total_cost()
        );
        Ok(outcome)
    }
}
