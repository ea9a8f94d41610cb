//! In-memory market backend
//!
//! Holds catalog, balances, rounds and saved lineups in process memory. Used by
//! the demo server (`MARKET_BACKEND=memory`) and by tests that need a backend
//! with controllable failures.

use crate::domain::entities::lineup::Lineup;
use crate::domain::entities::player::Player;
use crate::domain::entities::round::Round;
use crate::domain::repositories::market_backend::{
    BackendError, BackendResult, BudgetSource, LineupStore, PlayerCatalog, RoundSource,
    SaveOutcome,
};
use crate::domain::value_objects::cartoletas::Cartoletas;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Seed data, as loaded from a JSON fixture
#[derive(Debug, Default, Deserialize)]
pub struct MarketFixture {
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub budgets: HashMap<String, Cartoletas>,
    #[serde(default)]
    pub default_budget: Option<Cartoletas>,
    #[serde(default)]
    pub active_round: Option<Round>,
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    players: RwLock<Vec<Player>>,
    budgets: RwLock<HashMap<String, Cartoletas>>,
    /// Balance handed to users without an explicit entry
    default_budget: Option<Cartoletas>,
    active_round: RwLock<Option<Round>>,
    lineups: RwLock<HashMap<(String, i64), Lineup>>,
    offline: AtomicBool,
    save_calls: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: MarketFixture) -> Self {
        info!(
            "In-memory backend seeded with {} players, round: {:?}",
            fixture.players.len(),
            fixture.active_round.as_ref().map(|r| r.number)
        );
        Self {
            players: RwLock::new(fixture.players),
            budgets: RwLock::new(fixture.budgets),
            default_budget: fixture.default_budget,
            active_round: RwLock::new(fixture.active_round),
            ..Self::default()
        }
    }

    pub fn from_fixture_json(json: &str) -> Result<Self, serde_json::Error> {
        let fixture: MarketFixture = serde_json::from_str(json)?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn with_players(mut self, players: Vec<Player>) -> Self {
        *self.players.get_mut() = players;
        self
    }

    pub fn with_budget(mut self, user_id: &str, budget: Cartoletas) -> Self {
        self.budgets.get_mut().insert(user_id.to_string(), budget);
        self
    }

    pub fn with_default_budget(mut self, budget: Cartoletas) -> Self {
        self.default_budget = Some(budget);
        self
    }

    pub fn with_active_round(mut self, round: Round) -> Self {
        *self.active_round.get_mut() = Some(round);
        self
    }

    pub async fn set_active_round(&self, round: Option<Round>) {
        *self.active_round.write().await = round;
    }

    pub async fn set_budget(&self, user_id: &str, budget: Cartoletas) {
        self.budgets.write().await.insert(user_id.to_string(), budget);
    }

    /// Make every call fail with a network error until switched back
    pub fn set_offline(&self, offline: bool) {
        warn!("In-memory backend offline: {}", offline);
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub async fn stored_lineup(&self, user_id: &str, round_id: i64) -> Option<Lineup> {
        self.lineups
            .read()
            .await
            .get(&(user_id.to_string(), round_id))
            .cloned()
    }

    fn ensure_online(&self) -> BackendResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BackendError::Network("Network request failed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PlayerCatalog for InMemoryBackend {
    async fn fetch_available_players(&self) -> BackendResult<Vec<Player>> {
        self.ensure_online()?;
        let mut players: Vec<Player> = self
            .players
            .read()
            .await
            .iter()
            .filter(|p| p.is_available())
            .cloned()
            .collect();
        players.sort_by(|a, b| b.price.cmp(&a.price));
        Ok(players)
    }
}

#[async_trait]
impl BudgetSource for InMemoryBackend {
    async fn fetch_current_budget(&self, user_id: &str) -> BackendResult<Cartoletas> {
        self.ensure_online()?;
        self.budgets
            .read()
            .await
            .get(user_id)
            .copied()
            .or(self.default_budget)
            .ok_or_else(|| BackendError::NotFound(format!("User {}", user_id)))
    }
}

#[async_trait]
impl RoundSource for InMemoryBackend {
    async fn fetch_active_round(&self) -> BackendResult<Option<Round>> {
        self.ensure_online()?;
        Ok(self.active_round.read().await.clone().filter(Round::is_active))
    }
}

#[async_trait]
impl LineupStore for InMemoryBackend {
    async fn fetch_saved_lineup(
        &self,
        user_id: &str,
        round_id: i64,
    ) -> BackendResult<Option<Lineup>> {
        self.ensure_online()?;
        Ok(self.stored_lineup(user_id, round_id).await)
    }

    async fn save_lineup(
        &self,
        user_id: &str,
        round_id: i64,
        lineup: &Lineup,
    ) -> BackendResult<SaveOutcome> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;

        let previous = self
            .lineups
            .write()
            .await
            .insert((user_id.to_string(), round_id), lineup.clone());
        debug!("Stored lineup for {} in round {}", user_id, round_id);

        Ok(match previous {
            Some(_) => SaveOutcome::Updated,
            None => SaveOutcome::Created,
        })
    }
}
