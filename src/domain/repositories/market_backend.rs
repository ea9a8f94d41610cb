//! Market Backend Ports
//!
//! The market never talks to storage directly. Players, balances, rounds and
//! saved lineups come from a backend-as-a-service (or a local database) behind
//! these traits, so the lineup rules can be exercised without any live backend.
//!
//! Adapters:
//! - `persistence::repository::SqliteMarketRepository` (local SQLite)
//! - `infrastructure::rest_backend::RestBackendClient` (hosted REST backend)
//! - `infrastructure::in_memory_backend::InMemoryBackend` (tests and demos)

use crate::domain::entities::lineup::Lineup;
use crate::domain::entities::player::Player;
use crate::domain::entities::round::Round;
use crate::domain::value_objects::cartoletas::Cartoletas;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type BackendResult<T> = Result<T, BackendError>;

/// Failures of an external collaborator
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

/// Known backend messages and their user-facing translation
const FRIENDLY_MESSAGES: &[(&str, &str)] = &[
    ("Invalid login credentials", "Incorrect email or password"),
    ("Email not confirmed", "Email not confirmed yet"),
    ("User already registered", "User already registered"),
    ("duplicate key", "This record already exists"),
    ("violates foreign key", "Data reference error"),
    (
        "Network request failed",
        "Connection error. Check your internet connection.",
    ),
];

const GENERIC_MESSAGE: &str = "Something went wrong. Please try again.";

impl BackendError {
    /// Message safe to show to the user; raw backend detail stays in the logs
    pub fn user_message(&self) -> &'static str {
        let detail = match self {
            BackendError::Network(_) => {
                return "Connection error. Check your internet connection."
            }
            BackendError::Authentication(msg)
            | BackendError::Storage(msg)
            | BackendError::NotFound(msg)
            | BackendError::Decode(msg) => msg,
        };

        FRIENDLY_MESSAGES
            .iter()
            .find(|(pattern, _)| detail.contains(pattern))
            .map(|(_, friendly)| *friendly)
            .unwrap_or(GENERIC_MESSAGE)
    }
}

/// Whether a save inserted a new row or overwrote the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    Created,
    Updated,
}

/// Read-only player catalog
#[async_trait]
pub trait PlayerCatalog: Send + Sync {
    /// Players with status available, carrying team metadata, most expensive first
    async fn fetch_available_players(&self) -> BackendResult<Vec<Player>>;
}

#[async_trait]
pub trait BudgetSource: Send + Sync {
    /// Current cartoletas balance of the user
    async fn fetch_current_budget(&self, user_id: &str) -> BackendResult<Cartoletas>;
}

#[async_trait]
pub trait RoundSource: Send + Sync {
    /// The in-progress round, if any. Absence is a valid state.
    async fn fetch_active_round(&self) -> BackendResult<Option<Round>>;
}

#[async_trait]
pub trait LineupStore: Send + Sync {
    async fn fetch_saved_lineup(
        &self,
        user_id: &str,
        round_id: i64,
    ) -> BackendResult<Option<Lineup>>;

    /// Upsert the lineup for (user, round); a previous save is overwritten
    async fn save_lineup(
        &self,
        user_id: &str,
        round_id: i64,
        lineup: &Lineup,
    ) -> BackendResult<SaveOutcome>;
}

/// A single backend serving every port
pub trait MarketBackend: PlayerCatalog + BudgetSource + RoundSource + LineupStore {}

impl<T> MarketBackend for T where T: PlayerCatalog + BudgetSource + RoundSource + LineupStore {}
