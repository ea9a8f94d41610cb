//! Database Repository
//!
//! SQLite implementation of the market ports, plus the administrative writes
//! (teams, players, users, rounds) needed to seed and run a local market.

use super::models::*;
use super::{DatabaseError, DbPool};
use crate::domain::entities::lineup::{Lineup, Slot};
use crate::domain::entities::player::Player;
use crate::domain::entities::round::{Round, RoundStatus};
use crate::domain::repositories::market_backend::{
    BackendError, BackendResult, BudgetSource, LineupStore, PlayerCatalog, RoundSource,
    SaveOutcome,
};
use crate::domain::value_objects::cartoletas::Cartoletas;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use tracing::{debug, error, info};

const PLAYER_SELECT: &str = r#"
    SELECT p.id, p.name, p.position, p.price_cents, p.status, p.team_id, p.photo_url,
           t.name AS team_name, t.crest_url AS team_crest_url
    FROM players p
    LEFT JOIN teams t ON t.id = p.team_id
"#;

impl From<DatabaseError> for BackendError {
    fn from(e: DatabaseError) -> Self {
        BackendError::Storage(e.to_string())
    }
}

fn query_error(context: &str, e: sqlx::Error) -> DatabaseError {
    error!("{}: {}", context, e);
    DatabaseError::QueryError(format!("{}: {}", context, e))
}

/// Player ids of a complete lineup in column order
fn slot_ids(lineup: &Lineup) -> BackendResult<[i64; 5]> {
    let mut ids = [0i64; 5];
    for (i, slot) in Slot::ALL.iter().enumerate() {
        ids[i] = lineup
            .get(*slot)
            .map(|p| p.id)
            .ok_or_else(|| BackendError::Storage(format!("Lineup slot {} is empty", slot)))?;
    }
    Ok(ids)
}

pub struct SqliteMarketRepository {
    pool: DbPool,
    initial_budget: Cartoletas,
}

impl SqliteMarketRepository {
    /// `initial_budget` is the balance given to newly registered users
    pub fn new(pool: DbPool, initial_budget: Cartoletas) -> Self {
        Self {
            pool,
            initial_budget,
        }
    }

    pub async fn upsert_team(
        &self,
        id: i64,
        name: &str,
        crest_url: Option<&str>,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO teams (id, name, crest_url) VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name, crest_url = excluded.crest_url
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(crest_url)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to upsert team", e))?;

        debug!("Upserted team {} ({})", id, name);
        Ok(())
    }

    pub async fn upsert_player(&self, player: CreatePlayer) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO players (id, name, position, price_cents, status, team_id, photo_url)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                position = excluded.position,
                price_cents = excluded.price_cents,
                status = excluded.status,
                team_id = excluded.team_id,
                photo_url = excluded.photo_url
            "#,
        )
        .bind(player.id)
        .bind(&player.name)
        .bind(player.position.label())
        .bind(player.price.cents())
        .bind(player.status.label())
        .bind(player.team_id)
        .bind(&player.photo_url)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to upsert player", e))?;

        debug!("Upserted player {} ({})", player.id, player.name);
        Ok(())
    }

    /// Create the user with the initial balance; existing users are left alone
    pub async fn register_user(
        &self,
        user_id: &str,
        team_name: Option<&str>,
    ) -> Result<(), DatabaseError> {
        sqlx::query("INSERT OR IGNORE INTO users (id, team_name, balance_cents) VALUES (?1, ?2, ?3)")
            .bind(user_id)
            .bind(team_name)
            .bind(self.initial_budget.cents())
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Failed to register user", e))?;

        info!("Registered user {} with {}", user_id, self.initial_budget);
        Ok(())
    }

    pub async fn set_balance(&self, user_id: &str, balance: Cartoletas) -> Result<(), DatabaseError> {
        let rows_affected = sqlx::query("UPDATE users SET balance_cents = ?1 WHERE id = ?2")
            .bind(balance.cents())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Failed to update balance", e))?
            .rows_affected();

        if rows_affected == 0 {
            return Err(DatabaseError::QueryError(format!("User not found: {}", user_id)));
        }
        Ok(())
    }

    /// Create a pending round; an existing round with the same id is kept
    pub async fn create_round(&self, id: i64, number: u32) -> Result<(), DatabaseError> {
        sqlx::query("INSERT OR IGNORE INTO rounds (id, number, status) VALUES (?1, ?2, ?3)")
            .bind(id)
            .bind(number)
            .bind(RoundStatus::Pending.label())
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Failed to create round", e))?;
        Ok(())
    }

    /// Make `id` the only in-progress round, finishing any other
    pub async fn start_round(&self, id: i64) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE rounds SET status = ?1 WHERE status = ?2")
            .bind(RoundStatus::Finished.label())
            .bind(RoundStatus::InProgress.label())
            .execute(&mut *tx)
            .await
            .map_err(|e| query_error("Failed to finish running round", e))?;

        let rows_affected = sqlx::query("UPDATE rounds SET status = ?1 WHERE id = ?2")
            .bind(RoundStatus::InProgress.label())
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| query_error("Failed to start round", e))?
            .rows_affected();

        if rows_affected == 0 {
            return Err(DatabaseError::QueryError(format!("Round not found: {}", id)));
        }

        tx.commit().await?;
        info!("Round {} started", id);
        Ok(())
    }

    pub async fn finish_round(&self, id: i64) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE rounds SET status = ?1 WHERE id = ?2")
            .bind(RoundStatus::Finished.label())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Failed to finish round", e))?;
        info!("Round {} finished", id);
        Ok(())
    }

    async fn find_balance(&self, user_id: &str) -> Result<Option<Cartoletas>, DatabaseError> {
        let row = sqlx::query("SELECT balance_cents FROM users WHERE id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("Failed to get balance", e))?;

        Ok(row.map(|row| Cartoletas::from_cents(row.get::<i64, _>("balance_cents"))))
    }

    async fn fetch_player(&self, id: i64) -> Result<Option<PlayerRecord>, DatabaseError> {
        sqlx::query_as::<_, PlayerRecord>(&format!("{} WHERE p.id = ?1", PLAYER_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("Failed to get player", e))
    }

    async fn find_lineup(
        &self,
        user_id: &str,
        round_id: i64,
    ) -> Result<Option<LineupRecord>, DatabaseError> {
        sqlx::query_as::<_, LineupRecord>(
            "SELECT * FROM lineups WHERE user_id = ?1 AND round_id = ?2",
        )
        .bind(user_id)
        .bind(round_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("Failed to get lineup", e))
    }

    async fn lineup_from_record(&self, record: &LineupRecord) -> BackendResult<Lineup> {
        let columns = [
            (Slot::Goalkeeper, record.goalkeeper_id),
            (Slot::Fixed, record.fixed_id),
            (Slot::Wing1, record.wing1_id),
            (Slot::Wing2, record.wing2_id),
            (Slot::Pivot, record.pivot_id),
        ];

        let mut assignments = Vec::with_capacity(columns.len());
        for (slot, player_id) in columns {
            let record = self
                .fetch_player(player_id)
                .await?
                .ok_or_else(|| BackendError::NotFound(format!("Player {}", player_id)))?;
            let player = Player::try_from(record).map_err(BackendError::Decode)?;
            assignments.push((slot, player));
        }

        Lineup::from_assignments(assignments).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PlayerCatalog for SqliteMarketRepository {
    async fn fetch_available_players(&self) -> BackendResult<Vec<Player>> {
        let records = sqlx::query_as::<_, PlayerRecord>(&format!(
            "{} WHERE p.status = ?1 ORDER BY p.price_cents DESC, p.id",
            PLAYER_SELECT
        ))
        .bind(crate::domain::entities::player::PlayerStatus::Available.label())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("Failed to get available players", e))?;

        records
            .into_iter()
            .map(|r| Player::try_from(r).map_err(BackendError::Decode))
            .collect()
    }
}

#[async_trait]
impl BudgetSource for SqliteMarketRepository {
    /// Users seen for the first time are registered with the initial budget
    async fn fetch_current_budget(&self, user_id: &str) -> BackendResult<Cartoletas> {
        if let Some(balance) = self.find_balance(user_id).await? {
            return Ok(balance);
        }

        self.register_user(user_id, None).await?;
        self.find_balance(user_id)
            .await?
            .ok_or_else(|| BackendError::NotFound(format!("User {}", user_id)))
    }
}

#[async_trait]
impl RoundSource for SqliteMarketRepository {
    async fn fetch_active_round(&self) -> BackendResult<Option<Round>> {
        let record = sqlx::query_as::<_, RoundRecord>(
            "SELECT id, number, status FROM rounds WHERE status = ?1 ORDER BY id DESC LIMIT 1",
        )
        .bind(RoundStatus::InProgress.label())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("Failed to get active round", e))?;

        record
            .map(|r| Round::try_from(r).map_err(BackendError::Decode))
            .transpose()
    }
}

#[async_trait]
impl LineupStore for SqliteMarketRepository {
    async fn fetch_saved_lineup(
        &self,
        user_id: &str,
        round_id: i64,
    ) -> BackendResult<Option<Lineup>> {
        match self.find_lineup(user_id, round_id).await? {
            Some(record) => Ok(Some(self.lineup_from_record(&record).await?)),
            None => Ok(None),
        }
    }

    async fn save_lineup(
        &self,
        user_id: &str,
        round_id: i64,
        lineup: &Lineup,
    ) -> BackendResult<SaveOutcome> {
        let [goalkeeper, fixed, wing1, wing2, pivot] = slot_ids(lineup)?;
        let total_cost = lineup.total_cost().cents();
        let now = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_error("Failed to begin transaction", e))?;

        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM lineups WHERE user_id = ?1 AND round_id = ?2")
                .bind(user_id)
                .bind(round_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| query_error("Failed to look up lineup", e))?;

        let outcome = match existing {
            Some((id,)) => {
                sqlx::query(
                    r#"
                    UPDATE lineups
                    SET goalkeeper_id = ?1, fixed_id = ?2, wing1_id = ?3, wing2_id = ?4,
                        pivot_id = ?5, total_cost_cents = ?6, round_points = 0.0, updated_at = ?7
                    WHERE id = ?8
                    "#,
                )
                .bind(goalkeeper)
                .bind(fixed)
                .bind(wing1)
                .bind(wing2)
                .bind(pivot)
                .bind(total_cost)
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| query_error("Failed to update lineup", e))?;
                SaveOutcome::Updated
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO lineups (
                        user_id, round_id, goalkeeper_id, fixed_id, wing1_id, wing2_id,
                        pivot_id, total_cost_cents, round_points, created_at, updated_at
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0.0, ?9, ?9)
                    "#,
                )
                .bind(user_id)
                .bind(round_id)
                .bind(goalkeeper)
                .bind(fixed)
                .bind(wing1)
                .bind(wing2)
                .bind(pivot)
                .bind(total_cost)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| query_error("Failed to insert lineup", e))?;
                SaveOutcome::Created
            }
        };

        tx.commit()
            .await
            .map_err(|e| query_error("Failed to commit lineup", e))?;

        debug!("Lineup for {} in round {}: {:?}", user_id, round_id, outcome);
        Ok(outcome)
    }
}
