//! Database Models
//!
//! Row types for the market tables and their conversion into domain entities.

use crate::domain::entities::player::{Player, PlayerStatus, Position, TeamInfo};
use crate::domain::entities::round::{Round, RoundStatus};
use crate::domain::value_objects::cartoletas::Cartoletas;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Player row joined with its team
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlayerRecord {
    pub id: i64,
    pub name: String,
    pub position: String,
    pub price_cents: i64,
    pub status: String,
    pub team_id: Option<i64>,
    pub photo_url: Option<String>,
    pub team_name: Option<String>,
    pub team_crest_url: Option<String>,
}

impl TryFrom<PlayerRecord> for Player {
    type Error = String;

    fn try_from(record: PlayerRecord) -> Result<Self, Self::Error> {
        let position = Position::from_label(&record.position)
            .ok_or_else(|| format!("Unknown position '{}' for player {}", record.position, record.id))?;
        let status = PlayerStatus::from_label(&record.status)
            .ok_or_else(|| format!("Unknown status '{}' for player {}", record.status, record.id))?;

        let mut player = Player::new(
            record.id,
            record.name,
            position,
            Cartoletas::from_cents(record.price_cents),
        )?
        .with_status(status);

        if let Some(team_id) = record.team_id {
            let team = record.team_name.map(|name| TeamInfo {
                name,
                crest_url: record.team_crest_url,
            });
            player = player.with_team(team_id, team);
        }
        if let Some(photo_url) = record.photo_url {
            player = player.with_photo(photo_url);
        }

        Ok(player)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoundRecord {
    pub id: i64,
    pub number: i64,
    pub status: String,
}

impl TryFrom<RoundRecord> for Round {
    type Error = String;

    fn try_from(record: RoundRecord) -> Result<Self, Self::Error> {
        let status = RoundStatus::from_label(&record.status)
            .ok_or_else(|| format!("Unknown round status '{}'", record.status))?;
        let number = u32::try_from(record.number)
            .map_err(|_| format!("Invalid round number {}", record.number))?;
        Ok(Round::new(record.id, number, status))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LineupRecord {
    pub id: i64,
    pub user_id: String,
    pub round_id: i64,
    pub goalkeeper_id: i64,
    pub fixed_id: i64,
    pub wing1_id: i64,
    pub wing2_id: i64,
    pub pivot_id: i64,
    pub total_cost_cents: i64,
    pub round_points: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create player input
#[derive(Debug, Clone)]
pub struct CreatePlayer {
    pub id: i64,
    pub name: String,
    pub position: Position,
    pub price: Cartoletas,
    pub status: PlayerStatus,
    pub team_id: Option<i64>,
    pub photo_url: Option<String>,
}

impl From<&Player> for CreatePlayer {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            position: player.position,
            price: player.price,
            status: player.status,
            team_id: player.team_id,
            photo_url: player.photo_url.clone(),
        }
    }
}
