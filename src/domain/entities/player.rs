//! Player entity - an athlete available on the market

use crate::domain::value_objects::cartoletas::Cartoletas;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Futsal playing position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Goalkeeper,
    Fixed,
    Wing,
    Pivot,
}

impl Position {
    pub const ALL: [Position; 4] = [
        Position::Goalkeeper,
        Position::Fixed,
        Position::Wing,
        Position::Pivot,
    ];

    /// Label stored by the backend tables
    pub fn label(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "Goleiro",
            Position::Fixed => "Fixo",
            Position::Wing => "Ala",
            Position::Pivot => "Pivô",
        }
    }

    pub fn from_label(label: &str) -> Option<Position> {
        Position::ALL.into_iter().find(|p| p.label() == label)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Accepts both backend labels and the API names
impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(position) = Position::from_label(s) {
            return Ok(position);
        }
        match s.to_lowercase().as_str() {
            "goalkeeper" => Ok(Position::Goalkeeper),
            "fixed" => Ok(Position::Fixed),
            "wing" => Ok(Position::Wing),
            "pivot" => Ok(Position::Pivot),
            _ => Err(format!("Unknown position: {}", s)),
        }
    }
}

/// Market availability of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    Available,
    Injured,
    Suspended,
}

impl PlayerStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PlayerStatus::Available => "Disponível",
            PlayerStatus::Injured => "Lesionado",
            PlayerStatus::Suspended => "Suspenso",
        }
    }

    pub fn from_label(label: &str) -> Option<PlayerStatus> {
        match label {
            "Disponível" => Some(PlayerStatus::Available),
            "Lesionado" => Some(PlayerStatus::Injured),
            "Suspenso" => Some(PlayerStatus::Suspended),
            _ => None,
        }
    }
}

/// Display metadata of the club a player belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    pub name: String,
    pub crest_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PlayerData")]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub position: Position,
    pub price: Cartoletas,
    pub status: PlayerStatus,
    pub team_id: Option<i64>,
    pub team: Option<TeamInfo>,
    pub photo_url: Option<String>,
}

/// Wire form of a player; validated through `Player::new` on the way in
#[derive(Deserialize)]
struct PlayerData {
    id: i64,
    name: String,
    position: Position,
    price: Cartoletas,
    status: PlayerStatus,
    #[serde(default)]
    team_id: Option<i64>,
    #[serde(default)]
    team: Option<TeamInfo>,
    #[serde(default)]
    photo_url: Option<String>,
}

impl TryFrom<PlayerData> for Player {
    type Error = String;

    fn try_from(data: PlayerData) -> Result<Self, Self::Error> {
        let mut player =
            Player::new(data.id, data.name, data.position, data.price)?.with_status(data.status);
        player.team_id = data.team_id;
        player.team = data.team;
        player.photo_url = data.photo_url;
        Ok(player)
    }
}

impl Player {
    /// Create an available player without team metadata
    ///
    /// # Errors
    /// Returns an error if the name is blank or the price is negative
    pub fn new(
        id: i64,
        name: impl Into<String>,
        position: Position,
        price: Cartoletas,
    ) -> Result<Self, String> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("Player name cannot be empty".to_string());
        }
        if price.is_negative() {
            return Err(format!("Player price must be non-negative, got {}", price));
        }

        Ok(Self {
            id,
            name,
            position,
            price,
            status: PlayerStatus::Available,
            team_id: None,
            team: None,
            photo_url: None,
        })
    }

    pub fn with_team(mut self, team_id: i64, team: Option<TeamInfo>) -> Self {
        self.team_id = Some(team_id);
        self.team = team;
        self
    }

    pub fn with_status(mut self, status: PlayerStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_photo(mut self, photo_url: impl Into<String>) -> Self {
        self.photo_url = Some(photo_url.into());
        self
    }

    pub fn team_name(&self) -> &str {
        self.team.as_ref().map(|t| t.name.as_str()).unwrap_or("Sem time")
    }

    pub fn is_available(&self) -> bool {
        self.status == PlayerStatus::Available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_new_valid() {
        let player = Player::new(1, "Falcão", Position::Wing, Cartoletas::from_cents(1500)).unwrap();
        assert_eq!(player.name, "Falcão");
        assert!(player.is_available());
        assert_eq!(player.team_name(), "Sem time");
    }

    #[test]
    fn test_player_new_rejects_blank_name() {
        let result = Player::new(1, "   ", Position::Wing, Cartoletas::ZERO);
        assert_eq!(result.unwrap_err(), "Player name cannot be empty");
    }

    #[test]
    fn test_player_new_rejects_negative_price() {
        let result = Player::new(1, "Ari", Position::Pivot, Cartoletas::from_cents(-1));
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_validates_price() {
        let json = r#"{"id": 3, "name": "Dyego", "position": "wing", "price": -50.0, "status": "available"}"#;
        let err = serde_json::from_str::<Player>(json).unwrap_err();
        assert!(err.to_string().contains("non-negative"));

        let json = r#"{"id": 3, "name": "Dyego", "position": "wing", "price": 15.5, "status": "injured",
                       "team_id": 2, "team": {"name": "Magnus", "crest_url": null}}"#;
        let player = serde_json::from_str::<Player>(json).unwrap();
        assert_eq!(player.price, Cartoletas::from_cents(1550));
        assert_eq!(player.status, PlayerStatus::Injured);
        assert_eq!(player.team_name(), "Magnus");
    }

    #[test]
    fn test_deserialize_rejects_blank_name() {
        let json = r#"{"id": 4, "name": " ", "position": "pivot", "price": 1.0, "status": "available"}"#;
        assert!(serde_json::from_str::<Player>(json).is_err());
    }

    #[test]
    fn test_position_labels_round_trip() {
        for position in Position::ALL {
            assert_eq!(Position::from_label(position.label()), Some(position));
        }
        assert_eq!("pivot".parse::<Position>().unwrap(), Position::Pivot);
        assert_eq!("Pivô".parse::<Position>().unwrap(), Position::Pivot);
        assert!("striker".parse::<Position>().is_err());
    }

    #[test]
    fn test_with_team() {
        let player = Player::new(2, "Ari", Position::Pivot, Cartoletas::from_cents(900))
            .unwrap()
            .with_team(
                7,
                Some(TeamInfo {
                    name: "Magnus".to_string(),
                    crest_url: None,
                }),
            );
        assert_eq!(player.team_id, Some(7));
        assert_eq!(player.team_name(), "Magnus");
    }
}
