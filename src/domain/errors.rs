use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entities::lineup::Slot;
use crate::domain::entities::player::Position;
use crate::domain::value_objects::cartoletas::Cartoletas;

/// How a rejection is surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Rule violations raised while editing or saving a lineup.
///
/// None of these are fatal: the lineup is left untouched and the user can
/// correct the selection and retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LineupError {
    #[error("{name} is already in the lineup")]
    AlreadySelected { player_id: i64, name: String },

    #[error("Position {position} is already filled")]
    PositionFull { position: Position },

    #[error("Insufficient budget: lineup would cost {required}, available {available}")]
    InsufficientBudget {
        required: Cartoletas,
        available: Cartoletas,
    },

    #[error("{position} cannot be placed in slot {slot}")]
    IneligibleSlot { position: Position, slot: Slot },

    #[error("You need to select 5 players ({occupied}/5 selected)")]
    IncompleteLineup { occupied: usize },

    #[error("Lineup costs {total}, budget is {budget}")]
    BudgetExceeded {
        total: Cartoletas,
        budget: Cartoletas,
    },

    #[error("No active round")]
    NoActiveRound,
}

impl LineupError {
    pub fn notice_level(&self) -> NoticeLevel {
        match self {
            LineupError::InsufficientBudget { .. } | LineupError::BudgetExceeded { .. } => {
                NoticeLevel::Error
            }
            LineupError::AlreadySelected { .. }
            | LineupError::PositionFull { .. }
            | LineupError::IneligibleSlot { .. }
            | LineupError::IncompleteLineup { .. }
            | LineupError::NoActiveRound => NoticeLevel::Warning,
        }
    }
}
