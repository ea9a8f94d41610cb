//! LineupBuilder - selection rules for assembling a lineup under a budget
//!
//! The builder owns no state. Callers pass the lineup and the budget they
//! hold (see `application::services::market_service::MarketSession`), so the
//! rules stay pure and every mutation is visible at the call site.

use crate::domain::entities::lineup::{Lineup, Slot};
use crate::domain::entities::player::Player;
use crate::domain::errors::LineupError;
use crate::domain::value_objects::cartoletas::Cartoletas;
use tracing::debug;

pub struct LineupBuilder;

impl LineupBuilder {
    /// Place a player in the first free slot eligible for its position.
    ///
    /// Checks run in order: duplicate selection, position capacity, budget.
    /// On rejection the lineup is left unchanged.
    pub fn add_player(
        lineup: &mut Lineup,
        player: Player,
        budget: Cartoletas,
    ) -> Result<Slot, LineupError> {
        if lineup.contains_player(player.id) {
            return Err(LineupError::AlreadySelected {
                player_id: player.id,
                name: player.name,
            });
        }

        let slot = lineup
            .first_free_slot(player.position)
            .ok_or(LineupError::PositionFull {
                position: player.position,
            })?;

        let required = Self::compute_total_cost(lineup) + player.price;
        if required > budget {
            return Err(LineupError::InsufficientBudget {
                required,
                available: budget,
            });
        }

        debug!("Placing {} (id {}) in slot {}", player.name, player.id, slot);
        lineup.place(slot, player);
        Ok(slot)
    }

    /// Empty a slot, returning the player that held it. Empty slots are a no-op.
    pub fn remove_player(lineup: &mut Lineup, slot: Slot) -> Option<Player> {
        let removed = lineup.take(slot);
        if let Some(player) = &removed {
            debug!("Removed {} (id {}) from slot {}", player.name, player.id, slot);
        }
        removed
    }

    pub fn compute_total_cost(lineup: &Lineup) -> Cartoletas {
        lineup.total_cost()
    }

    /// Budget left after paying for the current selection; negative when over
    pub fn remaining_budget(lineup: &Lineup, budget: Cartoletas) -> Cartoletas {
        budget - Self::compute_total_cost(lineup)
    }

    /// A lineup may be saved only when all five slots are filled within budget
    pub fn validate_for_save(lineup: &Lineup, budget: Cartoletas) -> Result<(), LineupError> {
        if !lineup.is_complete() {
            return Err(LineupError::IncompleteLineup {
                occupied: lineup.occupied_count(),
            });
        }

        let total = Self::compute_total_cost(lineup);
        if total > budget {
            return Err(LineupError::BudgetExceeded { total, budget });
        }

        Ok(())
    }
}
