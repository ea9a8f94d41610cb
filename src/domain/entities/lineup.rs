//! Lineup entity - the five-slot roster being assembled for a round
//!
//! A futsal lineup has exactly one goalkeeper, one fixed, two wings and one
//! pivot. Slot eligibility is a fixed table keyed by [`Position`]; wings fill
//! `wing1` before `wing2`.

use crate::domain::entities::player::{Player, Position};
use crate::domain::errors::LineupError;
use crate::domain::value_objects::cartoletas::Cartoletas;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const LINEUP_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Goalkeeper,
    Fixed,
    Wing1,
    Wing2,
    Pivot,
}

impl Slot {
    /// Display order of the slots
    pub const ALL: [Slot; LINEUP_SIZE] = [
        Slot::Goalkeeper,
        Slot::Fixed,
        Slot::Wing1,
        Slot::Wing2,
        Slot::Pivot,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Slot::Goalkeeper => "goalkeeper",
            Slot::Fixed => "fixed",
            Slot::Wing1 => "wing1",
            Slot::Wing2 => "wing2",
            Slot::Pivot => "pivot",
        }
    }

    pub fn position(&self) -> Position {
        match self {
            Slot::Goalkeeper => Position::Goalkeeper,
            Slot::Fixed => Position::Fixed,
            Slot::Wing1 | Slot::Wing2 => Position::Wing,
            Slot::Pivot => Position::Pivot,
        }
    }

    fn index(&self) -> usize {
        match self {
            Slot::Goalkeeper => 0,
            Slot::Fixed => 1,
            Slot::Wing1 => 2,
            Slot::Wing2 => 3,
            Slot::Pivot => 4,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Slot::ALL
            .into_iter()
            .find(|slot| slot.name() == s)
            .ok_or_else(|| format!("Unknown slot: {}", s))
    }
}

impl Position {
    /// Slots a player of this position may occupy, in fill order
    pub fn eligible_slots(&self) -> &'static [Slot] {
        match self {
            Position::Goalkeeper => &[Slot::Goalkeeper],
            Position::Fixed => &[Slot::Fixed],
            Position::Wing => &[Slot::Wing1, Slot::Wing2],
            Position::Pivot => &[Slot::Pivot],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Lineup {
    slots: [Option<Player>; LINEUP_SIZE],
}

impl Lineup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a lineup from stored slot assignments.
    ///
    /// # Errors
    /// Fails if a player sits in a slot its position is not eligible for, if
    /// two players target the same slot, or if the same player id appears twice.
    pub fn from_assignments(
        assignments: impl IntoIterator<Item = (Slot, Player)>,
    ) -> Result<Self, LineupError> {
        let mut lineup = Lineup::new();
        for (slot, player) in assignments {
            if !player.position.eligible_slots().contains(&slot) {
                return Err(LineupError::IneligibleSlot {
                    position: player.position,
                    slot,
                });
            }
            if lineup.is_occupied(slot) {
                return Err(LineupError::PositionFull {
                    position: player.position,
                });
            }
            if lineup.contains_player(player.id) {
                return Err(LineupError::AlreadySelected {
                    player_id: player.id,
                    name: player.name,
                });
            }
            lineup.slots[slot.index()] = Some(player);
        }
        Ok(lineup)
    }

    pub fn get(&self, slot: Slot) -> Option<&Player> {
        self.slots[slot.index()].as_ref()
    }

    pub fn is_occupied(&self, slot: Slot) -> bool {
        self.get(slot).is_some()
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_complete(&self) -> bool {
        self.occupied_count() == LINEUP_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.occupied_count() == 0
    }

    /// Occupied slots in display order
    pub fn players(&self) -> impl Iterator<Item = (Slot, &Player)> {
        Slot::ALL
            .into_iter()
            .filter_map(move |slot| self.get(slot).map(|p| (slot, p)))
    }

    pub fn contains_player(&self, player_id: i64) -> bool {
        self.slot_of(player_id).is_some()
    }

    pub fn slot_of(&self, player_id: i64) -> Option<Slot> {
        self.players()
            .find(|(_, p)| p.id == player_id)
            .map(|(slot, _)| slot)
    }

    /// First empty slot the position is eligible for
    pub fn first_free_slot(&self, position: Position) -> Option<Slot> {
        position
            .eligible_slots()
            .iter()
            .copied()
            .find(|slot| !self.is_occupied(*slot))
    }

    /// Sum of occupied slot prices, recomputed on every call
    pub fn total_cost(&self) -> Cartoletas {
        self.players().map(|(_, p)| p.price).sum()
    }

    /// `"n/5"` progress summary
    pub fn summary(&self) -> String {
        format!("{}/{}", self.occupied_count(), LINEUP_SIZE)
    }

    pub(crate) fn place(&mut self, slot: Slot, player: Player) {
        self.slots[slot.index()] = Some(player);
    }

    pub(crate) fn take(&mut self, slot: Slot) -> Option<Player> {
        self.slots[slot.index()].take()
    }

    pub(crate) fn clear(&mut self) {
        self.slots = Default::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: i64, position: Position, cents: i64) -> Player {
        Player::new(id, format!("Player {}", id), position, Cartoletas::from_cents(cents)).unwrap()
    }

    #[test]
    fn test_new_lineup_is_empty() {
        let lineup = Lineup::new();
        assert!(lineup.is_empty());
        assert_eq!(lineup.total_cost(), Cartoletas::ZERO);
        assert_eq!(lineup.summary(), "0/5");
    }

    #[test]
    fn test_slot_names_round_trip() {
        for slot in Slot::ALL {
            assert_eq!(slot.name().parse::<Slot>().unwrap(), slot);
        }
        assert!("ala1".parse::<Slot>().is_err());
    }

    #[test]
    fn test_wing_fills_wing1_then_wing2() {
        let mut lineup = Lineup::new();
        assert_eq!(lineup.first_free_slot(Position::Wing), Some(Slot::Wing1));
        lineup.place(Slot::Wing1, player(1, Position::Wing, 100));
        assert_eq!(lineup.first_free_slot(Position::Wing), Some(Slot::Wing2));
        lineup.place(Slot::Wing2, player(2, Position::Wing, 100));
        assert_eq!(lineup.first_free_slot(Position::Wing), None);
    }

    #[test]
    fn test_wing2_only_occupied_still_offers_wing1() {
        let mut lineup = Lineup::new();
        lineup.place(Slot::Wing2, player(2, Position::Wing, 100));
        assert_eq!(lineup.first_free_slot(Position::Wing), Some(Slot::Wing1));
    }

    #[test]
    fn test_from_assignments_rejects_ineligible_slot() {
        let result = Lineup::from_assignments(vec![(Slot::Pivot, player(1, Position::Goalkeeper, 100))]);
        assert_eq!(
            result.unwrap_err(),
            LineupError::IneligibleSlot {
                position: Position::Goalkeeper,
                slot: Slot::Pivot
            }
        );
    }

    #[test]
    fn test_from_assignments_rejects_duplicate_player() {
        let wing = player(3, Position::Wing, 100);
        let result = Lineup::from_assignments(vec![(Slot::Wing1, wing.clone()), (Slot::Wing2, wing)]);
        assert!(matches!(result, Err(LineupError::AlreadySelected { player_id: 3, .. })));
    }

    #[test]
    fn test_from_assignments_rejects_two_players_in_one_slot() {
        let result = Lineup::from_assignments(vec![
            (Slot::Pivot, player(5, Position::Pivot, 100)),
            (Slot::Pivot, player(6, Position::Pivot, 200)),
        ]);
        assert_eq!(
            result.unwrap_err(),
            LineupError::PositionFull {
                position: Position::Pivot
            }
        );
    }

    #[test]
    fn test_total_cost_and_slot_lookup() {
        let lineup = Lineup::from_assignments(vec![
            (Slot::Goalkeeper, player(1, Position::Goalkeeper, 1000)),
            (Slot::Wing2, player(4, Position::Wing, 1550)),
        ])
        .unwrap();
        assert_eq!(lineup.total_cost(), Cartoletas::from_cents(2550));
        assert_eq!(lineup.slot_of(4), Some(Slot::Wing2));
        assert_eq!(lineup.slot_of(99), None);
        assert_eq!(lineup.summary(), "2/5");
    }
}
