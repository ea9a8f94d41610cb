//! Catalog filtering and ordering for the market grid

use crate::domain::entities::lineup::Lineup;
use crate::domain::entities::player::{Player, Position};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    PriceAsc,
    #[default]
    PriceDesc,
    NameAsc,
    NameDesc,
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price_asc" => Ok(SortMode::PriceAsc),
            "price_desc" => Ok(SortMode::PriceDesc),
            "name_asc" => Ok(SortMode::NameAsc),
            "name_desc" => Ok(SortMode::NameDesc),
            _ => Err(format!("Unknown sort mode: {}", s)),
        }
    }
}

/// Grid filters; every criterion is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogQuery {
    /// Case-insensitive substring of the player name
    pub search: Option<String>,
    pub position: Option<Position>,
    pub team_id: Option<i64>,
    #[serde(default)]
    pub sort: SortMode,
}

impl CatalogQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn team(mut self, team_id: i64) -> Self {
        self.team_id = Some(team_id);
        self
    }

    pub fn sort(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }

    fn matches(&self, player: &Player, needle: Option<&str>) -> bool {
        if let Some(needle) = needle {
            if !player.name.to_lowercase().contains(needle) {
                return false;
            }
        }
        if let Some(position) = self.position {
            if player.position != position {
                return false;
            }
        }
        if let Some(team_id) = self.team_id {
            if player.team_id != Some(team_id) {
                return false;
            }
        }
        true
    }
}

/// One grid card: the player and whether it already sits in the lineup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub player: Player,
    pub selected: bool,
}

fn compare_names(a: &Player, b: &Player) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}

/// Filter and order a copy of the catalog. The source is never mutated and
/// the sort is stable, so ties keep catalog order.
pub fn filter_catalog(catalog: &[Player], query: &CatalogQuery) -> Vec<Player> {
    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut result: Vec<Player> = catalog
        .iter()
        .filter(|p| query.matches(p, needle.as_deref()))
        .cloned()
        .collect();

    match query.sort {
        SortMode::PriceAsc => result.sort_by(|a, b| a.price.cmp(&b.price)),
        SortMode::PriceDesc => result.sort_by(|a, b| b.price.cmp(&a.price)),
        SortMode::NameAsc => result.sort_by(compare_names),
        SortMode::NameDesc => result.sort_by(|a, b| compare_names(b, a)),
    }

    result
}

/// Filtered catalog with players already in the lineup flagged as selected.
/// Selected players stay visible so the grid does not reflow on selection.
pub fn catalog_view(catalog: &[Player], query: &CatalogQuery, lineup: &Lineup) -> Vec<CatalogEntry> {
    filter_catalog(catalog, query)
        .into_iter()
        .map(|player| CatalogEntry {
            selected: lineup.contains_player(player.id),
            player,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::lineup::Slot;
    use crate::domain::entities::player::TeamInfo;
    use crate::domain::value_objects::cartoletas::Cartoletas;

    fn player(id: i64, name: &str, position: Position, cents: i64, team_id: i64) -> Player {
        Player::new(id, name, position, Cartoletas::from_cents(cents))
            .unwrap()
            .with_team(
                team_id,
                Some(TeamInfo {
                    name: format!("Team {}", team_id),
                    crest_url: None,
                }),
            )
    }

    fn catalog() -> Vec<Player> {
        vec![
            player(1, "Guitta", Position::Goalkeeper, 1200, 1),
            player(2, "Pito", Position::Wing, 1800, 2),
            player(3, "dyego", Position::Wing, 900, 1),
            player(4, "Ferrão", Position::Pivot, 2500, 2),
            player(5, "Rodrigo", Position::Fixed, 1100, 1),
            player(6, "Arthur", Position::Wing, 1800, 1),
        ]
    }

    #[test]
    fn test_default_query_sorts_by_price_desc() {
        let result = filter_catalog(&catalog(), &CatalogQuery::new());
        let ids: Vec<i64> = result.iter().map(|p| p.id).collect();
        // 2 and 6 tie at 18.00 and keep catalog order
        assert_eq!(ids, vec![4, 2, 6, 1, 5, 3]);
    }

    #[test]
    fn test_wing_filter_price_asc() {
        let query = CatalogQuery::new()
            .position(Position::Wing)
            .sort(SortMode::PriceAsc);
        let result = filter_catalog(&catalog(), &query);

        assert_eq!(result.len(), 3);
        assert!(result.iter().all(|p| p.position == Position::Wing));
        assert!(result.windows(2).all(|w| w[0].price <= w[1].price));
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let result = filter_catalog(&catalog(), &CatalogQuery::new().search("RR"));
        let names: Vec<&str> = result.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Ferrão"]);

        let result = filter_catalog(&catalog(), &CatalogQuery::new().search("  "));
        assert_eq!(result.len(), 6);
    }

    #[test]
    fn test_team_filter() {
        let result = filter_catalog(&catalog(), &CatalogQuery::new().team(2));
        assert!(result.iter().all(|p| p.team_id == Some(2)));
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_name_sorts_ignore_case() {
        let asc = filter_catalog(&catalog(), &CatalogQuery::new().sort(SortMode::NameAsc));
        let names: Vec<&str> = asc.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Arthur", "dyego", "Ferrão", "Guitta", "Pito", "Rodrigo"]);

        let desc = filter_catalog(&catalog(), &CatalogQuery::new().sort(SortMode::NameDesc));
        assert_eq!(desc.first().map(|p| p.name.as_str()), Some("Rodrigo"));
        assert_eq!(desc.last().map(|p| p.name.as_str()), Some("Arthur"));
    }

    #[test]
    fn test_source_catalog_is_not_mutated() {
        let source = catalog();
        let snapshot = source.clone();
        let _ = filter_catalog(&source, &CatalogQuery::new().sort(SortMode::NameAsc));
        assert_eq!(source, snapshot);
    }

    #[test]
    fn test_catalog_view_flags_selected_players() {
        let players = catalog();
        let lineup = Lineup::from_assignments(vec![(Slot::Wing1, players[1].clone())]).unwrap();

        let view = catalog_view(&players, &CatalogQuery::new().position(Position::Wing), &lineup);
        assert_eq!(view.len(), 3);
        for entry in view {
            assert_eq!(entry.selected, entry.player.id == 2);
        }
    }

    #[test]
    fn test_sort_mode_parse() {
        assert_eq!("price_asc".parse::<SortMode>().unwrap(), SortMode::PriceAsc);
        assert_eq!(SortMode::default(), SortMode::PriceDesc);
        assert!("cheapest".parse::<SortMode>().is_err());
    }
}
