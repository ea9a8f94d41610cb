//! Round entity - the time window in which lineups are accepted

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Pending,
    InProgress,
    Finished,
}

impl RoundStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RoundStatus::Pending => "pendente",
            RoundStatus::InProgress => "em_andamento",
            RoundStatus::Finished => "finalizada",
        }
    }

    pub fn from_label(label: &str) -> Option<RoundStatus> {
        match label {
            "pendente" => Some(RoundStatus::Pending),
            "em_andamento" => Some(RoundStatus::InProgress),
            "finalizada" => Some(RoundStatus::Finished),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub id: i64,
    pub number: u32,
    pub status: RoundStatus,
}

impl Round {
    pub fn new(id: i64, number: u32, status: RoundStatus) -> Self {
        Self { id, number, status }
    }

    /// Only an in-progress round accepts lineups
    pub fn is_active(&self) -> bool {
        self.status == RoundStatus::InProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_in_progress_is_active() {
        assert!(Round::new(1, 1, RoundStatus::InProgress).is_active());
        assert!(!Round::new(1, 1, RoundStatus::Pending).is_active());
        assert!(!Round::new(1, 1, RoundStatus::Finished).is_active());
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(RoundStatus::from_label("em_andamento"), Some(RoundStatus::InProgress));
        assert_eq!(RoundStatus::Finished.label(), "finalizada");
        assert_eq!(RoundStatus::from_label("agendada"), None);
    }

    #[test]
    fn test_json_status_names() {
        let json = serde_json::to_string(&Round::new(3, 3, RoundStatus::InProgress)).unwrap();
        assert_eq!(json, r#"{"id":3,"number":3,"status":"in_progress"}"#);

        let round: Round = serde_json::from_str(r#"{"id":1,"number":1,"status":"pending"}"#).unwrap();
        assert_eq!(round.status, RoundStatus::Pending);
        assert!(serde_json::from_str::<Round>(r#"{"id":1,"number":1,"status":"em_andamento"}"#).is_err());
    }
}
