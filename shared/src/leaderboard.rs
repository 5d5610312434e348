use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which population the leaderboard ranks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaderboardScope {
    Global,
    Region(String),
}

impl LeaderboardScope {
    pub fn from_region(region: Option<String>) -> Self {
        match region {
            Some(region) if !region.is_empty() => LeaderboardScope::Region(region),
            _ => LeaderboardScope::Global,
        }
    }
}

/// Which points column the leaderboard ranks by.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardOrdering {
    #[default]
    AllTime,
    Weekly,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_region_means_global() {
        assert_eq!(
            LeaderboardScope::from_region(None),
            LeaderboardScope::Global
        );
        assert_eq!(
            LeaderboardScope::from_region(Some(String::new())),
            LeaderboardScope::Global
        );
        assert_eq!(
            LeaderboardScope::from_region(Some("volta".into())),
            LeaderboardScope::Region("volta".into())
        );
    }

    #[test]
    fn ordering_parses_from_query_strings() {
        assert_eq!(
            "weekly".parse::<LeaderboardOrdering>().unwrap(),
            LeaderboardOrdering::Weekly
        );
        assert_eq!(
            "all_time".parse::<LeaderboardOrdering>().unwrap(),
            LeaderboardOrdering::AllTime
        );
        assert!("monthly".parse::<LeaderboardOrdering>().is_err());
    }
}
