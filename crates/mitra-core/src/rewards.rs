use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::LedgerError;

/// Engagement rewards with a fixed price list. These never touch the
/// scheme history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardAction {
    DailyLogin,
    ProfileComplete,
    AdWatched,
    ChatInteraction,
}

impl RewardAction {
    pub const ALL: [RewardAction; 4] = [
        RewardAction::DailyLogin,
        RewardAction::ProfileComplete,
        RewardAction::AdWatched,
        RewardAction::ChatInteraction,
    ];

    pub const fn amount(self) -> u64 {
        match self {
            RewardAction::DailyLogin => 5,
            RewardAction::ProfileComplete => 20,
            RewardAction::AdWatched => 10,
            RewardAction::ChatInteraction => 1,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RewardAction::DailyLogin => "daily_login",
            RewardAction::ProfileComplete => "profile_complete",
            RewardAction::AdWatched => "ad_watched",
            RewardAction::ChatInteraction => "chat_interaction",
        }
    }
}

impl FromStr for RewardAction {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RewardAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| LedgerError::invalid(format!("unknown reward action {:?}", s)))
    }
}

impl std::fmt::Display for RewardAction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
