use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

mod event;
mod impact;
mod leaderboard;
mod metrics;
mod scoring;

pub use event::*;
pub use impact::*;
pub use leaderboard::*;
pub use metrics::*;
pub use scoring::*;

pub type UserId = i32;
pub type ActivityId = i32;
pub type ChallengeId = i32;

/// Activity categories recognized by the ledger. Every scored activity and
/// every challenge belongs to exactly one of these.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Trash,
    Trees,
    Mobility,
    Water,
    Energy,
}
