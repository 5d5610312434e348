use serde::{Deserialize, Serialize};

use crate::{ChallengeId, UserId};

/// Point totals that earn the user a milestone notification.
pub const POINT_MILESTONES: [u32; 8] = [100, 500, 1000, 2500, 5000, 10_000, 25_000, 50_000];

/// Ledger events handed to the notification collaborator after the owning
/// transaction commits. Delivery is fire-and-forget.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    ActivityCreated {
        user_id: UserId,
        points: u32,
    },
    ChallengeCompleted {
        user_id: UserId,
        challenge_id: ChallengeId,
        bonus: u32,
    },
    PointsMilestoneCrossed {
        user_id: UserId,
        total: u32,
    },
}

/// Milestones passed when a total moves from `before` to `after`.
pub fn milestones_crossed(before: u32, after: u32) -> impl Iterator<Item = u32> {
    POINT_MILESTONES
        .into_iter()
        .filter(move |m| before < *m && *m <= after)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_collects_every_passed_milestone() {
        let crossed: Vec<u32> = milestones_crossed(450, 2600).collect();
        assert_eq!(crossed, vec![500, 1000, 2500]);
    }

    #[test]
    fn landing_exactly_on_a_milestone_counts() {
        let crossed: Vec<u32> = milestones_crossed(99, 100).collect();
        assert_eq!(crossed, vec![100]);
    }

    #[test]
    fn no_crossing_without_movement_past_a_milestone() {
        assert_eq!(milestones_crossed(100, 100).count(), 0);
        assert_eq!(milestones_crossed(101, 499).count(), 0);
    }
}
