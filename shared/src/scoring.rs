use crate::{ActivityMetrics, Category};

/// Hard cap on what a single activity can award.
pub const MAX_POINTS_PER_ACTIVITY: u32 = 200;

const PHOTO_BONUS: u32 = 5;
const LOCATION_BONUS: u32 = 3;

pub fn base_points(category: Category) -> u32 {
    match category {
        Category::Trash => 25,
        Category::Trees => 50,
        Category::Mobility => 15,
        Category::Water => 20,
        Category::Energy => 30,
    }
}

/// Points for one logged activity. Pure and deterministic: the same inputs
/// always award the same points, clamped to [0, MAX_POINTS_PER_ACTIVITY].
pub fn points(metrics: &ActivityMetrics, has_photo: bool, has_location: bool) -> u32 {
    let mut points = base_points(metrics.category());

    if has_photo {
        points += PHOTO_BONUS;
    }
    if has_location {
        points += LOCATION_BONUS;
    }

    points = points.saturating_add(category_bonus(metrics));

    points.min(MAX_POINTS_PER_ACTIVITY)
}

fn category_bonus(metrics: &ActivityMetrics) -> u32 {
    match metrics {
        // Larger cleanups earn more, up to 25 extra.
        ActivityMetrics::Trash { bags_collected } => bags_collected
            .unwrap_or(0)
            .saturating_mul(5)
            .min(25),
        // 20 extra per tree beyond the first.
        ActivityMetrics::Trees { trees_planted } => {
            trees_planted.saturating_sub(1).saturating_mul(20)
        }
        // Longer sustainable trips earn more, up to 15 extra.
        ActivityMetrics::Mobility { distance_km, .. } => {
            (distance_km.unwrap_or(0.0).floor() as u32).min(15)
        }
        ActivityMetrics::Water { .. } | ActivityMetrics::Energy { .. } => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransportType;

    #[test]
    fn trash_cleanup_with_photo_and_location() {
        let metrics = ActivityMetrics::Trash {
            bags_collected: Some(3),
        };
        // 25 base + 5 photo + 3 location + 15 bag bonus
        assert_eq!(points(&metrics, true, true), 48);
    }

    #[test]
    fn extra_trees_earn_twenty_each() {
        let metrics = ActivityMetrics::Trees { trees_planted: 3 };
        assert_eq!(points(&metrics, false, false), 90);
    }

    #[test]
    fn single_tree_gets_base_only() {
        let metrics = ActivityMetrics::Trees { trees_planted: 1 };
        assert_eq!(points(&metrics, false, false), 50);
    }

    #[test]
    fn bag_bonus_caps_at_twenty_five() {
        let metrics = ActivityMetrics::Trash {
            bags_collected: Some(50),
        };
        assert_eq!(points(&metrics, false, false), 50);
    }

    #[test]
    fn mobility_bonus_uses_whole_kilometers() {
        let metrics = ActivityMetrics::Mobility {
            distance_km: Some(7.9),
            transport_type: TransportType::Cycling,
        };
        assert_eq!(points(&metrics, false, false), 22);

        let far = ActivityMetrics::Mobility {
            distance_km: Some(400.0),
            transport_type: TransportType::Cycling,
        };
        assert_eq!(points(&far, false, false), 30);
    }

    #[test]
    fn award_never_exceeds_the_cap() {
        let metrics = ActivityMetrics::Trees {
            trees_planted: u32::MAX,
        };
        assert_eq!(points(&metrics, true, true), MAX_POINTS_PER_ACTIVITY);
    }

    #[test]
    fn scoring_is_deterministic() {
        let metrics = ActivityMetrics::Water {
            water_saved_liters: 120.0,
        };
        let first = points(&metrics, true, false);
        for _ in 0..10 {
            assert_eq!(points(&metrics, true, false), first);
        }
    }
}
