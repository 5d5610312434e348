use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::ActivityMetrics;

// Conversion factors for declared metrics into environmental aggregates.
const TRASH_KG_PER_BAG: f64 = 2.0;
const CO2_KG_PER_BAG: f64 = 0.5;
const CO2_KG_PER_TREE_YEAR: f64 = 21.77;
const CO2_KG_PER_SOLO_CAR_KM: f64 = 0.2;
const CO2_KG_PER_WATER_LITER: f64 = 0.0003;
const CO2_KG_PER_KWH: f64 = 0.45;

/// The environmental aggregate change produced by one activity. Snapshotted
/// on the activity record at creation so deletion can reverse exactly what
/// was applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ImpactDelta {
    pub trash_kg: f64,
    pub trees: u32,
    pub co2_kg: f64,
}

impl Add for ImpactDelta {
    type Output = ImpactDelta;

    fn add(self, other: ImpactDelta) -> ImpactDelta {
        ImpactDelta {
            trash_kg: self.trash_kg + other.trash_kg,
            trees: self.trees + other.trees,
            co2_kg: self.co2_kg + other.co2_kg,
        }
    }
}

/// Converts declared metrics into an impact delta. Pure and deterministic.
pub fn impact(metrics: &ActivityMetrics) -> ImpactDelta {
    match metrics {
        ActivityMetrics::Trash { bags_collected } => {
            let bags = f64::from(bags_collected.unwrap_or(1));
            ImpactDelta {
                trash_kg: bags * TRASH_KG_PER_BAG,
                trees: 0,
                co2_kg: bags * CO2_KG_PER_BAG,
            }
        }
        ActivityMetrics::Trees { trees_planted } => ImpactDelta {
            trash_kg: 0.0,
            trees: *trees_planted,
            co2_kg: f64::from(*trees_planted) * CO2_KG_PER_TREE_YEAR,
        },
        ActivityMetrics::Mobility {
            distance_km,
            transport_type,
        } => {
            let distance = distance_km.unwrap_or(5.0);
            let saved = distance * (CO2_KG_PER_SOLO_CAR_KM - transport_type.emission_factor());
            ImpactDelta {
                trash_kg: 0.0,
                trees: 0,
                co2_kg: saved.max(0.0),
            }
        }
        ActivityMetrics::Water { water_saved_liters } => ImpactDelta {
            trash_kg: 0.0,
            trees: 0,
            co2_kg: water_saved_liters * CO2_KG_PER_WATER_LITER,
        },
        ActivityMetrics::Energy { energy_saved_kwh } => ImpactDelta {
            trash_kg: 0.0,
            trees: 0,
            co2_kg: energy_saved_kwh * CO2_KG_PER_KWH,
        },
    }
}
