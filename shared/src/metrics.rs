use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::Category;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetricsError {
    #[error("{0} must be a finite, non-negative number")]
    OutOfRange(&'static str),
}

/// Per-category declared metrics. The tag doubles as the activity category,
/// so a payload with an unknown category fails to deserialize instead of
/// silently scoring with a fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum ActivityMetrics {
    Trash {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bags_collected: Option<u32>,
    },
    Trees {
        #[serde(default = "default_trees")]
        trees_planted: u32,
    },
    Mobility {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        distance_km: Option<f64>,
        #[serde(default)]
        transport_type: TransportType,
    },
    Water {
        #[serde(default = "default_water_liters")]
        water_saved_liters: f64,
    },
    Energy {
        #[serde(default = "default_energy_kwh")]
        energy_saved_kwh: f64,
    },
}

fn default_trees() -> u32 {
    1
}

fn default_water_liters() -> f64 {
    50.0
}

fn default_energy_kwh() -> f64 {
    5.0
}

impl ActivityMetrics {
    pub fn category(&self) -> Category {
        match self {
            ActivityMetrics::Trash { .. } => Category::Trash,
            ActivityMetrics::Trees { .. } => Category::Trees,
            ActivityMetrics::Mobility { .. } => Category::Mobility,
            ActivityMetrics::Water { .. } => Category::Water,
            ActivityMetrics::Energy { .. } => Category::Energy,
        }
    }

    /// Rejects declared numbers a well-formed client can never send.
    /// Integer fields are non-negative by construction; float fields must be
    /// finite and non-negative.
    pub fn validate(&self) -> Result<(), MetricsError> {
        match self {
            ActivityMetrics::Trash { .. } | ActivityMetrics::Trees { .. } => Ok(()),
            ActivityMetrics::Mobility { distance_km, .. } => match distance_km {
                Some(d) if !d.is_finite() || *d < 0.0 => {
                    Err(MetricsError::OutOfRange("distance_km"))
                }
                _ => Ok(()),
            },
            ActivityMetrics::Water { water_saved_liters } => {
                if !water_saved_liters.is_finite() || *water_saved_liters < 0.0 {
                    Err(MetricsError::OutOfRange("water_saved_liters"))
                } else {
                    Ok(())
                }
            }
            ActivityMetrics::Energy { energy_saved_kwh } => {
                if !energy_saved_kwh.is_finite() || *energy_saved_kwh < 0.0 {
                    Err(MetricsError::OutOfRange("energy_saved_kwh"))
                } else {
                    Ok(())
                }
            }
        }
    }
}

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
pub enum TransportType {
    Walking,
    Cycling,
    #[default]
    PublicTransport,
    CarPooling,
}

impl TransportType {
    /// kg CO2 emitted per km for this mode; savings are measured against
    /// driving alone at 0.2 kg/km.
    pub fn emission_factor(&self) -> f64 {
        match self {
            TransportType::Walking | TransportType::Cycling => 0.0,
            TransportType::PublicTransport => 0.05,
            TransportType::CarPooling => 0.1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_category_is_rejected() {
        let payload = r#"{"category":"recycling","bags_collected":2}"#;
        assert!(serde_json::from_str::<ActivityMetrics>(payload).is_err());
    }

    #[test]
    fn absent_fields_take_defaults() {
        let trees: ActivityMetrics = serde_json::from_str(r#"{"category":"trees"}"#).unwrap();
        assert_eq!(trees, ActivityMetrics::Trees { trees_planted: 1 });

        let mobility: ActivityMetrics =
            serde_json::from_str(r#"{"category":"mobility"}"#).unwrap();
        assert_eq!(
            mobility,
            ActivityMetrics::Mobility {
                distance_km: None,
                transport_type: TransportType::PublicTransport,
            }
        );
    }

    #[test]
    fn unknown_transport_type_is_rejected() {
        let payload = r#"{"category":"mobility","distance_km":4,"transport_type":"jetpack"}"#;
        assert!(serde_json::from_str::<ActivityMetrics>(payload).is_err());
    }

    #[test]
    fn non_finite_floats_fail_validation() {
        let metrics = ActivityMetrics::Water {
            water_saved_liters: f64::NAN,
        };
        assert_eq!(
            metrics.validate(),
            Err(MetricsError::OutOfRange("water_saved_liters"))
        );

        let metrics = ActivityMetrics::Mobility {
            distance_km: Some(-1.0),
            transport_type: TransportType::Walking,
        };
        assert_eq!(
            metrics.validate(),
            Err(MetricsError::OutOfRange("distance_km"))
        );
    }

    #[test]
    fn metrics_round_trip_keeps_the_category_tag() {
        let metrics = ActivityMetrics::Trash {
            bags_collected: Some(3),
        };
        let json = serde_json::to_string(&metrics).unwrap();
        assert!(json.contains(r#""category":"trash""#));
        assert_eq!(
            serde_json::from_str::<ActivityMetrics>(&json).unwrap(),
            metrics
        );
    }
}
