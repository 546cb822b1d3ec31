pub mod solar;
pub mod sun;
pub mod turbines;
pub mod wind;

use crate::data::types::{ResourceData, ResourceKind, ResourceSeries};
use crate::error::{AuditError, AuditResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use solar::{SolarEquipmentSpec, SolarModel};
use wind::{WindEquipmentSpec, WindModel};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlyProduction {
    pub timestamp: DateTime<Utc>,
    pub production_kwh: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub hourly: Vec<HourlyProduction>,
    /// Nameplate capacity of the whole installation (kW)
    pub capacity_kw: f64,
    /// Aggregate wake factor, only for multi-turbine wind farms
    pub wake_efficiency: Option<f64>,
}

impl ModelOutput {
    pub fn total_kwh(&self) -> f64 {
        self.hourly.iter().map(|h| h.production_kwh).sum()
    }
}

/// Pure mapping from an hourly resource series to hourly energy
pub trait ProductionModel {
    type Sample;
    type Spec;

    fn produce(&self, resource: &ResourceSeries<Self::Sample>, spec: &Self::Spec) -> ModelOutput;
}

/// Installed equipment, tagged by technology
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Technology {
    Wind(WindEquipmentSpec),
    Solar(SolarEquipmentSpec),
}

impl Technology {
    pub fn name(&self) -> &'static str {
        match self {
            Technology::Wind(_) => "wind",
            Technology::Solar(_) => "solar",
        }
    }

    /// Variable set the resource provider has to deliver
    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            Technology::Wind(_) => ResourceKind::Wind,
            Technology::Solar(_) => ResourceKind::Solar,
        }
    }

    pub fn produce(&self, data: &ResourceData, wind: &WindModel, solar: &SolarModel) -> AuditResult<ModelOutput> {
        match (self, data) {
            (Technology::Wind(spec), ResourceData::Wind(series)) => Ok(wind.produce(series, spec)),
            (Technology::Solar(spec), ResourceData::Solar(series)) => Ok(solar.produce(series, spec)),
            (tech, data) => Err(AuditError::Computation(format!(
                "{} installation received {} resource data",
                tech.name(),
                data.kind()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SolarConfig, WindConfig};
    use crate::data::types::{GeoPoint, WindSample};
    use crate::models::turbines::TurbineLibrary;
    use chrono::TimeZone;

    fn wind_data() -> ResourceData {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ResourceData::Wind(ResourceSeries {
            location: GeoPoint { lat: 42.0, lon: -8.0, elevation_m: None },
            samples: vec![WindSample {
                timestamp: ts,
                wind_speed_ms: 8.0,
                wind_speed_10m_ms: None,
                wind_direction_deg: None,
                temperature_c: None,
                pressure_hpa: None,
            }],
        })
    }

    #[test]
    fn test_dispatch_by_technology() {
        let wind = WindModel::new(WindConfig::default());
        let solar = SolarModel::new(SolarConfig::default());
        let tech = Technology::Wind(WindEquipmentSpec {
            turbine: TurbineLibrary::builtin().get("Vestas V90 3MW").unwrap().clone(),
            hub_height_m: 100.0,
            turbine_count: 1,
        });

        let out = tech.produce(&wind_data(), &wind, &solar).unwrap();
        assert_eq!(out.hourly.len(), 1);
        assert_eq!(out.total_kwh(), 886.0);
        assert_eq!(tech.resource_kind(), ResourceKind::Wind);
    }

    #[test]
    fn test_mismatched_resource_is_internal_error() {
        let wind = WindModel::new(WindConfig::default());
        let solar = SolarModel::new(SolarConfig::default());
        let tech = Technology::Solar(SolarEquipmentSpec {
            peak_power_kwp: 100.0,
            tilt_deg: 30.0,
            azimuth_deg: 180.0,
            temperature_coefficient: -0.004,
        });

        let err = tech.produce(&wind_data(), &wind, &solar).unwrap_err();
        assert!(matches!(err, AuditError::Computation(_)));
    }
}
