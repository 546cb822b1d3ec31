use crate::config::{RoughnessClass, WakeConfig, WindConfig};
use crate::data::types::{GeoPoint, ResourceSeries, WindSample};
use crate::models::turbines::TurbineModel;
use crate::models::{HourlyProduction, ModelOutput, ProductionModel};
use serde::Serialize;
use tracing::debug;

const GAS_CONSTANT_DRY_AIR: f64 = 287.05;
const STANDARD_AIR_DENSITY: f64 = 1.225;

/// Bounds for a shear exponent measured from two heights
const MIN_DYNAMIC_SHEAR: f64 = 0.1;
const MAX_DYNAMIC_SHEAR: f64 = 0.6;
const LOWER_MEASUREMENT_HEIGHT_M: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindEquipmentSpec {
    #[serde(rename = "turbine_model", serialize_with = "turbine_name")]
    pub turbine: TurbineModel,
    pub hub_height_m: f64,
    pub turbine_count: u32,
}

fn turbine_name<S: serde::Serializer>(t: &TurbineModel, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&t.name)
}

impl WindEquipmentSpec {
    pub fn capacity_kw(&self) -> f64 {
        self.turbine.rated_power_kw * self.turbine_count as f64
    }
}

/// Hub-height wind farm model: Hellman shear, density correction,
/// tabulated power curve and a simplified Jensen wake loss
pub struct WindModel {
    config: WindConfig,
}

impl WindModel {
    pub fn new(config: WindConfig) -> Self {
        Self { config }
    }

    fn shear_exponent(&self, sample: &WindSample) -> f64 {
        if let Some(alpha) = self.config.hellman_exponent {
            return alpha;
        }
        if self.config.dynamic_shear {
            if let Some(v10) = sample.wind_speed_10m_ms {
                let ratio_h = self.config.reference_height_m / LOWER_MEASUREMENT_HEIGHT_M;
                if v10 > 0.0 && sample.wind_speed_ms > 0.0 && (ratio_h - 1.0).abs() > 1e-9 {
                    let alpha = (sample.wind_speed_ms / v10).ln() / ratio_h.ln();
                    return alpha.clamp(MIN_DYNAMIC_SHEAR, MAX_DYNAMIC_SHEAR);
                }
            }
        }
        self.config.roughness.hellman_exponent()
    }

    /// Wind speed scaled from the reference height to `hub_height_m`
    pub fn hub_speed(&self, sample: &WindSample, hub_height_m: f64) -> f64 {
        let alpha = self.shear_exponent(sample);
        sample.wind_speed_ms * (hub_height_m / self.config.reference_height_m).powf(alpha)
    }

    /// Single turbine output with the density ratio applied, capped at rated power
    pub fn turbine_power_kw(&self, turbine: &TurbineModel, hub_speed: f64, density: f64) -> f64 {
        let ratio = density / self.config.reference_air_density;
        (turbine.power_kw(hub_speed) * ratio).clamp(0.0, turbine.rated_power_kw)
    }
}

impl ProductionModel for WindModel {
    type Sample = WindSample;
    type Spec = WindEquipmentSpec;

    fn produce(&self, resource: &ResourceSeries<WindSample>, spec: &WindEquipmentSpec) -> ModelOutput {
        let wake = WakeModel::new(&self.config.wake, self.config.roughness);
        if wake.enabled && spec.turbine_count > 1 {
            debug!(
                "Wake model: {} turbines, {:.2}% loss for a fully waked turbine",
                spec.turbine_count,
                wake.full_wake_loss() * 100.0
            );
        }
        let count = spec.turbine_count as f64;
        let mut unwaked_total = 0.0;
        let mut waked_total = 0.0;

        let hourly = resource
            .samples
            .iter()
            .map(|sample| {
                let v_hub = self.hub_speed(sample, spec.hub_height_m);
                let density = air_density(sample, &resource.location);
                let per_turbine = self.turbine_power_kw(&spec.turbine, v_hub, density);

                let unwaked = per_turbine * count;
                let waked = unwaked * wake.farm_efficiency(spec.turbine_count, sample.wind_direction_deg);
                unwaked_total += unwaked;
                waked_total += waked;

                HourlyProduction {
                    timestamp: sample.timestamp,
                    production_kwh: waked,
                }
            })
            .collect();

        let wake_efficiency = (spec.turbine_count > 1).then(|| {
            if unwaked_total > 0.0 {
                waked_total / unwaked_total
            } else {
                wake.farm_efficiency(spec.turbine_count, None)
            }
        });

        ModelOutput {
            hourly,
            capacity_kw: spec.capacity_kw(),
            wake_efficiency,
        }
    }
}

/// Air density for the hour: ideal gas from pressure and temperature,
/// else standard atmosphere at the site elevation, else sea level
pub fn air_density(sample: &WindSample, location: &GeoPoint) -> f64 {
    if let (Some(p_hpa), Some(t_c)) = (sample.pressure_hpa, sample.temperature_c) {
        let kelvin = t_c + 273.15;
        if p_hpa > 0.0 && kelvin > 0.0 {
            return p_hpa * 100.0 / (GAS_CONSTANT_DRY_AIR * kelvin);
        }
    }
    match location.elevation_m {
        Some(h) => STANDARD_AIR_DENSITY * (1.0 - 2.25577e-5 * h).max(0.0).powf(4.25588),
        None => STANDARD_AIR_DENSITY,
    }
}

/// Simplified Jensen (top-hat) wake model for a single row of turbines.
///
/// Assumes every turbine but the first sits `spacing` rotor diameters
/// behind a neighbour; the geometry is a configuration default, not surveyed.
pub struct WakeModel {
    enabled: bool,
    full_wake_loss: f64,
    aligned_fraction: f64,
    row_bearing_deg: Option<f64>,
}

impl WakeModel {
    pub fn new(config: &WakeConfig, roughness: RoughnessClass) -> Self {
        let k = roughness.wake_decay();
        let deficit = (1.0 - (1.0 - config.thrust_coefficient).sqrt())
            / (1.0 + 2.0 * k * config.spacing_diameters).powi(2);
        Self {
            enabled: config.enabled,
            full_wake_loss: 1.0 - (1.0 - deficit).powi(3),
            aligned_fraction: config.aligned_fraction,
            row_bearing_deg: config.row_bearing_deg,
        }
    }

    /// Power lost by one turbine sitting fully in its neighbour's wake
    pub fn full_wake_loss(&self) -> f64 {
        self.full_wake_loss
    }

    /// Farm output relative to `count` isolated turbines, in (0, 1]
    pub fn farm_efficiency(&self, count: u32, direction_deg: Option<f64>) -> f64 {
        if !self.enabled || count <= 1 {
            return 1.0;
        }
        let exposure = match (self.row_bearing_deg, direction_deg) {
            (Some(bearing), Some(direction)) => (direction - bearing).to_radians().cos().powi(2),
            _ => self.aligned_fraction,
        };
        let waked_share = 1.0 - 1.0 / count as f64;
        1.0 - self.full_wake_loss * exposure * waked_share
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::turbines::TurbineLibrary;
    use chrono::{Duration, TimeZone, Utc};

    fn sample(speed: f64) -> WindSample {
        WindSample {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            wind_speed_ms: speed,
            wind_speed_10m_ms: None,
            wind_direction_deg: None,
            temperature_c: None,
            pressure_hpa: None,
        }
    }

    fn series(speeds: &[f64]) -> ResourceSeries<WindSample> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ResourceSeries {
            location: GeoPoint { lat: 42.5, lon: -7.8, elevation_m: None },
            samples: speeds
                .iter()
                .enumerate()
                .map(|(i, &v)| WindSample {
                    timestamp: start + Duration::hours(i as i64),
                    ..sample(v)
                })
                .collect(),
        }
    }

    fn spec(count: u32, hub: f64) -> WindEquipmentSpec {
        WindEquipmentSpec {
            turbine: TurbineLibrary::builtin().get("Vestas V90 3MW").unwrap().clone(),
            hub_height_m: hub,
            turbine_count: count,
        }
    }

    #[test]
    fn test_hellman_extrapolation() {
        let model = WindModel::new(WindConfig::default());
        let v = model.hub_speed(&sample(8.0), 200.0);
        assert!((v - 8.0 * 2f64.powf(1.0 / 7.0)).abs() < 1e-9);
        assert_eq!(model.hub_speed(&sample(8.0), 100.0), 8.0);
    }

    #[test]
    fn test_dynamic_shear_is_clipped() {
        let config = WindConfig {
            dynamic_shear: true,
            ..WindConfig::default()
        };
        let model = WindModel::new(config);
        let mut s = sample(10.0);
        s.wind_speed_10m_ms = Some(9.9);
        assert!((model.shear_exponent(&s) - MIN_DYNAMIC_SHEAR).abs() < 1e-12);
        s.wind_speed_10m_ms = Some(1.0);
        assert!((model.shear_exponent(&s) - MAX_DYNAMIC_SHEAR).abs() < 1e-12);
        s.wind_speed_10m_ms = Some(10.0 / 10f64.powf(0.3));
        assert!((model.shear_exponent(&s) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_air_density_sources() {
        let sea = GeoPoint { lat: 0.0, lon: 0.0, elevation_m: None };
        assert_eq!(air_density(&sample(5.0), &sea), STANDARD_AIR_DENSITY);

        let mut s = sample(5.0);
        s.pressure_hpa = Some(1013.25);
        s.temperature_c = Some(15.0);
        assert!((air_density(&s, &sea) - 1.225).abs() < 0.001);

        let mountain = GeoPoint { elevation_m: Some(1500.0), ..sea };
        let thin = air_density(&sample(5.0), &mountain);
        assert!(thin < 1.06 && thin > 1.03);
    }

    #[test]
    fn test_density_correction_capped_at_rated() {
        let model = WindModel::new(WindConfig::default());
        let turbine = spec(1, 100.0).turbine;
        assert_eq!(model.turbine_power_kw(&turbine, 20.0, 1.35), 3000.0);
        let thin = model.turbine_power_kw(&turbine, 8.0, 1.225 * 0.9);
        assert!((thin - 886.0 * 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_cut_in_and_cut_out_produce_nothing() {
        let model = WindModel::new(WindConfig::default());
        let out = model.produce(&series(&[0.5, 2.0, 3.4, 26.0, 40.0]), &spec(3, 100.0));
        assert!(out.hourly.iter().all(|h| h.production_kwh == 0.0));
    }

    #[test]
    fn test_constant_wind_at_hub_height() {
        let mut config = WindConfig::default();
        config.wake.enabled = false;
        let model = WindModel::new(config);
        let out = model.produce(&series(&[8.0; 24]), &spec(10, 100.0));

        assert_eq!(out.hourly.len(), 24);
        assert!(out.hourly.iter().all(|h| (h.production_kwh - 8860.0).abs() < 1e-9));
        assert_eq!(out.capacity_kw, 30_000.0);
        assert_eq!(out.wake_efficiency, Some(1.0));
    }

    #[test]
    fn test_linear_scaling_without_wake() {
        let mut config = WindConfig::default();
        config.wake.enabled = false;
        let model = WindModel::new(config);
        let speeds = [5.0, 7.5, 11.0, 14.0];
        let one = model.produce(&series(&speeds), &spec(1, 100.0)).total_kwh();
        let seven = model.produce(&series(&speeds), &spec(7, 100.0)).total_kwh();
        assert!((seven - 7.0 * one).abs() < 1e-6);
    }

    #[test]
    fn test_wake_loss_grows_with_count() {
        let wake = WakeModel::new(&WakeConfig::default(), RoughnessClass::Plains);
        let mut previous = wake.farm_efficiency(1, None);
        assert_eq!(previous, 1.0);
        for n in 2..50 {
            let eta = wake.farm_efficiency(n, None);
            assert!(eta < previous && eta > 0.0);
            previous = eta;
        }
    }

    #[test]
    fn test_wake_loss_shrinks_with_spacing() {
        let tight = WakeModel::new(
            &WakeConfig { spacing_diameters: 4.0, ..WakeConfig::default() },
            RoughnessClass::Plains,
        );
        let wide = WakeModel::new(
            &WakeConfig { spacing_diameters: 10.0, ..WakeConfig::default() },
            RoughnessClass::Plains,
        );
        assert!(tight.full_wake_loss() > wide.full_wake_loss());
        assert!(tight.farm_efficiency(10, None) < wide.farm_efficiency(10, None));
    }

    #[test]
    fn test_row_bearing_uses_direction() {
        let wake = WakeModel::new(
            &WakeConfig { row_bearing_deg: Some(90.0), ..WakeConfig::default() },
            RoughnessClass::Plains,
        );
        assert!((wake.farm_efficiency(5, Some(0.0)) - 1.0).abs() < 1e-12);
        let along = wake.farm_efficiency(5, Some(270.0));
        assert!((along - (1.0 - wake.full_wake_loss() * 0.8)).abs() < 1e-9);
    }

    #[test]
    fn test_farm_output_with_wake_reports_factor() {
        let model = WindModel::new(WindConfig::default());
        let out = model.produce(&series(&[9.0; 10]), &spec(10, 100.0));
        let eta = out.wake_efficiency.unwrap();
        assert!(eta < 1.0 && eta > 0.8);
        assert!((out.total_kwh() - 1273.0 * 10.0 * 10.0 * eta).abs() < 1e-6);

        let single = model.produce(&series(&[9.0; 10]), &spec(1, 100.0));
        assert_eq!(single.wake_efficiency, None);
    }
}
