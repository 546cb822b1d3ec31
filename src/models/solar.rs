use crate::config::SolarConfig;
use crate::data::types::{ResourceSeries, SolarSample};
use crate::models::sun::{cos_incidence, relative_air_mass, sun_position, SunPosition};
use crate::models::{HourlyProduction, ModelOutput, ProductionModel};
use chrono::Duration;
use serde::Serialize;

/// Standard test condition irradiance and cell temperature
const STC_IRRADIANCE: f64 = 1000.0;
const STC_CELL_TEMP_C: f64 = 25.0;

/// Above this zenith DNI derived from GHI - DHI is numerically meaningless
const MAX_ZENITH_FOR_DNI: f64 = 87.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolarEquipmentSpec {
    pub peak_power_kwp: f64,
    pub tilt_deg: f64,
    /// Degrees clockwise from north (180 = due south)
    pub azimuth_deg: f64,
    /// Relative power change per °C of cell temperature (e.g. -0.004)
    pub temperature_coefficient: f64,
}

/// Fixed-tilt PV plant: Perez transposition, Faiman cell temperature,
/// linear temperature derate and a flat inverter efficiency
pub struct SolarModel {
    config: SolarConfig,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneOfArray {
    pub beam: f64,
    pub sky_diffuse: f64,
    pub ground: f64,
}

impl PlaneOfArray {
    pub fn total(&self) -> f64 {
        self.beam + self.sky_diffuse + self.ground
    }
}

impl SolarModel {
    pub fn new(config: SolarConfig) -> Self {
        Self { config }
    }

    /// Hourly energy (kWh) for one sample, given the sun for that hour
    pub fn hour_energy_kwh(&self, sample: &SolarSample, sun: &SunPosition, spec: &SolarEquipmentSpec) -> f64 {
        if sample.ghi_w_m2 <= 0.0 || !sun.is_up() {
            return 0.0;
        }

        let ghi = sample.ghi_w_m2;
        let dhi = sample.dhi_w_m2.clamp(0.0, ghi);
        let dni = sample
            .dni_w_m2
            .unwrap_or_else(|| derive_dni(ghi, dhi, sun.zenith_deg))
            .max(0.0);

        let poa = perez_transpose(sun, spec.tilt_deg, spec.azimuth_deg, ghi, dhi, dni, self.config.albedo).total();
        if poa <= 0.0 {
            return 0.0;
        }

        let wind = sample.wind_speed_ms.unwrap_or(self.config.default_wind_speed_ms);
        let cell_temp = faiman_cell_temperature(
            sample.temperature_c,
            poa,
            wind,
            self.config.faiman_u0,
            self.config.faiman_u1,
        );
        let derate = (1.0 + spec.temperature_coefficient * (cell_temp - STC_CELL_TEMP_C)).max(0.0);

        spec.peak_power_kwp * (poa / STC_IRRADIANCE) * derate * self.config.inverter_efficiency
    }
}

impl ProductionModel for SolarModel {
    type Sample = SolarSample;
    type Spec = SolarEquipmentSpec;

    fn produce(&self, resource: &ResourceSeries<SolarSample>, spec: &SolarEquipmentSpec) -> ModelOutput {
        let location = &resource.location;
        let hourly = resource
            .samples
            .iter()
            .map(|sample| {
                // Radiation values are preceding-hour means; place the sun mid-interval
                let mid = sample.timestamp - Duration::minutes(30);
                let sun = sun_position(mid, location.lat, location.lon);
                HourlyProduction {
                    timestamp: sample.timestamp,
                    production_kwh: self.hour_energy_kwh(sample, &sun, spec),
                }
            })
            .collect();

        ModelOutput {
            hourly,
            capacity_kw: spec.peak_power_kwp,
            wake_efficiency: None,
        }
    }
}

fn derive_dni(ghi: f64, dhi: f64, zenith_deg: f64) -> f64 {
    if zenith_deg >= MAX_ZENITH_FOR_DNI {
        return 0.0;
    }
    (ghi - dhi) / zenith_deg.to_radians().cos()
}

/// Faiman (2008) module temperature: T_amb + POA / (U0 + U1·wind)
pub fn faiman_cell_temperature(ambient_c: f64, poa_w_m2: f64, wind_ms: f64, u0: f64, u1: f64) -> f64 {
    ambient_c + poa_w_m2 / (u0 + u1 * wind_ms.max(0.0))
}

/// Perez (1990) anisotropic sky, "all sites composite" coefficients.
/// Rows: F11, F12, F13, F21, F22, F23 per sky clearness bin.
const PEREZ_COEFFICIENTS: [[f64; 6]; 8] = [
    [-0.0083117, 0.5877285, -0.0620636, -0.0596012, 0.0721249, -0.0220216],
    [0.1299457, 0.6825954, -0.1513752, -0.0189325, 0.0659650, -0.0288748],
    [0.3296958, 0.4868735, -0.2210958, 0.0554140, -0.0639588, -0.0260542],
    [0.5682053, 0.1874525, -0.2951290, 0.1088631, -0.1519229, -0.0139754],
    [0.8730280, -0.3920403, -0.3616149, 0.2255647, -0.4620442, 0.0012448],
    [1.1326077, -1.2367284, -0.4118494, 0.2877813, -0.8230357, 0.0558651],
    [1.0601591, -1.5999137, -0.3589221, 0.2642124, -1.1272340, 0.1310694],
    [0.6777470, -0.3272588, -0.2504286, 0.1561313, -1.3765031, 0.2506212],
];

/// Upper edges of the sky clearness (ε) bins
const CLEARNESS_BINS: [f64; 7] = [1.065, 1.23, 1.5, 1.95, 2.8, 4.5, 6.2];

pub fn perez_transpose(
    sun: &SunPosition,
    tilt_deg: f64,
    surface_azimuth_deg: f64,
    ghi: f64,
    dhi: f64,
    dni: f64,
    albedo: f64,
) -> PlaneOfArray {
    let tilt = tilt_deg.to_radians();
    let cos_theta = cos_incidence(sun, tilt_deg, surface_azimuth_deg);

    let beam = (dni * cos_theta).max(0.0);
    let ground = ghi * albedo * (1.0 - tilt.cos()) / 2.0;

    let sky_diffuse = match relative_air_mass(sun.zenith_deg) {
        Some(air_mass) if dhi > 0.0 => {
            let z = sun.zenith_deg.to_radians();
            let kappa_z3 = 1.041 * z.powi(3);
            let clearness = ((dhi + dni) / dhi + kappa_z3) / (1.0 + kappa_z3);
            let brightness = dhi * air_mass / sun.extraterrestrial_w_m2;

            let bin = CLEARNESS_BINS.iter().take_while(|edge| clearness >= **edge).count();
            let [f11, f12, f13, f21, f22, f23] = PEREZ_COEFFICIENTS[bin];
            let f1 = (f11 + f12 * brightness + f13 * z).max(0.0);
            let f2 = f21 + f22 * brightness + f23 * z;

            let a = cos_theta.max(0.0);
            let b = z.cos().max(85f64.to_radians().cos());
            let isotropic = (1.0 - f1) * (1.0 + tilt.cos()) / 2.0;
            (dhi * (isotropic + f1 * a / b + f2 * tilt.sin())).max(0.0)
        }
        _ => 0.0,
    };

    PlaneOfArray {
        beam,
        sky_diffuse,
        ground,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::GeoPoint;
    use chrono::{TimeZone, Utc};

    fn spec() -> SolarEquipmentSpec {
        SolarEquipmentSpec {
            peak_power_kwp: 1000.0,
            tilt_deg: 30.0,
            azimuth_deg: 180.0,
            temperature_coefficient: -0.004,
        }
    }

    fn sample(hour: u32, ghi: f64, dhi: f64, temp: f64) -> SolarSample {
        SolarSample {
            timestamp: Utc.with_ymd_and_hms(2023, 1, 15, hour, 0, 0).unwrap(),
            ghi_w_m2: ghi,
            dhi_w_m2: dhi,
            dni_w_m2: None,
            temperature_c: temp,
            wind_speed_ms: Some(2.0),
        }
    }

    fn series(samples: Vec<SolarSample>) -> ResourceSeries<SolarSample> {
        ResourceSeries {
            location: GeoPoint { lat: 42.5, lon: -7.8, elevation_m: None },
            samples,
        }
    }

    fn noon_sun() -> SunPosition {
        sun_position(Utc.with_ymd_and_hms(2023, 1, 15, 12, 30, 0).unwrap(), 42.5, -7.8)
    }

    #[test]
    fn test_horizontal_plane_returns_ghi() {
        let sun = noon_sun();
        let dni = derive_dni(400.0, 120.0, sun.zenith_deg);
        let poa = perez_transpose(&sun, 0.0, 180.0, 400.0, 120.0, dni, 0.2);
        assert!((poa.total() - 400.0).abs() < 1e-6, "poa {}", poa.total());
        assert_eq!(poa.ground, 0.0);
    }

    #[test]
    fn test_winter_tilt_gains_over_horizontal() {
        let sun = noon_sun();
        let dni = derive_dni(400.0, 100.0, sun.zenith_deg);
        let tilted = perez_transpose(&sun, 30.0, 180.0, 400.0, 100.0, dni, 0.2);
        assert!(tilted.total() > 400.0 * 1.2);
        let north = perez_transpose(&sun, 30.0, 0.0, 400.0, 100.0, dni, 0.2);
        assert!(north.total() < 400.0);
        assert_eq!(north.beam, 0.0);
    }

    #[test]
    fn test_night_produces_nothing_even_when_warm() {
        let model = SolarModel::new(SolarConfig::default());
        let out = model.produce(
            &series(vec![sample(0, 0.0, 0.0, 35.0), sample(2, 0.0, 0.0, -10.0), sample(23, 0.0, 0.0, 20.0)]),
            &spec(),
        );
        assert!(out.hourly.iter().all(|h| h.production_kwh == 0.0));
    }

    #[test]
    fn test_irradiance_with_sun_down_is_ignored() {
        let model = SolarModel::new(SolarConfig::default());
        let out = model.produce(&series(vec![sample(3, 150.0, 80.0, 10.0)]), &spec());
        assert_eq!(out.hourly[0].production_kwh, 0.0);
    }

    #[test]
    fn test_heat_derates_output() {
        let model = SolarModel::new(SolarConfig::default());
        let sun = noon_sun();
        let cold = model.hour_energy_kwh(&sample(13, 450.0, 120.0, 0.0), &sun, &spec());
        let hot = model.hour_energy_kwh(&sample(13, 450.0, 120.0, 40.0), &sun, &spec());
        assert!(cold > hot && hot > 0.0);

        let dni = derive_dni(450.0, 120.0, sun.zenith_deg);
        let poa = perez_transpose(&sun, 30.0, 180.0, 450.0, 120.0, dni, 0.2).total();
        let cell_cold = faiman_cell_temperature(0.0, poa, 2.0, 25.0, 6.84);
        let expected = (1.0 - 0.004 * (cell_cold + 40.0 - 25.0)) / (1.0 - 0.004 * (cell_cold - 25.0));
        assert!((hot / cold - expected).abs() < 1e-9);
    }

    #[test]
    fn test_derate_never_goes_negative() {
        let model = SolarModel::new(SolarConfig::default());
        let extreme = SolarEquipmentSpec {
            temperature_coefficient: -0.05,
            ..spec()
        };
        let kwh = model.hour_energy_kwh(&sample(13, 900.0, 100.0, 60.0), &noon_sun(), &extreme);
        assert_eq!(kwh, 0.0);
    }

    #[test]
    fn test_scales_linearly_with_peak_power() {
        let model = SolarModel::new(SolarConfig::default());
        let samples = vec![sample(11, 200.0, 90.0, 5.0), sample(13, 420.0, 110.0, 8.0)];
        let big = model.produce(&series(samples.clone()), &spec()).total_kwh();
        let small = model
            .produce(&series(samples), &SolarEquipmentSpec { peak_power_kwp: 250.0, ..spec() })
            .total_kwh();
        assert!(big > 0.0);
        assert!((big - 4.0 * small).abs() < 1e-9);
    }

    #[test]
    fn test_stc_like_hour_near_rating() {
        let model = SolarModel::new(SolarConfig::default());
        let sun = SunPosition { zenith_deg: 30.0, azimuth_deg: 180.0, extraterrestrial_w_m2: 1361.0 };
        let s = SolarSample {
            dni_w_m2: Some(1000.0),
            ghi_w_m2: 1000.0 * 30f64.to_radians().cos(),
            dhi_w_m2: 0.0,
            temperature_c: 25.0,
            wind_speed_ms: Some(1000.0),
            ..sample(12, 0.0, 0.0, 0.0)
        };
        let kwh = model.hour_energy_kwh(&s, &sun, &spec());
        // Panel faces the sun: POA ≈ 1000 W/m² plus a little ground reflection
        assert!(kwh > 0.96 * 1000.0 * 0.99 && kwh < 0.96 * 1000.0 * 1.03, "kwh {}", kwh);
    }
}
