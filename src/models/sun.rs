use chrono::{DateTime, Datelike, Timelike, Utc};
use std::f64::consts::PI;

/// Solar constant (W/m²)
const SOLAR_CONSTANT: f64 = 1361.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunPosition {
    pub zenith_deg: f64,
    /// Degrees clockwise from north
    pub azimuth_deg: f64,
    /// Extraterrestrial normal irradiance for the day of year (W/m²)
    pub extraterrestrial_w_m2: f64,
}

impl SunPosition {
    pub fn is_up(&self) -> bool {
        self.zenith_deg < 90.0
    }
}

/// Low-precision sun position (Spencer 1971 series), good to a fraction of
/// a degree, which is plenty for hourly energy sums.
pub fn sun_position(at: DateTime<Utc>, lat_deg: f64, lon_deg: f64) -> SunPosition {
    let ut_hours = at.hour() as f64 + at.minute() as f64 / 60.0 + at.second() as f64 / 3600.0;
    let day_angle = 2.0 * PI * (at.ordinal() as f64 - 1.0 + (ut_hours - 12.0) / 24.0) / 365.0;

    let declination = 0.006918 - 0.399912 * day_angle.cos() + 0.070257 * day_angle.sin()
        - 0.006758 * (2.0 * day_angle).cos()
        + 0.000907 * (2.0 * day_angle).sin()
        - 0.002697 * (3.0 * day_angle).cos()
        + 0.00148 * (3.0 * day_angle).sin();

    let eot_minutes = 229.18
        * (0.000075 + 0.001868 * day_angle.cos()
            - 0.032077 * day_angle.sin()
            - 0.014615 * (2.0 * day_angle).cos()
            - 0.040849 * (2.0 * day_angle).sin());

    let true_solar_minutes = ut_hours * 60.0 + 4.0 * lon_deg + eot_minutes;
    let hour_angle = (true_solar_minutes / 4.0 - 180.0).to_radians();

    let lat = lat_deg.to_radians();
    let cos_zenith = (lat.sin() * declination.sin()
        + lat.cos() * declination.cos() * hour_angle.cos())
    .clamp(-1.0, 1.0);
    let zenith = cos_zenith.acos();

    let azimuth_from_south = hour_angle
        .sin()
        .atan2(hour_angle.cos() * lat.sin() - declination.tan() * lat.cos());
    let azimuth_deg = (azimuth_from_south.to_degrees() + 180.0).rem_euclid(360.0);

    let eccentricity = 1.00011
        + 0.034221 * day_angle.cos()
        + 0.00128 * day_angle.sin()
        + 0.000719 * (2.0 * day_angle).cos()
        + 0.000077 * (2.0 * day_angle).sin();

    SunPosition {
        zenith_deg: zenith.to_degrees(),
        azimuth_deg,
        extraterrestrial_w_m2: SOLAR_CONSTANT * eccentricity,
    }
}

/// Kasten & Young (1989) relative air mass; `None` with the sun down
pub fn relative_air_mass(zenith_deg: f64) -> Option<f64> {
    if zenith_deg >= 90.0 {
        return None;
    }
    let cos_z = zenith_deg.to_radians().cos();
    Some(1.0 / (cos_z + 0.50572 * (96.07995 - zenith_deg).powf(-1.6364)))
}

/// Cosine of the angle between the sun and a surface normal
pub fn cos_incidence(sun: &SunPosition, tilt_deg: f64, surface_azimuth_deg: f64) -> f64 {
    let zenith = sun.zenith_deg.to_radians();
    let tilt = tilt_deg.to_radians();
    zenith.cos() * tilt.cos()
        + zenith.sin() * tilt.sin() * (sun.azimuth_deg - surface_azimuth_deg).to_radians().cos()
}
