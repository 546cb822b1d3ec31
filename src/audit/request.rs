use crate::config::SolarConfig;
use crate::data::types::HourRange;
use crate::models::solar::SolarEquipmentSpec;
use crate::models::turbines::TurbineLibrary;
use crate::models::wind::WindEquipmentSpec;
use crate::models::Technology;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::ops::RangeInclusive;

const DEFAULT_TURBINE: &str = "Vestas V90 3MW";

/// Years covered by the reanalysis archive and the price model
const AUDIT_YEARS: RangeInclusive<i64> = 1940..=2100;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing field '{0}'")]
    Missing(&'static str),

    #[error("'{field}' must be a number, got '{value}'")]
    NotANumber { field: &'static str, value: String },

    #[error("'{field}' must be text, got {value}")]
    NotText { field: &'static str, value: String },

    #[error("unknown technology '{0}' (expected wind or solar)")]
    UnknownTechnology(String),

    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),

    #[error("'{field}' is not a date (expected YYYY-MM-DD or YYYY-MM-DDTHH:MM): '{value}'")]
    DateFormat { field: &'static str, value: String },

    #[error("'{field}' must fall on a whole hour, got '{value}'")]
    NotHourAligned { field: &'static str, value: String },

    #[error("end {end} must be after start {start}")]
    DateRange { start: DateTime<Utc>, end: DateTime<Utc> },

    #[error("year {0} is out of range (1940 to 2100)")]
    Year(i64),

    #[error("window of {hours} hours exceeds the limit of {max}")]
    WindowTooLong { hours: usize, max: usize },

    #[error("unknown turbine model '{name}' (known: {known})")]
    UnknownTurbine { name: String, known: String },

    #[error("turbine count must be a whole number of at least 1, got {0}")]
    TurbineCount(f64),

    #[error("hub height must be positive, got {0} m")]
    HubHeight(f64),

    #[error("peak power must be positive, got {0} kWp")]
    PeakPower(f64),

    #[error("panel tilt must be within [0, 90], got {0}°")]
    Tilt(f64),

    #[error("panel azimuth must be within [0, 360], got {0}°")]
    Azimuth(f64),

    #[error("company payment must be a non-negative amount, got {0}")]
    Payment(f64),
}

/// A form field as posted by a client. Anything that is neither a number
/// nor a string lands in `Other` and is rejected when the field is read.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Number(f64),
    Text(String),
    Other(Value),
}

impl FormValue {
    /// JSON number or numeric string; a blank string counts as absent
    fn number(&self, field: &'static str) -> Result<Option<f64>, ValidationError> {
        match self {
            FormValue::Number(n) => Ok(Some(*n)),
            FormValue::Text(s) if s.trim().is_empty() => Ok(None),
            FormValue::Text(s) => s
                .trim()
                .replace(',', ".")
                .parse::<f64>()
                .map(Some)
                .map_err(|_| ValidationError::NotANumber {
                    field,
                    value: s.clone(),
                }),
            FormValue::Other(v) => Err(ValidationError::NotANumber {
                field,
                value: v.to_string(),
            }),
        }
    }

    /// Trimmed string; a blank string counts as absent
    fn text(&self, field: &'static str) -> Result<Option<&str>, ValidationError> {
        match self {
            FormValue::Text(s) if s.trim().is_empty() => Ok(None),
            FormValue::Text(s) => Ok(Some(s.trim())),
            FormValue::Number(n) => Err(ValidationError::NotText {
                field,
                value: n.to_string(),
            }),
            FormValue::Other(v) => Err(ValidationError::NotText {
                field,
                value: v.to_string(),
            }),
        }
    }
}

/// `data` payload of a `deep_audit` request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditInput {
    #[serde(rename = "type", default)]
    pub technology: Option<FormValue>,
    pub lat: Option<FormValue>,
    pub lon: Option<FormValue>,
    pub start_date: Option<FormValue>,
    pub end_date: Option<FormValue>,
    pub company_payment: Option<FormValue>,

    pub turbine_model: Option<FormValue>,
    pub num_turbines: Option<FormValue>,
    pub hub_height_m: Option<FormValue>,

    pub peak_power_kwp: Option<FormValue>,
    pub year: Option<FormValue>,
    pub tilt_deg: Option<FormValue>,
    pub azimuth_deg: Option<FormValue>,
    pub temperature_coefficient: Option<FormValue>,
}

/// A validated audit request
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRequest {
    pub technology: Technology,
    pub lat: f64,
    pub lon: f64,
    pub range: HourRange,
    pub company_payment_eur: f64,
}

fn number(value: &Option<FormValue>, field: &'static str) -> Result<Option<f64>, ValidationError> {
    match value {
        Some(v) => v.number(field),
        None => Ok(None),
    }
}

fn required(value: &Option<FormValue>, field: &'static str) -> Result<f64, ValidationError> {
    number(value, field)?.ok_or(ValidationError::Missing(field))
}

fn text<'a>(value: &'a Option<FormValue>, field: &'static str) -> Result<Option<&'a str>, ValidationError> {
    match value {
        Some(v) => v.text(field),
        None => Ok(None),
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

/// `YYYY-MM-DD` (start of day for a start bound, last hour for an end bound)
/// or an explicit `YYYY-MM-DDTHH:MM[:SS]` / RFC 3339 instant on a whole hour
fn parse_date(value: &str, field: &'static str, bound: Bound) -> Result<DateTime<Utc>, ValidationError> {
    let dt = parse_instant(value, field, bound)?;
    if dt.minute() != 0 || dt.second() != 0 || dt.nanosecond() != 0 {
        return Err(ValidationError::NotHourAligned {
            field,
            value: value.to_string(),
        });
    }
    let year = dt.year() as i64;
    if !AUDIT_YEARS.contains(&year) {
        return Err(ValidationError::Year(year));
    }
    Ok(dt)
}

fn parse_instant(value: &str, field: &'static str, bound: Bound) -> Result<DateTime<Utc>, ValidationError> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let time = match bound {
            Bound::Start => NaiveTime::MIN,
            Bound::End => NaiveTime::from_hms_opt(23, 0, 0).unwrap_or(NaiveTime::MIN),
        };
        return Ok(Utc.from_utc_datetime(&date.and_time(time)));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(ValidationError::DateFormat {
        field,
        value: value.to_string(),
    })
}

fn whole_year(year: f64) -> Result<HourRange, ValidationError> {
    let y = year as i64;
    if year.fract() != 0.0 || !AUDIT_YEARS.contains(&y) {
        return Err(ValidationError::Year(y));
    }
    let start = NaiveDate::from_ymd_opt(y as i32, 1, 1).ok_or(ValidationError::Year(y))?;
    let end = NaiveDate::from_ymd_opt(y as i32, 12, 31).ok_or(ValidationError::Year(y))?;
    let last_hour = NaiveTime::from_hms_opt(23, 0, 0).unwrap_or(NaiveTime::MIN);
    Ok(HourRange::new(
        Utc.from_utc_datetime(&start.and_time(NaiveTime::MIN)),
        Utc.from_utc_datetime(&end.and_time(last_hour)),
    ))
}

impl AuditRequest {
    /// Turn a raw payload into a validated request
    pub fn parse(
        input: &AuditInput,
        turbines: &TurbineLibrary,
        solar: &SolarConfig,
    ) -> Result<Self, ValidationError> {
        let tag = text(&input.technology, "type")?
            .map(str::to_lowercase)
            .ok_or(ValidationError::Missing("type"))?;

        let lat = required(&input.lat, "lat")?;
        let lon = required(&input.lon, "lon")?;
        let company_payment_eur = required(&input.company_payment, "company_payment")?;

        let technology = match tag.as_str() {
            "wind" | "eolica" => {
                let name = text(&input.turbine_model, "turbine_model")?.unwrap_or(DEFAULT_TURBINE);
                let turbine = turbines
                    .get(name)
                    .ok_or_else(|| ValidationError::UnknownTurbine {
                        name: name.to_string(),
                        known: turbines.names().join(", "),
                    })?
                    .clone();

                let count = number(&input.num_turbines, "num_turbines")?.unwrap_or(1.0);
                if count.fract() != 0.0 || count < 1.0 || count > u32::MAX as f64 {
                    return Err(ValidationError::TurbineCount(count));
                }
                let hub_height_m = number(&input.hub_height_m, "hub_height_m")?.unwrap_or(turbine.hub_height_m);

                Technology::Wind(WindEquipmentSpec {
                    turbine,
                    hub_height_m,
                    turbine_count: count as u32,
                })
            }
            "solar" | "fotovoltaica" => Technology::Solar(SolarEquipmentSpec {
                peak_power_kwp: required(&input.peak_power_kwp, "peak_power_kwp")?,
                tilt_deg: number(&input.tilt_deg, "tilt_deg")?.unwrap_or(solar.default_tilt_deg),
                azimuth_deg: number(&input.azimuth_deg, "azimuth_deg")?.unwrap_or(solar.default_azimuth_deg),
                temperature_coefficient: number(&input.temperature_coefficient, "temperature_coefficient")?
                    .unwrap_or(solar.temperature_coefficient),
            }),
            other => return Err(ValidationError::UnknownTechnology(other.to_string())),
        };

        let start = text(&input.start_date, "start_date")?;
        let end = text(&input.end_date, "end_date")?;
        let year = number(&input.year, "year")?;

        let range = match (start, end, year, &technology) {
            (Some(start), Some(end), _, _) => {
                let start = parse_date(start, "start_date", Bound::Start)?;
                let end = parse_date(end, "end_date", Bound::End)?;
                HourRange::new(start, end)
            }
            (None, None, Some(year), Technology::Solar(_)) => whole_year(year)?,
            (None, _, _, _) => return Err(ValidationError::Missing("start_date")),
            (Some(_), None, _, _) => return Err(ValidationError::Missing("end_date")),
        };

        let request = Self {
            technology,
            lat,
            lon,
            range,
            company_payment_eur,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.lat.abs() <= 90.0) {
            return Err(ValidationError::Latitude(self.lat));
        }
        if !(self.lon.abs() <= 180.0) {
            return Err(ValidationError::Longitude(self.lon));
        }
        if self.range.start >= self.range.end {
            return Err(ValidationError::DateRange {
                start: self.range.start,
                end: self.range.end,
            });
        }
        if !(self.company_payment_eur >= 0.0) || !self.company_payment_eur.is_finite() {
            return Err(ValidationError::Payment(self.company_payment_eur));
        }

        match &self.technology {
            Technology::Wind(spec) => {
                if spec.turbine_count < 1 {
                    return Err(ValidationError::TurbineCount(spec.turbine_count as f64));
                }
                if !(spec.hub_height_m > 0.0) || !spec.hub_height_m.is_finite() {
                    return Err(ValidationError::HubHeight(spec.hub_height_m));
                }
            }
            Technology::Solar(spec) => {
                if !(spec.peak_power_kwp > 0.0) || !spec.peak_power_kwp.is_finite() {
                    return Err(ValidationError::PeakPower(spec.peak_power_kwp));
                }
                if !(0.0..=90.0).contains(&spec.tilt_deg) {
                    return Err(ValidationError::Tilt(spec.tilt_deg));
                }
                if !(0.0..=360.0).contains(&spec.azimuth_deg) {
                    return Err(ValidationError::Azimuth(spec.azimuth_deg));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<AuditRequest, ValidationError> {
        let input: AuditInput = serde_json::from_value(value).unwrap();
        AuditRequest::parse(&input, &TurbineLibrary::builtin(), &SolarConfig::default())
    }

    fn wind_input() -> serde_json::Value {
        json!({
            "type": "wind",
            "lat": 42.5,
            "lon": -7.8,
            "turbine_model": "Vestas V90 3MW",
            "num_turbines": 10,
            "start_date": "2024-01-01",
            "end_date": "2024-03-31",
            "company_payment": 250000
        })
    }

    #[test]
    fn test_wind_request_spans_whole_days() {
        let request = parse(wind_input()).unwrap();
        assert_eq!(request.range.hours(), 91 * 24);
        assert_eq!(request.range.start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(request.range.end, Utc.with_ymd_and_hms(2024, 3, 31, 23, 0, 0).unwrap());
        match request.technology {
            Technology::Wind(spec) => {
                assert_eq!(spec.turbine_count, 10);
                assert_eq!(spec.hub_height_m, 105.0);
            }
            other => panic!("expected wind, got {:?}", other),
        }
    }

    #[test]
    fn test_form_strings_are_numbers() {
        let request = parse(json!({
            "type": "Solar",
            "lat": "40.4",
            "lon": "-3,7",
            "peak_power_kwp": "1000",
            "year": "2023",
            "company_payment": "95000.50"
        }))
        .unwrap();

        assert_eq!(request.lon, -3.7);
        assert_eq!(request.company_payment_eur, 95000.5);
        assert_eq!(request.range.hours(), 8760);
        match request.technology {
            Technology::Solar(spec) => {
                assert_eq!(spec.peak_power_kwp, 1000.0);
                assert_eq!(spec.tilt_deg, 30.0);
                assert_eq!(spec.azimuth_deg, 180.0);
            }
            other => panic!("expected solar, got {:?}", other),
        }
    }

    #[test]
    fn test_explicit_hours() {
        let mut input = wind_input();
        input["start_date"] = json!("2024-01-01T06:00");
        input["end_date"] = json!("2024-01-01T18:00:00Z");
        let request = parse(input).unwrap();
        assert_eq!(request.range.hours(), 13);
    }

    #[test]
    fn test_rejections() {
        let cases = [
            ("lat", json!(91.0), ValidationError::Latitude(91.0)),
            ("lon", json!(-180.5), ValidationError::Longitude(-180.5)),
            ("num_turbines", json!(0), ValidationError::TurbineCount(0.0)),
            ("num_turbines", json!("-3"), ValidationError::TurbineCount(-3.0)),
            ("num_turbines", json!("1.5"), ValidationError::TurbineCount(1.5)),
            ("company_payment", json!(-1), ValidationError::Payment(-1.0)),
            ("type", json!("hydro"), ValidationError::UnknownTechnology("hydro".into())),
        ];
        for (field, value, expected) in cases {
            let mut input = wind_input();
            input[field] = value;
            assert_eq!(parse(input).unwrap_err(), expected, "field {}", field);
        }
    }

    #[test]
    fn test_date_range_must_move_forward() {
        let mut input = wind_input();
        input["start_date"] = json!("2024-03-01");
        input["end_date"] = json!("2024-02-01");
        assert!(matches!(parse(input).unwrap_err(), ValidationError::DateRange { .. }));

        let mut input = wind_input();
        input["start_date"] = json!("2024-01-01T05:00");
        input["end_date"] = json!("2024-01-01T05:00");
        assert!(matches!(parse(input).unwrap_err(), ValidationError::DateRange { .. }));
    }

    #[test]
    fn test_bad_inputs_name_the_field() {
        let mut input = wind_input();
        input["lat"] = json!("north");
        assert_eq!(
            parse(input).unwrap_err(),
            ValidationError::NotANumber { field: "lat", value: "north".into() }
        );

        let mut input = wind_input();
        input["start_date"] = json!("01/01/2024");
        assert!(matches!(
            parse(input).unwrap_err(),
            ValidationError::DateFormat { field: "start_date", .. }
        ));

        let mut input = wind_input();
        input["turbine_model"] = json!("Acme 9000");
        assert!(matches!(parse(input).unwrap_err(), ValidationError::UnknownTurbine { .. }));
    }

    #[test]
    fn test_solar_needs_peak_power() {
        let input = json!({
            "type": "solar", "lat": 40.0, "lon": -3.0, "year": 2023, "company_payment": 0
        });
        assert_eq!(parse(input).unwrap_err(), ValidationError::Missing("peak_power_kwp"));

        let input = json!({
            "type": "solar", "lat": 40.0, "lon": -3.0, "year": 2023,
            "peak_power_kwp": 0, "company_payment": 0
        });
        assert_eq!(parse(input).unwrap_err(), ValidationError::PeakPower(0.0));
    }

    #[test]
    fn test_wind_defaults() {
        let request = parse(json!({
            "type": "wind", "lat": 42.0, "lon": -8.0,
            "start_date": "2024-01-01", "end_date": "2024-01-02",
            "company_payment": 1000
        }))
        .unwrap();
        match request.technology {
            Technology::Wind(spec) => {
                assert_eq!(spec.turbine.name, "Vestas V90 3MW");
                assert_eq!(spec.turbine_count, 1);
            }
            other => panic!("expected wind, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_json_types_name_the_field() {
        let mut input = wind_input();
        input["lat"] = json!(true);
        assert_eq!(
            parse(input).unwrap_err(),
            ValidationError::NotANumber { field: "lat", value: "true".into() }
        );

        let mut input = wind_input();
        input["company_payment"] = json!({"amount": 10});
        assert!(matches!(
            parse(input).unwrap_err(),
            ValidationError::NotANumber { field: "company_payment", .. }
        ));

        let mut input = wind_input();
        input["start_date"] = json!(20240101);
        assert_eq!(
            parse(input).unwrap_err(),
            ValidationError::NotText { field: "start_date", value: "20240101".into() }
        );

        let mut input = wind_input();
        input["type"] = json!(["wind"]);
        assert!(matches!(parse(input).unwrap_err(), ValidationError::NotText { field: "type", .. }));
    }

    #[test]
    fn test_explicit_dates_share_the_year_bounds() {
        let mut input = wind_input();
        input["start_date"] = json!("0001-01-01");
        input["end_date"] = json!("9999-12-31");
        assert_eq!(parse(input).unwrap_err(), ValidationError::Year(1));

        let mut input = wind_input();
        input["start_date"] = json!("2100-12-01");
        input["end_date"] = json!("2101-01-01");
        assert_eq!(parse(input).unwrap_err(), ValidationError::Year(2101));

        let mut input = wind_input();
        input["start_date"] = json!("1940-01-01");
        input["end_date"] = json!("1940-01-02");
        assert_eq!(parse(input).unwrap().range.hours(), 48);
    }

    #[test]
    fn test_sub_hour_bounds_are_rejected() {
        let mut input = wind_input();
        input["start_date"] = json!("2024-01-01T06:30");
        assert_eq!(
            parse(input).unwrap_err(),
            ValidationError::NotHourAligned { field: "start_date", value: "2024-01-01T06:30".into() }
        );

        let mut input = wind_input();
        input["start_date"] = json!("2024-01-01T06:00");
        input["end_date"] = json!("2024-01-01T18:00:30Z");
        assert!(matches!(
            parse(input).unwrap_err(),
            ValidationError::NotHourAligned { field: "end_date", .. }
        ));
    }

    #[test]
    fn test_turbine_count_message_keeps_the_input() {
        let mut input = wind_input();
        input["num_turbines"] = json!("1.5");
        let message = parse(input).unwrap_err().to_string();
        assert!(message.ends_with("got 1.5"), "{}", message);
    }
}
