use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive, hour-aligned window `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl HourRange {
    /// Build a range, truncating both ends to the hour
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: start.duration_trunc(Duration::hours(1)).unwrap_or(start),
            end: end.duration_trunc(Duration::hours(1)).unwrap_or(end),
        }
    }

    #[cfg(test)]
    pub fn single(hour: DateTime<Utc>) -> Self {
        Self::new(hour, hour)
    }

    /// Number of hourly samples in the window (H)
    pub fn hours(&self) -> usize {
        if self.end < self.start {
            return 0;
        }
        (self.end - self.start).num_hours() as usize + 1
    }

    pub fn hour_at(&self, index: usize) -> DateTime<Utc> {
        self.start + Duration::hours(index as i64)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }

    pub fn iter(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        (0..self.hours()).map(move |i| self.hour_at(i))
    }
}

impl fmt::Display for HourRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fmt = "%Y-%m-%dT%H:%MZ";
        if self.start == self.end {
            write!(f, "{}", self.start.format(fmt))
        } else {
            write!(f, "{} to {}", self.start.format(fmt), self.end.format(fmt))
        }
    }
}

/// Anything carried in an hourly series
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

fn timestamps_of<T: Timestamped>(items: &[T]) -> Vec<DateTime<Utc>> {
    items.iter().map(Timestamped::timestamp).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    /// Site elevation above sea level, when the provider reports it
    pub elevation_m: Option<f64>,
}

/// Wind variables at the provider's reference height
#[derive(Debug, Clone, PartialEq)]
pub struct WindSample {
    pub timestamp: DateTime<Utc>,
    pub wind_speed_ms: f64,
    pub wind_speed_10m_ms: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub temperature_c: Option<f64>,
    pub pressure_hpa: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolarSample {
    pub timestamp: DateTime<Utc>,
    /// Global horizontal irradiance (W/m²)
    pub ghi_w_m2: f64,
    /// Diffuse horizontal irradiance (W/m²)
    pub dhi_w_m2: f64,
    /// Direct normal irradiance, derived from GHI/DHI when absent
    pub dni_w_m2: Option<f64>,
    pub temperature_c: f64,
    pub wind_speed_ms: Option<f64>,
}

impl Timestamped for WindSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for SolarSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Debug, Clone)]
pub struct ResourceSeries<S> {
    pub location: GeoPoint,
    pub samples: Vec<S>,
}

/// Which variable set a resource fetch must return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Wind,
    Solar,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Wind => write!(f, "wind"),
            ResourceKind::Solar => write!(f, "solar"),
        }
    }
}

/// Resource data as returned by a provider, tagged by variable set
#[derive(Debug, Clone)]
pub enum ResourceData {
    Wind(ResourceSeries<WindSample>),
    Solar(ResourceSeries<SolarSample>),
}

impl ResourceData {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceData::Wind(_) => ResourceKind::Wind,
            ResourceData::Solar(_) => ResourceKind::Solar,
        }
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        match self {
            ResourceData::Wind(s) => timestamps_of(&s.samples),
            ResourceData::Solar(s) => timestamps_of(&s.samples),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price_eur_mwh: f64,
}

impl Timestamped for PricePoint {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Debug, Clone)]
pub struct PriceSeries {
    /// Human-readable origin, echoed in the result
    pub source: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        timestamps_of(&self.points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_hour_range_counts_inclusive() {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2023, 3, 31, 23, 0, 0).unwrap();
        assert_eq!(HourRange::new(start, end).hours(), 2160);
        assert_eq!(HourRange::single(start).hours(), 1);
    }

    #[test]
    fn test_hour_range_truncates_to_hour() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 42, 7).unwrap();
        let range = HourRange::new(start, start + Duration::hours(2));
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        assert_eq!(range.hours(), 3);
        assert_eq!(range.iter().last(), Some(range.end));
    }

    #[test]
    fn test_hour_range_display() {
        let hour = Utc.with_ymd_and_hms(2024, 1, 5, 3, 0, 0).unwrap();
        assert_eq!(HourRange::single(hour).to_string(), "2024-01-05T03:00Z");
        let range = HourRange::new(hour, hour + Duration::hours(1));
        assert_eq!(range.to_string(), "2024-01-05T03:00Z to 2024-01-05T04:00Z");
    }
}
