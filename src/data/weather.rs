use crate::data::provider::ResourceProvider;
use crate::data::types::{
    GeoPoint, HourRange, ResourceData, ResourceKind, ResourceSeries, SolarSample, WindSample,
};
use crate::error::{AuditError, AuditResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const PROVIDER: &str = "open-meteo";

const WIND_VARIABLES: &str =
    "wind_speed_100m,wind_direction_100m,wind_speed_10m,temperature_2m,surface_pressure";
const SOLAR_VARIABLES: &str =
    "shortwave_radiation,diffuse_radiation,direct_normal_irradiance,temperature_2m,wind_speed_10m";

/// ERA5 reanalysis through the Open-Meteo archive API
pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    #[serde(default)]
    elevation: Option<f64>,
    hourly: OpenMeteoHourly,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoHourly {
    time: Vec<String>,
    #[serde(default)]
    wind_speed_100m: Vec<Option<f64>>,
    #[serde(default)]
    wind_direction_100m: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    surface_pressure: Vec<Option<f64>>,
    #[serde(default)]
    shortwave_radiation: Vec<Option<f64>>,
    #[serde(default)]
    diffuse_radiation: Vec<Option<f64>>,
    #[serde(default)]
    direct_normal_irradiance: Vec<Option<f64>>,
}

impl OpenMeteoClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn request(
        &self,
        lat: f64,
        lon: f64,
        range: &HourRange,
        kind: ResourceKind,
    ) -> AuditResult<OpenMeteoResponse> {
        let variables = match kind {
            ResourceKind::Wind => WIND_VARIABLES,
            ResourceKind::Solar => SOLAR_VARIABLES,
        };
        let start_date = range.start.format("%Y-%m-%d").to_string();
        let end_date = range.end.format("%Y-%m-%d").to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("start_date", start_date),
                ("end_date", end_date),
                ("hourly", variables.to_string()),
                ("timezone", "GMT".to_string()),
                ("wind_speed_unit", "ms".to_string()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuditError::ProviderFailure {
                provider: PROVIDER.to_string(),
                message: format!("HTTP {}: {}", status.as_u16(), body.trim()),
            });
        }

        response.json().await.map_err(|e| AuditError::ProviderFailure {
            provider: PROVIDER.to_string(),
            message: format!("unreadable response: {}", e),
        })
    }
}

#[async_trait]
impl ResourceProvider for OpenMeteoClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch(
        &self,
        lat: f64,
        lon: f64,
        range: HourRange,
        kind: ResourceKind,
    ) -> AuditResult<ResourceData> {
        debug!("Fetching {} resource for ({}, {}) over {}", kind, lat, lon, range);
        let response = self.request(lat, lon, &range, kind).await?;
        convert_response(response, lat, lon, &range, kind)
    }
}

/// Turn the columnar response into samples, keeping only hours in `range`.
/// Hours with a null required variable are dropped so the coverage check names them.
fn convert_response(
    response: OpenMeteoResponse,
    lat: f64,
    lon: f64,
    range: &HourRange,
    kind: ResourceKind,
) -> AuditResult<ResourceData> {
    let location = GeoPoint {
        lat,
        lon,
        elevation_m: response.elevation,
    };
    let hourly = response.hourly;

    let mut stamps = Vec::with_capacity(hourly.time.len());
    for raw in &hourly.time {
        stamps.push(parse_time(raw)?);
    }
    let in_range = stamps
        .iter()
        .enumerate()
        .filter(|(_, ts)| range.contains(**ts));

    match kind {
        ResourceKind::Wind => {
            let samples = in_range
                .filter_map(|(i, &timestamp)| {
                    Some(WindSample {
                        timestamp,
                        wind_speed_ms: at(&hourly.wind_speed_100m, i)?,
                        wind_speed_10m_ms: at(&hourly.wind_speed_10m, i),
                        wind_direction_deg: at(&hourly.wind_direction_100m, i),
                        temperature_c: at(&hourly.temperature_2m, i),
                        pressure_hpa: at(&hourly.surface_pressure, i),
                    })
                })
                .collect();
            Ok(ResourceData::Wind(ResourceSeries { location, samples }))
        }
        ResourceKind::Solar => {
            let samples = in_range
                .filter_map(|(i, &timestamp)| {
                    Some(SolarSample {
                        timestamp,
                        ghi_w_m2: at(&hourly.shortwave_radiation, i)?,
                        dhi_w_m2: at(&hourly.diffuse_radiation, i)?,
                        dni_w_m2: at(&hourly.direct_normal_irradiance, i),
                        temperature_c: at(&hourly.temperature_2m, i)?,
                        wind_speed_ms: at(&hourly.wind_speed_10m, i),
                    })
                })
                .collect();
            Ok(ResourceData::Solar(ResourceSeries { location, samples }))
        }
    }
}

fn at(column: &[Option<f64>], i: usize) -> Option<f64> {
    column.get(i).copied().flatten()
}

fn parse_time(raw: &str) -> AuditResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .map(|naive| naive.and_utc())
        .map_err(|e| AuditError::ProviderFailure {
            provider: PROVIDER.to_string(),
            message: format!("bad timestamp '{}': {}", raw, e),
        })
}

fn transport_error(e: reqwest::Error) -> AuditError {
    AuditError::ProviderFailure {
        provider: PROVIDER.to_string(),
        message: e.to_string(),
    }
}
