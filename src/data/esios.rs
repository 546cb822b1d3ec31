use crate::data::provider::PriceProvider;
use crate::data::types::{HourRange, PricePoint, PriceSeries};
use crate::error::{AuditError, AuditResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

const PROVIDER: &str = "esios";

/// Spot prices from Red Eléctrica's ESIOS indicator API
pub struct EsiosClient {
    client: Client,
    base_url: String,
    token: String,
    indicator: u32,
    geo_id: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct IndicatorResponse {
    indicator: Indicator,
}

#[derive(Debug, Deserialize)]
struct Indicator {
    #[serde(default)]
    values: Vec<IndicatorValue>,
}

#[derive(Debug, Deserialize)]
struct IndicatorValue {
    value: Option<f64>,
    datetime_utc: String,
    #[serde(default)]
    geo_id: Option<u32>,
}

impl EsiosClient {
    pub fn new(base_url: String, token: String, indicator: u32, geo_id: Option<u32>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            token,
            indicator,
            geo_id,
        }
    }
}

#[async_trait]
impl PriceProvider for EsiosClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn fetch(&self, range: HourRange) -> AuditResult<PriceSeries> {
        let url = format!("{}/indicators/{}", self.base_url, self.indicator);
        debug!("Fetching ESIOS indicator {} over {}", self.indicator, range);

        let mut query = vec![
            ("start_date", range.start.to_rfc3339()),
            ("end_date", (range.end + Duration::minutes(59)).to_rfc3339()),
            ("time_trunc", "hour".to_string()),
        ];
        if let Some(geo_id) = self.geo_id {
            query.push(("geo_ids[]", geo_id.to_string()));
        }

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json; application/vnd.esios-api-v1+json")
            .header("x-api-key", &self.token)
            .query(&query)
            .send()
            .await
            .map_err(|e| failure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failure(format!("HTTP {}: {}", status.as_u16(), body.trim())));
        }

        let body: IndicatorResponse = response
            .json()
            .await
            .map_err(|e| failure(format!("unreadable response: {}", e)))?;

        let points = hourly_points(body.indicator.values, &range, self.geo_id)?;
        Ok(PriceSeries {
            source: format!("ESIOS indicator {}", self.indicator),
            points,
        })
    }
}

/// Average sub-hourly values into their hour and keep hours inside `range`
fn hourly_points(
    values: Vec<IndicatorValue>,
    range: &HourRange,
    geo_id: Option<u32>,
) -> AuditResult<Vec<PricePoint>> {
    let mut buckets: BTreeMap<DateTime<Utc>, (f64, u32)> = BTreeMap::new();

    for entry in values {
        if let (Some(wanted), Some(actual)) = (geo_id, entry.geo_id) {
            if wanted != actual {
                continue;
            }
        }
        let Some(value) = entry.value else {
            continue;
        };
        let ts = DateTime::parse_from_rfc3339(&entry.datetime_utc)
            .map_err(|e| failure(format!("bad timestamp '{}': {}", entry.datetime_utc, e)))?
            .with_timezone(&Utc);
        let hour = ts.duration_trunc(Duration::hours(1)).unwrap_or(ts);
        if !range.contains(hour) {
            continue;
        }
        let bucket = buckets.entry(hour).or_insert((0.0, 0));
        bucket.0 += value;
        bucket.1 += 1;
    }

    Ok(buckets
        .into_iter()
        .map(|(timestamp, (sum, count))| PricePoint {
            timestamp,
            price_eur_mwh: sum / count as f64,
        })
        .collect())
}

fn failure(message: String) -> AuditError {
    AuditError::ProviderFailure {
        provider: PROVIDER.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn two_hours() -> HourRange {
        let start = Utc.with_ymd_and_hms(2025, 11, 3, 0, 0, 0).unwrap();
        HourRange::new(start, start + Duration::hours(1))
    }

    fn value(v: Option<f64>, ts: &str, geo: u32) -> IndicatorValue {
        IndicatorValue {
            value: v,
            datetime_utc: ts.to_string(),
            geo_id: Some(geo),
        }
    }

    #[test]
    fn test_quarter_hours_are_averaged() {
        let values = vec![
            value(Some(40.0), "2025-11-03T00:00:00Z", 3),
            value(Some(50.0), "2025-11-03T00:15:00Z", 3),
            value(Some(60.0), "2025-11-03T00:30:00Z", 3),
            value(Some(70.0), "2025-11-03T00:45:00Z", 3),
            value(Some(-5.0), "2025-11-03T01:00:00Z", 3),
        ];
        let points = hourly_points(values, &two_hours(), Some(3)).unwrap();

        assert_eq!(points.len(), 2);
        assert!((points[0].price_eur_mwh - 55.0).abs() < 1e-9);
        assert_eq!(points[1].price_eur_mwh, -5.0);
    }

    #[test]
    fn test_other_regions_and_nulls_skipped() {
        let values = vec![
            value(Some(45.0), "2025-11-03T00:00:00Z", 3),
            value(Some(99.0), "2025-11-03T00:00:00Z", 8826),
            value(None, "2025-11-03T01:00:00Z", 3),
        ];
        let points = hourly_points(values, &two_hours(), Some(3)).unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].price_eur_mwh, 45.0);
    }

    #[tokio::test]
    async fn test_fetch_sends_api_key() {
        let mut server = Server::new_async().await;
        let body = json!({
            "indicator": {
                "id": 600,
                "values": [
                    { "value": 61.2, "datetime": "2025-11-03T01:00:00.000+01:00", "datetime_utc": "2025-11-03T00:00:00Z", "geo_id": 3 },
                    { "value": 58.9, "datetime": "2025-11-03T02:00:00.000+01:00", "datetime_utc": "2025-11-03T01:00:00Z", "geo_id": 3 }
                ]
            }
        });
        let mock = server
            .mock("GET", "/indicators/600")
            .match_header("x-api-key", "secret")
            .match_query(Matcher::UrlEncoded("time_trunc".into(), "hour".into()))
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = EsiosClient::new(server.url(), "secret".into(), 600, None);
        let series = client.fetch(two_hours()).await.unwrap();

        assert_eq!(series.points.len(), 2);
        assert_eq!(series.source, "ESIOS indicator 600");
        mock.assert_async().await;
    }
}
