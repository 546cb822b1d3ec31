use crate::data::types::{HourRange, PriceSeries, ResourceData, ResourceKind};
use crate::error::{AuditError, AuditResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of hourly environmental data for a location
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Must return every hour of `range`; gaps are an error, never truncated
    async fn fetch(
        &self,
        lat: f64,
        lon: f64,
        range: HourRange,
        kind: ResourceKind,
    ) -> AuditResult<ResourceData>;
}

/// Source of hourly spot prices (€/MWh)
#[async_trait]
pub trait PriceProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, range: HourRange) -> AuditResult<PriceSeries>;
}

/// Verify a series holds exactly one sample per hour of `range`, in order.
///
/// A gap fails with `DataUnavailable` naming the first missing run of hours.
pub fn check_coverage(
    provider: &str,
    range: &HourRange,
    timestamps: &[DateTime<Utc>],
) -> AuditResult<()> {
    let expected = range.hours();
    let mut present = vec![false; expected];
    let mut previous: Option<DateTime<Utc>> = None;

    for &ts in timestamps {
        if let Some(prev) = previous {
            if ts <= prev {
                return Err(malformed(provider, format!("timestamp {} is out of order", ts)));
            }
        }
        previous = Some(ts);

        if !range.contains(ts) {
            return Err(malformed(provider, format!("timestamp {} is outside {}", ts, range)));
        }
        let index = (ts - range.start).num_hours() as usize;
        if range.hour_at(index) != ts {
            return Err(malformed(provider, format!("timestamp {} is not hour-aligned", ts)));
        }
        present[index] = true;
    }

    if let Some(first_gap) = present.iter().position(|p| !p) {
        let gap_len = present[first_gap..].iter().take_while(|p| !**p).count();
        return Err(AuditError::DataUnavailable {
            provider: provider.to_string(),
            missing: HourRange::new(range.hour_at(first_gap), range.hour_at(first_gap + gap_len - 1)),
        });
    }

    Ok(())
}

fn malformed(provider: &str, message: String) -> AuditError {
    AuditError::ProviderFailure {
        provider: provider.to_string(),
        message,
    }
}
