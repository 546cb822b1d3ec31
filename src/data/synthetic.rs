use crate::data::provider::PriceProvider;
use crate::data::types::{HourRange, PricePoint, PriceSeries};
use crate::error::AuditResult;
use async_trait::async_trait;
use chrono::{Duration, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

const BASE_PRICE: f64 = 50.0;
const NOISE_STD_DEV: f64 = 5.0;

/// "Duck curve" prices for running without a market data token.
///
/// Cheap at midday when solar floods the market, expensive in the evening peak.
/// The noise is seeded from the window so the same request always sees the same prices.
pub struct SyntheticPriceProvider {
    utc_offset_hours: i32,
}

impl SyntheticPriceProvider {
    pub fn new(utc_offset_hours: i32) -> Self {
        Self { utc_offset_hours }
    }

    fn price_at(&self, local_hour: u32, rng: &mut StdRng) -> f64 {
        let mut price = BASE_PRICE;
        if local_hour > 10 && local_hour < 16 {
            price -= 20.0;
        }
        if local_hour > 19 && local_hour < 23 {
            price += 30.0;
        }
        price + gaussian(rng) * NOISE_STD_DEV
    }
}

#[async_trait]
impl PriceProvider for SyntheticPriceProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn fetch(&self, range: HourRange) -> AuditResult<PriceSeries> {
        let mut rng = StdRng::seed_from_u64(range.start.timestamp() as u64);
        let offset = Duration::hours(self.utc_offset_hours as i64);

        let points = range
            .iter()
            .map(|timestamp| PricePoint {
                timestamp,
                price_eur_mwh: self.price_at((timestamp + offset).hour(), &mut rng),
            })
            .collect();

        Ok(PriceSeries {
            source: "synthetic duck curve (no market data token)".to_string(),
            points,
        })
    }
}

/// Standard normal draw (Box-Muller)
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}
