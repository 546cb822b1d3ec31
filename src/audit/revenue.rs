use crate::audit::types::{
    Assessment, AssessmentDetail, Evaluation, FinancialAnalysis, Finding, HourlyRecord, PriceAnalysis,
    ProductionSummary,
};
use crate::config::AssessmentConfig;
use crate::data::types::PriceSeries;
use crate::error::{AuditError, AuditResult};
use crate::models::ModelOutput;

/// Hours echoed back in the result
const SAMPLE_HOURS: usize = 5;

/// Pair production with prices hour by hour
pub fn pair_hours(production: &ModelOutput, prices: &PriceSeries) -> AuditResult<Vec<HourlyRecord>> {
    if production.hourly.len() != prices.points.len() {
        return Err(AuditError::SeriesMismatch(format!(
            "{} production hours vs {} price hours",
            production.hourly.len(),
            prices.points.len()
        )));
    }

    production
        .hourly
        .iter()
        .zip(&prices.points)
        .map(|(hour, price)| {
            if hour.timestamp != price.timestamp {
                return Err(AuditError::SeriesMismatch(format!(
                    "production hour {} paired with price hour {}",
                    hour.timestamp, price.timestamp
                )));
            }
            Ok(HourlyRecord {
                timestamp: hour.timestamp,
                production_kwh: hour.production_kwh,
                price_eur_mwh: price.price_eur_mwh,
                revenue_eur: hour.production_kwh / 1000.0 * price.price_eur_mwh,
            })
        })
        .collect()
}

/// Tier, finding and signed percentage for a revenue estimate vs. a payment.
///
/// Thresholds are closed: exactly `ok_threshold_pct` is still ok,
/// exactly `warning_threshold_pct` is still a warning.
pub fn assess(estimated_eur: f64, payment_eur: f64, thresholds: &AssessmentConfig) -> (Option<f64>, Assessment, Finding) {
    if payment_eur <= 0.0 {
        return (None, Assessment::Ok, Finding::InsufficientReference);
    }

    let pct = (estimated_eur - payment_eur) * 100.0 / payment_eur;
    let magnitude = pct.abs();
    let direction = if payment_eur < estimated_eur {
        Finding::UnderPayment
    } else {
        Finding::OverPayment
    };

    let (assessment, finding) = if magnitude <= thresholds.ok_threshold_pct {
        (Assessment::Ok, Finding::WithinTolerance)
    } else if magnitude <= thresholds.warning_threshold_pct {
        (Assessment::Warning, direction)
    } else {
        (Assessment::Alert, direction)
    };
    (Some(pct), assessment, finding)
}

fn describe(finding: Finding, pct: Option<f64>, discrepancy_eur: f64) -> String {
    match (finding, pct) {
        (Finding::InsufficientReference, _) => {
            "No payment reported; there is no reference to compare the estimate against".to_string()
        }
        (Finding::WithinTolerance, Some(pct)) => {
            format!("Payment matches the estimated market value within {:.1}%", pct.abs())
        }
        (Finding::UnderPayment, Some(pct)) => format!(
            "Payment is {:.2} EUR ({:.1}%) below the estimated market value",
            discrepancy_eur, pct
        ),
        (Finding::OverPayment, Some(pct)) => format!(
            "Payment is {:.2} EUR ({:.1}%) above the estimated market value",
            -discrepancy_eur,
            -pct
        ),
        (_, None) => "Discrepancy is undefined".to_string(),
    }
}

/// Combine hourly production and prices into the financial picture
pub fn evaluate(
    production: &ModelOutput,
    prices: &PriceSeries,
    company_payment_eur: f64,
    thresholds: &AssessmentConfig,
) -> AuditResult<Evaluation> {
    let records = pair_hours(production, prices)?;
    if records.is_empty() {
        return Err(AuditError::Computation("no hours to evaluate".to_string()));
    }
    let hours = records.len();

    let total_kwh = production.total_kwh();
    let estimated_revenue_eur: f64 = records.iter().map(|r| r.revenue_eur).sum();
    let avg_price = records.iter().map(|r| r.price_eur_mwh).sum::<f64>() / hours as f64;
    let negative_price_hours = records.iter().filter(|r| r.price_eur_mwh < 0.0).count();

    let capture_price = (total_kwh > 0.0).then(|| estimated_revenue_eur * 1000.0 / total_kwh);
    let capture_ratio = capture_price.filter(|_| avg_price != 0.0).map(|c| c / avg_price);

    let capacity_factor = if production.capacity_kw > 0.0 {
        total_kwh / (production.capacity_kw * hours as f64)
    } else {
        0.0
    };

    let discrepancy_eur = estimated_revenue_eur - company_payment_eur;
    let (discrepancy_pct, assessment, finding) = assess(estimated_revenue_eur, company_payment_eur, thresholds);

    Ok(Evaluation {
        production_summary: ProductionSummary {
            total_mwh: total_kwh / 1000.0,
            capacity_factor,
            hours_analyzed: hours,
            wake_efficiency: production.wake_efficiency,
        },
        price_analysis: PriceAnalysis {
            avg_market_price_eur_mwh: avg_price,
            capture_price_eur_mwh: capture_price,
            capture_ratio,
            negative_price_hours,
            price_source: prices.source.clone(),
        },
        financial_analysis: FinancialAnalysis {
            estimated_revenue_eur,
            company_payment_eur,
            discrepancy_eur,
            discrepancy_pct,
        },
        assessment,
        assessment_detail: AssessmentDetail {
            finding,
            message: describe(finding, discrepancy_pct, discrepancy_eur),
        },
        hourly_detail_sample: records.into_iter().take(SAMPLE_HOURS).collect(),
        // Wake losses for a wind farm, price erosion otherwise
        cannibalization_factor: production.wake_efficiency.or(capture_ratio),
    })
}
