use crate::models::Technology;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Severity tier of a payment discrepancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Assessment {
    Ok,
    Warning,
    Alert,
}

impl Assessment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Assessment::Ok => "ok",
            Assessment::Warning => "warning",
            Assessment::Alert => "alert",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Finding {
    WithinTolerance,
    /// The company paid less than the estimate
    UnderPayment,
    /// The company paid more than the estimate; reported, not harmful
    OverPayment,
    /// Nothing to compare against (zero payment)
    InsufficientReference,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentDetail {
    pub finding: Finding,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyRecord {
    #[serde(rename = "datetime")]
    pub timestamp: DateTime<Utc>,
    pub production_kwh: f64,
    pub price_eur_mwh: f64,
    pub revenue_eur: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub hours: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductionSummary {
    pub total_mwh: f64,
    pub capacity_factor: f64,
    pub hours_analyzed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wake_efficiency: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceAnalysis {
    pub avg_market_price_eur_mwh: f64,
    /// Production-weighted price; absent when nothing was produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_price_eur_mwh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_ratio: Option<f64>,
    pub negative_price_hours: usize,
    pub price_source: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinancialAnalysis {
    pub estimated_revenue_eur: f64,
    pub company_payment_eur: f64,
    pub discrepancy_eur: f64,
    /// Undefined for a zero payment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discrepancy_pct: Option<f64>,
}

/// Calculator output, before the request context is attached
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub production_summary: ProductionSummary,
    pub price_analysis: PriceAnalysis,
    pub financial_analysis: FinancialAnalysis,
    pub assessment: Assessment,
    pub assessment_detail: AssessmentDetail,
    pub hourly_detail_sample: Vec<HourlyRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cannibalization_factor: Option<f64>,
}

/// Final, immutable audit result returned to the caller
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub period: Period,
    pub location: Location,
    pub installation: Technology,
    #[serde(flatten)]
    pub evaluation: Evaluation,
}
