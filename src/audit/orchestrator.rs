use crate::audit::request::{AuditInput, AuditRequest, ValidationError};
use crate::audit::revenue;
use crate::audit::types::{AuditReport, Location, Period};
use crate::config::{AssessmentConfig, Config, SolarConfig};
use crate::data::provider::{check_coverage, PriceProvider, ResourceProvider};
use crate::data::retry::RetryPolicy;
use crate::data::types::{PriceSeries, ResourceData};
use crate::error::{AuditError, AuditResult};
use crate::models::solar::SolarModel;
use crate::models::turbines::{CurveError, TurbineLibrary};
use crate::models::wind::WindModel;
use crate::models::ModelOutput;
use crate::monitoring::logger::AuditTrail;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStage {
    Validating,
    FetchingData,
    Modeling,
    Calculating,
    Assembled,
    Failed,
}

impl fmt::Display for AuditStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuditStage::Validating => "validating",
            AuditStage::FetchingData => "fetching_data",
            AuditStage::Modeling => "modeling",
            AuditStage::Calculating => "calculating",
            AuditStage::Assembled => "assembled",
            AuditStage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

struct StageTracker {
    current: AuditStage,
}

impl StageTracker {
    fn new() -> Self {
        debug!("audit stage -> {}", AuditStage::Validating);
        Self {
            current: AuditStage::Validating,
        }
    }

    fn advance(&mut self, next: AuditStage) {
        debug!("audit stage {} -> {}", self.current, next);
        self.current = next;
    }
}

/// Runs one audit end to end. Holds no per-request state, so a single
/// instance can serve any number of independent requests.
pub struct Auditor {
    resources: Arc<dyn ResourceProvider>,
    prices: Arc<dyn PriceProvider>,
    retry: RetryPolicy,
    max_window_hours: usize,
    assessment: AssessmentConfig,
    solar_defaults: SolarConfig,
    turbines: TurbineLibrary,
    wind: WindModel,
    solar: SolarModel,
    trail: Option<AuditTrail>,
}

impl Auditor {
    pub fn new(
        config: &Config,
        resources: Arc<dyn ResourceProvider>,
        prices: Arc<dyn PriceProvider>,
    ) -> Result<Self, CurveError> {
        Ok(Self {
            resources,
            prices,
            retry: RetryPolicy::from_config(&config.providers),
            max_window_hours: config.providers.max_window_hours,
            assessment: config.assessment.clone(),
            solar_defaults: config.solar.clone(),
            turbines: TurbineLibrary::with_extra(&config.turbines)?,
            wind: WindModel::new(config.wind.clone()),
            solar: SolarModel::new(config.solar.clone()),
            trail: None,
        })
    }

    /// Append a CSV row for every completed audit
    pub fn with_trail(mut self, trail: AuditTrail) -> Self {
        self.trail = Some(trail);
        self
    }

    /// Validate a raw payload, then audit it
    pub async fn run(&self, input: &AuditInput, cancel: Option<watch::Receiver<bool>>) -> AuditResult<AuditReport> {
        let request = match AuditRequest::parse(input, &self.turbines, &self.solar_defaults) {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejected audit request: {}", e);
                return Err(e.into());
            }
        };
        self.audit(&request, cancel).await
    }

    /// Audit an already validated request
    pub async fn audit(&self, request: &AuditRequest, cancel: Option<watch::Receiver<bool>>) -> AuditResult<AuditReport> {
        let mut stage = StageTracker::new();
        let result = self.stages(request, cancel, &mut stage).await;

        match &result {
            Ok(report) => {
                info!(
                    "{} audit at ({:.4}, {:.4}) for {}: {:.1} MWh, {:.2} EUR estimated, assessment {}",
                    request.technology.name(),
                    request.lat,
                    request.lon,
                    request.range,
                    report.evaluation.production_summary.total_mwh,
                    report.evaluation.financial_analysis.estimated_revenue_eur,
                    report.evaluation.assessment.as_str()
                );
                if let Some(trail) = &self.trail {
                    if let Err(e) = trail.record(request, report) {
                        warn!("Failed to write audit trail: {:#}", e);
                    }
                }
            }
            Err(e @ (AuditError::SeriesMismatch(_) | AuditError::Computation(_))) => {
                error!(
                    "{} audit at ({}, {}) for {} failed while {}: {} (installation: {:?})",
                    request.technology.name(),
                    request.lat,
                    request.lon,
                    request.range,
                    stage.current,
                    e,
                    request.technology
                );
                stage.advance(AuditStage::Failed);
            }
            Err(e) => {
                warn!("Audit failed while {}: {}", stage.current, e);
                stage.advance(AuditStage::Failed);
            }
        }
        result
    }

    async fn stages(
        &self,
        request: &AuditRequest,
        cancel: Option<watch::Receiver<bool>>,
        stage: &mut StageTracker,
    ) -> AuditResult<AuditReport> {
        request.validate()?;
        let hours = request.range.hours();
        if hours > self.max_window_hours {
            return Err(ValidationError::WindowTooLong {
                hours,
                max: self.max_window_hours,
            }
            .into());
        }

        stage.advance(AuditStage::FetchingData);
        let (data, prices) = self.fetch(request, cancel).await?;

        stage.advance(AuditStage::Modeling);
        let output = request.technology.produce(&data, &self.wind, &self.solar)?;
        check_output(&output, hours)?;

        stage.advance(AuditStage::Calculating);
        let evaluation = revenue::evaluate(&output, &prices, request.company_payment_eur, &self.assessment)?;

        stage.advance(AuditStage::Assembled);
        Ok(AuditReport {
            period: Period {
                start: request.range.start,
                end: request.range.end,
                hours: request.range.hours(),
            },
            location: Location {
                lat: request.lat,
                lon: request.lon,
            },
            installation: request.technology.clone(),
            evaluation,
        })
    }

    /// Resource and price fetches run concurrently, each with its own
    /// retry budget. Cancellation is only observed here.
    async fn fetch(
        &self,
        request: &AuditRequest,
        cancel: Option<watch::Receiver<bool>>,
    ) -> AuditResult<(ResourceData, PriceSeries)> {
        let range = request.range;
        let kind = request.technology.resource_kind();
        let (lat, lon) = (request.lat, request.lon);
        let resources = &self.resources;
        let prices = &self.prices;

        let resource_fetch = self.retry.run(resources.name(), move || async move {
            let data = resources.fetch(lat, lon, range, kind).await?;
            if data.kind() != kind {
                return Err(AuditError::ProviderFailure {
                    provider: resources.name().to_string(),
                    message: format!("asked for {} data, got {}", kind, data.kind()),
                });
            }
            check_coverage(resources.name(), &range, &data.timestamps())?;
            Ok(data)
        });

        let price_fetch = self.retry.run(prices.name(), move || async move {
            let series = prices.fetch(range).await?;
            check_coverage(prices.name(), &range, &series.timestamps())?;
            Ok(series)
        });

        tokio::select! {
            joined = futures::future::try_join(resource_fetch, price_fetch) => joined,
            _ = cancelled(cancel) => Err(AuditError::Cancelled),
        }
    }
}

/// Resolves once the flag flips to true; never resolves without a receiver
async fn cancelled(cancel: Option<watch::Receiver<bool>>) {
    if let Some(mut rx) = cancel {
        if rx.wait_for(|flag| *flag).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}

fn check_output(output: &ModelOutput, expected_hours: usize) -> AuditResult<()> {
    if output.hourly.len() != expected_hours {
        return Err(AuditError::Computation(format!(
            "model produced {} hours for a {} hour window",
            output.hourly.len(),
            expected_hours
        )));
    }
    if let Some(bad) = output
        .hourly
        .iter()
        .find(|h| !h.production_kwh.is_finite() || h.production_kwh < 0.0)
    {
        return Err(AuditError::Computation(format!(
            "production at {} is {} kWh",
            bad.timestamp, bad.production_kwh
        )));
    }
    Ok(())
}
