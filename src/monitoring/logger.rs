use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use crate::audit::request::AuditRequest;
use crate::audit::types::AuditReport;

const HEADER: &str = "timestamp,technology,lat,lon,start,end,total_mwh,estimated_revenue_eur,company_payment_eur,discrepancy_pct,assessment";

/// One CSV row per completed audit
pub struct AuditTrail {
    log_path: String,
}

impl AuditTrail {
    pub fn new(log_path: String) -> Result<Self> {
        // Create CSV file with headers if it doesn't exist
        if !Path::new(&log_path).exists() {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .open(&log_path)
                .with_context(|| format!("Failed to create audit trail {}", log_path))?;

            writeln!(file, "{}", HEADER)?;
        }

        Ok(Self { log_path })
    }

    pub fn record(&self, request: &AuditRequest, report: &AuditReport) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open audit trail {}", self.log_path))?;

        let eval = &report.evaluation;
        let pct = match eval.financial_analysis.discrepancy_pct {
            Some(pct) => format!("{:.2}", pct),
            None => String::new(),
        };
        writeln!(
            file,
            "{},{},{:.5},{:.5},{},{},{:.3},{:.2},{:.2},{},{}",
            Utc::now().to_rfc3339(),
            request.technology.name(),
            request.lat,
            request.lon,
            request.range.start.to_rfc3339(),
            request.range.end.to_rfc3339(),
            eval.production_summary.total_mwh,
            eval.financial_analysis.estimated_revenue_eur,
            eval.financial_analysis.company_payment_eur,
            pct,
            eval.assessment.as_str()
        )?;

        Ok(())
    }
}
