mod audit;
mod bridge;
mod config;
mod data;
mod error;
mod models;
mod monitoring;

use anyhow::{Context, Result};
use audit::orchestrator::Auditor;
use config::{Config, EnvConfig, PriceSource};
use data::esios::EsiosClient;
use data::provider::{PriceProvider, ResourceProvider};
use data::synthetic::SyntheticPriceProvider;
use data::weather::OpenMeteoClient;
use monitoring::logger::AuditTrail;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the response, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let env_config = EnvConfig::load()?;
    let config = Config::load_or_default(&env_config.config_path)?.with_env(&env_config);

    let resources: Arc<dyn ResourceProvider> =
        Arc::new(OpenMeteoClient::new(config.providers.resource_base_url.clone()));
    let prices = price_provider(&config, &env_config);

    let mut auditor = Auditor::new(&config, resources, prices).context("Invalid turbine configuration")?;
    if config.monitoring.csv_logging {
        tracing::info!("Audit trail: {}", config.monitoring.csv_log_path);
        auditor = auditor.with_trail(AuditTrail::new(config.monitoring.csv_log_path.clone())?);
    }

    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .context("Failed to read request from stdin")?;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling audit");
            let _ = cancel_tx.send(true);
        }
    });

    let response = bridge::handle(&auditor, &raw, Some(cancel_rx)).await;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(response.to_string().as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;

    Ok(())
}

fn price_provider(config: &Config, env: &EnvConfig) -> Arc<dyn PriceProvider> {
    let providers = &config.providers;
    match (providers.price_source, &env.esios_token) {
        (PriceSource::Esios, Some(token)) => Arc::new(EsiosClient::new(
            providers.price_base_url.clone(),
            token.clone(),
            providers.price_indicator,
            providers.price_geo_id,
        )),
        (PriceSource::Esios, None) => {
            tracing::warn!("ESIOS_TOKEN not set, using synthetic duck-curve prices");
            Arc::new(SyntheticPriceProvider::new(providers.market_utc_offset_hours))
        }
        (PriceSource::Synthetic, _) => {
            tracing::warn!("price_source = synthetic, audits will not use market data");
            Arc::new(SyntheticPriceProvider::new(providers.market_utc_offset_hours))
        }
    }
}
