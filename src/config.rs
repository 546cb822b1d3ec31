use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub wind: WindConfig,
    #[serde(default)]
    pub solar: SolarConfig,
    #[serde(default)]
    pub assessment: AssessmentConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// Extra turbine models on top of the built-in library
    #[serde(default)]
    pub turbines: Vec<TurbineConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Esios,
    Synthetic,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_resource_url")]
    pub resource_base_url: String,
    #[serde(default = "default_price_url")]
    pub price_base_url: String,
    #[serde(default = "default_price_indicator")]
    pub price_indicator: u32,
    #[serde(default = "default_price_geo_id")]
    pub price_geo_id: Option<u32>,
    #[serde(default = "default_price_source")]
    pub price_source: PriceSource,
    /// UTC offset of the market's local clock, used by the synthetic curve
    #[serde(default = "default_market_utc_offset")]
    pub market_utc_offset_hours: i32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Longest audit window accepted, in hours
    #[serde(default = "default_max_window_hours")]
    pub max_window_hours: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoughnessClass {
    Offshore,
    #[default]
    Plains,
    Forest,
}

impl RoughnessClass {
    /// Hellman shear exponent typical for the terrain
    pub fn hellman_exponent(&self) -> f64 {
        match self {
            RoughnessClass::Offshore => 0.10,
            RoughnessClass::Plains => 1.0 / 7.0,
            RoughnessClass::Forest => 0.25,
        }
    }

    /// Jensen wake decay constant; rougher terrain mixes wakes out faster
    pub fn wake_decay(&self) -> f64 {
        match self {
            RoughnessClass::Offshore => 0.04,
            RoughnessClass::Plains => 0.075,
            RoughnessClass::Forest => 0.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindConfig {
    /// Height of the provider's wind speed variable
    #[serde(default = "default_reference_height")]
    pub reference_height_m: f64,
    #[serde(default)]
    pub roughness: RoughnessClass,
    /// Overrides the roughness-derived exponent when set
    #[serde(default)]
    pub hellman_exponent: Option<f64>,
    /// Derive the exponent per hour from the 10 m / reference-height pair
    #[serde(default)]
    pub dynamic_shear: bool,
    #[serde(default = "default_air_density")]
    pub reference_air_density: f64,
    #[serde(default)]
    pub wake: WakeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WakeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Inter-turbine spacing in rotor diameters
    #[serde(default = "default_spacing")]
    pub spacing_diameters: f64,
    #[serde(default = "default_thrust")]
    pub thrust_coefficient: f64,
    /// Share of hours in which turbines shadow each other when no row bearing is known
    #[serde(default = "default_aligned_fraction")]
    pub aligned_fraction: f64,
    /// Bearing of the turbine row (degrees from north)
    #[serde(default)]
    pub row_bearing_deg: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolarConfig {
    #[serde(default = "default_tilt")]
    pub default_tilt_deg: f64,
    #[serde(default = "default_azimuth")]
    pub default_azimuth_deg: f64,
    #[serde(default = "default_temp_coefficient")]
    pub temperature_coefficient: f64,
    #[serde(default = "default_faiman_u0")]
    pub faiman_u0: f64,
    #[serde(default = "default_faiman_u1")]
    pub faiman_u1: f64,
    #[serde(default = "default_inverter_efficiency")]
    pub inverter_efficiency: f64,
    #[serde(default = "default_albedo")]
    pub albedo: f64,
    #[serde(default = "default_module_wind")]
    pub default_wind_speed_ms: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssessmentConfig {
    /// |discrepancy| at or below this is fine
    #[serde(default = "default_ok_threshold")]
    pub ok_threshold_pct: f64,
    /// |discrepancy| above this raises an alert
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold_pct: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub csv_logging: bool,
    #[serde(default = "default_csv_log_path")]
    pub csv_log_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurbineConfig {
    pub name: String,
    pub rated_power_kw: f64,
    pub hub_height_m: f64,
    pub rotor_diameter_m: f64,
    pub cut_in_ms: f64,
    pub cut_out_ms: f64,
    /// (wind speed m/s, power kW) pairs
    pub power_curve: Vec<(f64, f64)>,
}

fn default_resource_url() -> String { "https://archive-api.open-meteo.com/v1/archive".to_string() }
fn default_price_url() -> String { "https://api.esios.ree.es".to_string() }
fn default_price_indicator() -> u32 { 600 }
fn default_price_geo_id() -> Option<u32> { Some(3) }
fn default_price_source() -> PriceSource { PriceSource::Esios }
fn default_market_utc_offset() -> i32 { 1 }
fn default_timeout_secs() -> u64 { 30 }
fn default_max_retries() -> u32 { 3 }
fn default_retry_delay_ms() -> u64 { 500 }
fn default_max_window_hours() -> usize { 87_840 }
fn default_reference_height() -> f64 { 100.0 }
fn default_air_density() -> f64 { 1.225 }
fn default_true() -> bool { true }
fn default_spacing() -> f64 { 7.0 }
fn default_thrust() -> f64 { 0.8 }
fn default_aligned_fraction() -> f64 { 0.3 }
fn default_tilt() -> f64 { 30.0 }
fn default_azimuth() -> f64 { 180.0 }
fn default_temp_coefficient() -> f64 { -0.004 }
fn default_faiman_u0() -> f64 { 25.0 }
fn default_faiman_u1() -> f64 { 6.84 }
fn default_inverter_efficiency() -> f64 { 0.96 }
fn default_albedo() -> f64 { 0.2 }
fn default_module_wind() -> f64 { 1.0 }
fn default_ok_threshold() -> f64 { 5.0 }
fn default_warning_threshold() -> f64 { 15.0 }
fn default_csv_log_path() -> String { "audits.csv".to_string() }

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            resource_base_url: default_resource_url(),
            price_base_url: default_price_url(),
            price_indicator: default_price_indicator(),
            price_geo_id: default_price_geo_id(),
            price_source: default_price_source(),
            market_utc_offset_hours: default_market_utc_offset(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            max_window_hours: default_max_window_hours(),
        }
    }
}

impl Default for WindConfig {
    fn default() -> Self {
        Self {
            reference_height_m: default_reference_height(),
            roughness: RoughnessClass::default(),
            hellman_exponent: None,
            dynamic_shear: false,
            reference_air_density: default_air_density(),
            wake: WakeConfig::default(),
        }
    }
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            spacing_diameters: default_spacing(),
            thrust_coefficient: default_thrust(),
            aligned_fraction: default_aligned_fraction(),
            row_bearing_deg: None,
        }
    }
}

impl Default for SolarConfig {
    fn default() -> Self {
        Self {
            default_tilt_deg: default_tilt(),
            default_azimuth_deg: default_azimuth(),
            temperature_coefficient: default_temp_coefficient(),
            faiman_u0: default_faiman_u0(),
            faiman_u1: default_faiman_u1(),
            inverter_efficiency: default_inverter_efficiency(),
            albedo: default_albedo(),
            default_wind_speed_ms: default_module_wind(),
        }
    }
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            ok_threshold_pct: default_ok_threshold(),
            warning_threshold_pct: default_warning_threshold(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            csv_logging: false,
            csv_log_path: default_csv_log_path(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub config_path: String,
    pub esios_token: Option<String>,
    pub open_meteo_url: Option<String>,
    pub esios_url: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        config.check()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise run on built-in defaults
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            tracing::warn!("Config file {} not found, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Apply environment overrides on top of the file
    pub fn with_env(mut self, env: &EnvConfig) -> Self {
        if let Some(url) = &env.open_meteo_url {
            self.providers.resource_base_url = url.clone();
        }
        if let Some(url) = &env.esios_url {
            self.providers.price_base_url = url.clone();
        }
        self
    }

    fn check(&self) -> Result<()> {
        let a = &self.assessment;
        if !(a.ok_threshold_pct >= 0.0 && a.ok_threshold_pct <= a.warning_threshold_pct) {
            anyhow::bail!(
                "assessment thresholds must satisfy 0 <= ok ({}) <= warning ({})",
                a.ok_threshold_pct,
                a.warning_threshold_pct
            );
        }
        let eff = self.solar.inverter_efficiency;
        if !(eff > 0.0 && eff <= 1.0) {
            anyhow::bail!("solar.inverter_efficiency must be in (0, 1], got {}", eff);
        }
        let wake = &self.wind.wake;
        if wake.spacing_diameters <= 0.0 || !(0.0..1.0).contains(&wake.thrust_coefficient) {
            anyhow::bail!("wind.wake needs spacing > 0 and thrust coefficient in [0, 1)");
        }
        if !(0.0..=1.0).contains(&wake.aligned_fraction) {
            anyhow::bail!("wind.wake.aligned_fraction must be in [0, 1]");
        }
        if self.wind.reference_height_m <= 0.0 {
            anyhow::bail!("wind.reference_height_m must be positive");
        }
        Ok(())
    }
}

impl EnvConfig {
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            config_path: std::env::var("AUDIT_CONFIG")
                .unwrap_or_else(|_| "config.toml".to_string()),
            esios_token: std::env::var("ESIOS_TOKEN").ok().filter(|t| !t.trim().is_empty()),
            open_meteo_url: std::env::var("OPEN_METEO_ARCHIVE_URL").ok(),
            esios_url: std::env::var("ESIOS_URL").ok(),
        })
    }
}
