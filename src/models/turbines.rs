use crate::config::TurbineConfig;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CurveError {
    #[error("power curve is empty")]
    Empty,
    #[error("power curve speeds must be strictly increasing ({0} m/s follows {1} m/s)")]
    NotIncreasing(f64, f64),
    #[error("power curve has an invalid power value at {0} m/s")]
    BadPower(f64),
    #[error("turbine {0}: {1}")]
    BadTurbine(String, String),
}

/// Tabulated (wind speed m/s, power kW) points, interpolated linearly
#[derive(Debug, Clone, PartialEq)]
pub struct PowerCurve {
    points: Vec<(f64, f64)>,
}

impl PowerCurve {
    pub fn new(points: Vec<(f64, f64)>) -> Result<Self, CurveError> {
        if points.is_empty() {
            return Err(CurveError::Empty);
        }
        for pair in points.windows(2) {
            if !(pair[1].0 > pair[0].0) {
                return Err(CurveError::NotIncreasing(pair[1].0, pair[0].0));
            }
        }
        if let Some(&(speed, _)) = points.iter().find(|(s, p)| !s.is_finite() || !p.is_finite() || *p < 0.0) {
            return Err(CurveError::BadPower(speed));
        }
        Ok(Self { points })
    }

    /// Power at `speed`; outside the table the nearest edge value applies
    pub fn power_at(&self, speed: f64) -> f64 {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];
        if speed <= first.0 {
            return first.1;
        }
        if speed >= last.0 {
            return last.1;
        }

        let upper = self.points.partition_point(|(s, _)| *s <= speed);
        let (v1, p1) = self.points[upper - 1];
        let (v2, p2) = self.points[upper];
        p1 + (p2 - p1) * (speed - v1) / (v2 - v1)
    }

    pub fn max_power(&self) -> f64 {
        self.points.iter().map(|(_, p)| *p).fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurbineModel {
    pub name: String,
    pub rated_power_kw: f64,
    pub hub_height_m: f64,
    pub rotor_diameter_m: f64,
    pub cut_in_ms: f64,
    pub cut_out_ms: f64,
    pub curve: PowerCurve,
}

impl TurbineModel {
    pub fn from_config(config: &TurbineConfig) -> Result<Self, CurveError> {
        let bad = |msg: &str| CurveError::BadTurbine(config.name.clone(), msg.to_string());
        if config.rated_power_kw <= 0.0 || config.hub_height_m <= 0.0 || config.rotor_diameter_m <= 0.0 {
            return Err(bad("rated power, hub height and rotor diameter must be positive"));
        }
        if !(config.cut_in_ms >= 0.0 && config.cut_in_ms < config.cut_out_ms) {
            return Err(bad("cut-in speed must be below cut-out speed"));
        }
        let curve = PowerCurve::new(config.power_curve.clone())?;
        if curve.max_power() > config.rated_power_kw {
            return Err(bad("power curve exceeds rated power"));
        }

        Ok(Self {
            name: config.name.clone(),
            rated_power_kw: config.rated_power_kw,
            hub_height_m: config.hub_height_m,
            rotor_diameter_m: config.rotor_diameter_m,
            cut_in_ms: config.cut_in_ms,
            cut_out_ms: config.cut_out_ms,
            curve,
        })
    }

    /// Single-turbine output at hub-height wind speed, before density correction
    pub fn power_kw(&self, hub_speed: f64) -> f64 {
        if !hub_speed.is_finite() || hub_speed < self.cut_in_ms || hub_speed > self.cut_out_ms {
            return 0.0;
        }
        self.curve.power_at(hub_speed)
    }
}

/// Named turbine models known to the engine
#[derive(Debug, Clone)]
pub struct TurbineLibrary {
    models: Vec<TurbineModel>,
}

impl TurbineLibrary {
    /// Built-in models plus any configured ones; a configured name replaces a built-in
    pub fn with_extra(extra: &[TurbineConfig]) -> Result<Self, CurveError> {
        let mut library = Self::builtin();
        for config in extra {
            let model = TurbineModel::from_config(config)?;
            library.models.retain(|m| !m.name.eq_ignore_ascii_case(&model.name));
            library.models.push(model);
        }
        Ok(library)
    }

    pub fn builtin() -> Self {
        let models = builtin_configs()
            .iter()
            .filter_map(|c| TurbineModel::from_config(c).ok())
            .collect();
        Self { models }
    }

    pub fn get(&self, name: &str) -> Option<&TurbineModel> {
        let name = name.trim();
        self.models.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.name.as_str()).collect()
    }
}

fn builtin_configs() -> Vec<TurbineConfig> {
    vec![
        TurbineConfig {
            name: "Vestas V90 3MW".to_string(),
            rated_power_kw: 3000.0,
            hub_height_m: 105.0,
            rotor_diameter_m: 90.0,
            cut_in_ms: 3.5,
            cut_out_ms: 25.0,
            power_curve: vec![
                (3.5, 40.0),
                (4.0, 77.0),
                (5.0, 190.0),
                (6.0, 353.0),
                (7.0, 581.0),
                (8.0, 886.0),
                (9.0, 1273.0),
                (10.0, 1710.0),
                (11.0, 2145.0),
                (12.0, 2544.0),
                (13.0, 2837.0),
                (14.0, 2965.0),
                (15.0, 3000.0),
                (25.0, 3000.0),
            ],
        },
        TurbineConfig {
            name: "Vestas V162 6MW".to_string(),
            rated_power_kw: 6000.0,
            hub_height_m: 149.0,
            rotor_diameter_m: 162.0,
            cut_in_ms: 3.0,
            cut_out_ms: 25.0,
            power_curve: vec![
                (3.0, 60.0),
                (4.0, 260.0),
                (5.0, 580.0),
                (6.0, 1030.0),
                (7.0, 1650.0),
                (8.0, 2450.0),
                (9.0, 3400.0),
                (10.0, 4450.0),
                (11.0, 5350.0),
                (12.0, 5900.0),
                (13.0, 6000.0),
                (25.0, 6000.0),
            ],
        },
    ]
}
