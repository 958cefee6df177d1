use serde::Serialize;

use super::HORIZON;
use crate::error::SchedulerError;

/// Normalised PV profile of the reference day
const REFERENCE_PV: [f64; HORIZON] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.15, 0.27, 0.44, 0.65, 0.84, 0.97, 0.996, 0.91, 0.75, 0.54,
    0.35, 0.20, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
];

/// Normalised load of the reference day
const REFERENCE_LOAD: [f64; HORIZON] = [
    0.2, 0.2, 0.2, 0.2, 0.2, 0.4, 0.4, 0.7, 0.7, 0.4, 0.4, 0.4, 0.4, 0.4, 0.4, 0.4, 0.4, 0.8,
    0.8, 0.8, 0.4, 0.4, 0.4, 0.2,
];

/// Load of the dispatch reference day (lighter around noon and mid-afternoon)
const REFERENCE_DISPATCH_LOAD: [f64; HORIZON] = [
    0.2, 0.2, 0.2, 0.2, 0.2, 0.4, 0.4, 0.7, 0.7, 0.4, 0.4, 0.4, 0.2, 0.4, 0.4, 0.2, 0.2, 0.8,
    0.8, 0.8, 0.4, 0.4, 0.4, 0.2,
];

/// Exogenous generation and demand series for one scheduling run.
///
/// Both series have exactly [`HORIZON`] finite, nonnegative entries; this is
/// checked on construction and the data is read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioData {
    generation: Vec<f64>,
    demand: Vec<f64>,
}

impl ScenarioData {
    pub fn new(generation: Vec<f64>, demand: Vec<f64>) -> Result<Self, SchedulerError> {
        let scenario = Self { generation, demand };
        scenario.validate()?;
        Ok(scenario)
    }

    /// PV and load profiles used by the imbalance and rule-based runs
    pub fn reference_day() -> Self {
        Self {
            generation: REFERENCE_PV.to_vec(),
            demand: REFERENCE_LOAD.to_vec(),
        }
    }

    /// PV and load profiles used by the dispatch run
    pub fn reference_day_dispatch() -> Self {
        Self {
            generation: REFERENCE_PV.to_vec(),
            demand: REFERENCE_DISPATCH_LOAD.to_vec(),
        }
    }

    pub fn generation(&self) -> &[f64] {
        &self.generation
    }

    pub fn demand(&self) -> &[f64] {
        &self.demand
    }

    pub fn horizon(&self) -> usize {
        self.generation.len()
    }

    /// Generation minus demand at step `t`
    pub fn mismatch(&self, t: usize) -> f64 {
        self.generation[t] - self.demand[t]
    }

    /// Largest absolute mismatch over the horizon
    pub fn peak_mismatch(&self) -> f64 {
        (0..self.horizon())
            .map(|t| self.mismatch(t).abs())
            .fold(0.0, f64::max)
    }

    /// Validate series shape and values
    pub fn validate(&self) -> Result<(), SchedulerError> {
        check_series("generation", &self.generation)?;
        check_series("demand", &self.demand)
    }
}

fn check_series(name: &str, series: &[f64]) -> Result<(), SchedulerError> {
    if series.len() != HORIZON {
        return Err(SchedulerError::invalid(format!(
            "{} series has {} steps, expected {}",
            name,
            series.len(),
            HORIZON
        )));
    }

    if let Some((t, value)) = series
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v < 0.0)
    {
        return Err(SchedulerError::invalid(format!(
            "{} at step {} must be finite and nonnegative, got {}",
            name, t, value
        )));
    }

    Ok(())
}
