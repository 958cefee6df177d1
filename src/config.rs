use std::time::Duration;

use anyhow::{Context, Result};
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;

use crate::domain::{BatteryParameters, ScenarioData, Strategy};
use crate::optimizer::{DispatchOptions, ImbalanceOptions, ScheduleRequest, SolverConfig, DEFAULT_TOLERANCE};

pub const ENV_PREFIX: &str = "MGEMS__";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub battery: BatteryParameters,
    pub solver: SolverSettings,
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolverSettings {
    pub time_budget_seconds: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    pub strategy: Strategy,
    #[serde(default)]
    pub imbalance: ImbalanceOptions,
    #[serde(default)]
    pub dispatch: DispatchOptions,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

/// Optional series overriding the built-in reference day
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioConfig {
    pub generation: Option<Vec<f64>>,
    pub demand: Option<Vec<f64>>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::with_env(
            Figment::new().merge(Toml::file("config/default.toml")),
        ))
    }

    /// Layers `MGEMS__`-prefixed environment variables over `base`;
    /// `MGEMS__SCHEDULE__STRATEGY` sets `schedule.strategy`
    pub fn with_env(base: Figment) -> Figment {
        base.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        figment.extract().context("failed to load configuration")
    }

    /// Replaces the configured strategy with one named on the command line
    pub fn override_strategy(&mut self, name: &str) -> Result<()> {
        self.schedule.strategy = name.parse::<Strategy>().map_err(anyhow::Error::msg)?;
        Ok(())
    }

    pub fn battery_parameters(&self) -> Result<BatteryParameters> {
        self.battery
            .validate()
            .context("invalid battery configuration")?;
        Ok(self.battery.clone())
    }

    pub fn solver_config(&self) -> Result<SolverConfig> {
        let time_budget = Duration::try_from_secs_f64(self.solver.time_budget_seconds)
            .context("solver.time_budget_seconds must be a nonnegative number of seconds")?;
        Ok(SolverConfig { time_budget })
    }

    /// Configured series, or the reference day matching the strategy when
    /// none are given
    pub fn scenario(&self) -> Result<ScenarioData> {
        let reference = match self.schedule.strategy {
            Strategy::Dispatch => ScenarioData::reference_day_dispatch(),
            Strategy::Imbalance | Strategy::RuleBased => ScenarioData::reference_day(),
        };
        let generation = self
            .scenario
            .generation
            .clone()
            .unwrap_or_else(|| reference.generation().to_vec());
        let demand = self
            .scenario
            .demand
            .clone()
            .unwrap_or_else(|| reference.demand().to_vec());
        ScenarioData::new(generation, demand).context("invalid scenario configuration")
    }

    pub fn schedule_request(&self) -> Result<ScheduleRequest> {
        Ok(ScheduleRequest {
            strategy: self.schedule.strategy,
            scenario: self.scenario()?,
            battery: self.battery_parameters()?,
            imbalance: self.schedule.imbalance.clone(),
            dispatch: self.schedule.dispatch.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HORIZON;
    use crate::optimizer::ImbalanceMode;

    const BASE: &str = r#"
        [battery]
        capacity_kwh = 3.0
        initial_soc = 0.5
        min_soc = 0.1
        max_soc = 1.0
        charge_efficiency = 0.9
        discharge_efficiency = 0.9
        max_charge_kw = 0.9
        max_discharge_kw = 0.9

        [solver]
        time_budget_seconds = 2.5

        [schedule]
        strategy = "dispatch"
    "#;

    fn load(extra: &str) -> Result<Config> {
        Config::from_figment(Figment::new().merge(Toml::string(BASE)).merge(Toml::string(extra)))
    }

    #[test]
    fn test_defaults_fill_optional_sections() {
        let cfg = load("").unwrap();
        let battery = cfg.battery_parameters().unwrap();
        assert_eq!(battery.capacity_kwh, 3.0);
        assert_eq!(battery.min_soc, 0.1);
        assert_eq!(cfg.solver_config().unwrap().time_budget, Duration::from_millis(2500));
        assert_eq!(cfg.schedule.dispatch, DispatchOptions::default());
        assert_eq!(cfg.schedule.tolerance, DEFAULT_TOLERANCE);

        let request = cfg.schedule_request().unwrap();
        assert_eq!(request.strategy, Strategy::Dispatch);
        assert_eq!(request.scenario, ScenarioData::reference_day_dispatch());
    }

    #[test]
    fn test_nested_options_and_scenario_override() {
        let cfg = load(&format!(
            r#"
            [schedule.imbalance]
            mode = "signed_split"
            enforce_soc_bounds = true

            [scenario]
            demand = {:?}
            "#,
            vec![0.5; HORIZON]
        ))
        .unwrap();
        assert_eq!(cfg.schedule.imbalance.mode, ImbalanceMode::SignedSplit);
        assert!(cfg.schedule.imbalance.enforce_soc_bounds);
        assert_eq!(cfg.scenario().unwrap().demand(), &[0.5; HORIZON][..]);
    }

    #[test]
    fn test_environment_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("MGEMS__SCHEDULE__STRATEGY", "rule_based");
            jail.set_env("MGEMS__BATTERY__CAPACITY_KWH", "10.0");
            let cfg = Config::from_figment(Config::with_env(Figment::new().merge(Toml::string(BASE))))
                .map_err(|e| e.to_string())?;
            assert_eq!(cfg.schedule.strategy, Strategy::RuleBased);
            assert_eq!(cfg.battery.capacity_kwh, 10.0);
            assert_eq!(cfg.scenario().map_err(|e| e.to_string())?, ScenarioData::reference_day());
            Ok(())
        });
    }

    #[test]
    fn test_strategy_override_picks_matching_reference_day() {
        let mut cfg = load("").unwrap();
        cfg.override_strategy("rule-based").unwrap();
        let request = cfg.schedule_request().unwrap();
        assert_eq!(request.strategy, Strategy::RuleBased);
        assert_eq!(request.scenario, ScenarioData::reference_day());

        let err = cfg.override_strategy("greedy").unwrap_err();
        assert!(err.to_string().contains("greedy"));
        assert_eq!(cfg.schedule.strategy, Strategy::RuleBased);
    }

    #[test]
    fn test_rejects_inconsistent_values() {
        let cfg = load("[scenario]\ngeneration = [1.0, 2.0]").unwrap();
        assert!(cfg.scenario().is_err());

        let cfg = load("[solver]\ntime_budget_seconds = -1.0").unwrap();
        assert!(cfg.solver_config().is_err());

        let cfg = load("[battery]\ninitial_soc = 0.05").unwrap();
        assert!(cfg.battery_parameters().is_err());
    }
}
