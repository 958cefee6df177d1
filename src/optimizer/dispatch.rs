//! Battery dispatch with PV curtailment and load shedding (enhanced dynamics).
//!
//! Per step: `generation - curtailment + discharge - charge - demand + shedding == 0`.
//! The objective `Σ(shedding_penalty·shedding + curtailment_penalty·curtailment)`
//! defaults to 10:1, so the solver curtails PV before it sheds load.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::constraints::{self, StorageFlows};
use super::model::{Comparison, Formulation, LinearExpr, Sense, VarId, VarKind};
use super::solver::Solution;
use crate::domain::{BatteryModel, DispatchTrace, Dynamics, ScenarioData};
use crate::error::SchedulerError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatchOptions {
    pub shedding_penalty: f64,
    pub curtailment_penalty: f64,
    /// Add `curtailment <= generation` and `shedding <= demand` rows
    pub bound_curtailment_and_shedding: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            shedding_penalty: 10.0,
            curtailment_penalty: 1.0,
            bound_curtailment_and_shedding: true,
        }
    }
}

impl DispatchOptions {
    pub fn validate(&self) -> Result<(), SchedulerError> {
        for (name, value) in [
            ("shedding_penalty", self.shedding_penalty),
            ("curtailment_penalty", self.curtailment_penalty),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SchedulerError::invalid(format!(
                    "{} must be finite and nonnegative, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DispatchVars {
    pub charge: Vec<VarId>,
    pub discharge: Vec<VarId>,
    /// Binary, 1 while charging is allowed
    pub charging: Vec<VarId>,
    pub curtailment: Vec<VarId>,
    pub shedding: Vec<VarId>,
    pub soc: Vec<VarId>,
}

#[derive(Debug, Clone)]
pub struct DispatchFormulation {
    pub formulation: Formulation,
    pub vars: DispatchVars,
}

impl DispatchFormulation {
    pub fn build(
        scenario: &ScenarioData,
        model: &BatteryModel,
        options: &DispatchOptions,
    ) -> Result<Self, SchedulerError> {
        scenario.validate()?;
        model.validate()?;
        options.validate()?;
        if model.dynamics != Dynamics::Enhanced {
            return Err(SchedulerError::invalid(
                "dispatch formulation requires enhanced battery dynamics",
            ));
        }

        let h = scenario.horizon();
        let mut f = Formulation::new("dispatch", Sense::Minimize);
        let vars = DispatchVars {
            charge: f.add_vector("battery_charge", VarKind::Continuous, h),
            discharge: f.add_vector("battery_discharge", VarKind::Continuous, h),
            charging: f.add_vector("is_charging", VarKind::Binary, h),
            curtailment: f.add_vector("curtailed_pv", VarKind::Continuous, h),
            shedding: f.add_vector("load_shedding", VarKind::Continuous, h),
            soc: f.add_vector("battery_soc", VarKind::Continuous, h + 1),
        };

        constraints::non_negative(&mut f, "charge", &vars.charge);
        constraints::non_negative(&mut f, "discharge", &vars.discharge);
        constraints::non_negative(&mut f, "curtailment", &vars.curtailment);
        constraints::non_negative(&mut f, "shedding", &vars.shedding);
        constraints::exclusive_rate_limits(&mut f, &model.params, &vars.charge, &vars.discharge, &vars.charging);

        if options.bound_curtailment_and_shedding {
            constraints::upper_bounds(&mut f, "curtailment", &vars.curtailment, scenario.generation());
            constraints::upper_bounds(&mut f, "shedding", &vars.shedding, scenario.demand());
        }

        constraints::initial_soc(&mut f, &vars.soc, &model.params);
        constraints::soc_recurrence(
            &mut f,
            model,
            &vars.soc,
            &StorageFlows::Split {
                charge: &vars.charge,
                discharge: &vars.discharge,
            },
        );
        constraints::soc_bounds(&mut f, &vars.soc, &model.params);

        let mut objective = LinearExpr::new();
        for t in 0..h {
            // -curtailment + discharge - charge + shedding == demand - generation
            f.add_constraint(
                format!("power_balance[{}]", t),
                LinearExpr::var(vars.discharge[t])
                    .with(vars.curtailment[t], -1.0)
                    .with(vars.charge[t], -1.0)
                    .with(vars.shedding[t], 1.0),
                Comparison::Eq,
                -scenario.mismatch(t),
            );
            objective.add_term(vars.shedding[t], options.shedding_penalty);
            objective.add_term(vars.curtailment[t], options.curtailment_penalty);
        }
        f.set_objective(objective);

        debug!(
            peak_mismatch_kw = scenario.peak_mismatch(),
            variables = f.variables().len(),
            binaries = f.num_binaries(),
            constraints = f.constraints().len(),
            "built dispatch formulation"
        );

        Ok(Self { formulation: f, vars })
    }

    pub fn trace(&self, solution: &Solution) -> Result<DispatchTrace, SchedulerError> {
        Ok(DispatchTrace {
            charge: solution.series(&self.vars.charge)?,
            discharge: solution.series(&self.vars.discharge)?,
            curtailment: solution.series(&self.vars.curtailment)?,
            shedding: solution.series(&self.vars.shedding)?,
            soc: solution.series(&self.vars.soc)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BatteryParameters, HORIZON};

    fn build(options: &DispatchOptions) -> DispatchFormulation {
        DispatchFormulation::build(
            &ScenarioData::reference_day_dispatch(),
            &BatteryModel::enhanced(BatteryParameters::enhanced_default()),
            options,
        )
        .unwrap()
    }

    #[test]
    fn test_dispatch_structure() {
        let d = build(&DispatchOptions::default());
        let f = &d.formulation;
        assert_eq!(f.num_binaries(), HORIZON);
        assert_eq!(d.vars.soc.len(), HORIZON + 1);
        for name in [
            "initial_soc",
            "power_balance[0]",
            "charge_rate[23]",
            "discharge_rate[23]",
            "soc_recurrence[23]",
            "soc_min[24]",
            "soc_max[24]",
            "curtailment_max[11]",
            "shedding_max[11]",
        ] {
            assert!(f.constraint(name).is_some(), "missing constraint {}", name);
        }
    }

    #[test]
    fn test_objective_weights_shedding_tenfold() {
        let d = build(&DispatchOptions::default());
        let f = &d.formulation;
        let mut values = vec![0.0; f.variables().len()];
        values[d.vars.shedding[0].0] = 1.0;
        assert_eq!(f.objective().expr.evaluate(&values), 10.0);
        values[d.vars.shedding[0].0] = 0.0;
        values[d.vars.curtailment[0].0] = 1.0;
        assert_eq!(f.objective().expr.evaluate(&values), 1.0);
    }

    #[test]
    fn test_curtailment_bounds_optional() {
        let d = build(&DispatchOptions {
            bound_curtailment_and_shedding: false,
            ..DispatchOptions::default()
        });
        assert!(d.formulation.constraint("curtailment_max[0]").is_none());
        assert!(d.formulation.constraint("shedding_max[0]").is_none());
    }

    #[test]
    fn test_balance_row_matches_power_equation() {
        let d = build(&DispatchOptions::default());
        let scenario = ScenarioData::reference_day_dispatch();
        let row = d.formulation.constraint("power_balance[12]").unwrap();
        let mut values = vec![0.0; d.formulation.variables().len()];
        // Noon surplus 0.796: charge 0.7, curtail the rest
        values[d.vars.charge[12].0] = 0.7;
        values[d.vars.curtailment[12].0] = scenario.mismatch(12) - 0.7;
        assert!(row.violation(&values) < 1e-12);
    }

    #[test]
    fn test_rejects_simple_dynamics_and_bad_penalties() {
        let scenario = ScenarioData::reference_day_dispatch();
        let simple = BatteryModel::simple(BatteryParameters::enhanced_default());
        assert!(DispatchFormulation::build(&scenario, &simple, &DispatchOptions::default()).is_err());

        let enhanced = BatteryModel::enhanced(BatteryParameters::enhanced_default());
        let options = DispatchOptions {
            shedding_penalty: -1.0,
            ..DispatchOptions::default()
        };
        assert!(matches!(
            DispatchFormulation::build(&scenario, &enhanced, &options),
            Err(SchedulerError::InvalidInput(_))
        ));
    }
}
