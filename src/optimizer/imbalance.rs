//! Imbalance minimisation over a signed battery output (simple dynamics).
//!
//! Two readings of the imbalance terms are available through
//! [`ImbalanceMode`]:
//!
//! - `DuplicateEquality` sets a nonnegative and a nonpositive variable equal
//!   to the same mismatch expression. The only feasible mismatch is zero, so
//!   this is an exact-balance requirement rather than a minimisation.
//! - `SignedSplit` writes `pos - neg == mismatch` with `pos, neg >= 0` and
//!   minimises `pos + neg`, which reports the smallest residual imbalance.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::constraints::{self, StorageFlows};
use super::model::{Comparison, Formulation, LinearExpr, Sense, VarId, VarKind};
use super::solver::Solution;
use crate::domain::{BatteryModel, DispatchTrace, Dynamics, ScenarioData};
use crate::error::SchedulerError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImbalanceMode {
    #[default]
    DuplicateEquality,
    SignedSplit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ImbalanceOptions {
    pub mode: ImbalanceMode,
    /// Add `min_soc <= SOC[t] <= max_soc` rows. Off by default: the SOC
    /// trajectory is otherwise only constrained by the recurrence.
    pub enforce_soc_bounds: bool,
}

#[derive(Debug, Clone)]
pub struct ImbalanceVars {
    /// Battery output, positive meaning discharge
    pub output: Vec<VarId>,
    pub imbalance_pos: Vec<VarId>,
    /// Nonpositive under `DuplicateEquality`, a nonnegative magnitude under
    /// `SignedSplit`
    pub imbalance_neg: Vec<VarId>,
    pub soc: Vec<VarId>,
}

#[derive(Debug, Clone)]
pub struct ImbalanceFormulation {
    pub formulation: Formulation,
    pub vars: ImbalanceVars,
    pub mode: ImbalanceMode,
}

impl ImbalanceFormulation {
    pub fn build(
        scenario: &ScenarioData,
        model: &BatteryModel,
        options: &ImbalanceOptions,
    ) -> Result<Self, SchedulerError> {
        scenario.validate()?;
        model.validate()?;
        if model.dynamics != Dynamics::Simple {
            return Err(SchedulerError::invalid(
                "imbalance formulation requires simple battery dynamics",
            ));
        }

        let h = scenario.horizon();
        let mut f = Formulation::new(format!("imbalance_{}", options.mode), Sense::Minimize);
        let vars = ImbalanceVars {
            output: f.add_vector("battery_output", VarKind::Continuous, h),
            imbalance_pos: f.add_vector("imbalance_pos", VarKind::Continuous, h),
            imbalance_neg: f.add_vector("imbalance_neg", VarKind::Continuous, h),
            soc: f.add_vector("soc", VarKind::Continuous, h + 1),
        };

        constraints::non_negative(&mut f, "imbalance_pos", &vars.imbalance_pos);
        let mut objective = LinearExpr::new();

        match options.mode {
            ImbalanceMode::DuplicateEquality => {
                constraints::non_positive(&mut f, "imbalance_neg", &vars.imbalance_neg);
                for t in 0..h {
                    // x == generation + output - demand  <=>  x - output == generation - demand
                    let mismatch = scenario.mismatch(t);
                    f.add_constraint(
                        format!("imbalance_pos_balance[{}]", t),
                        LinearExpr::var(vars.imbalance_pos[t]).with(vars.output[t], -1.0),
                        Comparison::Eq,
                        mismatch,
                    );
                    f.add_constraint(
                        format!("imbalance_neg_balance[{}]", t),
                        LinearExpr::var(vars.imbalance_neg[t]).with(vars.output[t], -1.0),
                        Comparison::Eq,
                        mismatch,
                    );
                    objective.add_term(vars.imbalance_pos[t], 1.0);
                    objective.add_term(vars.imbalance_neg[t], -1.0);
                }
            }
            ImbalanceMode::SignedSplit => {
                constraints::non_negative(&mut f, "imbalance_neg", &vars.imbalance_neg);
                for t in 0..h {
                    f.add_constraint(
                        format!("imbalance_balance[{}]", t),
                        LinearExpr::var(vars.imbalance_pos[t])
                            .with(vars.imbalance_neg[t], -1.0)
                            .with(vars.output[t], -1.0),
                        Comparison::Eq,
                        scenario.mismatch(t),
                    );
                    objective.add_term(vars.imbalance_pos[t], 1.0);
                    objective.add_term(vars.imbalance_neg[t], 1.0);
                }
            }
        }
        f.set_objective(objective);

        constraints::initial_soc(&mut f, &vars.soc, &model.params);
        constraints::soc_recurrence(&mut f, model, &vars.soc, &StorageFlows::Signed { output: &vars.output });
        if options.enforce_soc_bounds {
            constraints::soc_bounds(&mut f, &vars.soc, &model.params);
        }

        debug!(
            mode = %options.mode,
            variables = f.variables().len(),
            constraints = f.constraints().len(),
            "built imbalance formulation"
        );

        Ok(Self {
            formulation: f,
            vars,
            mode: options.mode,
        })
    }

    /// Maps an optimal solution onto the shared trace: positive output is
    /// discharge, surplus imbalance is curtailment and deficit is shedding.
    pub fn trace(&self, solution: &Solution) -> Result<DispatchTrace, SchedulerError> {
        let output = solution.series(&self.vars.output)?;
        let neg = solution.series(&self.vars.imbalance_neg)?;
        let shedding = match self.mode {
            ImbalanceMode::DuplicateEquality => neg.iter().map(|n| -n).collect(),
            ImbalanceMode::SignedSplit => neg,
        };

        Ok(DispatchTrace {
            charge: output.iter().map(|o| (-o).max(0.0)).collect(),
            discharge: output.iter().map(|o| o.max(0.0)).collect(),
            curtailment: solution.series(&self.vars.imbalance_pos)?,
            shedding,
            soc: solution.series(&self.vars.soc)?,
        })
    }
}
