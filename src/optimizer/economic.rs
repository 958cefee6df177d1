//! Single-period economic dispatch: meet a fixed demand from a set of
//! generators at least cost, each generator held within `[min_mw, max_mw]`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::constraints;
use super::model::{Comparison, Formulation, LinearExpr, Sense, VarId, VarKind};
use super::solver::Solution;
use crate::error::SchedulerError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Generator {
    pub min_mw: f64,
    pub max_mw: f64,
    pub cost_per_mwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicDispatch {
    pub generators: Vec<Generator>,
    pub demand_mw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicOutcome {
    pub output_mw: Vec<f64>,
    pub total_cost: f64,
}

impl EconomicDispatch {
    /// Three-unit example: capacities 500/600/400 MW at 20/25/30 per MWh
    /// serving 1000 MW
    pub fn reference() -> Self {
        Self {
            generators: vec![
                Generator { min_mw: 100.0, max_mw: 500.0, cost_per_mwh: 20.0 },
                Generator { min_mw: 100.0, max_mw: 600.0, cost_per_mwh: 25.0 },
                Generator { min_mw: 50.0, max_mw: 400.0, cost_per_mwh: 30.0 },
            ],
            demand_mw: 1000.0,
        }
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.generators.is_empty() {
            return Err(SchedulerError::invalid("at least one generator is required"));
        }
        if !self.demand_mw.is_finite() || self.demand_mw < 0.0 {
            return Err(SchedulerError::invalid(format!(
                "demand must be finite and nonnegative, got {}",
                self.demand_mw
            )));
        }
        for (i, g) in self.generators.iter().enumerate() {
            if ![g.min_mw, g.max_mw, g.cost_per_mwh].iter().all(|v| v.is_finite()) {
                return Err(SchedulerError::invalid(format!("generator {} has non-finite data", i)));
            }
            if g.min_mw < 0.0 || g.min_mw > g.max_mw {
                return Err(SchedulerError::invalid(format!(
                    "generator {} limits [{}, {}] are inconsistent",
                    i, g.min_mw, g.max_mw
                )));
            }
        }
        Ok(())
    }

    /// Builds the formulation and returns it with the per-generator output
    /// variables. Infeasible demand is left for the solver to report.
    pub fn build(&self) -> Result<(Formulation, Vec<VarId>), SchedulerError> {
        self.validate()?;

        let n = self.generators.len();
        let mut f = Formulation::new("economic_dispatch", Sense::Minimize);
        let output = f.add_vector("generator_output", VarKind::Continuous, n);

        let mut total = LinearExpr::new();
        let mut cost = LinearExpr::new();
        for (i, (g, &var)) in self.generators.iter().zip(&output).enumerate() {
            f.add_constraint(
                format!("generator_output_min[{}]", i),
                LinearExpr::var(var),
                Comparison::Ge,
                g.min_mw,
            );
            total.add_term(var, 1.0);
            cost.add_term(var, g.cost_per_mwh);
        }
        let limits: Vec<f64> = self.generators.iter().map(|g| g.max_mw).collect();
        constraints::upper_bounds(&mut f, "generator_output", &output, &limits);
        f.add_constraint("demand_balance", total, Comparison::Eq, self.demand_mw);
        f.set_objective(cost);

        debug!(generators = n, demand_mw = self.demand_mw, "built economic dispatch formulation");
        Ok((f, output))
    }

    pub fn outcome(output: &[VarId], solution: &Solution) -> Result<EconomicOutcome, SchedulerError> {
        let output_mw = solution.series(output)?;
        let total_cost = solution
            .objective
            .ok_or_else(|| SchedulerError::Solver("optimal solution without objective".into()))?;
        Ok(EconomicOutcome {
            output_mw,
            total_cost,
        })
    }
}
