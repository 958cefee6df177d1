//! Solver adapter.
//!
//! The LP/MILP algorithm itself is external: [`GoodLpSolver`] hands a
//! [`Formulation`] to `good_lp` with the pure-Rust `microlp` backend
//! (simplex plus branch-and-bound for the binaries). The time budget is
//! enforced at this boundary; a solve that overruns it is reported as
//! [`SolveStatus::Timeout`] with no partial result, because the backend
//! offers no cooperative abort. The overrun solve is left to finish on its
//! own detached thread.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use good_lp::solvers::microlp::microlp;
use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError, Solution as _,
    SolverModel, Variable,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::model::{Comparison, Formulation, LinearExpr, Sense, VarId, VarKind};
use crate::domain::SolveStatus;
use crate::error::SchedulerError;

/// Solver settings resolved once at startup and passed to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub time_budget: Duration,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_budget: Duration::from_secs(30),
        }
    }
}

/// Result of one solve call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub status: SolveStatus,
    pub objective: Option<f64>,
    /// One value per formulation variable; empty unless optimal
    pub values: Vec<f64>,
}

impl Solution {
    pub fn optimal(objective: f64, values: Vec<f64>) -> Self {
        Self {
            status: SolveStatus::Optimal,
            objective: Some(objective),
            values,
        }
    }

    /// Solution carrying only a non-optimal status
    pub fn without_point(status: SolveStatus) -> Self {
        Self {
            status,
            objective: None,
            values: Vec::new(),
        }
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    pub fn value(&self, var: VarId) -> Result<f64, SchedulerError> {
        self.values.get(var.0).copied().ok_or_else(|| {
            SchedulerError::Solver(format!(
                "no value for variable {} in a {} solution",
                var.0, self.status
            ))
        })
    }

    pub fn series(&self, vars: &[VarId]) -> Result<Vec<f64>, SchedulerError> {
        vars.iter().map(|&v| self.value(v)).collect()
    }

    /// Maps a non-optimal status onto its typed error
    pub fn ensure_optimal(&self, budget: Duration) -> Result<(), SchedulerError> {
        match self.status {
            SolveStatus::Optimal => Ok(()),
            SolveStatus::Infeasible => Err(SchedulerError::Infeasible),
            SolveStatus::Unbounded => Err(SchedulerError::Unbounded),
            SolveStatus::Timeout => Err(SchedulerError::Timeout { budget }),
        }
    }
}

/// Solves formulations. Implementations report non-optimal outcomes through
/// [`Solution::status`] and never replace a failed solve with another result.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SolverAdapter: Send + Sync {
    async fn solve(
        &self,
        formulation: &Formulation,
        time_budget: Duration,
    ) -> Result<Solution, SchedulerError>;
}

/// `good_lp` adapter running the `microlp` backend on a dedicated thread
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpSolver;

impl GoodLpSolver {
    pub fn new() -> Self {
        Self
    }

    fn to_expression(expr: &LinearExpr, vars: &[Variable]) -> Expression {
        expr.terms
            .iter()
            .fold(Expression::from(expr.constant), |acc, &(var, coeff)| acc + coeff * vars[var.0])
    }

    /// Builds and solves the model synchronously. Binary values are rounded
    /// to exactly 0 or 1.
    fn solve_blocking(formulation: &Formulation) -> Result<Vec<f64>, ResolutionError> {
        let mut problem = ProblemVariables::new();
        let vars: Vec<Variable> = formulation
            .variables()
            .iter()
            .map(|def| match def.kind {
                VarKind::Continuous => problem.add(variable().name(def.name.clone())),
                VarKind::Binary => problem.add(variable().binary().name(def.name.clone())),
            })
            .collect();

        let objective = Self::to_expression(&formulation.objective().expr, &vars);
        let mut model = match formulation.objective().sense {
            Sense::Minimize => problem.minimise(objective),
            Sense::Maximize => problem.maximise(objective),
        }
        .using(microlp);

        for row in formulation.constraints() {
            let lhs = Self::to_expression(&row.lhs, &vars);
            let rhs = row.rhs;
            model = match row.cmp {
                Comparison::Eq => model.with(constraint!(lhs == rhs)),
                Comparison::Le => model.with(constraint!(lhs <= rhs)),
                Comparison::Ge => model.with(constraint!(lhs >= rhs)),
            };
        }

        let solution = model.solve()?;
        Ok(formulation
            .variables()
            .iter()
            .zip(&vars)
            .map(|(def, &var)| {
                let value = solution.value(var);
                match def.kind {
                    VarKind::Binary => value.round(),
                    VarKind::Continuous => value,
                }
            })
            .collect())
    }
}

#[async_trait]
impl SolverAdapter for GoodLpSolver {
    async fn solve(
        &self,
        formulation: &Formulation,
        time_budget: Duration,
    ) -> Result<Solution, SchedulerError> {
        let started = Instant::now();
        let owned = formulation.clone();
        let (tx, rx) = oneshot::channel();

        // Detached so an overrun solve never holds up runtime shutdown
        std::thread::Builder::new()
            .name(format!("solve-{}", formulation.name()))
            .spawn(move || {
                let values = Self::solve_blocking(&owned);
                let _ = tx.send((owned, values));
            })
            .map_err(|e| SchedulerError::Solver(format!("failed to start solver thread: {}", e)))?;

        debug!(
            model = %formulation.name(),
            variables = formulation.variables().len(),
            constraints = formulation.constraints().len(),
            budget_ms = time_budget.as_millis() as u64,
            "solving"
        );

        let (owned, outcome) = match tokio::time::timeout(time_budget, rx).await {
            Ok(received) => received
                .map_err(|_| SchedulerError::Solver("solver thread exited without a result".into()))?,
            Err(_) => {
                warn!(model = %formulation.name(), budget_ms = time_budget.as_millis() as u64, "solver timed out");
                return Ok(Solution::without_point(SolveStatus::Timeout));
            }
        };

        let solution = match outcome {
            Ok(values) => {
                let objective = owned.objective().expr.evaluate(&values);
                Solution::optimal(objective, values)
            }
            Err(ResolutionError::Infeasible) => Solution::without_point(SolveStatus::Infeasible),
            Err(ResolutionError::Unbounded) => Solution::without_point(SolveStatus::Unbounded),
            Err(other) => return Err(SchedulerError::Solver(other.to_string())),
        };

        info!(
            model = %owned.name(),
            status = %solution.status,
            objective = solution.objective,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "solve finished"
        );
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BatteryModel, BatteryParameters, ScenarioData};
    use crate::optimizer::dispatch::{DispatchFormulation, DispatchOptions};
    use crate::optimizer::model::{Comparison, LinearExpr};

    /// max x + y  s.t.  x + 2y <= 4, x <= 3, x, y >= 0
    fn small_lp() -> Formulation {
        let mut f = Formulation::new("small_lp", Sense::Maximize);
        let x = f.add_variable("x", VarKind::Continuous);
        let y = f.add_variable("y", VarKind::Continuous);
        f.add_constraint("x_nonneg", LinearExpr::var(x), Comparison::Ge, 0.0);
        f.add_constraint("y_nonneg", LinearExpr::var(y), Comparison::Ge, 0.0);
        f.add_constraint("x_max", LinearExpr::var(x), Comparison::Le, 3.0);
        f.add_constraint("capacity", LinearExpr::var(x).with(y, 2.0), Comparison::Le, 4.0);
        f.set_objective(LinearExpr::var(x).with(y, 1.0));
        f
    }

    #[tokio::test]
    async fn test_solves_small_lp() {
        let solution = GoodLpSolver::new()
            .solve(&small_lp(), Duration::from_secs(10))
            .await
            .unwrap();
        assert!(solution.is_optimal());
        assert!((solution.objective.unwrap() - 3.5).abs() < 1e-6);
        assert!((solution.values[0] - 3.0).abs() < 1e-6);
        assert!((solution.values[1] - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_binary_variables_are_integral() {
        // max 2a + 3b  s.t.  a + b <= 1.5 with a, b binary
        let mut f = Formulation::new("knapsack", Sense::Maximize);
        let a = f.add_variable("a", VarKind::Binary);
        let b = f.add_variable("b", VarKind::Binary);
        f.add_constraint("budget", LinearExpr::var(a).with(b, 1.0), Comparison::Le, 1.5);
        f.set_objective(LinearExpr::new().with(a, 2.0).with(b, 3.0));

        let solution = GoodLpSolver::new().solve(&f, Duration::from_secs(10)).await.unwrap();
        assert_eq!(solution.values, vec![0.0, 1.0]);
        assert!((solution.objective.unwrap() - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_infeasible_status_is_reported() {
        let mut f = small_lp();
        let x = VarId(0);
        f.add_constraint("x_min", LinearExpr::var(x), Comparison::Ge, 5.0);

        let solution = GoodLpSolver::new().solve(&f, Duration::from_secs(10)).await.unwrap();
        assert_eq!(solution.status, SolveStatus::Infeasible);
        assert!(solution.values.is_empty());
        assert!(matches!(
            solution.ensure_optimal(Duration::from_secs(10)),
            Err(SchedulerError::Infeasible)
        ));
    }

    #[tokio::test]
    async fn test_unbounded_status_is_reported() {
        let mut f = Formulation::new("unbounded", Sense::Maximize);
        let x = f.add_variable("x", VarKind::Continuous);
        f.add_constraint("x_nonneg", LinearExpr::var(x), Comparison::Ge, 0.0);
        f.set_objective(LinearExpr::var(x));

        let solution = GoodLpSolver::new().solve(&f, Duration::from_secs(10)).await.unwrap();
        assert_eq!(solution.status, SolveStatus::Unbounded);
    }

    #[tokio::test]
    async fn test_overrun_budget_reports_timeout_promptly() {
        let model = BatteryModel::enhanced(BatteryParameters::enhanced_default());
        let built = DispatchFormulation::build(
            &ScenarioData::reference_day_dispatch(),
            &model,
            &DispatchOptions::default(),
        )
        .unwrap();

        let started = Instant::now();
        let solution = GoodLpSolver::new()
            .solve(&built.formulation, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(solution.status, SolveStatus::Timeout);
        assert!(solution.values.is_empty());
        assert!(solution.objective.is_none());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_missing_values_are_errors() {
        let solution = Solution::without_point(SolveStatus::Timeout);
        assert!(matches!(solution.value(VarId(0)), Err(SchedulerError::Solver(_))));
        assert!(matches!(
            solution.ensure_optimal(Duration::from_millis(5)),
            Err(SchedulerError::Timeout { .. })
        ));
    }
}
