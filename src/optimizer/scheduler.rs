use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::dispatch::{DispatchFormulation, DispatchOptions};
use super::economic::{EconomicDispatch, EconomicOutcome};
use super::imbalance::{ImbalanceFormulation, ImbalanceOptions};
use super::model::Formulation;
use super::rule_based::RuleBasedScheduler;
use super::solver::{Solution, SolverAdapter, SolverConfig};
use super::validator::ResultValidator;
use crate::domain::{
    BatteryModel, BatteryParameters, DispatchTrace, ScenarioData, Schedule, Strategy, Summary,
};
use crate::error::SchedulerError;

/// Everything needed to produce one schedule
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleRequest {
    pub strategy: Strategy,
    pub scenario: ScenarioData,
    pub battery: BatteryParameters,
    pub imbalance: ImbalanceOptions,
    pub dispatch: DispatchOptions,
}

/// A validated schedule and its aggregates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleReport {
    pub schedule: Schedule,
    pub summary: Summary,
}

/// Runs a strategy end to end: build, solve, validate, report.
///
/// Non-optimal solver statuses surface as typed errors. No fallback schedule
/// is ever substituted for a failed solve.
pub struct Scheduler {
    solver: Box<dyn SolverAdapter>,
    config: SolverConfig,
    validator: ResultValidator,
}

impl Scheduler {
    pub fn new(solver: Box<dyn SolverAdapter>, config: SolverConfig, validator: ResultValidator) -> Self {
        Self {
            solver,
            config,
            validator,
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub async fn run(&self, request: &ScheduleRequest) -> Result<ScheduleReport, SchedulerError> {
        match request.strategy {
            Strategy::Imbalance => {
                self.schedule_imbalance(&request.scenario, &request.battery, &request.imbalance)
                    .await
            }
            Strategy::Dispatch => {
                self.schedule_dispatch(&request.scenario, &request.battery, &request.dispatch)
                    .await
            }
            Strategy::RuleBased => self.schedule_rule_based(&request.scenario, &request.battery),
        }
    }

    #[instrument(skip_all, fields(mode = %options.mode))]
    pub async fn schedule_imbalance(
        &self,
        scenario: &ScenarioData,
        params: &BatteryParameters,
        options: &ImbalanceOptions,
    ) -> Result<ScheduleReport, SchedulerError> {
        let model = BatteryModel::simple(params.clone());
        let built = ImbalanceFormulation::build(scenario, &model, options)?;
        let solution = self.solve_optimal(&built.formulation).await?;
        let trace = built.trace(&solution)?;
        // SOC bounds are only part of the model when the rows were added
        if options.enforce_soc_bounds {
            self.validator.validate(&trace, &model, scenario)?;
        } else {
            self.validator.validate_without_soc_bounds(&trace, &model, scenario)?;
        }
        self.report(Strategy::Imbalance, &solution, trace)
    }

    #[instrument(skip_all)]
    pub async fn schedule_dispatch(
        &self,
        scenario: &ScenarioData,
        params: &BatteryParameters,
        options: &DispatchOptions,
    ) -> Result<ScheduleReport, SchedulerError> {
        let model = BatteryModel::enhanced(params.clone());
        let built = DispatchFormulation::build(scenario, &model, options)?;
        let solution = self.solve_optimal(&built.formulation).await?;
        let trace = built.trace(&solution)?;
        self.validator.validate(&trace, &model, scenario)?;
        self.report(Strategy::Dispatch, &solution, trace)
    }

    /// Rule-based schedules pass through the same validator; an undersized
    /// battery is reported as a SOC bound violation.
    pub fn schedule_rule_based(
        &self,
        scenario: &ScenarioData,
        params: &BatteryParameters,
    ) -> Result<ScheduleReport, SchedulerError> {
        let schedule = RuleBasedScheduler::new().schedule(scenario, params)?;
        let trace = schedule.trace();
        self.validator
            .validate(&trace, &BatteryModel::simple(params.clone()), scenario)?;
        let summary = ResultValidator::summarize(&trace, None);
        Ok(ScheduleReport { schedule, summary })
    }

    pub async fn economic_dispatch(
        &self,
        dispatch: &EconomicDispatch,
    ) -> Result<EconomicOutcome, SchedulerError> {
        let (formulation, output) = dispatch.build()?;
        let solution = self.solve_optimal(&formulation).await?;
        let outcome = EconomicDispatch::outcome(&output, &solution)?;
        info!(total_cost = outcome.total_cost, "economic dispatch solved");
        Ok(outcome)
    }

    async fn solve_optimal(
        &self,
        formulation: &Formulation,
    ) -> Result<Solution, SchedulerError> {
        let started = Instant::now();
        let solution = self.solver.solve(formulation, self.config.time_budget).await?;
        solution.ensure_optimal(self.config.time_budget)?;
        info!(
            model = %formulation.name(),
            objective = solution.objective,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "optimal solution"
        );
        Ok(solution)
    }

    /// Builds the report of an already validated trace
    fn report(
        &self,
        strategy: Strategy,
        solution: &Solution,
        trace: DispatchTrace,
    ) -> Result<ScheduleReport, SchedulerError> {
        let objective = solution
            .objective
            .ok_or_else(|| SchedulerError::Solver("optimal solution without objective".into()))?;
        let steps = Schedule::steps_from_trace(&trace, self.validator.tolerance())?;
        let summary = ResultValidator::summarize(&trace, Some(objective));
        let schedule = Schedule::solved(strategy, objective, steps, trace.soc);
        Ok(ScheduleReport { schedule, summary })
    }
}
