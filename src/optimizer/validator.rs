use itertools::izip;
use tracing::warn;

use crate::domain::{BatteryModel, DispatchTrace, ScenarioData, Summary};
use crate::error::{Invariant, ValidationError};

/// Relative tolerance used when none is configured
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Checks produced schedules against the battery's physical invariants.
///
/// Tolerances are relative: a residual passes when it is within
/// `tolerance * max(1, |reference|)`.
#[derive(Debug, Clone, Copy)]
pub struct ResultValidator {
    tolerance: f64,
}

impl Default for ResultValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl ResultValidator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn tol(&self, reference: f64) -> f64 {
        self.tolerance * reference.abs().max(1.0)
    }

    /// Returns the first violated invariant, in the order: horizon, initial
    /// SOC, SOC bounds, then per step nonnegativity, exclusivity, rate caps,
    /// power balance and SOC recurrence.
    pub fn validate(
        &self,
        trace: &DispatchTrace,
        model: &BatteryModel,
        scenario: &ScenarioData,
    ) -> Result<(), ValidationError> {
        self.logged(self.check(trace, model, scenario, true))
    }

    /// Same checks minus SOC bounds, for schedules of a formulation that was
    /// built without SOC bound rows
    pub fn validate_without_soc_bounds(
        &self,
        trace: &DispatchTrace,
        model: &BatteryModel,
        scenario: &ScenarioData,
    ) -> Result<(), ValidationError> {
        self.logged(self.check(trace, model, scenario, false))
    }

    fn logged(&self, result: Result<(), ValidationError>) -> Result<(), ValidationError> {
        if let Err(ref e) = result {
            warn!(invariant = %e.invariant, step = e.step, magnitude = e.magnitude, "schedule failed validation");
        }
        result
    }

    fn check(
        &self,
        trace: &DispatchTrace,
        model: &BatteryModel,
        scenario: &ScenarioData,
        soc_bounds: bool,
    ) -> Result<(), ValidationError> {
        let h = scenario.horizon();
        let lengths = [
            trace.charge.len(),
            trace.discharge.len(),
            trace.curtailment.len(),
            trace.shedding.len(),
        ];
        if let Some(bad) = lengths.iter().find(|&&n| n != h) {
            return Err(ValidationError::new(Invariant::Horizon, 0, bad.abs_diff(h) as f64));
        }
        if trace.soc.len() != h + 1 {
            return Err(ValidationError::new(Invariant::Horizon, 0, trace.soc.len().abs_diff(h + 1) as f64));
        }

        let params = &model.params;
        let initial_gap = (trace.soc[0] - params.initial_soc).abs();
        if initial_gap > self.tol(params.initial_soc) {
            return Err(ValidationError::new(Invariant::InitialSoc, 0, initial_gap));
        }

        if soc_bounds {
            for (t, &soc) in trace.soc.iter().enumerate() {
                let below = params.min_soc - soc;
                let above = soc - params.max_soc;
                if below > self.tol(params.min_soc) {
                    return Err(ValidationError::new(Invariant::SocBounds, t, below));
                }
                if above > self.tol(params.max_soc) {
                    return Err(ValidationError::new(Invariant::SocBounds, t, above));
                }
            }
        }

        for (t, (&charge, &discharge, &curtailment, &shedding, &generation, &demand)) in izip!(
            &trace.charge,
            &trace.discharge,
            &trace.curtailment,
            &trace.shedding,
            scenario.generation(),
            scenario.demand()
        )
        .enumerate()
        {
            let lowest_flow = charge.min(discharge);
            if -lowest_flow > self.tolerance {
                return Err(ValidationError::new(Invariant::RateLimits, t, -lowest_flow));
            }

            let lowest_slack = curtailment.min(shedding);
            if -lowest_slack > self.tolerance {
                return Err(ValidationError::new(Invariant::NonNegativeSlack, t, -lowest_slack));
            }

            if lowest_flow > self.tolerance {
                return Err(ValidationError::new(Invariant::MutualExclusivity, t, lowest_flow));
            }

            if model.has_rate_limits() {
                let over = (charge - params.max_charge_kw).max(discharge - params.max_discharge_kw);
                if over > self.tol(params.max_charge_kw.max(params.max_discharge_kw)) {
                    return Err(ValidationError::new(Invariant::RateLimits, t, over));
                }
            }

            let residual = generation - curtailment + discharge - charge - demand + shedding;
            if residual.abs() > self.tol(generation.max(demand)) {
                return Err(ValidationError::new(Invariant::PowerBalance, t, residual.abs()));
            }

            let expected = model.next_soc(trace.soc[t], charge, discharge);
            let drift = (trace.soc[t + 1] - expected).abs();
            if drift > self.tol(expected) {
                return Err(ValidationError::new(Invariant::SocRecurrence, t, drift));
            }
        }

        Ok(())
    }

    /// Aggregates of a trace; `objective` is carried through unchanged
    pub fn summarize(trace: &DispatchTrace, objective: Option<f64>) -> Summary {
        Summary {
            total_curtailment: trace.curtailment.iter().sum(),
            total_shedding: trace.shedding.iter().sum(),
            total_charge: trace.charge.iter().sum(),
            total_discharge: trace.discharge.iter().sum(),
            initial_soc: trace.soc.first().copied().unwrap_or_default(),
            final_soc: trace.soc.last().copied().unwrap_or_default(),
            objective,
        }
    }
}
