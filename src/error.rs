use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Physical invariant checked on every produced schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Invariant {
    /// Series in the trace do not match the scenario horizon
    Horizon,
    InitialSoc,
    SocBounds,
    MutualExclusivity,
    RateLimits,
    PowerBalance,
    NonNegativeSlack,
    SocRecurrence,
}

/// A returned schedule breaks a physical invariant even though the solver
/// reported it as optimal. Always a formulation defect, never a scenario issue.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("invariant {invariant} violated at step {step} (magnitude {magnitude:.3e})")]
pub struct ValidationError {
    pub invariant: Invariant,
    pub step: usize,
    pub magnitude: f64,
}

impl ValidationError {
    pub fn new(invariant: Invariant, step: usize, magnitude: f64) -> Self {
        Self {
            invariant,
            step,
            magnitude,
        }
    }
}

/// Scheduling errors surfaced to callers
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model is infeasible")]
    Infeasible,

    #[error("Model is unbounded")]
    Unbounded,

    #[error("Solver exceeded its time budget of {budget:?}")]
    Timeout { budget: Duration },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Solver error: {0}")]
    Solver(String),
}

impl SchedulerError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
