use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BatteryAction, SolveStatus, Strategy};
use crate::error::{Invariant, ValidationError};

/// Raw per-step series of a schedule, as inspected by the validator.
///
/// `soc` has one more entry than the flow series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchTrace {
    pub charge: Vec<f64>,
    pub discharge: Vec<f64>,
    pub curtailment: Vec<f64>,
    pub shedding: Vec<f64>,
    pub soc: Vec<f64>,
}

impl DispatchTrace {
    pub fn steps(&self) -> usize {
        self.charge.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleStep {
    pub action: BatteryAction,
    /// Generation discarded (kW)
    pub curtailment: f64,
    /// Demand left unmet (kW)
    pub shedding: f64,
}

/// Output contract shared by every scheduling strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub strategy: Strategy,
    /// `None` for schedules not produced by a solver
    pub status: Option<SolveStatus>,
    pub objective: Option<f64>,
    pub steps: Vec<ScheduleStep>,
    pub soc: Vec<f64>,
}

impl Schedule {
    pub fn new(strategy: Strategy, steps: Vec<ScheduleStep>, soc: Vec<f64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            strategy,
            status: None,
            objective: None,
            steps,
            soc,
        }
    }

    /// Schedule of an optimal solve
    pub fn solved(strategy: Strategy, objective: f64, steps: Vec<ScheduleStep>, soc: Vec<f64>) -> Self {
        Self {
            status: Some(SolveStatus::Optimal),
            objective: Some(objective),
            ..Self::new(strategy, steps, soc)
        }
    }

    /// Converts a validated trace into tagged steps. Flows at or below
    /// `tolerance` are treated as zero.
    pub fn steps_from_trace(
        trace: &DispatchTrace,
        tolerance: f64,
    ) -> Result<Vec<ScheduleStep>, ValidationError> {
        (0..trace.steps())
            .map(|t| {
                let (charge, discharge) = (trace.charge[t], trace.discharge[t]);
                let action = BatteryAction::from_flows(charge, discharge, tolerance).ok_or_else(
                    || ValidationError::new(Invariant::MutualExclusivity, t, charge.min(discharge)),
                )?;
                Ok(ScheduleStep {
                    action,
                    curtailment: trace.curtailment[t],
                    shedding: trace.shedding[t],
                })
            })
            .collect()
    }

    pub fn horizon(&self) -> usize {
        self.steps.len()
    }

    /// Net battery charge per step (charge minus discharge)
    pub fn net_charge(&self) -> Vec<f64> {
        self.steps.iter().map(|s| s.action.net_charge_kw()).collect()
    }

    /// 1 for steps spent charging, 0 otherwise
    pub fn charging_pattern(&self) -> Vec<u8> {
        self.steps.iter().map(|s| u8::from(s.action.is_charging())).collect()
    }

    pub fn trace(&self) -> DispatchTrace {
        DispatchTrace {
            charge: self.steps.iter().map(|s| s.action.charge_kw()).collect(),
            discharge: self.steps.iter().map(|s| s.action.discharge_kw()).collect(),
            curtailment: self.steps.iter().map(|s| s.curtailment).collect(),
            shedding: self.steps.iter().map(|s| s.shedding).collect(),
            soc: self.soc.clone(),
        }
    }
}

/// Aggregates reported alongside a validated schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_curtailment: f64,
    pub total_shedding: f64,
    pub total_charge: f64,
    pub total_discharge: f64,
    pub initial_soc: f64,
    pub final_soc: f64,
    pub objective: Option<f64>,
}
