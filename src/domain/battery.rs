use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Physical battery parameters. SOC values are fractions of rated capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryParameters {
    pub capacity_kwh: f64,
    pub initial_soc: f64,
    pub min_soc: f64,
    pub max_soc: f64,
    pub charge_efficiency: f64,
    pub discharge_efficiency: f64,
    pub max_charge_kw: f64,
    pub max_discharge_kw: f64,
}

impl BatteryParameters {
    /// 10 kWh lossless battery at half charge, used by the imbalance and
    /// rule-based schedulers
    pub fn simple_default() -> Self {
        Self {
            capacity_kwh: 10.0,
            initial_soc: 0.5,
            min_soc: 0.0,
            max_soc: 1.0,
            charge_efficiency: 1.0,
            discharge_efficiency: 1.0,
            max_charge_kw: 10.0,
            max_discharge_kw: 10.0,
        }
    }

    /// 3 kWh battery with 90% efficiencies and 0.3C rate limits
    pub fn enhanced_default() -> Self {
        let capacity_kwh = 3.0;
        Self {
            capacity_kwh,
            initial_soc: 0.5,
            min_soc: 0.1,
            max_soc: 1.0,
            charge_efficiency: 0.9,
            discharge_efficiency: 0.9,
            max_charge_kw: 0.3 * capacity_kwh,
            max_discharge_kw: 0.3 * capacity_kwh,
        }
    }

    /// Validate parameters for physical consistency
    pub fn validate(&self) -> Result<(), SchedulerError> {
        let fields = [
            ("capacity_kwh", self.capacity_kwh),
            ("initial_soc", self.initial_soc),
            ("min_soc", self.min_soc),
            ("max_soc", self.max_soc),
            ("charge_efficiency", self.charge_efficiency),
            ("discharge_efficiency", self.discharge_efficiency),
            ("max_charge_kw", self.max_charge_kw),
            ("max_discharge_kw", self.max_discharge_kw),
        ];
        if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SchedulerError::invalid(format!("{} is not finite: {}", name, value)));
        }

        if self.capacity_kwh <= 0.0 {
            return Err(SchedulerError::invalid("capacity_kwh must be positive"));
        }

        if self.max_charge_kw < 0.0 || self.max_discharge_kw < 0.0 {
            return Err(SchedulerError::invalid("charge and discharge rates cannot be negative"));
        }

        if self.min_soc > self.max_soc {
            return Err(SchedulerError::invalid(format!(
                "min_soc {} exceeds max_soc {}",
                self.min_soc, self.max_soc
            )));
        }

        if self.initial_soc < self.min_soc || self.initial_soc > self.max_soc {
            return Err(SchedulerError::invalid(format!(
                "initial_soc {} outside [{}, {}]",
                self.initial_soc, self.min_soc, self.max_soc
            )));
        }

        for (name, eta) in [
            ("charge_efficiency", self.charge_efficiency),
            ("discharge_efficiency", self.discharge_efficiency),
        ] {
            if eta <= 0.0 || eta > 1.0 {
                return Err(SchedulerError::invalid(format!(
                    "{} must be in (0, 1], got {}",
                    name, eta
                )));
            }
        }

        Ok(())
    }
}

/// SOC dynamics used by a formulation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Dynamics {
    /// Lossless, no rate caps: `SOC[t+1] = SOC[t] + (charge - discharge) / capacity`
    Simple,
    /// Efficiencies, rate caps and charge/discharge exclusivity
    Enhanced,
}

/// Per-kW effect of charging and discharging on SOC over one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SocCoefficients {
    /// SOC gained per kW charged
    pub charge: f64,
    /// SOC lost per kW discharged
    pub discharge: f64,
}

/// Battery parameters bound to a choice of dynamics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatteryModel {
    pub params: BatteryParameters,
    pub dynamics: Dynamics,
}

impl BatteryModel {
    pub fn new(params: BatteryParameters, dynamics: Dynamics) -> Self {
        Self { params, dynamics }
    }

    pub fn simple(params: BatteryParameters) -> Self {
        Self::new(params, Dynamics::Simple)
    }

    pub fn enhanced(params: BatteryParameters) -> Self {
        Self::new(params, Dynamics::Enhanced)
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        self.params.validate()
    }

    /// Coefficients of the SOC recurrence, shared by [`Self::next_soc`] and
    /// the formulation's recurrence constraints
    pub fn soc_coefficients(&self) -> SocCoefficients {
        let capacity = self.params.capacity_kwh;
        match self.dynamics {
            Dynamics::Simple => SocCoefficients {
                charge: 1.0 / capacity,
                discharge: 1.0 / capacity,
            },
            Dynamics::Enhanced => SocCoefficients {
                charge: self.params.charge_efficiency / capacity,
                discharge: 1.0 / (self.params.discharge_efficiency * capacity),
            },
        }
    }

    /// SOC after one step of charging and discharging from `prev`.
    ///
    /// Under simple dynamics a signed output maps to `charge = -output` and
    /// `discharge = output`.
    pub fn next_soc(&self, prev: f64, charge_kw: f64, discharge_kw: f64) -> f64 {
        let capacity = self.params.capacity_kwh;
        match self.dynamics {
            Dynamics::Simple => prev + (charge_kw - discharge_kw) / capacity,
            Dynamics::Enhanced => {
                prev + (charge_kw * self.params.charge_efficiency
                    - discharge_kw / self.params.discharge_efficiency)
                    / capacity
            }
        }
    }

    /// Whether the rate caps apply under this model's dynamics
    pub fn has_rate_limits(&self) -> bool {
        self.dynamics == Dynamics::Enhanced
    }
}

/// Battery activity in one step. Charging and discharging at once cannot be
/// expressed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", content = "power_kw", rename_all = "snake_case")]
pub enum BatteryAction {
    Charging(f64),
    Discharging(f64),
    Idle,
}

impl BatteryAction {
    /// Action from a signed net flow, positive meaning charge
    pub fn from_net_charge(net_kw: f64) -> Self {
        if net_kw > 0.0 {
            Self::Charging(net_kw)
        } else if net_kw < 0.0 {
            Self::Discharging(-net_kw)
        } else {
            Self::Idle
        }
    }

    /// Action from separate flows, ignoring values at or below `tolerance`.
    /// Returns `None` when both flows are significant.
    pub fn from_flows(charge_kw: f64, discharge_kw: f64, tolerance: f64) -> Option<Self> {
        match (charge_kw > tolerance, discharge_kw > tolerance) {
            (true, true) => None,
            (true, false) => Some(Self::Charging(charge_kw)),
            (false, true) => Some(Self::Discharging(discharge_kw)),
            (false, false) => Some(Self::Idle),
        }
    }

    pub fn charge_kw(&self) -> f64 {
        match self {
            Self::Charging(kw) => *kw,
            _ => 0.0,
        }
    }

    pub fn discharge_kw(&self) -> f64 {
        match self {
            Self::Discharging(kw) => *kw,
            _ => 0.0,
        }
    }

    /// Charge minus discharge
    pub fn net_charge_kw(&self) -> f64 {
        match self {
            Self::Charging(kw) => *kw,
            Self::Discharging(kw) => -kw,
            Self::Idle => 0.0,
        }
    }

    pub fn is_charging(&self) -> bool {
        matches!(self, Self::Charging(_))
    }
}

impl std::fmt::Display for BatteryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatteryAction::Charging(kw) => write!(f, "charging {:.3} kW", kw),
            BatteryAction::Discharging(kw) => write!(f, "discharging {:.3} kW", kw),
            BatteryAction::Idle => write!(f, "idle"),
        }
    }
}
