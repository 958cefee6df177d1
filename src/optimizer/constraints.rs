//! Battery constraint templates shared by the formulation variants.
//!
//! Constraint names follow `kind[t]` so tests and diagnostics can look up a
//! single row, e.g. `soc_recurrence[3]` or `charge_rate[12]`.

use super::model::{Comparison, Formulation, LinearExpr, VarId};
use crate::domain::{BatteryModel, BatteryParameters};

/// Battery flow variables of a formulation
pub enum StorageFlows<'a> {
    /// One signed variable per step, positive meaning discharge
    Signed { output: &'a [VarId] },
    /// Separate nonnegative charge and discharge variables
    Split {
        charge: &'a [VarId],
        discharge: &'a [VarId],
    },
}

/// `SOC[0] == initial_soc`
pub fn initial_soc(f: &mut Formulation, soc: &[VarId], params: &BatteryParameters) {
    f.add_constraint("initial_soc", LinearExpr::var(soc[0]), Comparison::Eq, params.initial_soc);
}

/// `SOC[t+1] - SOC[t] - k_c·charge[t] + k_d·discharge[t] == 0`, with the
/// coefficients of [`BatteryModel::soc_coefficients`]
pub fn soc_recurrence(f: &mut Formulation, model: &BatteryModel, soc: &[VarId], flows: &StorageFlows) {
    let k = model.soc_coefficients();
    for t in 0..soc.len() - 1 {
        let mut lhs = LinearExpr::var(soc[t + 1]).with(soc[t], -1.0);
        match flows {
            StorageFlows::Signed { output } => lhs.add_term(output[t], k.discharge),
            StorageFlows::Split { charge, discharge } => {
                lhs.add_term(charge[t], -k.charge);
                lhs.add_term(discharge[t], k.discharge);
            }
        }
        f.add_constraint(format!("soc_recurrence[{}]", t), lhs, Comparison::Eq, 0.0);
    }
}

/// `min_soc <= SOC[t] <= max_soc` for every SOC variable
pub fn soc_bounds(f: &mut Formulation, soc: &[VarId], params: &BatteryParameters) {
    for (t, &s) in soc.iter().enumerate() {
        f.add_constraint(format!("soc_min[{}]", t), LinearExpr::var(s), Comparison::Ge, params.min_soc);
        f.add_constraint(format!("soc_max[{}]", t), LinearExpr::var(s), Comparison::Le, params.max_soc);
    }
}

/// `var[t] >= 0` for every variable, named `{prefix}_nonneg[t]`
pub fn non_negative(f: &mut Formulation, prefix: &str, vars: &[VarId]) {
    for (t, &v) in vars.iter().enumerate() {
        f.add_constraint(format!("{}_nonneg[{}]", prefix, t), LinearExpr::var(v), Comparison::Ge, 0.0);
    }
}

/// `var[t] <= 0` for every variable, named `{prefix}_nonpos[t]`
pub fn non_positive(f: &mut Formulation, prefix: &str, vars: &[VarId]) {
    for (t, &v) in vars.iter().enumerate() {
        f.add_constraint(format!("{}_nonpos[{}]", prefix, t), LinearExpr::var(v), Comparison::Le, 0.0);
    }
}

/// `var[t] <= limit[t]`, named `{prefix}_max[t]`
pub fn upper_bounds(f: &mut Formulation, prefix: &str, vars: &[VarId], limits: &[f64]) {
    for (t, (&v, &limit)) in vars.iter().zip(limits).enumerate() {
        f.add_constraint(format!("{}_max[{}]", prefix, t), LinearExpr::var(v), Comparison::Le, limit);
    }
}

/// Rate caps gated by one binary per step:
/// `charge[t] <= max_charge·flag[t]` and `discharge[t] <= max_discharge·(1 - flag[t])`.
///
/// With `flag` binary this also bounds each flow by its rate and forbids
/// charging and discharging in the same step.
pub fn exclusive_rate_limits(
    f: &mut Formulation,
    params: &BatteryParameters,
    charge: &[VarId],
    discharge: &[VarId],
    charging: &[VarId],
) {
    for t in 0..charge.len() {
        f.add_constraint(
            format!("charge_rate[{}]", t),
            LinearExpr::var(charge[t]).with(charging[t], -params.max_charge_kw),
            Comparison::Le,
            0.0,
        );
        f.add_constraint(
            format!("discharge_rate[{}]", t),
            LinearExpr::var(discharge[t]).with(charging[t], params.max_discharge_kw),
            Comparison::Le,
            params.max_discharge_kw,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::model::{Sense, VarKind};

    #[test]
    fn test_recurrence_row_matches_closed_form() {
        let model = BatteryModel::enhanced(BatteryParameters::enhanced_default());
        let mut f = Formulation::new("recurrence", Sense::Minimize);
        let charge = f.add_vector("charge", VarKind::Continuous, 1);
        let discharge = f.add_vector("discharge", VarKind::Continuous, 1);
        let soc = f.add_vector("soc", VarKind::Continuous, 2);
        soc_recurrence(
            &mut f,
            &model,
            &soc,
            &StorageFlows::Split {
                charge: &charge,
                discharge: &discharge,
            },
        );

        let row = f.constraint("soc_recurrence[0]").unwrap();
        // charge, discharge, soc[0], soc[1]
        let next = model.next_soc(0.5, 0.6, 0.0);
        assert!(row.violation(&[0.6, 0.0, 0.5, next]) < 1e-12);
        let next = model.next_soc(0.5, 0.0, 0.4);
        assert!(row.violation(&[0.0, 0.4, 0.5, next]) < 1e-12);
        assert!(row.violation(&[0.6, 0.0, 0.5, 0.5]) > 0.1);
    }

    #[test]
    fn test_signed_recurrence_discharges_on_positive_output() {
        let model = BatteryModel::simple(BatteryParameters::simple_default());
        let mut f = Formulation::new("signed", Sense::Minimize);
        let output = f.add_vector("output", VarKind::Continuous, 1);
        let soc = f.add_vector("soc", VarKind::Continuous, 2);
        soc_recurrence(&mut f, &model, &soc, &StorageFlows::Signed { output: &output });

        let row = f.constraint("soc_recurrence[0]").unwrap();
        // 1 kW out of 10 kWh
        assert!(row.violation(&[1.0, 0.5, 0.4]) < 1e-12);
        assert!(row.violation(&[-1.0, 0.5, 0.6]) < 1e-12);
    }

    #[test]
    fn test_flag_gates_charge_and_discharge() {
        let params = BatteryParameters::enhanced_default();
        let mut f = Formulation::new("exclusive", Sense::Minimize);
        let charge = f.add_vector("charge", VarKind::Continuous, 1);
        let discharge = f.add_vector("discharge", VarKind::Continuous, 1);
        let flag = f.add_vector("charging", VarKind::Binary, 1);
        exclusive_rate_limits(&mut f, &params, &charge, &discharge, &flag);

        let max = params.max_charge_kw;
        // Charging mode: full charge allowed, discharge must be 0
        assert!(f.worst_violation(&[max, 0.0, 1.0], 1e-12).is_none());
        assert!(f.worst_violation(&[max, 0.1, 1.0], 1e-12).is_some());
        // Discharging mode
        assert!(f.worst_violation(&[0.0, max, 0.0], 1e-12).is_none());
        assert!(f.worst_violation(&[0.1, max, 0.0], 1e-12).is_some());
        // Rate cap
        assert!(f.worst_violation(&[max + 0.1, 0.0, 1.0], 1e-12).is_some());
    }
}
