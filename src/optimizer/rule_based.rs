use tracing::debug;

use crate::domain::{
    BatteryAction, BatteryModel, BatteryParameters, ScenarioData, Schedule, ScheduleStep, Strategy,
};
use crate::error::SchedulerError;

/// Baseline scheduler that needs no solver:
/// - charge with any surplus, discharge any deficit (`output = generation - demand`)
/// - no rate caps, no efficiency losses, no SOC clipping
///
/// Every valid scenario yields a schedule. SOC bound violations are left for
/// the validator to report.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedScheduler;

impl RuleBasedScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Efficiencies and rate limits in `params` are ignored.
    pub fn schedule(
        &self,
        scenario: &ScenarioData,
        params: &BatteryParameters,
    ) -> Result<Schedule, SchedulerError> {
        scenario.validate()?;
        let model = BatteryModel::simple(params.clone());
        model.validate()?;

        let mut soc = Vec::with_capacity(scenario.horizon() + 1);
        soc.push(model.params.initial_soc);
        let mut steps = Vec::with_capacity(scenario.horizon());

        for t in 0..scenario.horizon() {
            let action = BatteryAction::from_net_charge(scenario.mismatch(t));
            soc.push(model.next_soc(soc[t], action.charge_kw(), action.discharge_kw()));
            debug!(step = t, %action, soc = soc[t + 1], "rule-based step");
            steps.push(ScheduleStep {
                action,
                curtailment: 0.0,
                shedding: 0.0,
            });
        }

        debug!(
            final_soc = soc[scenario.horizon()],
            "rule-based schedule computed"
        );

        Ok(Schedule::new(Strategy::RuleBased, steps, soc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HORIZON;
    use proptest::prelude::*;

    #[test]
    fn test_output_contract_shape() {
        let schedule = RuleBasedScheduler::new()
            .schedule(
                &ScenarioData::reference_day(),
                &BatteryParameters::simple_default(),
            )
            .unwrap();
        assert_eq!(schedule.horizon(), HORIZON);
        assert_eq!(schedule.soc.len(), HORIZON + 1);
        assert_eq!(schedule.soc[0], 0.5);
        assert!(schedule.status.is_none());
        assert!(schedule.objective.is_none());
    }

    #[test]
    fn test_surplus_charges_and_deficit_discharges() {
        let schedule = RuleBasedScheduler::new()
            .schedule(
                &ScenarioData::reference_day(),
                &BatteryParameters::simple_default(),
            )
            .unwrap();
        // Night: 0.2 deficit
        assert_eq!(schedule.steps[0].action, BatteryAction::Discharging(0.2));
        assert!((schedule.soc[1] - 0.48).abs() < 1e-12);
        // Midday surplus
        assert!(schedule.steps[12].action.is_charging());
    }

    #[test]
    fn test_undersized_battery_is_not_clipped() {
        let mut params = BatteryParameters::simple_default();
        params.capacity_kwh = 0.5;
        let schedule = RuleBasedScheduler::new()
            .schedule(&ScenarioData::reference_day(), &params)
            .unwrap();
        // Five night hours of 0.2 deficit drain 1 kWh from 0.25 kWh stored
        assert!(schedule.soc[5] < 0.0);
    }

    proptest! {
        #[test]
        fn prop_output_equals_mismatch(
            generation in prop::collection::vec(0.0f64..1.0, HORIZON),
            demand in prop::collection::vec(0.0f64..1.0, HORIZON),
            capacity in 0.5f64..50.0,
        ) {
            let scenario = ScenarioData::new(generation.clone(), demand.clone()).unwrap();
            let mut params = BatteryParameters::simple_default();
            params.capacity_kwh = capacity;
            let schedule = RuleBasedScheduler::new().schedule(&scenario, &params).unwrap();

            prop_assert_eq!(schedule.horizon(), HORIZON);
            prop_assert_eq!(schedule.soc.len(), HORIZON + 1);
            for (t, output) in schedule.net_charge().into_iter().enumerate() {
                prop_assert_eq!(output, generation[t] - demand[t]);
                prop_assert_eq!(schedule.soc[t + 1], schedule.soc[t] + output / capacity);
            }
        }
    }
}
